//! `OpenAPI` 3.x -> MCP tools.
//!
//! Loads a document ([`document::Document`]), resolves the runtime configuration
//! ([`config::BridgeConfig`]), and registers one tool per operation through a
//! [`registry::ToolRegistrar`]. Each tool forwards calls to the upstream REST API via
//! [`executor::RequestExecutor`].
//!
//! The crate holds no MCP transport; hosts (such as `rest-mcp-bridge`) own the server loop.

pub mod config;
pub mod credentials;
pub mod describe;
pub mod document;
pub mod error;
pub mod executor;
pub mod registry;
pub mod resolver;
pub mod safety;
pub mod sanitize;
pub mod schema;
pub mod semantics;
