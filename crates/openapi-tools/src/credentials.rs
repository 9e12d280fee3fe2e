//! Credential injection policy.
//!
//! A credential parameter is a query parameter whose value comes from this process, never from
//! the calling agent. Rules are resolved once at startup; afterwards only the resolved values are
//! consulted.

use crate::error::{OpenApiToolsError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// Default credential query parameter name.
pub const DEFAULT_CREDENTIAL_PARAM: &str = "api_key";

/// Default environment variable holding the credential.
pub const DEFAULT_CREDENTIAL_ENV: &str = "API_KEY";

/// Where an injected value comes from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CredentialSource {
    /// Read from an environment variable at startup.
    Env(String),
    /// A literal value.
    Value(String),
}

/// One `(query parameter name -> source)` rule.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRule {
    pub param: String,
    pub source: CredentialSource,
}

impl CredentialRule {
    #[must_use]
    pub fn from_env(param: impl Into<String>, var: impl Into<String>) -> Self {
        Self {
            param: param.into(),
            source: CredentialSource::Env(var.into()),
        }
    }
}

impl FromStr for CredentialRule {
    type Err = OpenApiToolsError;

    /// Parse `PARAM=ENV_VAR`.
    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('=') {
            Some((param, var)) if !param.trim().is_empty() && !var.trim().is_empty() => {
                Ok(Self::from_env(param.trim(), var.trim()))
            }
            _ => Err(OpenApiToolsError::Config(format!(
                "Invalid injection rule '{s}' (expected PARAM=ENV_VAR)"
            ))),
        }
    }
}

/// Ordered set of injection rules. Later rules for the same parameter win.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct CredentialPolicy {
    rules: Vec<CredentialRule>,
}

impl Default for CredentialPolicy {
    fn default() -> Self {
        Self::new(vec![CredentialRule::from_env(
            DEFAULT_CREDENTIAL_PARAM,
            DEFAULT_CREDENTIAL_ENV,
        )])
    }
}

impl CredentialPolicy {
    #[must_use]
    pub fn new(rules: Vec<CredentialRule>) -> Self {
        Self { rules }
    }

    #[must_use]
    pub fn rules(&self) -> &[CredentialRule] {
        &self.rules
    }

    /// The last rule for each parameter, ordered by where that rule was declared.
    #[must_use]
    pub fn effective_rules(&self) -> Vec<&CredentialRule> {
        let mut seen = HashSet::new();
        let mut effective: Vec<&CredentialRule> = self
            .rules
            .iter()
            .rev()
            .filter(|rule| seen.insert(rule.param.as_str()))
            .collect();
        effective.reverse();
        effective
    }

    /// Resolve the effective rule of every parameter to a concrete value. Overridden rules are
    /// never looked up.
    ///
    /// `lookup` abstracts environment access (pass `|k| std::env::var(k).ok()` in production).
    ///
    /// # Errors
    ///
    /// Returns [`OpenApiToolsError::MissingCredential`] if an effective env-sourced rule has no
    /// value.
    pub fn resolve<F>(&self, lookup: F) -> Result<ResolvedCredentials>
    where
        F: Fn(&str) -> Option<String>,
    {
        let effective = self.effective_rules();
        let mut values = HashMap::with_capacity(effective.len());
        for rule in effective {
            let value = match &rule.source {
                CredentialSource::Value(v) => v.clone(),
                CredentialSource::Env(var) => {
                    lookup(var).ok_or_else(|| OpenApiToolsError::MissingCredential {
                        param: rule.param.clone(),
                        var: var.clone(),
                    })?
                }
            };
            values.insert(rule.param.clone(), value);
        }
        Ok(ResolvedCredentials { values })
    }
}

/// Credential values keyed by query parameter name.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ResolvedCredentials {
    values: HashMap<String, String>,
}

impl ResolvedCredentials {
    #[must_use]
    pub fn is_credential(&self, param: &str) -> bool {
        self.values.contains_key(param)
    }

    #[must_use]
    pub fn value_for(&self, param: &str) -> Option<&str> {
        self.values.get(param).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for ResolvedCredentials
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

// Never print credential values.
impl fmt::Debug for ResolvedCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.values.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("ResolvedCredentials")
            .field("params", &names)
            .finish_non_exhaustive()
    }
}
