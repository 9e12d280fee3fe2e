use clap::Parser as _;
use rest_mcp_bridge::cli::Cli;
use rest_mcp_bridge::logging::init_tracing;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_tracing(&cli.log_level, cli.log_format) {
        eprintln!("{e:#}");
        return ExitCode::FAILURE;
    }

    match rest_mcp_bridge::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
