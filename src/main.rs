use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use xau_watchdog::application::{Cli, CommandExecutor};
use xau_watchdog::shared::config::ConfigLoader;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let directive = cli.log_directive(std::env::var("RUST_LOG").ok());
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = ConfigLoader::load(cli.config.as_deref())?;
    CommandExecutor::execute(cli.command.unwrap_or_default(), config).await?;
    Ok(())
}
