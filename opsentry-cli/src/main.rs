use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod args;
mod banner;
mod commands;
mod runner;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = args::Args::parse();

    banner::display_banner();
    banner::display_quick_guide();

    runner::run(args).await
}
