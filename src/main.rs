use cellref::app;
use cellref::config::Config;
use clap::Parser;

/// Entry point for the commentary server.
///
/// Reads the configuration from the command line and environment, initialises
/// logging (`RUST_LOG`, default `info`) and serves until interrupted.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();
    app::run(config).await
}
