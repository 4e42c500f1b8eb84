use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::{Backend, FixtureBackend, HttpBackend};

/// Server configuration, from the command line or the environment.
#[derive(Parser, Debug, Clone)]
#[command(name = "cellref-server", version, about = "Links a summary table to its commentary")]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "CELLREF_BIND", default_value = "127.0.0.1:3000")]
    pub bind: SocketAddr,

    /// Base URL of the data provider / commentary service
    #[arg(long, env = "CELLREF_UPSTREAM", conflicts_with = "fixtures")]
    pub upstream: Option<String>,

    /// Directory of <name>.json file-detail payloads to serve instead of an upstream
    #[arg(long, env = "CELLREF_FIXTURES")]
    pub fixtures: Option<PathBuf>,

    /// Upstream request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,

    /// Directory served under /static
    #[arg(long)]
    pub static_dir: Option<PathBuf>,
}

impl Config {
    /// Builds the configured backend. Without an upstream or fixtures the demo
    /// data set is served.
    pub fn backend(&self) -> Result<Arc<dyn Backend>, Box<dyn std::error::Error>> {
        if let Some(upstream) = &self.upstream {
            log::info!("Using upstream service at {}", upstream);
            let backend = HttpBackend::new(upstream, Duration::from_secs(self.timeout_secs))?;
            return Ok(Arc::new(backend));
        }
        if let Some(dir) = &self.fixtures {
            return Ok(Arc::new(FixtureBackend::from_dir(dir)?));
        }
        log::info!("No upstream configured, serving demo data");
        Ok(Arc::new(FixtureBackend::demo()))
    }
}
