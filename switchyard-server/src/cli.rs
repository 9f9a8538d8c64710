use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "switchyard",
    about = "Switchyard - Multi-tenant LLM Gateway",
    version = env!("CARGO_PKG_VERSION"),
    author
)]
pub struct Cli {
    /// Gateway configuration file (JSON)
    #[arg(short, long, env = "SWITCHYARD_CONFIG", default_value = "switchyard.json")]
    pub config: PathBuf,

    /// Bind address; overrides the configuration file
    #[arg(long)]
    pub host: Option<String>,

    #[arg(short, long)]
    pub port: Option<u16>,

    /// Default `tracing` filter when `RUST_LOG` is unset
    #[arg(short, long)]
    pub log_level: Option<String>,
}
