use clap::Parser;

use crate::config::Overrides;

/// Three-page demo site that serves page fragments to `<data-frame>` requests
#[derive(Parser, Debug)]
#[command(name = "frame-site", version, about)]
pub struct Cli {
    /// Configuration file path, without extension
    #[arg(short, long, default_value = "config")]
    pub config: String,

    /// Listen host, overrides the config file
    #[arg(long)]
    pub host: Option<String>,

    /// Listen port, overrides the config file
    #[arg(short, long)]
    pub port: Option<u16>,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            host: self.host.clone(),
            port: self.port,
        }
    }
}
