// src/config.rs
use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::auth::{AuthError, Credentials};

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_bind_addr() -> String {
    "127.0.0.1:5000".to_string()
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

/// Settings read from `ROSTER_*` environment variables (and `.env`).
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// `user:password` pairs separated by commas.
    #[serde(default)]
    pub admin_users: String,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            bind_addr: default_bind_addr(),
            admin_users: String::new(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            cert_path: None,
            key_path: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        // Load .env file if it exists
        dotenv::dotenv().ok();
        envy::prefixed("ROSTER_").from_env::<AppConfig>()
    }

    /// Command line flags win over the environment.
    pub fn with_cli(mut self, cli: Cli) -> Self {
        if let Some(data_dir) = cli.data_dir {
            self.data_dir = data_dir;
        }
        if let Some(bind) = cli.bind {
            self.bind_addr = bind;
        }
        self
    }

    pub fn credentials(&self) -> Result<Credentials, AuthError> {
        Credentials::parse(&self.admin_users)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Cert and key, when both are configured.
    pub fn tls_paths(&self) -> Option<(&Path, &Path)> {
        match (&self.cert_path, &self.key_path) {
            (Some(cert), Some(key)) => Some((cert.as_path(), key.as_path())),
            _ => None,
        }
    }
}

#[derive(Parser, Debug, Default)]
#[command(name = "roster-core")]
#[command(about = "Shift roster service", long_about = None)]
pub struct Cli {
    /// Directory holding the roster JSON documents
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Address to listen on, e.g. 0.0.0.0:5000
    #[arg(long)]
    pub bind: Option<String>,
}
