// ⚙️ Settings - read once from the environment (and `.env`)

use crate::validation::RuleTable;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_DB_PATH: &str = "benefits.db";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// SQLite file (`BENEFITS_DB_PATH`)
    pub db_path: PathBuf,
    /// HTTP listen address (`BENEFITS_BIND_ADDR`)
    pub bind_addr: String,
    /// JSON rule table layered over the defaults (`BENEFITS_RULES_PATH`)
    pub rules_path: Option<PathBuf>,
}

impl Settings {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let settings = Settings {
            db_path: non_empty("BENEFITS_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH)),
            bind_addr: non_empty("BENEFITS_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            rules_path: non_empty("BENEFITS_RULES_PATH").map(PathBuf::from),
        };
        settings.socket_addr()?;
        Ok(settings)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.bind_addr
            .parse()
            .with_context(|| format!("BENEFITS_BIND_ADDR is not a socket address: {}", self.bind_addr))
    }

    /// Default rules, or the configured rules file over them.
    pub fn load_rules(&self) -> Result<RuleTable> {
        match &self.rules_path {
            Some(path) => RuleTable::from_file(path),
            None => Ok(RuleTable::default()),
        }
    }
}
