//! Session runner settings.
//!
//! Read from an optional TOML file (`config/sharedledger.toml` unless
//! `--config` says otherwise), then from `SHAREDLEDGER__*` environment
//! variables, e.g. `SHAREDLEDGER__APP__LEVEL=debug`.

use std::time::Duration;

use clap::Parser;
use engine::{SyncOptions, TotalsScope, User};
use serde::Deserialize;

use crate::error::Result;

const DEFAULT_CONFIG_PATH: &str = "config/sharedledger.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct App {
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    #[default]
    Memory,
    Sqlite(String),
}

impl Database {
    pub fn url(&self) -> String {
        match self {
            Database::Memory => String::from("sqlite::memory:"),
            Database::Sqlite(path) => format!("sqlite:{path}?mode=rwc"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Identity {
    pub id: String,
    pub email: String,
}

impl From<Identity> for User {
    fn from(identity: Identity) -> Self {
        User::new(identity.id, identity.email)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Sync {
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for Sync {
    fn default() -> Self {
        Self {
            initial_backoff_ms: 250,
            max_backoff_ms: 30_000,
        }
    }
}

impl From<&Sync> for SyncOptions {
    fn from(sync: &Sync) -> Self {
        SyncOptions {
            initial_backoff: Duration::from_millis(sync.initial_backoff_ms),
            max_backoff: Duration::from_millis(sync.max_backoff_ms.max(sync.initial_backoff_ms)),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Aggregation {
    pub totals: TotalsScope,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub app: App,
    pub database: Database,
    pub identity: Option<Identity>,
    pub sync: Sync,
    pub aggregation: Aggregation,
}

#[derive(Debug, Parser)]
#[command(name = "sharedledger", disable_version_flag = true)]
struct Args {
    /// Optional config file path (TOML).
    #[arg(long)]
    config: Option<String>,
    /// Override the log level (trace, debug, info, warn, error).
    #[arg(long)]
    level: Option<String>,
}

impl Settings {
    pub fn load() -> Result<Self> {
        let args = Args::parse();

        let config_path = args.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);
        let mut builder = config::Config::builder();
        builder = builder.add_source(config::File::with_name(config_path).required(false));
        builder = builder
            .add_source(config::Environment::with_prefix("SHAREDLEDGER").separator("__"));
        let mut settings: Settings = builder.build()?.try_deserialize()?;

        if let Some(level) = args.level {
            settings.app.level = level;
        }

        Ok(settings)
    }
}
