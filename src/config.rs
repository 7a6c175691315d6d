use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ExmoCfg {
    pub rest_base_url: String,
    pub connect_timeout_sec: u64,
    pub read_timeout_sec: u64,
    /// Max trades fetched per pair on each refresh.
    pub trade_fetch_limit: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageCfg {
    pub trade_log_path: String,
    pub balance_history_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerCfg {
    pub balance_snapshot_interval_sec: u64,
    pub history_compact_interval_sec: u64,
    /// Must exceed the 24h query window or reference-point lookups starve.
    pub history_retention_hours: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiCfg {
    pub bind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityCfg {
    pub log_json: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub exmo: ExmoCfg,
    pub storage: StorageCfg,
    pub scheduler: SchedulerCfg,
    pub api: ApiCfg,
    pub observability: ObservabilityCfg,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::File::with_name("config.example").required(false))
            .add_source(config::Environment::default().separator("__"));

        if let Ok(path) = std::env::var("DASHBOARD_CONFIG") {
            builder = builder.add_source(config::File::with_name(&path).required(true));
        }

        builder
            .build()
            .context("failed to build config")?
            .try_deserialize()
            .context("failed to deserialize config")
    }
}
