use anyhow::Result;
use exmo_dashboard::config::AppConfig;
use exmo_dashboard::engine::AggregationEngine;
use exmo_dashboard::exchange::signer::Signer;
use exmo_dashboard::exchange::ExmoClient;
use exmo_dashboard::history::BalanceHistoryStore;
use exmo_dashboard::ledger::TradeLedger;
use exmo_dashboard::observability::init_tracing;
use exmo_dashboard::{api, scheduler};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = AppConfig::load()?;
    init_tracing(&cfg.observability)?;

    let signer = Signer::from_env()?;
    let exchange = Arc::new(ExmoClient::new(
        cfg.exmo.rest_base_url.clone(),
        signer,
        Duration::from_secs(cfg.exmo.connect_timeout_sec),
        Duration::from_secs(cfg.exmo.read_timeout_sec),
    )?);

    let ledger = Arc::new(TradeLedger::new(&cfg.storage.trade_log_path));
    let history = Arc::new(BalanceHistoryStore::new(&cfg.storage.balance_history_path));
    let engine = Arc::new(AggregationEngine::new(
        exchange,
        ledger,
        history.clone(),
        cfg.exmo.trade_fetch_limit,
    ));

    // Hourly balance sample
    let snapshot_task = {
        let engine = engine.clone();
        scheduler::spawn_every(
            "balance_snapshot",
            Duration::from_secs(cfg.scheduler.balance_snapshot_interval_sec),
            move || {
                let engine = engine.clone();
                async move { engine.record_hourly_snapshot().await }
            },
        )
    };

    // Daily history compaction
    let compact_task = {
        let history = history.clone();
        let retention = Duration::from_secs(cfg.scheduler.history_retention_hours * 3600);
        scheduler::spawn_every(
            "history_compaction",
            Duration::from_secs(cfg.scheduler.history_compact_interval_sec),
            move || {
                let history = history.clone();
                async move { history.compact(retention) }
            },
        )
    };

    let mut api_task = {
        let api_cfg = cfg.api.clone();
        let engine = engine.clone();
        tokio::spawn(async move {
            if let Err(e) = api::serve(api_cfg, engine).await {
                tracing::error!(error = ?e, "api server failed");
            }
        })
    };

    // Graceful shutdown on SIGINT/SIGTERM
    tokio::select! {
        _ = signal::ctrl_c() => {
            tracing::warn!("ctrl_c received; initiating shutdown");
        }
        _ = &mut api_task => {
            tracing::warn!("api server ended; shutting down");
        }
    }

    snapshot_task.abort();
    compact_task.abort();
    Ok(())
}
