use anyhow::{anyhow, Result};
use async_trait::async_trait;
use exmo_dashboard::engine::AggregationEngine;
use exmo_dashboard::exchange::ExchangeApi;
use exmo_dashboard::history::BalanceHistoryStore;
use exmo_dashboard::ledger::TradeLedger;
use exmo_dashboard::types::Snapshot;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Canned-response exchange: returns the configured body per method, or a
/// transport error for methods with no canned body.
struct MockExchange {
    responses: HashMap<&'static str, String>,
}

impl MockExchange {
    fn new() -> Self {
        Self {
            responses: HashMap::new(),
        }
    }

    fn with(mut self, method: &'static str, body: &str) -> Self {
        self.responses.insert(method, body.to_string());
        self
    }
}

#[async_trait]
impl ExchangeApi for MockExchange {
    async fn call(&self, method: &str, _params: BTreeMap<String, String>) -> Result<String> {
        self.responses
            .get(method)
            .cloned()
            .ok_or_else(|| anyhow!("connection refused: {method}"))
    }
}

fn now_sec() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

struct Fixture {
    _dir: tempfile::TempDir,
    engine: AggregationEngine,
    history_path: std::path::PathBuf,
}

fn fixture(exchange: Arc<dyn ExchangeApi>) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let history_path = dir.path().join("balance_history.log");
    let ledger = Arc::new(TradeLedger::new(dir.path().join("history.log")));
    let history = Arc::new(BalanceHistoryStore::new(&history_path));
    let engine = AggregationEngine::new(exchange, ledger, history, 1000);
    Fixture {
        _dir: dir,
        engine,
        history_path,
    }
}

fn healthy_exchange() -> MockExchange {
    let recent = now_sec() - 3600;
    let old = now_sec() - 90_000; // outside the 24h window
    MockExchange::new()
        .with(
            "user_info",
            r#"{"uid":1,"balances":{"BTC":"1","USDT":"500"},"reserved":{"BTC":"0","USDT":"0"}}"#,
        )
        .with(
            "ticker",
            r#"{"BTC_USDT":{"last_trade":"20000","high":"21000"},"ETH_USDT":{"last_trade":"1500"}}"#,
        )
        .with("pair_settings", r#"{"BTC_USDT":{},"ETH_USDT":{}}"#)
        .with(
            "user_trades",
            &format!(
                r#"{{"BTC_USDT":[
                    {{"trade_id":1,"type":"buy","price":"20000","quantity":"0.5","amount":"10000","date":{recent},"pair":"BTC_USDT"}},
                    {{"trade_id":2,"type":"sell","price":"20100","quantity":"0.1","amount":"2010","date":{},"pair":"BTC_USDT"}},
                    {{"trade_id":3,"type":"buy","price":"19000","quantity":"0.2","amount":"3800","date":{old},"pair":"BTC_USDT"}}
                ],"ETH_USDT":[]}}"#,
                recent + 60
            ),
        )
}

#[tokio::test]
async fn snapshot_computes_portfolio_totals() {
    let fx = fixture(Arc::new(healthy_exchange()));

    let Snapshot::Ready(data) = fx.engine.build_snapshot().await else {
        panic!("expected a ready snapshot");
    };

    // 1 BTC * 20000 + 500 USDT at parity
    assert!((data.total_usd - 20500.0).abs() < 1e-9);
    assert!((data.total_btc - 1.025).abs() < 1e-9);
}

#[tokio::test]
async fn snapshot_filters_sorts_and_counts_recent_trades() {
    let fx = fixture(Arc::new(healthy_exchange()));

    let Snapshot::Ready(data) = fx.engine.build_snapshot().await else {
        panic!("expected a ready snapshot");
    };

    // Trade 3 is older than 24h and must not appear.
    assert_eq!(data.transactions.len(), 2);
    // Newest first.
    assert_eq!(data.transactions[0].trade_id, 2);
    assert_eq!(data.transactions[1].trade_id, 1);
    assert_eq!(data.trades.buys, 1);
    assert_eq!(data.trades.sells, 1);
}

#[tokio::test]
async fn pnl_uses_reference_point_and_zero_change_without_history() {
    let fx = fixture(Arc::new(healthy_exchange()));

    // No balance history at all: 24h-ago balance is treated as the current
    // value, so the change is zero.
    let Snapshot::Ready(data) = fx.engine.build_snapshot().await else {
        panic!("expected a ready snapshot");
    };
    assert_eq!(data.pnl_24h.value, 0.0);
    assert_eq!(data.pnl_24h.percentage, 0.0);

    // A reference point 25h old: pnl is measured against it.
    let now_ms = now_sec() * 1000;
    std::fs::write(&fx.history_path, format!("{},20000.00\n", now_ms - 25 * 3_600_000)).unwrap();

    let Snapshot::Ready(data) = fx.engine.build_snapshot().await else {
        panic!("expected a ready snapshot");
    };
    assert!((data.pnl_24h.value - 500.0).abs() < 1e-9);
    assert!((data.pnl_24h.percentage - 2.5).abs() < 1e-9);
}

#[tokio::test]
async fn short_history_falls_back_to_earliest_point_in_window() {
    let fx = fixture(Arc::new(healthy_exchange()));

    // Only a 1h-old point exists (store younger than the window): it becomes
    // the reference instead of a zero change.
    let now_ms = now_sec() * 1000;
    std::fs::write(&fx.history_path, format!("{},20400.00\n", now_ms - 3_600_000)).unwrap();

    let Snapshot::Ready(data) = fx.engine.build_snapshot().await else {
        panic!("expected a ready snapshot");
    };
    assert!((data.pnl_24h.value - 100.0).abs() < 1e-9);
}

#[tokio::test]
async fn failed_exchange_call_yields_error_only_snapshot() {
    let fx = fixture(Arc::new(MockExchange::new())); // every call fails

    let snapshot = fx.engine.build_snapshot().await;
    assert!(snapshot.is_error());

    let json = serde_json::to_value(&snapshot).unwrap();
    let obj = json.as_object().unwrap();
    assert_eq!(obj.len(), 1);
    assert!(obj.contains_key("error"));
}

#[tokio::test]
async fn upstream_business_error_aborts_snapshot() {
    let exchange = MockExchange::new()
        .with("user_info", r#"{"result":false,"error":"Error 40017: Wrong api key"}"#);
    let fx = fixture(Arc::new(exchange));

    let snapshot = fx.engine.build_snapshot().await;
    assert!(snapshot.is_error());
}

#[tokio::test]
async fn trade_fetch_failure_degrades_to_local_history() {
    // user_info and ticker succeed; pair_settings/user_trades fail. The
    // snapshot must still come back with totals and an empty transaction list.
    let exchange = MockExchange::new()
        .with(
            "user_info",
            r#"{"uid":1,"balances":{"USDT":"500"},"reserved":{}}"#,
        )
        .with("ticker", r#"{"BTC_USDT":{"last_trade":"20000"}}"#);
    let fx = fixture(Arc::new(exchange));

    let Snapshot::Ready(data) = fx.engine.build_snapshot().await else {
        panic!("expected a ready snapshot");
    };
    assert!((data.total_usd - 500.0).abs() < 1e-9);
    assert!(data.transactions.is_empty());
}

#[tokio::test]
async fn hourly_recording_persists_only_successful_snapshots() {
    let fx = fixture(Arc::new(healthy_exchange()));

    fx.engine.record_hourly_snapshot().await;
    let content = std::fs::read_to_string(&fx.history_path).unwrap();
    assert_eq!(content.lines().count(), 1);
    assert!(content.trim_end().ends_with(",20500.00"));

    let failing = fixture(Arc::new(MockExchange::new()));
    failing.engine.record_hourly_snapshot().await;
    assert!(!failing.history_path.exists());
}

#[tokio::test]
async fn repeated_snapshots_do_not_duplicate_ledger_entries() {
    let fx = fixture(Arc::new(healthy_exchange()));

    // Concurrent-dashboard-requests shape: the same exchange trades ingested
    // on every call must land in the ledger exactly once.
    let Snapshot::Ready(first) = fx.engine.build_snapshot().await else {
        panic!("expected a ready snapshot");
    };
    let Snapshot::Ready(second) = fx.engine.build_snapshot().await else {
        panic!("expected a ready snapshot");
    };
    assert_eq!(first.transactions.len(), second.transactions.len());
}
