use crate::exchange::models::{PairSettings, Ticker, UserInfo, UserTrades};
use crate::exchange::ExchangeApi;
use crate::history::{BalanceHistoryStore, DAY_MS};
use crate::ledger::TradeLedger;
use crate::types::{BalanceHistoryPoint, DashboardData, Pnl24h, Snapshot, Trade, TradeCounts};
use anyhow::{bail, Context, Result};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Assets already denominated in the quote currency; they convert at parity
/// without a price lookup.
const QUOTE_ASSETS: [&str; 3] = ["USDT", "USDC", "USD"];

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64
}

fn is_quote_asset(asset: &str) -> bool {
    QUOTE_ASSETS.iter().any(|q| asset.eq_ignore_ascii_case(q))
}

fn parse_amount(map: &HashMap<String, String>, asset: &str) -> f64 {
    map.get(asset).and_then(|s| s.parse().ok()).unwrap_or(0.0)
}

/// Combines live exchange state with the local trade ledger and balance
/// history into the dashboard snapshot. Live balances and prices come from
/// the exchange on every call; historical trades and PnL references come from
/// local files, so the dashboard keeps working (with stale history) when the
/// exchange is down.
pub struct AggregationEngine {
    exchange: Arc<dyn ExchangeApi>,
    ledger: Arc<TradeLedger>,
    history: Arc<BalanceHistoryStore>,
    trade_fetch_limit: u32,
}

impl AggregationEngine {
    pub fn new(
        exchange: Arc<dyn ExchangeApi>,
        ledger: Arc<TradeLedger>,
        history: Arc<BalanceHistoryStore>,
        trade_fetch_limit: u32,
    ) -> Self {
        Self {
            exchange,
            ledger,
            history,
            trade_fetch_limit,
        }
    }

    /// Build one dashboard snapshot. Never raises past this boundary: any
    /// failure is logged and returned as an `error`-only snapshot.
    pub async fn build_snapshot(&self) -> Snapshot {
        match self.try_build_snapshot().await {
            Ok(data) => Snapshot::Ready(data),
            Err(e) => {
                tracing::error!(error = ?e, "snapshot build failed");
                Snapshot::Failed {
                    error: format!("{e:#}"),
                }
            }
        }
    }

    async fn try_build_snapshot(&self) -> Result<DashboardData> {
        // Live account state; an API-reported error aborts the whole snapshot.
        let raw = self.exchange.call("user_info", BTreeMap::new()).await?;
        let user_info: UserInfo = serde_json::from_str(&raw).context("decode user_info")?;
        if let Some(e) = user_info.api_error() {
            bail!("exmo api error: {e}");
        }

        let assets: HashSet<&str> = user_info
            .balances
            .keys()
            .chain(user_info.reserved.keys())
            .map(String::as_str)
            .collect();

        let prices = self.market_prices(&assets).await?;

        // Total value counts available + reserved holdings alike.
        let mut total_usd = 0.0;
        for asset in &assets {
            let holding =
                parse_amount(&user_info.balances, asset) + parse_amount(&user_info.reserved, asset);
            if holding <= 0.0 {
                continue;
            }
            if is_quote_asset(asset) {
                total_usd += holding;
            } else {
                let pair = format!("{}_USDT", asset.to_uppercase());
                total_usd += holding * prices.get(&pair).copied().unwrap_or(0.0);
            }
        }

        let btc_price = prices.get("BTC_USDT").copied().unwrap_or(0.0);
        let total_btc = if total_usd > 0.0 && btc_price > 0.0 {
            total_usd / btc_price
        } else {
            0.0
        };

        // Refresh the ledger, then read history back from it. The local log,
        // not the live API, is the source of truth for historical trades.
        let new_trades = self.fetch_user_trades().await;
        if !new_trades.is_empty() {
            self.ledger.ingest(&new_trades);
        }
        let all_trades = self.ledger.read_all();

        let now = now_ms();
        let pnl_24h = self.pnl_24h(total_usd, now);

        // Last 24h of trades, newest first, for the transactions table.
        let cutoff_sec = (now - DAY_MS) / 1000;
        let mut transactions: Vec<Trade> = all_trades
            .into_iter()
            .filter(|t| t.date >= cutoff_sec)
            .collect();
        transactions.sort_by(|a, b| b.date.cmp(&a.date));

        let trades = TradeCounts {
            buys: transactions.iter().filter(|t| t.is_buy()).count() as u64,
            sells: transactions.iter().filter(|t| t.is_sell()).count() as u64,
        };

        Ok(DashboardData {
            total_usd,
            total_btc,
            pnl_24h,
            transactions,
            trades,
        })
    }

    /// 24h change against the most recent sample at or before now-24h, falling
    /// back to the oldest sample inside the window when the store holds less
    /// than a full day, and to the current value (zero change) when the store
    /// is empty.
    fn pnl_24h(&self, total_usd: f64, now: i64) -> Pnl24h {
        let window_start = now - DAY_MS;
        let reference = self
            .history
            .balance_at_or_before(window_start)
            .or_else(|| self.history.earliest_within(window_start))
            .map(|p| p.balance)
            .unwrap_or(total_usd);

        let value = total_usd - reference;
        let percentage = if reference > 0.0 && reference != total_usd {
            value / reference * 100.0
        } else {
            0.0
        };
        Pnl24h { value, percentage }
    }

    /// Current USDT price for every asset needing conversion, keyed by pair
    /// name. BTC_USDT is always captured when the exchange quotes it, for the
    /// BTC-denominated total.
    async fn market_prices(&self, assets: &HashSet<&str>) -> Result<HashMap<String, f64>> {
        let raw = self.exchange.call("ticker", BTreeMap::new()).await?;
        let ticker: Ticker = serde_json::from_str(&raw).context("decode ticker")?;

        let mut prices = HashMap::new();
        let mut wanted: Vec<String> = assets
            .iter()
            .map(|a| format!("{}_USDT", a.to_uppercase()))
            .collect();
        wanted.push("BTC_USDT".to_string());

        for pair in wanted {
            if prices.contains_key(&pair) {
                continue;
            }
            let Some(entry) = ticker.get(&pair) else {
                continue;
            };
            match entry.last_trade.parse::<f64>() {
                Ok(price) => {
                    prices.insert(pair, price);
                }
                Err(e) => {
                    tracing::warn!(pair = %pair, error = ?e, "bad ticker price; skipping");
                }
            }
        }
        Ok(prices)
    }

    /// Pull recent trades across every listed pair. A failure here degrades to
    /// an empty batch so the snapshot can still be served from local history.
    async fn fetch_user_trades(&self) -> Vec<Trade> {
        match self.try_fetch_user_trades().await {
            Ok(trades) => {
                tracing::debug!(count = trades.len(), "fetched user trades");
                trades
            }
            Err(e) => {
                tracing::warn!(error = ?e, "user trade fetch failed; continuing with local history");
                Vec::new()
            }
        }
    }

    async fn try_fetch_user_trades(&self) -> Result<Vec<Trade>> {
        let raw = self.exchange.call("pair_settings", BTreeMap::new()).await?;
        let pairs: PairSettings = serde_json::from_str(&raw).context("decode pair_settings")?;

        let mut params = BTreeMap::new();
        params.insert(
            "pair".to_string(),
            pairs.keys().cloned().collect::<Vec<_>>().join(","),
        );
        params.insert("limit".to_string(), self.trade_fetch_limit.to_string());

        let raw = self.exchange.call("user_trades", params).await?;
        let by_pair: UserTrades = serde_json::from_str(&raw).context("decode user_trades")?;
        Ok(by_pair.into_values().flatten().collect())
    }

    /// Time-triggered: persist the current total as a balance sample, unless
    /// the snapshot failed, in which case skip until the next trigger.
    pub async fn record_hourly_snapshot(&self) {
        match self.build_snapshot().await {
            Snapshot::Ready(data) => self.history.save_balance(data.total_usd),
            Snapshot::Failed { error } => {
                tracing::warn!(%error, "snapshot failed; skipping balance sample");
            }
        }
    }

    /// Hourly-bucketed balance series for charting.
    pub fn hourly_history(&self) -> Vec<BalanceHistoryPoint> {
        self.history.hourly_history()
    }
}
