use crate::types::Trade;
use serde::Deserialize;
use std::collections::HashMap;

/// `user_info` response: balance amounts keyed by asset symbol, as decimal
/// strings. A non-empty `error` means the call logically failed even though
/// the HTTP exchange succeeded.
#[derive(Debug, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub balances: HashMap<String, String>,
    #[serde(default)]
    pub reserved: HashMap<String, String>,
}

impl UserInfo {
    pub fn api_error(&self) -> Option<&str> {
        self.error.as_deref().filter(|e| !e.is_empty())
    }
}

/// One pair's entry in the `ticker` response; only the last trade price is
/// used for valuation.
#[derive(Debug, Deserialize)]
pub struct TickerEntry {
    #[serde(default)]
    pub last_trade: String,
}

/// `ticker`: pair name ("BTC_USDT") to market stats.
pub type Ticker = HashMap<String, TickerEntry>;

/// `pair_settings`: only the pair names are needed, the per-pair settings are
/// opaque here.
pub type PairSettings = HashMap<String, serde_json::Value>;

/// `user_trades`: pair name to that pair's recent trades.
pub type UserTrades = HashMap<String, Vec<Trade>>;
