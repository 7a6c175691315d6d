use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Numeric fields EXMO sends as decimal strings ("123.45"); we keep them as
/// f64 internally and write them back out as strings so the trade log stays
/// wire-compatible.
pub mod wire_f64 {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&v.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// One executed trade as reported by the exchange. Unknown JSON fields are
/// ignored so newer API revisions don't break log replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: i64,
    /// "buy" or "sell"; compared case-insensitively.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(with = "wire_f64")]
    pub price: f64,
    #[serde(with = "wire_f64")]
    pub quantity: f64,
    #[serde(with = "wire_f64")]
    pub amount: f64,
    /// Epoch seconds.
    pub date: i64,
    pub pair: String,
}

impl Trade {
    pub fn is_buy(&self) -> bool {
        self.kind.eq_ignore_ascii_case("buy")
    }

    pub fn is_sell(&self) -> bool {
        self.kind.eq_ignore_ascii_case("sell")
    }
}

/// One balance sample: total portfolio value in USD at a point in time.
/// Ordering (and equality) is by timestamp only so min/max queries over a
/// series work directly.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BalanceHistoryPoint {
    /// Epoch milliseconds.
    pub timestamp: i64,
    pub balance: f64,
}

impl PartialEq for BalanceHistoryPoint {
    fn eq(&self, other: &Self) -> bool {
        self.timestamp == other.timestamp
    }
}

impl Eq for BalanceHistoryPoint {}

impl PartialOrd for BalanceHistoryPoint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BalanceHistoryPoint {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp.cmp(&other.timestamp)
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Pnl24h {
    pub value: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct TradeCounts {
    pub buys: u64,
    pub sells: u64,
}

/// Full dashboard payload for one successful aggregation pass.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardData {
    #[serde(rename = "totalUsd")]
    pub total_usd: f64,
    #[serde(rename = "totalBtc")]
    pub total_btc: f64,
    #[serde(rename = "pnl24h")]
    pub pnl_24h: Pnl24h,
    /// Trades within the last 24 hours, newest first.
    pub transactions: Vec<Trade>,
    pub trades: TradeCounts,
}

/// Result of one aggregation call. A failed snapshot serializes to a map with
/// only an `error` field and no numeric keys.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Snapshot {
    Ready(DashboardData),
    Failed { error: String },
}

impl Snapshot {
    pub fn is_error(&self) -> bool {
        matches!(self, Snapshot::Failed { .. })
    }
}
