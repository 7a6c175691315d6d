use crate::types::Trade;
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

/// Append-only, deduplicated trade log. One JSON object per line; the dedup
/// index maps trade id to "already written" and is rebuilt from the file on
/// every full read.
///
/// Constructed once and shared by reference; the index mutex makes ingestion
/// safe when overlapping dashboard requests and the hourly task race.
pub struct TradeLedger {
    path: PathBuf,
    seen: Mutex<HashSet<i64>>,
}

impl TradeLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            seen: Mutex::new(HashSet::new()),
        }
    }

    /// Append every trade whose id has not been seen. Existing lines are never
    /// rewritten. A trade that fails to serialize is logged and skipped so one
    /// bad record cannot block the rest of the batch; an append failure drops
    /// the batch (the next read rebuilds the index from what actually landed).
    pub fn ingest(&self, new_trades: &[Trade]) {
        if new_trades.is_empty() {
            return;
        }

        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        let mut lines = String::new();
        for trade in new_trades {
            if !seen.insert(trade.trade_id) {
                continue;
            }
            match serde_json::to_string(trade) {
                Ok(line) => {
                    lines.push_str(&line);
                    lines.push('\n');
                }
                Err(e) => {
                    tracing::warn!(trade_id = trade.trade_id, error = ?e, "trade serialization failed; skipping");
                }
            }
        }
        if lines.is_empty() {
            return;
        }

        let appended = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut f| f.write_all(lines.as_bytes()));
        if let Err(e) = appended {
            tracing::warn!(path = %self.path.display(), error = ?e, "trade log append failed; batch dropped");
        }
    }

    /// Read the full trade history in write order, rebuilding the dedup index
    /// from the parsed ids. Unparsable lines are skipped; a missing or
    /// unreadable file yields an empty history so aggregation can proceed.
    pub fn read_all(&self) -> Vec<Trade> {
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        seen.clear();

        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) => {
                if e.kind() != ErrorKind::NotFound {
                    tracing::warn!(path = %self.path.display(), error = ?e, "trade log read failed");
                }
                return Vec::new();
            }
        };

        content
            .lines()
            .filter_map(|line| match serde_json::from_str::<Trade>(line) {
                Ok(trade) => {
                    seen.insert(trade.trade_id);
                    Some(trade)
                }
                Err(e) => {
                    tracing::warn!(line, error = ?e, "bad trade log line; skipping");
                    None
                }
            })
            .collect()
    }

    /// Total spent on acquisitions: sum of `amount` over all buy trades,
    /// case-insensitively. No pair filter is applied.
    pub fn initial_investment(trades: &[Trade]) -> f64 {
        trades.iter().filter(|t| t.is_buy()).map(|t| t.amount).sum()
    }
}
