use crate::types::BalanceHistoryPoint;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const HOUR_MS: i64 = 3_600_000;
pub const DAY_MS: i64 = 24 * HOUR_MS;

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64
}

/// Append-only balance sample log: one `"<epoch-millis>,<value>"` line per
/// sample, value with exactly two fraction digits and `.` as the separator
/// regardless of locale.
///
/// All file access goes through one mutex; compaction is the only destructive
/// operation and holds that lock across its whole read-filter-rewrite pass so
/// no append can interleave with it.
pub struct BalanceHistoryStore {
    path: PathBuf,
    file_lock: Mutex<()>,
}

impl BalanceHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file_lock: Mutex::new(()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.file_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append one sample stamped with the current time, creating the file if
    /// absent. A failed append is logged and dropped; it only delays a chart
    /// data point.
    pub fn save_balance(&self, total_usd: f64) {
        let _guard = self.lock();
        let line = format!("{},{:.2}\n", now_ms(), total_usd);
        let appended = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut f| f.write_all(line.as_bytes()));
        match appended {
            Ok(()) => tracing::info!(balance = total_usd, "balance sample saved"),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = ?e, "balance history append failed")
            }
        }
    }

    fn read_points(&self) -> Vec<BalanceHistoryPoint> {
        let _guard = self.lock();
        self.read_points_locked()
    }

    // Caller must hold file_lock.
    fn read_points_locked(&self) -> Vec<BalanceHistoryPoint> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) => {
                if e.kind() != ErrorKind::NotFound {
                    tracing::warn!(path = %self.path.display(), error = ?e, "balance history read failed");
                }
                return Vec::new();
            }
        };
        content.lines().filter_map(parse_line).collect()
    }

    /// Last 24 hours of samples, down-sampled to one point per UTC hour
    /// bucket, sorted ascending.
    pub fn hourly_history(&self) -> Vec<BalanceHistoryPoint> {
        self.hourly_history_since(now_ms() - DAY_MS)
    }

    pub fn hourly_history_since(&self, cutoff_ms: i64) -> Vec<BalanceHistoryPoint> {
        let points = self
            .read_points()
            .into_iter()
            .filter(|p| p.timestamp >= cutoff_ms)
            .collect();
        bucket_last_per_hour(points)
    }

    /// Most recent sample at or before `target_ms`, the 24h-ago reference for
    /// PnL calculations.
    pub fn balance_at_or_before(&self, target_ms: i64) -> Option<BalanceHistoryPoint> {
        self.read_points()
            .into_iter()
            .filter(|p| p.timestamp <= target_ms)
            .max()
    }

    /// Oldest sample at or after `window_start_ms`; the fallback reference
    /// when less than a full window of history exists.
    pub fn earliest_within(&self, window_start_ms: i64) -> Option<BalanceHistoryPoint> {
        self.read_points()
            .into_iter()
            .filter(|p| p.timestamp >= window_start_ms)
            .min()
    }

    /// Rewrite the file keeping only samples within the retention horizon.
    /// Malformed lines are dropped along the way. Idempotent.
    pub fn compact(&self, retention: Duration) {
        self.compact_before(now_ms() - retention.as_millis() as i64)
    }

    pub fn compact_before(&self, cutoff_ms: i64) {
        let _guard = self.lock();
        if !self.path.exists() {
            return;
        }

        let kept: Vec<String> = match std::fs::read_to_string(&self.path) {
            Ok(content) => content
                .lines()
                .filter(|line| matches!(parse_line(line), Some(p) if p.timestamp >= cutoff_ms))
                .map(str::to_owned)
                .collect(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = ?e, "balance history read failed; compaction skipped");
                return;
            }
        };

        let mut out = kept.join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        match std::fs::write(&self.path, out) {
            Ok(()) => tracing::info!(kept = kept.len(), "balance history compacted"),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = ?e, "balance history rewrite failed")
            }
        }
    }
}

fn parse_line(line: &str) -> Option<BalanceHistoryPoint> {
    let (ts, value) = line.split_once(',')?;
    Some(BalanceHistoryPoint {
        timestamp: ts.trim().parse().ok()?,
        balance: value.trim().parse().ok()?,
    })
}

/// Group points by the UTC hour they fall into and keep the last point written
/// for each bucket (file order wins on ties, not max timestamp), sorted
/// ascending by timestamp.
pub fn bucket_last_per_hour(points: Vec<BalanceHistoryPoint>) -> Vec<BalanceHistoryPoint> {
    let mut last_per_hour: HashMap<i64, BalanceHistoryPoint> = HashMap::new();
    for point in points {
        last_per_hour.insert(point.timestamp - point.timestamp.rem_euclid(HOUR_MS), point);
    }
    let mut out: Vec<_> = last_per_hour.into_values().collect();
    out.sort();
    out
}
