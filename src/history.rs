//! Execution-history table: a thread-safe running-stat map keyed by function
//! name, updated on every task resumption/yield/completion.
//!
//! A task caches the interned key (`Arc<str>`) for its history entry rather
//! than looking it up by name on every yield, and all entries live behind
//! one table-wide `Mutex` rather than a lock per entry, since the table is
//! touched rarely enough (once per yield, not once per instruction) that a
//! single lock is not a bottleneck.

use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
struct HistoryStats {
    executions_started: u64,
    completions: u64,
    cumulative_yields: u64,
    mean_cpu_time: Duration,
    mean_yields: f64,
}

/// A snapshot of one function's history, safe to hold without the table
/// lock.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRecord {
    pub function: String,
    pub completions: u64,
    pub executions: u64,
    pub total_yields: u64,
    pub mean_cpu_time: Duration,
    pub mean_yields: f64,
}

impl fmt::Display for HistoryRecord {
    /// One ASCII line, whitespace-separated:
    /// `function completions executions total_yields mean_cpu_us mean_yields`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {:.3}",
            self.function,
            self.completions,
            self.executions,
            self.total_yields,
            self.mean_cpu_time.as_micros(),
            self.mean_yields
        )
    }
}

pub(crate) struct HistoryTable {
    inner: Mutex<HashMap<std::sync::Arc<str>, HistoryStats>>,
}

impl HistoryTable {
    pub fn new() -> Self {
        HistoryTable {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Looks up (or lazily creates) the interned key for `name`. Intended to
    /// be called once per task and the result cached on the `Task`, so a
    /// yield never has to hash the function name again.
    pub fn key_for(&self, name: &str) -> std::sync::Arc<str> {
        let mut guard = self.inner.lock().unwrap();
        if let Some((key, _)) = guard.get_key_value(name) {
            return key.clone();
        }
        let key: std::sync::Arc<str> = std::sync::Arc::from(name);
        guard.insert(key.clone(), HistoryStats::default());
        key
    }

    /// Records that `key`'s task has yielded for the first time in its
    /// lifetime; executions counts task lifetimes, not yields, so this
    /// increments at most once per task.
    pub fn record_execution_start(&self, key: &std::sync::Arc<str>) {
        let mut guard = self.inner.lock().unwrap();
        if let Some(stats) = guard.get_mut(key) {
            stats.executions_started += 1;
        }
    }

    /// Records one yield.
    pub fn record_yield(&self, key: &std::sync::Arc<str>) {
        let mut guard = self.inner.lock().unwrap();
        if let Some(stats) = guard.get_mut(key) {
            stats.cumulative_yields += 1;
        }
    }

    /// Records a completion: Welford-style running-average update of mean
    /// CPU time and mean yield count, plus a completions increment.
    pub fn record_completion(&self, key: &std::sync::Arc<str>, cpu_time: Duration, yields: u64) {
        let mut guard = self.inner.lock().unwrap();
        if let Some(stats) = guard.get_mut(key) {
            stats.completions += 1;
            let n = stats.completions as f64;
            let cpu_delta = cpu_time.as_secs_f64() - stats.mean_cpu_time.as_secs_f64();
            let new_mean_cpu = stats.mean_cpu_time.as_secs_f64() + cpu_delta / n;
            stats.mean_cpu_time = Duration::from_secs_f64(new_mean_cpu.max(0.0));

            let yields_delta = yields as f64 - stats.mean_yields;
            stats.mean_yields += yields_delta / n;
        }
    }

    pub fn snapshot(&self) -> Vec<HistoryRecord> {
        let guard = self.inner.lock().unwrap();
        let mut records: Vec<HistoryRecord> = guard
            .iter()
            .map(|(name, stats)| HistoryRecord {
                function: name.to_string(),
                completions: stats.completions,
                executions: stats.executions_started,
                total_yields: stats.cumulative_yields,
                mean_cpu_time: stats.mean_cpu_time,
                mean_yields: stats.mean_yields,
            })
            .collect();
        records.sort_by(|a, b| a.function.cmp(&b.function));
        records
    }

    /// Emits one line per record, in the `Display` format above.
    pub fn print_records(&self, mut sink: impl Write) -> std::io::Result<()> {
        for record in self.snapshot() {
            writeln!(sink, "{record}")?;
        }
        Ok(())
    }
}
