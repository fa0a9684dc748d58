use std::collections::VecDeque;
use std::time::{Duration, Instant};
use sysinfo::System;
use tracing::info;

/// Retained stats entries; older entries are dropped
const CAPACITY: usize = 32;

/// One measured operation
#[derive(Debug, Clone)]
pub struct OpStat {
    pub operation: &'static str,
    pub duration: Duration,
    /// Resident-set change over the operation, in bytes (negative = freed)
    pub memory_delta: i64,
}

/// Bounded ring of recent operation measurements
#[derive(Debug, Default)]
pub struct PerfStats {
    entries: VecDeque<OpStat>,
}

impl PerfStats {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(CAPACITY),
        }
    }

    /// Run `f`, recording its duration and resident-memory delta.
    pub fn measure<T>(&mut self, operation: &'static str, f: impl FnOnce() -> T) -> T {
        let rss_before = current_rss();
        let start = Instant::now();

        let result = f();

        let duration = start.elapsed();
        let memory_delta = match (rss_before, current_rss()) {
            (Some(before), Some(after)) => after as i64 - before as i64,
            _ => 0,
        };

        info!(
            operation,
            duration_ms = duration.as_millis(),
            memory_delta_kb = memory_delta / 1024,
            "operation measured"
        );

        if self.entries.len() == CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(OpStat {
            operation,
            duration,
            memory_delta,
        });

        result
    }

    /// Mean duration across recorded entries for `operation`
    #[must_use]
    pub fn average_duration(&self, operation: &str) -> Option<Duration> {
        let matching: Vec<&OpStat> = self
            .entries
            .iter()
            .filter(|s| s.operation == operation)
            .collect();
        if matching.is_empty() {
            return None;
        }
        let total: Duration = matching.iter().map(|s| s.duration).sum();
        Some(total / matching.len() as u32)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn current_rss() -> Option<u64> {
    let pid = sysinfo::get_current_pid().ok()?;
    let mut sys = System::new();
    if !sys.refresh_process(pid) {
        return None;
    }
    sys.process(pid).map(sysinfo::Process::memory)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measure_returns_closure_result() {
        let mut stats = PerfStats::new();
        let value = stats.measure("test_op", || 41 + 1);
        assert_eq!(value, 42);
        assert_eq!(stats.len(), 1);
    }

    #[test]
    fn test_ring_is_bounded() {
        let mut stats = PerfStats::new();
        for _ in 0..(CAPACITY + 10) {
            stats.measure("spin", || ());
        }
        assert_eq!(stats.len(), CAPACITY);
    }

    #[test]
    fn test_average_duration_filters_by_operation() {
        let mut stats = PerfStats::new();
        stats.measure("a", || std::thread::sleep(Duration::from_millis(1)));
        stats.measure("b", || ());

        assert!(stats.average_duration("a").is_some());
        assert!(stats.average_duration("missing").is_none());
    }

    #[test]
    fn test_empty_stats() {
        let stats = PerfStats::new();
        assert!(stats.is_empty());
        assert!(stats.average_duration("anything").is_none());
    }
}
