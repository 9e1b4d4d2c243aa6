//! Task diagnostics: timing and cache behavior for each page.
//!
//! Every task run collects a [`TaskDiagnostics`] record alongside its
//! result. Time is read through the [`Clock`] trait so tests can inject
//! a deterministic clock.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::fmt;
use std::fmt::Write;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::types::PageId;

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Same as [`duration_serde`] for optional durations.
mod option_duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        duration: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        duration.map(|d| d.as_secs_f64()).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<f64>::deserialize(deserializer)?
            .map(|secs| {
                Duration::try_from_secs_f64(secs).map_err(|_| {
                    serde::de::Error::custom(
                        "duration seconds must be finite, non-negative, and representable as a Duration",
                    )
                })
            })
            .transpose()
    }
}

/// Source of monotonic time.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// Current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// [`Clock`] backed by [`std::time::Instant`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// How a task resolved its page's content box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheOutcome {
    /// Stored result matched the fresh dependency key.
    Reused,
    /// Stored manual result kept its rectangle under a fresh key.
    Refreshed,
    /// Analyzer ran and a new automatic result was stored.
    Recomputed,
}

impl fmt::Display for CacheOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reused => f.write_str("reused"),
            Self::Refreshed => f.write_str("refreshed"),
            Self::Recomputed => f.write_str("recomputed"),
        }
    }
}

/// Diagnostics for one task run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDiagnostics {
    /// The page the task ran for.
    pub page: PageId,
    /// How the content box was resolved.
    pub outcome: CacheOutcome,
    /// Settings lookup plus dependency key derivation.
    #[serde(with = "duration_serde")]
    pub lookup: Duration,
    /// Analyzer run time (`None` when the analyzer was not invoked).
    #[serde(with = "option_duration_serde")]
    pub analysis: Option<Duration>,
    /// Wall-clock duration of the whole task.
    #[serde(with = "duration_serde")]
    pub total: Duration,
    /// SipHash fingerprint of the fresh dependency key.
    pub dependency_fingerprint: u64,
}

/// Diagnostics for a batch of tasks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchDiagnostics {
    /// One record per completed task, in completion order.
    pub tasks: Vec<TaskDiagnostics>,
}

impl BatchDiagnostics {
    /// Number of tasks with the given outcome.
    #[must_use]
    pub fn count(&self, outcome: CacheOutcome) -> usize {
        self.tasks.iter().filter(|t| t.outcome == outcome).count()
    }

    /// Sum of all analyzer durations.
    #[must_use]
    pub fn total_analysis(&self) -> Duration {
        self.tasks.iter().filter_map(|t| t.analysis).sum()
    }

    /// Format a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut s = String::new();
        let _ = writeln!(
            s,
            "{:<40} {:<11} {:>11} {:>13} {:>11}  {}",
            "Page", "Outcome", "Lookup (ms)", "Analysis (ms)", "Total (ms)", "Deps"
        );
        let _ = writeln!(s, "{}", "-".repeat(108));
        for t in &self.tasks {
            let analysis = t
                .analysis
                .map_or_else(|| "-".to_string(), |d| format!("{:.3}", duration_ms(d)));
            let _ = writeln!(
                s,
                "{:<40} {:<11} {:>11.3} {:>13} {:>11.3}  {:016x}",
                t.page.to_string(),
                t.outcome.to_string(),
                duration_ms(t.lookup),
                analysis,
                duration_ms(t.total),
                t.dependency_fingerprint,
            );
        }
        let _ = writeln!(s, "{}", "-".repeat(108));
        let _ = writeln!(
            s,
            "{} tasks: {} reused, {} refreshed, {} recomputed; analysis {:.3}ms",
            self.tasks.len(),
            self.count(CacheOutcome::Reused),
            self.count(CacheOutcome::Refreshed),
            self.count(CacheOutcome::Recomputed),
            duration_ms(self.total_analysis()),
        );
        s
    }
}

/// Convert a `Duration` to fractional milliseconds.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn record(name: &str, outcome: CacheOutcome, analysis_ms: Option<u64>) -> TaskDiagnostics {
        TaskDiagnostics {
            page: PageId::single(name),
            outcome,
            lookup: Duration::from_micros(20),
            analysis: analysis_ms.map(Duration::from_millis),
            total: Duration::from_millis(analysis_ms.unwrap_or(0) + 1),
            dependency_fingerprint: 0xdead_beef,
        }
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let d = Duration::from_micros(1500);
        assert!((duration_ms(d) - 1.5).abs() < 1e-9);
    }

    #[test]
    fn outcome_display() {
        assert_eq!(CacheOutcome::Reused.to_string(), "reused");
        assert_eq!(CacheOutcome::Refreshed.to_string(), "refreshed");
        assert_eq!(CacheOutcome::Recomputed.to_string(), "recomputed");
    }

    #[test]
    fn batch_counts_and_sums() {
        let batch = BatchDiagnostics {
            tasks: vec![
                record("a", CacheOutcome::Recomputed, Some(5)),
                record("b", CacheOutcome::Reused, None),
                record("c", CacheOutcome::Recomputed, Some(7)),
            ],
        };
        assert_eq!(batch.count(CacheOutcome::Recomputed), 2);
        assert_eq!(batch.count(CacheOutcome::Reused), 1);
        assert_eq!(batch.count(CacheOutcome::Refreshed), 0);
        assert_eq!(batch.total_analysis(), Duration::from_millis(12));
    }

    #[test]
    fn report_produces_nonempty_string() {
        let batch = BatchDiagnostics {
            tasks: vec![
                record("a.png", CacheOutcome::Recomputed, Some(5)),
                record("b.png", CacheOutcome::Reused, None),
            ],
        };
        let report = batch.report();
        assert!(report.contains("a.png#0"));
        assert!(report.contains("recomputed"));
        assert!(report.contains("00000000deadbeef"));
        assert!(report.contains("2 tasks: 1 reused, 0 refreshed, 1 recomputed"));
    }

    #[test]
    fn diagnostics_serialize_durations_as_seconds() {
        let json = serde_json::to_value(record("a", CacheOutcome::Reused, None)).unwrap();
        assert!((json["lookup"].as_f64().unwrap() - 0.000_02).abs() < 1e-12);
        assert!(json["analysis"].is_null());

        let back: TaskDiagnostics = serde_json::from_value(json).unwrap();
        assert_eq!(back.outcome, CacheOutcome::Reused);
        assert_eq!(back.analysis, None);
    }

    #[test]
    fn negative_duration_is_rejected() {
        let mut json = serde_json::to_value(record("a", CacheOutcome::Reused, Some(1))).unwrap();
        json["analysis"] = serde_json::json!(-1.0);
        assert!(serde_json::from_value::<TaskDiagnostics>(json).is_err());
    }
}
