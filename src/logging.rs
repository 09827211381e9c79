//! Session logging
//!
//! One subscriber per process, installed by [`init`]. `RUST_LOG` takes
//! precedence over the level passed in.

use std::time::{Duration, Instant};
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Install a stderr `tracing` subscriber at `level`.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init(level: Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_ascii_lowercase()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Scope timer: logs the elapsed wall time when dropped.
///
/// ```rust
/// use surrogate_db::logging::TimingLog;
///
/// {
///     let _timer = TimingLog::new("fit meta-model");
///     // ... long running step ...
/// }
/// ```
#[derive(Debug)]
pub struct TimingLog {
    label: String,
    started: Instant,
}

impl TimingLog {
    /// Start timing `label`.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        let label = label.into();
        tracing::info!(step = %label, "started");
        Self {
            label,
            started: Instant::now(),
        }
    }

    /// Time elapsed so far.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Drop for TimingLog {
    fn drop(&mut self) {
        let elapsed = self.started.elapsed();
        tracing::info!(
            step = %self.label,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        init(Level::INFO);
        init(Level::DEBUG);
    }

    #[test]
    fn test_timing_log_elapsed_monotonic() {
        let timer = TimingLog::new("unit");
        let first = timer.elapsed();
        let second = timer.elapsed();
        assert!(second >= first);
    }
}
