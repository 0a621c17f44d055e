//! Fixed-interval keep-alive scheduler for liqi sessions.
//!
//! The game gateway drops sockets that stay silent, so a live session
//! pings it (`FastTest.checkNetworkDelay`) on a fixed interval. The
//! ping carries no state: it runs beside the inbound stream, never
//! touches the table, and must stop the moment its socket closes so a
//! reconnect does not leave the old loop running.
//!
//! # Integration
//!
//! Either drive a [`HeartbeatScheduler`] from your own `select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         reason = &mut closed => break,
//!         beat = scheduler.wait_for_beat() => {
//!             if agent.send_request("FastTest", "checkNetworkDelay", &json!({})).await.is_err() {
//!                 scheduler.record_failure();
//!             }
//!         }
//!     }
//! }
//! ```
//!
//! or hand the beat and the stop signal to [`spawn_heartbeat`].

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Keep-alive timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatConfig {
    /// Time between beats. Default: 2 seconds.
    pub interval: Duration,
    /// Upper bound of the random delay added before the first beat.
    /// Default: zero.
    pub initial_jitter: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            initial_jitter: Duration::ZERO,
        }
    }
}

impl HeartbeatConfig {
    /// Shortest interval the scheduler accepts.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(100);

    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    pub fn with_initial_jitter(mut self, jitter: Duration) -> Self {
        self.initial_jitter = jitter;
        self
    }

    /// Raises an interval below [`Self::MIN_INTERVAL`] to the minimum.
    ///
    /// Called automatically by [`HeartbeatScheduler::new`].
    pub fn validated(mut self) -> Self {
        if self.interval < Self::MIN_INTERVAL {
            warn!(
                interval_ms = self.interval.as_millis() as u64,
                min_ms = Self::MIN_INTERVAL.as_millis() as u64,
                "heartbeat interval below minimum, clamping"
            );
            self.interval = Self::MIN_INTERVAL;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Beat info and metrics
// ---------------------------------------------------------------------------

/// Returned by [`HeartbeatScheduler::wait_for_beat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeatInfo {
    /// Beat number, starting at 1.
    pub beat: u64,
    /// The scheduler woke up more than a tenth of an interval late.
    pub late: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeartbeatMetrics {
    pub total_beats: u64,
    pub late_beats: u64,
    /// Beats whose ping reported an error.
    pub failed_beats: u64,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Fires one beat per interval. Late beats do not queue up: the next
/// beat is always scheduled a full interval after the one that fired.
pub struct HeartbeatScheduler {
    interval: Duration,
    next_beat: Instant,
    beat_count: u64,
    metrics: HeartbeatMetrics,
}

impl HeartbeatScheduler {
    pub fn new(config: HeartbeatConfig) -> Self {
        let config = config.validated();
        let jitter = if config.initial_jitter.is_zero() {
            Duration::ZERO
        } else {
            let max = config.initial_jitter.as_micros() as u64;
            Duration::from_micros(rand::rng().random_range(0..=max))
        };
        debug!(
            interval_ms = config.interval.as_millis() as u64,
            jitter_us = jitter.as_micros() as u64,
            "heartbeat scheduler created"
        );
        Self {
            interval: config.interval,
            next_beat: Instant::now() + config.interval + jitter,
            beat_count: 0,
            metrics: HeartbeatMetrics::default(),
        }
    }

    /// Waits until the next beat is due.
    ///
    /// Cancel-safe: dropping the future before it resolves leaves the
    /// schedule untouched.
    pub async fn wait_for_beat(&mut self) -> BeatInfo {
        let due = self.next_beat;
        time::sleep_until(due).await;

        let now = Instant::now();
        let late = now.saturating_duration_since(due) > self.interval / 10;
        self.beat_count += 1;
        self.next_beat = now + self.interval;

        self.metrics.total_beats += 1;
        if late {
            self.metrics.late_beats += 1;
        }
        trace!(beat = self.beat_count, late, "heartbeat");

        BeatInfo {
            beat: self.beat_count,
            late,
        }
    }

    /// Counts a beat whose ping failed.
    pub fn record_failure(&mut self) {
        self.metrics.failed_beats += 1;
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn beat_count(&self) -> u64 {
        self.beat_count
    }

    pub fn metrics(&self) -> &HeartbeatMetrics {
        &self.metrics
    }
}

// ---------------------------------------------------------------------------
// Spawned loop
// ---------------------------------------------------------------------------

/// Runs `beat` once per interval on a new task until `stop` resolves.
///
/// `stop` is also raced against an in-flight beat, so a ping that never
/// gets its reply does not outlive the socket. The task returns its
/// metrics when it ends.
pub fn spawn_heartbeat<F, Fut, E, S>(
    config: HeartbeatConfig,
    mut beat: F,
    stop: S,
) -> JoinHandle<HeartbeatMetrics>
where
    F: FnMut(u64) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), E>> + Send,
    E: Display,
    S: Future + Send + 'static,
    S::Output: Send,
{
    tokio::spawn(async move {
        tokio::pin!(stop);
        let mut scheduler = HeartbeatScheduler::new(config);
        loop {
            tokio::select! {
                _ = &mut stop => break,
                info = scheduler.wait_for_beat() => {
                    tokio::select! {
                        _ = &mut stop => break,
                        result = beat(info.beat) => {
                            if let Err(e) = result {
                                scheduler.record_failure();
                                debug!(beat = info.beat, error = %e, "heartbeat ping failed");
                            }
                        }
                    }
                }
            }
        }
        debug!(beats = scheduler.beat_count(), "heartbeat stopped");
        scheduler.metrics().clone()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_two_second_interval() {
        let cfg = HeartbeatConfig::default();
        assert_eq!(cfg.interval, Duration::from_secs(2));
        assert_eq!(cfg.initial_jitter, Duration::ZERO);
    }

    #[test]
    fn test_validated_zero_interval_clamps_to_minimum() {
        let cfg = HeartbeatConfig::with_interval(Duration::ZERO).validated();
        assert_eq!(cfg.interval, HeartbeatConfig::MIN_INTERVAL);
    }

    #[test]
    fn test_validated_normal_interval_unchanged() {
        let cfg = HeartbeatConfig::with_interval(Duration::from_secs(5)).validated();
        assert_eq!(cfg.interval, Duration::from_secs(5));
    }
}
