//! Clock reconciliation.
//!
//! Each viewer estimates its offset from the shared reference clock so that
//! broadcast timestamps can be compared against local playback. The estimate
//! is refreshed by periodic round-trip probes and goes stale when probes stop
//! succeeding; a stale estimate suspends drift correction but never blocks
//! playback itself.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use cowatch_core::{clock::ReferenceClock, config::SyncConfig, models::ViewerId, Error, Result};

/// One round trip to the reference time source.
///
/// The reconciler measures the trip around this call; implementations only
/// need to return what the reference clock read when they asked it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClockProbe: Send + Sync {
    async fn probe(&self) -> Result<DateTime<Utc>>;
}

/// Probe against a reference clock living in the same process.
///
/// Used when the store and the viewer share a process (tests, simulations,
/// single-node deployments); the round trip is then just the call itself.
pub struct InProcessClockProbe {
    clock: Arc<dyn ReferenceClock>,
}

impl InProcessClockProbe {
    #[must_use]
    pub fn new(clock: Arc<dyn ReferenceClock>) -> Self {
        Self { clock }
    }
}

#[async_trait]
impl ClockProbe for InProcessClockProbe {
    async fn probe(&self) -> Result<DateTime<Utc>> {
        Ok(self.clock.now())
    }
}

/// This viewer's running estimate of its clock offset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewerClockEstimate {
    pub viewer_id: ViewerId,
    /// Local clock minus reference clock, in seconds
    pub offset_seconds: f64,
    /// Round trip of the probe that produced (or refreshed) this estimate
    pub round_trip_seconds: f64,
    /// Local wall-clock time of the last successful probe
    pub last_sampled_at: DateTime<Utc>,
}

impl ViewerClockEstimate {
    /// Whether the estimate is too old to correct against, judged at an
    /// explicit local time.
    #[must_use]
    pub fn is_stale_at(&self, now_local: DateTime<Utc>, stale_after: Duration) -> bool {
        now_local - self.last_sampled_at > TimeDelta::milliseconds(stale_after.as_millis() as i64)
    }
}

/// Clock reconciler: owns the offset estimate for one viewer.
pub struct ClockReconciler {
    viewer_id: ViewerId,
    probe: Arc<dyn ClockProbe>,
    config: SyncConfig,
    estimate: Arc<RwLock<Option<ViewerClockEstimate>>>,
}

impl ClockReconciler {
    #[must_use]
    pub fn new(viewer_id: ViewerId, probe: Arc<dyn ClockProbe>, config: SyncConfig) -> Self {
        Self { viewer_id, probe, config, estimate: Arc::new(RwLock::new(None)) }
    }

    /// Read-shared view of the estimate for the drift corrector.
    #[must_use]
    pub fn handle(&self) -> ClockHandle {
        ClockHandle {
            estimate: self.estimate.clone(),
            stale_after: self.config.stale_after(),
        }
    }

    /// One probe round trip folded into the running estimate.
    ///
    /// Probes that time out, fail, or whose round trip exceeds the
    /// configured ceiling are dropped as outliers: the prior estimate stays
    /// in place and simply ages toward staleness.
    pub async fn sample_offset(&self) -> Result<ViewerClockEstimate> {
        let local_send = Utc::now();
        let remote = tokio::time::timeout(self.config.probe_timeout(), self.probe.probe())
            .await
            .map_err(|_| Error::Unavailable("Reference clock probe timed out".to_string()))??;
        let local_recv = Utc::now();

        let round_trip = delta_seconds(local_recv - local_send);
        if round_trip > self.config.rtt_ceiling_seconds() {
            return Err(Error::Unavailable(format!(
                "Probe round trip {round_trip:.3}s above ceiling, sample dropped"
            )));
        }

        // Midpoint assumption under symmetric latency: the reference read
        // corresponds to the local midpoint of the round trip.
        let midpoint = local_send + TimeDelta::microseconds((round_trip * 500_000.0) as i64);
        let raw_offset = delta_seconds(midpoint - remote);

        let mut guard = self.estimate.write();
        let offset_seconds = match guard.as_ref() {
            None => raw_offset,
            Some(prev) => {
                let weight = self.sample_weight(round_trip);
                prev.offset_seconds + weight * (raw_offset - prev.offset_seconds)
            }
        };
        let estimate = ViewerClockEstimate {
            viewer_id: self.viewer_id.clone(),
            offset_seconds,
            round_trip_seconds: round_trip,
            last_sampled_at: local_recv,
        };
        *guard = Some(estimate.clone());
        drop(guard);

        trace!(
            offset_seconds,
            round_trip_seconds = round_trip,
            "Clock offset sampled"
        );
        Ok(estimate)
    }

    /// EWMA weight for a new sample: low-latency probes carry more
    /// confidence, probes near the ceiling barely move the estimate.
    fn sample_weight(&self, round_trip: f64) -> f64 {
        let ceiling = self.config.rtt_ceiling_seconds();
        let confidence = ((ceiling - round_trip) / ceiling).clamp(0.0, 1.0);
        self.config.offset_smoothing * confidence
    }

    /// Probe on a fixed interval until cancelled.
    ///
    /// Failures are logged and otherwise ignored; persistent failure shows
    /// up downstream as a stale estimate.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.probe_interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(viewer_id = %self.viewer_id, "Clock probe loop cancelled");
                    return;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.sample_offset().await {
                        debug!(viewer_id = %self.viewer_id, error = %e, "Clock probe failed");
                    }
                }
            }
        }
    }
}

/// Read-only view of a viewer's clock estimate.
#[derive(Clone)]
pub struct ClockHandle {
    estimate: Arc<RwLock<Option<ViewerClockEstimate>>>,
    stale_after: Duration,
}

impl ClockHandle {
    /// Handle pinned to a fixed estimate (tests and simulations).
    #[must_use]
    pub fn pinned(estimate: ViewerClockEstimate, stale_after: Duration) -> Self {
        Self { estimate: Arc::new(RwLock::new(Some(estimate))), stale_after }
    }

    #[must_use]
    pub fn estimate(&self) -> Option<ViewerClockEstimate> {
        self.estimate.read().clone()
    }

    /// Reference-clock "now" as this viewer best knows it, or `None` while
    /// no fresh estimate exists (correction must suspend).
    #[must_use]
    pub fn now_reference(&self) -> Option<DateTime<Utc>> {
        self.now_reference_at(Utc::now())
    }

    /// Same as [`ClockHandle::now_reference`], judged at an explicit local
    /// wall-clock reading.
    #[must_use]
    pub fn now_reference_at(&self, now_local: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let estimate = self.estimate.read().clone()?;
        if estimate.is_stale_at(now_local, self.stale_after) {
            return None;
        }
        Some(now_local - TimeDelta::microseconds((estimate.offset_seconds * 1_000_000.0) as i64))
    }
}

fn delta_seconds(delta: TimeDelta) -> f64 {
    delta.num_microseconds().map_or_else(
        || delta.num_milliseconds() as f64 / 1000.0,
        |us| us as f64 / 1_000_000.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn config() -> SyncConfig {
        SyncConfig::default()
    }

    fn estimate(offset_seconds: f64, sampled: DateTime<Utc>) -> ViewerClockEstimate {
        ViewerClockEstimate {
            viewer_id: ViewerId::new(),
            offset_seconds,
            round_trip_seconds: 0.05,
            last_sampled_at: sampled,
        }
    }

    /// Probe whose round trip takes a real `delay`.
    struct DelayedProbe {
        delay: std::time::Duration,
    }

    #[async_trait]
    impl ClockProbe for DelayedProbe {
        async fn probe(&self) -> Result<DateTime<Utc>> {
            tokio::time::sleep(self.delay).await;
            Ok(Utc::now())
        }
    }

    #[tokio::test]
    async fn test_sample_offset_midpoint_estimate() {
        // Reference runs 2 s ahead of local: offset (local - reference) = -2
        let mut probe = MockClockProbe::new();
        probe
            .expect_probe()
            .returning(|| Ok(Utc::now() + TimeDelta::seconds(2)));

        let reconciler = ClockReconciler::new(ViewerId::new(), Arc::new(probe), config());
        let estimate = reconciler.sample_offset().await.expect("sample");

        assert!(
            (estimate.offset_seconds + 2.0).abs() < 0.25,
            "offset {} should be close to -2",
            estimate.offset_seconds
        );
        assert!(estimate.round_trip_seconds >= 0.0);
    }

    #[tokio::test]
    async fn test_sample_offset_ewma_damps_jumps() {
        let calls = std::sync::atomic::AtomicU32::new(0);
        let mut probe = MockClockProbe::new();
        probe.expect_probe().returning(move || {
            // First probe: reference 2 s ahead. Later probes: in sync.
            let first = calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0;
            let skew = if first { TimeDelta::seconds(2) } else { TimeDelta::zero() };
            Ok(Utc::now() + skew)
        });

        let reconciler = ClockReconciler::new(ViewerId::new(), Arc::new(probe), config());
        let first = reconciler.sample_offset().await.expect("first sample");
        let second = reconciler.sample_offset().await.expect("second sample");

        // The estimate moves toward zero but keeps most of its history
        // (default smoothing 0.25).
        assert!(first.offset_seconds < -1.75);
        assert!(second.offset_seconds > first.offset_seconds);
        assert!(second.offset_seconds < -1.0);
    }

    #[tokio::test]
    async fn test_round_trip_above_ceiling_is_dropped() {
        let probe = DelayedProbe { delay: std::time::Duration::from_millis(30) };

        let mut cfg = config();
        cfg.rtt_ceiling_ms = 5;
        let reconciler = ClockReconciler::new(ViewerId::new(), Arc::new(probe), cfg);

        let err = reconciler.sample_offset().await.expect_err("outlier dropped");
        assert!(err.is_retryable());
        assert!(reconciler.handle().estimate().is_none(), "outlier never averaged");
    }

    #[tokio::test]
    async fn test_probe_timeout_is_unavailable() {
        let probe = DelayedProbe { delay: std::time::Duration::from_millis(200) };

        let mut cfg = config();
        cfg.probe_timeout_ms = 10;
        let reconciler = ClockReconciler::new(ViewerId::new(), Arc::new(probe), cfg);

        let err = reconciler.sample_offset().await.expect_err("timeout");
        assert!(matches!(err, Error::Unavailable(_)));
    }

    #[test]
    fn test_staleness_window() {
        let sampled = Utc::now();
        let est = estimate(0.5, sampled);
        let stale_after = Duration::from_secs(30);

        assert!(!est.is_stale_at(sampled + TimeDelta::seconds(29), stale_after));
        assert!(est.is_stale_at(sampled + TimeDelta::seconds(31), stale_after));
    }

    #[test]
    fn test_handle_converts_local_to_reference() {
        let sampled = Utc::now();
        // Local runs 2 s ahead of reference
        let handle = ClockHandle::pinned(estimate(2.0, sampled), Duration::from_secs(30));

        let now_local = sampled + TimeDelta::seconds(3);
        let now_reference = handle.now_reference_at(now_local).expect("fresh estimate");
        assert_eq!(now_reference, now_local - TimeDelta::seconds(2));

        // Past the staleness window the conversion refuses
        let much_later = sampled + TimeDelta::seconds(120);
        assert!(handle.now_reference_at(much_later).is_none());
    }
}
