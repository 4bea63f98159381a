//! Drift correction.
//!
//! Compares local playback against the authoritative state projected to
//! reference "now" and picks the gentlest correction that converges: nothing
//! inside the small tolerance, a slight rate change inside the large one, a
//! hard seek beyond it. Play/pause mismatches are binary and corrected
//! immediately.

use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use cowatch_core::{config::SyncConfig, models::PlaybackState};

use crate::clock::ClockHandle;

/// Correction handed to the local playback surface.
///
/// Transient: produced on a tick, applied, never stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CorrectionAction {
    None,
    Seek(f64),
    SetRate(f64),
    Pause,
    Play,
}

/// Per-viewer control loop state.
pub struct DriftCorrector {
    clock: ClockHandle,
    tolerance_small: f64,
    tolerance_large: f64,
    rate_adjust: f64,
    /// Last authoritative state adopted, version-gated
    latest: Option<PlaybackState>,
    /// Whether the surface is currently running at an adjusted rate
    rate_adjusted: bool,
}

impl DriftCorrector {
    #[must_use]
    pub fn new(config: &SyncConfig, clock: ClockHandle) -> Self {
        Self {
            clock,
            tolerance_small: config.tolerance_small_seconds,
            tolerance_large: config.tolerance_large_seconds,
            rate_adjust: config.rate_adjust,
            latest: None,
            rate_adjusted: false,
        }
    }

    /// Adopt a broadcast state.
    ///
    /// The transport may replay a version or deliver after a local refetch
    /// already moved ahead; anything at or below the held version is
    /// ignored. Returns whether the state was adopted.
    pub fn on_remote_state(&mut self, state: PlaybackState) -> bool {
        if let Some(held) = &self.latest {
            if state.version <= held.version {
                trace!(
                    version = state.version,
                    held_version = held.version,
                    "Ignoring stale broadcast"
                );
                return false;
            }
        }
        self.latest = Some(state);
        true
    }

    /// Last authoritative state adopted, if any.
    #[must_use]
    pub fn latest(&self) -> Option<&PlaybackState> {
        self.latest.as_ref()
    }

    /// Sample local playback and pick a correction.
    pub fn on_local_tick(&mut self, local_position: f64, local_playing: bool) -> CorrectionAction {
        self.on_local_tick_at(Utc::now(), local_position, local_playing)
    }

    /// Same as [`DriftCorrector::on_local_tick`], against an explicit local
    /// wall-clock reading.
    pub fn on_local_tick_at(
        &mut self,
        now_local: DateTime<Utc>,
        local_position: f64,
        local_playing: bool,
    ) -> CorrectionAction {
        let Some(state) = self.latest.clone() else {
            return CorrectionAction::None;
        };

        // Binary mismatch: corrected immediately, no tolerance band, no
        // clock involved.
        if local_playing != state.is_playing {
            return if state.is_playing {
                CorrectionAction::Play
            } else {
                CorrectionAction::Pause
            };
        }

        // Position correction only against a trustworthy clock estimate.
        let Some(now_reference) = self.clock.now_reference_at(now_local) else {
            if self.rate_adjusted {
                self.rate_adjusted = false;
                debug!("Clock estimate stale, releasing rate adjustment");
                return CorrectionAction::SetRate(1.0);
            }
            trace!("Clock estimate stale, position correction suspended");
            return CorrectionAction::None;
        };

        let expected = state.expected_position(now_reference);
        let drift = local_position - expected;
        let magnitude = drift.abs();

        if magnitude <= self.tolerance_small {
            if self.rate_adjusted {
                self.rate_adjusted = false;
                debug!(drift, "Drift back inside tolerance, releasing rate adjustment");
                return CorrectionAction::SetRate(1.0);
            }
            CorrectionAction::None
        } else if magnitude <= self.tolerance_large {
            self.rate_adjusted = true;
            let rate = if drift > 0.0 { 1.0 - self.rate_adjust } else { 1.0 + self.rate_adjust };
            trace!(drift, rate, "Rate correction");
            CorrectionAction::SetRate(rate)
        } else {
            self.rate_adjusted = false;
            debug!(drift, to = expected, "Seek correction");
            CorrectionAction::Seek(expected)
        }
    }
}
