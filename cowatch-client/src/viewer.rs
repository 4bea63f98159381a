//! Per-viewer synchronization runtime.
//!
//! Consumes state broadcasts, runs the local sampling tick, keeps the clock
//! probe loop alive, and reconciles with a full state fetch whenever the
//! transport loses continuity. Leaving cancels everything; an in-flight
//! proposal is allowed to complete on the store side and its result is
//! simply discarded here.

use std::sync::Arc;

use rand::RngExt;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use cowatch_core::{
    config::SyncConfig,
    models::{PlaybackProposal, PlaybackState, ProposalOutcome, SessionId, ViewerId},
    service::PlaybackService,
    transport::SessionHub,
    Error, Result,
};

use crate::{
    clock::{ClockProbe, ClockReconciler},
    drift::{CorrectionAction, DriftCorrector},
};

/// Local playback surface the sync loop drives.
///
/// Implemented by whatever renders the video. The loop only reads the
/// current transport position and play state, and hands over corrections;
/// it never blocks playback.
pub trait PlaybackSurface: Send + Sync {
    fn position_seconds(&self) -> f64;
    fn is_playing(&self) -> bool;
    fn apply(&self, action: CorrectionAction);
}

/// One viewer's synchronization session.
pub struct ViewerSync {
    session_id: SessionId,
    viewer_id: ViewerId,
    playback: PlaybackService,
    hub: Arc<SessionHub>,
    surface: Arc<dyn PlaybackSurface>,
    reconciler: Arc<ClockReconciler>,
    config: SyncConfig,
    cancel: CancellationToken,
}

impl ViewerSync {
    /// Attempts before a proposal gives up re-deriving against conflicts
    const MAX_PROPOSAL_ATTEMPTS: u32 = 3;
    /// Base delay for the proposal retry backoff (milliseconds)
    const BACKOFF_BASE_MS: u64 = 5;

    #[must_use]
    pub fn new(
        session_id: SessionId,
        viewer_id: ViewerId,
        playback: PlaybackService,
        hub: Arc<SessionHub>,
        surface: Arc<dyn PlaybackSurface>,
        probe: Arc<dyn ClockProbe>,
        config: SyncConfig,
    ) -> Self {
        let reconciler =
            Arc::new(ClockReconciler::new(viewer_id.clone(), probe, config.clone()));
        Self {
            session_id,
            viewer_id,
            playback,
            hub,
            surface,
            reconciler,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop the sync loops and unsubscribe.
    pub fn leave(&self) {
        self.cancel.cancel();
    }

    /// Drive synchronization until [`ViewerSync::leave`] is called or the
    /// session's channel closes.
    pub async fn run(&self) -> Result<()> {
        // Prime the clock estimate; playback never waits for it.
        if let Err(e) = self.reconciler.sample_offset().await {
            debug!(viewer_id = %self.viewer_id, error = %e, "Initial clock probe failed");
        }
        let reconciler = self.reconciler.clone();
        let probe_cancel = self.cancel.child_token();
        let probe_task = tokio::spawn(async move { reconciler.run(probe_cancel).await });

        let mut corrector = DriftCorrector::new(&self.config, self.reconciler.handle());

        // Subscribe first, then fetch: broadcasts from here on plus one full
        // read cover the gap with no version regression.
        let mut updates = self.hub.subscribe(&self.session_id);
        self.refetch(&mut corrector).await;

        let mut tick = tokio::time::interval(self.config.local_tick_interval());
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(
            session_id = %self.session_id,
            viewer_id = %self.viewer_id,
            "Sync loop started"
        );

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!(viewer_id = %self.viewer_id, "Sync loop cancelled");
                    break;
                }
                received = updates.recv() => match received {
                    Ok(state) => {
                        if corrector.on_remote_state(state) {
                            self.correct(&mut corrector);
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        // The channel dropped history on us; reconcile from
                        // the authoritative state instead of replaying it,
                        // and refresh the clock estimate while at it.
                        warn!(
                            viewer_id = %self.viewer_id,
                            missed,
                            "Broadcast stream lagged, refetching state"
                        );
                        if let Err(e) = self.reconciler.sample_offset().await {
                            debug!(viewer_id = %self.viewer_id, error = %e, "Clock resample failed");
                        }
                        self.refetch(&mut corrector).await;
                    }
                    Err(RecvError::Closed) => {
                        debug!(viewer_id = %self.viewer_id, "Session channel closed");
                        break;
                    }
                },
                _ = tick.tick() => {
                    self.correct(&mut corrector);
                }
            }
        }

        self.cancel.cancel();
        let _ = probe_task.await;

        info!(
            session_id = %self.session_id,
            viewer_id = %self.viewer_id,
            "Sync loop stopped"
        );
        Ok(())
    }

    /// Propose a playback change, re-deriving the expected version from the
    /// returned authoritative state when rejected.
    ///
    /// The intent itself (target play state and position) is preserved
    /// across attempts; nothing is merged silently. Gives up with
    /// `OptimisticLockConflict` if the session stays contended.
    pub async fn propose(&self, proposal: PlaybackProposal) -> Result<PlaybackState> {
        let mut expected_version =
            self.playback.get_current(&self.session_id).await?.version;

        for attempt in 0..Self::MAX_PROPOSAL_ATTEMPTS {
            let outcome = self
                .playback
                .propose(&self.session_id, &self.viewer_id, proposal, expected_version)
                .await?;

            match outcome {
                ProposalOutcome::Accepted(state) => return Ok(state),
                ProposalOutcome::Rejected(current) => {
                    debug!(
                        viewer_id = %self.viewer_id,
                        expected_version,
                        current_version = current.version,
                        attempt = attempt + 1,
                        "Proposal rejected, re-deriving"
                    );
                    expected_version = current.version;

                    if attempt + 1 < Self::MAX_PROPOSAL_ATTEMPTS {
                        let backoff = Self::BACKOFF_BASE_MS * (1 << attempt);
                        let jitter = rand::rng().random_range(0..Self::BACKOFF_BASE_MS);
                        tokio::time::sleep(std::time::Duration::from_millis(backoff + jitter))
                            .await;
                    }
                }
            }
        }

        Err(Error::OptimisticLockConflict)
    }

    fn correct(&self, corrector: &mut DriftCorrector) {
        let action = corrector
            .on_local_tick(self.surface.position_seconds(), self.surface.is_playing());
        if action != CorrectionAction::None {
            self.surface.apply(action);
        }
    }

    /// Full state reconciliation: read the authoritative state and correct
    /// against it. Failure keeps the last known state; the corrector keeps
    /// projecting from it until the store is reachable again.
    async fn refetch(&self, corrector: &mut DriftCorrector) {
        match self.playback.get_current(&self.session_id).await {
            Ok(state) => {
                corrector.on_remote_state(state);
                self.correct(corrector);
            }
            Err(e) => {
                debug!(
                    session_id = %self.session_id,
                    error = %e,
                    "State refetch failed, projecting from last known state"
                );
            }
        }
    }
}
