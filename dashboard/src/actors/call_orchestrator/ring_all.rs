//! Ring-All Sequencer
//!
//! A session rings every reachable child once, one at a time, with a fixed
//! gap between attempts. The session itself is bounded by wall time: it
//! ends when its expiry fires or when the guardian cancels, whether or not
//! the dispatch loop is still running.
//!
//! Cancellation only ends the session bookkeeping. Calls already handed to
//! the transport are left alone, and the dispatch loop still gives every
//! snapshotted recipient its one attempt.

use chrono::{DateTime, Utc};
use ractor::ActorRef;
use shared_types::{CallMode, CallRequest, Recipient, RingAllPhase, RingAllStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::initiator::CallInitiator;
use super::protocol::CallOrchestratorMsg;

/// Hard bound on a ring-all session
pub const RING_ALL_WINDOW: Duration = Duration::from_secs(10);

/// Gap between consecutive attempts within a session
pub const RING_ALL_PACING: Duration = Duration::from_secs(1);

/// Exclusive right to run a ring-all session.
///
/// One permit per dashboard. The active session owns the permit and
/// releases it when dropped.
#[derive(Debug, Clone)]
pub struct CallSlot {
    permits: Arc<Semaphore>,
}

impl Default for CallSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl CallSlot {
    pub fn new() -> Self {
        Self {
            permits: Arc::new(Semaphore::new(1)),
        }
    }

    /// Non-blocking; `None` when another session holds the slot
    pub fn try_claim(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.permits).try_acquire_owned().ok()
    }
}

/// A cancellable scheduled task with an explicit handle
#[derive(Debug)]
pub struct ScheduledExpiry {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl ScheduledExpiry {
    /// Run `on_fire` after `delay` unless cancelled first
    pub fn schedule<F>(delay: Duration, on_fire: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => on_fire(),
            }
        });
        Self { cancel, handle }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for ScheduledExpiry {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// The active broadcast. Existence of this value is what "active" means:
/// it cannot exist without its expiry handle and call-slot permit.
#[derive(Debug)]
pub struct RingAllSession {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    expiry: ScheduledExpiry,
    _permit: OwnedSemaphorePermit,
}

impl RingAllSession {
    /// Open a session and schedule its expiry message to `myself`
    pub fn open(permit: OwnedSemaphorePermit, myself: ActorRef<CallOrchestratorMsg>) -> Self {
        let session_id = ulid::Ulid::new().to_string();
        let started_at = Utc::now();
        let expires_at = started_at
            + chrono::Duration::from_std(RING_ALL_WINDOW).unwrap_or(chrono::Duration::seconds(10));

        let expired_id = session_id.clone();
        let expiry = ScheduledExpiry::schedule(RING_ALL_WINDOW, move || {
            if let Err(e) = myself.cast(CallOrchestratorMsg::RingAllExpired {
                session_id: expired_id.clone(),
            }) {
                tracing::debug!(session_id = %expired_id, error = %e, "Expiry fired after orchestrator stopped");
            }
        });

        Self {
            session_id,
            started_at,
            expires_at,
            expiry,
            _permit: permit,
        }
    }

    /// Stop the pending expiry; the session is dropped by the caller
    pub fn cancel(self) {
        self.expiry.cancel();
    }

    pub fn status(&self) -> RingAllStatus {
        RingAllStatus {
            phase: RingAllPhase::Active,
            session_id: Some(self.session_id.clone()),
            started_at: Some(self.started_at),
            expires_at: Some(self.expires_at),
        }
    }
}

/// Dispatch loop of one session.
///
/// Voice-calls each recipient in order through the initiator, reporting
/// each outcome to the actor, and sleeps the pacing gap between attempts
/// whatever the outcome. Stops early only if the actor is gone.
pub async fn run_ring_sequence(
    initiator: CallInitiator,
    recipients: Vec<Recipient>,
    session_id: String,
    myself: ActorRef<CallOrchestratorMsg>,
) {
    let total = recipients.len();
    for (index, recipient) in recipients.into_iter().enumerate() {
        if index > 0 {
            tokio::time::sleep(RING_ALL_PACING).await;
        }

        let request = CallRequest {
            recipient_id: recipient.id.clone(),
            mode: CallMode::Voice,
        };
        let result = initiator.initiate(&request).await;

        if myself
            .cast(CallOrchestratorMsg::RingAttemptSettled {
                session_id: session_id.clone(),
                recipient_id: recipient.id,
                result,
            })
            .is_err()
        {
            tracing::warn!(session_id = %session_id, "Orchestrator stopped; abandoning ring-all loop");
            return;
        }
    }
    tracing::debug!(session_id = %session_id, attempts = total, "Ring-all dispatch loop finished");
}
