//! CallOrchestratorActor - owns every piece of dashboard call state
//!
//! All transitions happen inside `handle`, one message at a time. Work
//! that waits on the transport runs in spawned tasks that report back with
//! a cast, so a cancel or a snapshot request is never stuck behind a call
//! that is still being placed.

use async_trait::async_trait;
use chrono::Utc;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use shared_types::{
    AttemptOutcome, CallRequest, CapabilityResult, DashboardSnapshot, DashboardView, Family,
    IncomingCallNotice, RemediationSurface, RingAllStatus, RingAttempt, TransportStatus,
};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::initiator::CallInitiator;
use super::protocol::{
    ActiveCall, CallError, CallOrchestratorMsg, IncomingError, RingAllOutcome, RingAllRejection,
};
use super::ring_all::{run_ring_sequence, CallSlot, RingAllSession};
use crate::capability::{CapabilityGate, EnvironmentProbe};
use crate::transport::{CallTransport, TransportError};

/// Actor that orchestrates calls for one dashboard
#[derive(Debug, Default)]
pub struct CallOrchestratorActor;

/// Arguments for spawning CallOrchestratorActor
#[derive(Clone)]
pub struct CallOrchestratorArguments {
    pub gate: CapabilityGate,
    pub probe: Arc<dyn EnvironmentProbe>,
    pub transport: Arc<dyn CallTransport>,
    pub call_slot: CallSlot,
}

/// State for CallOrchestratorActor
pub struct CallOrchestratorState {
    initiator: CallInitiator,
    call_slot: CallSlot,
    session: Option<RingAllSession>,
    ring_attempts: Vec<RingAttempt>,
    view: DashboardView,
    incoming: Option<IncomingCallNotice>,
    /// Rejected locally while the transport may still advertise it
    dismissed_notice: Option<IncomingCallNotice>,
    last_capability: Option<CapabilityResult>,
    remediation: Option<RemediationSurface>,
    notice: Option<String>,
    transport_status: TransportStatus,
    /// Subscribed in `pre_start`, handed to the forwarder in `post_start`
    transport_rx: Option<watch::Receiver<TransportStatus>>,
    transport_watch: Option<JoinHandle<()>>,
}

impl CallOrchestratorState {
    fn record_capability(&mut self, result: CapabilityResult) {
        self.last_capability = Some(result);
        self.remediation = RemediationSurface::for_result(result);
    }

    fn snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            view: self.view.clone(),
            ring_all: self
                .session
                .as_ref()
                .map(RingAllSession::status)
                .unwrap_or_else(RingAllStatus::idle),
            ring_attempts: self.ring_attempts.clone(),
            incoming: self.incoming.clone(),
            last_capability: self.last_capability,
            remediation: self.remediation.clone(),
            notice: self.notice.clone(),
            transport: self.initiator.transport().status(),
        }
    }
}

// ============================================================================
// Actor Implementation
// ============================================================================

#[async_trait]
impl Actor for CallOrchestratorActor {
    type Msg = CallOrchestratorMsg;
    type State = CallOrchestratorState;
    type Arguments = CallOrchestratorArguments;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!(actor_id = %myself.get_id(), "CallOrchestratorActor starting");

        // Subscribe before reading so a change published before post_start
        // is still seen by the forwarder.
        let mut transport_rx = args.transport.subscribe();
        let transport_status = transport_rx.borrow_and_update().clone();
        Ok(CallOrchestratorState {
            initiator: CallInitiator::new(args.gate, args.probe, args.transport),
            call_slot: args.call_slot,
            session: None,
            ring_attempts: Vec::new(),
            view: DashboardView::Home,
            incoming: transport_status.incoming_notice.clone(),
            dismissed_notice: None,
            last_capability: None,
            remediation: None,
            notice: None,
            transport_status,
            transport_rx: Some(transport_rx),
            transport_watch: None,
        })
    }

    async fn post_start(
        &self,
        myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        if let Some(mut rx) = state.transport_rx.take() {
            let me = myself.clone();
            state.transport_watch = Some(tokio::spawn(async move {
                while rx.changed().await.is_ok() {
                    let status = rx.borrow_and_update().clone();
                    if me.cast(CallOrchestratorMsg::TransportUpdated(status)).is_err() {
                        break;
                    }
                }
            }));
        }

        tracing::info!(actor_id = %myself.get_id(), "CallOrchestratorActor started successfully");
        Ok(())
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            CallOrchestratorMsg::CheckCapability { reply } => {
                let result = state.initiator.check_capability().await;
                state.record_capability(result);
                let _ = reply.send(result);
            }
            CallOrchestratorMsg::StartCall { request, reply } => {
                self.handle_start_call(myself, request, reply, state);
            }
            CallOrchestratorMsg::CallSettled {
                request,
                result,
                reply,
            } => {
                self.handle_call_settled(&request, &result, state);
                let _ = reply.send(result);
            }
            CallOrchestratorMsg::EndCall { reply } => {
                let transport = Arc::clone(state.initiator.transport());
                tokio::spawn(async move {
                    transport.end_active_call().await;
                    if myself
                        .cast(CallOrchestratorMsg::EndSettled { reply })
                        .is_err()
                    {
                        tracing::warn!("Orchestrator stopped before hang-up was applied");
                    }
                });
            }
            CallOrchestratorMsg::EndSettled { reply } => {
                state.view = DashboardView::Home;
                tracing::info!("Active call ended from dashboard");
                let _ = reply.send(());
            }
            CallOrchestratorMsg::StartRingAll { family, reply } => {
                let outcome = self.handle_start_ring_all(myself, family, state);
                let _ = reply.send(outcome);
            }
            CallOrchestratorMsg::CancelRingAll { reply } => {
                let _ = reply.send(self.handle_cancel_ring_all(state));
            }
            CallOrchestratorMsg::RingAttemptSettled {
                session_id,
                recipient_id,
                result,
            } => {
                self.handle_ring_attempt_settled(session_id, recipient_id, result, state);
            }
            CallOrchestratorMsg::RingAllExpired { session_id } => {
                self.handle_ring_all_expired(&session_id, state);
            }
            CallOrchestratorMsg::AcceptIncoming { reply } => {
                self.handle_accept_incoming(myself, reply, state);
            }
            CallOrchestratorMsg::AcceptSettled {
                notice,
                result,
                reply,
            } => {
                let _ = reply.send(self.handle_accept_settled(notice, result, state));
            }
            CallOrchestratorMsg::RejectIncoming { reply } => {
                let _ = reply.send(self.handle_reject_incoming(state));
            }
            CallOrchestratorMsg::TransportUpdated(status) => {
                self.handle_transport_updated(status, state);
            }
            CallOrchestratorMsg::GetSnapshot { reply } => {
                let _ = reply.send(state.snapshot());
            }
        }
        Ok(())
    }

    async fn post_stop(
        &self,
        myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        if let Some(watch) = state.transport_watch.take() {
            watch.abort();
        }
        if let Some(session) = state.session.take() {
            session.cancel();
        }
        tracing::info!(actor_id = %myself.get_id(), "CallOrchestratorActor stopped");
        Ok(())
    }
}

// ============================================================================
// Message Handlers
// ============================================================================

impl CallOrchestratorActor {
    fn handle_start_call(
        &self,
        myself: ActorRef<CallOrchestratorMsg>,
        request: CallRequest,
        reply: RpcReplyPort<Result<ActiveCall, CallError>>,
        state: &CallOrchestratorState,
    ) {
        let initiator = state.initiator.clone();
        tokio::spawn(async move {
            let result = initiator.initiate(&request).await;
            if myself
                .cast(CallOrchestratorMsg::CallSettled {
                    request,
                    result,
                    reply,
                })
                .is_err()
            {
                tracing::warn!("Orchestrator stopped before call result was applied");
            }
        });
    }

    fn handle_call_settled(
        &self,
        request: &CallRequest,
        result: &Result<ActiveCall, CallError>,
        state: &mut CallOrchestratorState,
    ) {
        match result {
            Ok(call) => {
                state.record_capability(CapabilityResult::Ok);
                state.notice = None;
                state.view = DashboardView::ActiveCall {
                    mode: call.mode,
                    peer_id: call.peer_id.clone(),
                };
            }
            Err(CallError::Capability(e)) => {
                tracing::warn!(
                    recipient_id = %request.recipient_id,
                    mode = %request.mode,
                    reason = %e,
                    "Call blocked by capability gate"
                );
                state.record_capability(e.result());
            }
            Err(CallError::Initiation(e)) => {
                tracing::warn!(
                    recipient_id = %request.recipient_id,
                    mode = %request.mode,
                    error = %e,
                    "Call initiation failed"
                );
                state.notice = Some(e.user_message.clone());
            }
        }
    }

    fn handle_start_ring_all(
        &self,
        myself: ActorRef<CallOrchestratorMsg>,
        family: Family,
        state: &mut CallOrchestratorState,
    ) -> RingAllOutcome {
        let transport_status = state.initiator.transport().status();
        if transport_status.call_in_progress() {
            tracing::info!(family_id = %family.id, "Ring-all ignored: call already in progress");
            return RingAllOutcome::Rejected {
                reason: RingAllRejection::CallInProgress,
            };
        }
        if !family.has_recipients() {
            tracing::info!(family_id = %family.id, "Ring-all ignored: family has no children");
            return RingAllOutcome::Rejected {
                reason: RingAllRejection::NoRecipients,
            };
        }
        let Some(permit) = state.call_slot.try_claim() else {
            tracing::info!(
                family_id = %family.id,
                "Ring-all ignored: a session already holds the call slot"
            );
            return RingAllOutcome::Rejected {
                reason: RingAllRejection::CallInProgress,
            };
        };

        let recipients = family.reachable_recipients();
        let session = RingAllSession::open(permit, myself.clone());
        let session_id = session.session_id.clone();
        tracing::info!(
            session_id = %session_id,
            family_id = %family.id,
            reachable = recipients.len(),
            total = family.children.len(),
            expires_at = %session.expires_at,
            "Ring-all session started"
        );

        state.ring_attempts.clear();
        state.session = Some(session);

        let attempts_planned = recipients.len();
        tokio::spawn(run_ring_sequence(
            state.initiator.clone(),
            recipients,
            session_id.clone(),
            myself,
        ));

        RingAllOutcome::Started {
            session_id,
            attempts_planned,
        }
    }

    fn handle_cancel_ring_all(&self, state: &mut CallOrchestratorState) -> bool {
        match state.session.take() {
            Some(session) => {
                tracing::info!(session_id = %session.session_id, "Ring-all session cancelled");
                session.cancel();
                true
            }
            None => false,
        }
    }

    fn handle_ring_all_expired(&self, session_id: &str, state: &mut CallOrchestratorState) {
        let is_current = state
            .session
            .as_ref()
            .is_some_and(|s| s.session_id == session_id);
        if is_current {
            state.session = None;
            tracing::info!(session_id, "Ring-all session expired");
        } else {
            tracing::debug!(session_id, "Ignoring expiry for a session that already ended");
        }
    }

    fn handle_ring_attempt_settled(
        &self,
        session_id: String,
        recipient_id: String,
        result: Result<ActiveCall, CallError>,
        state: &mut CallOrchestratorState,
    ) {
        let outcome = match result {
            Ok(call) => {
                state.view = DashboardView::ActiveCall {
                    mode: call.mode,
                    peer_id: call.peer_id,
                };
                AttemptOutcome::Dispatched
            }
            Err(CallError::Capability(e)) => {
                tracing::warn!(session_id = %session_id, recipient_id = %recipient_id, reason = %e, "Ring-all attempt blocked by capability gate");
                state.record_capability(e.result());
                AttemptOutcome::Failed {
                    message: e.to_string(),
                }
            }
            Err(CallError::Initiation(e)) => {
                tracing::warn!(session_id = %session_id, recipient_id = %recipient_id, error = %e, "Ring-all attempt failed");
                AttemptOutcome::Failed {
                    message: e.user_message,
                }
            }
        };

        state.ring_attempts.push(RingAttempt {
            session_id,
            recipient_id,
            outcome,
            at: Utc::now(),
        });
    }

    fn handle_accept_incoming(
        &self,
        myself: ActorRef<CallOrchestratorMsg>,
        reply: RpcReplyPort<Result<ActiveCall, IncomingError>>,
        state: &CallOrchestratorState,
    ) {
        let Some(notice) = state.incoming.clone() else {
            let _ = reply.send(Err(IncomingError::NoPendingNotice));
            return;
        };

        let transport = Arc::clone(state.initiator.transport());
        tokio::spawn(async move {
            let result = transport.accept_pending_call().await;
            if myself
                .cast(CallOrchestratorMsg::AcceptSettled {
                    notice,
                    result,
                    reply,
                })
                .is_err()
            {
                tracing::warn!("Orchestrator stopped before accept result was applied");
            }
        });
    }

    fn handle_accept_settled(
        &self,
        notice: IncomingCallNotice,
        result: Result<(), TransportError>,
        state: &mut CallOrchestratorState,
    ) -> Result<ActiveCall, IncomingError> {
        match result {
            Ok(()) => {
                if state.incoming.as_ref() == Some(&notice) {
                    state.incoming = None;
                }
                state.dismissed_notice = None;
                state.notice = None;
                state.view = DashboardView::ActiveCall {
                    mode: notice.mode,
                    peer_id: notice.caller_id.clone(),
                };
                tracing::info!(caller_id = %notice.caller_id, mode = %notice.mode, "Incoming call accepted");
                Ok(ActiveCall {
                    peer_id: notice.caller_id,
                    mode: notice.mode,
                })
            }
            Err(reason) => {
                let err = IncomingError::AcceptFailed {
                    mode: notice.mode,
                    reason,
                };
                tracing::warn!(caller_id = %notice.caller_id, error = %err, "Accepting incoming call failed");
                state.notice = Some(err.to_string());
                Err(err)
            }
        }
    }

    fn handle_reject_incoming(&self, state: &mut CallOrchestratorState) -> bool {
        match state.incoming.take() {
            Some(notice) => {
                // Local only: the caller's device is not told and rings until it gives up.
                tracing::info!(caller_id = %notice.caller_id, mode = %notice.mode, "Incoming call dismissed locally");
                state.dismissed_notice = Some(notice);
                true
            }
            None => false,
        }
    }

    fn handle_transport_updated(&self, status: TransportStatus, state: &mut CallOrchestratorState) {
        match &status.incoming_notice {
            Some(notice) if state.dismissed_notice.as_ref() == Some(notice) => {}
            Some(notice) => {
                if state.incoming.as_ref() != Some(notice) {
                    tracing::info!(caller_id = %notice.caller_id, mode = %notice.mode, "Incoming call");
                    state.incoming = Some(notice.clone());
                    state.dismissed_notice = None;
                }
            }
            None => {
                if state.incoming.take().is_some() {
                    tracing::debug!("Incoming call withdrawn by transport");
                }
                state.dismissed_notice = None;
            }
        }

        let call_dropped = state.transport_status.call_active && !status.call_active;
        if call_dropped && matches!(state.view, DashboardView::ActiveCall { .. }) {
            tracing::info!("Transport ended the active call");
            state.view = DashboardView::Home;
        }
        state.transport_status = status;
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Convenience function to run the capability gate
pub async fn check_capability(
    orchestrator: &ActorRef<CallOrchestratorMsg>,
) -> Result<CapabilityResult, ractor::RactorErr<CallOrchestratorMsg>> {
    ractor::call!(orchestrator, |reply| CallOrchestratorMsg::CheckCapability {
        reply
    })
}

/// Convenience function to place one call
pub async fn start_call(
    orchestrator: &ActorRef<CallOrchestratorMsg>,
    request: CallRequest,
) -> Result<Result<ActiveCall, CallError>, ractor::RactorErr<CallOrchestratorMsg>> {
    ractor::call!(orchestrator, |reply| CallOrchestratorMsg::StartCall {
        request,
        reply
    })
}

/// Convenience function to hang up
pub async fn end_call(
    orchestrator: &ActorRef<CallOrchestratorMsg>,
) -> Result<(), ractor::RactorErr<CallOrchestratorMsg>> {
    ractor::call!(orchestrator, |reply| CallOrchestratorMsg::EndCall { reply })
}

/// Convenience function to start a ring-all session
pub async fn start_ring_all(
    orchestrator: &ActorRef<CallOrchestratorMsg>,
    family: Family,
) -> Result<RingAllOutcome, ractor::RactorErr<CallOrchestratorMsg>> {
    ractor::call!(orchestrator, |reply| CallOrchestratorMsg::StartRingAll {
        family,
        reply
    })
}

/// Convenience function to cancel ring-all. Returns whether a session ended.
pub async fn cancel_ring_all(
    orchestrator: &ActorRef<CallOrchestratorMsg>,
) -> Result<bool, ractor::RactorErr<CallOrchestratorMsg>> {
    ractor::call!(orchestrator, |reply| CallOrchestratorMsg::CancelRingAll {
        reply
    })
}

/// Convenience function to accept the pending incoming call
pub async fn accept_incoming(
    orchestrator: &ActorRef<CallOrchestratorMsg>,
) -> Result<Result<ActiveCall, IncomingError>, ractor::RactorErr<CallOrchestratorMsg>> {
    ractor::call!(orchestrator, |reply| CallOrchestratorMsg::AcceptIncoming {
        reply
    })
}

/// Convenience function to dismiss the pending incoming call
pub async fn reject_incoming(
    orchestrator: &ActorRef<CallOrchestratorMsg>,
) -> Result<bool, ractor::RactorErr<CallOrchestratorMsg>> {
    ractor::call!(orchestrator, |reply| CallOrchestratorMsg::RejectIncoming {
        reply
    })
}

/// Convenience function to read dashboard state
pub async fn get_snapshot(
    orchestrator: &ActorRef<CallOrchestratorMsg>,
) -> Result<DashboardSnapshot, ractor::RactorErr<CallOrchestratorMsg>> {
    ractor::call!(orchestrator, |reply| CallOrchestratorMsg::GetSnapshot {
        reply
    })
}

// ============================================================================
// Tests
// ============================================================================
