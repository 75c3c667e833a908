//! CallOrchestratorActor message protocol
//!
//! Defines the messages the orchestrator handles and the error types the
//! call flows report back to the view layer.

use ractor::RpcReplyPort;
use shared_types::{
    CallMode, CallRequest, CapabilityResult, DashboardSnapshot, Family, IncomingCallNotice,
    TransportStatus,
};

use crate::capability::CapabilityError;
use crate::transport::TransportError;

/// Messages handled by CallOrchestratorActor
#[derive(Debug)]
pub enum CallOrchestratorMsg {
    /// Run the Capability Gate without placing a call
    CheckCapability {
        reply: RpcReplyPort<CapabilityResult>,
    },
    /// Place one outbound call
    StartCall {
        request: CallRequest,
        reply: RpcReplyPort<Result<ActiveCall, CallError>>,
    },
    /// Hang up the active call
    EndCall { reply: RpcReplyPort<()> },
    /// Ring every reachable child of a family
    StartRingAll {
        family: Family,
        reply: RpcReplyPort<RingAllOutcome>,
    },
    /// Stop the active ring-all session; no-op when idle
    CancelRingAll { reply: RpcReplyPort<bool> },
    AcceptIncoming {
        reply: RpcReplyPort<Result<ActiveCall, IncomingError>>,
    },
    /// Dismiss the pending notice locally
    RejectIncoming { reply: RpcReplyPort<bool> },
    GetSnapshot {
        reply: RpcReplyPort<DashboardSnapshot>,
    },

    // Internal messages, sent by tasks the actor spawned.
    /// A user-initiated call finished dispatching
    CallSettled {
        request: CallRequest,
        result: Result<ActiveCall, CallError>,
        reply: RpcReplyPort<Result<ActiveCall, CallError>>,
    },
    /// One ring-all attempt finished dispatching
    RingAttemptSettled {
        session_id: String,
        recipient_id: String,
        result: Result<ActiveCall, CallError>,
    },
    /// The transport finished hanging up
    EndSettled { reply: RpcReplyPort<()> },
    /// The expiry timer of a ring-all session fired
    RingAllExpired { session_id: String },
    /// The transport finished (or failed) accepting a call
    AcceptSettled {
        notice: IncomingCallNotice,
        result: Result<(), TransportError>,
        reply: RpcReplyPort<Result<ActiveCall, IncomingError>>,
    },
    /// The transport published a new status
    TransportUpdated(TransportStatus),
}

/// A call the transport accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveCall {
    pub peer_id: String,
    pub mode: CallMode,
}

/// Result of asking for a ring-all session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RingAllOutcome {
    Started {
        session_id: String,
        attempts_planned: usize,
    },
    Rejected {
        reason: RingAllRejection,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingAllRejection {
    /// A call or another ring-all session already holds the line
    CallInProgress,
    /// The family has no children to ring
    NoRecipients,
}

impl std::fmt::Display for RingAllRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RingAllRejection::CallInProgress => f.write_str("a call is already in progress"),
            RingAllRejection::NoRecipients => f.write_str("the family has no children to call"),
        }
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// A transport failure on one specific attempt
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
#[error("{mode} call to {recipient_id} failed: {reason}")]
pub struct InitiationError {
    pub recipient_id: String,
    pub mode: CallMode,
    pub reason: TransportError,
    /// Text shown to the guardian
    pub user_message: String,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum CallError {
    #[error("calling unavailable: {0}")]
    Capability(#[from] CapabilityError),

    #[error(transparent)]
    Initiation(#[from] InitiationError),
}

impl CallError {
    /// Text suitable for the dashboard notice area
    pub fn user_message(&self) -> String {
        match self {
            CallError::Capability(e) => e.to_string(),
            CallError::Initiation(e) => e.user_message.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum IncomingError {
    #[error("no incoming call to accept")]
    NoPendingNotice,

    #[error("could not answer the {mode} call: {reason}")]
    AcceptFailed {
        mode: CallMode,
        reason: TransportError,
    },
}
