//! Call transport seam
//!
//! The transport owns connection establishment, media and the
//! authoritative call state. The orchestrator only drives it through
//! `CallTransport` and observes its `TransportStatus`.

use async_trait::async_trait;
use shared_types::{CallMode, IncomingCallNotice, TransportStatus};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::time::Instant;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("call rejected: {0}")]
    Rejected(String),

    #[error("transport unavailable: {0}")]
    Unavailable(String),

    #[error("no pending call to accept")]
    NoPendingCall,
}

#[async_trait]
pub trait CallTransport: Send + Sync {
    async fn start_call(&self, recipient_id: &str, mode: CallMode) -> Result<(), TransportError>;

    async fn accept_pending_call(&self) -> Result<(), TransportError>;

    async fn end_active_call(&self);

    fn status(&self) -> TransportStatus;

    /// Receives every status change published by the transport
    fn subscribe(&self) -> watch::Receiver<TransportStatus>;
}

// ============================================================================
// Loopback Transport
// ============================================================================

/// A call handed to the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchedCall {
    pub recipient_id: String,
    pub mode: CallMode,
    pub at: Instant,
}

#[derive(Debug, Default)]
struct LoopbackInner {
    dispatched: Vec<DispatchedCall>,
    rejected_recipients: HashSet<String>,
    accept_failure: Option<String>,
    accept_requests: usize,
    end_requests: usize,
}

/// In-process transport for local development and tests.
///
/// Calls connect immediately unless the recipient was marked rejected.
/// Every dispatch is recorded with the tokio clock so pacing can be
/// asserted under a paused runtime.
#[derive(Clone)]
pub struct LoopbackTransport {
    inner: Arc<Mutex<LoopbackInner>>,
    status: Arc<watch::Sender<TransportStatus>>,
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackTransport {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(TransportStatus::default());
        Self {
            inner: Arc::new(Mutex::new(LoopbackInner::default())),
            status: Arc::new(tx),
        }
    }

    fn with_inner<R>(&self, f: impl FnOnce(&mut LoopbackInner) -> R) -> R {
        let mut guard = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }

    /// Make every future `start_call` to this recipient fail
    pub fn reject_recipient(&self, recipient_id: impl Into<String>) {
        let recipient_id = recipient_id.into();
        self.with_inner(|inner| inner.rejected_recipients.insert(recipient_id));
    }

    /// Make `accept_pending_call` fail with `reason` until cleared
    pub fn fail_accept(&self, reason: Option<String>) {
        self.with_inner(|inner| inner.accept_failure = reason);
    }

    /// Raise an incoming call, as a remote device ringing us would
    pub fn raise_incoming(&self, notice: IncomingCallNotice) {
        self.status.send_modify(|status| status.incoming_notice = Some(notice));
    }

    /// The remote side gave up ringing
    pub fn clear_incoming(&self) {
        self.status.send_modify(|status| status.incoming_notice = None);
    }

    /// Overwrite the published status
    pub fn set_status(&self, status: TransportStatus) {
        self.status.send_replace(status);
    }

    /// Attempts that reached the transport, rejected ones included
    pub fn dispatched(&self) -> Vec<DispatchedCall> {
        self.with_inner(|inner| inner.dispatched.clone())
    }

    pub fn accept_requests(&self) -> usize {
        self.with_inner(|inner| inner.accept_requests)
    }

    pub fn end_requests(&self) -> usize {
        self.with_inner(|inner| inner.end_requests)
    }
}

#[async_trait]
impl CallTransport for LoopbackTransport {
    async fn start_call(&self, recipient_id: &str, mode: CallMode) -> Result<(), TransportError> {
        let rejected = self.with_inner(|inner| {
            inner.dispatched.push(DispatchedCall {
                recipient_id: recipient_id.to_string(),
                mode,
                at: Instant::now(),
            });
            inner.rejected_recipients.contains(recipient_id)
        });

        if rejected {
            tracing::debug!(recipient_id, %mode, "Loopback transport rejecting call");
            return Err(TransportError::Rejected(format!(
                "{recipient_id} did not answer"
            )));
        }

        let peer = recipient_id.to_string();
        self.status.send_modify(|status| {
            status.call_active = true;
            status.ringing_outbound = false;
            status.connecting = false;
            status.active_peer = Some(peer);
            status.active_mode = Some(mode);
        });
        Ok(())
    }

    async fn accept_pending_call(&self) -> Result<(), TransportError> {
        let failure = self.with_inner(|inner| {
            inner.accept_requests += 1;
            inner.accept_failure.clone()
        });
        if let Some(reason) = failure {
            return Err(TransportError::Unavailable(reason));
        }

        let notice = self
            .status
            .borrow()
            .incoming_notice
            .clone()
            .ok_or(TransportError::NoPendingCall)?;

        self.status.send_modify(|status| {
            status.incoming_notice = None;
            status.call_active = true;
            status.active_peer = Some(notice.caller_id);
            status.active_mode = Some(notice.mode);
        });
        Ok(())
    }

    async fn end_active_call(&self) {
        self.with_inner(|inner| inner.end_requests += 1);
        self.status.send_modify(|status| {
            status.call_active = false;
            status.ringing_outbound = false;
            status.connecting = false;
            status.active_peer = None;
            status.active_mode = None;
        });
    }

    fn status(&self) -> TransportStatus {
        self.status.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<TransportStatus> {
        self.status.subscribe()
    }
}
