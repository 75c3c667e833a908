//! Call Initiator - one outbound call to one recipient

use shared_types::{CallMode, CallRequest, CapabilityResult};
use std::sync::Arc;

use super::protocol::{ActiveCall, CallError, InitiationError};
use crate::capability::{require_ok, CapabilityGate, EnvironmentProbe};
use crate::transport::CallTransport;

/// Mode-specific text shown when the transport fails a call
pub fn failure_message(mode: CallMode) -> &'static str {
    match mode {
        CallMode::Voice => "Could not start the voice call. Check your connection and try again.",
        CallMode::Video => {
            "Could not start the video call. Check your camera and connection, then try again."
        }
    }
}

/// Gate-then-dispatch for a single call.
///
/// Holds no dashboard state: the caller applies the outcome, so a failed
/// attempt cannot touch reachability or ring-all bookkeeping.
#[derive(Clone)]
pub struct CallInitiator {
    gate: CapabilityGate,
    probe: Arc<dyn EnvironmentProbe>,
    transport: Arc<dyn CallTransport>,
}

impl CallInitiator {
    pub fn new(
        gate: CapabilityGate,
        probe: Arc<dyn EnvironmentProbe>,
        transport: Arc<dyn CallTransport>,
    ) -> Self {
        Self {
            gate,
            probe,
            transport,
        }
    }

    pub fn transport(&self) -> &Arc<dyn CallTransport> {
        &self.transport
    }

    pub async fn check_capability(&self) -> CapabilityResult {
        self.gate.check(self.probe.as_ref()).await
    }

    /// Re-checks capability on every attempt, then asks the transport.
    pub async fn initiate(&self, request: &CallRequest) -> Result<ActiveCall, CallError> {
        require_ok(self.check_capability().await)?;

        self.transport
            .start_call(&request.recipient_id, request.mode)
            .await
            .map_err(|reason| InitiationError {
                recipient_id: request.recipient_id.clone(),
                mode: request.mode,
                reason,
                user_message: failure_message(request.mode).to_string(),
            })?;

        tracing::info!(
            recipient_id = %request.recipient_id,
            mode = %request.mode,
            "Call dispatched to transport"
        );

        Ok(ActiveCall {
            peer_id: request.recipient_id.clone(),
            mode: request.mode,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{CapabilityError, ReportedEnvironment};
    use crate::transport::LoopbackTransport;
    use shared_types::{EnvironmentReport, PermissionState, PermissionsReport};

    fn initiator(report: EnvironmentReport, transport: LoopbackTransport) -> CallInitiator {
        CallInitiator::new(
            CapabilityGate::default(),
            Arc::new(ReportedEnvironment::new(report)),
            Arc::new(transport),
        )
    }

    fn request(recipient_id: &str, mode: CallMode) -> CallRequest {
        CallRequest {
            recipient_id: recipient_id.to_string(),
            mode,
        }
    }

    #[tokio::test]
    async fn test_initiate_success() {
        let transport = LoopbackTransport::new();
        let initiator = initiator(EnvironmentReport::default(), transport.clone());

        let call = initiator
            .initiate(&request("c-1", CallMode::Video))
            .await
            .unwrap();
        assert_eq!(call.peer_id, "c-1");
        assert_eq!(call.mode, CallMode::Video);
        assert_eq!(transport.dispatched().len(), 1);
    }

    #[tokio::test]
    async fn test_permission_denied_never_reaches_transport() {
        let transport = LoopbackTransport::new();
        let report = EnvironmentReport {
            permissions: PermissionsReport::Known {
                microphone: PermissionState::Denied,
                camera: PermissionState::Granted,
            },
            ..EnvironmentReport::default()
        };
        let initiator = initiator(report, transport.clone());

        let err = initiator
            .initiate(&request("c-1", CallMode::Voice))
            .await
            .unwrap_err();
        assert_eq!(err, CallError::Capability(CapabilityError::PermissionDenied));
        assert!(transport.dispatched().is_empty());
    }

    #[tokio::test]
    async fn test_failure_messages_differ_by_mode() {
        let transport = LoopbackTransport::new();
        transport.reject_recipient("c-1");
        let initiator = initiator(EnvironmentReport::default(), transport);

        let voice = initiator
            .initiate(&request("c-1", CallMode::Voice))
            .await
            .unwrap_err();
        let video = initiator
            .initiate(&request("c-1", CallMode::Video))
            .await
            .unwrap_err();

        assert_eq!(voice.user_message(), failure_message(CallMode::Voice));
        assert_eq!(video.user_message(), failure_message(CallMode::Video));
        assert_ne!(voice.user_message(), video.user_message());
    }
}
