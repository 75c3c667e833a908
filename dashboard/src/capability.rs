//! Capability Gate - pre-flight check before any call attempt
//!
//! The gate runs three checks in order and stops at the first failure:
//! secure context (or a local development host), a media-capture API,
//! and microphone/camera permission state. Permission inspection is
//! best-effort: when the runtime cannot be asked, or asking fails, the
//! gate passes. Only a confirmed denial blocks.

use async_trait::async_trait;
use shared_types::{CapabilityResult, EnvironmentReport, PermissionState, PermissionsReport};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Media-capture entry points, standard and vendor-prefixed
pub const MEDIA_CAPTURE_APIS: [&str; 5] = [
    "mediaDevices.getUserMedia",
    "getUserMedia",
    "webkitGetUserMedia",
    "mozGetUserMedia",
    "msGetUserMedia",
];

const LOCAL_DEV_HOSTS: [&str; 4] = ["localhost", "127.0.0.1", "::1", "[::1]"];

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("calling requires a secure (HTTPS) connection")]
    InsecureContext,

    #[error("this browser cannot capture audio or video")]
    UnsupportedBrowser,

    #[error("microphone or camera access was denied")]
    PermissionDenied,
}

impl CapabilityError {
    pub fn result(&self) -> CapabilityResult {
        match self {
            CapabilityError::InsecureContext => CapabilityResult::InsecureContext,
            CapabilityError::UnsupportedBrowser => CapabilityResult::UnsupportedBrowser,
            CapabilityError::PermissionDenied => CapabilityResult::PermissionDenied,
        }
    }
}

/// Convert a gate result into `Result` so callers can use `?`
pub fn require_ok(result: CapabilityResult) -> Result<(), CapabilityError> {
    match result {
        CapabilityResult::Ok => Ok(()),
        CapabilityResult::InsecureContext => Err(CapabilityError::InsecureContext),
        CapabilityResult::UnsupportedBrowser => Err(CapabilityError::UnsupportedBrowser),
        CapabilityResult::PermissionDenied => Err(CapabilityError::PermissionDenied),
    }
}

#[derive(Debug, thiserror::Error, Clone)]
#[error("permission query failed: {0}")]
pub struct ProbeError(pub String);

/// Read access to the facts the gate needs about the calling runtime
#[async_trait]
pub trait EnvironmentProbe: Send + Sync {
    async fn is_secure_context(&self) -> bool;

    async fn host(&self) -> String;

    async fn has_media_capture(&self) -> bool;

    /// `Ok(None)` when the runtime has no permissions-query facility.
    /// Returns (microphone, camera).
    async fn query_permissions(
        &self,
    ) -> Result<Option<(PermissionState, PermissionState)>, ProbeError>;
}

/// The Capability Gate
#[derive(Debug, Clone, Default)]
pub struct CapabilityGate {
    extra_dev_hosts: Vec<String>,
}

impl CapabilityGate {
    pub fn new(extra_dev_hosts: Vec<String>) -> Self {
        Self {
            extra_dev_hosts: extra_dev_hosts
                .into_iter()
                .map(|h| h.trim().to_ascii_lowercase())
                .filter(|h| !h.is_empty())
                .collect(),
        }
    }

    /// Whether `host` is a recognised local-development address.
    /// Case-insensitive; a trailing `:port` is ignored.
    pub fn is_local_dev_host(&self, host: &str) -> bool {
        let host = strip_port(host.trim()).to_ascii_lowercase();
        LOCAL_DEV_HOSTS.iter().any(|h| *h == host)
            || host.ends_with(".localhost")
            || self.extra_dev_hosts.iter().any(|h| *h == host)
    }

    /// Run the gate. Computed fresh on every call; nothing is cached.
    pub async fn check(&self, probe: &dyn EnvironmentProbe) -> CapabilityResult {
        if !probe.is_secure_context().await {
            let host = probe.host().await;
            if !self.is_local_dev_host(&host) {
                tracing::warn!(host = %host, "Capability gate: insecure context");
                return CapabilityResult::InsecureContext;
            }
            tracing::debug!(host = %host, "Insecure context allowed for local development host");
        }

        if !probe.has_media_capture().await {
            tracing::warn!("Capability gate: no media-capture API exposed");
            return CapabilityResult::UnsupportedBrowser;
        }

        match probe.query_permissions().await {
            Ok(Some((microphone, camera))) => {
                if microphone == PermissionState::Denied || camera == PermissionState::Denied {
                    tracing::warn!(
                        microphone = ?microphone,
                        camera = ?camera,
                        "Capability gate: permission denied"
                    );
                    return CapabilityResult::PermissionDenied;
                }
            }
            Ok(None) => {
                tracing::debug!("Permissions query unavailable; skipping permission check");
            }
            Err(e) => {
                tracing::debug!(error = %e, "Permissions query failed; skipping permission check");
            }
        }

        CapabilityResult::Ok
    }
}

fn strip_port(host: &str) -> &str {
    // Bracketed IPv6 keeps its brackets: "[::1]:3000" -> "[::1]"
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    // Bare IPv6 ("::1") has several colons and no port
    if host.matches(':').count() == 1 {
        if let Some((name, _port)) = host.split_once(':') {
            return name;
        }
    }
    host
}

// ============================================================================
// Reported Environment
// ============================================================================

/// Environment facts pushed by the view layer.
///
/// The dashboard front end reports what its runtime exposes; the gate reads
/// the latest report. Seeded from configuration at start-up.
#[derive(Debug, Clone)]
pub struct ReportedEnvironment {
    report: Arc<RwLock<EnvironmentReport>>,
}

impl ReportedEnvironment {
    pub fn new(report: EnvironmentReport) -> Self {
        Self {
            report: Arc::new(RwLock::new(report)),
        }
    }

    pub async fn update(&self, report: EnvironmentReport) {
        tracing::debug!(
            secure_context = report.secure_context,
            host = %report.host,
            "Environment report updated"
        );
        *self.report.write().await = report;
    }

    pub async fn current(&self) -> EnvironmentReport {
        self.report.read().await.clone()
    }
}

#[async_trait]
impl EnvironmentProbe for ReportedEnvironment {
    async fn is_secure_context(&self) -> bool {
        self.report.read().await.secure_context
    }

    async fn host(&self) -> String {
        self.report.read().await.host.clone()
    }

    async fn has_media_capture(&self) -> bool {
        let report = self.report.read().await;
        report
            .media_apis
            .iter()
            .any(|api| MEDIA_CAPTURE_APIS.iter().any(|known| *known == api.trim()))
    }

    async fn query_permissions(
        &self,
    ) -> Result<Option<(PermissionState, PermissionState)>, ProbeError> {
        match &self.report.read().await.permissions {
            PermissionsReport::Unavailable => Ok(None),
            PermissionsReport::QueryFailed { reason } => Err(ProbeError(reason.clone())),
            PermissionsReport::Known { microphone, camera } => Ok(Some((*microphone, *camera))),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn report(secure: bool, host: &str, permissions: PermissionsReport) -> EnvironmentReport {
        EnvironmentReport {
            secure_context: secure,
            host: host.to_string(),
            media_apis: vec!["mediaDevices.getUserMedia".to_string()],
            permissions,
        }
    }

    fn denied() -> PermissionsReport {
        PermissionsReport::Known {
            microphone: PermissionState::Denied,
            camera: PermissionState::Denied,
        }
    }

    #[tokio::test]
    async fn test_insecure_remote_host_short_circuits() {
        let gate = CapabilityGate::default();
        for permissions in [
            PermissionsReport::Unavailable,
            denied(),
            PermissionsReport::QueryFailed {
                reason: "boom".to_string(),
            },
        ] {
            let mut env = report(false, "family.example.com", permissions);
            env.media_apis.clear();
            let probe = ReportedEnvironment::new(env);
            assert_eq!(gate.check(&probe).await, CapabilityResult::InsecureContext);
        }
    }

    #[tokio::test]
    async fn test_insecure_local_host_passes_first_check() {
        let gate = CapabilityGate::default();
        let probe = ReportedEnvironment::new(report(
            false,
            "localhost:5173",
            PermissionsReport::Unavailable,
        ));
        assert_eq!(gate.check(&probe).await, CapabilityResult::Ok);
    }

    #[tokio::test]
    async fn test_missing_media_api_is_unsupported() {
        let gate = CapabilityGate::default();
        let mut env = report(true, "family.example.com", denied());
        env.media_apis = vec!["getDisplayMedia".to_string()];
        let probe = ReportedEnvironment::new(env);
        assert_eq!(gate.check(&probe).await, CapabilityResult::UnsupportedBrowser);
    }

    #[tokio::test]
    async fn test_vendor_prefixed_media_api_is_accepted() {
        let gate = CapabilityGate::default();
        let mut env = report(true, "family.example.com", PermissionsReport::Unavailable);
        env.media_apis = vec!["webkitGetUserMedia".to_string()];
        let probe = ReportedEnvironment::new(env);
        assert_eq!(gate.check(&probe).await, CapabilityResult::Ok);
    }

    #[tokio::test]
    async fn test_single_denied_permission_blocks() {
        let gate = CapabilityGate::default();
        let probe = ReportedEnvironment::new(report(
            true,
            "family.example.com",
            PermissionsReport::Known {
                microphone: PermissionState::Granted,
                camera: PermissionState::Denied,
            },
        ));
        assert_eq!(gate.check(&probe).await, CapabilityResult::PermissionDenied);
    }

    #[tokio::test]
    async fn test_prompt_state_is_not_a_denial() {
        let gate = CapabilityGate::default();
        let probe = ReportedEnvironment::new(report(
            true,
            "family.example.com",
            PermissionsReport::Known {
                microphone: PermissionState::Prompt,
                camera: PermissionState::Prompt,
            },
        ));
        assert_eq!(gate.check(&probe).await, CapabilityResult::Ok);
    }

    #[tokio::test]
    async fn test_failed_permission_query_is_soft_pass() {
        let gate = CapabilityGate::default();
        let probe = ReportedEnvironment::new(report(
            true,
            "family.example.com",
            PermissionsReport::QueryFailed {
                reason: "NotSupportedError".to_string(),
            },
        ));
        assert_eq!(gate.check(&probe).await, CapabilityResult::Ok);
    }

    #[tokio::test]
    async fn test_report_update_is_seen_by_next_check() {
        let gate = CapabilityGate::default();
        let probe = ReportedEnvironment::new(report(
            true,
            "family.example.com",
            PermissionsReport::Unavailable,
        ));
        assert_eq!(gate.check(&probe).await, CapabilityResult::Ok);

        probe
            .update(report(true, "family.example.com", denied()))
            .await;
        assert_eq!(gate.check(&probe).await, CapabilityResult::PermissionDenied);
    }

    #[test]
    fn test_local_dev_hosts() {
        let gate = CapabilityGate::new(vec!["Devbox.lan".to_string()]);
        assert!(gate.is_local_dev_host("localhost"));
        assert!(gate.is_local_dev_host("LOCALHOST:3000"));
        assert!(gate.is_local_dev_host("app.localhost"));
        assert!(gate.is_local_dev_host("127.0.0.1:8080"));
        assert!(gate.is_local_dev_host("::1"));
        assert!(gate.is_local_dev_host("[::1]:3000"));
        assert!(gate.is_local_dev_host("devbox.lan:9000"));
        assert!(!gate.is_local_dev_host("192.168.1.20"));
        assert!(!gate.is_local_dev_host("localhost.example.com"));
    }

    #[test]
    fn test_require_ok_maps_results() {
        assert!(require_ok(CapabilityResult::Ok).is_ok());
        let err = require_ok(CapabilityResult::PermissionDenied).unwrap_err();
        assert_eq!(err, CapabilityError::PermissionDenied);
        assert_eq!(err.result(), CapabilityResult::PermissionDenied);
    }
}
