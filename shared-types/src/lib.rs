//! Shared types between the dashboard backend and its view layer
//!
//! These types are used by both:
//! - the call orchestration actors (native Rust)
//! - the dashboard front end (TypeScript, via ts-rs exports)
//!
//! Serializable with serde for JSON over HTTP

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ============================================================================
// Family Roster
// ============================================================================

/// A family member who can be called (a child on the dashboard)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub struct Recipient {
    pub id: String,
    pub display_name: String,
    /// Presence as last reported by the transport
    pub reachable: bool,
    pub last_seen: Option<DateTime<Utc>>,
}

impl Recipient {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            reachable: false,
            last_seen: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub struct Guardian {
    pub id: String,
    pub display_name: String,
}

impl Guardian {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

/// Family roster - guardians manage, children are called
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub struct Family {
    pub id: String,
    pub name: String,
    pub guardians: Vec<Guardian>,
    pub children: Vec<Recipient>,
}

impl Family {
    /// Children currently reachable, in roster order
    pub fn reachable_recipients(&self) -> Vec<Recipient> {
        self.children.iter().filter(|c| c.reachable).cloned().collect()
    }

    pub fn has_recipients(&self) -> bool {
        !self.children.is_empty()
    }
}

// ============================================================================
// Calls
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub enum CallMode {
    Voice,
    Video,
}

impl CallMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallMode::Voice => "voice",
            CallMode::Video => "video",
        }
    }
}

impl std::fmt::Display for CallMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outbound call attempt. Built per attempt, never stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub struct CallRequest {
    pub recipient_id: String,
    pub mode: CallMode,
}

/// Incoming call raised by the transport
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub struct IncomingCallNotice {
    pub caller_id: String,
    pub mode: CallMode,
}

/// Observable flags of the external call transport
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default, TS)]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub struct TransportStatus {
    pub call_active: bool,
    pub ringing_outbound: bool,
    pub connecting: bool,
    pub incoming_notice: Option<IncomingCallNotice>,
    pub active_peer: Option<String>,
    pub active_mode: Option<CallMode>,
}

impl TransportStatus {
    /// True while any call is being placed, connected or rung out
    pub fn call_in_progress(&self) -> bool {
        self.call_active || self.ringing_outbound || self.connecting
    }
}

// ============================================================================
// Capability
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub enum CapabilityResult {
    Ok,
    InsecureContext,
    UnsupportedBrowser,
    PermissionDenied,
}

impl CapabilityResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, CapabilityResult::Ok)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub enum PermissionState {
    Granted,
    Denied,
    Prompt,
}

/// Outcome of the view layer's permission query
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[serde(tag = "status", rename_all = "snake_case")]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub enum PermissionsReport {
    /// No permissions-query facility in this runtime
    Unavailable,
    /// The facility exists but the query threw
    QueryFailed { reason: String },
    Known {
        microphone: PermissionState,
        camera: PermissionState,
    },
}

/// Runtime facts reported by the view layer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub struct EnvironmentReport {
    pub secure_context: bool,
    pub host: String,
    /// Media-capture entry points the runtime exposes, e.g. "webkitGetUserMedia"
    pub media_apis: Vec<String>,
    pub permissions: PermissionsReport,
}

impl Default for EnvironmentReport {
    fn default() -> Self {
        Self {
            secure_context: false,
            host: "localhost".to_string(),
            media_apis: vec!["mediaDevices.getUserMedia".to_string()],
            permissions: PermissionsReport::Unavailable,
        }
    }
}

// ============================================================================
// Dashboard State
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub enum RingAllPhase {
    Idle,
    Active,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub struct RingAllStatus {
    pub phase: RingAllPhase,
    pub session_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl RingAllStatus {
    pub fn idle() -> Self {
        Self {
            phase: RingAllPhase::Idle,
            session_id: None,
            started_at: None,
            expires_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.phase == RingAllPhase::Active
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub enum AttemptOutcome {
    Dispatched,
    Failed { message: String },
}

/// Result of one per-recipient attempt within a ring-all session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub struct RingAttempt {
    pub session_id: String,
    pub recipient_id: String,
    pub outcome: AttemptOutcome,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default, TS)]
#[serde(tag = "screen", rename_all = "snake_case")]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub enum DashboardView {
    #[default]
    Home,
    ActiveCall {
        mode: CallMode,
        peer_id: String,
    },
}

/// Blocking surface shown instead of attempting a call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub enum RemediationSurface {
    /// Insecure context or no media-capture API
    EnvironmentUnsupported { reason: CapabilityResult },
    PermissionRecovery,
}

impl RemediationSurface {
    /// Surface for a failed gate check, None when calling is possible
    pub fn for_result(result: CapabilityResult) -> Option<Self> {
        match result {
            CapabilityResult::Ok => None,
            CapabilityResult::PermissionDenied => Some(RemediationSurface::PermissionRecovery),
            reason => Some(RemediationSurface::EnvironmentUnsupported { reason }),
        }
    }
}

/// Everything the view layer renders about calling
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub struct DashboardSnapshot {
    pub view: DashboardView,
    pub ring_all: RingAllStatus,
    pub ring_attempts: Vec<RingAttempt>,
    pub incoming: Option<IncomingCallNotice>,
    pub last_capability: Option<CapabilityResult>,
    pub remediation: Option<RemediationSurface>,
    /// User-facing message from the last failed action
    pub notice: Option<String>,
    pub transport: TransportStatus,
}

// ============================================================================
// Tests
// ============================================================================
