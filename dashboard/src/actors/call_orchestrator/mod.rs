//! CallOrchestratorActor - single owner of dashboard call state
//!
//! The orchestrator:
//! - Gates every outbound attempt on the current media capability
//! - Places one-off calls through the `CallTransport`
//! - Runs ring-all sessions (paced attempts, hard expiry, cancel)
//! - Surfaces incoming calls and applies accept / reject
//!
//! ## Ring-all lifecycle
//!
//! ```text
//! Idle → Active ──(expiry fires)──→ Idle
//!          |
//!          └──(cancel)──→ Idle
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ractor::Actor;
//! use crate::actors::call_orchestrator::{CallOrchestratorActor, CallOrchestratorArguments};
//!
//! let args = CallOrchestratorArguments {
//!     gate,
//!     probe,
//!     transport,
//!     call_slot: CallSlot::new(),
//! };
//!
//! let (orchestrator, _handle) = Actor::spawn(None, CallOrchestratorActor, args).await?;
//! ```

pub mod actor;
pub mod initiator;
pub mod protocol;
pub mod ring_all;

pub use actor::{CallOrchestratorActor, CallOrchestratorArguments, CallOrchestratorState};
pub use initiator::{failure_message, CallInitiator};
pub use protocol::{
    ActiveCall, CallError, CallOrchestratorMsg, IncomingError, InitiationError, RingAllOutcome,
    RingAllRejection,
};
pub use ring_all::{CallSlot, RING_ALL_PACING, RING_ALL_WINDOW};
