//! Guardian dashboard backend - call orchestration over ractor actors
//!
//! This crate provides the capability gate, the call initiator, the
//! ring-all sequencer and the incoming-call flow behind a small JSON API
//! for the dashboard view layer.

pub mod actors;
pub mod api;
pub mod app_state;
pub mod capability;
pub mod config;
pub mod transport;
