//! Core infrastructure for tower-throttle.
//!
//! This crate provides shared functionality used by the tower-throttle
//! workspace:
//! - Event system for observability
//! - Unified error wrapper for composed service stacks

pub mod error;
pub mod events;

pub use error::ThrottleError;
pub use events::{EventListener, EventListeners, FnListener, ThrottleEvent};
