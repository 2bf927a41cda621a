//! Lifecycle engine for the Rollbook enrollment registry.
//!
//! This crate ties together the session registry, enrollment store, and roll
//! allocator into the `Engine` — the central API for enrolling, promoting,
//! retaining, transferring, graduating, and dropping students, and for the
//! one-way session lock that freezes a year's academic records. It also
//! provides the exclusive registry lock serializing concurrent mutations and
//! the state-machine transition validation.

pub mod concurrency;
pub mod engine;
pub mod gate;
pub mod lifecycle;

pub use concurrency::RegistryLock;
pub use engine::{Engine, TransitionOutcome};
pub use gate::LockGate;
pub use lifecycle::validate_transition;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation error: {0}")]
    Validation(#[from] rollbook_schema::ValidationError),
    #[error(transparent)]
    Store(#[from] rollbook_store::StoreError),
    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
