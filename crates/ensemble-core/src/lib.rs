//! Core types and error definitions for the Ensemble orchestrator.
//!
//! This crate provides the foundational types shared across all Ensemble crates:
//! the error taxonomy, the chat transcript a turn is handed, and the opaque
//! per-backend state that rides along on assistant messages between turns.
//!
//! # Main types
//!
//! - [`EnsembleError`]: Unified error enum for all Ensemble subsystems.
//! - [`EnsembleResult`]: Convenience alias for `Result<T, EnsembleError>`.
//! - [`Role`]: Message role (system, user, assistant).
//! - [`ChatMessage`]: A single message within a conversation transcript.
//! - [`TurnState`]: Session identifiers and fragments persisted on the transcript.

/// Error types.
pub mod error;
/// Chat transcript types.
pub mod message;
/// Persisted per-turn backend state.
pub mod state;

pub use error::{EnsembleError, EnsembleResult};
pub use message::{ChatMessage, CustomContent, Role};
pub use state::{TurnState, GPA_MESSAGES, UMS_CONVERSATION_ID};
