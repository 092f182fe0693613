//! OpenAI-compatible HTTP gateway for the Ensemble orchestrator.
//!
//! Clients send the whole conversation each turn; persisted agent state rides
//! on assistant messages in `custom_content.state`, so the server holds nothing
//! between requests.

pub mod api;
pub mod auth;
/// Router construction and request handlers.
pub mod server;

pub use auth::ApiKeys;
pub use server::GatewayServer;
