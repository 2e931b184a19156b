//! # Expozy Ingest
//!
//! The chat-transport webhook: authenticate, parse, classify, deduplicate,
//! create the job, commit, publish, acknowledge. Every step
//! that can fail does so with a specific, bounded HTTP response — nothing
//! here blocks on the generative model or the worker pool.

pub mod auth;
pub mod handler;
pub mod state;
pub mod webhook;

pub use handler::router;
pub use state::IngestState;
pub use webhook::{classify, Classification, WebhookBody, WebhookResponse};
