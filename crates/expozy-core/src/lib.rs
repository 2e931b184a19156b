//! # Expozy Core
//!
//! Shared types, error definitions, and telemetry bootstrap used across every
//! layer of the orchestrator: the ingest webhook, the worker pool, the
//! durable store, the queue, and the validation pipeline.

pub mod error;
pub mod id;
pub mod notify;
pub mod result;
pub mod status;
pub mod telemetry;

pub use error::*;
pub use id::*;
pub use notify::{notification_channel, ChatClient, NoopChatClient, Notification, NotificationSender};
pub use result::*;
pub use status::*;
