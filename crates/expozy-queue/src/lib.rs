//! # Expozy Queue
//!
//! Durable work queue with delayed redelivery and dead-lettering, backed
//! by Redis. A `Queue` trait decouples Ingest (publish) and the Worker
//! pool (consume) from the concrete backend; an in-memory fake backs unit
//! tests.

pub mod error;
pub mod item;
pub mod keys;
pub mod memory;
pub mod redis_queue;
pub mod traits;

pub use error::{QueueError, QueueResult};
pub use item::QueueItem;
pub use keys::QueueKeys;
pub use memory::InMemoryQueue;
pub use redis_queue::RedisQueue;
pub use traits::Queue;
