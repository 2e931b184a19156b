//! # Expozy Store
//!
//! Durable state for `InboundEvent`, `Job`, and `Attempt` rows, backed by
//! Postgres. A `Store` trait decouples Ingest and Worker from the concrete
//! backend; an in-memory fake backs unit tests.

pub mod error;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use models::{Attempt, FailureTransition, InboundEvent, InsertEventOutcome, Job};
pub use postgres::PostgresStore;
pub use traits::Store;
