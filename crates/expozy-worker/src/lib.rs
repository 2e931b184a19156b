//! # Expozy Worker
//!
//! Drives one RUNNING episode per queued job: model, validator,
//! sanitizer, renderer, storage. [`engine::Engine`] is the
//! per-item algorithm; [`pool::WorkerPool`] is the concurrency/shutdown
//! shell around it, a semaphore-bounded pool of pollers.

pub mod bundle;
pub mod engine;
pub mod pool;

pub use engine::{Engine, Outcome};
pub use pool::{ShutdownHandle, WorkerPool};
