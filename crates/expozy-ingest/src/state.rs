//! Shared state for the ingest router.

use expozy_core::NotificationSender;
use expozy_queue::Queue;
use expozy_store::Store;
use std::sync::Arc;
use std::time::Duration;

/// Everything the webhook handler needs, injected explicitly at startup:
/// typed handles, not process-wide singletons.
#[derive(Clone)]
pub struct IngestState {
    pub store: Arc<dyn Store>,
    pub queue: Arc<dyn Queue>,
    /// Compared in constant time against the request's secret-token header.
    pub secret_token: Arc<str>,
    pub notifier: NotificationSender,
    /// Ingress deadline; wraps the Store+Queue work so the handler still
    /// returns within budget under downstream latency.
    pub ingress_deadline: Duration,
}

impl IngestState {
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        queue: Arc<dyn Queue>,
        secret_token: impl Into<Arc<str>>,
        notifier: NotificationSender,
        ingress_deadline: Duration,
    ) -> Self {
        Self {
            store,
            queue,
            secret_token: secret_token.into(),
            notifier,
            ingress_deadline,
        }
    }
}
