//! Redis key layout, all namespaced under a configurable prefix.

#[derive(Debug, Clone)]
pub struct QueueKeys {
    prefix: String,
    queue_name: String,
}

impl QueueKeys {
    #[must_use]
    pub fn new(prefix: &str, queue_name: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            queue_name: queue_name.to_string(),
        }
    }

    #[must_use]
    pub fn main(&self) -> String {
        format!("{}:queue:{}", self.prefix, self.queue_name)
    }

    #[must_use]
    pub fn delayed(&self) -> String {
        format!("{}:delayed", self.prefix)
    }

    #[must_use]
    pub fn active(&self) -> String {
        format!("{}:active", self.prefix)
    }

    #[must_use]
    pub fn dlq(&self) -> String {
        format!("{}:dlq", self.prefix)
    }
}
