//! Layered application configuration.
//!
//! Configuration is assembled from (lowest to highest precedence):
//! `config/default.toml`, `config/{environment}.toml`, `config/local.toml`,
//! then environment variables prefixed `EXPOZY_` (double-underscore
//! separated for nested keys, e.g. `EXPOZY_WORKER__CONCURRENCY=8`).
//! Loading is fatal-on-error: a missing required value or malformed URL
//! aborts startup rather than falling back to a silent default.

mod loader;

pub use loader::ConfigLoader;

use expozy_core::telemetry::TelemetryConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppMetadata,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub preview: PreviewConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Application metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppMetadata {
    pub name: String,
    pub version: String,
    pub environment: String,
}

impl Default for AppMetadata {
    fn default() -> Self {
        Self {
            name: "expozy-orchestrator".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Ingest HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_secs: 2,
            max_body_bytes: 1024 * 1024,
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Postgres connection configuration backing the Store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub min_connections: u32,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("DATABASE_URL").unwrap_or_default(),
            min_connections: 2,
            max_connections: 10,
            connect_timeout_secs: 10,
            idle_timeout_secs: 600,
        }
    }
}

impl DatabaseConfig {
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

/// Redis connection configuration backing the Queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    pub key_prefix: String,
    pub pool_size: usize,
    /// Logical queue name; namespaces the main queue list apart from
    /// the delayed/active/dlq keys.
    #[serde(default = "default_job_queue_name")]
    pub job_queue_name: String,
}

fn default_job_queue_name() -> String {
    "page-generation".to_string()
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            key_prefix: "expozy:jobs".to_string(),
            pool_size: 10,
            job_queue_name: default_job_queue_name(),
        }
    }
}

/// Webhook ingest configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Shared secret compared against the chat transport's
    /// secret-token header. Required in production; a default-empty
    /// value is rejected by `ConfigLoader::validate`.
    pub secret_token: String,
    pub path: String,
    pub notifier_channel_capacity: usize,
    /// Outbound send token for the chat transport. `None`/empty drops
    /// notifications rather than failing the job that queued them.
    #[serde(default)]
    pub bot_token: Option<String>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            secret_token: String::new(),
            path: "/webhook/telegram".to_string(),
            notifier_channel_capacity: 256,
            bot_token: None,
        }
    }
}

/// Worker pool and retry policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub concurrency: usize,
    pub poll_interval_ms: u64,
    pub job_timeout_secs: u64,
    pub shutdown_timeout_secs: u64,
    pub max_retries: i32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            poll_interval_ms: 250,
            job_timeout_secs: 60,
            shutdown_timeout_secs: 30,
            max_retries: 3,
            retry_base_delay_ms: 1_000,
            retry_max_delay_ms: 60_000,
        }
    }
}

impl WorkerConfig {
    #[must_use]
    pub const fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }

    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// `backoff(n) = min(base * 2^(n-1), cap)`, n is 1-based attempt number.
    #[must_use]
    pub fn backoff_for_attempt(&self, attempt_no: i32) -> Duration {
        let exponent = attempt_no.saturating_sub(1).max(0) as u32;
        let scaled = self
            .retry_base_delay_ms
            .saturating_mul(1u64.checked_shl(exponent).unwrap_or(u64::MAX));
        Duration::from_millis(scaled.min(self.retry_max_delay_ms))
    }
}

/// Generative model adapter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// `"http"` for a real HTTP-backed adapter, `"mock"` for the
    /// deterministic fixture adapter used in dev/tests.
    pub provider: String,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    /// The model id sent as part of every generate request, e.g. `"gpt-4"`.
    #[serde(default = "default_ai_model")]
    pub model: String,
    pub timeout_secs: u64,
}

fn default_ai_model() -> String {
    "default".to_string()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "mock".to_string(),
            endpoint: None,
            api_key: None,
            model: default_ai_model(),
            timeout_secs: 30,
        }
    }
}

impl ModelConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    #[must_use]
    pub fn ai_model(&self) -> &str {
        &self.model
    }
}

/// Preview publication configuration. The preview file server itself is an
/// external collaborator; the worker only needs to know where to write
/// rendered bundles and how to build a public URL for one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewConfig {
    pub bundle_root: String,
    pub base_url: String,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            bundle_root: "./bundles".to_string(),
            base_url: "http://localhost:4000".to_string(),
        }
    }
}

impl PreviewConfig {
    #[must_use]
    pub fn preview_url(&self, bundle_id: &str) -> String {
        format!(
            "{}/p/{}/index.html",
            self.base_url.trim_end_matches('/'),
            bundle_id
        )
    }
}

/// Logging/metrics/tracing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub log_format: String,
    pub metrics_enabled: bool,
    pub metrics_bind_addr: String,
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
    #[serde(default = "default_sampling_ratio")]
    pub sampling_ratio: f64,
}

fn default_sampling_ratio() -> f64 {
    1.0
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: true,
            metrics_bind_addr: "0.0.0.0:9464".to_string(),
            otlp_endpoint: None,
            sampling_ratio: default_sampling_ratio(),
        }
    }
}

impl ObservabilityConfig {
    #[must_use]
    pub fn to_telemetry_config(&self, service_name: &str) -> TelemetryConfig {
        TelemetryConfig {
            enabled: self.otlp_endpoint.is_some(),
            service_name: service_name.to_string(),
            otlp_endpoint: self.otlp_endpoint.clone(),
            sampling_ratio: self.sampling_ratio,
            console_output: self.log_format != "json",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_follows_min_base_times_two_pow_n_minus_1_cap() {
        let worker = WorkerConfig {
            retry_base_delay_ms: 1_000,
            retry_max_delay_ms: 10_000,
            ..WorkerConfig::default()
        };
        assert_eq!(worker.backoff_for_attempt(1).as_millis(), 1_000);
        assert_eq!(worker.backoff_for_attempt(2).as_millis(), 2_000);
        assert_eq!(worker.backoff_for_attempt(3).as_millis(), 4_000);
        assert_eq!(worker.backoff_for_attempt(5).as_millis(), 10_000); // capped
    }

    #[test]
    fn preview_url_joins_base_and_bundle_id() {
        let preview = PreviewConfig {
            base_url: "http://localhost:4000/".to_string(),
            ..PreviewConfig::default()
        };
        assert_eq!(
            preview.preview_url("abc-123"),
            "http://localhost:4000/p/abc-123/index.html"
        );
    }

    #[test]
    fn server_config_bind_addr() {
        let server = ServerConfig::default();
        assert_eq!(server.bind_addr(), "0.0.0.0:8080");
    }
}
