//! Assembles the ingest router and the worker pool from one [`AppConfig`],
//! splitting "build the typed handles" from "run them": handles are
//! constructed once here and passed by value, never reached through a
//! process-wide singleton.

use axum::Router;
use expozy_config::AppConfig;
use expozy_core::{notification_channel, ChatClient, NoopChatClient, NotificationSender};
use expozy_ingest::IngestState;
use expozy_model::{EchoAdapter, HttpModelAdapter, ModelAdapter};
use expozy_queue::{InMemoryQueue, Queue, RedisQueue};
use expozy_store::{InMemoryStore, PostgresStore, Store};
use expozy_worker::{Engine, WorkerPool};
use std::sync::Arc;
use std::time::Duration;
use tower_http::compression::CompressionLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::telegram::TelegramChatClient;

/// Everything the running process needs: the ingest HTTP router, the
/// worker pool ready to `run()`, and the notifier task's receiver half
/// (already spawned by the time this returns).
pub struct App {
    pub router: Router,
    pub worker_pool: WorkerPool,
}

/// Builds every typed handle from `config` and wires them together.
///
/// Uses `InMemoryStore`/`InMemoryQueue` when the respective URL is empty
/// (local/dev convenience only — `ConfigLoader::validate` makes both
/// required outside the `development` environment), otherwise connects
/// to Postgres/Redis and runs pending migrations before accepting
/// traffic.
pub async fn build(config: &AppConfig) -> anyhow::Result<App> {
    let store: Arc<dyn Store> = if config.database.url.is_empty() {
        warn!("database.url is empty, using an in-memory Store (development only)");
        Arc::new(InMemoryStore::new())
    } else {
        let postgres = PostgresStore::connect(
            &config.database.url,
            config.database.min_connections,
            config.database.max_connections,
            config.database.connect_timeout(),
            config.database.idle_timeout(),
        )
        .await?;
        postgres.run_migrations().await?;
        Arc::new(postgres)
    };

    let queue: Arc<dyn Queue> = if config.redis.url.is_empty() {
        warn!("redis.url is empty, using an in-memory Queue (development only)");
        Arc::new(InMemoryQueue::new())
    } else {
        let redis_config = deadpool_redis::Config::from_url(&config.redis.url);
        let pool = redis_config.create_pool(Some(deadpool_redis::Runtime::Tokio1))?;
        Arc::new(RedisQueue::new(pool, &config.redis.key_prefix, &config.redis.job_queue_name))
    };

    let model: Arc<dyn ModelAdapter> = match config.model.provider.as_str() {
        "http" => {
            let endpoint = config
                .model
                .endpoint
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("model.endpoint is required for provider \"http\""))?;
            Arc::new(HttpModelAdapter::new(endpoint, &config.model.ai_model(), config.model.timeout())?)
        }
        _ => {
            info!("model.provider is not \"http\", using the deterministic echo adapter");
            Arc::new(EchoAdapter::new())
        }
    };

    let chat_client: Arc<dyn ChatClient> = match &config.webhook.bot_token {
        Some(token) if !token.is_empty() => Arc::new(TelegramChatClient::new(token.clone())?),
        _ => {
            warn!("webhook.bot_token is empty, outbound notifications are dropped (development only)");
            Arc::new(NoopChatClient)
        }
    };

    let (notifier, receiver) = notification_channel(config.webhook.notifier_channel_capacity);
    tokio::spawn(expozy_core::run_notifier(receiver, chat_client));

    let ingest_state = IngestState::new(
        store.clone(),
        queue.clone(),
        config.webhook.secret_token.clone(),
        notifier.clone(),
        config.server.request_timeout(),
    );

    let router = expozy_ingest::router(&config.webhook.path, ingest_state).layer((
        TraceLayer::new_for_http(),
        CompressionLayer::new(),
        TimeoutLayer::new(Duration::from_secs(config.server.request_timeout_secs + 1)),
    ));

    let engine = Engine {
        store,
        queue: queue.clone(),
        model,
        worker: config.worker.clone(),
        preview: config.preview.clone(),
        notifier,
        provider_name: config.model.provider.clone(),
    };
    let worker_pool = WorkerPool::new(engine, queue);

    Ok(App { router, worker_pool })
}
