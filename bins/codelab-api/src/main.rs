mod handlers;
mod metrics;
mod routes;

use codelab_common::config::WorkspaceConfig;
use codelab_workspace::{
    BufferCache, EvaluationWorkspace, ExecutionCollaborator, HttpCollaborator, MemoryCache,
    RedisCache, TemplateSource,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use uuid::Uuid;

pub struct AppState {
    pub collaborator: Arc<dyn ExecutionCollaborator>,
    pub templates: Arc<dyn TemplateSource>,
    pub cache: Arc<dyn BufferCache>,
    pub workspaces: RwLock<HashMap<Uuid, Arc<EvaluationWorkspace>>>,
}

impl AppState {
    pub fn new(
        collaborator: Arc<dyn ExecutionCollaborator>,
        templates: Arc<dyn TemplateSource>,
        cache: Arc<dyn BufferCache>,
    ) -> Self {
        Self {
            collaborator,
            templates,
            cache,
            workspaces: RwLock::new(HashMap::new()),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
        )
        .with_target(false)
        .init();

    info!("Codelab API booting...");

    let config = WorkspaceConfig::from_env().map_err(anyhow::Error::msg)?;
    info!("Execution service: {}", config.execution_url);

    // Redis is optional; without it buffers only live as long as the process
    let cache: Arc<dyn BufferCache> = match &config.redis_url {
        Some(url) => match RedisCache::connect(url).await {
            Ok(cache) => {
                info!("Connected to Redis: {}", url);
                Arc::new(cache)
            }
            Err(e) => {
                warn!(error = %e, "Redis unavailable, using in-memory cache");
                Arc::new(MemoryCache::new())
            }
        },
        None => {
            info!("REDIS_URL not set, using in-memory cache");
            Arc::new(MemoryCache::new())
        }
    };

    let collaborator = Arc::new(HttpCollaborator::new(&config)?);
    let state = Arc::new(AppState::new(collaborator.clone(), collaborator, cache));

    metrics::register();
    let app = routes::routes().with_state(state);

    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!("HTTP server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
