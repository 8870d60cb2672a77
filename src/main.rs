//! Checkpointer process entry point.
//!
//! ```text
//! checkpointer
//! ```
//!
//! All configuration is read from the environment (§6); there are no subcommands.
//! Boot order: tracing → config → cluster client → strategy/manager/router → serve.

use checkpointer::http::{build_router, AppState};
use checkpointer::{Config, JobManager, NodeAgentClient, PodController, ResultStore, Router, Strategy};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "checkpointer=info,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };
    let config = Arc::new(config);
    info!(
        node = %config.local_node,
        namespace = %config.local_namespace,
        strategy = ?config.strategy,
        environment = %config.environment,
        "starting checkpointer"
    );

    let kube_client = kube::Client::try_default().await?;
    let pods = Arc::new(PodController::new(kube_client));
    let node_agent = Arc::new(NodeAgentClient::from_config(&config)?);
    let strategy = Arc::new(Strategy::from_config(config.clone(), node_agent, pods.clone()));
    let store = Arc::new(ResultStore::new(config.storage_base_path.clone()).await?);
    let manager = JobManager::new(strategy, store);
    let router = Router::new(pods, config.clone());

    let state = Arc::new(AppState {
        manager,
        router,
        config: config.clone(),
    });

    // The C8 router/proxy logic lives inside the handlers themselves (it needs to
    // inspect the parsed target/tracking handle), so `disable_route_forward` is
    // honored there; this layer is just request tracing.
    let app = build_router(state).layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.port);
    info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
