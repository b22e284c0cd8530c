use mcprouter::{config::RouterConfig, handlers, services::RouterService, AppState};

use axum::http::header;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mcprouter=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = RouterConfig::from_env()?;

    let router = RouterService::from_config(&config);
    tracing::info!(
        providers = ?router.registry().provider_names(),
        "Discovery providers ready"
    );

    let app_state = AppState::new(router);

    let cors_layer = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::CACHE_CONTROL]);

    let app = handlers::routes(app_state)
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http());

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown signal received");
            }
            shutdown.cancel();
        }
    });

    tracing::info!("Router running on http://{}", config.bind);

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    tracing::info!("Router stopped");
    Ok(())
}
