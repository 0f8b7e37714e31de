use std::time::Duration;

use clap::Parser;
use hyper::Method;
use pansou::api::handlers::{health_handler, search_handler};
use pansou::app_state::{self, AppState};
use pansou::config::{Cli, Config};
use pansou::middleware::body_limit::BodyLimit;
use pansou::middleware::IntoMiddleware;
use pansou::router::Router;
use pansou::state::set_state;
use pansou::tracing::init_tracing;

#[cfg(feature = "plugins")]
use pansou::plugins::compression::CompressionBuilder;
#[cfg(feature = "plugins")]
use pansou::plugins::cors::CorsBuilder;

/// Max request body size accepted by `/api/search`: generous enough
/// for a form post with a long channel/plugin list, small enough to bound a
/// malicious oversized upload.
const BODY_LIMIT_BYTES: usize = 256 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = Config::load(&cli)?;
    let bind_addr = config.bind_addr.clone();

    let state = app_state::bootstrap(config).await?;
    let async_plugin_cache = state.async_plugin_cache.clone();
    set_state::<AppState>(state);

    let mut router = Router::new();
    router.route(Method::GET, "/api/search", search_handler);
    router.route(Method::POST, "/api/search", search_handler);
    router.route(Method::GET, "/api/health", health_handler);
    router.middleware(BodyLimit::new(BODY_LIMIT_BYTES).into_middleware());

    #[cfg(feature = "plugins")]
    router.plugin(CorsBuilder::new().build());
    #[cfg(feature = "plugins")]
    router.plugin(CompressionBuilder::new().build());

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    tokio::spawn(async move {
        async_plugin_cache.clone().run_periodic_persist().await;
    });

    let shutdown = async {
        let ctrl_c = async {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler")
                .recv()
                .await;
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    };

    pansou::serve_with_shutdown(listener, router, shutdown).await;

    // Drain window: let an in-flight background refresh land a last update
    // before the final persistence flush.
    if let Some(state) = pansou::state::get_state::<AppState>() {
        let _ = tokio::time::timeout(Duration::from_secs(5), state.async_plugin_cache.persist_now())
            .await;
    }

    Ok(())
}
