//! HTTP server implementation and lifecycle management.
//!
//! This module provides the core server functionality, built on top of Hyper.
//! It handles incoming TCP connections, dispatches requests through the router, and
//! manages the server lifecycle. The main entry point is the `serve` function which
//! starts an HTTP server with the provided listener and router configuration.
//! `serve_with_shutdown` additionally stops accepting new connections once a caller
//! supplied future resolves, so the process can drain in-flight requests and flush
//! the plugin cache's persistence file before exiting.
//!
//! # Examples
//!
//! ```rust,no_run
//! use pansou::{serve, router::Router, Method, responder::Responder, types::Request};
//! use tokio::net::TcpListener;
//!
//! async fn hello(_: Request) -> impl Responder {
//!     "Hello, World!".into_response()
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let listener = TcpListener::bind("127.0.0.1:8080").await?;
//! let mut router = Router::new();
//! router.route(Method::GET, "/", hello);
//! serve(listener, router).await;
//! # Ok(())
//! # }
//! ```

use hyper::{Request, server::conn::http1, service::service_fn};
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::router::Router;
use crate::types::BoxError;

/// Starts the HTTP server with the given listener and router and runs until the
/// process is killed. See [`serve_with_shutdown`] for a variant that stops on a
/// signal.
pub async fn serve(listener: TcpListener, router: Router) {
    run(listener, router).await.unwrap();
}

async fn run(listener: TcpListener, router: Router) -> Result<(), BoxError> {
    let router = Arc::new(router);
    #[cfg(feature = "plugins")]
    router.setup_plugins_once();

    tracing::info!(addr = %listener.local_addr()?, "listening");

    loop {
        let (stream, addr) = listener.accept().await?;
        spawn_connection(stream, addr, router.clone());
    }
}

/// Starts the HTTP server and stops accepting new connections once `shutdown`
/// resolves. Connections already in flight are allowed to finish; the caller is
/// responsible for awaiting any cleanup (e.g. cache persistence) after this
/// function returns.
pub async fn serve_with_shutdown<F>(listener: TcpListener, router: Router, shutdown: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Err(err) = run_with_shutdown(listener, router, shutdown).await {
        tracing::error!(%err, "server loop exited with error");
    }
}

async fn run_with_shutdown<F>(
    listener: TcpListener,
    router: Router,
    shutdown: F,
) -> Result<(), BoxError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let router = Arc::new(router);
    #[cfg(feature = "plugins")]
    router.setup_plugins_once();

    tracing::info!(addr = %listener.local_addr()?, "listening");

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, addr) = accepted?;
                spawn_connection(stream, addr, router.clone());
            }
            _ = &mut shutdown => {
                tracing::info!("shutdown signal received, no longer accepting connections");
                break;
            }
        }
    }

    Ok(())
}

fn spawn_connection(
    stream: tokio::net::TcpStream,
    addr: std::net::SocketAddr,
    router: Arc<Router>,
) {
    let io = hyper_util::rt::TokioIo::new(stream);

    tokio::spawn(async move {
        let svc = Arc::new(service_fn(move |mut req: Request<_>| {
            let router = router.clone();
            async move {
                req.extensions_mut().insert(addr);
                Ok::<_, Infallible>(router.dispatch(req).await)
            }
        }));

        let mut http = http1::Builder::new();
        http.keep_alive(true);
        let conn = http.serve_connection(io, svc).with_upgrades();

        if let Err(err) = conn.await {
            tracing::warn!(%err, "error serving connection");
        }
    });
}
