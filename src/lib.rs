#![cfg_attr(docsrs, feature(doc_cfg))]

//! A federated network-disk search aggregator built on a lightweight async HTTP core.
//!
//! The crate exposes a small web framework layer (routing, extractors, middleware,
//! responders) carried over from its framework origins, plus the search-specific
//! machinery layered on top: a two-level result cache, a worker pool for plugin
//! fan-out, source adapters, and the ranking/merge pipeline behind the public
//! `/api/search` endpoint.
//!
//! # High-level features
//! - Macro-free routing with dynamic path params and TSR support
//! - Type-safe handlers with extractor-based arguments (Axum-like ergonomics)
//! - Simple `Responder` trait to return strings, tuples, or full responses
//! - Middleware pipeline (body limits, etc.) and optional plugins (CORS, compression)
//!
//! # Compatibility
//! - Runtime: `tokio`
//! - HTTP: `hyper` 1.x
//!
//! # Quickstart
//!
//! ```rust
//! use pansou::{Method, router::Router, responder::Responder, types::Request};
//!
//! async fn hello(_: Request) -> impl Responder { "Hello, World!" }
//!
//! let mut router = Router::new();
//! router.route(Method::GET, "/", hello);
//! ```
//!
//! # Key concepts
//! - [router::Router] manages routes, middleware and dispatch.
//! - [extractors] parse request data (query, JSON, form, path params).
//! - [responder::Responder] converts return values into HTTP responses.
//! - [middleware] composes cross-cutting concerns.
//! - [plugins] add CORS and response compression (feature: `plugins`).
//!
//! # Feature flags
//! - `plugins` — CORS and compression middleware plugins

/// The public `/api/*` HTTP surface: DTOs and handlers.
pub mod api;

/// Shared application state, wired together at startup.
pub mod app_state;

/// Source-adapter fan-out and the per-plugin dual-channel cache.
pub mod async_plugin;

/// HTTP request and response body handling utilities.
pub mod body;

/// The two-tier (memory + disk) result cache.
pub mod cache;

/// Deterministic cache-key fingerprinting.
pub mod cache_key;

/// Channel scrapers and plugin source adapters.
pub mod adapters;

/// Environment-driven configuration.
pub mod config;

/// Crate-wide error type and its HTTP projection.
pub mod error;

/// Request data extraction utilities for parsing query params, JSON, and more.
pub mod extractors;

/// Domain model shared by the cache, pipeline, and orchestrator.
pub mod model;

/// Ties the cache, pool, adapters, and pipeline together behind one search call.
pub mod orchestrator;

/// Filter/rank/merge pipeline applied to raw adapter results.
pub mod pipeline;

/// Bounded-concurrency batch executor with a shared deadline.
pub mod pool;

/// Request handler traits and implementations.
mod handler;

/// Middleware for processing requests and responses in a pipeline.
pub mod middleware;

/// Plugin system for extending framework functionality.
#[cfg(feature = "plugins")]
#[cfg_attr(docsrs, doc(cfg(feature = "plugins")))]
pub mod plugins;

/// Response generation utilities and traits.
pub mod responder;

/// Route definition and matching logic.
mod route;

/// Request routing and dispatch functionality.
pub mod router;

/// HTTP server implementation and configuration.
mod server;

/// Application state management and dependency injection.
pub mod state;

/// Tracing subscriber initialization for structured logging.
pub mod tracing;

/// Core type definitions used throughout the framework.
pub mod types;

pub use bytes::Bytes;
pub use http::{Method, StatusCode, header};
pub use http_body_util::Full;

/// Starts the HTTP server with the given listener and router.
///
/// This is the main entry point for starting the server. The function takes
/// ownership of a TCP listener and router, then serves incoming connections until
/// the server is shut down.
///
/// # Examples
///
/// ```rust,no_run
/// use pansou::{serve, router::Router};
/// use tokio::net::TcpListener;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let listener = TcpListener::bind("127.0.0.1:8080").await?;
/// let router = Router::new();
/// serve(listener, router).await;
/// # Ok(())
/// # }
/// ```
pub use server::serve;
pub use server::serve_with_shutdown;
