//! HTTP handlers for the public surface (C10): `/api/search` and `/api/health`.

use hyper::Method;
use serde::Serialize;

use crate::api::dto::SearchApiRequest;
use crate::app_state::AppState;
use crate::error::AppError;
use crate::extractors::form::Form;
use crate::extractors::json::Json;
use crate::extractors::query::Query;
use crate::extractors::FromRequest;
use crate::responder::Responder;
use crate::state::get_state;
use crate::types::{Request, Response};

/// A small, uniform success envelope mirroring [`AppError`]'s error envelope
/// so every `/api/*` response has the same `{code, message, data}` shape.
#[derive(Serialize)]
struct ApiEnvelope<T: Serialize> {
    code: i32,
    message: &'static str,
    data: T,
}

impl<T: Serialize> Responder for ApiEnvelope<T> {
    fn into_response(self) -> Response {
        let bytes = serde_json::to_vec(&self).unwrap_or_else(|_| b"{}".to_vec());
        let mut resp = Response::new(crate::body::TakoBody::from(bytes::Bytes::from(bytes)));
        resp.headers_mut().insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static("application/json"),
        );
        resp
    }
}

fn ok<T: Serialize>(data: T) -> ApiEnvelope<T> {
    ApiEnvelope {
        code: 0,
        message: "success",
        data,
    }
}

fn is_json(req: &Request) -> bool {
    req.headers()
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"))
}

/// `GET/POST /api/search`: query string on GET, JSON or form body on
/// POST. All three decode to the same [`SearchApiRequest`] DTO.
pub async fn search_handler(mut req: Request) -> Response {
    let parsed = if req.method() == Method::GET {
        Query::<SearchApiRequest>::from_request(&mut req)
            .await
            .map(|q| q.0)
            .map_err(|e| AppError::input_invalid(format!("{e:?}")))
    } else if is_json(&req) {
        Json::<SearchApiRequest>::from_request(&mut req)
            .await
            .map(|j| j.0)
            .map_err(|e| AppError::input_invalid(format!("{e:?}")))
    } else {
        Form::<SearchApiRequest>::from_request(&mut req)
            .await
            .map(|f| f.0)
            .map_err(|e| AppError::input_invalid(format!("{e:?}")))
    };

    let dto = match parsed {
        Ok(dto) => dto,
        Err(err) => return err.into_response(),
    };

    let domain = match dto.into_domain() {
        Ok(domain) => domain,
        Err(msg) => return AppError::input_invalid(msg).into_response(),
    };

    let Some(state) = get_state::<AppState>() else {
        return AppError::Internal(anyhow::anyhow!("application state not initialised"))
            .into_response();
    };

    let response = state.orchestrator.search(domain).await;
    ok(response).into_response()
}

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    plugins_enabled: bool,
    plugin_count: usize,
}

impl Responder for HealthBody {
    fn into_response(self) -> Response {
        let bytes = serde_json::to_vec(&self).unwrap_or_else(|_| b"{}".to_vec());
        let mut resp = Response::new(crate::body::TakoBody::from(bytes::Bytes::from(bytes)));
        resp.headers_mut().insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static("application/json"),
        );
        resp
    }
}

/// `GET /api/health`: reports liveness and whether the CORS/compression
/// plugin layer is active, bypassing the `{code, message, data}` envelope
/// used by the rest of the API.
pub async fn health_handler(_req: Request) -> Response {
    let Some(state) = get_state::<AppState>() else {
        return AppError::Internal(anyhow::anyhow!("application state not initialised"))
            .into_response();
    };

    HealthBody {
        status: "up",
        plugins_enabled: state.config.async_plugin_enabled,
        plugin_count: state.orchestrator.plugin_count(),
    }
    .into_response()
}
