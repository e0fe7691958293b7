//! Request dispatch: table lookup, request-document marshaling, handler
//! invocation, and response shaping.

use std::collections::BTreeMap;
use std::time::Instant;

use axum::body::{Body, to_bytes};
use axum::extract::State;
use axum::http::{Method, Request, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde_json::{Value, json};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::state::SharedRoutes;
use funcdev_core::{HandlerRequest, HttpMethod, Invoker};

/// Request bodies larger than this are rejected outright.
const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// State shared by every dispatched request.
#[derive(Clone)]
pub struct AppState {
    /// The live route table.
    pub routes: SharedRoutes,
    /// Handler executor.
    pub invoker: Invoker,
}

/// The single fallback handler behind the middleware stack.
///
/// Preflight `OPTIONS` requests short-circuit to an empty success; the
/// CORS layer decorates the response on the way out. Everything else is
/// an exact path-plus-verb lookup against the table snapshot taken at
/// entry.
pub async fn dispatch(State(state): State<AppState>, request: Request<Body>) -> Response {
    if request.method() == Method::OPTIONS {
        return StatusCode::OK.into_response();
    }

    let started = Instant::now();
    let request_id = Uuid::new_v4().to_string();
    let path = request.uri().path().to_string();
    let verb = request.method().clone();

    let Some(method) = HttpMethod::parse(verb.as_str()) else {
        return not_found(&path);
    };

    let table = state.routes.current();
    let Some(descriptor) = table.lookup(&path, method) else {
        debug!(%verb, %path, "no route");
        return not_found(&path);
    };

    let handler_request = match build_handler_request(request, method).await {
        Ok(r) => r,
        Err(response) => return response,
    };

    match state
        .invoker
        .invoke(&descriptor.module, &handler_request, &request_id)
        .await
    {
        Ok(value) => {
            info!(
                %verb,
                %path,
                request_id,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "handled"
            );
            Json(value).into_response()
        }
        Err(e) => {
            error!(
                %verb,
                %path,
                request_id,
                elapsed_ms = started.elapsed().as_millis() as u64,
                error = %e,
                "handler failed"
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Function invocation failed" })),
            )
                .into_response()
        }
    }
}

fn not_found(path: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Not found", "path": path })),
    )
        .into_response()
}

/// Turn the HTTP request into the guest-facing request document.
///
/// The body is decoded only for verbs that carry one; JSON bodies pass
/// through as structured values, anything else arrives as a string.
async fn build_handler_request(
    request: Request<Body>,
    method: HttpMethod,
) -> Result<HandlerRequest, Response> {
    let query: BTreeMap<String, String> = request
        .uri()
        .query()
        .map(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .into_owned()
                .collect()
        })
        .unwrap_or_default();

    let headers: BTreeMap<String, String> = request
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    let body = if method.carries_body() {
        let bytes = to_bytes(request.into_body(), MAX_BODY_BYTES)
            .await
            .map_err(|_| {
                (
                    StatusCode::PAYLOAD_TOO_LARGE,
                    Json(json!({ "error": "Request body too large" })),
                )
                    .into_response()
            })?;

        if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        }
    } else {
        Value::Null
    };

    Ok(HandlerRequest {
        query,
        body,
        headers,
    })
}
