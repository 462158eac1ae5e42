//! Route table and handlers for the execute surface.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{Map, Value};

use conflux_engine::{Engine, EngineError, ExecuteRequest, RequestMeta};

use crate::response::{ApiResponse, Meta};

/// Cap on the logs listing.
pub const LOGS_LIMIT: usize = 100;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz_handler))
        .route(
            "/api/execute/{slug}",
            get(execute_get_handler).post(execute_post_handler),
        )
        .route("/api/execute/{slug}/test", post(execute_test_handler))
        .route("/api/execute/{slug}/logs", get(logs_handler))
        .with_state(state)
}

type EnvelopeResponse = (StatusCode, Json<ApiResponse<Value>>);

#[derive(Clone, Debug, Serialize)]
struct StatusResponse {
    status: &'static str,
}

async fn healthz_handler() -> Json<StatusResponse> {
    Json(StatusResponse { status: "ok" })
}

/// GET execution: each query value is tried as JSON first, falling back
/// to the raw string — `?id=42` arrives as a number, `?msg=hi` as a
/// string.
async fn execute_get_handler(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> EnvelopeResponse {
    let mut inputs = Map::new();
    for (key, raw) in params {
        inputs.insert(key, parse_query_value(&raw));
    }
    run_execute(state, &slug, inputs, &headers, false).await
}

async fn execute_post_handler(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> EnvelopeResponse {
    match parse_body(&body) {
        Ok(inputs) => run_execute(state, &slug, inputs, &headers, false).await,
        Err(response) => response,
    }
}

async fn execute_test_handler(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> EnvelopeResponse {
    match parse_body(&body) {
        Ok(inputs) => run_execute(state, &slug, inputs, &headers, true).await,
        Err(response) => response,
    }
}

async fn logs_handler(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> EnvelopeResponse {
    match state.engine.logs_for_slug(&slug, LOGS_LIMIT).await {
        Ok(logs) => {
            let total = logs.len();
            let data = serde_json::to_value(&logs).unwrap_or_else(|_| Value::Array(Vec::new()));
            (
                StatusCode::OK,
                Json(ApiResponse::ok_with_meta(
                    data,
                    Meta {
                        total,
                        page: None,
                        limit: Some(LOGS_LIMIT),
                    },
                )),
            )
        }
        Err(error) => error_response(&error),
    }
}

async fn run_execute(
    state: AppState,
    slug: &str,
    inputs: Map<String, Value>,
    headers: &HeaderMap,
    is_test: bool,
) -> EnvelopeResponse {
    let request = ExecuteRequest {
        inputs,
        meta: request_meta(headers),
        is_test,
    };
    match state.engine.execute(slug, request).await {
        Ok(outputs) => (
            StatusCode::OK,
            Json(ApiResponse::ok(Value::Object(outputs))),
        ),
        Err(error) => error_response(&error),
    }
}

fn parse_query_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Inputs are a named bag: an empty body is an empty map, anything other
/// than a JSON object is rejected.
fn parse_body(body: &Bytes) -> Result<Map<String, Value>, EnvelopeResponse> {
    if body.is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(bad_request(
            "INPUT_INVALID",
            "request body must be a JSON object",
        )),
        Err(e) => Err(bad_request(
            "INPUT_INVALID",
            &format!("invalid JSON body: {e}"),
        )),
    }
}

fn request_meta(headers: &HeaderMap) -> RequestMeta {
    let mut map = BTreeMap::new();
    for (name, value) in headers {
        if let Ok(text) = value.to_str() {
            map.insert(name.as_str().to_string(), text.to_string());
        }
    }
    let ip = map
        .get("x-forwarded-for")
        .map(|v| v.split(',').next().unwrap_or(v).trim().to_string());
    let user_agent = map.get("user-agent").cloned();
    RequestMeta {
        headers: map,
        ip,
        user_agent,
    }
}

fn error_response(error: &EngineError) -> EnvelopeResponse {
    let status = match error {
        EngineError::SlugNotFound { .. } => StatusCode::NOT_FOUND,
        EngineError::InputMissing { .. } | EngineError::CycleDetected { .. } => {
            StatusCode::BAD_REQUEST
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ApiResponse::err(error.code(), &error.to_string())),
    )
}

fn bad_request(code: &str, message: &str) -> EnvelopeResponse {
    (StatusCode::BAD_REQUEST, Json(ApiResponse::err(code, message)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_values_try_json_first() {
        assert_eq!(parse_query_value("42"), json!(42));
        assert_eq!(parse_query_value("true"), json!(true));
        assert_eq!(parse_query_value("\"quoted\""), json!("quoted"));
        assert_eq!(parse_query_value("hi"), json!("hi"));
        assert_eq!(parse_query_value("{\"a\":1}"), json!({"a": 1}));
    }

    #[test]
    fn empty_body_is_empty_inputs() {
        let inputs = parse_body(&Bytes::new()).unwrap();
        assert!(inputs.is_empty());
    }

    #[test]
    fn non_object_body_rejected() {
        let err = parse_body(&Bytes::from_static(b"[1,2]")).unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
        let err = parse_body(&Bytes::from_static(b"not json")).unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn forwarded_ip_takes_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "10.0.0.1, 10.0.0.2".parse().unwrap());
        headers.insert("user-agent", "curl/8".parse().unwrap());
        let meta = request_meta(&headers);
        assert_eq!(meta.ip.as_deref(), Some("10.0.0.1"));
        assert_eq!(meta.user_agent.as_deref(), Some("curl/8"));
        assert!(meta.headers.contains_key("x-forwarded-for"));
    }
}
