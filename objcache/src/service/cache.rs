use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use libobjcache::{Reply, ReplyBody, TraceContext, TraceHeader, Verb};

use crate::error::AppError;
use crate::utils::state::AppState;

/// GET|PUT|DELETE /cache/<key>; any other method answers 406.
pub async fn cache_handler(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let trace = start_trace(&state, &headers);
    let verb = Verb::from(method.as_str());

    let result = state.dispatcher.dispatch(&trace, &verb, &key, body).await;
    if result.is_err() {
        trace.annotate_root("status_code", 500u16);
    }
    let trace_header = trace_header_value(&trace);
    trace.finish();

    let mut response = into_response(result?);
    if let Some(value) = trace_header {
        response.headers_mut().insert(TraceHeader::NAME, value);
    }
    Ok(response)
}

/// GET /health
pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

fn start_trace(state: &AppState, headers: &HeaderMap) -> TraceContext {
    let name = state.config.service_name.as_str();
    match headers
        .get(TraceHeader::NAME)
        .and_then(|value| value.to_str().ok())
        .and_then(TraceHeader::parse)
    {
        Some(header) => state.recorder.resume(name, &header),
        None => state.recorder.start(name),
    }
}

fn trace_header_value(trace: &TraceContext) -> Option<HeaderValue> {
    let header = TraceHeader {
        root: trace.trace_id().to_string(),
        parent: None,
    };
    HeaderValue::from_str(&header.to_string()).ok()
}

fn into_response(reply: Reply) -> Response {
    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    match reply.body {
        ReplyBody::Empty => status.into_response(),
        ReplyBody::Status(body) => (status, Json(body)).into_response(),
        ReplyBody::Payload(data) => {
            let content_type = if std::str::from_utf8(&data).is_ok() {
                "text/plain; charset=utf-8"
            } else {
                "application/octet-stream"
            };
            (status, [(CONTENT_TYPE, content_type)], data).into_response()
        }
    }
}
