use std::{any::Any, panic::AssertUnwindSafe, sync::Arc};

use axum::{
    body::Body,
    extract::State,
    http::{
        HeaderMap, Request, StatusCode,
        header::{ACCEPT, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::application::{
    clip::ClipService,
    decode::{InboundRequest, decode_request},
    error::{ClipError, ErrorReport},
};

const SOURCE: &str = "webclip::http::clip";
const PDF_CONTENT_TYPE: &str = "application/pdf";
const BINARY_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Clone)]
pub struct ClipState {
    pub service: Arc<ClipService>,
    pub max_body_bytes: usize,
}

/// Entry point for `/v1/clip`. The cancellation token fires when the connection drops
/// the handler future.
pub(super) async fn clip(State(state): State<ClipState>, request: Request<Body>) -> Response {
    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();

    match AssertUnwindSafe(handle(state, request, cancel))
        .catch_unwind()
        .await
    {
        Ok(response) => response,
        Err(panic) => panic_response(panic.as_ref()),
    }
}

async fn handle(state: ClipState, request: Request<Body>, cancel: CancellationToken) -> Response {
    let (parts, body) = request.into_parts();
    let content_type = negotiate_content_type(&parts.headers);

    let body = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(body) => body,
        Err(err) => {
            return ClipError::internal(format!("failed to read request body: {err}"))
                .into_response();
        }
    };

    let inbound = InboundRequest {
        method: &parts.method,
        content_type: parts
            .headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok()),
        query: parts.uri.query(),
        body: &body,
    };
    let request = match decode_request(inbound) {
        Ok(request) => request,
        Err(err) => return ClipError::from(err).into_response(),
    };

    match state.service.clip(request, &cancel).await {
        Ok(output) => {
            if let Some(ignored) = output.ignored {
                warn!(
                    target = SOURCE,
                    kind = ignored.kind(),
                    error = %ignored,
                    "Delivered artifact despite renderer failure"
                );
            }
            (
                StatusCode::OK,
                [(CONTENT_TYPE, content_type)],
                output.bytes,
            )
                .into_response()
        }
        Err(err) => err.into_response(),
    }
}

fn negotiate_content_type(headers: &HeaderMap) -> &'static str {
    let wants_pdf = headers
        .get_all(ACCEPT)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| value.to_ascii_lowercase().contains(PDF_CONTENT_TYPE));
    if wants_pdf {
        PDF_CONTENT_TYPE
    } else {
        BINARY_CONTENT_TYPE
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn panic_response(panic: &(dyn Any + Send)) -> Response {
    let detail = panic_message(panic);
    error!(
        target = SOURCE,
        panic = %detail,
        "Clip handler panicked"
    );

    let status = StatusCode::INTERNAL_SERVER_ERROR;
    let mut response = (
        status,
        [(CONTENT_TYPE, "text/plain")],
        status.canonical_reason().unwrap_or("Internal Server Error"),
    )
        .into_response();
    ErrorReport::from_message(SOURCE, status, format!("panic: {detail}")).attach(&mut response);
    response
}
