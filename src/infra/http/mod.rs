mod clip;
mod middleware;

pub use clip::ClipState;
pub use middleware::RequestContext;

use axum::{Router, middleware as axum_middleware, routing::any};

use self::middleware::{log_responses, set_request_context};

/// Router serving `/v1/clip`. Every method is routed to the handler; the decoder decides
/// which ones are allowed.
pub fn build_router(state: ClipState) -> Router {
    Router::new()
        .route("/v1/clip", any(clip::clip))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
