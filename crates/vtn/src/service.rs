//! HTTP surface: one POST route per well-known service path.
//!
//! The route layer is deliberately thin. Path resolution and the 404 for
//! unknown services happen here; everything else is the dispatcher's
//! job, and its [`HttpReply`](crate::dispatch::HttpReply) is passed
//! through unchanged.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use protocol::messages::Service;
use tracing::debug;

use crate::dispatch::Dispatcher;

/// Builds the axum router serving the well-known service paths.
pub fn router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .route("/OpenADR2/Simple/2.0b/:service", post(handle_service))
        .with_state(dispatcher)
}

async fn handle_service(
    State(dispatcher): State<Arc<Dispatcher>>,
    Path(segment): Path<String>,
    body: String,
) -> Response {
    let Some(service) = Service::from_path_segment(&segment) else {
        debug!(service = segment, "request for unknown service");
        return (StatusCode::NOT_FOUND, "unknown service\n").into_response();
    };

    let reply = dispatcher.dispatch(service, &body).await;
    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let content_type = if reply.body.starts_with("<?xml") {
        "application/xml"
    } else {
        "text/plain; charset=utf-8"
    };
    (status, [(header::CONTENT_TYPE, content_type)], reply.body).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_matches_service_prefix() {
        // The route literal must stay in sync with the protocol's
        // well-known prefix.
        assert_eq!(protocol::SERVICE_PREFIX, "OpenADR2/Simple/2.0b");
    }
}
