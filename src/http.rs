//! HTTP Surface (C9): decodes requests, derives identifiers, dispatches to C6/C8,
//! encodes responses. Grounded on the Go `web/checkpoint.go` handler, following
//! the newer `manager.go`-based async flow (always-blocking status reads) rather
//! than that file's superseded optional `?hang` query parameter.

use crate::config::Config;
use crate::error::{Error, ErrorKind};
use crate::manager::JobManager;
use crate::model::{CheckpointParams, ContainerRef, TrackingHandle};
use crate::proxy::{Destination, Router};
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct AppState {
    pub manager: JobManager,
    pub router: Router,
    pub config: Arc<Config>,
}

pub fn build_router(state: Arc<AppState>) -> axum::Router {
    axum::Router::new()
        .route("/checkpoint/:ns/:pod/:container", post(post_checkpoint))
        .route("/checkpoint", get(get_checkpoint))
        .with_state(state)
}

#[derive(Debug, Default)]
struct PostCheckpointBody {
    delete_pod: bool,
    is_async: bool,
}

// `async` is a Rust keyword; the wire field name is still `async` per §6.
impl PostCheckpointBody {
    fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        if bytes.is_empty() {
            return Ok(Self::default());
        }
        #[derive(Deserialize, Default)]
        #[serde(rename_all = "camelCase")]
        struct Wire {
            #[serde(default)]
            delete_pod: bool,
            #[serde(default, rename = "async")]
            is_async: bool,
        }
        let wire: Wire = serde_json::from_slice(bytes)?;
        Ok(Self {
            delete_pod: wire.delete_pod,
            is_async: wire.is_async,
        })
    }
}

async fn post_checkpoint(
    State(state): State<Arc<AppState>>,
    Path((ns, pod, container)): Path<(String, String, String)>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let target = ContainerRef::new(ns, pod, container);

    match state.router.route_checkpoint(&target).await {
        Ok(None) => return error_response(Error::container_not_found(target.to_string())),
        Ok(Some(Destination::Remote { peer_base_url })) => {
            let path = format!(
                "/checkpoint/{}/{}/{}",
                target.namespace, target.pod, target.container
            );
            return forward_or_error(&state, &peer_base_url, method, &path, headers, body.to_vec())
                .await;
        }
        Ok(Some(Destination::Local)) => {}
        Err(e) => return error_response(e),
    }

    let parsed = match PostCheckpointBody::from_json(&body) {
        Ok(p) => p,
        Err(e) => return error_response(Error::bad_request(format!("malformed request body: {e}"))),
    };

    let params = CheckpointParams::new(target, parsed.delete_pod);
    let job_id = params.job_id.clone();
    let cancel = CancellationToken::new();

    match state.manager.submit(cancel, parsed.is_async, params).await {
        Ok(Some(entry)) => (StatusCode::CREATED, axum::Json(entry)).into_response(),
        Ok(None) => {
            let handle = TrackingHandle::new(state.config.local_node.as_str(), job_id);
            let body = serde_json::json!({ "checkpointIdentifier": handle.to_string() });
            (StatusCode::ACCEPTED, axum::Json(body)).into_response()
        }
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
struct StatusQuery {
    #[serde(rename = "checkpointIdentifier")]
    checkpoint_identifier: Option<String>,
}

async fn get_checkpoint(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatusQuery>,
    method: Method,
    headers: HeaderMap,
) -> Response {
    let Some(raw) = query.checkpoint_identifier else {
        return error_response(Error::bad_request("missing checkpointIdentifier query param"));
    };
    let Some(handle) = TrackingHandle::parse(&raw) else {
        return error_response(Error::bad_request(format!(
            "malformed checkpointIdentifier: {raw}"
        )));
    };

    match state.router.route_to_node(&handle.node).await {
        Ok(Some(Destination::Remote { peer_base_url })) => {
            let path = format!("/checkpoint?checkpointIdentifier={raw}");
            return forward_or_error(&state, &peer_base_url, method, &path, headers, Vec::new())
                .await;
        }
        Ok(Some(Destination::Local)) => {}
        Ok(None) => return error_response(Error::bad_request("unknown node in checkpointIdentifier")),
        Err(e) => return error_response(e),
    }

    match state.manager.result(&handle.job_id).await {
        Ok(Some(entry)) => {
            if matches!(&entry.error, Some(f) if f.kind == ErrorKind::ContainerNotFound) {
                return StatusCode::NOT_FOUND.into_response();
            }
            (StatusCode::OK, axum::Json(entry)).into_response()
        }
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => error_response(e),
    }
}

async fn forward_or_error(
    state: &AppState,
    peer_base_url: &str,
    method: Method,
    path_and_query: &str,
    headers: HeaderMap,
    body: Vec<u8>,
) -> Response {
    match state
        .router
        .forward(peer_base_url, method, path_and_query, headers, body)
        .await
    {
        Ok((status, headers, body)) => {
            let mut response = (status, body).into_response();
            *response.headers_mut() = headers;
            response
        }
        Err(e) => error_response(e),
    }
}

fn error_response(err: Error) -> Response {
    let status = match err.kind() {
        ErrorKind::ContainerNotFound => StatusCode::NOT_FOUND,
        ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
        ErrorKind::UpstreamProtocol
        | ErrorKind::Timeout
        | ErrorKind::Io
        | ErrorKind::ClusterApi => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoint_body_defaults_to_sync_keep() {
        let parsed = PostCheckpointBody::from_json(b"{}").unwrap();
        assert!(!parsed.delete_pod);
        assert!(!parsed.is_async);
    }

    #[test]
    fn test_checkpoint_body_parses_async_keyword_field() {
        let parsed = PostCheckpointBody::from_json(br#"{"async":true,"deletePod":true}"#).unwrap();
        assert!(parsed.is_async);
        assert!(parsed.delete_pod);
    }

    #[test]
    fn test_empty_body_is_treated_as_defaults() {
        let parsed = PostCheckpointBody::from_json(b"").unwrap();
        assert!(!parsed.delete_pod);
        assert!(!parsed.is_async);
    }
}
