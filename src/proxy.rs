//! Router / Reverse Proxy (C8): routes incoming requests to the node hosting the
//! target container, or serves locally. Grounded on the Go
//! `web/router_proxy.go`'s `ProxyCheckpointHandler`; peer lookup by node+label is
//! grounded on `synkti-orchestrator/src/discovery.rs`'s tag-based peer discovery,
//! adapted from EC2 tags to Kubernetes pod labels and node-name field selectors.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::ContainerRef;
use crate::pod_controller::PodController;
use std::sync::Arc;

const CHECKPOINTER_LABEL_SELECTOR: &str = "app.kubernetes.io/name=checkpointer";

/// Where a given checkpoint/status request should be served.
pub enum Destination {
    /// The target lives on this node; handle the request locally.
    Local,
    /// The target lives on `node`, reachable at `peer_base_url`.
    Remote { peer_base_url: String },
}

pub struct Router {
    pods: Arc<PodController>,
    config: Arc<Config>,
    http: reqwest::Client,
}

impl Router {
    pub fn new(pods: Arc<PodController>, config: Arc<Config>) -> Self {
        Self {
            pods,
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Resolves the node hosting `target`'s pod and decides whether to serve
    /// locally or forward. Returns `None` if the target pod does not exist.
    pub async fn route_checkpoint(&self, target: &ContainerRef) -> Result<Option<Destination>> {
        if self.config.disable_route_forward {
            return Ok(Some(Destination::Local));
        }

        let node = match self
            .pods
            .node_of_pod(&target.namespace, &target.pod)
            .await?
        {
            Some(n) => n,
            None => return Ok(None),
        };

        self.route_to_node(&node).await
    }

    /// Resolves a destination from an already-known owning node name, used by the
    /// state-route middleware once a `TrackingHandle` has been parsed.
    pub async fn route_to_node(&self, node: &str) -> Result<Option<Destination>> {
        if self.config.disable_route_forward || node == self.config.local_node {
            return Ok(Some(Destination::Local));
        }

        let ip = self
            .pods
            .pod_ip_on_node(node, CHECKPOINTER_LABEL_SELECTOR)
            .await?;

        Ok(ip.map(|ip| Destination::Remote {
            peer_base_url: format!("http://{ip}:{}", self.config.port),
        }))
    }

    /// Forwards `method`/`path_and_query`/`body` verbatim to the peer, preserving
    /// headers, and returns its status and body.
    pub async fn forward(
        &self,
        peer_base_url: &str,
        method: reqwest::Method,
        path_and_query: &str,
        headers: reqwest::header::HeaderMap,
        body: Vec<u8>,
    ) -> Result<(reqwest::StatusCode, reqwest::header::HeaderMap, Vec<u8>)> {
        let url = format!("{peer_base_url}{path_and_query}");
        let response = self
            .http
            .request(method, &url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| Error::upstream_protocol(format!("forwarding to {url} failed: {e}")))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();
        Ok((status, headers, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpointer_label_selector_matches_spec() {
        assert_eq!(CHECKPOINTER_LABEL_SELECTOR, "app.kubernetes.io/name=checkpointer");
    }
}
