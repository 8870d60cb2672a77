//! Node-Agent Client (C1): mutual-TLS POST to the local node agent's checkpoint
//! endpoint.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::ContainerRef;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct CheckpointResponse {
    items: Vec<String>,
}

/// Reusable client bound to one node agent base URL and TLS identity.
pub struct NodeAgentClient {
    http: reqwest::Client,
    base_url: String,
}

impl NodeAgentClient {
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut cert_and_key = std::fs::read(&config.agent_cert_file)?;
        let key = std::fs::read(&config.agent_key_file)?;
        cert_and_key.extend_from_slice(&key);
        let identity = reqwest::Identity::from_pem(&cert_and_key)
            .map_err(|e| Error::config(format!("invalid mTLS client identity: {e}")))?;

        let http = reqwest::Client::builder()
            .identity(identity)
            .danger_accept_invalid_certs(config.agent_insecure_skip_verify)
            .build()
            .map_err(|e| Error::config(format!("could not build node agent http client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.node_agent_base_url(),
        })
    }

    /// Issues `POST <base>/checkpoint/<ns>/<pod>/<container>`. Returns the absolute
    /// on-node path to the produced checkpoint tar.
    pub async fn request_checkpoint(
        &self,
        cancel: &tokio_util::sync::CancellationToken,
        target: &ContainerRef,
    ) -> Result<String> {
        let url = format!(
            "{}/checkpoint/{}/{}/{}",
            self.base_url, target.namespace, target.pod, target.container
        );

        let response = tokio::select! {
            res = self.http.post(&url).send() => res?,
            _ = cancel.cancelled() => {
                return Err(Error::upstream_protocol("checkpoint request cancelled"));
            }
        };

        match response.status() {
            reqwest::StatusCode::NOT_FOUND => {
                Err(Error::container_not_found(target.to_string()))
            }
            reqwest::StatusCode::OK => {
                let body = response.text().await?;
                let parsed: CheckpointResponse = serde_json::from_str(&body).map_err(|e| {
                    Error::upstream_protocol(format!(
                        "malformed response from node agent: {e}: {body}"
                    ))
                })?;
                if parsed.items.len() != 1 {
                    return Err(Error::upstream_protocol(format!(
                        "expected exactly one checkpoint item, got {}: {body}",
                        parsed.items.len()
                    )));
                }
                Ok(parsed.items.into_iter().next().unwrap())
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(Error::upstream_protocol(format!(
                    "node agent responded with unexpected status {status}: {body}"
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_checkpoint_response_requires_single_item() {
        let ok: CheckpointResponse =
            serde_json::from_str(r#"{"items":["/var/lib/kubelet/checkpoints/c-1.tar"]}"#)
                .unwrap();
        assert_eq!(ok.items.len(), 1);

        let empty: CheckpointResponse = serde_json::from_str(r#"{"items":[]}"#).unwrap();
        assert_eq!(empty.items.len(), 0);
    }

    // wiremock serves plain HTTP; mTLS identity setup is exercised by
    // `from_config` directly, so these construct the client bypassing it.
    fn client_for(base_url: String) -> NodeAgentClient {
        NodeAgentClient {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    fn target() -> ContainerRef {
        ContainerRef::new("ns1", "p1", "c1")
    }

    #[tokio::test]
    async fn test_not_found_maps_to_container_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/checkpoint/ns1/p1/c1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = client_for(server.uri());
        let err = client
            .request_checkpoint(&tokio_util::sync::CancellationToken::new(), &target())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ContainerNotFound);
    }

    #[tokio::test]
    async fn test_empty_items_is_upstream_protocol_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/checkpoint/ns1/p1/c1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"items": []})))
            .mount(&server)
            .await;

        let client = client_for(server.uri());
        let err = client
            .request_checkpoint(&tokio_util::sync::CancellationToken::new(), &target())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::UpstreamProtocol);
    }

    #[tokio::test]
    async fn test_multiple_items_is_upstream_protocol_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/checkpoint/ns1/p1/c1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"items": ["/a.tar", "/b.tar"]}),
            ))
            .mount(&server)
            .await;

        let client = client_for(server.uri());
        let err = client
            .request_checkpoint(&tokio_util::sync::CancellationToken::new(), &target())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::UpstreamProtocol);
    }

    #[tokio::test]
    async fn test_single_item_returns_its_path() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/checkpoint/ns1/p1/c1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"items": ["/var/lib/kubelet/checkpoints/c-1.tar"]}),
            ))
            .mount(&server)
            .await;

        let client = client_for(server.uri());
        let tar_path = client
            .request_checkpoint(&tokio_util::sync::CancellationToken::new(), &target())
            .await
            .unwrap();
        assert_eq!(tar_path, "/var/lib/kubelet/checkpoints/c-1.tar");
    }

    #[tokio::test]
    async fn test_cancellation_aborts_the_in_flight_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/checkpoint/ns1/p1/c1"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let client = client_for(server.uri());
        let cancel = tokio_util::sync::CancellationToken::new();
        let cancel_clone = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel_clone.cancel();
        });

        let err = client.request_checkpoint(&cancel, &target()).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::UpstreamProtocol);
    }
}
