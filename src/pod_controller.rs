//! Pod Controller (C2): thin capability layer over the cluster API.

use crate::error::{Error, Result};
use k8s_openapi::api::core::v1::Pod;
use kube::api::{AttachParams, DeleteParams, ListParams, PostParams};
use kube::{Api, Client};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWriteExt};

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Observable pod lifecycle phases relevant to this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl PodPhase {
    fn from_str(s: &str) -> Self {
        match s {
            "Pending" => PodPhase::Pending,
            "Running" => PodPhase::Running,
            "Succeeded" => PodPhase::Succeeded,
            "Failed" => PodPhase::Failed,
            _ => PodPhase::Unknown,
        }
    }
}

#[derive(Clone)]
pub struct PodController {
    client: Client,
}

impl PodController {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }

    /// Creates a pod from `spec` and returns its server-assigned name.
    pub async fn create_pod(&self, namespace: &str, spec: Pod) -> Result<String> {
        let created = self
            .api(namespace)
            .create(&PostParams::default(), &spec)
            .await
            .map_err(|e| Error::cluster_api(format!("create pod failed: {e}")))?;
        created
            .metadata
            .name
            .ok_or_else(|| Error::cluster_api("created pod has no assigned name"))
    }

    /// Deletes a pod. "Not found" is not an error (idempotent at the caller level).
    pub async fn delete_pod(&self, namespace: &str, name: &str) -> Result<()> {
        match self
            .api(namespace)
            .delete(name, &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(resp)) if resp.code == 404 => Ok(()),
            Err(e) => Err(Error::cluster_api(format!("delete pod {name} failed: {e}"))),
        }
    }

    /// Deletes a pod then polls until the API reports it gone, bounded by `timeout`.
    pub async fn delete_and_await_removal(
        &self,
        namespace: &str,
        name: &str,
        timeout: Duration,
    ) -> Result<()> {
        self.delete_pod(namespace, name).await?;

        let deadline = tokio::time::Instant::now() + timeout;
        let api = self.api(namespace);
        loop {
            match api.get(name).await {
                Err(kube::Error::Api(resp)) if resp.code == 404 => return Ok(()),
                Err(e) => return Err(Error::cluster_api(format!("get pod {name} failed: {e}"))),
                Ok(_) => {
                    if tokio::time::Instant::now() >= deadline {
                        return Err(Error::Timeout(timeout));
                    }
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
            }
        }
    }

    /// Polls at 1s cadence until `name` reaches `target` phase, fails immediately on
    /// any phase in `failure_phases`, and fails with `Timeout` at the deadline.
    pub async fn wait_for_phase(
        &self,
        namespace: &str,
        name: &str,
        target: PodPhase,
        failure_phases: &[PodPhase],
        timeout: Duration,
    ) -> Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        let api = self.api(namespace);
        loop {
            let pod = api
                .get(name)
                .await
                .map_err(|e| Error::cluster_api(format!("get pod {name} failed: {e}")))?;
            let phase = pod
                .status
                .as_ref()
                .and_then(|s| s.phase.as_deref())
                .map(PodPhase::from_str)
                .unwrap_or(PodPhase::Unknown);

            if phase == target {
                return Ok(());
            }
            if failure_phases.contains(&phase) {
                return Err(Error::cluster_api(format!(
                    "pod {name} reached unexpected phase {phase:?}"
                )));
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(Error::Timeout(timeout));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Opens a bidirectional stream to `container`'s stdin/stdout/stderr, waiting
    /// for Running before streaming and Succeeded after the stream closes.
    pub async fn attach_and_stream<R>(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        mut stdin_source: R,
        timeout: Duration,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        self.wait_for_phase(
            namespace,
            pod,
            PodPhase::Running,
            &[PodPhase::Failed, PodPhase::Succeeded],
            timeout,
        )
        .await?;

        let params = AttachParams::default()
            .container(container)
            .stdin(true)
            .stdout(true)
            .stderr(true);

        let mut attached = self
            .api(namespace)
            .attach(pod, &params)
            .await
            .map_err(|e| Error::cluster_api(format!("attach to pod {pod} failed: {e}")))?;

        if let Some(mut writer) = attached.stdin() {
            tokio::io::copy(&mut stdin_source, &mut writer)
                .await
                .map_err(Error::Io)?;
            writer
                .shutdown()
                .await
                .map_err(Error::Io)?;
        }

        attached.join().await.map_err(|e| {
            Error::cluster_api(format!("attach stream to pod {pod} ended with error: {e}"))
        })?;

        self.wait_for_phase(namespace, pod, PodPhase::Succeeded, &[PodPhase::Failed], timeout)
            .await
    }

    /// Resolves the node a pod is scheduled on. `None` if the pod does not exist.
    pub async fn node_of_pod(&self, namespace: &str, pod: &str) -> Result<Option<String>> {
        match self.api(namespace).get(pod).await {
            Ok(p) => Ok(p.spec.and_then(|s| s.node_name)),
            Err(kube::Error::Api(resp)) if resp.code == 404 => Ok(None),
            Err(e) => Err(Error::cluster_api(format!("get pod {pod} failed: {e}"))),
        }
    }

    /// Returns the IP of a single Running pod on `node_name` matching `label_selector`,
    /// or `None` if none match.
    pub async fn pod_ip_on_node(
        &self,
        node_name: &str,
        label_selector: &str,
    ) -> Result<Option<String>> {
        let api: Api<Pod> = Api::all(self.client.clone());
        let params = ListParams::default()
            .labels(label_selector)
            .fields(&format!("spec.nodeName={node_name}"));
        let list = api
            .list(&params)
            .await
            .map_err(|e| Error::cluster_api(format!("list pods on {node_name} failed: {e}")))?;

        for pod in list.items {
            let running = pod
                .status
                .as_ref()
                .and_then(|s| s.phase.as_deref())
                .map(PodPhase::from_str)
                == Some(PodPhase::Running);
            if !running {
                continue;
            }
            if let Some(ip) = pod.status.and_then(|s| s.pod_ip) {
                return Ok(Some(ip));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_parsing_is_exact() {
        assert_eq!(PodPhase::from_str("Running"), PodPhase::Running);
        assert_eq!(PodPhase::from_str("Succeeded"), PodPhase::Succeeded);
        assert_eq!(PodPhase::from_str("Bogus"), PodPhase::Unknown);
    }
}
