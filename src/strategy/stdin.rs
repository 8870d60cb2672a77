//! Stdin variant: the builder pod is unconstrained to any node; the context tar is
//! piped into its stdin via an attach stream.

use super::{manifest, Assembled, Delivery};
use crate::build_context;
use crate::config::Config;
use crate::error::Result;
use crate::kubelet::NodeAgentClient;
use crate::pod_controller::PodController;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub struct StdinStrategy {
    pub(super) config: Arc<Config>,
    pub(super) node_agent: Arc<NodeAgentClient>,
    pub(super) pods: Arc<PodController>,
}

impl StdinStrategy {
    pub fn new(config: Arc<Config>, node_agent: Arc<NodeAgentClient>, pods: Arc<PodController>) -> Self {
        Self { config, node_agent, pods }
    }
}

#[async_trait]
impl Delivery for StdinStrategy {
    fn namespace(&self) -> &str {
        &self.config.local_namespace
    }

    async fn assemble(
        &self,
        dockerfile_path: &Path,
        checkpoint_tar_path: &Path,
    ) -> Result<Assembled> {
        let archive = build_context::assemble_stream(dockerfile_path, checkpoint_tar_path)?;
        Ok(Assembled::StreamFile(archive))
    }

    fn manifest(&self, image_ref: &str, _assembled: &Assembled) -> Pod {
        manifest::stdin_manifest(&self.config.local_namespace, &self.config.registry_secret_name, image_ref)
    }

    async fn deliver_and_wait(
        &self,
        pods: &PodController,
        pod_name: &str,
        assembled: &Assembled,
        timeout: Duration,
    ) -> Result<()> {
        let Assembled::StreamFile(archive_path) = assembled else {
            unreachable!("stdin strategy always assembles a stream file");
        };
        let file = tokio::fs::File::open(archive_path).await?;
        pods.attach_and_stream(&self.config.local_namespace, pod_name, "kaniko", file, timeout)
            .await
    }
}
