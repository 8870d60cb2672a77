//! Filesystem variant: the builder pod is pinned to the local node and mounts the
//! staging directory as a host-path volume.

use super::{manifest, Assembled, Delivery};
use crate::build_context;
use crate::config::Config;
use crate::error::Result;
use crate::kubelet::NodeAgentClient;
use crate::pod_controller::{PodController, PodPhase};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub struct FsStrategy {
    pub(super) config: Arc<Config>,
    pub(super) node_agent: Arc<NodeAgentClient>,
    pub(super) pods: Arc<PodController>,
}

impl FsStrategy {
    pub fn new(config: Arc<Config>, node_agent: Arc<NodeAgentClient>, pods: Arc<PodController>) -> Self {
        Self { config, node_agent, pods }
    }
}

#[async_trait]
impl Delivery for FsStrategy {
    fn namespace(&self) -> &str {
        &self.config.local_namespace
    }

    async fn assemble(
        &self,
        dockerfile_path: &Path,
        checkpoint_tar_path: &Path,
    ) -> Result<Assembled> {
        let dir = build_context::assemble_filesystem(
            &self.config.host_staging_dir,
            dockerfile_path,
            checkpoint_tar_path,
        )?;
        Ok(Assembled::FsDir(dir))
    }

    fn manifest(&self, image_ref: &str, assembled: &Assembled) -> Pod {
        let Assembled::FsDir(dir) = assembled else {
            unreachable!("filesystem strategy always assembles a directory");
        };
        manifest::filesystem_manifest(
            &self.config.local_namespace,
            &self.config.registry_secret_name,
            image_ref,
            &self.config.local_node,
            &dir.to_string_lossy(),
        )
    }

    async fn deliver_and_wait(
        &self,
        pods: &PodController,
        pod_name: &str,
        assembled: &Assembled,
        timeout: Duration,
    ) -> Result<()> {
        let Assembled::FsDir(_) = assembled else {
            unreachable!("filesystem strategy always assembles a directory");
        };
        pods.wait_for_phase(
            &self.config.local_namespace,
            pod_name,
            PodPhase::Succeeded,
            &[PodPhase::Failed],
            timeout,
        )
        .await
    }
}
