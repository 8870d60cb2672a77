//! Process configuration, loaded once from the environment at startup.

use crate::error::{Error, Result};
use std::path::PathBuf;

/// Which build-context delivery strategy the checkpoint strategy uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Stdin,
    Filesystem,
}

/// Process-wide, read-only after startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub image_prefix: String,
    pub local_namespace: String,
    pub local_node: String,
    pub local_node_ip: String,
    pub template_file: PathBuf,
    pub port: u16,
    pub node_agent_port: u16,
    pub builder_timeout_seconds: u64,
    pub image_base: String,
    pub registry_secret_name: String,
    pub storage_base_path: PathBuf,
    pub agent_cert_file: PathBuf,
    pub agent_key_file: PathBuf,
    pub agent_insecure_skip_verify: bool,
    pub disable_route_forward: bool,
    pub strategy: StrategyKind,
    pub host_staging_dir: PathBuf,
    pub environment: String,
}

impl Config {
    /// Load configuration from environment variables, accumulating every missing
    /// required key into a single error instead of stopping at the first.
    pub fn from_env() -> Result<Self> {
        let mut missing = Vec::new();

        let image_prefix = require_env("CP_IMAGE_BASE", &mut missing);
        let local_namespace = require_env("POD_NAMESPACE", &mut missing);
        let local_node = require_env("NODE_NAME", &mut missing);
        let local_node_ip = require_env("NODE_IP", &mut missing);
        let template_file = require_env("DOCKERFILE_TEMPLATE", &mut missing);

        if !missing.is_empty() {
            return Err(Error::config(format!(
                "missing required environment variables: {}",
                missing.join(", ")
            )));
        }

        let environment = optional_env("ENVIRONMENT", "dev");
        if environment == "dev" {
            tracing::info!("ENVIRONMENT not set to \"prod\", defaulting to dev behavior");
        }

        let disable_route_forward = optional_bool_env("DISABLE_ROUTE_FORWARD", false);
        if disable_route_forward {
            tracing::warn!(
                "DISABLE_ROUTE_FORWARD is set; requests for containers on other nodes will 404 \
                 instead of being forwarded. Only appropriate for single-node clusters."
            );
        }

        let strategy = if optional_bool_env("USE_KANIKO_FS", false) {
            tracing::warn!(
                "USE_KANIKO_FS is set; the builder pod will be pinned to this node and needs a \
                 host-path volume mount for the staging directory."
            );
            StrategyKind::Filesystem
        } else {
            StrategyKind::Stdin
        };

        Ok(Config {
            image_prefix: image_prefix.expect("checked above"),
            local_namespace: local_namespace.expect("checked above"),
            local_node: local_node.expect("checked above"),
            local_node_ip: local_node_ip.expect("checked above"),
            template_file: template_file.expect("checked above").into(),
            port: optional_parsed_env("LISTEN_PORT", 3333),
            node_agent_port: optional_parsed_env("KUBELET_PORT", 10250),
            builder_timeout_seconds: optional_parsed_env("BUILDER_TIMEOUT_SECONDS", 30),
            image_base: optional_env("CHECKPOINT_IMAGE_BASE", "scratch"),
            registry_secret_name: optional_env("KANIKO_SECRET_NAME", "kaniko-secret"),
            storage_base_path: optional_env("STORAGE_BASE_PATH", "/tmp/checkpointer").into(),
            agent_cert_file: optional_env(
                "KUBELET_CERT_FILE",
                "/var/lib/checkpointer/pki/client.crt",
            )
            .into(),
            agent_key_file: optional_env(
                "KUBELET_CERT_KEY",
                "/var/lib/checkpointer/pki/client.key",
            )
            .into(),
            agent_insecure_skip_verify: optional_bool_env("KUBELET_ALLOW_INSECURE", false),
            disable_route_forward,
            strategy,
            host_staging_dir: optional_env("HOST_STAGING_DIR", "/tmp/build-contexts").into(),
            environment,
        })
    }

    pub fn node_agent_base_url(&self) -> String {
        format!("https://{}:{}", self.local_node_ip, self.node_agent_port)
    }
}

fn require_env(key: &str, missing: &mut Vec<String>) -> Option<String> {
    match std::env::var(key) {
        Ok(v) if !v.is_empty() => Some(v),
        _ => {
            missing.push(key.to_string());
            None
        }
    }
}

fn optional_env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn optional_bool_env(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn optional_parsed_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
