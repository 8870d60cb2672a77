//! Core data types shared across components.

use crate::error::ErrorKind;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Immutable triple identifying a container within the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerRef {
    pub namespace: String,
    pub pod: String,
    pub container: String,
}

impl ContainerRef {
    pub fn new(
        namespace: impl Into<String>,
        pod: impl Into<String>,
        container: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            pod: pod.into(),
            container: container.into(),
        }
    }
}

impl std::fmt::Display for ContainerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.namespace, self.pod, self.container)
    }
}

/// The input to one checkpoint run.
#[derive(Debug, Clone)]
pub struct CheckpointParams {
    pub target: ContainerRef,
    pub delete_after: bool,
    pub job_id: String,
}

impl CheckpointParams {
    /// Generates a fresh 16 hex-char job id from 8 cryptographically random bytes.
    pub fn new(target: ContainerRef, delete_after: bool) -> Self {
        Self {
            target,
            delete_after,
            job_id: generate_job_id(),
        }
    }
}

pub fn generate_job_id() -> String {
    let mut bytes = [0u8; 8];
    rand::rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// A structured, persisted failure — see DESIGN.md ambiguity (b).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Failure {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&crate::error::Error> for Failure {
    fn from(err: &crate::error::Error) -> Self {
        Failure {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// The terminal record of a completed checkpoint, written exactly once per job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointEntry {
    pub container_identifier: ContainerRef,
    pub begin_timestamp: i64,
    pub end_timestamp: i64,
    pub container_image_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Failure>,
}

/// The external identifier returned to an async caller: `<nodeName>:<jobId>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingHandle {
    pub node: String,
    pub job_id: String,
}

impl TrackingHandle {
    pub fn new(node: impl Into<String>, job_id: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            job_id: job_id.into(),
        }
    }

    /// Splits at the first `:`, per the invariant that the node name itself never
    /// contains a colon (enforced by Kubernetes DNS-label naming rules).
    pub fn parse(s: &str) -> Option<Self> {
        let (node, job_id) = s.split_once(':')?;
        if node.is_empty() || job_id.is_empty() {
            return None;
        }
        Some(Self::new(node, job_id))
    }
}

impl std::fmt::Display for TrackingHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.node, self.job_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_is_16_lowercase_hex_chars() {
        let id = generate_job_id();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_tracking_handle_round_trips() {
        let handle = TrackingHandle::new("node-a", "deadbeefcafef00d");
        let s = handle.to_string();
        assert_eq!(s, "node-a:deadbeefcafef00d");
        assert_eq!(TrackingHandle::parse(&s), Some(handle));
    }

    #[test]
    fn test_tracking_handle_splits_at_first_colon_only() {
        // node names never contain ':' in practice, but the parser must not choke
        // if a job id somehow did.
        let parsed = TrackingHandle::parse("node-a:abc:def").unwrap();
        assert_eq!(parsed.node, "node-a");
        assert_eq!(parsed.job_id, "abc:def");
    }

    #[test]
    fn test_tracking_handle_rejects_malformed_input() {
        assert_eq!(TrackingHandle::parse("no-colon-here"), None);
        assert_eq!(TrackingHandle::parse(":missing-node"), None);
        assert_eq!(TrackingHandle::parse("missing-job:"), None);
    }

    #[test]
    fn test_checkpoint_entry_round_trips_through_json() {
        let entry = CheckpointEntry {
            container_identifier: ContainerRef::new("ns", "pod", "container"),
            begin_timestamp: 100,
            end_timestamp: 105,
            container_image_name: "registry.example/app:deadbeefcafef00d".into(),
            error: None,
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert!(!json.contains("\"error\""));
        let parsed: CheckpointEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.container_image_name, entry.container_image_name);
    }
}
