//! Result Store (C7): persists terminal async-job outcomes as one file per job id
//! under `storage_base_path`. See SPEC_FULL.md §1 ambient-stack note — this plays
//! the role the original's `diskv`-backed store plays, re-expressed directly over
//! `tokio::fs` since no crate in this codebase's dependency tree fills that role.

use crate::error::Result;
use crate::model::CheckpointEntry;
use std::path::PathBuf;

pub struct ResultStore {
    base_path: PathBuf,
}

impl ResultStore {
    pub async fn new(base_path: PathBuf) -> Result<Self> {
        tokio::fs::create_dir_all(&base_path).await?;
        Ok(Self { base_path })
    }

    fn path_for(&self, job_id: &str) -> PathBuf {
        self.base_path.join(job_id)
    }

    pub async fn put(&self, job_id: &str, entry: &CheckpointEntry) -> Result<()> {
        let bytes = serde_json::to_vec(entry)?;
        let path = self.path_for(job_id);
        let tmp_path = self.base_path.join(format!("{job_id}.tmp"));
        tokio::fs::write(&tmp_path, &bytes).await?;
        tokio::fs::rename(&tmp_path, &path).await?;
        Ok(())
    }

    pub async fn get(&self, job_id: &str) -> Result<Option<CheckpointEntry>> {
        match tokio::fs::read(self.path_for(job_id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn has(&self, job_id: &str) -> bool {
        tokio::fs::metadata(self.path_for(job_id)).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ContainerRef;

    fn sample_entry() -> CheckpointEntry {
        CheckpointEntry {
            container_identifier: ContainerRef::new("ns", "pod", "container"),
            begin_timestamp: 1,
            end_timestamp: 2,
            container_image_name: "registry.example/app:deadbeefcafef00d".into(),
            error: None,
        }
    }

    #[tokio::test]
    async fn test_put_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path().to_path_buf()).await.unwrap();

        assert!(!store.has("job-1").await);
        store.put("job-1", &sample_entry()).await.unwrap();
        assert!(store.has("job-1").await);

        let fetched = store.get("job-1").await.unwrap().unwrap();
        assert_eq!(fetched.container_image_name, sample_entry().container_image_name);
    }

    #[tokio::test]
    async fn test_get_returns_none_for_unknown_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path().to_path_buf()).await.unwrap();
        assert!(store.get("missing").await.unwrap().is_none());
    }
}
