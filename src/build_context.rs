//! Build-Context Assembler (C3): packages the rendered Dockerfile and checkpoint
//! tar for the builder, either as an in-memory gzipped tar (stdin strategy) or as
//! a directory on a host-accessible path (filesystem strategy).

use crate::error::Result;
use std::path::{Path, PathBuf};

/// Builds a gzipped tar at a fresh temp path containing two regular-file entries:
/// `Dockerfile` and the checkpoint tar under its basename. Archive names use only
/// file basenames regardless of source paths, mirroring `gotempsh-temps`'s in-memory
/// tar construction but written through to disk instead of held as `Bytes`, since
/// the builder pod consumes it as a file handed to `attachAndStream`.
pub fn assemble_stream(dockerfile_path: &Path, checkpoint_tar_path: &Path) -> Result<PathBuf> {
    let out_path = std::env::temp_dir().join(format!(
        "build-context-{}.tar.gz",
        crate::model::generate_job_id()
    ));

    let result = (|| -> Result<()> {
        let file = std::fs::File::create(&out_path)?;
        let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);

        append_file(&mut builder, dockerfile_path, "Dockerfile")?;
        let tar_basename = basename(checkpoint_tar_path);
        append_file(&mut builder, checkpoint_tar_path, &tar_basename)?;

        let encoder = builder.into_inner()?;
        encoder.finish()?;
        Ok(())
    })();

    if let Err(err) = result {
        let _ = std::fs::remove_file(&out_path);
        return Err(err);
    }

    Ok(out_path)
}

fn append_file<W: std::io::Write>(
    builder: &mut tar::Builder<W>,
    path: &Path,
    archive_name: &str,
) -> Result<()> {
    let mut file = std::fs::File::open(path)?;
    let metadata = file.metadata()?;
    let mut header = tar::Header::new_gnu();
    header.set_size(metadata.len());
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, archive_name, &mut file)?;
    Ok(())
}

/// Creates a fresh subdirectory under `parent_dir`, copies the checkpoint tar into
/// it under its basename, copies the Dockerfile as exactly `Dockerfile`. Returns the
/// directory path; the caller owns recursive deletion.
pub fn assemble_filesystem(
    parent_dir: &Path,
    dockerfile_path: &Path,
    checkpoint_tar_path: &Path,
) -> Result<PathBuf> {
    std::fs::create_dir_all(parent_dir)?;
    let dir = tempfile::Builder::new()
        .prefix("context-")
        .tempdir_in(parent_dir)?
        .keep();

    let result = (|| -> Result<()> {
        std::fs::copy(dockerfile_path, dir.join("Dockerfile"))?;
        let tar_basename = basename(checkpoint_tar_path);
        std::fs::copy(checkpoint_tar_path, dir.join(tar_basename))?;
        Ok(())
    })();

    if let Err(err) = result {
        let _ = std::fs::remove_dir_all(&dir);
        return Err(err);
    }

    Ok(dir)
}

fn basename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_stream_variant_produces_two_basename_entries() {
        let dockerfile = write_temp_file("Dockerfile\ncontent\n");
        let checkpoint_tar = write_temp_file("fake tar bytes");

        let archive = assemble_stream(&dockerfile, &checkpoint_tar).unwrap();
        let file = std::fs::File::open(&archive).unwrap();
        let decoder = flate2::read::GzDecoder::new(file);
        let mut tar_archive = tar::Archive::new(decoder);

        let mut names = Vec::new();
        for entry in tar_archive.entries().unwrap() {
            let mut entry = entry.unwrap();
            let path = entry.path().unwrap().to_string_lossy().into_owned();
            let mut contents = String::new();
            entry.read_to_string(&mut contents).unwrap();
            names.push((path, contents));
        }
        names.sort();

        assert_eq!(names.len(), 2);
        assert_eq!(names[0].0, "Dockerfile");
        assert_eq!(names[0].1, "Dockerfile\ncontent\n");
        assert!(names[1].0.starts_with("tmp") || !names[1].0.is_empty());

        std::fs::remove_file(archive).unwrap();
        std::fs::remove_file(dockerfile).unwrap();
        std::fs::remove_file(checkpoint_tar).unwrap();
    }

    #[test]
    fn test_filesystem_variant_copies_with_basenames() {
        let parent = tempfile::tempdir().unwrap();
        let dockerfile = write_temp_file("FROM scratch\n");
        let checkpoint_tar = write_temp_file("tar bytes");

        let dir = assemble_filesystem(parent.path(), &dockerfile, &checkpoint_tar).unwrap();
        assert!(dir.join("Dockerfile").is_file());
        let tar_basename = basename(&checkpoint_tar);
        assert!(dir.join(&tar_basename).is_file());

        std::fs::remove_dir_all(dir).unwrap();
        std::fs::remove_file(dockerfile).unwrap();
        std::fs::remove_file(checkpoint_tar).unwrap();
    }

    fn write_temp_file(contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("test-{}", crate::model::generate_job_id()));
        std::fs::write(&path, contents).unwrap();
        path
    }
}
