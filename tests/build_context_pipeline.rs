//! End-to-end fixture over the publicly exposed build-context pipeline (C3+C4):
//! render a Dockerfile, assemble it with a fake checkpoint tar under both
//! delivery strategies, and check the "no temp artifacts survive cleanup"
//! invariant from the testable-properties list.

use checkpointer::{build_context, dockerfile};
use std::io::Read;
use std::path::Path;

fn write_fake_checkpoint_tar(dir: &Path, name: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"not a real criu checkpoint, just fixture bytes").unwrap();
    path
}

#[test]
fn test_stream_strategy_produces_a_two_entry_gzip_tar_and_cleans_up() {
    let scratch = tempfile::tempdir().unwrap();
    let checkpoint_tar = write_fake_checkpoint_tar(scratch.path(), "c-1.tar");
    let dockerfile_path = dockerfile::render_to_temp_file("scratch", "c-1.tar").unwrap();

    let archive = build_context::assemble_stream(&dockerfile_path, &checkpoint_tar).unwrap();
    assert!(archive.exists());

    let file = std::fs::File::open(&archive).unwrap();
    let decoder = flate2::read::GzDecoder::new(file);
    let mut tar_archive = tar::Archive::new(decoder);

    let mut entries: Vec<(String, String)> = tar_archive
        .entries()
        .unwrap()
        .map(|entry| {
            let mut entry = entry.unwrap();
            let name = entry.path().unwrap().to_string_lossy().into_owned();
            let mut contents = String::new();
            entry.read_to_string(&mut contents).unwrap();
            (name, contents)
        })
        .collect();
    entries.sort();

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].0, "Dockerfile");
    assert_eq!(entries[0].1, "FROM scratch\nADD c-1.tar /\n");
    assert_eq!(entries[1].0, "c-1.tar");

    // simulate the strategy's own cleanup stack run in reverse order
    std::fs::remove_file(&archive).unwrap();
    std::fs::remove_file(&dockerfile_path).unwrap();

    assert!(!archive.exists());
    assert!(!dockerfile_path.exists());
}

#[test]
fn test_filesystem_strategy_stages_basenamed_copies_and_cleans_up() {
    let scratch = tempfile::tempdir().unwrap();
    let host_staging_dir = scratch.path().join("build-contexts");
    let checkpoint_tar = write_fake_checkpoint_tar(scratch.path(), "c-2.tar");
    let dockerfile_path = dockerfile::render_to_temp_file("scratch", "c-2.tar").unwrap();

    let staged = build_context::assemble_filesystem(
        &host_staging_dir,
        &dockerfile_path,
        &checkpoint_tar,
    )
    .unwrap();

    assert!(staged.starts_with(&host_staging_dir));
    assert_eq!(
        std::fs::read_to_string(staged.join("Dockerfile")).unwrap(),
        "FROM scratch\nADD c-2.tar /\n"
    );
    assert_eq!(
        std::fs::read(staged.join("c-2.tar")).unwrap(),
        std::fs::read(&checkpoint_tar).unwrap()
    );

    std::fs::remove_dir_all(&staged).unwrap();
    std::fs::remove_file(&dockerfile_path).unwrap();

    assert!(!staged.exists());
    assert!(!dockerfile_path.exists());
}
