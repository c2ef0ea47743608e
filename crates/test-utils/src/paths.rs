//! Path utilities for test datasets.
//!
//! Tests either read the small sample files checked in under `testdata/`
//! or write synthetic datasets into a temporary directory laid out the way
//! a file-backed grid source expects (`<dir>/<key>.json`).

use std::io;
use std::path::{Path, PathBuf};

use flow_common::GridData;

/// Returns the workspace root directory.
pub fn workspace_root() -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(manifest_dir)
        .parent() // crates/
        .and_then(|p| p.parent()) // workspace root
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from(manifest_dir))
}

/// Workspace-level `testdata/` directory.
pub fn testdata_dir() -> PathBuf {
    workspace_root().join("testdata")
}

/// Searches `TEST_DATA_DIR` (if set), then the workspace `testdata/`.
pub fn find_test_file(name: &str) -> Option<PathBuf> {
    let mut candidates = Vec::new();
    if let Ok(dir) = std::env::var("TEST_DATA_DIR") {
        candidates.push(PathBuf::from(dir).join(name));
    }
    candidates.push(testdata_dir().join(name));
    candidates.into_iter().find(|p| p.exists())
}

/// Creates a temporary directory that is removed when dropped.
pub fn temp_test_dir() -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix("wind_flow_")
        .tempdir()
        .expect("Failed to create temporary test directory")
}

/// Write `data` as `<dir>/<key>.json`.
pub fn write_dataset(dir: &Path, key: &str, data: &GridData) -> io::Result<PathBuf> {
    let path = dir.join(format!("{}.json", key));
    let json = serde_json::to_vec(data).map_err(io::Error::other)?;
    std::fs::write(&path, json)?;
    Ok(path)
}

/// Temporary directory populated with one file per `(key, dataset)` pair.
pub fn dataset_dir(datasets: &[(&str, &GridData)]) -> tempfile::TempDir {
    let dir = temp_test_dir();
    for (key, data) in datasets {
        write_dataset(dir.path(), key, data).expect("Failed to write test dataset");
    }
    dir
}
