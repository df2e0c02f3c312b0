#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use grader_extract::document::{Document, document_from_json};
use serde_json::Value;
use tempfile::{TempDir, tempdir};

/// Returns the absolute path to a fixture under `tests/data`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

/// Converts a `json!` literal into a source document.
pub fn doc(value: Value) -> Document {
    document_from_json(value).expect("document literal must be a JSON object")
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    /// Writes one JSON document per line as `<dir>/<collection>.jsonl`.
    pub fn write_collection(&self, dir: &str, collection: &str, docs: &[Value]) -> PathBuf {
        let lines = docs
            .iter()
            .map(|doc| serde_json::to_string(doc).expect("serialize doc"))
            .collect::<Vec<_>>()
            .join("\n");
        self.write(&format!("{dir}/{collection}.jsonl"), &lines);
        self.path().join(dir)
    }
}
