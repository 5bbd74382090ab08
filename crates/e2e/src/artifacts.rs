//! Screenshot artifacts: hashing and directory indexing

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::error::E2eResult;

/// A file produced by a case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub path: PathBuf,
    pub sha256: String,
    pub bytes: u64,
}

impl ArtifactRecord {
    /// Hash a file that exists on disk
    pub fn capture(path: &Path) -> E2eResult<Self> {
        let data = std::fs::read(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            sha256: sha256_hex(&data),
            bytes: data.len() as u64,
        })
    }
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Every PNG under `dir`, sorted by path. A missing directory is empty.
pub fn index_dir(dir: &Path) -> E2eResult<Vec<ArtifactRecord>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut records = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| std::io::Error::other(e.to_string()))?;
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().map(|e| e == "png").unwrap_or(false) {
            records.push(ArtifactRecord::capture(path)?);
        }
    }
    Ok(records)
}
