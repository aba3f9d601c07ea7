//! Artifact kinds, manifest and atomic file publishing

use crate::error::{LexicaError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// zstd level used for compressed artifacts
const COMPRESSION_LEVEL: i32 = 3;

/// Every file a corpus directory can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArtifactKind {
    /// Normalized corpus rows supplied by ingestion
    Rows,
    Meta,
    Lexical,
    Vectors,
    Graph,
    Authority,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 6] = [
        ArtifactKind::Rows,
        ArtifactKind::Meta,
        ArtifactKind::Lexical,
        ArtifactKind::Vectors,
        ArtifactKind::Graph,
        ArtifactKind::Authority,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            ArtifactKind::Rows => "rows.jsonl",
            ArtifactKind::Meta => "meta.json",
            ArtifactKind::Lexical => "lexical.json",
            ArtifactKind::Vectors => "vectors.json.zst",
            ArtifactKind::Graph => "graph.json",
            ArtifactKind::Authority => "global_scores.json",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ArtifactKind::Rows => "rows",
            ArtifactKind::Meta => "meta",
            ArtifactKind::Lexical => "lexical",
            ArtifactKind::Vectors => "vectors",
            ArtifactKind::Graph => "graph",
            ArtifactKind::Authority => "authority",
        }
    }

    pub fn compressed(&self) -> bool {
        matches!(self, ArtifactKind::Vectors)
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Record of one published artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub file: String,
    /// BLAKE3 digest of the bytes on disk
    pub blake3: String,
    pub bytes: u64,
    pub records: usize,
    pub built_at: DateTime<Utc>,
}

/// Per-corpus pointer to the live generation and what it holds
///
/// Replacing this file is the single switch that makes a build visible.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub corpus_id: String,
    /// Directory name under `generations/`, `None` before the first publish
    #[serde(default)]
    pub generation: Option<String>,
    #[serde(default)]
    pub artifacts: BTreeMap<String, ArtifactEntry>,
}

pub(crate) const MANIFEST_FILE: &str = "manifest.json";

/// Encode an artifact value into the bytes stored on disk
pub(crate) fn encode<T: Serialize>(kind: ArtifactKind, value: &T) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(value)
        .map_err(|e| LexicaError::json(e, format!("Failed to serialize {} artifact", kind)))?;

    if kind.compressed() {
        zstd::encode_all(json.as_slice(), COMPRESSION_LEVEL)
            .map_err(|e| LexicaError::io(e, format!("Failed to compress {} artifact", kind)))
    } else {
        Ok(json)
    }
}

/// Decode bytes read from disk
pub(crate) fn decode<T: serde::de::DeserializeOwned>(kind: ArtifactKind, bytes: &[u8]) -> Result<T> {
    let json = if kind.compressed() {
        zstd::decode_all(bytes)
            .map_err(|e| LexicaError::io(e, format!("Failed to decompress {} artifact", kind)))?
    } else {
        bytes.to_vec()
    };

    serde_json::from_slice(&json)
        .map_err(|e| LexicaError::json(e, format!("Failed to parse {} artifact", kind)))
}

/// Write `data` to `path` through a temp file in the same directory
///
/// Readers either see the previous file or the complete new one.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let temp_path = temp_path(path)?;

    let mut file = fs::File::create(&temp_path).map_err(|e| {
        LexicaError::io(e, format!("Failed to create temp file: {}", temp_path.display()))
    })?;
    let written = file
        .write_all(data)
        .and_then(|_| file.sync_all())
        .map_err(|e| LexicaError::io(e, format!("Failed to write temp file: {}", temp_path.display())));
    drop(file);

    if let Err(e) = written {
        fs::remove_file(&temp_path).ok();
        return Err(e);
    }

    fs::rename(&temp_path, path).map_err(|e| {
        fs::remove_file(&temp_path).ok();
        LexicaError::io(
            e,
            format!(
                "Failed to publish {} -> {}",
                temp_path.display(),
                path.display()
            ),
        )
    })
}

fn temp_path(path: &Path) -> Result<PathBuf> {
    let parent = path
        .parent()
        .ok_or_else(|| LexicaError::Config(format!("Invalid artifact path: {}", path.display())))?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| LexicaError::Config(format!("Invalid artifact path: {}", path.display())))?;

    Ok(parent.join(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4().simple())))
}

pub(crate) fn digest(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_atomic_replaces_and_leaves_no_temp() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("graph.json");

        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"second");
        let leftovers: Vec<_> = fs::read_dir(temp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_compressed_artifacts_decode() {
        let values = vec![vec![0.5f32, 0.25], vec![1.0, 0.0]];
        let bytes = encode(ArtifactKind::Vectors, &values).unwrap();
        // zstd frame magic
        assert_eq!(&bytes[..4], &[0x28, 0xb5, 0x2f, 0xfd]);
        let back: Vec<Vec<f32>> = decode(ArtifactKind::Vectors, &bytes).unwrap();
        assert_eq!(back, values);
    }

    #[test]
    fn test_digest_is_stable() {
        assert_eq!(digest(b"lexica"), digest(b"lexica"));
        assert_ne!(digest(b"lexica"), digest(b"lexicon"));
        assert_eq!(digest(b"").len(), 64);
    }
}
