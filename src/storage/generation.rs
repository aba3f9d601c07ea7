//! Generation directories and the publish/commit cycle
//!
//! A build stages its artifacts in a fresh `generations/<id>/` directory,
//! carrying over whatever it does not rebuild, and becomes visible only when
//! the manifest is replaced to point at it. Readers resolve the manifest once
//! and read every artifact from that one directory.

use super::artifact::{decode, digest, encode, write_atomic, MANIFEST_FILE};
use super::{ArtifactEntry, ArtifactKind, BuildLock, CorpusStore, Manifest};
use crate::corpus::Corpus;
use crate::error::{LexicaError, Result};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub(crate) const GENERATIONS_DIR: &str = "generations";

/// Read-only view of the generation the manifest pointed at when resolved
#[derive(Debug, Clone)]
pub struct GenerationView {
    corpus_id: String,
    dir: Option<PathBuf>,
    manifest: Manifest,
}

impl GenerationView {
    pub(crate) fn new(corpus_id: &str, corpus_dir: &Path, manifest: Manifest) -> Self {
        let dir = manifest
            .generation
            .as_deref()
            .map(|g| corpus_dir.join(GENERATIONS_DIR).join(g));
        Self {
            corpus_id: corpus_id.to_string(),
            dir,
            manifest,
        }
    }

    pub fn generation(&self) -> Option<&str> {
        self.manifest.generation.as_deref()
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn contains(&self, kind: ArtifactKind) -> bool {
        self.dir.is_some() && self.manifest.artifacts.contains_key(kind.name())
    }

    /// File of `kind` in this generation, `None` when not built
    pub fn path(&self, kind: ArtifactKind) -> Option<PathBuf> {
        match &self.dir {
            Some(dir) if self.contains(kind) => Some(dir.join(kind.file_name())),
            _ => None,
        }
    }

    /// Read an artifact, `None` when it has not been built
    ///
    /// An artifact listed in the manifest but missing on disk is an error.
    pub fn load<T: DeserializeOwned>(&self, kind: ArtifactKind) -> Result<Option<T>> {
        let Some(path) = self.path(kind) else {
            return Ok(None);
        };
        let bytes = fs::read(&path).map_err(|e| {
            LexicaError::io(e, format!("Failed to read artifact: {}", path.display()))
        })?;
        decode(kind, &bytes).map(Some)
    }

    /// Read an artifact that must exist
    pub fn require<T: DeserializeOwned>(&self, kind: ArtifactKind) -> Result<T> {
        self.load(kind)?
            .ok_or_else(|| LexicaError::not_built(&self.corpus_id, kind.name()))
    }

    /// Load the normalized rows
    pub fn load_corpus(&self) -> Result<Corpus> {
        let path = self
            .path(ArtifactKind::Rows)
            .ok_or_else(|| LexicaError::not_built(&self.corpus_id, ArtifactKind::Rows.name()))?;
        Corpus::load(&path)
    }
}

/// A generation being staged under the build lock
///
/// Dropping it without `commit` removes the staged directory and leaves the
/// live generation untouched.
pub struct Publication<'a> {
    store: &'a CorpusStore,
    _lock: &'a BuildLock,
    id: String,
    dir: PathBuf,
    previous: Option<String>,
    manifest: Manifest,
    written: Vec<(ArtifactKind, usize)>,
    committed: bool,
}

impl<'a> Publication<'a> {
    /// Stage a new generation seeded with the artifacts of `base`
    pub(crate) fn begin(
        store: &'a CorpusStore,
        lock: &'a BuildLock,
        base: GenerationView,
    ) -> Result<Self> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let dir = store.dir().join(GENERATIONS_DIR).join(&id);
        fs::create_dir_all(&dir).map_err(|e| {
            LexicaError::io(e, format!("Failed to create generation: {}", dir.display()))
        })?;

        let publication = Self {
            store,
            _lock: lock,
            id,
            dir,
            previous: base.manifest.generation.clone(),
            manifest: base.manifest.clone(),
            written: Vec::new(),
            committed: false,
        };

        if let Some(from) = &base.dir {
            for entry in base.manifest.artifacts.values() {
                carry_over(&from.join(&entry.file), &publication.dir.join(&entry.file))?;
            }
        }

        tracing::debug!(
            "Staging generation {} for corpus {} ({} artifacts carried over)",
            publication.id,
            store.id(),
            base.manifest.artifacts.len()
        );
        Ok(publication)
    }

    /// Serialize an artifact into the staged generation
    pub fn write<T: Serialize>(&mut self, kind: ArtifactKind, value: &T, records: usize) -> Result<()> {
        let data = encode(kind, value)?;
        self.write_bytes(kind, &data, records)
    }

    /// Stage `corpus` as the normalized rows
    pub fn write_rows(&mut self, corpus: &Corpus) -> Result<()> {
        let mut data = Vec::new();
        for message in corpus.messages() {
            serde_json::to_writer(&mut data, message)
                .map_err(|e| LexicaError::json(e, "Failed to serialize corpus row"))?;
            data.write_all(b"\n")
                .map_err(|e| LexicaError::io(e, "Failed to buffer corpus row"))?;
        }
        self.write_bytes(ArtifactKind::Rows, &data, corpus.len())
    }

    /// Artifacts written so far, in write order
    pub fn written(&self) -> &[(ArtifactKind, usize)] {
        &self.written
    }

    /// Point the manifest at this generation
    ///
    /// Older generations other than the one just replaced are removed.
    pub fn commit(mut self) -> Result<()> {
        self.manifest.corpus_id = self.store.id().to_string();
        self.manifest.generation = Some(self.id.clone());

        let bytes = serde_json::to_vec_pretty(&self.manifest)
            .map_err(|e| LexicaError::json(e, "Failed to serialize manifest"))?;
        write_atomic(&self.store.dir().join(MANIFEST_FILE), &bytes)?;
        self.committed = true;

        tracing::debug!(
            "Committed generation {} for corpus {} ({} artifacts written)",
            self.id,
            self.store.id(),
            self.written.len()
        );

        let mut keep = vec![self.id.as_str()];
        if let Some(previous) = &self.previous {
            keep.push(previous.as_str());
        }
        prune(self.store.dir(), &keep);
        Ok(())
    }

    fn write_bytes(&mut self, kind: ArtifactKind, data: &[u8], records: usize) -> Result<()> {
        write_atomic(&self.dir.join(kind.file_name()), data)?;
        self.manifest.artifacts.insert(
            kind.name().to_string(),
            ArtifactEntry {
                file: kind.file_name().to_string(),
                blake3: digest(data),
                bytes: data.len() as u64,
                records,
                built_at: Utc::now(),
            },
        );
        self.written.push((kind, records));
        Ok(())
    }
}

impl Drop for Publication<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        tracing::warn!(
            "Discarding uncommitted generation {} of corpus {}",
            self.id,
            self.store.id()
        );
        if let Err(e) = fs::remove_dir_all(&self.dir) {
            tracing::warn!("Failed to remove {}: {}", self.dir.display(), e);
        }
    }
}

/// Share an unchanged artifact with the new generation
///
/// Published files are never modified in place, so a hard link is enough.
fn carry_over(from: &Path, to: &Path) -> Result<()> {
    if fs::hard_link(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to).map(|_| ()).map_err(|e| {
        LexicaError::io(
            e,
            format!("Failed to carry over {} -> {}", from.display(), to.display()),
        )
    })
}

/// Remove every generation directory not named in `keep`
fn prune(corpus_dir: &Path, keep: &[&str]) {
    let root = corpus_dir.join(GENERATIONS_DIR);
    let entries = match fs::read_dir(&root) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Failed to list {}: {}", root.display(), e);
            return;
        }
    };

    for entry in entries.filter_map(|e| e.ok()) {
        let name = entry.file_name().to_string_lossy().to_string();
        if keep.contains(&name.as_str()) || !entry.path().is_dir() {
            continue;
        }
        match fs::remove_dir_all(entry.path()) {
            Ok(()) => tracing::debug!("Removed generation {}", name),
            Err(e) => tracing::warn!("Failed to remove generation {}: {}", name, e),
        }
    }
}
