//! Storage layer for Lexica
//!
//! Every corpus owns a directory under `<data_dir>/corpora/<id>/` holding a
//! manifest and one or two generation directories with its normalized rows
//! and derived artifacts. A build stages a new generation and publishes it by
//! replacing the manifest; builds serialize on a per-corpus lock file.

mod artifact;
mod generation;
mod lock;
mod snapshot;

pub use artifact::{ArtifactEntry, ArtifactKind, Manifest};
pub use generation::{GenerationView, Publication};
pub use lock::BuildLock;
pub use snapshot::CorpusSnapshot;

use crate::corpus::Corpus;
use crate::error::{LexicaError, Result};
use artifact::MANIFEST_FILE;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const CORPORA_DIR: &str = "corpora";
const CORPUS_ID_LEN: usize = 10;

/// Root of every stored corpus
pub struct ArtifactRepository {
    root: PathBuf,
}

impl ArtifactRepository {
    /// Open (and create if needed) the repository under `data_dir`
    pub fn new(data_dir: &Path) -> Result<Self> {
        let root = data_dir.join(CORPORA_DIR);
        fs::create_dir_all(&root).map_err(|e| {
            LexicaError::io(
                e,
                format!("Failed to create corpora directory: {}", root.display()),
            )
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Ingest a JSON-lines file as a new corpus
    ///
    /// Malformed rows are skipped. The stored rows are the normalized form of
    /// the accepted ones.
    pub fn import(&self, source: &Path, id: Option<&str>) -> Result<(CorpusStore, Corpus)> {
        let corpus = Corpus::load(source)?;
        if corpus.is_empty() {
            return Err(LexicaError::EmptyCorpus);
        }

        let store = self.create(id)?;
        {
            let lock = store.lock()?;
            let mut publication = store.begin(&lock)?;
            publication.write_rows(&corpus)?;
            publication.commit()?;
        }

        tracing::info!(
            "Imported corpus {} from {}: {} messages, {} rows skipped",
            store.id(),
            source.display(),
            corpus.len(),
            corpus.skipped
        );
        Ok((store, corpus))
    }

    /// Create an empty corpus directory, generating an id when none is given
    pub fn create(&self, id: Option<&str>) -> Result<CorpusStore> {
        let id = match id {
            Some(id) => {
                validate_corpus_id(id)?;
                id.to_string()
            }
            None => generate_corpus_id(),
        };

        let dir = self.root.join(&id);
        if dir.exists() {
            return Err(LexicaError::Config(format!("Corpus already exists: {}", id)));
        }
        fs::create_dir_all(&dir).map_err(|e| {
            LexicaError::io(e, format!("Failed to create corpus directory: {}", dir.display()))
        })?;

        Ok(CorpusStore { id, dir })
    }

    /// Open an existing corpus
    pub fn open(&self, id: &str) -> Result<CorpusStore> {
        validate_corpus_id(id).map_err(|_| LexicaError::CorpusNotFound { id: id.to_string() })?;
        let dir = self.root.join(id);
        if !dir.is_dir() {
            return Err(LexicaError::CorpusNotFound { id: id.to_string() });
        }
        Ok(CorpusStore {
            id: id.to_string(),
            dir,
        })
    }

    /// Ids of every stored corpus, sorted
    pub fn list(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.root).map_err(|e| {
            LexicaError::io(e, format!("Failed to read {}", self.root.display()))
        })?;

        let mut ids: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .filter(|name| validate_corpus_id(name).is_ok())
            .collect();
        ids.sort();
        Ok(ids)
    }
}

/// Ten lowercase hex characters taken from a v4 UUID
fn generate_corpus_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(CORPUS_ID_LEN);
    id
}

fn validate_corpus_id(id: &str) -> Result<()> {
    let valid = !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(LexicaError::Config(format!("Invalid corpus id: '{}'", id)))
    }
}

/// State of one artifact as reported by `corpus ls`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactStatus {
    pub name: String,
    pub file: String,
    pub present: bool,
    pub bytes: Option<u64>,
    pub records: Option<usize>,
    pub built_at: Option<DateTime<Utc>>,
}

/// One corpus directory
#[derive(Debug, Clone)]
pub struct CorpusStore {
    id: String,
    dir: PathBuf,
}

impl CorpusStore {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Take the build lock for this corpus
    pub fn lock(&self) -> Result<BuildLock> {
        BuildLock::acquire(&self.dir, &self.id)
    }

    /// Resolve the live generation once
    pub fn view(&self) -> Result<GenerationView> {
        Ok(GenerationView::new(&self.id, &self.dir, self.manifest()?))
    }

    /// Stage a new generation on top of the live one
    pub fn begin<'a>(&'a self, lock: &'a BuildLock) -> Result<Publication<'a>> {
        Publication::begin(self, lock, self.view()?)
    }

    pub fn exists(&self, kind: ArtifactKind) -> bool {
        self.view().map(|v| v.contains(kind)).unwrap_or(false)
    }

    /// Load the normalized rows
    pub fn load_corpus(&self) -> Result<Corpus> {
        self.view()?.load_corpus()
    }

    /// Read an artifact, `None` when it has not been built
    pub fn load<T: DeserializeOwned>(&self, kind: ArtifactKind) -> Result<Option<T>> {
        self.view()?.load(kind)
    }

    /// Read an artifact that must exist
    pub fn require<T: DeserializeOwned>(&self, kind: ArtifactKind) -> Result<T> {
        self.view()?.require(kind)
    }

    pub fn manifest(&self) -> Result<Manifest> {
        let path = self.dir.join(MANIFEST_FILE);
        match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| LexicaError::json(e, format!("Failed to parse {}", path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Manifest {
                corpus_id: self.id.clone(),
                ..Manifest::default()
            }),
            Err(e) => Err(LexicaError::io(
                e,
                format!("Failed to read manifest: {}", path.display()),
            )),
        }
    }

    /// Status of every known artifact, in build order
    pub fn artifacts(&self) -> Result<Vec<ArtifactStatus>> {
        let view = self.view()?;
        Ok(ArtifactKind::ALL
            .iter()
            .map(|kind| {
                let entry = view.manifest().artifacts.get(kind.name());
                ArtifactStatus {
                    name: kind.name().to_string(),
                    file: kind.file_name().to_string(),
                    present: view.path(*kind).is_some_and(|p| p.is_file()),
                    bytes: entry.map(|e| e.bytes),
                    records: entry.map(|e| e.records),
                    built_at: entry.map(|e| e.built_at),
                }
            })
            .collect())
    }
}
