//! Instance corpus of one actor.

use crate::error::{ActorError, ActorResult};
use neurocube_sat::ProblemInstance;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use walkdir::WalkDir;

/// A loaded instance and where it came from.
#[derive(Debug, Clone)]
pub struct CorpusEntry {
    /// File name, used as the instance id in reports
    pub id: String,
    /// Full path
    pub path: PathBuf,
    /// Parsed instance, shared read-only
    pub instance: Arc<ProblemInstance>,
}

/// Every regular file below a directory, parsed eagerly.
#[derive(Debug, Clone)]
pub struct Corpus {
    root: PathBuf,
    entries: Vec<CorpusEntry>,
}

impl Corpus {
    /// Load every regular file under `root`, recursively, in lexicographic
    /// order of the full path. Any file that does not parse aborts the load.
    pub fn load(root: &Path) -> ActorResult<Self> {
        let mut paths = Vec::new();
        for entry in WalkDir::new(root) {
            let entry = entry.map_err(|source| ActorError::CorpusWalk {
                path: root.to_path_buf(),
                source,
            })?;
            if entry.file_type().is_file() {
                paths.push(entry.into_path());
            }
        }
        paths.sort();

        if paths.is_empty() {
            return Err(ActorError::EmptyCorpus(root.to_path_buf()));
        }

        let mut entries = Vec::with_capacity(paths.len());
        for path in paths {
            let instance = ProblemInstance::from_file(&path).map_err(|source| {
                ActorError::MalformedInstance {
                    path: path.clone(),
                    source,
                }
            })?;
            let id = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            debug!(
                %id,
                path = %path.display(),
                vars = instance.num_vars(),
                clauses = instance.num_clauses(),
                "loaded instance"
            );
            entries.push(CorpusEntry {
                id,
                path,
                instance: Arc::new(instance),
            });
        }

        info!(root = %root.display(), instances = entries.len(), "corpus loaded");
        Ok(Self {
            root: root.to_path_buf(),
            entries,
        })
    }

    /// Corpus root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Entries in play order.
    pub fn entries(&self) -> &[CorpusEntry] {
        &self.entries
    }

    /// Number of instances.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false for a loaded corpus.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
