//! Job directory layout, artifact listing, and the translation manifest.
//!
//! Translations are written next to the analysis output in `results/`. They
//! are told apart through `translations.json` in the job directory, not
//! through their names.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use yomi_core::naming::{is_visualization, translatable_kind, RESULTS_DIR, TRANSLATION_MANIFEST};
use yomi_core::types::JobId;

use crate::error::PipelineError;

/// Paths of one job's working directory.
#[derive(Debug, Clone)]
pub struct JobPaths {
    pub root: PathBuf,
    pub results: PathBuf,
    pub manifest: PathBuf,
}

impl JobPaths {
    pub fn new(output_folder: &Path, job_id: &JobId) -> Self {
        let root = output_folder.join(job_id.as_str());
        Self {
            results: root.join(RESULTS_DIR),
            manifest: root.join(TRANSLATION_MANIFEST),
            root,
        }
    }

    /// Create `<root>/results`.
    pub async fn create(&self) -> Result<(), PipelineError> {
        tokio::fs::create_dir_all(&self.results).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

/// One translation written by the translation stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Artifact the translation was made from.
    pub source: String,
    /// File name of the translation inside `results/`.
    pub output: String,
    pub language: String,
    pub model: String,
}

/// Record of every translation output of a job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationManifest {
    pub entries: Vec<ManifestEntry>,
}

impl TranslationManifest {
    /// Load the manifest, or an empty one when the job has none yet.
    pub async fn load(path: &Path) -> Result<Self, PipelineError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                PipelineError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn save(&self, path: &Path) -> Result<(), PipelineError> {
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| PipelineError::Io(std::io::Error::other(e)))?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    /// Record a translation, replacing an earlier one with the same output.
    pub fn record(&mut self, entry: ManifestEntry) {
        self.entries.retain(|e| e.output != entry.output);
        self.entries.push(entry);
    }

    pub fn outputs(&self) -> BTreeSet<&str> {
        self.entries.iter().map(|e| e.output.as_str()).collect()
    }

    pub fn is_translation(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.output == name)
    }
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Analysis,
    Visualization,
    Translation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub name: String,
    pub kind: ArtifactKind,
    pub size: u64,
}

/// Every file in `results/`, classified and sorted by name.
///
/// A job whose results directory does not exist yet has no artifacts.
pub async fn list_artifacts(paths: &JobPaths) -> Result<Vec<Artifact>, PipelineError> {
    let manifest = TranslationManifest::load(&paths.manifest).await?;
    let translations = manifest.outputs();

    let mut dir = match tokio::fs::read_dir(&paths.results).await {
        Ok(dir) => dir,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut artifacts = Vec::new();
    while let Some(entry) = dir.next_entry().await? {
        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let kind = if translations.contains(name.as_str()) {
            ArtifactKind::Translation
        } else if is_visualization(&entry.path()) {
            ArtifactKind::Visualization
        } else {
            ArtifactKind::Analysis
        };
        artifacts.push(Artifact {
            name,
            kind,
            size: metadata.len(),
        });
    }
    artifacts.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(artifacts)
}

/// Analysis artifacts that can be translated, in name order.
pub async fn translation_candidates(paths: &JobPaths) -> Result<Vec<PathBuf>, PipelineError> {
    Ok(list_artifacts(paths)
        .await?
        .into_iter()
        .filter(|a| a.kind == ArtifactKind::Analysis)
        .map(|a| paths.results.join(a.name))
        .filter(|p| translatable_kind(p).is_some())
        .collect())
}
