/*!
 * Run store: the on-disk layout of one run.
 *
 * ```text
 * <work_dir>/<source stem>/
 *   chunks/chunk_NNN.srt              split output, never modified
 *   chunks/manifest.json              source identity and chunk boundaries
 *   translated/chunk_NNN.srt          latest candidate
 *   translated/chunk_NNN.rejected.srt last rejected candidate
 *   translated/chunk_NNN.amendment.md amendment committed with the chunk
 *   context.md                        shared context document
 *   state.json                        chunk status records
 *   issues.log                        rejected candidates and advisories
 * ```
 *
 * Every JSON and markdown file is written atomically.
 */

use anyhow::{anyhow, Context, Result};
use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::chunking::{Chunk, ChunkFile};
use crate::context::{ContextAmendment, ContextDocument};
use crate::file_utils::FileManager;

use super::models::{ChunkBoundary, RunManifest, StateFile};

const CHUNKS_DIR: &str = "chunks";
const TRANSLATED_DIR: &str = "translated";
const MANIFEST_FILE: &str = "manifest.json";
const STATE_FILE: &str = "state.json";
const CONTEXT_FILE: &str = "context.md";
const ISSUES_LOG: &str = "issues.log";

/// Files of a single run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunStore {
    root: PathBuf,
}

impl RunStore {
    /// Store rooted at an explicit directory
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Store for `source` under `work_dir`, named after the source stem
    pub fn for_source<P1: AsRef<Path>, P2: AsRef<Path>>(work_dir: P1, source: P2) -> Self {
        Self::new(work_dir.as_ref().join(FileManager::sanitized_stem(source)))
    }

    /// Run directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of split chunk files
    pub fn chunks_dir(&self) -> PathBuf {
        self.root.join(CHUNKS_DIR)
    }

    /// Directory of translated candidates
    pub fn translated_dir(&self) -> PathBuf {
        self.root.join(TRANSLATED_DIR)
    }

    /// Manifest path
    pub fn manifest_path(&self) -> PathBuf {
        self.chunks_dir().join(MANIFEST_FILE)
    }

    /// State file path
    pub fn state_path(&self) -> PathBuf {
        self.root.join(STATE_FILE)
    }

    /// Context document path
    pub fn context_path(&self) -> PathBuf {
        self.root.join(CONTEXT_FILE)
    }

    /// Issues log path
    pub fn issues_log_path(&self) -> PathBuf {
        self.root.join(ISSUES_LOG)
    }

    /// Split chunk file path
    pub fn chunk_path(&self, chunk_id: usize) -> PathBuf {
        self.chunks_dir().join(Chunk::file_name_for(chunk_id))
    }

    /// Candidate file path
    pub fn candidate_path(&self, chunk_id: usize) -> PathBuf {
        self.translated_dir().join(Chunk::file_name_for(chunk_id))
    }

    /// Rejected candidate file path
    pub fn rejected_path(&self, chunk_id: usize) -> PathBuf {
        self.translated_dir()
            .join(format!("chunk_{:03}.rejected.srt", chunk_id))
    }

    /// Committed amendment file path
    pub fn amendment_path(&self, chunk_id: usize) -> PathBuf {
        self.translated_dir()
            .join(format!("chunk_{:03}.amendment.md", chunk_id))
    }

    /// Whether a split has been persisted
    pub fn has_manifest(&self) -> bool {
        FileManager::file_exists(self.manifest_path())
    }

    /// Delete every artifact of the run and recreate the empty directory
    pub fn reset(&self) -> Result<()> {
        FileManager::remove_dir_if_exists(&self.root)?;
        FileManager::ensure_dir(&self.root)?;
        debug!("Reset run directory {}", self.root.display());
        Ok(())
    }

    /// Persist split output. The manifest is written last so a split interrupted
    /// halfway is not mistaken for a complete one.
    pub fn write_split(&self, manifest: &RunManifest, chunks: &[Chunk]) -> Result<()> {
        FileManager::ensure_dir(self.chunks_dir())?;
        FileManager::ensure_dir(self.translated_dir())?;

        for chunk in chunks {
            FileManager::write_atomic(self.chunk_path(chunk.id), &chunk.to_chunk_file())?;
        }
        write_json(self.manifest_path(), manifest)?;

        debug!(
            "Persisted {} chunks to {}",
            chunks.len(),
            self.chunks_dir().display()
        );
        Ok(())
    }

    /// Read the manifest, if a split exists
    pub fn load_manifest(&self) -> Result<Option<RunManifest>> {
        read_json(self.manifest_path())
    }

    /// Rebuild the split chunks from their files
    pub fn load_chunks(&self, manifest: &RunManifest) -> Result<Vec<Chunk>> {
        manifest
            .chunks
            .iter()
            .map(|boundary| self.load_chunk_file(self.chunk_path(boundary.id), boundary))
            .collect()
    }

    /// Store the candidate produced for a chunk
    pub fn write_candidate(&self, candidate: &Chunk) -> Result<()> {
        FileManager::write_atomic(self.candidate_path(candidate.id), &candidate.to_chunk_file())
    }

    /// Store a rejected candidate for inspection
    pub fn write_rejected(&self, candidate: &Chunk) -> Result<()> {
        FileManager::write_atomic(self.rejected_path(candidate.id), &candidate.to_chunk_file())
    }

    /// Read back the candidate stored for `source`
    pub fn load_candidate(&self, source: &Chunk) -> Result<Chunk> {
        self.load_chunk_file(self.candidate_path(source.id), &ChunkBoundary::of(source))
    }

    /// Store the amendment that accompanies a passing candidate
    pub fn write_amendment(&self, chunk_id: usize, amendment: &ContextAmendment) -> Result<()> {
        FileManager::write_atomic(self.amendment_path(chunk_id), &amendment.render())
    }

    /// Read a stored amendment
    pub fn load_amendment(&self, chunk_id: usize) -> Result<Option<ContextAmendment>> {
        Ok(FileManager::read_optional(self.amendment_path(chunk_id))?
            .map(|text| ContextAmendment::parse(&text)))
    }

    /// Remove a stored amendment (the chunk passed without one)
    pub fn clear_amendment(&self, chunk_id: usize) -> Result<()> {
        FileManager::remove_file_if_exists(self.amendment_path(chunk_id))
    }

    /// Write the context document
    pub fn write_context(&self, context: &ContextDocument) -> Result<()> {
        FileManager::write_atomic(self.context_path(), &context.render())
    }

    /// Read the context document, if present
    pub fn load_context(&self) -> Result<Option<ContextDocument>> {
        Ok(FileManager::read_optional(self.context_path())?.map(|text| ContextDocument::parse(&text)))
    }

    /// Write chunk status records
    pub fn write_state(&self, state: &StateFile) -> Result<()> {
        write_json(self.state_path(), state)
    }

    /// Read chunk status records, if present
    pub fn load_state(&self) -> Result<Option<StateFile>> {
        read_json(self.state_path())
    }

    /// Append a line to the issues log
    pub fn log_issue(&self, message: &str) -> Result<()> {
        FileManager::append_to_log_file(self.issues_log_path(), message)
    }

    fn load_chunk_file(&self, path: PathBuf, boundary: &ChunkBoundary) -> Result<Chunk> {
        let content = FileManager::read_to_string(&path)?;
        let file = ChunkFile::parse(&content)
            .with_context(|| format!("Malformed chunk file: {}", path.display()))?;
        Chunk::from_boundary(boundary, file)
            .map_err(|message| anyhow!("{}: {}", path.display(), message))
    }
}

fn write_json<T: Serialize>(path: PathBuf, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;
    FileManager::write_atomic(&path, &json)
}

fn read_json<T: DeserializeOwned>(path: PathBuf) -> Result<Option<T>> {
    match FileManager::read_optional(&path)? {
        Some(text) => serde_json::from_str(&text)
            .map(Some)
            .with_context(|| format!("Failed to parse {}", path.display())),
        None => Ok(None),
    }
}
