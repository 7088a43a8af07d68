/*!
 * Run and chunk state models.
 *
 * These structures are what gets persisted in the run directory: the manifest
 * written at split time and the per-chunk status records rewritten after every
 * transition.
 */

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::chunking::Chunk;
use crate::errors::ResumeMismatch;

/// Lifecycle status of a single chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChunkStatus {
    /// Waiting to be dispatched
    Pending,
    /// Dispatched to the translator, verdict not yet recorded
    InProgress,
    /// Candidate passed validation; terminal
    Validated,
    /// Attempts exhausted; terminal, aborts the run
    Failed,
}

impl fmt::Display for ChunkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkStatus::Pending => write!(f, "PENDING"),
            ChunkStatus::InProgress => write!(f, "IN_PROGRESS"),
            ChunkStatus::Validated => write!(f, "VALIDATED"),
            ChunkStatus::Failed => write!(f, "FAILED"),
        }
    }
}

impl std::str::FromStr for ChunkStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PENDING" => Ok(ChunkStatus::Pending),
            "IN_PROGRESS" => Ok(ChunkStatus::InProgress),
            "VALIDATED" => Ok(ChunkStatus::Validated),
            "FAILED" => Ok(ChunkStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid chunk status: {}", s)),
        }
    }
}

/// Status record for one chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkState {
    /// Chunk id (1-based, matches the chunk file number)
    pub chunk_id: usize,
    /// Current status
    pub status: ChunkStatus,
    /// Completed attempts, passing or failing
    pub attempts: u32,
    /// Last failure reason, if any
    #[serde(default)]
    pub last_error: Option<String>,
    /// Context revision committed together with this chunk's pass
    #[serde(default)]
    pub context_revision: Option<u64>,
    /// Time of the last transition (RFC 3339)
    pub updated_at: String,
}

impl ChunkState {
    /// A fresh PENDING record
    pub fn pending(chunk_id: usize) -> Self {
        Self {
            chunk_id,
            status: ChunkStatus::Pending,
            attempts: 0,
            last_error: None,
            context_revision: None,
            updated_at: now_rfc3339(),
        }
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = now_rfc3339();
    }
}

/// Result of one dispatched attempt, fed to the tracker
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    /// Candidate validated; the context now stands at `context_revision`
    Passed {
        /// Context revision including this chunk's amendment (if any)
        context_revision: u64,
    },
    /// Candidate rejected or translator failed
    Failed {
        /// Human-readable reason, stored as `last_error`
        reason: String,
    },
}

/// What the orchestrator should do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAction {
    /// Dispatch this chunk
    Dispatch(usize),
    /// Every chunk is validated
    RunComplete,
    /// This chunk is FAILED; the run cannot continue
    RunFailed(usize),
}

/// Counts per status, for display
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerSummary {
    /// Total chunks
    pub total: usize,
    /// PENDING chunks
    pub pending: usize,
    /// IN_PROGRESS chunks
    pub in_progress: usize,
    /// VALIDATED chunks
    pub validated: usize,
    /// FAILED chunks
    pub failed: usize,
    /// Sum of attempts over all chunks
    pub attempts: u32,
}

impl TrackerSummary {
    /// Percentage of validated chunks
    pub fn completion_percentage(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.validated as f64 / self.total as f64) * 100.0
    }
}

impl fmt::Display for TrackerSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} validated ({:.1}%), {} pending, {} in progress, {} failed, {} attempts",
            self.validated,
            self.total,
            self.completion_percentage(),
            self.pending,
            self.in_progress,
            self.failed,
            self.attempts
        )
    }
}

/// Contents of `state.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateFile {
    /// Run the records belong to
    pub run_id: String,
    /// One record per chunk, in chunk order
    pub chunks: Vec<ChunkState>,
}

/// Identity of a source file, used to detect stale resumes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceIdentity {
    /// File name (informational)
    pub file_name: String,
    /// SHA-256 of the raw file bytes, lowercase hex
    pub sha256: String,
    /// Size of the raw file in bytes
    pub size_bytes: u64,
}

impl SourceIdentity {
    /// Compute the identity of in-memory file contents
    pub fn from_bytes(file_name: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            file_name: file_name.into(),
            sha256: format!("{:x}", Sha256::digest(bytes)),
            size_bytes: bytes.len() as u64,
        }
    }

    /// First characters of the hash, for log lines
    pub fn short_hash(&self) -> &str {
        &self.sha256[..8.min(self.sha256.len())]
    }
}

/// Persisted boundaries of one chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkBoundary {
    /// Chunk id
    pub id: usize,
    /// First owned position (zero-based, inclusive)
    pub start: usize,
    /// Last owned position (zero-based, exclusive)
    pub end: usize,
    /// Leading blocks borrowed from the previous chunk
    pub overlap_head: usize,
    /// Trailing blocks borrowed from the next chunk
    pub overlap_tail: usize,
}

impl ChunkBoundary {
    /// Boundaries of an existing chunk
    pub fn of(chunk: &Chunk) -> Self {
        Self {
            id: chunk.id,
            start: chunk.source_range.start,
            end: chunk.source_range.end,
            overlap_head: chunk.overlap_head,
            overlap_tail: chunk.overlap_tail,
        }
    }
}

/// Contents of `chunks/manifest.json`: provenance of the split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    /// Random id of this run
    pub run_id: String,
    /// Source the chunks were cut from
    pub source: SourceIdentity,
    /// Owned blocks per chunk
    pub chunk_size: usize,
    /// Overlap blocks on each side
    pub overlap_size: usize,
    /// Block count of the source
    pub block_count: usize,
    /// Chunk boundaries in chunk order
    pub chunks: Vec<ChunkBoundary>,
    /// Split time (RFC 3339)
    pub created_at: String,
}

impl RunManifest {
    /// Build the manifest for a fresh split
    pub fn new(
        source: SourceIdentity,
        chunk_size: usize,
        overlap_size: usize,
        block_count: usize,
        chunks: &[Chunk],
    ) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            source,
            chunk_size,
            overlap_size,
            block_count,
            chunks: chunks.iter().map(ChunkBoundary::of).collect(),
            created_at: now_rfc3339(),
        }
    }

    /// Check whether this manifest describes the same input and window
    pub fn check_matches(
        &self,
        source: &SourceIdentity,
        chunk_size: usize,
        overlap_size: usize,
    ) -> Result<(), ResumeMismatch> {
        if self.source.sha256 != source.sha256 {
            return Err(ResumeMismatch {
                reason: format!(
                    "source changed (persisted {} [{}], current {} [{}])",
                    self.source.file_name,
                    self.source.short_hash(),
                    source.file_name,
                    source.short_hash()
                ),
            });
        }
        if self.chunk_size != chunk_size || self.overlap_size != overlap_size {
            return Err(ResumeMismatch {
                reason: format!(
                    "chunk window changed (persisted {}/{}, current {}/{})",
                    self.chunk_size, self.overlap_size, chunk_size, overlap_size
                ),
            });
        }
        Ok(())
    }

    /// First characters of the run id, for log lines
    pub fn short_id(&self) -> &str {
        &self.run_id[..8.min(self.run_id.len())]
    }
}

pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
