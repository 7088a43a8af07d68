/*!
 * Structural validation of translated chunks.
 *
 * Checks run in a fixed order and stop at the first failure:
 * block count, then index sequence, then timing identity.
 * Markup preservation is not verified.
 */

use std::fmt;

use log::debug;

use crate::chunking::Chunk;

use super::formatting::ValidationReport;
use super::ValidationConfig;

/// Why a candidate chunk was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The candidate has a different number of blocks
    BlockCountMismatch {
        /// Blocks in the source chunk
        expected: usize,
        /// Blocks in the candidate
        found: usize,
    },
    /// A block carries the wrong index
    IndexMismatch {
        /// Zero-based position within the chunk
        position: usize,
        /// Source index at that position
        expected: usize,
        /// Candidate index at that position
        found: usize,
    },
    /// A timing line differs from the source
    TimestampChanged {
        /// Block index
        index: usize,
        /// Source timing line
        expected: String,
        /// Candidate timing line
        found: String,
    },
    /// The translator failed before producing a usable candidate
    TranslatorError(String),
}

impl FailureReason {
    /// Stable reason code, as written to the state file and issues log
    pub fn code(&self) -> &'static str {
        match self {
            FailureReason::BlockCountMismatch { .. } => "BLOCK_COUNT_MISMATCH",
            FailureReason::IndexMismatch { .. } => "INDEX_MISMATCH",
            FailureReason::TimestampChanged { .. } => "TIMESTAMP_CHANGED",
            FailureReason::TranslatorError(_) => "TRANSLATOR_ERROR",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::BlockCountMismatch { expected, found } => write!(
                f,
                "{}: expected {} blocks, found {}",
                self.code(),
                expected,
                found
            ),
            FailureReason::IndexMismatch {
                position,
                expected,
                found,
            } => write!(
                f,
                "{}: position {} should be block {}, found {}",
                self.code(),
                position,
                expected,
                found
            ),
            FailureReason::TimestampChanged {
                index,
                expected,
                found,
            } => write!(
                f,
                "{}: block {} timing {:?} became {:?}",
                self.code(),
                index,
                expected,
                found
            ),
            FailureReason::TranslatorError(message) => write!(f, "{}: {}", self.code(), message),
        }
    }
}

/// Outcome of validating one candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Structurally identical; advisories attached
    Pass(ValidationReport),
    /// Rejected with the first failure found
    Fail(FailureReason),
}

impl Verdict {
    /// Whether the candidate was accepted
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass(_))
    }
}

/// Compares candidates against their source chunk
#[derive(Debug, Clone, Default)]
pub struct ChunkValidator {
    config: ValidationConfig,
}

impl ChunkValidator {
    /// Create a validator with the given advisory thresholds
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Advisory thresholds in use
    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Validate `candidate` against `source`. Overlap blocks are checked too, since
    /// a shifted overlap means the owned region moved.
    pub fn validate(&self, source: &Chunk, candidate: &Chunk) -> Verdict {
        if let Err(reason) = self.check_structure(source, candidate) {
            debug!("Chunk {} rejected: {}", source.id, reason);
            return Verdict::Fail(reason);
        }

        Verdict::Pass(ValidationReport::inspect(candidate.owned_blocks(), &self.config))
    }

    fn check_structure(&self, source: &Chunk, candidate: &Chunk) -> Result<(), FailureReason> {
        if source.blocks.len() != candidate.blocks.len() {
            return Err(FailureReason::BlockCountMismatch {
                expected: source.blocks.len(),
                found: candidate.blocks.len(),
            });
        }

        let pairs = || source.blocks.iter().zip(&candidate.blocks);

        if let Some((position, (src, out))) = pairs().enumerate().find(|(_, (src, out))| src.index != out.index) {
            return Err(FailureReason::IndexMismatch {
                position,
                expected: src.index,
                found: out.index,
            });
        }

        if let Some((src, out)) = pairs().find(|(src, out)| src.time_range != out.time_range) {
            return Err(FailureReason::TimestampChanged {
                index: src.index,
                expected: src.time_range.raw().to_string(),
                found: out.time_range.raw().to_string(),
            });
        }

        Ok(())
    }
}
