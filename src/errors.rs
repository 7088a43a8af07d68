/*!
 * Error types for the chunkwise application.
 *
 * This module contains custom error types for different parts of the application,
 * using the thiserror crate for ergonomic error definitions.
 *
 * Chunk-level failures (`FailureReason` in the validation module) are not errors:
 * the orchestrator consumes them for retry accounting. Everything here either aborts
 * the run or, in the case of `ResumeMismatch`, tells the orchestrator to start over.
 */

use std::ops::Range;

use thiserror::Error;

use crate::session::models::ChunkStatus;
use crate::validation::FailureReason;

/// Errors that can occur while reading subtitle input
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SubtitleError {
    /// The input is not a well-formed SRT document
    #[error("Parse error at line {line}: {message}")]
    Parse {
        /// 1-based line number in the normalised input
        line: usize,
        /// What was wrong
        message: String,
    },

    /// The input could not be read
    #[error("Failed to read subtitle input: {0}")]
    Read(String),
}

impl SubtitleError {
    /// Shorthand for a parse error
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }
}

/// Errors raised while splitting or joining chunks
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChunkError {
    /// Nothing to split
    #[error("Cannot split an empty block sequence")]
    EmptyInput,

    /// Window parameters that cannot produce a valid partition
    #[error("Invalid chunk window: chunk_size {chunk_size}, overlap_size {overlap_size} (overlap must be smaller than chunk size)")]
    InvalidWindow {
        /// Requested owned blocks per chunk
        chunk_size: usize,
        /// Requested overlap blocks
        overlap_size: usize,
    },

    /// The joined sequence violates a global invariant
    #[error("Join integrity violation at output positions {range:?}: {message}")]
    JoinIntegrity {
        /// Zero-based positions in the joined sequence where the violation was found
        range: Range<usize>,
        /// Description of the violated invariant
        message: String,
    },
}

/// Errors that can occur when calling an external translator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranslatorError {
    /// Sending the request failed
    #[error("Translator request failed: {0}")]
    RequestFailed(String),

    /// The translator answered with something that cannot be read back as a chunk
    #[error("Failed to parse translator output: {0}")]
    ParseError(String),

    /// Error returned by a remote translator
    #[error("Translator responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the remote side
        message: String,
    },

    /// An external command exited unsuccessfully
    #[error("Translator command failed: {0}")]
    CommandFailed(String),

    /// Retrying cannot help (bad credentials, missing program, ...)
    #[error("Unrecoverable translator error: {0}")]
    Unrecoverable(String),
}

impl TranslatorError {
    /// Whether the orchestrator may count this as a failed attempt and retry
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Unrecoverable(_) => false,
            Self::ApiError { status_code, .. } => !matches!(status_code, 401 | 403),
            _ => true,
        }
    }
}

/// Errors raised by the chunk state tracker
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateError {
    /// No chunk with this id exists in the run
    #[error("Unknown chunk id: {0}")]
    UnknownChunk(usize),

    /// The requested transition is not part of the chunk lifecycle
    #[error("Chunk {chunk_id} cannot {action} while {from}")]
    InvalidTransition {
        /// Chunk being transitioned
        chunk_id: usize,
        /// Its current status
        from: ChunkStatus,
        /// The attempted action
        action: &'static str,
    },

    /// The state file could not be written
    #[error("Failed to persist chunk state: {0}")]
    Persist(String),
}

/// Persisted run state belongs to a different source or window
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Persisted run does not match the current input: {reason}")]
pub struct ResumeMismatch {
    /// Which part of the provenance differed
    pub reason: String,
}

/// Errors that abort a run
#[derive(Error, Debug)]
pub enum RunError {
    /// Malformed input, raised before any chunk work
    #[error("Subtitle error: {0}")]
    Subtitle(#[from] SubtitleError),

    /// Splitting or joining failed
    #[error("Chunk error: {0}")]
    Chunk(#[from] ChunkError),

    /// A chunk used up its attempts
    #[error("Chunk {chunk_id} failed after {attempts} attempts, last reason: {reason}")]
    RetryExhausted {
        /// The failed chunk
        chunk_id: usize,
        /// Attempts consumed
        attempts: u32,
        /// Last validator reason
        reason: FailureReason,
    },

    /// A chunk was already FAILED when the run was resumed
    #[error("Chunk {chunk_id} is marked failed ({last_error}); restart the run to try again")]
    PreviouslyFailed {
        /// The failed chunk
        chunk_id: usize,
        /// Recorded reason
        last_error: String,
    },

    /// The translator reported an error retrying cannot fix
    #[error("Translator aborted on chunk {chunk_id}: {source}")]
    TranslatorAborted {
        /// Chunk being translated
        chunk_id: usize,
        /// The translator's error
        source: TranslatorError,
    },

    /// The state tracker rejected a transition
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Reading or writing run artifacts failed
    #[error("Storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from configuration loading or validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error from a run
    #[error("Run error: {0}")]
    Run(#[from] RunError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(format!("{:#}", error))
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
