/*!
 * Chunk validation.
 *
 * A candidate chunk coming back from the translator is checked against the source
 * chunk it was produced from. Only structure is verified: block count, index order
 * and byte-identical timing. Text is free to change, including being emptied.
 *
 * # Architecture
 *
 * - `structure`: the blocking checks and the PASS/FAIL verdict
 * - `formatting`: non-blocking readability advisories attached to a PASS
 */

pub mod formatting;
pub mod structure;

use serde::{Deserialize, Serialize};

pub use formatting::{Advisory, ValidationReport};
pub use structure::{ChunkValidator, FailureReason, Verdict};

/// Thresholds for readability advisories
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Longest text line before an advisory is raised
    #[serde(default = "default_max_line_chars")]
    pub max_line_chars: usize,

    /// Most lines per block before an advisory is raised
    #[serde(default = "default_max_lines_per_block")]
    pub max_lines_per_block: usize,
}

fn default_max_line_chars() -> usize {
    45
}

fn default_max_lines_per_block() -> usize {
    2
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_line_chars: default_max_line_chars(),
            max_lines_per_block: default_max_lines_per_block(),
        }
    }
}
