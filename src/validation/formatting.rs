/*!
 * Readability advisories for translated chunks.
 *
 * Nothing here fails a chunk. Long lines and crowded blocks are reported so the
 * operator can review them, and emptied blocks are counted because they are the
 * expected result of stripping accessibility aids.
 */

use std::fmt;

use log::warn;

use crate::subtitle_processor::SubtitleBlock;

use super::ValidationConfig;

/// A non-blocking readability finding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advisory {
    /// A text line exceeds the configured width
    LineTooLong {
        /// Block index
        index: usize,
        /// Characters in the line
        chars: usize,
        /// Configured limit
        limit: usize,
    },
    /// A block has more lines than configured
    TooManyLines {
        /// Block index
        index: usize,
        /// Lines in the block
        lines: usize,
        /// Configured limit
        limit: usize,
    },
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Advisory::LineTooLong { index, chars, limit } => {
                write!(f, "block {}: line of {} characters (limit {})", index, chars, limit)
            }
            Advisory::TooManyLines { index, lines, limit } => {
                write!(f, "block {}: {} lines (limit {})", index, lines, limit)
            }
        }
    }
}

/// Advisories collected for a passing candidate
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Readability findings on owned blocks
    pub advisories: Vec<Advisory>,
    /// Owned blocks left without text
    pub empty_blocks: usize,
}

impl ValidationReport {
    /// Inspect the owned blocks of a candidate
    pub fn inspect(blocks: &[SubtitleBlock], config: &ValidationConfig) -> Self {
        let mut report = Self::default();

        for block in blocks {
            if block.is_empty() {
                report.empty_blocks += 1;
                continue;
            }

            if block.lines.len() > config.max_lines_per_block {
                report.advisories.push(Advisory::TooManyLines {
                    index: block.index,
                    lines: block.lines.len(),
                    limit: config.max_lines_per_block,
                });
            }

            for line in &block.lines {
                let chars = line.chars().count();
                if chars > config.max_line_chars {
                    report.advisories.push(Advisory::LineTooLong {
                        index: block.index,
                        chars,
                        limit: config.max_line_chars,
                    });
                }
            }
        }

        report
    }

    /// Whether there is nothing to report
    pub fn is_clean(&self) -> bool {
        self.advisories.is_empty() && self.empty_blocks == 0
    }

    /// Emit the findings as warnings
    pub fn log(&self, chunk_id: usize) {
        for advisory in &self.advisories {
            warn!("Chunk {}: {}", chunk_id, advisory);
        }
        if self.empty_blocks > 0 {
            warn!("Chunk {}: {} block(s) left empty", chunk_id, self.empty_blocks);
        }
    }
}
