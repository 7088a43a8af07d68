/*!
 * Joiner: concatenates the owned blocks of validated chunks into the final
 * sequence and re-checks the global invariants on the result.
 */

use log::debug;

use crate::errors::ChunkError;
use crate::subtitle_processor::SubtitleBlock;

use super::chunk::Chunk;

/// Reassembles validated chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Joiner {
    expected_blocks: usize,
}

impl Joiner {
    /// Create a joiner for a source of `expected_blocks` blocks
    pub fn new(expected_blocks: usize) -> Self {
        Self { expected_blocks }
    }

    /// Concatenate the owned blocks of `chunks` (in chunk order).
    ///
    /// Fails when the owned ranges do not tile `0..expected_blocks`, when a chunk's
    /// owned section has the wrong size, or when the result is not indexed 1..N.
    pub fn join(&self, chunks: &[Chunk]) -> Result<Vec<SubtitleBlock>, ChunkError> {
        let mut joined: Vec<SubtitleBlock> = Vec::with_capacity(self.expected_blocks);

        for chunk in chunks {
            let range = chunk.source_range.clone();
            if range.start != joined.len() {
                return Err(ChunkError::JoinIntegrity {
                    range: joined.len()..range.start.max(joined.len()),
                    message: format!(
                        "chunk {} owns positions {}..{}, expected it to start at {}",
                        chunk.id,
                        range.start,
                        range.end,
                        joined.len()
                    ),
                });
            }

            let owned = chunk.owned_blocks();
            if owned.len() != range.len() {
                return Err(ChunkError::JoinIntegrity {
                    range,
                    message: format!(
                        "chunk {} supplies {} owned blocks for a range of {}",
                        chunk.id,
                        owned.len(),
                        chunk.source_range.len()
                    ),
                });
            }

            joined.extend_from_slice(owned);
        }

        if joined.len() != self.expected_blocks {
            return Err(ChunkError::JoinIntegrity {
                range: joined.len().min(self.expected_blocks)..joined.len().max(self.expected_blocks),
                message: format!(
                    "joined {} blocks, source has {}",
                    joined.len(),
                    self.expected_blocks
                ),
            });
        }

        if let Some(position) = joined
            .iter()
            .enumerate()
            .position(|(position, block)| block.index != position + 1)
        {
            return Err(ChunkError::JoinIntegrity {
                range: position..position + 1,
                message: format!(
                    "block at position {} has index {}, expected {}",
                    position,
                    joined[position].index,
                    position + 1
                ),
            });
        }

        debug!("Joined {} chunks into {} blocks", chunks.len(), joined.len());
        Ok(joined)
    }

    /// Join and additionally check that every block keeps the source timing
    pub fn join_verified(
        &self,
        chunks: &[Chunk],
        source: &[SubtitleBlock],
    ) -> Result<Vec<SubtitleBlock>, ChunkError> {
        let joined = self.join(chunks)?;

        if let Some((position, (out, src))) = joined
            .iter()
            .zip(source)
            .enumerate()
            .find(|(_, (out, src))| out.time_range != src.time_range)
        {
            return Err(ChunkError::JoinIntegrity {
                range: position..position + 1,
                message: format!(
                    "block {} timing {:?} differs from source {:?}",
                    out.index,
                    out.time_range.raw(),
                    src.time_range.raw()
                ),
            });
        }

        Ok(joined)
    }
}
