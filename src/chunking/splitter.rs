/*!
 * Splitter: partitions a block sequence into overlapping chunks.
 *
 * Owned ranges are consecutive windows of `chunk_size` blocks (the last one may be
 * shorter). Every chunk but the first borrows up to `overlap_size` blocks from the
 * end of its predecessor's owned range; every chunk but the last borrows up to
 * `overlap_size` blocks from the start of its successor's owned range.
 */

use log::debug;

use crate::errors::ChunkError;
use crate::subtitle_processor::SubtitleBlock;

use super::chunk::Chunk;

/// Default owned blocks per chunk
pub const DEFAULT_CHUNK_SIZE: usize = 150;

/// Default overlap on each side
pub const DEFAULT_OVERLAP_SIZE: usize = 5;

/// Chunk window parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Splitter {
    chunk_size: usize,
    overlap_size: usize,
}

impl Default for Splitter {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap_size: DEFAULT_OVERLAP_SIZE,
        }
    }
}

impl Splitter {
    /// Create a splitter; the overlap must be smaller than the chunk size
    pub fn new(chunk_size: usize, overlap_size: usize) -> Result<Self, ChunkError> {
        if chunk_size == 0 || overlap_size >= chunk_size {
            return Err(ChunkError::InvalidWindow {
                chunk_size,
                overlap_size,
            });
        }
        Ok(Self {
            chunk_size,
            overlap_size,
        })
    }

    /// Owned blocks per chunk
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Overlap blocks on each side
    pub fn overlap_size(&self) -> usize {
        self.overlap_size
    }

    /// Number of chunks a sequence of `block_count` blocks splits into
    pub fn chunk_count(&self, block_count: usize) -> usize {
        block_count.div_ceil(self.chunk_size)
    }

    /// Partition `blocks` into chunks
    pub fn split(&self, blocks: &[SubtitleBlock]) -> Result<Vec<Chunk>, ChunkError> {
        if blocks.is_empty() {
            return Err(ChunkError::EmptyInput);
        }

        let total = blocks.len();
        let mut chunks = Vec::with_capacity(self.chunk_count(total));

        for (i, start) in (0..total).step_by(self.chunk_size).enumerate() {
            let end = (start + self.chunk_size).min(total);

            // The previous owned range is always a full window, so the head never
            // reaches further back than it
            let head_start = if i == 0 { start } else { start - self.overlap_size };
            let tail_end = (end + self.overlap_size).min(total);

            let chunk = Chunk::new(
                i + 1,
                start..end,
                blocks[head_start..tail_end].to_vec(),
                start - head_start,
                tail_end - end,
            );

            debug!(
                "Chunk {}: owns positions {}..{} ({} blocks), overlap {}+{}",
                chunk.id,
                start,
                end,
                end - start,
                chunk.overlap_head,
                chunk.overlap_tail
            );
            chunks.push(chunk);
        }

        Ok(chunks)
    }
}
