/*!
 * Chunking: cutting a block sequence into overlapping windows and putting the
 * translated windows back together.
 *
 * - `chunk`: the chunk model and its on-disk file format
 * - `splitter`: partitions blocks into chunks with lookback/lookahead overlap
 * - `joiner`: reassembles owned regions and checks global invariants
 */

pub mod chunk;
pub mod joiner;
pub mod splitter;

pub use chunk::{Chunk, ChunkFile};
pub use joiner::Joiner;
pub use splitter::Splitter;
