/*!
 * Chunk model and chunk file format.
 *
 * A chunk file is plain SRT with two optional marked sections: the lookback
 * context copied from the previous chunk and the lookahead copied from the next
 * one. Translators are expected to hand the markers back unchanged.
 */

use std::ops::Range;

use crate::errors::SubtitleError;
use crate::file_utils::FileManager;
use crate::session::models::ChunkBoundary;
use crate::subtitle_processor::{parse_block_lines, SubtitleBlock};

/// Opening marker of the lookback section
pub const CONTEXT_START: &str = "=== CONTEXT (DO NOT TRANSLATE, only for understanding continuity) ===";
/// Closing marker of the lookback section
pub const CONTEXT_END: &str = "=== END CONTEXT ===";
/// Opening marker of the lookahead section
pub const LOOKAHEAD_START: &str = "=== LOOKAHEAD (DO NOT TRANSLATE, only for understanding continuity) ===";
/// Closing marker of the lookahead section
pub const LOOKAHEAD_END: &str = "=== END LOOKAHEAD ===";

/// A window of blocks dispatched to the translator as one unit
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// 1-based chunk number
    pub id: usize,
    /// Zero-based positions of the blocks this chunk owns, half-open
    pub source_range: Range<usize>,
    /// Head overlap, owned blocks and tail overlap, in order
    pub blocks: Vec<SubtitleBlock>,
    /// Leading blocks shared with the previous chunk
    pub overlap_head: usize,
    /// Trailing blocks shared with the next chunk
    pub overlap_tail: usize,
}

impl Chunk {
    /// Create a chunk
    pub fn new(
        id: usize,
        source_range: Range<usize>,
        blocks: Vec<SubtitleBlock>,
        overlap_head: usize,
        overlap_tail: usize,
    ) -> Self {
        Self {
            id,
            source_range,
            blocks,
            overlap_head,
            overlap_tail,
        }
    }

    /// File name used for this chunk in the run directory
    pub fn file_name_for(id: usize) -> String {
        format!("chunk_{:03}.srt", id)
    }

    /// File name used for this chunk in the run directory
    pub fn file_name(&self) -> String {
        Self::file_name_for(self.id)
    }

    /// Number of owned blocks
    pub fn owned_len(&self) -> usize {
        self.source_range.len()
    }

    /// Blocks this chunk is authoritative for
    pub fn owned_blocks(&self) -> &[SubtitleBlock] {
        let end = self.blocks.len().saturating_sub(self.overlap_tail);
        let start = self.overlap_head.min(end);
        &self.blocks[start..end]
    }

    /// Lookback blocks
    pub fn head_blocks(&self) -> &[SubtitleBlock] {
        &self.blocks[..self.overlap_head.min(self.blocks.len())]
    }

    /// Lookahead blocks
    pub fn tail_blocks(&self) -> &[SubtitleBlock] {
        let start = self.blocks.len().saturating_sub(self.overlap_tail);
        &self.blocks[start..]
    }

    /// Same geometry, different blocks (a translated candidate)
    pub fn with_blocks(&self, blocks: Vec<SubtitleBlock>) -> Self {
        Self {
            id: self.id,
            source_range: self.source_range.clone(),
            blocks,
            overlap_head: self.overlap_head,
            overlap_tail: self.overlap_tail,
        }
    }

    /// Render the chunk in chunk file format
    pub fn to_chunk_file(&self) -> String {
        ChunkFile {
            head: self.head_blocks().to_vec(),
            owned: self.owned_blocks().to_vec(),
            tail: self.tail_blocks().to_vec(),
        }
        .render()
    }

    /// Rebuild a chunk from its persisted boundary and parsed file, checking that
    /// the sections agree with the boundary
    pub fn from_boundary(boundary: &ChunkBoundary, file: ChunkFile) -> Result<Self, String> {
        let owned_len = boundary.end.saturating_sub(boundary.start);
        if file.head.len() != boundary.overlap_head
            || file.owned.len() != owned_len
            || file.tail.len() != boundary.overlap_tail
        {
            return Err(format!(
                "chunk {} has {}+{}+{} blocks, manifest expects {}+{}+{}",
                boundary.id,
                file.head.len(),
                file.owned.len(),
                file.tail.len(),
                boundary.overlap_head,
                owned_len,
                boundary.overlap_tail
            ));
        }

        if let Some(first) = file.owned.first() {
            if first.index != boundary.start + 1 {
                return Err(format!(
                    "chunk {} starts at block {}, manifest expects {}",
                    boundary.id,
                    first.index,
                    boundary.start + 1
                ));
            }
        }

        Ok(Self::new(
            boundary.id,
            boundary.start..boundary.end,
            file.into_blocks(),
            boundary.overlap_head,
            boundary.overlap_tail,
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Head,
    Owned,
    Tail,
}

/// The three sections of a chunk file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkFile {
    /// Lookback blocks
    pub head: Vec<SubtitleBlock>,
    /// Owned blocks
    pub owned: Vec<SubtitleBlock>,
    /// Lookahead blocks
    pub tail: Vec<SubtitleBlock>,
}

impl ChunkFile {
    /// Parse chunk file text
    pub fn parse(content: &str) -> Result<Self, SubtitleError> {
        let normalized = FileManager::normalize_text(content);
        let lines: Vec<&str> = normalized.split('\n').collect();

        let mut segments: Vec<(Section, Range<usize>)> = Vec::new();
        let mut current = Section::Owned;
        let mut start = 0;

        for (i, line) in lines.iter().enumerate() {
            let trimmed = line.trim();
            let transition = if trimmed.starts_with("=== CONTEXT") {
                Some((Section::Owned, Section::Head))
            } else if trimmed == CONTEXT_END {
                Some((Section::Head, Section::Owned))
            } else if trimmed.starts_with("=== LOOKAHEAD") {
                Some((Section::Owned, Section::Tail))
            } else if trimmed == LOOKAHEAD_END {
                Some((Section::Tail, Section::Owned))
            } else {
                None
            };

            if let Some((expected, next)) = transition {
                if current != expected {
                    return Err(SubtitleError::parse(
                        i + 1,
                        format!("unexpected section marker {:?}", trimmed),
                    ));
                }
                segments.push((current, start..i));
                current = next;
                start = i + 1;
            }
        }

        if current != Section::Owned {
            return Err(SubtitleError::parse(lines.len(), "unterminated context section"));
        }
        segments.push((current, start..lines.len()));

        let mut file = ChunkFile::default();
        for (section, range) in segments {
            let offset = range.start;
            let blocks = parse_block_lines(&lines[range], offset)?
                .into_iter()
                .map(|(_, block)| block);
            match section {
                Section::Head => file.head.extend(blocks),
                Section::Owned => file.owned.extend(blocks),
                Section::Tail => file.tail.extend(blocks),
            }
        }

        Ok(file)
    }

    /// Render as chunk file text
    pub fn render(&self) -> String {
        let mut out = String::new();

        if !self.head.is_empty() {
            out.push_str(CONTEXT_START);
            out.push('\n');
            for block in &self.head {
                out.push_str(&block.to_string());
            }
            out.push_str(CONTEXT_END);
            out.push_str("\n\n");
        }

        for block in &self.owned {
            out.push_str(&block.to_string());
        }

        if !self.tail.is_empty() {
            out.push_str(LOOKAHEAD_START);
            out.push('\n');
            for block in &self.tail {
                out.push_str(&block.to_string());
            }
            out.push_str(LOOKAHEAD_END);
            out.push('\n');
        }

        out
    }

    /// Total blocks across sections
    pub fn len(&self) -> usize {
        self.head.len() + self.owned.len() + self.tail.len()
    }

    /// Whether the file holds no blocks
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All blocks in file order
    pub fn into_blocks(self) -> Vec<SubtitleBlock> {
        let mut blocks = self.head;
        blocks.extend(self.owned);
        blocks.extend(self.tail);
        blocks
    }
}
