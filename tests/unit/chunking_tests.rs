/*!
 * Tests for splitting and joining
 */

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use chunkwise::chunking::{Chunk, ChunkFile, Joiner, Splitter};
use chunkwise::errors::ChunkError;
use chunkwise::subtitle_processor::SubtitleBlock;
use chunkwise::validation::{ChunkValidator, Verdict};

use crate::common;

fn translate(chunk: &Chunk) -> Chunk {
    chunk.with_blocks(
        chunk
            .blocks
            .iter()
            .map(|block| block.with_lines(block.lines.iter().map(|l| format!("fr: {}", l)).collect()))
            .collect(),
    )
}

/// Owned regions of any split tile the input exactly once, in order
#[test]
fn test_split_withRandomWindows_shouldPartitionEveryBlockOnce() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(0x5eed);

    for _ in 0..40 {
        let block_count = rng.random_range(1..=400);
        let chunk_size = rng.random_range(1..=60);
        let overlap_size = rng.random_range(0..chunk_size);
        let blocks = common::generate_blocks(block_count);
        let chunks = Splitter::new(chunk_size, overlap_size)?.split(&blocks)?;

        assert_eq!(chunks.len(), block_count.div_ceil(chunk_size));

        let mut expected_start = 0;
        for (position, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.id, position + 1);
            assert_eq!(chunk.source_range.start, expected_start);
            assert!(chunk.owned_len() >= 1 && chunk.owned_len() <= chunk_size);
            assert!(chunk.overlap_head <= overlap_size && chunk.overlap_tail <= overlap_size);
            assert_eq!(chunk.blocks.len(), chunk.overlap_head + chunk.owned_len() + chunk.overlap_tail);
            assert_eq!(chunk.owned_blocks(), &blocks[chunk.source_range.clone()]);
            expected_start = chunk.source_range.end;
        }
        assert_eq!(expected_start, block_count);

        let joined = Joiner::new(block_count).join_verified(&chunks, &blocks)?;
        assert_eq!(joined, blocks);
    }
    Ok(())
}

/// 320 blocks with the default window give three chunks with the expected borders
#[test]
fn test_split_withDefaultWindow_shouldMatchDocumentedGeometry() -> Result<()> {
    let blocks = common::generate_blocks(320);
    let chunks = Splitter::default().split(&blocks)?;

    let ranges: Vec<_> = chunks.iter().map(|c| c.source_range.clone()).collect();
    assert_eq!(ranges, vec![0..150, 150..300, 300..320]);

    let second = &chunks[1];
    let head: Vec<usize> = second.head_blocks().iter().map(|b| b.index).collect();
    let tail: Vec<usize> = second.tail_blocks().iter().map(|b| b.index).collect();
    assert_eq!(head, vec![146, 147, 148, 149, 150]);
    assert_eq!(tail, vec![301, 302, 303, 304, 305]);

    assert_eq!(chunks[0].overlap_head, 0);
    assert_eq!(chunks[2].overlap_tail, 0);
    Ok(())
}

#[test]
fn test_splitter_new_withOverlapNotSmallerThanChunk_shouldReject() {
    assert!(matches!(Splitter::new(5, 5), Err(ChunkError::InvalidWindow { .. })));
    assert!(matches!(Splitter::new(0, 0), Err(ChunkError::InvalidWindow { .. })));
}

#[test]
fn test_split_withNoBlocks_shouldReturnEmptyInput() {
    let blocks: Vec<SubtitleBlock> = Vec::new();
    assert_eq!(Splitter::default().split(&blocks), Err(ChunkError::EmptyInput));
}

/// A chunk file keeps its overlap sections apart from the owned blocks
#[test]
fn test_chunk_file_withOverlap_shouldRenderAndParseSections() -> Result<()> {
    let blocks = common::generate_blocks(30);
    let chunks = Splitter::new(10, 3)?.split(&blocks)?;
    let middle = &chunks[1];

    let parsed = ChunkFile::parse(&middle.to_chunk_file())?;
    assert_eq!(parsed.head.len(), 3);
    assert_eq!(parsed.owned.len(), 10);
    assert_eq!(parsed.tail.len(), 3);
    assert_eq!(parsed.into_blocks(), middle.blocks);
    Ok(())
}

/// Translated chunks pass validation and join back into a full document
#[test]
fn test_join_withTranslatedChunks_shouldKeepStructureAndNewText() -> Result<()> {
    let blocks = common::generate_blocks(45);
    let chunks = Splitter::new(20, 4)?.split(&blocks)?;
    let validator = ChunkValidator::default();

    let translated: Vec<Chunk> = chunks.iter().map(translate).collect();
    for (source, candidate) in chunks.iter().zip(&translated) {
        assert!(matches!(validator.validate(source, candidate), Verdict::Pass(_)));
    }

    let joined = Joiner::new(blocks.len()).join_verified(&translated, &blocks)?;
    assert_eq!(joined.len(), 45);
    assert_eq!(joined[20].lines, vec!["fr: Line number 21".to_string()]);
    assert!(joined.iter().zip(&blocks).all(|(out, src)| out.time_range == src.time_range));
    Ok(())
}

/// A missing chunk is reported with the uncovered positions
#[test]
fn test_join_withMissingChunk_shouldReportGap() -> Result<()> {
    let blocks = common::generate_blocks(30);
    let chunks = Splitter::new(10, 2)?.split(&blocks)?;
    let partial = vec![chunks[0].clone(), chunks[2].clone()];

    match Joiner::new(30).join(&partial) {
        Err(ChunkError::JoinIntegrity { range, .. }) => assert_eq!(range, 10..20),
        other => panic!("unexpected result: {:?}", other),
    }
    Ok(())
}
