/*!
 * Tests for subtitle processing functionality
 */

use anyhow::Result;
use chunkwise::errors::SubtitleError;
use chunkwise::subtitle_processor::{SubtitleCollection, TimeRange, format_timestamp, strip_accessibility_aids};

use crate::common;

/// Test timestamp formatting
#[test]
fn test_format_timestamp_withMilliseconds_shouldRenderSrtForm() {
    assert_eq!(format_timestamp(5_025_678), "01:23:45,678");
    assert_eq!(format_timestamp(0), "00:00:00,000");
}

/// Timing lines keep their exact text, position codes included
#[test]
fn test_time_range_parse_withPositionCodes_shouldKeepRawText() {
    let line = "00:00:01,000 --> 00:00:02,500 X1:100 X2:200";
    let range = TimeRange::parse(line).unwrap();

    assert_eq!(range.start_ms, 1000);
    assert_eq!(range.end_ms, 2500);
    assert_eq!(range.raw(), line);
    assert_ne!(range, TimeRange::new(1000, 2500));
}

#[test]
fn test_time_range_parse_withReversedTimes_shouldFail() {
    assert!(TimeRange::parse("00:00:05,000 --> 00:00:01,000").is_err());
    assert!(TimeRange::parse("not a timing line").is_err());
}

/// Test parsing a generated document
#[test]
fn test_parse_srt_string_withGeneratedDocument_shouldParseAllBlocks() -> Result<()> {
    let blocks = SubtitleCollection::parse_srt_string(&common::generate_srt(12))?;

    assert_eq!(blocks.len(), 12);
    assert_eq!(blocks[0].index, 1);
    assert_eq!(blocks[11].index, 12);
    assert_eq!(blocks[4].lines, vec!["Line number 5".to_string()]);
    Ok(())
}

/// BOM and CRLF line endings are accepted
#[test]
fn test_parse_srt_bytes_withBomAndCrlf_shouldParse() -> Result<()> {
    let content = "\u{feff}1\r\n00:00:01,000 --> 00:00:02,000\r\nHello\r\nthere\r\n\r\n2\r\n00:00:03,000 --> 00:00:04,000\r\nBye\r\n";
    let blocks = SubtitleCollection::parse_srt_bytes(content.as_bytes())?;

    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].lines, vec!["Hello".to_string(), "there".to_string()]);
    assert_eq!(blocks[1].time_range.raw(), "00:00:03,000 --> 00:00:04,000");
    Ok(())
}

/// Index gaps are rejected with the line of the offending block
#[test]
fn test_parse_srt_string_withIndexGap_shouldReturnParseError() {
    let content = "1\n00:00:01,000 --> 00:00:02,000\nA\n\n3\n00:00:03,000 --> 00:00:04,000\nB\n";
    let error = SubtitleCollection::parse_srt_string(content).unwrap_err();

    match error {
        SubtitleError::Parse { line, message } => {
            assert_eq!(line, 5);
            assert!(message.contains("expected block index 2"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_parse_srt_string_withMissingTiming_shouldReturnParseError() {
    let content = "1\nHello\n";
    assert!(matches!(
        SubtitleCollection::parse_srt_string(content),
        Err(SubtitleError::Parse { line: 2, .. })
    ));
}

/// Timings too large to represent are a parse error naming the block
#[test]
fn test_parse_srt_string_withOversizedHours_shouldReturnParseError() {
    let content = "1\n9999999999999999:00:00,000 --> 9999999999999999:00:01,000\nHi\n";

    match SubtitleCollection::parse_srt_string(content) {
        Err(SubtitleError::Parse { line, message }) => {
            assert_eq!(line, 2);
            assert!(message.starts_with("block 1:"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_parse_srt_bytes_withInvalidUtf8_shouldReturnReadError() {
    let bytes = [0x31, 0x0a, 0xff, 0xfe];
    assert!(matches!(
        SubtitleCollection::parse_srt_bytes(&bytes),
        Err(SubtitleError::Read(_))
    ));
}

/// Empty blocks survive a render and parse cycle in place
#[test]
fn test_empty_block_withRenderAndParse_shouldStayInPlace() -> Result<()> {
    let mut blocks = common::generate_blocks(3);
    blocks[1] = blocks[1].with_lines(Vec::new());

    let reparsed = SubtitleCollection::parse_srt_string(&SubtitleCollection::to_srt_string(&blocks))?;
    assert_eq!(reparsed, blocks);
    assert!(reparsed[1].is_empty());
    Ok(())
}

/// Test writing and reading back a file
#[test]
fn test_write_to_srt_withBlocks_shouldRoundTripThroughFile() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("out.srt");
    let blocks = common::generate_blocks(4);

    SubtitleCollection::from_blocks(path.clone(), blocks.clone()).write_to_srt(&path)?;
    let collection = SubtitleCollection::from_file(&path)?;

    assert_eq!(collection.blocks, blocks);
    assert_eq!(collection.empty_block_count(), 0);
    Ok(())
}

/// Sound descriptions and speaker labels are removed
#[test]
fn test_strip_accessibility_aids_withSoundsAndSpeakers_shouldKeepDialogue() {
    let lines = vec![
        "[DOOR SLAMS]".to_string(),
        "JOHN: Where were you?".to_string(),
        "♪ (upbeat music) ♪".to_string(),
    ];
    assert_eq!(strip_accessibility_aids(&lines), vec!["Where were you?".to_string()]);
}
