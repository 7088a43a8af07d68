use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::SubtitleError;
use crate::file_utils::FileManager;

// @module: Subtitle block model, SRT parsing and rendering

// @const: SRT timing line regex (position codes after the end time are allowed)
static TIMESTAMP_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d+):(\d{2}):(\d{2})[,.](\d{3})\s*-->\s*(\d+):(\d{2}):(\d{2})[,.](\d{3})")
        .expect("valid timestamp regex")
});

// @const: Bracketed or parenthesised sound descriptions
static SOUND_DESCRIPTION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[[^\]]*\]|\([^)]*\)").expect("valid sound description regex")
});

// @const: Leading speaker label such as "JOHN:" or "MAN 2:"
static SPEAKER_LABEL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\s*(?:<[^>]+>)*\s*-?\s*)[A-Z][A-Z0-9 .'\-]*:\s*").expect("valid speaker label regex")
});

// @const: Markup tags, used only to decide whether a line still carries text
static TAG_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<[^>]*>|\{\\[^}]*\}").expect("valid tag regex")
});

/// Timing of a block.
///
/// The exact source text of the timing line is kept so that a translated chunk can
/// be checked for byte identity; the parsed milliseconds are only used for ordering
/// checks.
#[derive(Debug, Clone, Eq)]
pub struct TimeRange {
    /// Start time in ms
    pub start_ms: u64,
    /// End time in ms
    pub end_ms: u64,
    raw: String,
}

impl TimeRange {
    /// Build a time range from milliseconds, rendered in canonical SRT form
    pub fn new(start_ms: u64, end_ms: u64) -> Self {
        Self {
            start_ms,
            end_ms,
            raw: format!("{} --> {}", format_timestamp(start_ms), format_timestamp(end_ms)),
        }
    }

    /// Parse an SRT timing line, keeping its text (minus trailing whitespace)
    pub fn parse(line: &str) -> std::result::Result<Self, String> {
        let caps = TIMESTAMP_REGEX
            .captures(line)
            .ok_or_else(|| format!("expected a timing line, found {:?}", line))?;

        let start_ms = timestamp_from_captures(&caps, 1)?;
        let end_ms = timestamp_from_captures(&caps, 5)?;
        if start_ms >= end_ms {
            return Err(format!(
                "start time {} does not precede end time {}",
                format_timestamp(start_ms),
                format_timestamp(end_ms)
            ));
        }

        Ok(Self {
            start_ms,
            end_ms,
            raw: line.trim_end().to_string(),
        })
    }

    /// The timing line as it appeared in the source
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl PartialEq for TimeRange {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Format a timestamp in milliseconds to SRT format (HH:MM:SS,mmm)
pub fn format_timestamp(ms: u64) -> String {
    let hours = ms / 3_600_000;
    let minutes = (ms % 3_600_000) / 60_000;
    let seconds = (ms % 60_000) / 1_000;
    let millis = ms % 1_000;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
}

fn timestamp_from_captures(caps: &regex::Captures, start_idx: usize) -> std::result::Result<u64, String> {
    let part = |offset: usize| -> std::result::Result<u64, String> {
        let text = caps.get(start_idx + offset).map_or("", |m| m.as_str());
        text.parse::<u64>()
            .map_err(|_| format!("invalid timestamp component {:?}", text))
    };

    let (hours, minutes, seconds, millis) = (part(0)?, part(1)?, part(2)?, part(3)?);
    if minutes >= 60 || seconds >= 60 {
        return Err(format!(
            "invalid time components {:02}:{:02}:{:02},{:03}",
            hours, minutes, seconds, millis
        ));
    }

    hours
        .checked_mul(3600)
        .and_then(|total| total.checked_add(minutes * 60 + seconds))
        .and_then(|total| total.checked_mul(1000))
        .and_then(|total| total.checked_add(millis))
        .ok_or_else(|| format!("timestamp hours out of range: {}", hours))
}

// @struct: Single caption block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleBlock {
    // @field: Sequence number, 1-based
    pub index: usize,

    // @field: Timing, immutable once parsed
    pub time_range: TimeRange,

    // @field: Text lines; the only part a translation may rewrite
    pub lines: Vec<String>,
}

impl SubtitleBlock {
    /// Creates a new block
    pub fn new(index: usize, time_range: TimeRange, lines: Vec<String>) -> Self {
        Self {
            index,
            time_range,
            lines,
        }
    }

    /// Same index and timing, different text
    pub fn with_lines(&self, lines: Vec<String>) -> Self {
        Self {
            index: self.index,
            time_range: self.time_range.clone(),
            lines,
        }
    }

    /// Whether the block carries no text (e.g. an emptied sound description)
    pub fn is_empty(&self) -> bool {
        self.lines.iter().all(|line| line.trim().is_empty())
    }

    /// Text lines joined with newlines
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

impl fmt::Display for SubtitleBlock {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", self.index)?;
        writeln!(f, "{}", self.time_range)?;
        for line in &self.lines {
            writeln!(f, "{}", line)?;
        }
        writeln!(f)
    }
}

/// Collection of subtitle blocks read from one file
#[derive(Debug, Clone)]
pub struct SubtitleCollection {
    /// Source filename
    pub source_file: PathBuf,

    /// Blocks in index order
    pub blocks: Vec<SubtitleBlock>,
}

impl SubtitleCollection {
    /// Create a collection from already parsed blocks
    pub fn from_blocks(source_file: PathBuf, blocks: Vec<SubtitleBlock>) -> Self {
        SubtitleCollection { source_file, blocks }
    }

    /// Read and parse an SRT file
    pub fn from_file<P: AsRef<Path>>(path: P) -> std::result::Result<Self, SubtitleError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| SubtitleError::Read(format!("{}: {}", path.display(), e)))?;
        let blocks = Self::parse_srt_bytes(&bytes)?;
        Ok(Self::from_blocks(path.to_path_buf(), blocks))
    }

    /// Decode raw bytes (UTF-8, optional BOM) and parse them
    pub fn parse_srt_bytes(bytes: &[u8]) -> std::result::Result<Vec<SubtitleBlock>, SubtitleError> {
        let content = std::str::from_utf8(bytes)
            .map_err(|e| SubtitleError::Read(format!("input is not valid UTF-8: {}", e)))?;
        Self::parse_srt_string(content)
    }

    /// Parse an SRT document whose indices must run 1..N without gaps
    pub fn parse_srt_string(content: &str) -> std::result::Result<Vec<SubtitleBlock>, SubtitleError> {
        let normalized = FileManager::normalize_text(content);
        let lines: Vec<&str> = normalized.split('\n').collect();
        let parsed = parse_block_lines(&lines, 0)?;

        let mut blocks = Vec::with_capacity(parsed.len());
        for (position, (line, block)) in parsed.into_iter().enumerate() {
            if block.index != position + 1 {
                return Err(SubtitleError::parse(
                    line,
                    format!("expected block index {}, found {}", position + 1, block.index),
                ));
            }
            blocks.push(block);
        }

        debug!("Parsed {} subtitle blocks", blocks.len());
        Ok(blocks)
    }

    /// Render blocks as an SRT document
    pub fn to_srt_string(blocks: &[SubtitleBlock]) -> String {
        blocks.iter().map(|block| block.to_string()).collect()
    }

    /// Write subtitles to an SRT file, replacing it atomically
    pub fn write_to_srt<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        FileManager::write_atomic(path, &Self::to_srt_string(&self.blocks))
            .with_context(|| format!("Failed to write subtitle file: {}", path.display()))
    }

    /// Number of blocks without text
    pub fn empty_block_count(&self) -> usize {
        self.blocks.iter().filter(|block| block.is_empty()).count()
    }
}

impl fmt::Display for SubtitleCollection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Subtitle Collection")?;
        writeln!(f, "Source: {:?}", self.source_file)?;
        writeln!(f, "Blocks: {}", self.blocks.len())?;
        Ok(())
    }
}

fn is_index_line(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit())
}

/// Parse blocks from pre-split lines. Returns each block with the 1-based line
/// number of its index line; `line_offset` is added to reported line numbers.
pub(crate) fn parse_block_lines(
    lines: &[&str],
    line_offset: usize,
) -> std::result::Result<Vec<(usize, SubtitleBlock)>, SubtitleError> {
    let mut blocks = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        if lines[i].trim().is_empty() {
            i += 1;
            continue;
        }

        let index_line = line_offset + i + 1;
        let index: usize = lines[i].trim().parse().map_err(|_| {
            SubtitleError::parse(index_line, format!("expected a block index, found {:?}", lines[i]))
        })?;
        if index == 0 {
            return Err(SubtitleError::parse(index_line, "block index must be at least 1"));
        }
        i += 1;

        let timing = lines
            .get(i)
            .ok_or_else(|| SubtitleError::parse(line_offset + i + 1, format!("block {} has no timing line", index)))?;
        let time_range = TimeRange::parse(timing)
            .map_err(|message| SubtitleError::parse(line_offset + i + 1, format!("block {}: {}", index, message)))?;
        i += 1;

        let mut text = Vec::new();
        while i < lines.len() {
            let line = lines[i];
            if line.trim().is_empty() {
                i += 1;
                break;
            }
            // A missing blank separator: next block starts right away
            if is_index_line(line) && lines.get(i + 1).is_some_and(|next| next.contains("-->")) {
                break;
            }
            text.push(line.to_string());
            i += 1;
        }

        blocks.push((index_line, SubtitleBlock::new(index, time_range, text)));
    }

    Ok(blocks)
}

/// Remove accessibility aids (sound descriptions, speaker labels, music cues) from
/// a block's lines. Lines left without any text are dropped; a block may end up
/// with no lines at all, which keeps it in place as an empty block.
pub fn strip_accessibility_aids(lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .filter_map(|line| {
            let without_sounds = SOUND_DESCRIPTION_REGEX.replace_all(line, "");
            let without_speaker = SPEAKER_LABEL_REGEX.replace(&without_sounds, "$1");
            let cleaned = without_speaker.trim().to_string();

            let visible = TAG_REGEX.replace_all(&cleaned, "");
            let visible = visible.trim_matches(|c: char| c.is_whitespace() || c == '-' || c == '♪' || c == '#');
            if visible.is_empty() {
                None
            } else {
                Some(cleaned)
            }
        })
        .collect()
}
