/*!
 * Context document and amendments.
 *
 * Both share one markdown layout:
 *
 * ```text
 * # Translation context
 * <!-- revision: 2 -->
 *
 * ## Terms
 * - Hogwarts: Poudlard
 *
 * ## Characters
 * - Severus Snape: Rogue, formal register
 *
 * ## Notes
 * - Keep song lyrics untranslated
 * ```
 *
 * Amendments carry no title or revision line.
 */

use std::fmt;

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

// @const: Revision marker line
static REVISION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^<!--\s*revision:\s*(\d+)\s*-->$").expect("valid revision regex")
});

const DOCUMENT_TITLE: &str = "# Translation context";

/// Sections of the context document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextSection {
    /// Terminology decisions
    Terms,
    /// Character names, gender, register
    Characters,
    /// Free-form guidance
    Notes,
}

impl ContextSection {
    /// All sections in document order
    pub const ALL: [ContextSection; 3] = [
        ContextSection::Terms,
        ContextSection::Characters,
        ContextSection::Notes,
    ];

    /// Markdown heading text
    pub fn heading(&self) -> &'static str {
        match self {
            ContextSection::Terms => "Terms",
            ContextSection::Characters => "Characters",
            ContextSection::Notes => "Notes",
        }
    }

    fn from_heading(heading: &str) -> Option<Self> {
        match heading.trim().to_lowercase().as_str() {
            "terms" | "terminology" | "glossary" => Some(ContextSection::Terms),
            "characters" | "names" => Some(ContextSection::Characters),
            "notes" | "style" => Some(ContextSection::Notes),
            _ => None,
        }
    }
}

impl fmt::Display for ContextSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.heading())
    }
}

/// Entries proposed by a translator for one chunk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextAmendment {
    /// Term entries
    #[serde(default)]
    pub terms: Vec<String>,
    /// Character entries
    #[serde(default)]
    pub characters: Vec<String>,
    /// Note entries
    #[serde(default)]
    pub notes: Vec<String>,
}

impl ContextAmendment {
    /// Whether the amendment carries no entries
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty() && self.characters.is_empty() && self.notes.is_empty()
    }

    /// Total entries
    pub fn len(&self) -> usize {
        self.terms.len() + self.characters.len() + self.notes.len()
    }

    /// Entries of one section
    pub fn section(&self, section: ContextSection) -> &[String] {
        match section {
            ContextSection::Terms => &self.terms,
            ContextSection::Characters => &self.characters,
            ContextSection::Notes => &self.notes,
        }
    }

    fn section_mut(&mut self, section: ContextSection) -> &mut Vec<String> {
        match section {
            ContextSection::Terms => &mut self.terms,
            ContextSection::Characters => &mut self.characters,
            ContextSection::Notes => &mut self.notes,
        }
    }

    /// Add an entry to a section
    pub fn push(&mut self, section: ContextSection, entry: impl Into<String>) {
        self.section_mut(section).push(entry.into());
    }

    /// Parse the markdown section layout. Lines outside any known section are
    /// treated as notes.
    pub fn parse(text: &str) -> Self {
        parse_sections(text).1
    }

    /// Render in the markdown section layout, skipping empty sections
    pub fn render(&self) -> String {
        let mut out = String::new();
        for section in ContextSection::ALL {
            let entries = self.section(section);
            if entries.is_empty() {
                continue;
            }
            if !out.is_empty() {
                out.push('\n');
            }
            render_section(&mut out, section, entries);
        }
        out
    }
}

/// The run-wide context document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextDocument {
    revision: u64,
    entries: ContextAmendment,
}

impl ContextDocument {
    /// An empty document at revision 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Current revision
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Entries of one section
    pub fn section(&self, section: ContextSection) -> &[String] {
        self.entries.section(section)
    }

    /// Whether the document has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total entries
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Revision the document will have once `amendment` is applied
    pub fn revision_after(&self, amendment: &ContextAmendment) -> u64 {
        if amendment.is_empty() {
            self.revision
        } else {
            self.revision + 1
        }
    }

    /// Merge an amendment. An entry whose key (text before the first `:` or `=`)
    /// matches an existing entry replaces it in place; exact duplicates are
    /// skipped; anything else is appended. Nothing is ever removed.
    pub fn apply(&mut self, amendment: &ContextAmendment) {
        if amendment.is_empty() {
            return;
        }

        for section in ContextSection::ALL {
            let existing = self.entries.section_mut(section);
            for entry in amendment.section(section) {
                let entry = entry.trim();
                if entry.is_empty() || existing.iter().any(|e| e == entry) {
                    continue;
                }
                let key = entry_key(entry);
                match existing.iter_mut().find(|e| entry_key(e) == key) {
                    Some(slot) => *slot = entry.to_string(),
                    None => existing.push(entry.to_string()),
                }
            }
        }

        self.revision += 1;
        debug!(
            "Context amended to revision {} ({} entries)",
            self.revision,
            self.entries.len()
        );
    }

    /// Parse a rendered document; a missing revision line reads as revision 0
    pub fn parse(text: &str) -> Self {
        let (revision, entries) = parse_sections(text);
        Self {
            revision: revision.unwrap_or(0),
            entries,
        }
    }

    /// Render the document, including its revision line
    pub fn render(&self) -> String {
        let mut out = format!("{}\n<!-- revision: {} -->\n", DOCUMENT_TITLE, self.revision);
        for section in ContextSection::ALL {
            out.push('\n');
            render_section(&mut out, section, self.entries.section(section));
        }
        out
    }
}

fn render_section(out: &mut String, section: ContextSection, entries: &[String]) {
    out.push_str("## ");
    out.push_str(section.heading());
    out.push('\n');
    for entry in entries {
        out.push_str("- ");
        out.push_str(entry);
        out.push('\n');
    }
}

fn entry_key(entry: &str) -> String {
    let end = entry.find([':', '=']).unwrap_or(entry.len());
    entry[..end].trim().to_lowercase()
}

fn parse_sections(text: &str) -> (Option<u64>, ContextAmendment) {
    let mut revision = None;
    let mut entries = ContextAmendment::default();
    let mut current = ContextSection::Notes;

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(caps) = REVISION_REGEX.captures(trimmed) {
            revision = caps.get(1).and_then(|m| m.as_str().parse().ok());
            continue;
        }

        if let Some(heading) = trimmed.strip_prefix("## ") {
            current = ContextSection::from_heading(heading).unwrap_or(ContextSection::Notes);
            continue;
        }

        if trimmed.starts_with('#') {
            continue;
        }

        let entry = trimmed
            .strip_prefix("- ")
            .or_else(|| trimmed.strip_prefix("* "))
            .unwrap_or(trimmed)
            .trim();
        if !entry.is_empty() {
            entries.push(current, entry);
        }
    }

    (revision, entries)
}
