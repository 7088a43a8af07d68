/*!
 * Common test utilities for the chunkwise test suite
 */

#![allow(dead_code)]

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use chunkwise::context::{ContextAmendment, ContextSection};
use chunkwise::pipeline::{Orchestrator, RunSettings};
use chunkwise::providers::{ScriptedTranslator, TranslationSettings};
use chunkwise::session::RunStore;
use chunkwise::subtitle_processor::{SubtitleBlock, TimeRange};

/// Install env_logger once; repeated calls are ignored
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// `count` blocks, two seconds apart, one line each
pub fn generate_blocks(count: usize) -> Vec<SubtitleBlock> {
    (1..=count)
        .map(|i| {
            let start = i as u64 * 2000;
            SubtitleBlock::new(i, TimeRange::new(start, start + 1500), vec![format!("Line number {}", i)])
        })
        .collect()
}

/// SRT document with `count` numbered blocks
pub fn generate_srt(count: usize) -> String {
    generate_blocks(count).iter().map(|block| block.to_string()).collect()
}

/// Writes a generated SRT with `count` blocks
pub fn create_test_subtitle(dir: &Path, filename: &str, count: usize) -> Result<PathBuf> {
    create_test_file(dir, filename, &generate_srt(count))
}

/// Translation settings used across tests
pub fn test_translation_settings() -> TranslationSettings {
    TranslationSettings {
        target_language: "fr".to_string(),
        regional_variant: None,
        remove_accessibility_aids: false,
    }
}

/// Run settings with the given window
pub fn test_run_settings(chunk_size: usize, overlap_size: usize) -> RunSettings {
    RunSettings::new(test_translation_settings()).with_window(chunk_size, overlap_size)
}

/// Orchestrator over a scripted translator with a store under `work_dir`
pub fn scripted_orchestrator(settings: RunSettings, work_dir: &Path, translator: &ScriptedTranslator) -> Orchestrator {
    Orchestrator::new(settings, RunStore::new(work_dir.join("run")), Box::new(translator.clone()))
}

/// Amendment with a single glossary term
pub fn term_amendment(entry: &str) -> ContextAmendment {
    let mut amendment = ContextAmendment::default();
    amendment.push(ContextSection::Terms, entry);
    amendment
}
