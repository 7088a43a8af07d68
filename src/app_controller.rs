use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::app_config::{Config, TranslatorKind};
use crate::errors::AppError;
use crate::file_utils::FileManager;
use crate::pipeline::{Orchestrator, RunPhase, RunProgress, RunReport};
use crate::providers::{CommandTranslator, HttpTranslator, PassthroughTranslator, Translator};
use crate::session::{RunManifest, RunStore, StateTracker, TrackerSummary};

// @module: Application controller for chunked subtitle runs

// @const: Progress bar fill characters
pub const PROGRESS_CHARS: &str = "=>-";

/// Persisted progress of a run, as shown by `status`
#[derive(Debug, Clone)]
pub struct RunStatus {
    // @field: Run directory
    pub run_dir: PathBuf,

    // @field: Manifest of the persisted split
    pub manifest: RunManifest,

    // @field: Chunk counts, when a state file exists
    pub summary: Option<TrackerSummary>,

    // @field: Whether the source on disk still matches the manifest
    pub source_matches: bool,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run:     {} ({})", self.manifest.run_id, self.run_dir.display())?;
        writeln!(f, "Source:  {} [{}]", self.manifest.source.file_name, self.manifest.source.short_hash())?;
        writeln!(
            f,
            "Window:  {} blocks, chunk size {}, overlap {}",
            self.manifest.block_count, self.manifest.chunk_size, self.manifest.overlap_size
        )?;
        match &self.summary {
            Some(summary) => writeln!(f, "Chunks:  {}", summary)?,
            None => writeln!(f, "Chunks:  {} (no state recorded)", self.manifest.chunks.len())?,
        }
        if !self.source_matches {
            writeln!(f, "Source has changed since the split; the next run starts over")?;
        }
        Ok(())
    }
}

/// Main application controller for chunked subtitle translation
pub struct Controller {
    // @field: App configuration
    config: Config,
}

impl Controller {
    // @method: Create a new controller with the given configuration
    pub fn with_config(config: Config) -> Result<Self, AppError> {
        config
            .validate()
            .map_err(|e| AppError::Config(format!("{:#}", e)))?;
        Ok(Self { config })
    }

    /// Configuration in use
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Output path for `input_file`: `<stem>.<lang>.srt` in `output_dir`, or
    /// next to the input when no directory is configured
    pub fn output_path_for(&self, input_file: &Path, output_dir: Option<&Path>) -> PathBuf {
        let dir = output_dir
            .map(Path::to_path_buf)
            .or_else(|| self.config.output_dir.clone())
            .or_else(|| input_file.parent().map(Path::to_path_buf))
            .unwrap_or_default();
        FileManager::generate_output_path(input_file, dir, &self.config.translation_settings().language_tag(), "srt")
    }

    /// Run store for `input_file`
    pub fn store_for(&self, input_file: &Path) -> RunStore {
        RunStore::for_source(&self.config.work_dir, input_file)
    }

    /// Run the chunk lifecycle on `input_file`, resuming persisted progress
    /// unless `fresh` is set
    pub async fn run(&self, input_file: &Path, output_dir: Option<&Path>, fresh: bool) -> Result<RunReport, AppError> {
        let translator = build_translator(&self.config)?;
        self.run_with_translator(input_file, output_dir, fresh, translator).await
    }

    /// Same as [`Controller::run`] with an explicit translator
    pub async fn run_with_translator(
        &self,
        input_file: &Path,
        output_dir: Option<&Path>,
        fresh: bool,
        translator: Box<dyn Translator>,
    ) -> Result<RunReport, AppError> {
        if !FileManager::file_exists(input_file) {
            return Err(AppError::File(format!("Input file does not exist: {}", input_file.display())));
        }

        let output_path = self.output_path_for(input_file, output_dir);
        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            FileManager::ensure_dir(parent)?;
        }

        info!(
            "Translating {} to {} with the {} translator",
            input_file.display(),
            self.config.translation_settings().language_tag(),
            translator.name()
        );

        let progress_bar = ProgressBar::new(0);
        let template_result = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg} {eta}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(template_result.progress_chars(PROGRESS_CHARS));

        let pb = progress_bar.clone();
        let mut orchestrator = Orchestrator::new(self.config.run_settings(fresh), self.store_for(input_file), translator)
            .with_progress(Box::new(move |progress: &RunProgress| {
                pb.set_length(progress.total as u64);
                pb.set_position(progress.validated as u64);
                pb.set_message(progress.status.clone());
            }));

        let result = orchestrator.run(input_file, &output_path).await;

        // Clear the bar before the summary lines are logged
        progress_bar.finish_and_clear();

        match result {
            Ok(report) => {
                info!("Translation completed in {}.", Self::format_duration(report.duration));
                info!("{}", report.summary_line());
                Ok(report)
            }
            Err(e) => {
                if orchestrator.phase() == RunPhase::Aborted {
                    warn!(
                        "Progress is kept in {}; rerun to resume",
                        orchestrator.store().root().display()
                    );
                }
                Err(AppError::Run(e))
            }
        }
    }

    /// Persisted progress for `input_file`, if a run exists
    pub fn status(&self, input_file: &Path) -> Result<Option<RunStatus>, AppError> {
        let store = self.store_for(input_file);
        let Some(manifest) = store.load_manifest()? else {
            return Ok(None);
        };

        let summary = store
            .load_state()?
            .filter(|state| state.run_id == manifest.run_id)
            .map(|state| StateTracker::from_state_file(state, self.config.chunking.max_attempts).summary());

        let source_matches = match FileManager::hash_file(input_file) {
            Ok(hash) => hash == manifest.source.sha256,
            Err(_) => false,
        };

        Ok(Some(RunStatus {
            run_dir: store.root().to_path_buf(),
            manifest,
            summary,
            source_matches,
        }))
    }

    /// Format a duration in a human-readable format
    fn format_duration(duration: std::time::Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:03}s", seconds, duration.subsec_millis())
        }
    }
}

/// Build the translator selected in `config`
pub fn build_translator(config: &Config) -> Result<Box<dyn Translator>, AppError> {
    let translator: Box<dyn Translator> = match config.translator.kind {
        TranslatorKind::Passthrough => Box::new(PassthroughTranslator::new()),
        TranslatorKind::Command => {
            let command = &config.translator.command;
            Box::new(CommandTranslator::new(command.program.clone(), command.args.clone()))
        }
        TranslatorKind::Http => {
            let http = &config.translator.http;
            Box::new(
                HttpTranslator::new(http.endpoint.clone(), Some(http.api_key.clone()), http.timeout_secs)
                    .map_err(|e| AppError::Config(e.to_string()))?,
            )
        }
    };
    Ok(translator)
}
