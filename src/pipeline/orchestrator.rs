/*!
 * Run orchestrator.
 *
 * Drives one source file through the chunk lifecycle:
 *
 * ```text
 * INIT -> RUNNING -> JOINING -> DONE
 *            |
 *            +-> ABORTED
 * ```
 *
 * INIT parses the source and either resumes the persisted run (same source hash
 * and window) or splits afresh. RUNNING dispatches chunks strictly in order,
 * validating every candidate and retrying up to the attempt ceiling. JOINING
 * reassembles the owned regions and writes the output atomically.
 *
 * A passing chunk is committed in three steps: candidate and amendment files,
 * then the VALIDATED record carrying the new context revision, then the context
 * document. A context file found one revision behind on resume gets the last
 * committed amendment re-applied.
 */

use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::chunking::splitter::{DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP_SIZE};
use crate::chunking::{Chunk, Joiner, Splitter};
use crate::context::{ContextAmendment, ContextDocument};
use crate::errors::{RunError, StateError, SubtitleError};
use crate::providers::{TranslationRequest, TranslationSettings, Translator};
use crate::session::{AttemptOutcome, ChunkStatus, NextAction, RunManifest, RunStore, SourceIdentity, StateTracker, TrackerSummary};
use crate::subtitle_processor::{SubtitleBlock, SubtitleCollection};
use crate::validation::{ChunkValidator, FailureReason, ValidationConfig, Verdict};

/// Default attempt ceiling per chunk
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Settings of one run.
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Owned blocks per chunk
    pub chunk_size: usize,

    /// Overlap blocks on each side
    pub overlap_size: usize,

    /// Attempts before a chunk is marked FAILED
    pub max_attempts: u32,

    /// Passed to the translator with every chunk
    pub translation: TranslationSettings,

    /// Advisory thresholds
    pub validation: ValidationConfig,

    /// Discard persisted state instead of resuming
    pub fresh: bool,
}

impl RunSettings {
    /// Default window and attempts for the given translation settings.
    pub fn new(translation: TranslationSettings) -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap_size: DEFAULT_OVERLAP_SIZE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            translation,
            validation: ValidationConfig::default(),
            fresh: false,
        }
    }

    /// Set the chunk window.
    pub fn with_window(mut self, chunk_size: usize, overlap_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self.overlap_size = overlap_size;
        self
    }

    /// Set the attempt ceiling.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set advisory thresholds.
    pub fn with_validation(mut self, validation: ValidationConfig) -> Self {
        self.validation = validation;
        self
    }

    /// Start over even when a matching run exists.
    pub fn with_fresh(mut self, fresh: bool) -> Self {
        self.fresh = fresh;
        self
    }
}

/// Phases of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// Parsing, resuming or splitting
    Init,
    /// Dispatching chunks
    Running,
    /// Reassembling output
    Joining,
    /// Output written
    Done,
    /// Stopped on an error
    Aborted,
}

/// Progress information reported after every chunk transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunProgress {
    /// Current phase
    pub phase: RunPhase,

    /// Chunks validated so far
    pub validated: usize,

    /// Total chunks (0 until the split is known)
    pub total: usize,

    /// Chunk the message refers to
    pub chunk_id: Option<usize>,

    /// Current status message
    pub status: String,
}

/// Callback receiving progress updates.
pub type ProgressCallback = Box<dyn Fn(&RunProgress) + Send + Sync>;

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Run id from the manifest
    pub run_id: String,

    /// Where the joined file was written
    pub output_path: PathBuf,

    /// Chunks in the run
    pub chunk_count: usize,

    /// Blocks in source and output
    pub block_count: usize,

    /// Whether persisted state was reused
    pub resumed: bool,

    /// Chunk id of every dispatch made by this invocation, in order
    pub dispatched: Vec<usize>,

    /// Advisories raised on chunks validated by this invocation
    pub advisories: usize,

    /// Output blocks without text
    pub empty_blocks: usize,

    /// Final context revision
    pub context_revision: u64,

    /// Final chunk counts
    pub summary: TrackerSummary,

    /// Wall-clock time
    pub duration: Duration,
}

impl RunReport {
    /// One-line summary for display.
    pub fn summary_line(&self) -> String {
        let mut parts = vec![
            format!("{} blocks in {} chunks", self.block_count, self.chunk_count),
            format!("{} dispatches", self.dispatched.len()),
            format!("context revision {}", self.context_revision),
        ];
        if self.resumed {
            parts.push("resumed".to_string());
        }
        if self.advisories > 0 {
            parts.push(format!("{} advisories", self.advisories));
        }
        if self.empty_blocks > 0 {
            parts.push(format!("{} empty blocks", self.empty_blocks));
        }
        parts.push(format!("{:.2}s", self.duration.as_secs_f32()));
        parts.join(" | ")
    }
}

/// Run state rebuilt or created during INIT
struct Prepared {
    manifest: RunManifest,
    chunks: Vec<Chunk>,
    tracker: StateTracker,
    context: ContextDocument,
    resumed: bool,
}

/// The chunk lifecycle driver.
pub struct Orchestrator {
    settings: RunSettings,
    store: RunStore,
    translator: Box<dyn Translator>,
    validator: ChunkValidator,
    progress: Option<ProgressCallback>,
    phase: RunPhase,
}

impl Orchestrator {
    /// Create an orchestrator writing run artifacts to `store`.
    pub fn new(settings: RunSettings, store: RunStore, translator: Box<dyn Translator>) -> Self {
        let validator = ChunkValidator::new(settings.validation.clone());
        Self {
            settings,
            store,
            translator,
            validator,
            progress: None,
            phase: RunPhase::Init,
        }
    }

    /// Report progress to `callback`.
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Phase reached by the last run.
    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Run store in use.
    pub fn store(&self) -> &RunStore {
        &self.store
    }

    /// Translate `source` and write the joined result to `output`.
    pub async fn run(&mut self, source: &Path, output: &Path) -> Result<RunReport, RunError> {
        let result = self.execute(source, output).await;
        if let Err(e) = &result {
            self.phase = RunPhase::Aborted;
            self.report(0, 0, None, format!("Run aborted: {}", e));
        }
        result
    }

    async fn execute(&mut self, source: &Path, output: &Path) -> Result<RunReport, RunError> {
        let started = Instant::now();
        self.phase = RunPhase::Init;

        let bytes = std::fs::read(source)
            .map_err(|e| SubtitleError::Read(format!("{}: {}", source.display(), e)))?;
        let blocks = SubtitleCollection::parse_srt_bytes(&bytes)?;
        let splitter = Splitter::new(self.settings.chunk_size, self.settings.overlap_size)?;
        let file_name = source
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        let identity = SourceIdentity::from_bytes(file_name, &bytes);

        info!(
            "Loaded {} blocks from {} [{}]",
            blocks.len(),
            source.display(),
            identity.short_hash()
        );

        let Prepared {
            manifest,
            chunks,
            mut tracker,
            mut context,
            resumed,
        } = self.prepare(&identity, &blocks, &splitter)?;

        self.phase = RunPhase::Running;
        let total = chunks.len();
        let mut dispatched = Vec::new();
        let mut advisories = 0;

        loop {
            match tracker.next_actionable() {
                NextAction::RunComplete => break,
                NextAction::RunFailed(chunk_id) => {
                    let state = tracker.get(chunk_id)?;
                    return Err(RunError::PreviouslyFailed {
                        chunk_id,
                        last_error: state.last_error.clone().unwrap_or_default(),
                    });
                }
                NextAction::Dispatch(chunk_id) => {
                    let chunk = chunk_id
                        .checked_sub(1)
                        .and_then(|i| chunks.get(i))
                        .ok_or(StateError::UnknownChunk(chunk_id))?;
                    advisories += self
                        .process_chunk(chunk, &mut tracker, &mut context, &mut dispatched)
                        .await?;
                    self.report(tracker.summary().validated, total, Some(chunk_id), format!("Chunk {} validated", chunk_id));
                }
            }
        }

        self.phase = RunPhase::Joining;
        self.report(total, total, None, "Joining chunks".to_string());
        let joined = self.join(&chunks, &blocks)?;
        let empty_blocks = joined.iter().filter(|block| block.is_empty()).count();

        SubtitleCollection::from_blocks(output.to_path_buf(), joined).write_to_srt(output)?;

        self.phase = RunPhase::Done;
        info!("Wrote {} ({} blocks)", output.display(), blocks.len());
        self.report(total, total, None, format!("Wrote {}", output.display()));

        Ok(RunReport {
            run_id: manifest.run_id,
            output_path: output.to_path_buf(),
            chunk_count: total,
            block_count: blocks.len(),
            resumed,
            dispatched,
            advisories,
            empty_blocks,
            context_revision: context.revision(),
            summary: tracker.summary(),
            duration: started.elapsed(),
        })
    }

    /// Resume the persisted run when it matches, otherwise split afresh
    fn prepare(
        &self,
        identity: &SourceIdentity,
        blocks: &[SubtitleBlock],
        splitter: &Splitter,
    ) -> Result<Prepared, RunError> {
        if self.settings.fresh {
            info!("Starting fresh run in {}", self.store.root().display());
        } else if let Some(manifest) = self.store.load_manifest().unwrap_or_else(|e| {
            warn!("Ignoring unreadable manifest: {:#}", e);
            None
        }) {
            match manifest.check_matches(identity, splitter.chunk_size(), splitter.overlap_size()) {
                Ok(()) => match self.resume(manifest) {
                    Ok(prepared) => return Ok(prepared),
                    Err(e) => warn!("Cannot resume persisted run ({:#}); restarting", e),
                },
                Err(mismatch) => warn!("{}; restarting", mismatch),
            }
        }

        self.split(identity, blocks, splitter)
    }

    fn split(
        &self,
        identity: &SourceIdentity,
        blocks: &[SubtitleBlock],
        splitter: &Splitter,
    ) -> Result<Prepared, RunError> {
        let chunks = splitter.split(blocks)?;
        let manifest = RunManifest::new(
            identity.clone(),
            splitter.chunk_size(),
            splitter.overlap_size(),
            blocks.len(),
            &chunks,
        );

        self.store.reset()?;
        self.store.write_split(&manifest, &chunks)?;

        let context = ContextDocument::new();
        self.store.write_context(&context)?;

        let tracker = StateTracker::new(manifest.run_id.clone(), chunks.len(), self.settings.max_attempts)
            .persisted_to(self.store.clone());
        tracker.save()?;

        info!(
            "Run {}: split {} blocks into {} chunks (size {}, overlap {})",
            manifest.short_id(),
            blocks.len(),
            chunks.len(),
            splitter.chunk_size(),
            splitter.overlap_size()
        );

        Ok(Prepared {
            manifest,
            chunks,
            tracker,
            context,
            resumed: false,
        })
    }

    fn resume(&self, manifest: RunManifest) -> anyhow::Result<Prepared> {
        let chunks = self.store.load_chunks(&manifest)?;

        let tracker = match self.store.load_state()? {
            Some(state) if state.run_id == manifest.run_id && state.chunks.len() == chunks.len() => {
                if let Some((position, record)) = state
                    .chunks
                    .iter()
                    .enumerate()
                    .find(|(position, record)| record.chunk_id != position + 1)
                {
                    anyhow::bail!(
                        "state record {} carries chunk id {}",
                        position + 1,
                        record.chunk_id
                    );
                }
                StateTracker::from_state_file(state, self.settings.max_attempts)
            }
            Some(_) => anyhow::bail!("state file does not belong to run {}", manifest.short_id()),
            None => StateTracker::new(manifest.run_id.clone(), chunks.len(), self.settings.max_attempts),
        };
        let mut tracker = tracker.persisted_to(self.store.clone());
        let recovered = tracker.recover_in_flight()?;
        if recovered.is_empty() {
            tracker.save()?;
        }

        let mut context = self.store.load_context()?.unwrap_or_default();
        if let Some((chunk_id, revision)) = tracker.latest_commit() {
            if context.revision() + 1 == revision {
                if let Some(amendment) = self.store.load_amendment(chunk_id)? {
                    context.apply(&amendment);
                    self.store.write_context(&context)?;
                    info!("Re-applied context amendment of chunk {} (revision {})", chunk_id, revision);
                }
            } else if context.revision() < revision {
                warn!(
                    "Context is at revision {} but chunk {} committed revision {}",
                    context.revision(),
                    chunk_id,
                    revision
                );
            }
        }

        info!(
            "Resuming run {}: {}",
            manifest.short_id(),
            tracker.summary()
        );

        Ok(Prepared {
            manifest,
            chunks,
            tracker,
            context,
            resumed: true,
        })
    }

    /// Dispatch one chunk until it validates or runs out of attempts. Returns the
    /// number of advisories raised on the passing candidate.
    async fn process_chunk(
        &self,
        chunk: &Chunk,
        tracker: &mut StateTracker,
        context: &mut ContextDocument,
        dispatched: &mut Vec<usize>,
    ) -> Result<usize, RunError> {
        let mut previous_failure: Option<FailureReason> = None;

        loop {
            tracker.begin(chunk.id)?;
            let attempt = tracker.get(chunk.id)?.attempts + 1;
            dispatched.push(chunk.id);
            debug!(
                "Dispatching chunk {} (attempt {}/{}) to {} at context revision {}",
                chunk.id,
                attempt,
                tracker.max_attempts(),
                self.translator.name(),
                context.revision()
            );

            let request = TranslationRequest {
                chunk,
                context: &*context,
                settings: &self.settings.translation,
                attempt,
                previous_failure: previous_failure.as_ref(),
            };

            let (reason, candidate) = match self.translator.translate(request).await {
                Ok(response) => {
                    let candidate = chunk.with_blocks(response.blocks);
                    match self.validator.validate(chunk, &candidate) {
                        Verdict::Pass(report) => {
                            let amendment = response.amendment.filter(|a| !a.is_empty());
                            self.commit(&candidate, amendment, tracker, context)?;
                            report.log(chunk.id);
                            info!(
                                "Chunk {}/{} validated on attempt {}",
                                chunk.id,
                                tracker.states().len(),
                                attempt
                            );
                            return Ok(report.advisories.len());
                        }
                        Verdict::Fail(reason) => (reason, Some(candidate)),
                    }
                }
                Err(e) if e.is_recoverable() => (FailureReason::TranslatorError(e.to_string()), None),
                Err(e) => {
                    tracker.release(chunk.id)?;
                    self.store
                        .log_issue(&format!("chunk {} attempt {}: aborted: {}", chunk.id, attempt, e))?;
                    return Err(RunError::TranslatorAborted {
                        chunk_id: chunk.id,
                        source: e,
                    });
                }
            };

            if let Some(candidate) = &candidate {
                self.store.write_rejected(candidate)?;
            }
            self.store
                .log_issue(&format!("chunk {} attempt {}: {}", chunk.id, attempt, reason))?;
            warn!("Chunk {} attempt {} rejected: {}", chunk.id, attempt, reason);

            let status = tracker.advance(
                chunk.id,
                AttemptOutcome::Failed {
                    reason: reason.to_string(),
                },
            )?;
            self.report(
                tracker.summary().validated,
                tracker.states().len(),
                Some(chunk.id),
                format!("Chunk {} attempt {} rejected", chunk.id, attempt),
            );

            if status == ChunkStatus::Failed {
                return Err(RunError::RetryExhausted {
                    chunk_id: chunk.id,
                    attempts: tracker.get(chunk.id)?.attempts,
                    reason,
                });
            }
            previous_failure = Some(reason);
        }
    }

    /// Commit a passing candidate and its amendment
    fn commit(
        &self,
        candidate: &Chunk,
        amendment: Option<ContextAmendment>,
        tracker: &mut StateTracker,
        context: &mut ContextDocument,
    ) -> Result<(), RunError> {
        self.store.write_candidate(candidate)?;
        match &amendment {
            Some(amendment) => self.store.write_amendment(candidate.id, amendment)?,
            None => self.store.clear_amendment(candidate.id)?,
        }

        let revision = amendment
            .as_ref()
            .map_or(context.revision(), |a| context.revision_after(a));
        tracker.advance(
            candidate.id,
            AttemptOutcome::Passed {
                context_revision: revision,
            },
        )?;

        if let Some(amendment) = &amendment {
            context.apply(amendment);
            self.store.write_context(context)?;
            debug!(
                "Chunk {} amended context to revision {}",
                candidate.id,
                context.revision()
            );
        }
        Ok(())
    }

    fn join(&self, chunks: &[Chunk], source: &[SubtitleBlock]) -> Result<Vec<SubtitleBlock>, RunError> {
        let candidates = chunks
            .iter()
            .map(|chunk| self.store.load_candidate(chunk))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Joiner::new(source.len()).join_verified(&candidates, source)?)
    }

    fn report(&self, validated: usize, total: usize, chunk_id: Option<usize>, status: String) {
        if let Some(callback) = &self.progress {
            callback(&RunProgress {
                phase: self.phase,
                validated,
                total,
                chunk_id,
                status,
            });
        }
    }
}
