/*!
 * Scripted translator for testing.
 *
 * Each chunk can be given a queue of actions consumed one per dispatch; once a
 * chunk's queue is empty every further dispatch translates faithfully. Every call
 * is recorded, including the context revision the translator saw.
 *
 * - `ScriptedAction::Translate` - prefixes every line, keeps structure
 * - `ScriptedAction::ShiftTimestamp` - moves one timing by a millisecond
 * - `ScriptedAction::DropBlock` - deletes the last block
 * - `ScriptedAction::SwapBlocks` - swaps the first two blocks
 * - `ScriptedAction::Fail` - returns a recoverable error
 * - `ScriptedAction::Abort` - returns an unrecoverable error
 */

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::context::ContextAmendment;
use crate::errors::TranslatorError;
use crate::subtitle_processor::{SubtitleBlock, TimeRange};

use super::{TranslationRequest, TranslationResponse, Translator};

/// What the scripted translator does on one dispatch
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedAction {
    /// Prefix every line with the target language
    Translate,
    /// Translate, but shift the first owned block's end time
    ShiftTimestamp,
    /// Translate, but drop the last block
    DropBlock,
    /// Translate, but swap the first two blocks
    SwapBlocks,
    /// Fail with a recoverable error
    Fail(String),
    /// Fail with an unrecoverable error
    Abort(String),
}

/// One recorded dispatch
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptedCall {
    /// Chunk dispatched
    pub chunk_id: usize,
    /// Attempt number passed by the orchestrator
    pub attempt: u32,
    /// Context revision visible to the translator
    pub context_revision: u64,
    /// Rendered context visible to the translator
    pub context: String,
}

type Script = HashMap<usize, VecDeque<(ScriptedAction, Option<ContextAmendment>)>>;

/// Translator driven by per-chunk scripts
#[derive(Debug, Clone, Default)]
pub struct ScriptedTranslator {
    script: Arc<Mutex<Script>>,
    calls: Arc<Mutex<Vec<ScriptedCall>>>,
    request_count: Arc<AtomicUsize>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ScriptedTranslator {
    /// Translator that translates every chunk faithfully
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an action for the next dispatch of `chunk_id`
    pub fn on(self, chunk_id: usize, action: ScriptedAction) -> Self {
        lock(&self.script)
            .entry(chunk_id)
            .or_default()
            .push_back((action, None));
        self
    }

    /// Queue an action that also proposes a context amendment
    pub fn on_with_amendment(self, chunk_id: usize, action: ScriptedAction, amendment: ContextAmendment) -> Self {
        lock(&self.script)
            .entry(chunk_id)
            .or_default()
            .push_back((action, Some(amendment)));
        self
    }

    /// Calls recorded so far
    pub fn calls(&self) -> Vec<ScriptedCall> {
        lock(&self.calls).clone()
    }

    /// Dispatches recorded for one chunk
    pub fn calls_for(&self, chunk_id: usize) -> Vec<ScriptedCall> {
        self.calls().into_iter().filter(|c| c.chunk_id == chunk_id).collect()
    }

    /// Total dispatches
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    fn translate_blocks(blocks: &[SubtitleBlock], language: &str) -> Vec<SubtitleBlock> {
        blocks
            .iter()
            .map(|block| {
                block.with_lines(block.lines.iter().map(|line| format!("[{}] {}", language, line)).collect())
            })
            .collect()
    }
}

#[async_trait]
impl Translator for ScriptedTranslator {
    async fn translate(&self, request: TranslationRequest<'_>) -> Result<TranslationResponse, TranslatorError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        lock(&self.calls).push(ScriptedCall {
            chunk_id: request.chunk.id,
            attempt: request.attempt,
            context_revision: request.context.revision(),
            context: request.context.render(),
        });

        let (action, amendment) = lock(&self.script)
            .get_mut(&request.chunk.id)
            .and_then(|queue| queue.pop_front())
            .unwrap_or((ScriptedAction::Translate, None));

        let mut blocks = Self::translate_blocks(&request.chunk.blocks, &request.settings.target_language);
        match action {
            ScriptedAction::Translate => {}
            ScriptedAction::ShiftTimestamp => {
                let position = request.chunk.overlap_head.min(blocks.len().saturating_sub(1));
                if let Some(block) = blocks.get_mut(position) {
                    let (start, end) = (block.time_range.start_ms, block.time_range.end_ms);
                    block.time_range = TimeRange::new(start, end + 1);
                }
            }
            ScriptedAction::DropBlock => {
                blocks.pop();
            }
            ScriptedAction::SwapBlocks => {
                if blocks.len() > 1 {
                    blocks.swap(0, 1);
                }
            }
            ScriptedAction::Fail(message) => return Err(TranslatorError::CommandFailed(message)),
            ScriptedAction::Abort(message) => return Err(TranslatorError::Unrecoverable(message)),
        }

        Ok(TranslationResponse { blocks, amendment })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
