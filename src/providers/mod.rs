/*!
 * Translator implementations.
 *
 * The translator is an external actor: it receives a chunk, a snapshot of the
 * shared context and the run settings, and hands back the chunk with rewritten
 * text plus an optional context amendment. This module contains:
 * - `passthrough`: returns the chunk unchanged, optionally stripping accessibility aids
 * - `command`: runs an external program on files in a scratch directory
 * - `http`: posts the chunk to a remote agent as JSON
 * - `mock`: a scripted translator for tests
 */

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::chunking::{Chunk, ChunkFile};
use crate::context::{ContextAmendment, ContextDocument};
use crate::errors::TranslatorError;
use crate::subtitle_processor::SubtitleBlock;
use crate::validation::FailureReason;

pub mod command;
pub mod http;
pub mod mock;
pub mod passthrough;

pub use command::CommandTranslator;
pub use http::HttpTranslator;
pub use mock::{ScriptedAction, ScriptedTranslator};
pub use passthrough::PassthroughTranslator;

/// Settings collected once per run and passed with every chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationSettings {
    /// Target language code (ISO 639-1 or 639-2)
    pub target_language: String,
    /// Regional variant such as "BR" or "419"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regional_variant: Option<String>,
    /// Whether sound descriptions and speaker labels should be dropped
    #[serde(default)]
    pub remove_accessibility_aids: bool,
}

impl TranslationSettings {
    /// Language tag such as "pt-BR", or the bare language without a variant
    pub fn language_tag(&self) -> String {
        match &self.regional_variant {
            Some(variant) => format!("{}-{}", self.target_language, variant),
            None => self.target_language.clone(),
        }
    }
}

/// One dispatch of one chunk
#[derive(Debug, Clone, Copy)]
pub struct TranslationRequest<'a> {
    /// Chunk to translate, overlap included
    pub chunk: &'a Chunk,
    /// Context snapshot taken before dispatch
    pub context: &'a ContextDocument,
    /// Run settings
    pub settings: &'a TranslationSettings,
    /// 1-based attempt number
    pub attempt: u32,
    /// Why the previous attempt was rejected, if it was
    pub previous_failure: Option<&'a FailureReason>,
}

/// What the translator hands back
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranslationResponse {
    /// Candidate blocks, overlap included
    pub blocks: Vec<SubtitleBlock>,
    /// Proposed context additions
    pub amendment: Option<ContextAmendment>,
}

impl TranslationResponse {
    /// Parse chunk file text produced by a translator
    pub fn from_chunk_text(text: &str, amendment: Option<ContextAmendment>) -> Result<Self, TranslatorError> {
        let file = ChunkFile::parse(text).map_err(|e| TranslatorError::ParseError(e.to_string()))?;
        Ok(Self {
            blocks: file.into_blocks(),
            amendment: amendment.filter(|a| !a.is_empty()),
        })
    }
}

/// Common trait for all translators
///
/// Implementations must be usable from the orchestrator's async loop and may be
/// swapped freely; the orchestrator never looks inside.
#[async_trait]
pub trait Translator: Send + Sync + Debug {
    /// Translate one chunk
    ///
    /// # Returns
    /// * `Ok(TranslationResponse)` - candidate blocks and optional amendment
    /// * `Err(TranslatorError)` - counted as a failed attempt when recoverable,
    ///   aborts the run otherwise
    async fn translate(&self, request: TranslationRequest<'_>) -> Result<TranslationResponse, TranslatorError>;

    /// Short name for logs
    fn name(&self) -> &str;
}
