/*!
 * Passthrough translator.
 *
 * Leaves text untouched, except for stripping accessibility aids when the run
 * asks for it. Useful for dry runs and for cleaning SDH subtitles without
 * translating them.
 */

use async_trait::async_trait;

use crate::errors::TranslatorError;
use crate::subtitle_processor::strip_accessibility_aids;

use super::{TranslationRequest, TranslationResponse, Translator};

/// Translator that returns its input
#[derive(Debug, Clone, Default)]
pub struct PassthroughTranslator;

impl PassthroughTranslator {
    /// Create a passthrough translator
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Translator for PassthroughTranslator {
    async fn translate(&self, request: TranslationRequest<'_>) -> Result<TranslationResponse, TranslatorError> {
        let blocks = if request.settings.remove_accessibility_aids {
            request
                .chunk
                .blocks
                .iter()
                .map(|block| block.with_lines(strip_accessibility_aids(&block.lines)))
                .collect()
        } else {
            request.chunk.blocks.clone()
        };

        Ok(TranslationResponse {
            blocks,
            amendment: None,
        })
    }

    fn name(&self) -> &str {
        "passthrough"
    }
}
