/*!
 * External command translator.
 *
 * Each dispatch gets a fresh scratch directory holding the chunk file and the
 * context snapshot. The configured program is run with placeholders in its
 * arguments substituted:
 *
 * - `{input}`: chunk file to translate
 * - `{output}`: where the translated chunk file should be written
 * - `{context}`: context document snapshot
 * - `{amendment}`: where context additions may be written (markdown, optional)
 * - `{target_language}`, `{chunk_id}`, `{attempt}`
 *
 * The same values are exported as `CHUNKWISE_*` environment variables. When the
 * program writes nothing to `{output}`, its stdout is read as the chunk file.
 * Exit code 3 reports an error retrying cannot fix.
 */

use async_trait::async_trait;
use log::debug;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::path::Path;
use tempfile::TempDir;
use tokio::process::Command;

use crate::context::ContextAmendment;
use crate::errors::TranslatorError;
use crate::file_utils::FileManager;

use super::{TranslationRequest, TranslationResponse, Translator};

// @const: `{name}` placeholder in a command argument
static PLACEHOLDER_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{(\w+)\}").expect("valid placeholder regex"));

/// Exit code a translator command uses to abort the run
pub const UNRECOVERABLE_EXIT_CODE: i32 = 3;

/// Translator backed by an external program
#[derive(Debug, Clone)]
pub struct CommandTranslator {
    program: String,
    args: Vec<String>,
}

impl CommandTranslator {
    /// Create a command translator
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Replace known placeholders in one pass; substituted values are not rescanned
    fn substitute(template: &str, values: &HashMap<&'static str, String>) -> String {
        PLACEHOLDER_REGEX
            .replace_all(template, |caps: &Captures| match values.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    fn io_error(action: &str, path: &Path, e: impl std::fmt::Display) -> TranslatorError {
        TranslatorError::Unrecoverable(format!("Failed to {} {}: {}", action, path.display(), e))
    }
}

#[async_trait]
impl Translator for CommandTranslator {
    async fn translate(&self, request: TranslationRequest<'_>) -> Result<TranslationResponse, TranslatorError> {
        let scratch = TempDir::new()
            .map_err(|e| TranslatorError::Unrecoverable(format!("Failed to create scratch directory: {}", e)))?;

        let input = scratch.path().join(request.chunk.file_name());
        let output = scratch.path().join("output.srt");
        let context = scratch.path().join("context.md");
        let amendment = scratch.path().join("amendment.md");

        FileManager::write_to_file(&input, &request.chunk.to_chunk_file())
            .map_err(|e| Self::io_error("write", &input, format!("{:#}", e)))?;
        FileManager::write_to_file(&context, &request.context.render())
            .map_err(|e| Self::io_error("write", &context, format!("{:#}", e)))?;

        let mut values: HashMap<&'static str, String> = HashMap::new();
        values.insert("input", input.display().to_string());
        values.insert("output", output.display().to_string());
        values.insert("context", context.display().to_string());
        values.insert("amendment", amendment.display().to_string());
        values.insert("target_language", request.settings.target_language.clone());
        values.insert("chunk_id", request.chunk.id.to_string());
        values.insert("attempt", request.attempt.to_string());

        let args: Vec<String> = self.args.iter().map(|arg| Self::substitute(arg, &values)).collect();
        debug!("Running translator command: {} {:?}", self.program, args);

        let mut command = Command::new(&self.program);
        command.args(&args).current_dir(scratch.path()).kill_on_drop(true);
        for (key, value) in &values {
            command.env(format!("CHUNKWISE_{}", key.to_uppercase()), value);
        }
        command.env(
            "CHUNKWISE_REGIONAL_VARIANT",
            request.settings.regional_variant.clone().unwrap_or_default(),
        );
        command.env(
            "CHUNKWISE_REMOVE_ACCESSIBILITY_AIDS",
            request.settings.remove_accessibility_aids.to_string(),
        );
        if let Some(failure) = request.previous_failure {
            command.env("CHUNKWISE_PREVIOUS_FAILURE", failure.to_string());
        }

        let result = command.output().await.map_err(|e| {
            TranslatorError::Unrecoverable(format!("Failed to run {}: {}", self.program, e))
        })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();
            let message = format!("{} exited with {}: {}", self.program, result.status, stderr);
            return Err(match result.status.code() {
                Some(UNRECOVERABLE_EXIT_CODE) => TranslatorError::Unrecoverable(message),
                _ => TranslatorError::CommandFailed(message),
            });
        }

        let text = match FileManager::read_optional(&output)
            .map_err(|e| Self::io_error("read", &output, format!("{:#}", e)))?
        {
            Some(text) => text,
            None => String::from_utf8(result.stdout)
                .map_err(|e| TranslatorError::ParseError(format!("stdout is not valid UTF-8: {}", e)))?,
        };

        let amendment = FileManager::read_optional(&amendment)
            .map_err(|e| Self::io_error("read", &amendment, format!("{:#}", e)))?
            .map(|text| ContextAmendment::parse(&text));

        TranslationResponse::from_chunk_text(&text, amendment)
    }

    fn name(&self) -> &str {
        &self.program
    }
}
