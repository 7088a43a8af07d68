/*!
 * # chunkwise - resumable chunked subtitle translation
 *
 * A Rust library that drives long SRT files through a translator one chunk at a
 * time, with validation, retries and crash-safe resume.
 *
 * ## Features
 *
 * - Split a block sequence into fixed-size chunks with overlap context
 * - Validate every translated chunk against its source (block count, indices, timing)
 * - Retry rejected chunks up to a ceiling, feeding back the rejection reason
 * - Shared context document amended only by validated chunks
 * - Persist every transition so interrupted runs resume where they stopped
 * - Join validated chunks and verify the result before writing it atomically
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `subtitle_processor`: SRT parsing and serialization
 * - `chunking`: chunk model, splitter and joiner
 * - `validation`: structural checks and readability advisories
 * - `context`: the shared context document and amendments
 * - `session`: run directory layout and the chunk state tracker
 * - `providers`: the `Translator` trait and its implementations:
 *   - `providers::command`: external program per chunk
 *   - `providers::http`: remote translation agent
 *   - `providers::passthrough`: identity translator
 *   - `providers::mock`: scripted translator for tests
 * - `pipeline`: the run orchestrator
 * - `app_config`, `app_controller`: configuration and the CLI-facing controller
 * - `file_utils`, `language_utils`: file system and ISO language code helpers
 * - `errors`: custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod chunking;
pub mod context;
pub mod errors;
pub mod file_utils;
pub mod language_utils;
pub mod pipeline;
pub mod providers;
pub mod session;
pub mod subtitle_processor;
pub mod validation;

// Re-export main types for easier usage
pub use app_config::Config;
pub use chunking::{Chunk, Joiner, Splitter};
pub use context::{ContextAmendment, ContextDocument};
pub use errors::{AppError, ChunkError, RunError, StateError, SubtitleError, TranslatorError};
pub use language_utils::{get_language_name, normalize_to_part2t};
pub use pipeline::{Orchestrator, RunReport, RunSettings};
pub use providers::{TranslationRequest, TranslationResponse, Translator};
pub use session::{ChunkStatus, RunStore, StateTracker};
pub use subtitle_processor::{SubtitleBlock, SubtitleCollection, TimeRange};
pub use validation::{ChunkValidator, FailureReason, Verdict};
