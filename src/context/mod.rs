/*!
 * Shared context store.
 *
 * A single markdown document of terms, characters and notes that every chunk
 * reads before translation. Translators propose amendments alongside their
 * candidates; the orchestrator commits an amendment only when the candidate
 * passes validation, bumping the document revision.
 */

pub mod document;

pub use document::{ContextAmendment, ContextDocument, ContextSection};
