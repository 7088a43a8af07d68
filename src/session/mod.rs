/*!
 * Run session state.
 *
 * This module provides:
 * - Persisted models (manifest, chunk status records)
 * - The run store that lays out a run directory
 * - The chunk state tracker that enforces the chunk lifecycle
 */

pub mod models;
pub mod store;
pub mod tracker;

// Re-export main types
pub use models::{AttemptOutcome, ChunkState, ChunkStatus, NextAction, RunManifest, SourceIdentity, TrackerSummary};
pub use store::RunStore;
pub use tracker::StateTracker;
