/*!
 * Run pipeline.
 *
 * - `orchestrator`: the sequential chunk loop, resume logic and final join
 */

pub mod orchestrator;

pub use orchestrator::{
    Orchestrator, ProgressCallback, RunPhase, RunProgress, RunReport, RunSettings, DEFAULT_MAX_ATTEMPTS,
};
