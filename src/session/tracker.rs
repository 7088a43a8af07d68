/*!
 * Chunk state tracker.
 *
 * Holds one status record per chunk and enforces the lifecycle:
 *
 * ```text
 * PENDING --begin--> IN_PROGRESS --pass--> VALIDATED
 *    ^                   |
 *    +--fail (< max)-----+--fail (= max)--> FAILED
 *    +--release / recover_in_flight
 * ```
 *
 * When attached to a run store, every transition rewrites `state.json`.
 */

use log::{debug, warn};
use std::cmp::Reverse;

use crate::errors::StateError;

use super::models::{AttemptOutcome, ChunkState, ChunkStatus, NextAction, StateFile, TrackerSummary};
use super::store::RunStore;

/// Per-chunk status and retry accounting
#[derive(Debug, Clone)]
pub struct StateTracker {
    run_id: String,
    max_attempts: u32,
    states: Vec<ChunkState>,
    store: Option<RunStore>,
}

impl StateTracker {
    /// Fresh tracker with every chunk PENDING
    pub fn new(run_id: impl Into<String>, chunk_count: usize, max_attempts: u32) -> Self {
        Self {
            run_id: run_id.into(),
            max_attempts: max_attempts.max(1),
            states: (1..=chunk_count).map(ChunkState::pending).collect(),
            store: None,
        }
    }

    /// Tracker rehydrated from persisted records
    pub fn from_state_file(state: StateFile, max_attempts: u32) -> Self {
        Self {
            run_id: state.run_id,
            max_attempts: max_attempts.max(1),
            states: state.chunks,
            store: None,
        }
    }

    /// Persist every transition to `store`
    pub fn persisted_to(mut self, store: RunStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Run the records belong to
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Attempt ceiling
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// All records in chunk order
    pub fn states(&self) -> &[ChunkState] {
        &self.states
    }

    /// Record of one chunk
    pub fn get(&self, chunk_id: usize) -> Result<&ChunkState, StateError> {
        chunk_id
            .checked_sub(1)
            .and_then(|i| self.states.get(i))
            .ok_or(StateError::UnknownChunk(chunk_id))
    }

    fn get_mut(&mut self, chunk_id: usize) -> Result<&mut ChunkState, StateError> {
        chunk_id
            .checked_sub(1)
            .and_then(|i| self.states.get_mut(i))
            .ok_or(StateError::UnknownChunk(chunk_id))
    }

    /// PENDING -> IN_PROGRESS
    pub fn begin(&mut self, chunk_id: usize) -> Result<(), StateError> {
        let state = self.get_mut(chunk_id)?;
        require(state, ChunkStatus::Pending, "begin")?;
        state.status = ChunkStatus::InProgress;
        state.touch();
        debug!("Chunk {} in progress (attempt {})", chunk_id, state.attempts + 1);
        self.persist()
    }

    /// Record the outcome of an attempt on an IN_PROGRESS chunk. Returns the new
    /// status.
    pub fn advance(&mut self, chunk_id: usize, outcome: AttemptOutcome) -> Result<ChunkStatus, StateError> {
        let max_attempts = self.max_attempts;
        let state = self.get_mut(chunk_id)?;
        require(state, ChunkStatus::InProgress, "advance")?;

        state.attempts += 1;
        match outcome {
            AttemptOutcome::Passed { context_revision } => {
                state.status = ChunkStatus::Validated;
                state.context_revision = Some(context_revision);
            }
            AttemptOutcome::Failed { reason } => {
                state.status = if state.attempts >= max_attempts {
                    ChunkStatus::Failed
                } else {
                    ChunkStatus::Pending
                };
                state.last_error = Some(reason);
            }
        }
        state.touch();

        let status = state.status;
        debug!(
            "Chunk {} -> {} after {} attempt(s)",
            chunk_id, status, state.attempts
        );
        self.persist()?;
        Ok(status)
    }

    /// IN_PROGRESS -> PENDING without consuming an attempt
    pub fn release(&mut self, chunk_id: usize) -> Result<(), StateError> {
        let state = self.get_mut(chunk_id)?;
        require(state, ChunkStatus::InProgress, "release")?;
        state.status = ChunkStatus::Pending;
        state.touch();
        self.persist()
    }

    /// Return every IN_PROGRESS chunk to PENDING (interrupted run). Returns the
    /// ids that were recovered.
    pub fn recover_in_flight(&mut self) -> Result<Vec<usize>, StateError> {
        let mut recovered = Vec::new();
        for state in self
            .states
            .iter_mut()
            .filter(|s| s.status == ChunkStatus::InProgress)
        {
            state.status = ChunkStatus::Pending;
            state.touch();
            recovered.push(state.chunk_id);
        }

        if !recovered.is_empty() {
            warn!("Recovered interrupted chunk(s) {:?}", recovered);
            self.persist()?;
        }
        Ok(recovered)
    }

    /// FAILED anywhere stops the run; otherwise the first chunk not yet VALIDATED
    pub fn next_actionable(&self) -> NextAction {
        if let Some(failed) = self.states.iter().find(|s| s.status == ChunkStatus::Failed) {
            return NextAction::RunFailed(failed.chunk_id);
        }

        match self.states.iter().find(|s| s.status != ChunkStatus::Validated) {
            Some(state) => NextAction::Dispatch(state.chunk_id),
            None => NextAction::RunComplete,
        }
    }

    /// Highest context revision recorded by a VALIDATED chunk, with the id of the
    /// chunk that introduced it (chunks passing without an amendment repeat the
    /// revision of an earlier chunk)
    pub fn latest_commit(&self) -> Option<(usize, u64)> {
        self.states
            .iter()
            .filter(|s| s.status == ChunkStatus::Validated)
            .filter_map(|s| s.context_revision.map(|rev| (s.chunk_id, rev)))
            .max_by_key(|(id, rev)| (*rev, Reverse(*id)))
    }

    /// Write the records now, without a transition
    pub fn save(&self) -> Result<(), StateError> {
        self.persist()
    }

    /// Counts per status
    pub fn summary(&self) -> TrackerSummary {
        let mut summary = TrackerSummary {
            total: self.states.len(),
            ..Default::default()
        };
        for state in &self.states {
            match state.status {
                ChunkStatus::Pending => summary.pending += 1,
                ChunkStatus::InProgress => summary.in_progress += 1,
                ChunkStatus::Validated => summary.validated += 1,
                ChunkStatus::Failed => summary.failed += 1,
            }
            summary.attempts += state.attempts;
        }
        summary
    }

    /// Snapshot for persistence
    pub fn to_state_file(&self) -> StateFile {
        StateFile {
            run_id: self.run_id.clone(),
            chunks: self.states.clone(),
        }
    }

    fn persist(&self) -> Result<(), StateError> {
        match &self.store {
            Some(store) => store
                .write_state(&self.to_state_file())
                .map_err(|e| StateError::Persist(format!("{:#}", e))),
            None => Ok(()),
        }
    }
}

fn require(state: &ChunkState, expected: ChunkStatus, action: &'static str) -> Result<(), StateError> {
    if state.status != expected {
        return Err(StateError::InvalidTransition {
            chunk_id: state.chunk_id,
            from: state.status,
            action,
        });
    }
    Ok(())
}
