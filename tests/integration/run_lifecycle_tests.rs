/*!
 * End-to-end runs of the orchestrator with scripted translators
 */

use anyhow::Result;
use std::fs;

use chunkwise::context::ContextSection;
use chunkwise::errors::{RunError, TranslatorError};
use chunkwise::pipeline::RunPhase;
use chunkwise::providers::{ScriptedAction, ScriptedTranslator};
use chunkwise::session::{ChunkStatus, RunStore};
use chunkwise::subtitle_processor::SubtitleCollection;
use chunkwise::validation::FailureReason;

use crate::common;

/// A clean run over 320 blocks dispatches each chunk once and keeps every timing
#[tokio::test]
async fn test_run_withFaithfulTranslator_shouldTranslateEveryBlock() -> Result<()> {
    common::init_logging();
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "episode.srt", 320)?;
    let output = temp_dir.path().join("episode.fr.srt");
    let translator = ScriptedTranslator::new();

    let mut orchestrator = common::scripted_orchestrator(common::test_run_settings(150, 5), temp_dir.path(), &translator);
    let report = orchestrator.run(&input, &output).await?;

    assert_eq!(orchestrator.phase(), RunPhase::Done);
    assert_eq!(report.chunk_count, 3);
    assert_eq!(report.block_count, 320);
    assert_eq!(report.dispatched, vec![1, 2, 3]);
    assert!(!report.resumed);
    assert_eq!(report.summary.validated, 3);
    assert_eq!(report.summary.attempts, 3);

    let source = SubtitleCollection::from_file(&input)?.blocks;
    let translated = SubtitleCollection::from_file(&output)?.blocks;
    assert_eq!(translated.len(), 320);
    for (out, src) in translated.iter().zip(&source) {
        assert_eq!(out.index, src.index);
        assert_eq!(out.time_range.raw(), src.time_range.raw());
        assert_eq!(out.lines, vec![format!("[fr] {}", src.lines[0])]);
    }

    let store = orchestrator.store();
    assert!(store.chunk_path(1).exists());
    assert!(store.candidate_path(3).exists());
    assert!(store.manifest_path().exists());
    Ok(())
}

/// Two timing violations then a pass leave the chunk VALIDATED after 3 attempts
#[tokio::test]
async fn test_run_withTwoTimestampViolations_shouldRetryUntilPass() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "episode.srt", 320)?;
    let output = temp_dir.path().join("out.srt");
    let translator = ScriptedTranslator::new()
        .on(2, ScriptedAction::ShiftTimestamp)
        .on(2, ScriptedAction::ShiftTimestamp);

    let mut orchestrator = common::scripted_orchestrator(common::test_run_settings(150, 5), temp_dir.path(), &translator);
    let report = orchestrator.run(&input, &output).await?;

    assert_eq!(report.dispatched, vec![1, 2, 2, 2, 3]);
    let attempts: Vec<u32> = translator.calls_for(2).iter().map(|c| c.attempt).collect();
    assert_eq!(attempts, vec![1, 2, 3]);

    let state = orchestrator.store().load_state()?.expect("state file");
    assert_eq!(state.chunks[1].status, ChunkStatus::Validated);
    assert_eq!(state.chunks[1].attempts, 3);

    let issues = fs::read_to_string(orchestrator.store().issues_log_path())?;
    assert_eq!(issues.matches("TIMESTAMP_CHANGED").count(), 2);
    assert!(orchestrator.store().rejected_path(2).exists());
    assert!(output.exists());
    Ok(())
}

/// Three structural failures exhaust the chunk and stop the run without output
#[tokio::test]
async fn test_run_withThreeFailures_shouldAbortWithRetryExhausted() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "episode.srt", 320)?;
    let output = temp_dir.path().join("out.srt");
    let translator = ScriptedTranslator::new()
        .on(2, ScriptedAction::DropBlock)
        .on(2, ScriptedAction::DropBlock)
        .on(2, ScriptedAction::DropBlock);

    let mut orchestrator = common::scripted_orchestrator(common::test_run_settings(150, 5), temp_dir.path(), &translator);
    let error = orchestrator.run(&input, &output).await.unwrap_err();

    match error {
        RunError::RetryExhausted { chunk_id, attempts, reason } => {
            assert_eq!(chunk_id, 2);
            assert_eq!(attempts, 3);
            assert_eq!(reason, FailureReason::BlockCountMismatch { expected: 160, found: 159 });
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(orchestrator.phase(), RunPhase::Aborted);
    assert!(!output.exists());
    assert_eq!(translator.calls_for(3).len(), 0);

    let state = orchestrator.store().load_state()?.expect("state file");
    assert_eq!(state.chunks[0].status, ChunkStatus::Validated);
    assert_eq!(state.chunks[1].status, ChunkStatus::Failed);
    assert_eq!(state.chunks[2].status, ChunkStatus::Pending);
    assert!(state.chunks[1].last_error.as_deref().unwrap_or_default().starts_with("BLOCK_COUNT_MISMATCH"));
    Ok(())
}

/// A FAILED chunk blocks later invocations until the run is restarted
#[tokio::test]
async fn test_run_afterFailedChunk_shouldRefuseUntilFresh() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "episode.srt", 40)?;
    let output = temp_dir.path().join("out.srt");
    let failing = ScriptedTranslator::new()
        .on(1, ScriptedAction::SwapBlocks)
        .on(1, ScriptedAction::SwapBlocks);
    let settings = common::test_run_settings(20, 2).with_max_attempts(2);

    let mut first = common::scripted_orchestrator(settings.clone(), temp_dir.path(), &failing);
    assert!(matches!(first.run(&input, &output).await, Err(RunError::RetryExhausted { .. })));

    let untouched = ScriptedTranslator::new();
    let mut second = common::scripted_orchestrator(settings.clone(), temp_dir.path(), &untouched);
    match second.run(&input, &output).await {
        Err(RunError::PreviouslyFailed { chunk_id, last_error }) => {
            assert_eq!(chunk_id, 1);
            assert!(last_error.starts_with("INDEX_MISMATCH"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(untouched.request_count(), 0);

    let mut third = common::scripted_orchestrator(settings.with_fresh(true), temp_dir.path(), &untouched);
    let report = third.run(&input, &output).await?;
    assert_eq!(report.dispatched, vec![1, 2]);
    assert!(output.exists());
    Ok(())
}

/// Recoverable translator errors consume attempts like validation failures
#[tokio::test]
async fn test_run_withRecoverableTranslatorError_shouldRetry() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "episode.srt", 10)?;
    let output = temp_dir.path().join("out.srt");
    let translator = ScriptedTranslator::new().on(1, ScriptedAction::Fail("model overloaded".to_string()));

    let mut orchestrator = common::scripted_orchestrator(common::test_run_settings(10, 2), temp_dir.path(), &translator);
    let report = orchestrator.run(&input, &output).await?;

    assert_eq!(report.dispatched, vec![1, 1]);
    let issues = fs::read_to_string(orchestrator.store().issues_log_path())?;
    assert!(issues.contains("TRANSLATOR_ERROR"));
    assert!(issues.contains("model overloaded"));
    Ok(())
}

/// An unrecoverable error aborts at once and returns the chunk to PENDING
#[tokio::test]
async fn test_run_withUnrecoverableTranslatorError_shouldAbortWithoutConsumingAttempt() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "episode.srt", 320)?;
    let output = temp_dir.path().join("out.srt");
    let translator = ScriptedTranslator::new().on(2, ScriptedAction::Abort("invalid credentials".to_string()));

    let mut orchestrator = common::scripted_orchestrator(common::test_run_settings(150, 5), temp_dir.path(), &translator);
    match orchestrator.run(&input, &output).await {
        Err(RunError::TranslatorAborted { chunk_id, source }) => {
            assert_eq!(chunk_id, 2);
            assert_eq!(source, TranslatorError::Unrecoverable("invalid credentials".to_string()));
        }
        other => panic!("unexpected result: {:?}", other),
    }

    let state = orchestrator.store().load_state()?.expect("state file");
    assert_eq!(state.chunks[1].status, ChunkStatus::Pending);
    assert_eq!(state.chunks[1].attempts, 0);
    assert!(!output.exists());
    Ok(())
}

/// Amendments of rejected attempts never reach the context; committed ones are
/// visible to every later chunk
#[tokio::test]
async fn test_run_withAmendments_shouldCommitOnlyValidatedOnes() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "episode.srt", 30)?;
    let output = temp_dir.path().join("out.srt");
    let translator = ScriptedTranslator::new()
        .on_with_amendment(1, ScriptedAction::DropBlock, common::term_amendment("Rejected term: nope"))
        .on_with_amendment(1, ScriptedAction::Translate, common::term_amendment("Kessel: keep untranslated"))
        .on_with_amendment(2, ScriptedAction::Translate, common::term_amendment("Falcon: le Faucon"));

    let mut orchestrator = common::scripted_orchestrator(common::test_run_settings(10, 2), temp_dir.path(), &translator);
    let report = orchestrator.run(&input, &output).await?;
    assert_eq!(report.context_revision, 2);

    let first = translator.calls_for(1);
    assert_eq!(first.len(), 2);
    assert!(first.iter().all(|call| call.context_revision == 0));

    let second = &translator.calls_for(2)[0];
    assert_eq!(second.context_revision, 1);
    assert!(second.context.contains("Kessel: keep untranslated"));
    assert!(!second.context.contains("Rejected term"));

    let third = &translator.calls_for(3)[0];
    assert_eq!(third.context_revision, 2);
    assert!(third.context.contains("Falcon: le Faucon"));

    let store = orchestrator.store();
    let context = store.load_context()?.expect("context file");
    assert_eq!(context.revision(), 2);
    assert_eq!(context.section(ContextSection::Terms).len(), 2);
    assert!(store.amendment_path(1).exists());
    assert!(!store.amendment_path(3).exists());

    let state = store.load_state()?.expect("state file");
    let revisions: Vec<Option<u64>> = state.chunks.iter().map(|c| c.context_revision).collect();
    assert_eq!(revisions, vec![Some(1), Some(2), Some(2)]);
    Ok(())
}

/// Malformed input stops the run before any dispatch
#[tokio::test]
async fn test_run_withMalformedInput_shouldFailBeforeDispatch() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(
        temp_dir.path(),
        "broken.srt",
        "1\n00:00:01,000 --> 00:00:02,000\nA\n\n2\nnot a timing\nB\n",
    )?;
    let output = temp_dir.path().join("out.srt");
    let translator = ScriptedTranslator::new();

    let mut orchestrator = common::scripted_orchestrator(common::test_run_settings(10, 2), temp_dir.path(), &translator);
    let error = orchestrator.run(&input, &output).await.unwrap_err();

    assert!(matches!(error, RunError::Subtitle(_)));
    assert_eq!(translator.request_count(), 0);
    assert!(!RunStore::new(temp_dir.path().join("run")).has_manifest());
    Ok(())
}

/// An invalid window is rejected before anything is written
#[tokio::test]
async fn test_run_withInvalidWindow_shouldReturnChunkError() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "episode.srt", 10)?;
    let translator = ScriptedTranslator::new();

    let mut orchestrator = common::scripted_orchestrator(common::test_run_settings(4, 4), temp_dir.path(), &translator);
    let error = orchestrator.run(&input, &temp_dir.path().join("out.srt")).await.unwrap_err();

    assert!(matches!(error, RunError::Chunk(_)));
    assert_eq!(translator.request_count(), 0);
    Ok(())
}
