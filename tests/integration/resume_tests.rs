/*!
 * Interrupted runs and resume behaviour
 */

use anyhow::Result;
use std::fs;
use std::path::Path;

use chunkwise::context::ContextDocument;
use chunkwise::errors::RunError;
use chunkwise::providers::{ScriptedAction, ScriptedTranslator};
use chunkwise::session::{ChunkStatus, RunStore};

use crate::common;

fn store(work_dir: &Path) -> RunStore {
    RunStore::new(work_dir.join("run"))
}

/// Abort on chunk 2, then resume: only chunks 2 and 3 are dispatched and the
/// output matches an uninterrupted run
#[tokio::test]
async fn test_resume_afterAbort_shouldSkipValidatedChunks() -> Result<()> {
    common::init_logging();
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "episode.srt", 320)?;
    let output = temp_dir.path().join("out.srt");
    let settings = common::test_run_settings(150, 5);

    let aborting = ScriptedTranslator::new().on(2, ScriptedAction::Abort("connection refused".to_string()));
    let mut first = common::scripted_orchestrator(settings.clone(), temp_dir.path(), &aborting);
    assert!(matches!(first.run(&input, &output).await, Err(RunError::TranslatorAborted { chunk_id: 2, .. })));

    let resuming = ScriptedTranslator::new();
    let mut second = common::scripted_orchestrator(settings.clone(), temp_dir.path(), &resuming);
    let report = second.run(&input, &output).await?;

    assert!(report.resumed);
    assert_eq!(report.dispatched, vec![2, 3]);
    assert_eq!(resuming.calls_for(1).len(), 0);

    let reference_dir = common::create_temp_dir()?;
    let reference_output = reference_dir.path().join("out.srt");
    let mut reference = common::scripted_orchestrator(settings, reference_dir.path(), &ScriptedTranslator::new());
    reference.run(&input, &reference_output).await?;

    assert_eq!(fs::read_to_string(&output)?, fs::read_to_string(&reference_output)?);
    Ok(())
}

/// A completed run goes straight to joining on the next invocation
#[tokio::test]
async fn test_resume_withCompletedRun_shouldOnlyJoin() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "episode.srt", 50)?;
    let output = temp_dir.path().join("out.srt");
    let settings = common::test_run_settings(20, 3);

    let mut first = common::scripted_orchestrator(settings.clone(), temp_dir.path(), &ScriptedTranslator::new());
    first.run(&input, &output).await?;
    let expected = fs::read_to_string(&output)?;
    fs::remove_file(&output)?;

    let idle = ScriptedTranslator::new();
    let mut second = common::scripted_orchestrator(settings, temp_dir.path(), &idle);
    let report = second.run(&input, &output).await?;

    assert!(report.resumed);
    assert!(report.dispatched.is_empty());
    assert_eq!(idle.request_count(), 0);
    assert_eq!(fs::read_to_string(&output)?, expected);
    Ok(())
}

/// A changed source invalidates persisted progress
#[tokio::test]
async fn test_resume_withChangedSource_shouldStartOver() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "episode.srt", 50)?;
    let output = temp_dir.path().join("out.srt");
    let settings = common::test_run_settings(20, 3);

    let mut first = common::scripted_orchestrator(settings.clone(), temp_dir.path(), &ScriptedTranslator::new());
    let first_report = first.run(&input, &output).await?;

    fs::write(&input, common::generate_srt(50).replace("Line number 7\n", "Line number seven\n"))?;

    let translator = ScriptedTranslator::new();
    let mut second = common::scripted_orchestrator(settings, temp_dir.path(), &translator);
    let report = second.run(&input, &output).await?;

    assert!(!report.resumed);
    assert_ne!(report.run_id, first_report.run_id);
    assert_eq!(report.dispatched, vec![1, 2, 3]);
    assert!(fs::read_to_string(&output)?.contains("[fr] Line number seven"));
    Ok(())
}

/// A different window cannot reuse the persisted chunks
#[tokio::test]
async fn test_resume_withChangedWindow_shouldStartOver() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "episode.srt", 50)?;
    let output = temp_dir.path().join("out.srt");

    let mut first = common::scripted_orchestrator(common::test_run_settings(20, 3), temp_dir.path(), &ScriptedTranslator::new());
    first.run(&input, &output).await?;

    let mut second = common::scripted_orchestrator(common::test_run_settings(25, 3), temp_dir.path(), &ScriptedTranslator::new());
    let report = second.run(&input, &output).await?;

    assert!(!report.resumed);
    assert_eq!(report.chunk_count, 2);
    assert_eq!(report.dispatched, vec![1, 2]);
    Ok(())
}

/// `fresh` discards a matching run
#[tokio::test]
async fn test_resume_withFreshFlag_shouldRedispatchEverything() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "episode.srt", 50)?;
    let output = temp_dir.path().join("out.srt");
    let settings = common::test_run_settings(20, 3);

    let mut first = common::scripted_orchestrator(settings.clone(), temp_dir.path(), &ScriptedTranslator::new());
    first.run(&input, &output).await?;

    let mut second = common::scripted_orchestrator(settings.with_fresh(true), temp_dir.path(), &ScriptedTranslator::new());
    let report = second.run(&input, &output).await?;

    assert!(!report.resumed);
    assert_eq!(report.dispatched, vec![1, 2, 3]);
    Ok(())
}

/// A chunk left IN_PROGRESS by a crash is dispatched again with its attempt count intact
#[tokio::test]
async fn test_resume_withInProgressChunk_shouldRedispatchIt() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "episode.srt", 50)?;
    let output = temp_dir.path().join("out.srt");
    let settings = common::test_run_settings(20, 3);

    let failing_once = ScriptedTranslator::new()
        .on(2, ScriptedAction::DropBlock)
        .on(2, ScriptedAction::Abort("killed".to_string()));
    let mut first = common::scripted_orchestrator(settings.clone(), temp_dir.path(), &failing_once);
    assert!(first.run(&input, &output).await.is_err());

    // Simulate a crash between dispatch and verdict
    let run_store = store(temp_dir.path());
    let mut state = run_store.load_state()?.expect("state file");
    assert_eq!(state.chunks[1].attempts, 1);
    state.chunks[1].status = ChunkStatus::InProgress;
    run_store.write_state(&state)?;

    let translator = ScriptedTranslator::new();
    let mut second = common::scripted_orchestrator(settings, temp_dir.path(), &translator);
    let report = second.run(&input, &output).await?;

    assert_eq!(report.dispatched, vec![2, 3]);
    assert_eq!(translator.calls_for(2)[0].attempt, 2);
    let state = run_store.load_state()?.expect("state file");
    assert_eq!(state.chunks[1].status, ChunkStatus::Validated);
    assert_eq!(state.chunks[1].attempts, 2);
    Ok(())
}

/// A context file that missed the last committed amendment gets it re-applied
#[tokio::test]
async fn test_resume_withStaleContext_shouldReapplyLastAmendment() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "episode.srt", 50)?;
    let output = temp_dir.path().join("out.srt");
    let settings = common::test_run_settings(20, 3);

    let translator = ScriptedTranslator::new()
        .on_with_amendment(1, ScriptedAction::Translate, common::term_amendment("Arrakis: keep untranslated"))
        .on(2, ScriptedAction::Abort("stopped".to_string()));
    let mut first = common::scripted_orchestrator(settings.clone(), temp_dir.path(), &translator);
    assert!(first.run(&input, &output).await.is_err());

    // Crash after the VALIDATED record was written but before the context was
    let run_store = store(temp_dir.path());
    run_store.write_context(&ContextDocument::new())?;

    let resumed = ScriptedTranslator::new();
    let mut second = common::scripted_orchestrator(settings, temp_dir.path(), &resumed);
    let report = second.run(&input, &output).await?;

    let call = &resumed.calls_for(2)[0];
    assert_eq!(call.context_revision, 1);
    assert!(call.context.contains("Arrakis: keep untranslated"));
    assert_eq!(report.context_revision, 1);
    Ok(())
}

/// Unreadable state is treated as a mismatch and the run starts over
#[tokio::test]
async fn test_resume_withCorruptState_shouldStartOver() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "episode.srt", 50)?;
    let output = temp_dir.path().join("out.srt");
    let settings = common::test_run_settings(20, 3);

    let mut first = common::scripted_orchestrator(settings.clone(), temp_dir.path(), &ScriptedTranslator::new());
    first.run(&input, &output).await?;
    fs::write(store(temp_dir.path()).state_path(), "{ not json")?;

    let mut second = common::scripted_orchestrator(settings, temp_dir.path(), &ScriptedTranslator::new());
    let report = second.run(&input, &output).await?;

    assert!(!report.resumed);
    assert_eq!(report.dispatched, vec![1, 2, 3]);
    Ok(())
}

/// State records whose chunk ids do not follow their position are not trusted
#[tokio::test]
async fn test_resume_withMisnumberedStateRecords_shouldStartOver() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "episode.srt", 50)?;
    let output = temp_dir.path().join("out.srt");
    let settings = common::test_run_settings(20, 3);
    let run_store = store(temp_dir.path());

    for renumber in [[0, 2, 3], [2, 1, 3]] {
        let aborting = ScriptedTranslator::new().on(2, ScriptedAction::Abort("stopped".to_string()));
        let mut first = common::scripted_orchestrator(settings.clone().with_fresh(true), temp_dir.path(), &aborting);
        assert!(first.run(&input, &output).await.is_err());

        let mut state = run_store.load_state()?.expect("state file");
        for (record, chunk_id) in state.chunks.iter_mut().zip(renumber) {
            record.chunk_id = chunk_id;
        }
        run_store.write_state(&state)?;

        let translator = ScriptedTranslator::new();
        let mut second = common::scripted_orchestrator(settings.clone(), temp_dir.path(), &translator);
        let report = second.run(&input, &output).await?;

        assert!(!report.resumed);
        assert_eq!(report.dispatched, vec![1, 2, 3]);
    }
    Ok(())
}

/// A tampered chunk file cannot be resumed either
#[tokio::test]
async fn test_resume_withTamperedChunkFile_shouldStartOver() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "episode.srt", 50)?;
    let output = temp_dir.path().join("out.srt");
    let settings = common::test_run_settings(20, 3);

    let mut first = common::scripted_orchestrator(settings.clone(), temp_dir.path(), &ScriptedTranslator::new());
    first.run(&input, &output).await?;
    fs::write(store(temp_dir.path()).chunk_path(2), "garbage")?;

    let mut second = common::scripted_orchestrator(settings, temp_dir.path(), &ScriptedTranslator::new());
    let report = second.run(&input, &output).await?;

    assert!(!report.resumed);
    assert_eq!(report.dispatched.len(), 3);
    Ok(())
}
