/*!
 * Integration tests for controlling a run from another task.
 */

use std::sync::Arc;
use std::time::{Duration, Instant};

use dualsub::providers::MockClient;
use dualsub::translation::{RunOutcome, SchedulerState};
use dualsub::{Orchestrator, PipelineEvent};

use crate::common::{drain_events, fast_config, orchestrator_with, spaced_cues, wait_until};

const VIDEO: &str = "dQw4w9WgXcQ";

fn spawn_translate(orchestrator: &Arc<Orchestrator>) -> tokio::task::JoinHandle<anyhow::Result<RunOutcome>> {
    let orchestrator = orchestrator.clone();
    tokio::spawn(async move { orchestrator.translate().await })
}

#[tokio::test]
async fn test_run_startingPaused_shouldWaitForResume() {
    let mut config = fast_config();
    config.scheduler.start_paused = true;
    let client = MockClient::working();
    let (mut orchestrator, store) = orchestrator_with(config, Arc::new(client.clone()));
    orchestrator.load_video(VIDEO, &spaced_cues(6));
    let handle = orchestrator.handle().unwrap();
    let mut rx = orchestrator.events().subscribe();
    let orchestrator = Arc::new(orchestrator);

    let run = spawn_translate(&orchestrator);
    wait_until(|| handle.state() == SchedulerState::Scheduled).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(client.calls(), 0);
    let status = handle.status();
    assert!(status.is_processing);
    assert!(status.is_paused);
    assert_eq!(status.total, 6);

    assert!(handle.resume());
    assert_eq!(run.await.unwrap().unwrap(), RunOutcome::Completed);
    assert_eq!(client.calls(), 2);
    assert!(!store.is_empty());

    let paused_flags: Vec<bool> = drain_events(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            PipelineEvent::ProcessingStatusUpdated(status) => Some(status.is_paused),
            _ => None,
        })
        .collect();
    assert_eq!(paused_flags.first(), Some(&true));
    assert_eq!(paused_flags.last(), Some(&false));
}

#[tokio::test]
async fn test_abort_betweenBatches_shouldKeepFinishedBatchInMemoryOnly() {
    let client = MockClient::slow(80);
    let (mut orchestrator, store) = orchestrator_with(fast_config(), Arc::new(client.clone()));
    orchestrator.load_video(VIDEO, &spaced_cues(12));
    let handle = orchestrator.handle().unwrap();
    let orchestrator = Arc::new(orchestrator);

    let run = spawn_translate(&orchestrator);
    wait_until(|| client.calls() == 1).await;
    assert!(handle.abort());

    assert_eq!(run.await.unwrap().unwrap(), RunOutcome::Aborted);
    assert_eq!(client.calls(), 1);
    assert_eq!(handle.state(), SchedulerState::Aborted);
    assert!(!handle.status().is_processing);
    assert_eq!(handle.status().processed, 5);
    assert!(store.is_empty());

    let session = orchestrator.session().unwrap();
    assert_eq!(session.translated_count(), 5);
}

#[tokio::test]
async fn test_abort_duringRetryBackoff_shouldWakeImmediately() {
    let mut config = fast_config();
    config.scheduler.retry_base_delay_ms = 60_000;
    let client = MockClient::failing();
    let (mut orchestrator, store) = orchestrator_with(config, Arc::new(client.clone()));
    orchestrator.load_video(VIDEO, &spaced_cues(3));
    let handle = orchestrator.handle().unwrap();
    let orchestrator = Arc::new(orchestrator);

    let run = spawn_translate(&orchestrator);
    wait_until(|| client.calls() == 1).await;
    let aborted_at = Instant::now();
    assert!(handle.abort());

    assert_eq!(run.await.unwrap().unwrap(), RunOutcome::Aborted);
    assert!(aborted_at.elapsed() < Duration::from_secs(5));
    assert_eq!(client.calls(), 1);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_pauseResume_acrossBatches_shouldFinishEverything() {
    let client = MockClient::slow(40);
    let (mut orchestrator, _store) = orchestrator_with(fast_config(), Arc::new(client.clone()));
    orchestrator.load_video(VIDEO, &spaced_cues(15));
    let handle = orchestrator.handle().unwrap();
    let orchestrator = Arc::new(orchestrator);

    let run = spawn_translate(&orchestrator);
    wait_until(|| client.calls() == 1).await;
    handle.pause();
    wait_until(|| handle.status().processed == 5).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(client.calls(), 1);

    handle.resume();
    wait_until(|| client.calls() == 2).await;
    handle.pause();
    wait_until(|| handle.status().processed == 10).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(client.calls(), 2);

    handle.resume();
    assert_eq!(run.await.unwrap().unwrap(), RunOutcome::Completed);
    assert_eq!(client.calls(), 3);
    assert_eq!(orchestrator.session().unwrap().translated_count(), 15);
}
