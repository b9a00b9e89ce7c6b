/*!
 * Integration tests for the full pipeline: merge, schedule, translate, persist.
 */

use std::sync::Arc;

use dualsub::database::{KeyValueStore, SqliteStore};
use dualsub::errors::TranslationError;
use dualsub::providers::MockClient;
use dualsub::subtitle_merger::{RawCue, SubtitleGroup};
use dualsub::translation::{BatchScheduler, RunOutcome, SchedulerConfig, TranslationCache};
use dualsub::{EventBus, Orchestrator, PipelineEvent};

use crate::common::failing_store::FailingStore;
use crate::common::mock_providers::{Reply, ScriptedClient};
use crate::common::{
    completed_texts, create_temp_dir, drain_events, fast_config, init_test_logging, orchestrator_with,
    spaced_cues,
};

const VIDEO: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

#[tokio::test]
async fn test_pipeline_withWorkingClient_shouldTranslateEverythingInOrder() {
    init_test_logging();
    let client = MockClient::working();
    let (mut orchestrator, store) = orchestrator_with(fast_config(), Arc::new(client.clone()));
    let mut rx = orchestrator.events().subscribe();

    orchestrator.load_video(VIDEO, &spaced_cues(12));
    let outcome = orchestrator.translate().await.unwrap();

    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(client.calls(), 3);

    let events = drain_events(&mut rx);
    assert!(matches!(events[0], PipelineEvent::SubtitlesUpdated(ref groups) if groups.len() == 12));
    assert_eq!(
        completed_texts(&events),
        (0..12).map(|i| format!("sentence number {}", i)).collect::<Vec<_>>()
    );
    match events.last() {
        Some(PipelineEvent::ProcessingStatusUpdated(status)) => {
            assert_eq!(status.processed, 12);
            assert!(!status.is_processing);
            assert_eq!(status.percentage(), 100.0);
        }
        other => panic!("unexpected last event: {:?}", other),
    }

    let subtitles = orchestrator.translated_subtitles();
    assert!(subtitles.iter().all(|s| s.translation.is_some()));
    assert_eq!(
        subtitles[3].translation,
        Some(MockClient::record_for("sentence number 3"))
    );
    assert!(store.get("subtitle_translations_dQw4w9WgXcQ").await.unwrap().is_some());
}

#[tokio::test]
async fn test_pipeline_withFlakyBackend_shouldRetryWithAnnotation() {
    let client = ScriptedClient::new(vec![
        Reply::Text("Sorry, I can only translate one line at a time.".to_string()),
        Reply::Status(503),
        Reply::Echo,
        Reply::Echo,
    ]);
    let (mut orchestrator, _store) = orchestrator_with(fast_config(), Arc::new(client.clone()));

    orchestrator.load_video(VIDEO, &spaced_cues(6));
    let outcome = orchestrator.translate().await.unwrap();

    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(client.calls(), 4);

    let prompts = client.prompts();
    assert!(!prompts[0].contains("retry attempt"));
    assert!(prompts[1].contains("retry attempt 1"));
    assert!(prompts[2].contains("retry attempt 2"));
    assert!(!prompts[3].contains("retry attempt"));
    assert_eq!(MockClient::prompt_entries(&prompts[3]).len(), 1);
}

#[tokio::test]
async fn test_pipeline_withExhaustedBatch_shouldAbortWithoutPersisting() {
    let mut config = fast_config();
    config.scheduler.max_batch_retries = 3;
    let client = ScriptedClient::new(vec![
        Reply::Echo,
        Reply::Status(500),
        Reply::Nothing,
        Reply::Status(502),
    ]);
    let (mut orchestrator, store) = orchestrator_with(config, Arc::new(client.clone()));
    let mut rx = orchestrator.events().subscribe();

    orchestrator.load_video(VIDEO, &spaced_cues(6));
    let error = orchestrator.translate().await.unwrap_err();

    match error.downcast_ref::<TranslationError>() {
        Some(TranslationError::RetriesExhausted { batch, attempts, last_error }) => {
            assert_eq!(*batch, 1);
            assert_eq!(*attempts, 3);
            assert!(last_error.contains("502"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(client.calls(), 4);
    assert!(store.is_empty());

    let events = drain_events(&mut rx);
    assert!(events.iter().any(|e| matches!(e, PipelineEvent::ProcessingFailed { .. })));

    // Earlier batches stay usable for the rest of the session
    let subtitles = orchestrator.translated_subtitles();
    assert_eq!(subtitles.iter().filter(|s| s.translation.is_some()).count(), 5);
    assert!(subtitles[5].translation.is_none());
}

#[tokio::test]
async fn test_pipeline_withRepeatedLines_shouldTranslateEachTextOnce() {
    let cues = vec![
        RawCue::new(0, 1000, "thank you"),
        RawCue::new(20_000, 1000, "see you next week"),
        RawCue::new(40_000, 1000, "thank you"),
    ];
    let client = MockClient::working();
    let (mut orchestrator, _store) = orchestrator_with(fast_config(), Arc::new(client.clone()));
    let mut rx = orchestrator.events().subscribe();

    orchestrator.load_video(VIDEO, &cues);
    orchestrator.translate().await.unwrap();

    assert_eq!(MockClient::prompt_entries(&client.prompts()[0]).len(), 2);
    assert_eq!(completed_texts(&drain_events(&mut rx)), vec!["thank you", "see you next week"]);

    let subtitles = orchestrator.translated_subtitles();
    assert_eq!(subtitles[0].translation, subtitles[2].translation);
}

#[tokio::test]
async fn test_pipeline_withSqliteStore_shouldResumeFromPersistedSession() {
    let dir = create_temp_dir().unwrap();
    let db_path = dir.path().join("sessions.db");
    let cues = spaced_cues(7);

    {
        let store = Arc::new(SqliteStore::open(&db_path).unwrap());
        let client = MockClient::working();
        let mut orchestrator = Orchestrator::with_parts(fast_config(), Arc::new(client.clone()), store);
        orchestrator.load_video(VIDEO, &cues);
        assert_eq!(orchestrator.translate().await.unwrap(), RunOutcome::Completed);
        assert_eq!(client.calls(), 2);
    }

    let store = Arc::new(SqliteStore::open(&db_path).unwrap());
    let client = MockClient::working();
    let mut orchestrator = Orchestrator::with_parts(fast_config(), Arc::new(client.clone()), store);
    let mut rx = orchestrator.events().subscribe();

    orchestrator.load_video("dQw4w9WgXcQ", &cues);
    let outcome = orchestrator.translate().await.unwrap();

    assert_eq!(outcome, RunOutcome::CacheHit);
    assert_eq!(client.calls(), 0);
    assert_eq!(completed_texts(&drain_events(&mut rx)).len(), 7);
    assert!(orchestrator.translated_subtitles().iter().all(|s| s.translation.is_some()));

    assert!(orchestrator.clear_cached_session().await.unwrap());
    orchestrator.load_video("dQw4w9WgXcQ", &cues);
    assert_eq!(orchestrator.translate().await.unwrap(), RunOutcome::Completed);
    assert_eq!(client.calls(), 2);
}

#[tokio::test]
async fn test_pipeline_withNoCaptions_shouldCompleteWithoutCalls() {
    let client = MockClient::working();
    let (mut orchestrator, store) = orchestrator_with(fast_config(), Arc::new(client.clone()));

    orchestrator.load_video(VIDEO, &[]);

    assert_eq!(orchestrator.translate().await.unwrap(), RunOutcome::Completed);
    assert_eq!(client.calls(), 0);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_scheduler_withFailingStore_shouldStillComplete() {
    let store = Arc::new(FailingStore::new());
    let client = MockClient::working();
    let cache = TranslationCache::with_store(store.clone(), "subs_");
    let scheduler = BatchScheduler::new(
        Arc::new(client.clone()),
        cache.clone(),
        EventBus::new(64),
        SchedulerConfig::from_settings(&fast_config().scheduler, "Chinese"),
    );
    let groups: Vec<SubtitleGroup> = (0..7)
        .map(|i| SubtitleGroup::new(i * 20_000, i * 20_000 + 2000, format!("line {}", i)))
        .collect();

    let outcome = scheduler.start(&groups, "dQw4w9WgXcQ").await.unwrap();

    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(client.calls(), 2);
    // One failed read at start, one failed write at the end
    assert_eq!(store.attempts(), 2);
    assert_eq!(cache.len(), 7);
}
