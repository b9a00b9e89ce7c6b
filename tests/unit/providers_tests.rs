/*!
 * Tests for provider construction and error classification
 */

use std::sync::Arc;

use dualsub::app_config::{TranslationConfig, TranslationProvider};
use dualsub::errors::ProviderError;
use dualsub::providers::{create_client, MockClient, TranslationClient};
use dualsub::subtitle_merger::SubtitleGroup;
use dualsub::translation::{parse_batch_response, BatchPromptBuilder};

use crate::common::mock_providers::{Reply, ScriptedClient};

#[test]
fn test_createClient_withAnthropicKey_shouldBuildAnthropic() {
    let mut config = TranslationConfig::default();
    config.provider = TranslationProvider::Anthropic;
    config.active_provider_mut().api_key = "sk-ant-test".to_string();

    let client = create_client(&config).unwrap();

    assert_eq!(client.name(), "anthropic");
}

#[test]
fn test_providerError_fromStatus_shouldClassifyRetryability() {
    assert!(!ProviderError::from_status(401, "bad key".into()).is_retryable());
    assert!(ProviderError::from_status(429, "slow down".into()).is_retryable());
    assert!(ProviderError::from_status(503, "busy".into()).is_retryable());
    assert!(!ProviderError::from_status(400, "bad request".into()).is_retryable());
}

#[tokio::test]
async fn test_mockClient_asTraitObject_shouldAnswerPrompt() {
    let groups = vec![
        SubtitleGroup::new(0, 1000, "hello there"),
        SubtitleGroup::new(1500, 2500, "general kenobi"),
    ];
    let prompt = BatchPromptBuilder::new("Chinese").with_groups(&groups).build();
    let client: Arc<dyn TranslationClient> = Arc::new(MockClient::working());

    let response = client.translate(&prompt).await.unwrap().unwrap();
    let records = parse_batch_response(&response, groups.len()).unwrap();

    assert_eq!(records[0], MockClient::record_for("hello there"));
    assert_eq!(records[1], MockClient::record_for("general kenobi"));
}

#[tokio::test]
async fn test_scriptedClient_shouldPlayRepliesInOrder() {
    let client = ScriptedClient::new(vec![Reply::Status(500), Reply::Nothing, Reply::Text("[]".into())]);

    assert!(client.translate("a").await.is_err());
    assert_eq!(client.translate("b").await.unwrap(), None);
    assert_eq!(client.translate("c").await.unwrap(), Some("[]".to_string()));
    assert!(client.translate("d").await.is_err());
    assert_eq!(client.calls(), 4);
}
