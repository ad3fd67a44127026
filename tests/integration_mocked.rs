/// Integration tests with a mocked n8n automation engine
/// Exercises the webhook client and the cached personalization workflow
/// without hitting a real workflow instance
use chrono::Utc;
use rust_crm_api::automation_client::AutomationClient;
use rust_crm_api::cache::{ManualClock, ResponseCache, DEFAULT_TTL};
use rust_crm_api::errors::AppError;
use rust_crm_api::models::{OAuthConnectRequest, PersonalizationRequest, SendEmailRequest};
use rust_crm_api::personalization::personalize;
use serde_json::{json, Map};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper function to create a client pointing at the mock server
fn create_test_client(base_url: String) -> AutomationClient {
    AutomationClient::new(base_url, Some("test_key".to_string()), Duration::from_secs(5))
        .expect("client builds")
}

fn personalization_request(step_index: Option<i32>) -> PersonalizationRequest {
    let mut context = Map::new();
    context.insert("companyName".to_string(), json!("Taco Chain"));

    PersonalizationRequest {
        subject_id: "lead-42".to_string(),
        template_id: "intro-v2".to_string(),
        strategy: "icebreaker".to_string(),
        variant: Some("b".to_string()),
        sequence_id: Some("seq-9".to_string()),
        step_index,
        context,
    }
}

#[tokio::test]
async fn test_personalization_is_served_from_cache_within_ttl() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/webhook/personalize-email"))
        .and(header("X-N8N-API-KEY", "test_key"))
        .and(body_partial_json(json!({
            "subjectId": "lead-42",
            "templateId": "intro-v2",
            "stepIndex": 0,
            "companyName": "Taco Chain"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "subject": "Quick question about Taco Chain",
            "body": "Hi there"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(mock_server.uri());
    let cache = ResponseCache::new(100);
    let request = personalization_request(Some(0));

    let first = personalize(&cache, &client, &request, DEFAULT_TTL)
        .await
        .unwrap();
    let second = personalize(&cache, &client, &request, DEFAULT_TTL)
        .await
        .unwrap();

    assert_eq!(first["cached"], false);
    assert_eq!(second["cached"], true);
    assert_eq!(second["subject"], "Quick question about Taco Chain");
}

#[tokio::test]
async fn test_personalization_recomputes_after_ttl() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/webhook/personalize-email"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"subject": "Hi"})))
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = create_test_client(mock_server.uri());
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let cache = ResponseCache::with_clock(100, clock.clone());
    let request = personalization_request(Some(0));

    let first = personalize(&cache, &client, &request, DEFAULT_TTL)
        .await
        .unwrap();
    clock.advance(DEFAULT_TTL + Duration::from_secs(1));
    let second = personalize(&cache, &client, &request, DEFAULT_TTL)
        .await
        .unwrap();

    assert_eq!(first["cached"], false);
    assert_eq!(second["cached"], false);
}

#[tokio::test]
async fn test_different_steps_are_cached_independently() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/webhook/personalize-email"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"subject": "Hi"})))
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = create_test_client(mock_server.uri());
    let cache = ResponseCache::new(100);

    personalize(&cache, &client, &personalization_request(Some(0)), DEFAULT_TTL)
        .await
        .unwrap();
    let step_one = personalize(&cache, &client, &personalization_request(Some(1)), DEFAULT_TTL)
        .await
        .unwrap();

    assert_eq!(step_one["cached"], false);
    assert_eq!(cache.entry_count().await, 2);
}

#[tokio::test]
async fn test_upstream_failure_is_propagated_and_not_cached() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/webhook/personalize-email"))
        .respond_with(ResponseTemplate::new(502).set_body_string("workflow crashed"))
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = create_test_client(mock_server.uri());
    let cache = ResponseCache::new(100);
    let request = personalization_request(None);

    for _ in 0..2 {
        let result = personalize(&cache, &client, &request, DEFAULT_TTL).await;
        match result {
            Err(AppError::ExternalApiError(msg)) => assert!(msg.contains("502")),
            other => panic!("Expected ExternalApiError, got {:?}", other),
        }
    }

    assert_eq!(cache.entry_count().await, 0);
}

#[tokio::test]
async fn test_missing_key_parts_are_rejected_before_calling_upstream() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = create_test_client(mock_server.uri());
    let cache = ResponseCache::new(100);
    let mut request = personalization_request(None);
    request.template_id = "  ".to_string();

    let result = personalize(&cache, &client, &request, DEFAULT_TTL).await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));
}

#[tokio::test]
async fn test_slow_upstream_times_out() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/webhook/check-dns"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"spf": true}))
                .set_delay(Duration::from_millis(800)),
        )
        .mount(&mock_server)
        .await;

    let client = AutomationClient::new(mock_server.uri(), None, Duration::from_millis(100))
        .expect("client builds");

    let result = client.check_dns("tacochain.com").await;
    match result {
        Err(AppError::ExternalApiError(msg)) => assert!(msg.contains("timed out")),
        other => panic!("Expected timeout, got {:?}", other),
    }
}

#[tokio::test]
async fn test_check_dns_sends_normalized_domain() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/webhook/check-dns"))
        .and(body_partial_json(json!({"domain": "mail.tacochain.com"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "spf": true,
            "dkim": false,
            "dmarc": true
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(mock_server.uri());
    let result = client.check_dns("https://Mail.TacoChain.com/").await.unwrap();

    assert_eq!(result["dkim"], false);
}

#[tokio::test]
async fn test_send_email_rejects_invalid_recipient() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = create_test_client(mock_server.uri());
    let request = SendEmailRequest {
        to: "not-an-email".to_string(),
        subject: "Hello".to_string(),
        body: "Body".to_string(),
        from: None,
        sequence_id: None,
        step_index: None,
        extra: Map::new(),
    };

    let result = client.send_email(&request).await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));
}

#[tokio::test]
async fn test_send_email_accepts_empty_workflow_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/webhook/send-email"))
        .and(body_partial_json(json!({"to": "owner@tacochain.com", "stepIndex": 2})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(mock_server.uri());
    let request = SendEmailRequest {
        to: "owner@tacochain.com".to_string(),
        subject: "Hello".to_string(),
        body: "Body".to_string(),
        from: None,
        sequence_id: Some("seq-9".to_string()),
        step_index: Some(2),
        extra: Map::new(),
    };

    let result = client.send_email(&request).await.unwrap();
    assert_eq!(result, json!({"success": true}));
}

#[tokio::test]
async fn test_start_oauth_returns_authorization_url() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/webhook/oauth-connect"))
        .and(body_partial_json(json!({"provider": "google"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "authUrl": "https://accounts.google.com/o/oauth2/auth?state=abc"
        })))
        .mount(&mock_server)
        .await;

    let client = create_test_client(mock_server.uri());
    let request = OAuthConnectRequest {
        provider: "google".to_string(),
        redirect_uri: None,
        extra: Map::new(),
    };

    let result = client.start_oauth(&request).await.unwrap();
    assert!(result["authUrl"].as_str().unwrap().starts_with("https://"));
}
