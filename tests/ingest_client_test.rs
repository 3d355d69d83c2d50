use chrono::{TimeZone, Utc};
use conferix_scraper::app::ports::IngestPort;
use conferix_scraper::error::ScraperError;
use conferix_scraper::infra::HttpIngestClient;
use conferix_scraper::types::{City, Event};
use serde_json::json;
use std::time::Duration;
use wiremock::{
    matchers::{body_partial_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

fn event(id: &str) -> Event {
    Event {
        title: "Dubai Fintech Summit".into(),
        description: String::new(),
        start_date: Some(Utc.with_ymd_and_hms(2026, 2, 18, 0, 0, 0).unwrap()),
        end_date: None,
        venue_name: Some("Madinat Jumeirah".into()),
        venue_address: None,
        city: City::Dubai,
        organizer: None,
        industry: "Finance".into(),
        is_free: false,
        registration_url: None,
        image_url: None,
        source: "DIFC".into(),
        source_event_id: id.into(),
    }
}

fn client(server: &MockServer) -> HttpIngestClient {
    HttpIngestClient::new(format!("{}/receive-events", server.uri()), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn posts_json_array_and_reads_wrapped_counts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/receive-events"))
        .and(header("content-type", "application/json"))
        .and(body_partial_json(json!([{"source_event_id": "difc-a", "city": "Dubai", "start_date": "2026-02-18T00:00:00.000Z"}])))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "results": {"created": 1, "updated": 1, "skipped": 0, "errors": []},
            "message": "Processed 2 events"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = client(&server).submit(&[event("difc-a"), event("difc-b")]).await.unwrap();
    assert_eq!(outcome.created, 1);
    assert_eq!(outcome.updated, 1);
    assert!(outcome.errors.is_empty());
}

#[tokio::test]
async fn non_success_status_fails_the_batch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let err = client(&server).submit(&[event("difc-a")]).await.unwrap_err();
    match &err {
        ScraperError::Ingest { status, body } => {
            assert_eq!(*status, 503);
            assert_eq!(body, "upstream down");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.is_retryable());
}

#[tokio::test]
async fn record_level_errors_are_returned() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "created": 0, "updated": 0, "skipped": 1,
            "errors": [{"event": "Dubai Fintech Summit", "error": "invalid city"}]
        })))
        .mount(&server)
        .await;

    let outcome = client(&server).submit(&[event("difc-a")]).await.unwrap();
    assert_eq!(outcome.skipped, 1);
    assert_eq!(outcome.errors.len(), 1);
}
