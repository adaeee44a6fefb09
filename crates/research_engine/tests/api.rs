use std::sync::Mutex;

use pretty_assertions::assert_eq;
use research_core::{Event, EventKind};
use research_engine::{
    pump, ApiError, ApiSettings, EventSink, ReqwestApi, ResearchApi, StreamEnd, StreamSettings,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn api_for(server: &MockServer) -> ReqwestApi {
    ReqwestApi::new(&ApiSettings {
        base_url: format!("{}/api", server.uri()),
        ..ApiSettings::default()
    })
    .unwrap()
}

#[derive(Default)]
struct CollectingSink(Mutex<Vec<Event>>);

impl EventSink for CollectingSink {
    fn emit(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }
}

#[tokio::test]
async fn create_job_posts_query_and_returns_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/jobs"))
        .and(body_json(json!({ "query": "Analyze MSFT" })))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({ "id": "job-42", "created_at": "2024-06-01T10:00:00Z" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let ticket = api_for(&server).create_job("Analyze MSFT").await.unwrap();
    assert_eq!(ticket.job_id, "job-42");
    assert_eq!(ticket.created_at.as_deref(), Some("2024-06-01T10:00:00Z"));
}

#[tokio::test]
async fn live_stream_is_read_as_ndjson() {
    let server = MockServer::start().await;
    let body = concat!(
        "{\"type\":\"status\",\"payload\":\"running\"}\n",
        "{\"type\":\"thought\",\"payload\":\"Looking\"}\n",
    );
    Mock::given(method("GET"))
        .and(path("/api/jobs/job-1/stream"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let stream = api_for(&server).open_stream("job-1").await.unwrap();
    let sink = CollectingSink::default();
    let end = pump(stream, &CancellationToken::new(), &StreamSettings::default(), &sink)
        .await
        .unwrap();

    assert_eq!(end, StreamEnd::Closed);
    let kinds: Vec<EventKind> = sink.0.lock().unwrap().iter().map(|e| e.kind.clone()).collect();
    assert_eq!(kinds, vec![EventKind::Status, EventKind::Thought]);
}

#[tokio::test]
async fn stored_events_accept_array_and_ndjson_bodies() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/jobs/a/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "type": "thought", "payload": "x" },
            { "type": "log", "payload": "y" }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/jobs/b/events"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("{\"type\":\"log\"}\n{\"type\":\"status\"}"),
        )
        .mount(&server)
        .await;

    let api = api_for(&server);
    assert_eq!(api.job_events("a").await.unwrap().len(), 2);
    assert_eq!(api.job_events("b").await.unwrap().len(), 2);
}

#[tokio::test]
async fn job_record_and_listing_decode() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/jobs/job-7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "job-7", "query": "Is KO a buy?", "status": "completed", "createdAt": "2024-05-01"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/jobs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jobs": [{ "id": "job-7", "query": "Is KO a buy?", "status": "completed" }]
        })))
        .mount(&server)
        .await;

    let api = api_for(&server);
    let record = api.job("job-7").await.unwrap();
    assert_eq!(record.status, "completed");
    assert_eq!(record.created_at.as_deref(), Some("2024-05-01"));

    let jobs = api.list_jobs().await.unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].id, "job-7");
}

#[tokio::test]
async fn numeric_ids_and_null_fields_decode() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/jobs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 42, "query": "Is KO a buy?", "status": null },
            { "id": "job-8", "query": null, "status": "running" }
        ])))
        .mount(&server)
        .await;

    let jobs = api_for(&server).list_jobs().await.unwrap();
    assert_eq!(jobs[0].id, "42");
    assert_eq!(jobs[0].status, "");
    assert!(!jobs[0].is_active());
    assert_eq!(jobs[1].query, "");
    assert!(jobs[1].is_active());
}

#[tokio::test]
async fn remark_is_posted_to_job() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/jobs/job-1/remarks"))
        .and(body_json(json!({ "text": "check debt" })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    api_for(&server).send_remark("job-1", "check debt").await.unwrap();
}

#[tokio::test]
async fn missing_job_maps_to_http_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/jobs/nope/stream"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let api = api_for(&server);
    assert!(matches!(
        api.open_stream("nope").await,
        Err(ApiError::HttpStatus { status: 404 })
    ));
    assert_eq!(
        api.job("nope").await.unwrap_err(),
        ApiError::HttpStatus { status: 404 }
    );
}

#[test]
fn relative_base_url_is_rejected() {
    let result = ReqwestApi::new(&ApiSettings {
        base_url: "not a url".to_string(),
        ..ApiSettings::default()
    });
    assert!(matches!(result, Err(ApiError::InvalidUrl(_))));
}
