//! HTTP client tests against a mock knowledge-base service

#![allow(clippy::unwrap_used, clippy::expect_used)]

use kbm_common::ErrorKind;
use kbm_ingest::config::{EndpointConfig, Target};
use kbm_ingest::remote::{
    upsert, KnowledgeBase, NucliaClient, ResourceKey, ResourcePayload, SearchQuery,
    UpsertOutcome,
};
use std::time::Duration;
use wiremock::{
    matchers::{body_partial_json, header, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

const KB_PATH: &str = "/api/v1/kb/kb-vi";

fn client(server: &MockServer) -> NucliaClient {
    let endpoint = EndpointConfig::new(format!("{}/api/v1", server.uri()), Duration::from_secs(5));
    NucliaClient::new(&endpoint).unwrap()
}

fn target() -> Target {
    Target::new("vietnamese", "kb-vi", "secret-key")
}

fn payload(slug: &str) -> ResourcePayload {
    ResourcePayload {
        slug: Some(slug.to_string()),
        title: Some("Title".to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_create_sends_credentials_and_returns_resource_id() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("{}/resources", KB_PATH)))
        .and(header("X-NUCLIA-SERVICEACCOUNT", "Bearer secret-key"))
        .and(body_partial_json(serde_json::json!({ "slug": "uid-1" })))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(serde_json::json!({ "uuid": "rid-1", "seqid": 7 })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let rid = client(&server).create(&target(), &payload("uid-1")).await.unwrap();
    assert_eq!(rid, "rid-1");
}

#[tokio::test]
async fn test_status_codes_are_classified() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path(format!("{}/slug/gone", KB_PATH)))
        .respond_with(ResponseTemplate::new(404).set_body_string("Resource does not exist"))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("{}/slug/busy", KB_PATH)))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("{}/slug/denied", KB_PATH)))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let client = client(&server);
    let target = target();

    let err = client.delete(&target, &ResourceKey::slug("gone")).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(err.message.contains("Resource does not exist"));

    let err = client.delete(&target, &ResourceKey::slug("busy")).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::RateLimited);

    let err = client.delete(&target, &ResourceKey::slug("denied")).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Unauthorized);
}

#[tokio::test]
async fn test_upsert_falls_back_to_update_on_conflict() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("{}/resources", KB_PATH)))
        .respond_with(ResponseTemplate::new(409).set_body_string("slug already exists"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(format!("{}/slug/uid-1", KB_PATH)))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "seqid": 8 })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = upsert(&client(&server), &target(), "uid-1", &payload("uid-1"))
        .await
        .unwrap();
    assert_eq!(outcome, UpsertOutcome::Updated);
}

#[tokio::test]
async fn test_get_by_resource_id_requests_extra_fields() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("{}/resource/rid-9", KB_PATH)))
        .and(query_param("show", "origin"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "rid-9",
            "slug": "uid-9",
            "title": "Story",
            "usermetadata": {
                "classifications": [{ "labelset": "language-service", "label": "Lao" }]
            },
            "origin": { "url": "https://www.rfa.org/lao/story.html", "tags": ["Laos"] }
        })))
        .mount(&server)
        .await;

    let resource = client(&server)
        .get(&target(), &ResourceKey::id("rid-9"))
        .await
        .unwrap();

    assert_eq!(resource.id, "rid-9");
    assert_eq!(resource.slug.as_deref(), Some("uid-9"));
    let classifications = resource.usermetadata.unwrap().classifications;
    assert_eq!(classifications[0].labelset, "language-service");
}

#[tokio::test]
async fn test_search_flattens_resource_map() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("{}/search", KB_PATH)))
        .and(body_partial_json(serde_json::json!({ "filters": ["/l/language-service"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "resources": {
                "rid-1": { "id": "rid-1", "title": "One" },
                "rid-2": { "id": "rid-2", "title": "Two" }
            },
            "total": 2
        })))
        .mount(&server)
        .await;

    let mut ids: Vec<String> = client(&server)
        .search(&target(), &SearchQuery::labelset("language-service"))
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["rid-1", "rid-2"]);
}

#[tokio::test]
async fn test_undecodable_body_is_a_decode_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("{}/resources", KB_PATH)))
        .respond_with(ResponseTemplate::new(201).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = client(&server)
        .create(&target(), &payload("uid-1"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Decode);
}
