//! Integration tests for `probe_url` against a local mock server.
//!
//! Each test starts its own `MockServer`, so responses never leak between
//! tests.

use std::time::Duration;

use feed_sniff::engine::{DispatchAction, SniffOutcome};
use feed_sniff::probe::{probe_url, ProbeError};
use feed_sniff::util::preview_target;
use pretty_assertions::assert_eq;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PREVIEW: &str = "about:feed-preview";
const TIMEOUT: Duration = Duration::from_secs(5);

const RSS: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<rss version="2.0"><channel><title>Example</title></channel></rss>"#;

async fn serve(body: &[u8], content_type: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body.to_vec(), content_type))
        .mount(&server)
        .await;
    server
}

fn client() -> reqwest::Client {
    reqwest::Client::new()
}

#[tokio::test]
async fn test_feed_media_type_is_cancelled() {
    let server = serve(RSS.as_bytes(), "application/rss+xml").await;
    let url = format!("{}/feed", server.uri());

    let report = probe_url(&client(), &url, PREVIEW, TIMEOUT).await.unwrap();

    assert_eq!(report.outcome, SniffOutcome::KnownFeed);
    assert_eq!(report.status, Some(200));
    assert_eq!(report.mime.as_deref(), Some("application/rss+xml"));
    assert_eq!(report.delivered_bytes, 0);
    assert_eq!(report.actions.len(), 2);
    assert!(matches!(report.actions[0], DispatchAction::Cancel { .. }));
    match &report.actions[1] {
        DispatchAction::Navigate { url: preview, .. } => {
            assert_eq!(preview_target(preview), Some(url));
        }
        other => panic!("expected navigation, got {other:?}"),
    }
}

#[tokio::test]
async fn test_generic_xml_is_sniffed() {
    let server = serve(RSS.as_bytes(), "text/xml; charset=utf-8").await;
    let url = format!("{}/feed", server.uri());

    let report = probe_url(&client(), &url, PREVIEW, TIMEOUT).await.unwrap();

    assert_eq!(report.outcome, SniffOutcome::Feed);
    assert_eq!(report.delivered_bytes, RSS.len());
    assert_eq!(report.actions.len(), 1);
    assert!(matches!(report.actions[0], DispatchAction::Navigate { .. }));
}

#[tokio::test]
async fn test_large_feed_body_fully_delivered() {
    let mut body = RSS.as_bytes().to_vec();
    body.extend(std::iter::repeat(b'\n').take(64 * 1024));
    let server = serve(&body, "application/xml").await;
    let url = format!("{}/feed", server.uri());

    let report = probe_url(&client(), &url, PREVIEW, TIMEOUT).await.unwrap();

    assert_eq!(report.outcome, SniffOutcome::Feed);
    assert_eq!(report.delivered_bytes, body.len());
}

#[tokio::test]
async fn test_html_page_is_not_a_feed() {
    let page = b"<!DOCTYPE html><html><head><title>Home</title></head></html>";
    let server = serve(page, "text/html; charset=utf-8").await;
    let url = format!("{}/feed", server.uri());

    let report = probe_url(&client(), &url, PREVIEW, TIMEOUT).await.unwrap();

    assert_eq!(report.outcome, SniffOutcome::NotFeed);
    assert_eq!(report.mime.as_deref(), Some("text/html"));
    assert!(report.actions.is_empty());
    assert_eq!(report.delivered_bytes, page.len());
}

#[tokio::test]
async fn test_other_types_pass_through() {
    let server = serve(b"{\"items\":[]}", "application/json").await;
    let url = format!("{}/feed", server.uri());

    let report = probe_url(&client(), &url, PREVIEW, TIMEOUT).await.unwrap();

    assert_eq!(report.outcome, SniffOutcome::Skipped);
    assert_eq!(report.mime, None);
    assert!(report.actions.is_empty());
    assert_eq!(report.delivered_bytes, 12);
}

#[tokio::test]
async fn test_http_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let result = probe_url(&client(), &format!("{}/missing", server.uri()), PREVIEW, TIMEOUT).await;

    assert!(matches!(result, Err(ProbeError::HttpStatus(404))));
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(RSS.as_bytes().to_vec(), "text/xml")
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let result = probe_url(
        &client(),
        &format!("{}/feed", server.uri()),
        PREVIEW,
        Duration::from_millis(200),
    )
    .await;

    assert!(matches!(result, Err(ProbeError::Timeout)));
}

#[tokio::test]
async fn test_report_serializes_to_json() {
    let server = serve(RSS.as_bytes(), "text/xml").await;
    let url = format!("{}/feed", server.uri());

    let report = probe_url(&client(), &url, PREVIEW, TIMEOUT).await.unwrap();
    let json: serde_json::Value = serde_json::to_value(&report).unwrap();

    assert_eq!(json["outcome"], "feed");
    assert_eq!(json["status"], 200);
    assert_eq!(json["actions"][0]["action"], "navigate");
}
