//! End-to-end export driver tests against a mocked fulfilment API.

use std::collections::BTreeMap;
use std::time::Duration;

use order_bridge::export::{run_export, ExportQuery, BOM, EXPORT_HEADER, MAX_PAGE_FETCHES};
use order_bridge::FulfilmentApi;
use serde_json::json;
use tokio::sync::mpsc;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn api(uri: &str) -> FulfilmentApi {
    FulfilmentApi::new(uri.to_string(), "test_token".to_string(), Duration::from_secs(5)).unwrap()
}

fn query(entries: &[(&str, &str)]) -> ExportQuery {
    let params: BTreeMap<String, String> = entries
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    ExportQuery::from_params(&params).unwrap()
}

/// Runs the driver to completion while draining the channel, returning the
/// full byte stream.
async fn collect_export(api: FulfilmentApi, query: ExportQuery) -> Vec<u8> {
    let (tx, mut rx) = mpsc::channel(32);
    let driver = tokio::spawn(async move { run_export(&api, &query, tx).await });

    let mut out = Vec::new();
    while let Some(chunk) = rx.recv().await {
        out.extend(chunk);
    }
    driver.await.unwrap();
    out
}

fn completed_order(uuid: &str, ordered_at: &str) -> serde_json::Value {
    json!({
        "uuid": uuid,
        "reference": format!("R-{uuid}"),
        "status": "completed",
        "ordered_at": ordered_at,
        "shipping_address": { "fullname": "Jane Doe", "city": "Amsterdam", "country": "NL" },
        "products": [
            { "uuid": format!("li-{uuid}"), "title": "Widget", "amount": 1, "unit_price": 9.95, "paid_total": 9.95 }
        ]
    })
}

#[tokio::test]
async fn export_streams_bom_header_and_rows_across_pages() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/orders"))
        .and(query_param("page", "1"))
        .and(query_param("status", "completed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "orders": {
                "data": [completed_order("o-1", "2024-01-05T10:00:00Z")],
                "meta": { "current_page": 1, "last_page": 2 }
            }
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/orders"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "orders": {
                "data": [completed_order("o-2", "2024-01-06T10:00:00Z")],
                "meta": { "current_page": 2, "last_page": 2 }
            }
        })))
        .mount(&mock_server)
        .await;

    let body = collect_export(api(&mock_server.uri()), query(&[])).await;

    assert_eq!(&body[..3], BOM);
    let text = String::from_utf8(body[3..].to_vec()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], EXPORT_HEADER.join(","));
    assert!(lines[1].starts_with("o-1,R-o-1,completed,"));
    assert!(lines[2].starts_with("o-2,R-o-2,completed,"));
}

#[tokio::test]
async fn cursor_pagination_carries_the_token_forward() {
    let mock_server = MockServer::start().await;

    // Mount order matters: the cursor-specific mock has to win for the
    // second request
    Mock::given(method("GET"))
        .and(path("/orders"))
        .and(query_param("cursor", "tok-2"))
        .and(query_param("limit", "200"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "orders": [completed_order("o-2", "2024-01-06T10:00:00Z")],
            "meta": { "next_cursor": null }
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "orders": [completed_order("o-1", "2024-01-05T10:00:00Z")],
            "meta": { "next_cursor": "tok-2" }
        })))
        .mount(&mock_server)
        .await;

    let body = collect_export(api(&mock_server.uri()), query(&[])).await;
    let text = String::from_utf8(body[3..].to_vec()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[1].starts_with("o-1,"));
    assert!(lines[2].starts_with("o-2,"));

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
}

#[tokio::test]
async fn date_window_is_rechecked_locally() {
    let mock_server = MockServer::start().await;

    // Upstream ignores the date filter and returns both orders
    Mock::given(method("GET"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "orders": {
                "data": [
                    completed_order("o-early", "2023-12-31T23:59:59Z"),
                    completed_order("o-in", "2024-01-01T00:00:00Z")
                ],
                "meta": { "current_page": 1, "last_page": 1 }
            }
        })))
        .mount(&mock_server)
        .await;

    let body = collect_export(
        api(&mock_server.uri()),
        query(&[("ordered_at_from", "2024-01-01")]),
    )
    .await;

    let text = String::from_utf8(body[3..].to_vec()).unwrap();
    assert!(!text.contains("o-early"));
    assert!(text.contains("o-in"));
}

#[tokio::test]
async fn order_without_line_items_emits_a_placeholder_row() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "orders": {
                "data": [{
                    "uuid": "o-empty",
                    "status": "completed",
                    "ordered_at": "2024-01-05T10:00:00Z",
                    "products": []
                }],
                "meta": { "current_page": 1, "last_page": 1 }
            }
        })))
        .mount(&mock_server)
        .await;

    let body = collect_export(api(&mock_server.uri()), query(&[])).await;
    let text = String::from_utf8(body[3..].to_vec()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[1].starts_with("o-empty,"));
    // Line item columns stay empty
    assert!(lines[1].ends_with(",,,,,,"));
}

#[tokio::test]
async fn export_stops_at_the_page_cap() {
    let mock_server = MockServer::start().await;

    // Always a full page, never an end-of-data signal
    Mock::given(method("GET"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "orders": [completed_order("o-loop", "2024-01-05T10:00:00Z")]
        })))
        .mount(&mock_server)
        .await;

    let mut export_query = query(&[]);
    export_query.per_page = 1;

    collect_export(api(&mock_server.uri()), export_query).await;

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), MAX_PAGE_FETCHES as usize);
}

#[tokio::test]
async fn dropped_receiver_stops_the_driver() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "orders": [completed_order("o-1", "2024-01-05T10:00:00Z")]
        })))
        .mount(&mock_server)
        .await;

    let api = api(&mock_server.uri());
    let export_query = query(&[]);
    let (tx, rx) = mpsc::channel(32);
    drop(rx);

    run_export(&api, &export_query, tx).await;

    // The very first send fails, so no page is ever fetched
    let requests = mock_server.received_requests().await.unwrap();
    assert!(requests.is_empty());
}

#[tokio::test]
async fn upstream_failure_truncates_the_stream() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/orders"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "orders": {
                "data": [completed_order("o-1", "2024-01-05T10:00:00Z")],
                "meta": { "current_page": 1, "last_page": 2 }
            }
        })))
        .mount(&mock_server)
        .await;

    let body = collect_export(api(&mock_server.uri()), query(&[])).await;

    // Page one made it out before the failure ended the stream
    let text = String::from_utf8(body[3..].to_vec()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[1].starts_with("o-1,"));
}
