//! Tests for API key extraction and logging hygiene.

use axum::body::Body;
use axum::extract::Request;

use super::middleware::{extract_api_key, key_prefix};

fn request_with_header(name: &str, value: &str) -> Request {
    Request::builder()
        .uri("/api/v1/checkout/subscription")
        .header(name, value)
        .body(Body::empty())
        .unwrap()
}

#[test]
fn test_extracts_key_from_header() {
    let request = request_with_header("X-API-Key", "proj_abc123");
    assert_eq!(extract_api_key(&request), Some("proj_abc123"));
}

#[test]
fn test_header_name_is_case_insensitive() {
    let request = request_with_header("x-api-key", "proj_abc123");
    assert_eq!(extract_api_key(&request), Some("proj_abc123"));
}

#[test]
fn test_missing_header_yields_none() {
    let request = Request::builder()
        .uri("/api/v1/portal")
        .body(Body::empty())
        .unwrap();
    assert_eq!(extract_api_key(&request), None);
}

#[test]
fn test_empty_header_yields_none() {
    let request = request_with_header("X-API-Key", "");
    assert_eq!(extract_api_key(&request), None);

    let request = request_with_header("X-API-Key", "   ");
    assert_eq!(extract_api_key(&request), None);
}

#[test]
fn test_surrounding_whitespace_is_trimmed() {
    let request = request_with_header("X-API-Key", "  proj_abc123  ");
    assert_eq!(extract_api_key(&request), Some("proj_abc123"));
}

#[test]
fn test_key_prefix_truncates_long_keys() {
    let key = "proj_0123456789abcdefghij";
    assert_eq!(key_prefix(key), "proj_0123456");
    assert_eq!(key_prefix(key).len(), 12);
}

#[test]
fn test_key_prefix_handles_short_input() {
    assert_eq!(key_prefix("proj_"), "proj_");
    assert_eq!(key_prefix(""), "");
}
