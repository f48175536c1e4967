// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum::http::HeaderMap;

use super::validate_bearer;

fn headers_with(value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Ok(v) = value.parse() {
        headers.insert("authorization", v);
    }
    headers
}

#[test]
fn no_expected_token_disables_auth() {
    assert!(validate_bearer(&HeaderMap::new(), None).is_ok());
}

#[test]
fn matching_token_passes() {
    assert!(validate_bearer(&headers_with("Bearer sekrit"), Some("sekrit")).is_ok());
}

#[test]
fn missing_header_fails() {
    assert!(validate_bearer(&HeaderMap::new(), Some("sekrit")).is_err());
}

#[test]
fn wrong_token_fails() {
    assert!(validate_bearer(&headers_with("Bearer nope"), Some("sekrit")).is_err());
}

#[test]
fn non_bearer_scheme_fails() {
    assert!(validate_bearer(&headers_with("Basic c2Vrcml0"), Some("sekrit")).is_err());
}
