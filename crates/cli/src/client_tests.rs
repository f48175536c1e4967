// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Once;

use super::{ApiClient, ApiResponse};

static CRYPTO_PROVIDER: Once = Once::new();

fn ensure_crypto_provider() {
    CRYPTO_PROVIDER.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

#[test]
fn base_url_is_normalized() {
    ensure_crypto_provider();
    let client = ApiClient::new("http://localhost:9700/", None);
    assert_eq!(client.url("/api/v1/sensors"), "http://localhost:9700/api/v1/sensors");
}

#[test]
fn success_detection() {
    let ok = ApiResponse { status: 201, body: serde_json::Value::Null };
    assert!(ok.is_success());
    let not = ApiResponse { status: 404, body: serde_json::Value::Null };
    assert!(!not.is_success());
}

#[test]
fn error_line_reads_the_envelope() {
    let resp = ApiResponse {
        status: 409,
        body: serde_json::json!({
            "error": { "code": "CONFLICT", "message": "sensor already exists: bedroom-01" }
        }),
    };
    assert_eq!(resp.error_line(), "error (409 CONFLICT): sensor already exists: bedroom-01");
}

#[test]
fn error_line_survives_garbage_bodies() {
    let resp = ApiResponse { status: 500, body: serde_json::Value::Null };
    assert_eq!(resp.error_line(), "error (500 UNKNOWN): no message");
}
