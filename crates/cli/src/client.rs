// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thin HTTP client for the daemon's admin API.
//!
//! Server location comes from `MOTIF_URL` (default `http://127.0.0.1:9700`),
//! auth from `MOTIF_TOKEN`.

use std::time::Duration;

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

/// An API response reduced to status + parsed body.
pub struct ApiResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Human-readable error line from the standard error envelope.
    pub fn error_line(&self) -> String {
        let code = self.body["error"]["code"].as_str().unwrap_or("UNKNOWN");
        let message = self.body["error"]["message"].as_str().unwrap_or("no message");
        format!("error ({} {code}): {message}", self.status)
    }
}

impl ApiClient {
    pub fn from_env() -> Self {
        let base_url = std::env::var("MOTIF_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:9700".to_owned());
        Self::new(&base_url, std::env::var("MOTIF_TOKEN").ok())
    }

    pub fn new(base_url: &str, token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            token,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    pub async fn get(&self, path: &str) -> anyhow::Result<ApiResponse> {
        let req = self.apply_auth(self.http.get(self.url(path)));
        Self::finish(req).await
    }

    pub async fn post(&self, path: &str, body: &serde_json::Value) -> anyhow::Result<ApiResponse> {
        let req = self.apply_auth(self.http.post(self.url(path)).json(body));
        Self::finish(req).await
    }

    pub async fn patch(&self, path: &str, body: &serde_json::Value) -> anyhow::Result<ApiResponse> {
        let req = self.apply_auth(self.http.patch(self.url(path)).json(body));
        Self::finish(req).await
    }

    pub async fn delete(&self, path: &str) -> anyhow::Result<ApiResponse> {
        let req = self.apply_auth(self.http.delete(self.url(path)));
        Self::finish(req).await
    }

    async fn finish(req: reqwest::RequestBuilder) -> anyhow::Result<ApiResponse> {
        let resp = req.send().await?;
        let status = resp.status().as_u16();
        let text = resp.text().await.unwrap_or_default();
        let body = serde_json::from_str(&text).unwrap_or(serde_json::Value::Null);
        Ok(ApiResponse { status, body })
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
