// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Secret vault: per-user music-service token records, keyed by opaque
//! `token_ref` pointers held on the user record.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Token material for one user's music-service connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    pub refresh_token: String,
    /// Expiry of the access token, epoch seconds.
    pub expires_at: u64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct VaultContents {
    #[serde(default)]
    tokens: HashMap<String, TokenRecord>,
}

/// In-process secret store persisted to a JSON file in the state dir.
#[derive(Debug)]
pub struct SecretVault {
    contents: RwLock<VaultContents>,
    /// `None` disables persistence (used in tests).
    path: Option<PathBuf>,
}

impl SecretVault {
    pub fn in_memory() -> Self {
        Self { contents: RwLock::new(VaultContents::default()), path: None }
    }

    /// Open the vault at `path`, loading existing contents if present.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let contents = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            serde_json::from_str(&raw)?
        } else {
            VaultContents::default()
        };
        Ok(Self { contents: RwLock::new(contents), path: Some(path.to_owned()) })
    }

    /// Mint a fresh opaque reference for a new secret.
    pub fn new_token_ref(user_id: &str) -> String {
        format!("token/{user_id}/{}", uuid::Uuid::new_v4())
    }

    pub async fn get(&self, token_ref: &str) -> Option<TokenRecord> {
        self.contents.read().await.tokens.get(token_ref).cloned()
    }

    pub async fn put(&self, token_ref: &str, record: TokenRecord) -> anyhow::Result<()> {
        let mut contents = self.contents.write().await;
        contents.tokens.insert(token_ref.to_owned(), record);
        self.flush(&contents)
    }

    pub async fn delete(&self, token_ref: &str) -> anyhow::Result<bool> {
        let mut contents = self.contents.write().await;
        let removed = contents.tokens.remove(token_ref).is_some();
        self.flush(&contents)?;
        Ok(removed)
    }

    fn flush(&self, contents: &VaultContents) -> anyhow::Result<()> {
        let Some(ref path) = self.path else {
            return Ok(());
        };
        if let Some(dir) = path.parent() {
            if !dir.exists() {
                std::fs::create_dir_all(dir)?;
            }
        }
        let json = serde_json::to_string_pretty(contents)?;
        let tmp_path = path.with_extension("tmp");
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "secret_tests.rs"]
mod tests;
