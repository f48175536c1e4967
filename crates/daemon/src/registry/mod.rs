// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Broker control plane: device identities, client certificates, and
//! topic-scoped authorization policies.

pub mod local;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CoreResult;

/// A freshly minted client certificate. The private key exists only in this
/// value: the registry never stores it and it cannot be fetched again.
#[derive(Debug, Clone)]
pub struct IssuedCertificate {
    pub certificate_handle: String,
    pub certificate_pem: String,
    pub private_key_pem: String,
}

/// Topic-scoped authorization policy bound to a device certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDoc {
    pub policy_name: String,
    /// Topics the device may publish to.
    pub publish_topics: Vec<String>,
    /// Topics the device may subscribe to.
    pub subscribe_topics: Vec<String>,
    /// The MQTT client id the device must connect with.
    pub client_id: String,
}

impl PolicyDoc {
    /// The standard per-sensor policy: publish on motion/status/register,
    /// subscribe on config/commands, client id pinned to the identity name.
    pub fn for_sensor(sensor_id: &str) -> Self {
        Self {
            policy_name: format!("sensor-{sensor_id}"),
            publish_topics: vec![
                format!("sensors/{sensor_id}/motion"),
                format!("sensors/{sensor_id}/status"),
                format!("sensors/{sensor_id}/register"),
            ],
            subscribe_topics: vec![
                format!("sensors/{sensor_id}/config"),
                format!("sensors/{sensor_id}/commands"),
            ],
            client_id: sensor_id.to_owned(),
        }
    }
}

/// Control-plane operations the provisioner composes. Deletion-shaped calls
/// treat "already gone" as success so teardown stays idempotent.
#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    /// Create a broker identity; returns its handle. Conflict if it exists.
    async fn create_thing(&self, name: &str) -> CoreResult<String>;

    async fn delete_thing(&self, thing_handle: &str) -> CoreResult<()>;

    async fn thing_exists(&self, thing_handle: &str) -> bool;

    /// Mint a key pair + client certificate for an identity. The private key
    /// is captured in the returned value only.
    async fn mint_certificate(&self, thing_handle: &str) -> CoreResult<IssuedCertificate>;

    async fn attach_certificate(&self, thing_handle: &str, cert_handle: &str) -> CoreResult<()>;

    async fn detach_certificate(&self, thing_handle: &str, cert_handle: &str) -> CoreResult<()>;

    async fn attach_policy(&self, cert_handle: &str, policy: PolicyDoc) -> CoreResult<()>;

    async fn detach_policy(&self, cert_handle: &str) -> CoreResult<()>;

    async fn deactivate_certificate(&self, cert_handle: &str) -> CoreResult<()>;

    async fn delete_certificate(&self, cert_handle: &str) -> CoreResult<()>;

    async fn certificate_exists(&self, cert_handle: &str) -> bool;

    /// Certificate handles attached to an identity.
    async fn list_principals(&self, thing_handle: &str) -> CoreResult<Vec<String>>;
}
