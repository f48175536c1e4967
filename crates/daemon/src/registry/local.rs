// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local device registry backed by an rcgen certificate authority.
//!
//! Things, certificates, principal attachments, and policy docs are registry
//! records; client certificates are minted on demand and signed by a CA whose
//! material lives in the state dir (`ca.pem` / `ca.key`). Private keys for
//! device certificates are returned to the caller once and never stored.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use rcgen::{Certificate, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair};
use tokio::sync::RwLock;

use crate::error::{CoreError, CoreResult};
use crate::registry::{DeviceRegistry, IssuedCertificate, PolicyDoc};

#[derive(Debug, Clone)]
struct ThingRecord {
    name: String,
    principals: Vec<String>,
}

#[derive(Debug, Clone)]
struct CertRecord {
    pem: String,
    active: bool,
}

#[derive(Default)]
struct RegistryTables {
    things: HashMap<String, ThingRecord>,
    certs: HashMap<String, CertRecord>,
    policies: HashMap<String, PolicyDoc>,
}

pub struct LocalRegistry {
    ca: Certificate,
    ca_pem: String,
    tables: RwLock<RegistryTables>,
}

impl LocalRegistry {
    /// Open the registry, loading CA material from `state_dir` or minting a
    /// fresh CA on first run.
    pub fn open(state_dir: &Path) -> anyhow::Result<Self> {
        let ca_cert_path = state_dir.join("ca.pem");
        let ca_key_path = state_dir.join("ca.key");

        if ca_cert_path.exists() && ca_key_path.exists() {
            let ca_pem = std::fs::read_to_string(&ca_cert_path)?;
            let key_pem = std::fs::read_to_string(&ca_key_path)?;
            let key = KeyPair::from_pem(&key_pem)?;
            let params = CertificateParams::from_ca_cert_pem(&ca_pem, key)?;
            let ca = Certificate::from_params(params)?;
            return Ok(Self { ca, ca_pem, tables: RwLock::new(RegistryTables::default()) });
        }

        let ca = new_ca()?;
        let ca_pem = ca.serialize_pem()?;
        std::fs::create_dir_all(state_dir)?;
        std::fs::write(&ca_cert_path, &ca_pem)?;
        std::fs::write(&ca_key_path, ca.serialize_private_key_pem())?;
        Ok(Self { ca, ca_pem, tables: RwLock::new(RegistryTables::default()) })
    }

    /// Registry with an ephemeral CA and no on-disk material (tests).
    pub fn in_memory() -> anyhow::Result<Self> {
        let ca = new_ca()?;
        let ca_pem = ca.serialize_pem()?;
        Ok(Self { ca, ca_pem, tables: RwLock::new(RegistryTables::default()) })
    }

    /// PEM of the CA devices must trust for broker TLS.
    pub fn ca_certificate_pem(&self) -> &str {
        &self.ca_pem
    }

    /// Stored PEM for an issued certificate, if it still exists.
    pub async fn certificate_pem(&self, cert_handle: &str) -> Option<String> {
        self.tables.read().await.certs.get(cert_handle).map(|c| c.pem.clone())
    }

    /// Whether an issued certificate is still marked active.
    pub async fn certificate_active(&self, cert_handle: &str) -> Option<bool> {
        self.tables.read().await.certs.get(cert_handle).map(|c| c.active)
    }
}

fn new_ca() -> anyhow::Result<Certificate> {
    let mut params = CertificateParams::new(Vec::new());
    params.is_ca = IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, "motif device ca");
    params.distinguished_name = dn;
    Ok(Certificate::from_params(params)?)
}

#[async_trait]
impl DeviceRegistry for LocalRegistry {
    async fn create_thing(&self, name: &str) -> CoreResult<String> {
        let handle = format!("thing:{name}");
        let mut tables = self.tables.write().await;
        if tables.things.contains_key(&handle) {
            return Err(CoreError::conflict(format!("thing already exists: {name}")));
        }
        tables
            .things
            .insert(handle.clone(), ThingRecord { name: name.to_owned(), principals: Vec::new() });
        Ok(handle)
    }

    async fn delete_thing(&self, thing_handle: &str) -> CoreResult<()> {
        self.tables.write().await.things.remove(thing_handle);
        Ok(())
    }

    async fn thing_exists(&self, thing_handle: &str) -> bool {
        self.tables.read().await.things.contains_key(thing_handle)
    }

    async fn mint_certificate(&self, thing_handle: &str) -> CoreResult<IssuedCertificate> {
        let common_name = {
            let tables = self.tables.read().await;
            let thing = tables.things.get(thing_handle).ok_or_else(|| {
                CoreError::not_found(format!("no such thing: {thing_handle}"))
            })?;
            thing.name.clone()
        };

        let mut params = CertificateParams::new(Vec::new());
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, common_name);
        params.distinguished_name = dn;
        let cert = Certificate::from_params(params)
            .map_err(|e| CoreError::fatal(format!("certificate generation failed: {e}")))?;
        let certificate_pem = cert
            .serialize_pem_with_signer(&self.ca)
            .map_err(|e| CoreError::fatal(format!("certificate signing failed: {e}")))?;
        // Captured here and in the returned bundle only.
        let private_key_pem = cert.serialize_private_key_pem();

        let handle = format!("cert:{}", uuid::Uuid::new_v4());
        self.tables
            .write()
            .await
            .certs
            .insert(handle.clone(), CertRecord { pem: certificate_pem.clone(), active: true });

        Ok(IssuedCertificate {
            certificate_handle: handle,
            certificate_pem,
            private_key_pem,
        })
    }

    async fn attach_certificate(&self, thing_handle: &str, cert_handle: &str) -> CoreResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.certs.contains_key(cert_handle) {
            return Err(CoreError::not_found(format!("no such certificate: {cert_handle}")));
        }
        let thing = tables
            .things
            .get_mut(thing_handle)
            .ok_or_else(|| CoreError::not_found(format!("no such thing: {thing_handle}")))?;
        if !thing.principals.iter().any(|p| p == cert_handle) {
            thing.principals.push(cert_handle.to_owned());
        }
        Ok(())
    }

    async fn detach_certificate(&self, thing_handle: &str, cert_handle: &str) -> CoreResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(thing) = tables.things.get_mut(thing_handle) {
            thing.principals.retain(|p| p != cert_handle);
        }
        Ok(())
    }

    async fn attach_policy(&self, cert_handle: &str, policy: PolicyDoc) -> CoreResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.certs.contains_key(cert_handle) {
            return Err(CoreError::not_found(format!("no such certificate: {cert_handle}")));
        }
        tables.policies.insert(cert_handle.to_owned(), policy);
        Ok(())
    }

    async fn detach_policy(&self, cert_handle: &str) -> CoreResult<()> {
        self.tables.write().await.policies.remove(cert_handle);
        Ok(())
    }

    async fn deactivate_certificate(&self, cert_handle: &str) -> CoreResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(cert) = tables.certs.get_mut(cert_handle) {
            cert.active = false;
        }
        Ok(())
    }

    async fn delete_certificate(&self, cert_handle: &str) -> CoreResult<()> {
        let mut tables = self.tables.write().await;
        tables.certs.remove(cert_handle);
        tables.policies.remove(cert_handle);
        Ok(())
    }

    async fn certificate_exists(&self, cert_handle: &str) -> bool {
        self.tables.read().await.certs.contains_key(cert_handle)
    }

    async fn list_principals(&self, thing_handle: &str) -> CoreResult<Vec<String>> {
        let tables = self.tables.read().await;
        Ok(tables
            .things
            .get(thing_handle)
            .map(|t| t.principals.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod tests;
