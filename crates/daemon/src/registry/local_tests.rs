// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::LocalRegistry;
use crate::registry::{DeviceRegistry, PolicyDoc};

#[tokio::test]
async fn create_thing_conflicts_on_duplicate() -> anyhow::Result<()> {
    let registry = LocalRegistry::in_memory()?;
    let handle = registry.create_thing("bedroom-01").await?;
    assert_eq!(handle, "thing:bedroom-01");
    assert!(registry.thing_exists(&handle).await);
    assert!(registry.create_thing("bedroom-01").await.is_err());
    Ok(())
}

#[tokio::test]
async fn minted_certificate_has_pem_material_and_no_stored_key() -> anyhow::Result<()> {
    let registry = LocalRegistry::in_memory()?;
    let thing = registry.create_thing("bedroom-01").await?;
    let issued = registry.mint_certificate(&thing).await?;

    assert!(issued.certificate_pem.contains("BEGIN CERTIFICATE"));
    assert!(issued.private_key_pem.contains("PRIVATE KEY"));
    assert!(registry.certificate_exists(&issued.certificate_handle).await);

    // The registry keeps the certificate but never the private key.
    let stored = registry
        .certificate_pem(&issued.certificate_handle)
        .await
        .ok_or_else(|| anyhow::anyhow!("certificate should be stored"))?;
    assert_eq!(stored, issued.certificate_pem);
    assert!(!stored.contains("PRIVATE KEY"));
    Ok(())
}

#[tokio::test]
async fn mint_for_missing_thing_fails() -> anyhow::Result<()> {
    let registry = LocalRegistry::in_memory()?;
    assert!(registry.mint_certificate("thing:ghost").await.is_err());
    Ok(())
}

#[tokio::test]
async fn attach_detach_principals() -> anyhow::Result<()> {
    let registry = LocalRegistry::in_memory()?;
    let thing = registry.create_thing("bedroom-01").await?;
    let issued = registry.mint_certificate(&thing).await?;

    registry.attach_certificate(&thing, &issued.certificate_handle).await?;
    // Attaching twice does not duplicate the principal.
    registry.attach_certificate(&thing, &issued.certificate_handle).await?;
    assert_eq!(registry.list_principals(&thing).await?, vec![issued.certificate_handle.clone()]);

    registry.detach_certificate(&thing, &issued.certificate_handle).await?;
    assert!(registry.list_principals(&thing).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn policy_binding_requires_certificate() -> anyhow::Result<()> {
    let registry = LocalRegistry::in_memory()?;
    let policy = PolicyDoc::for_sensor("bedroom-01");
    assert!(registry.attach_policy("cert:ghost", policy.clone()).await.is_err());

    let thing = registry.create_thing("bedroom-01").await?;
    let issued = registry.mint_certificate(&thing).await?;
    registry.attach_policy(&issued.certificate_handle, policy).await?;
    registry.detach_policy(&issued.certificate_handle).await?;
    // Detaching again is fine.
    registry.detach_policy(&issued.certificate_handle).await?;
    Ok(())
}

#[tokio::test]
async fn deletion_tolerates_already_gone() -> anyhow::Result<()> {
    let registry = LocalRegistry::in_memory()?;
    registry.delete_thing("thing:ghost").await?;
    registry.delete_certificate("cert:ghost").await?;
    registry.deactivate_certificate("cert:ghost").await?;
    registry.detach_certificate("thing:ghost", "cert:ghost").await?;
    assert!(registry.list_principals("thing:ghost").await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn deactivate_then_delete_certificate() -> anyhow::Result<()> {
    let registry = LocalRegistry::in_memory()?;
    let thing = registry.create_thing("bedroom-01").await?;
    let issued = registry.mint_certificate(&thing).await?;

    registry.deactivate_certificate(&issued.certificate_handle).await?;
    assert_eq!(registry.certificate_active(&issued.certificate_handle).await, Some(false));

    registry.delete_certificate(&issued.certificate_handle).await?;
    assert!(!registry.certificate_exists(&issued.certificate_handle).await);
    Ok(())
}

#[test]
fn sensor_policy_is_topic_scoped() {
    let policy = PolicyDoc::for_sensor("bedroom-01");
    assert_eq!(policy.client_id, "bedroom-01");
    assert!(policy.publish_topics.contains(&"sensors/bedroom-01/motion".to_owned()));
    assert!(policy.publish_topics.contains(&"sensors/bedroom-01/status".to_owned()));
    assert!(policy.publish_topics.contains(&"sensors/bedroom-01/register".to_owned()));
    assert!(policy.subscribe_topics.contains(&"sensors/bedroom-01/config".to_owned()));
    assert!(policy.subscribe_topics.contains(&"sensors/bedroom-01/commands".to_owned()));
    assert!(!policy.publish_topics.iter().any(|t| t.contains("other-sensor")));
}

#[test]
fn ca_material_is_reloaded_from_state_dir() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let first_pem = {
        let registry = LocalRegistry::open(dir.path())?;
        registry.ca_certificate_pem().to_owned()
    };
    let registry = LocalRegistry::open(dir.path())?;
    assert_eq!(registry.ca_certificate_pem(), first_pem, "same CA after reopen");
    Ok(())
}
