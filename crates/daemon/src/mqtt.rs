// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! MQTT transport: the daemon's own broker connection.
//!
//! Subscribes to the per-sensor publish topics (motion QoS 1, register QoS 1,
//! status QoS 0) and feeds decoded events into the ingress router. Outbound
//! config and command messages arrive over a channel so the rest of the
//! daemon never touches the client directly. Subscriptions are re-issued on
//! every reconnect.

use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS, Transport};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::config::DaemonConfig;
use crate::ingress::{self, RawEvent};
use crate::model::{epoch_secs, Sensor};
use crate::state::AppState;

/// A message destined for a device's config or commands topic.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Config { sensor_id: String, payload: serde_json::Value },
    Command { sensor_id: String, payload: serde_json::Value },
}

impl Outbound {
    pub fn topic(&self) -> String {
        match self {
            Self::Config { sensor_id, .. } => format!("sensors/{sensor_id}/config"),
            Self::Command { sensor_id, .. } => format!("sensors/{sensor_id}/commands"),
        }
    }

    pub fn payload_bytes(&self) -> Vec<u8> {
        match self {
            Self::Config { payload, .. } | Self::Command { payload, .. } => {
                payload.to_string().into_bytes()
            }
        }
    }
}

/// Commands a device firmware recognizes on its commands topic.
pub const DEVICE_COMMANDS: &[&str] =
    &["restart", "test_motion", "ota_update", "factory_reset", "enable", "disable"];

pub fn is_known_command(command: &str) -> bool {
    DEVICE_COMMANDS.contains(&command)
}

/// Configuration document pushed to a device, wire-format field names.
#[derive(Debug, Serialize)]
pub struct DeviceConfig {
    #[serde(rename = "motionDebounceSeconds")]
    pub motion_debounce_secs: u64,
    #[serde(rename = "inactivityTimeoutSeconds")]
    pub inactivity_timeout_secs: u64,
    pub enabled: bool,
}

/// Build the config payload a sensor's firmware consumes.
pub fn config_payload(sensor: &Sensor) -> serde_json::Value {
    serde_json::to_value(DeviceConfig {
        motion_debounce_secs: sensor.motion_debounce_secs,
        inactivity_timeout_secs: sensor.inactivity_timeout_secs,
        enabled: sensor.enabled,
    })
    .unwrap_or(serde_json::Value::Null)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttEndpoint {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
}

/// Parse `mqtt://host:port` / `mqtts://host:port` / bare `host:port`.
pub fn parse_endpoint(url: &str) -> anyhow::Result<MqttEndpoint> {
    let mut use_tls = false;
    let mut remainder = url.trim();

    if let Some((scheme, rest)) = remainder.split_once("://") {
        match scheme {
            "mqtt" | "tcp" => {}
            "mqtts" | "ssl" => use_tls = true,
            other => anyhow::bail!("unsupported MQTT scheme: {other}"),
        }
        remainder = rest;
    }

    let (host, port) = remainder
        .rsplit_once(':')
        .ok_or_else(|| anyhow::anyhow!("missing MQTT port in {url}"))?;
    let port: u16 = port.parse().map_err(|_| anyhow::anyhow!("invalid MQTT port in {url}"))?;
    if host.is_empty() {
        anyhow::bail!("missing MQTT host in {url}");
    }
    Ok(MqttEndpoint { host: host.to_owned(), port, use_tls })
}

fn build_options(config: &DaemonConfig, endpoint: &MqttEndpoint) -> anyhow::Result<MqttOptions> {
    let mut options = MqttOptions::new(&config.mqtt_client_id, &endpoint.host, endpoint.port);
    options.set_keep_alive(Duration::from_secs(60));
    options.set_clean_session(true);

    if endpoint.use_tls {
        let ca = match &config.mqtt_ca_path {
            Some(path) => std::fs::read(path)?,
            None => anyhow::bail!("mqtts endpoint requires --mqtt-ca"),
        };
        let client_auth = match (&config.mqtt_cert_path, &config.mqtt_key_path) {
            (Some(cert), Some(key)) => Some((std::fs::read(cert)?, std::fs::read(key)?)),
            (None, None) => None,
            _ => anyhow::bail!("MQTT client cert and key must be provided together"),
        };
        options.set_transport(Transport::tls(ca, client_auth, None));
    }
    Ok(options)
}

/// Connect and run the broker loop until shutdown. No-op when no MQTT URL is
/// configured.
pub fn spawn_mqtt(state: Arc<AppState>, outbound_rx: mpsc::Receiver<Outbound>) -> anyhow::Result<()> {
    let Some(ref url) = state.config.mqtt_url else {
        tracing::warn!("no MQTT broker configured; motion ingestion disabled");
        // Keep the channel drained so config pushes don't error out.
        tokio::spawn(drain_outbound(Arc::clone(&state), outbound_rx));
        return Ok(());
    };
    let endpoint = parse_endpoint(url)?;
    let options = build_options(&state.config, &endpoint)?;
    let (client, eventloop) = AsyncClient::new(options, 64);

    tokio::spawn(run_loop(state, client, eventloop, outbound_rx));
    Ok(())
}

async fn run_loop(
    state: Arc<AppState>,
    client: AsyncClient,
    mut eventloop: rumqttc::EventLoop,
    mut outbound_rx: mpsc::Receiver<Outbound>,
) {
    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => {
                let _ = client.disconnect().await;
                break;
            }
            outbound = outbound_rx.recv() => {
                let Some(message) = outbound else { break };
                let topic = message.topic();
                if let Err(e) = client
                    .publish(&topic, QoS::AtLeastOnce, false, message.payload_bytes())
                    .await
                {
                    tracing::warn!(topic = %topic, err = %e, "outbound publish failed");
                }
            }
            event = eventloop.poll() => {
                match event {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        tracing::info!("broker connected; subscribing to sensor topics");
                        subscribe_all(&client).await;
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        ingress::handle_event(
                            &state,
                            RawEvent {
                                topic: publish.topic.clone(),
                                payload: publish.payload.clone(),
                                broker_timestamp: epoch_secs(),
                            },
                        )
                        .await;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(err = %e, "MQTT connection error; reconnecting");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        }
    }
}

async fn drain_outbound(state: Arc<AppState>, mut outbound_rx: mpsc::Receiver<Outbound>) {
    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => break,
            outbound = outbound_rx.recv() => {
                let Some(message) = outbound else { break };
                tracing::debug!(topic = %message.topic(), "dropping outbound message (no broker)");
            }
        }
    }
}

async fn subscribe_all(client: &AsyncClient) {
    let subscriptions =
        [("sensors/+/motion", QoS::AtLeastOnce), ("sensors/+/register", QoS::AtLeastOnce), ("sensors/+/status", QoS::AtMostOnce)];
    for (topic, qos) in subscriptions {
        if let Err(e) = client.subscribe(topic, qos).await {
            tracing::error!(topic, err = %e, "subscribe failed");
        }
    }
}

#[cfg(test)]
#[path = "mqtt_tests.rs"]
mod tests;
