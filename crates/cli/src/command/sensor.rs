// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `motif sensors` — inspect and configure provisioned sensors.

use crate::client::ApiClient;

/// CLI arguments for `motif sensors`.
#[derive(Debug, clap::Args)]
pub struct SensorArgs {
    #[command(subcommand)]
    pub command: SensorCommand,
}

#[derive(Debug, clap::Subcommand)]
pub enum SensorCommand {
    /// List all sensors.
    List,
    /// Show one sensor.
    Show(ShowArgs),
    /// Update configuration and push it to the device.
    Config(ConfigArgs),
    /// Publish a device command (restart, test_motion, enable, disable, ...).
    Command(CommandArgs),
    /// Show recent audit events for a sensor.
    Events(EventsArgs),
}

#[derive(Debug, clap::Args)]
pub struct ShowArgs {
    pub sensor_id: String,
}

#[derive(Debug, clap::Args)]
pub struct ConfigArgs {
    pub sensor_id: String,
    /// Enable motion handling.
    #[arg(long, conflicts_with = "disable")]
    pub enable: bool,
    /// Disable motion handling.
    #[arg(long)]
    pub disable: bool,
    /// Motion debounce seconds.
    #[arg(long)]
    pub debounce: Option<u64>,
    /// Inactivity timeout seconds.
    #[arg(long)]
    pub timeout: Option<u64>,
    /// Quiet hours as `HH:MM-HH:MM@Zone`, e.g. `22:00-07:00@Europe/London`.
    #[arg(long, conflicts_with = "clear_quiet")]
    pub quiet: Option<String>,
    /// Remove the quiet-hours window.
    #[arg(long)]
    pub clear_quiet: bool,
    /// Playback device id.
    #[arg(long)]
    pub target: Option<String>,
    /// Playback context reference.
    #[arg(long)]
    pub context: Option<String>,
}

#[derive(Debug, clap::Args)]
pub struct CommandArgs {
    pub sensor_id: String,
    pub command: String,
}

#[derive(Debug, clap::Args)]
pub struct EventsArgs {
    pub sensor_id: String,
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}

/// Parse `HH:MM-HH:MM@Zone` into a quiet-hours JSON object.
pub fn parse_quiet(value: &str) -> anyhow::Result<serde_json::Value> {
    let (window, timezone) = value
        .split_once('@')
        .ok_or_else(|| anyhow::anyhow!("expected HH:MM-HH:MM@Zone, got {value:?}"))?;
    let (start, end) = window
        .split_once('-')
        .ok_or_else(|| anyhow::anyhow!("expected HH:MM-HH:MM@Zone, got {value:?}"))?;
    if start.is_empty() || end.is_empty() || timezone.is_empty() {
        anyhow::bail!("expected HH:MM-HH:MM@Zone, got {value:?}");
    }
    Ok(serde_json::json!({ "start": start, "end": end, "timezone": timezone }))
}

/// Run the `motif sensors` subcommand. Returns a process exit code.
pub async fn run(args: &SensorArgs) -> i32 {
    let client = ApiClient::from_env();
    match &args.command {
        SensorCommand::List => cmd_list(&client).await,
        SensorCommand::Show(show) => cmd_show(&client, show).await,
        SensorCommand::Config(config) => cmd_config(&client, config).await,
        SensorCommand::Command(command) => cmd_command(&client, command).await,
        SensorCommand::Events(events) => cmd_events(&client, events).await,
    }
}

async fn cmd_list(client: &ApiClient) -> i32 {
    let resp = match client.get("/api/v1/sensors").await {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return 1;
        }
    };
    if !resp.is_success() {
        eprintln!("{}", resp.error_line());
        return 1;
    }

    let sensors = resp.body.as_array().cloned().unwrap_or_default();
    if sensors.is_empty() {
        println!("No sensors provisioned.");
        return 0;
    }
    println!("{:<24} {:<12} {:<10} {:<8} {:<8}", "SENSOR", "USER", "STATUS", "ENABLED", "TIMEOUT");
    println!("{}", "-".repeat(66));
    for sensor in &sensors {
        println!(
            "{:<24} {:<12} {:<10} {:<8} {:<8}",
            sensor["sensor_id"].as_str().unwrap_or("?"),
            sensor["user_id"].as_str().unwrap_or("?"),
            sensor["status"].as_str().unwrap_or("?"),
            sensor["enabled"].as_bool().map(|b| b.to_string()).unwrap_or_default(),
            sensor["inactivity_timeout_secs"].as_u64().unwrap_or(0),
        );
    }
    0
}

async fn cmd_show(client: &ApiClient, args: &ShowArgs) -> i32 {
    let path = format!("/api/v1/sensors/{}", args.sensor_id);
    print_json(client.get(&path).await)
}

async fn cmd_config(client: &ApiClient, args: &ConfigArgs) -> i32 {
    let mut body = serde_json::Map::new();
    if args.enable {
        body.insert("enabled".into(), serde_json::json!(true));
    }
    if args.disable {
        body.insert("enabled".into(), serde_json::json!(false));
    }
    if let Some(debounce) = args.debounce {
        body.insert("motion_debounce_secs".into(), serde_json::json!(debounce));
    }
    if let Some(timeout) = args.timeout {
        body.insert("inactivity_timeout_secs".into(), serde_json::json!(timeout));
    }
    if let Some(ref quiet) = args.quiet {
        match parse_quiet(quiet) {
            Ok(window) => {
                body.insert("quiet_hours".into(), window);
            }
            Err(e) => {
                eprintln!("error: {e}");
                return 2;
            }
        }
    }
    if args.clear_quiet {
        body.insert("clear_quiet_hours".into(), serde_json::json!(true));
    }
    if let Some(ref target) = args.target {
        body.insert("playback_target_id".into(), serde_json::json!(target));
    }
    if let Some(ref context) = args.context {
        body.insert("playback_context_ref".into(), serde_json::json!(context));
    }
    if body.is_empty() {
        eprintln!("error: nothing to change");
        return 2;
    }

    let path = format!("/api/v1/sensors/{}/config", args.sensor_id);
    print_json(client.patch(&path, &serde_json::Value::Object(body)).await)
}

async fn cmd_command(client: &ApiClient, args: &CommandArgs) -> i32 {
    let path = format!("/api/v1/sensors/{}/commands", args.sensor_id);
    let body = serde_json::json!({ "command": args.command });
    let resp = match client.post(&path, &body).await {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return 1;
        }
    };
    if !resp.is_success() {
        eprintln!("{}", resp.error_line());
        return 1;
    }
    println!("published {} to {}", args.command, args.sensor_id);
    0
}

async fn cmd_events(client: &ApiClient, args: &EventsArgs) -> i32 {
    let path = format!("/api/v1/sensors/{}/events?limit={}", args.sensor_id, args.limit);
    let resp = match client.get(&path).await {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return 1;
        }
    };
    if !resp.is_success() {
        eprintln!("{}", resp.error_line());
        return 1;
    }

    let events = resp.body.as_array().cloned().unwrap_or_default();
    if events.is_empty() {
        println!("No events recorded.");
        return 0;
    }
    println!("{:<12} {:<24} {:<18}", "OCCURRED", "TYPE", "ACTION");
    println!("{}", "-".repeat(56));
    for event in &events {
        println!(
            "{:<12} {:<24} {:<18}",
            event["occurred_at"].as_u64().unwrap_or(0),
            event["event_type"].as_str().unwrap_or("?"),
            event["action_taken"].as_str().unwrap_or("?"),
        );
    }
    0
}

pub(crate) fn print_json(result: anyhow::Result<crate::client::ApiResponse>) -> i32 {
    match result {
        Ok(resp) if resp.is_success() => {
            println!("{}", serde_json::to_string_pretty(&resp.body).unwrap_or_default());
            0
        }
        Ok(resp) => {
            eprintln!("{}", resp.error_line());
            1
        }
        Err(e) => {
            eprintln!("error: {e}");
            1
        }
    }
}

#[cfg(test)]
#[path = "sensor_tests.rs"]
mod tests;
