// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `motif provision` / `motif deprovision` — device lifecycle.

use std::path::PathBuf;

use crate::client::ApiClient;

/// CLI arguments for `motif provision`.
#[derive(Debug, clap::Args)]
pub struct ProvisionArgs {
    /// Sensor id (also the broker identity name).
    pub sensor_id: String,
    /// Owning user id.
    #[arg(long)]
    pub user: String,
    /// Playback device id on the music service.
    #[arg(long)]
    pub target: String,
    /// Playback context (playlist/album reference) started on motion.
    #[arg(long)]
    pub context: String,
    /// Human-readable location label.
    #[arg(long)]
    pub label: Option<String>,
    /// Motion debounce seconds (defaults to the user's preference).
    #[arg(long)]
    pub debounce: Option<u64>,
    /// Inactivity timeout seconds (defaults to the user's preference).
    #[arg(long)]
    pub timeout: Option<u64>,
    /// Write certificate.pem / private-key.pem into this directory instead
    /// of printing the key to stdout.
    #[arg(long)]
    pub out_dir: Option<PathBuf>,
}

/// CLI arguments for `motif deprovision`.
#[derive(Debug, clap::Args)]
pub struct DeprovisionArgs {
    /// Sensor id to tear down.
    pub sensor_id: String,
}

/// Run `motif provision`. Returns a process exit code.
pub async fn run_provision(args: &ProvisionArgs) -> i32 {
    let client = ApiClient::from_env();
    let body = serde_json::json!({
        "sensor_id": args.sensor_id,
        "user_id": args.user,
        "playback_target_id": args.target,
        "playback_context_ref": args.context,
        "location_label": args.label,
        "motion_debounce_secs": args.debounce,
        "inactivity_timeout_secs": args.timeout,
    });

    let resp = match client.post("/api/v1/devices", &body).await {
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

    let bundle = resp.body;
    println!("provisioned {}", args.sensor_id);
    println!("  thing:       {}", bundle["thing_handle"].as_str().unwrap_or("?"));
    println!("  certificate: {}", bundle["certificate_handle"].as_str().unwrap_or("?"));
    println!("  policy:      {}", bundle["policy_name"].as_str().unwrap_or("?"));
    println!("  broker:      {}", bundle["broker_endpoint"].as_str().unwrap_or("?"));
    println!("  motion topic: {}", bundle["mqtt_topics"]["motion"].as_str().unwrap_or("?"));

    let cert = bundle["certificate_pem"].as_str().unwrap_or_default();
    let key = bundle["private_key_pem"].as_str().unwrap_or_default();

    if let Some(ref dir) = args.out_dir {
        if let Err(e) = write_materials(dir, &args.sensor_id, cert, key) {
            eprintln!("error: credential bundle received but not saved: {e}");
            eprintln!("{key}");
            return 1;
        }
        println!("  credentials written to {}", dir.display());
    } else {
        println!("\n{cert}");
        println!("{key}");
    }

    println!();
    println!("WARNING: {}", bundle["warning"].as_str().unwrap_or(""));
    0
}

fn write_materials(
    dir: &std::path::Path,
    sensor_id: &str,
    cert: &str,
    key: &str,
) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)?;
    std::fs::write(dir.join(format!("{sensor_id}.pem")), cert)?;
    std::fs::write(dir.join(format!("{sensor_id}.key")), key)?;
    Ok(())
}

/// Run `motif deprovision`. Returns a process exit code.
pub async fn run_deprovision(args: &DeprovisionArgs) -> i32 {
    let client = ApiClient::from_env();
    let path = format!("/api/v1/devices/{}", args.sensor_id);
    let resp = match client.delete(&path).await {
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
    println!("deprovisioned {}", args.sensor_id);
    0
}
