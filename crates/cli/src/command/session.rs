// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `motif sessions` — inspect active playback sessions.

use crate::client::ApiClient;
use crate::command::sensor::print_json;

/// CLI arguments for `motif sessions`.
#[derive(Debug, clap::Args)]
pub struct SessionArgs {
    #[command(subcommand)]
    pub command: SessionCommand,
}

#[derive(Debug, clap::Subcommand)]
pub enum SessionCommand {
    /// List active sessions.
    List,
    /// Show one session by id.
    Show(ShowArgs),
}

#[derive(Debug, clap::Args)]
pub struct ShowArgs {
    pub session_id: String,
}

/// Run the `motif sessions` subcommand. Returns a process exit code.
pub async fn run(args: &SessionArgs) -> i32 {
    let client = ApiClient::from_env();
    match &args.command {
        SessionCommand::List => cmd_list(&client).await,
        SessionCommand::Show(show) => {
            print_json(client.get(&format!("/api/v1/sessions/{}", show.session_id)).await)
        }
    }
}

async fn cmd_list(client: &ApiClient) -> i32 {
    let resp = match client.get("/api/v1/sessions").await {
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

    let sessions = resp.body.as_array().cloned().unwrap_or_default();
    if sessions.is_empty() {
        println!("No active sessions.");
        return 0;
    }
    println!("{:<36} {:<20} {:<8} {:<12}", "SESSION", "SENSOR", "MOTIONS", "LAST MOTION");
    println!("{}", "-".repeat(78));
    for session in &sessions {
        println!(
            "{:<36} {:<20} {:<8} {:<12}",
            session["session_id"].as_str().unwrap_or("?"),
            session["sensor_id"].as_str().unwrap_or("?"),
            session["motion_count"].as_u64().unwrap_or(0),
            session["last_motion_at"].as_u64().unwrap_or(0),
        );
    }
    0
}
