// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `motif users` — music-connection management.

use crate::client::ApiClient;
use crate::command::sensor::print_json;

/// CLI arguments for `motif users`.
#[derive(Debug, clap::Args)]
pub struct UserArgs {
    #[command(subcommand)]
    pub command: UserCommand,
}

#[derive(Debug, clap::Subcommand)]
pub enum UserCommand {
    /// Show a user record.
    Show(ShowArgs),
    /// Store a music-service refresh token and connect the account.
    ConnectMusic(ConnectArgs),
    /// Drop the music connection and its stored secret.
    DisconnectMusic(ShowArgs),
}

#[derive(Debug, clap::Args)]
pub struct ShowArgs {
    pub user_id: String,
}

#[derive(Debug, clap::Args)]
pub struct ConnectArgs {
    pub user_id: String,
    /// Long-lived refresh token from the music service's consent flow.
    #[arg(long)]
    pub refresh_token: String,
    /// Optional current access token.
    #[arg(long)]
    pub access_token: Option<String>,
    /// Expiry of the access token, epoch seconds.
    #[arg(long)]
    pub expires_at: Option<u64>,
}

/// Run the `motif users` subcommand. Returns a process exit code.
pub async fn run(args: &UserArgs) -> i32 {
    let client = ApiClient::from_env();
    match &args.command {
        UserCommand::Show(show) => {
            print_json(client.get(&format!("/api/v1/users/{}", show.user_id)).await)
        }
        UserCommand::ConnectMusic(connect) => {
            let body = serde_json::json!({
                "refresh_token": connect.refresh_token,
                "access_token": connect.access_token,
                "expires_at": connect.expires_at,
            });
            let path = format!("/api/v1/users/{}/music", connect.user_id);
            print_json(client.post(&path, &body).await)
        }
        UserCommand::DisconnectMusic(show) => {
            print_json(client.delete(&format!("/api/v1/users/{}/music", show.user_id)).await)
        }
    }
}
