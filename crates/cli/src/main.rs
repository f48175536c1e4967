// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;

use motif::command::{provision, sensor, session, user};

/// Operator CLI for the motion-playback orchestration daemon.
///
/// Server location comes from `MOTIF_URL` (default `http://127.0.0.1:9700`),
/// auth from `MOTIF_TOKEN`.
#[derive(Debug, Parser)]
#[command(name = "motif", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, clap::Subcommand)]
enum Command {
    /// Provision a device: identity, certificate, policy, registry record.
    Provision(provision::ProvisionArgs),
    /// Tear a device down again.
    Deprovision(provision::DeprovisionArgs),
    /// Inspect and configure sensors.
    Sensors(sensor::SensorArgs),
    /// Manage users' music connections.
    Users(user::UserArgs),
    /// Inspect active playback sessions.
    Sessions(session::SessionArgs),
}

#[tokio::main]
async fn main() {
    // reqwest is built with rustls-no-provider; install ring once.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let cli = Cli::parse();
    let code = match &cli.command {
        Command::Provision(args) => provision::run_provision(args).await,
        Command::Deprovision(args) => provision::run_deprovision(args).await,
        Command::Sensors(args) => sensor::run(args).await,
        Command::Users(args) => user::run(args).await,
        Command::Sessions(args) => session::run(args).await,
    };
    std::process::exit(code);
}
