// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command handlers. Results go to stdout, logs to stderr.

use std::path::Path;

use tracing::debug;

use sharespool_core::SpoolError;
use sharespool_print::DiscoveryHandler;

use crate::cli::Command;
use crate::error::CliError;
use crate::services::app_services::{AppServices, PrintOutcome};

pub async fn dispatch(command: Command, services: &AppServices) -> Result<(), CliError> {
    debug!(command = ?command, "dispatching command");
    match command {
        Command::Login { username } => login(services, &username),
        Command::Logout => {
            if !services.logged_in() {
                println!("Not logged in.");
                return Ok(());
            }
            services.logout()?;
            println!("Logged out.");
            Ok(())
        }
        Command::Printers => printers(services).await,
        Command::Print { printer, file } => print(services, &printer, &file).await,
        Command::History { limit } => history(services, limit),
        Command::Config => {
            debug!(path = %services.config_path().display(), "effective configuration");
            let json = serde_json::to_string_pretty(services.config()).map_err(SpoolError::from)?;
            println!("{json}");
            Ok(())
        }
    }
}

fn login(services: &AppServices, username: &str) -> Result<(), CliError> {
    let password = rpassword::prompt_password(format!("Password for {username}: "))
        .map_err(SpoolError::from)?;
    services.login(username, &password)?;
    println!("Credentials saved for {username}.");
    Ok(())
}

async fn printers(services: &AppServices) -> Result<(), CliError> {
    let discovery = services.discover().await?;
    discovery.session.on_destroy();

    if let Some((kind, reason)) = discovery.failure {
        return Err(CliError::DiscoveryFailed { kind, reason });
    }
    if discovery.printers.is_empty() {
        println!("No printers published by {}.", services.config().endpoint.host);
        return Ok(());
    }
    for printer in &discovery.printers {
        let caps = printer.capabilities();
        println!(
            "{:<32} {:<6?} {} {}dpi {:?}",
            printer.display_name(),
            printer.status(),
            caps.media_size.keyword(),
            caps.resolution.horizontal_dpi,
            caps.color_mode
        );
    }
    Ok(())
}

async fn print(services: &AppServices, printer: &str, file: &Path) -> Result<(), CliError> {
    match services.print(printer, file).await? {
        PrintOutcome::Succeeded(report) => {
            println!(
                "Sent {} bytes to {printer} (sha256 {}).",
                report.bytes_sent, report.sha256
            );
            Ok(())
        }
        PrintOutcome::NotDiscovered { kind, reason } => {
            Err(CliError::DiscoveryFailed { kind, reason })
        }
        PrintOutcome::Failed { kind, reason } => Err(CliError::JobFailed { kind, reason }),
        PrintOutcome::Cancelled => Err(CliError::Cancelled),
    }
}

fn history(services: &AppServices, limit: u32) -> Result<(), CliError> {
    let entries = services.history(limit)?;
    if entries.is_empty() {
        println!("No activity recorded yet.");
    }
    for entry in entries {
        let status = if entry.success { "ok" } else { "FAILED" };
        println!(
            "{}  {:<20} {:<6} {}  {}",
            entry.timestamp,
            entry.action,
            status,
            entry.subject,
            entry.details.unwrap_or_default()
        );
    }
    Ok(())
}
