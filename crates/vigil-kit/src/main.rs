// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// vigil: inspect the trust posture of this machine and exercise the
// command boundary from a shell.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::{Map, Value, json};

use vigil_core::{KitConfig, Verdict};
use vigil_kit::{Command, SecurityKit, dispatch};

/// Device integrity signals and hardware-backed string encryption.
#[derive(Parser, Debug)]
#[command(name = "vigil")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a JSON KitConfig file (defaults apply when absent)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Evaluate every verdict and print a JSON trust report
    Status,

    /// Show each probe behind one verdict
    Explain {
        /// Verdict name, e.g. deviceCompromised
        verdict: Verdict,
    },

    /// Dispatch one boundary command and print the JSON reply
    Call {
        /// Command name or alias, e.g. isDeviceRooted
        command: String,

        /// Value for the `data` argument (encrypt/decrypt)
        #[arg(long)]
        data: Option<String>,

        /// Set the `enabled` argument (toggleScreenSecurity)
        #[arg(long)]
        enabled: bool,
    },

    /// List the canonical command names
    Commands,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => KitConfig::load(path),
        None => Ok(KitConfig::default()),
    };
    let kit = match config.and_then(|c| SecurityKit::from_config(&c)) {
        Ok(kit) => kit,
        Err(e) => {
            tracing::error!(error = %e, "failed to initialise security kit");
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Status => print_json(&json!(kit.report())),
        Commands::Explain { verdict } => print_json(&json!(kit.explain(verdict))),
        Commands::Call {
            command,
            data,
            enabled,
        } => {
            let mut args = Map::new();
            if let Some(data) = data {
                args.insert("data".into(), Value::String(data));
            }
            if enabled {
                args.insert("enabled".into(), Value::Bool(true));
            }
            match dispatch(&kit, &command, &Value::Object(args)) {
                Ok(reply) => print_json(&json!({ "ok": reply })),
                Err(e) => {
                    print_json(&json!({ "error": e }));
                    return ExitCode::FAILURE;
                }
            }
        }
        Commands::Commands => {
            for command in Command::ALL {
                println!("{}", command.name());
            }
        }
    }
    ExitCode::SUCCESS
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => tracing::error!(error = %e, "failed to render reply"),
    }
}
