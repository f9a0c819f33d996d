// SPDX-FileCopyrightText: 2026 Shroud Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shroud - real-time delivery core for end-to-end-encrypted messaging.
//!
//! This is the binary entry point for the shroud daemon.

use clap::{Parser, Subcommand};

mod serve;

/// Shroud - real-time delivery core for end-to-end-encrypted messaging.
#[derive(Parser, Debug)]
#[command(name = "shroud", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the delivery daemon (gateway, pipeline, retention sweep).
    Serve,
    /// Print the effective configuration after layering and validation.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load and validate configuration at startup
    let config = match shroud_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            shroud_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Serve) => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("shroud serve failed: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::Config) => match toml::to_string_pretty(&config) {
            Ok(rendered) => println!("{rendered}"),
            Err(e) => {
                eprintln!("failed to render config: {e}");
                std::process::exit(1);
            }
        },
        None => {
            println!("shroud: use --help for available commands");
        }
    }
}
