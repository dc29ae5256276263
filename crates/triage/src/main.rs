// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Triage - turns Slack threads into Basecamp to-dos.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod authorize;
mod bind;
mod serve;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use triage_config::{ConfigError, TriageConfig};

/// Triage - react to a Slack thread, get a Basecamp to-do.
#[derive(Parser, Debug)]
#[command(name = "triage", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Listen for Slack reaction events and file to-dos.
    Serve,
    /// Authorize Basecamp once and store the OAuth credential.
    Authorize,
    /// Route a Slack channel to a specific project and to-do list.
    Bind {
        channel: String,
        project_id: String,
        todolist_id: String,
    },
    /// Remove a channel's binding.
    Unbind { channel: String },
    /// List channel bindings.
    Bindings,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = exit_on_config_errors(match &cli.config {
        Some(path) => triage_config::load_and_validate_path(path),
        None => triage_config::load_and_validate(),
    });

    let result = match cli.command {
        Commands::Serve => {
            exit_on_config_errors(triage_config::validate_for_serve(&config));
            serve::run_serve(config).await
        }
        Commands::Authorize => {
            exit_on_config_errors(triage_config::validate_for_authorize(&config));
            authorize::run_authorize(config).await
        }
        Commands::Bind {
            channel,
            project_id,
            todolist_id,
        } => bind::run_bind(&config, &channel, project_id, todolist_id).await,
        Commands::Unbind { channel } => bind::run_unbind(&config, &channel).await,
        Commands::Bindings => bind::run_list(&config).await,
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn exit_on_config_errors<T>(result: Result<T, Vec<ConfigError>>) -> T {
    match result {
        Ok(value) => value,
        Err(errors) => {
            triage_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

/// Installs the log subscriber. `RUST_LOG` overrides the configured level.
pub(crate) fn init_tracing(config: &TriageConfig) {
    use tracing_subscriber::EnvFilter;

    let level = &config.bot.log_level;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("triage={level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
