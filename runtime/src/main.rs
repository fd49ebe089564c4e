// Copyright 2026 Litterbox Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;

use litterbox::cli;
use litterbox::config::{LogFormat, ServiceConfig};
use litterbox::logging;

#[derive(Parser)]
#[command(
    name = "litterbox",
    about = "litterbox — accessibility audits over HTTP, powered by axe-core",
    version,
    after_help = "Run 'litterbox' with no command to start the HTTP service."
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log format (pretty, json).
    #[arg(long, global = true)]
    log_format: Option<String>,

    /// Path to axe.min.js (overrides AXE_CORE_PATH).
    #[arg(long, global = true)]
    axe_path: Option<PathBuf>,

    /// Path to the Chromium binary (overrides LITTERBOX_CHROMIUM_PATH).
    #[arg(long, global = true)]
    chromium_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP service (default)
    Serve {
        /// Port to listen on (overrides PORT)
        #[arg(long)]
        port: Option<u16>,
        /// Address to bind (overrides LITTERBOX_HOST)
        #[arg(long)]
        host: Option<IpAddr>,
        /// Maximum concurrent audits (overrides LITTERBOX_MAX_CONCURRENT_AUDITS)
        #[arg(long)]
        max_concurrent: Option<usize>,
    },
    /// Audit a single URL and print the report as JSON
    Audit {
        /// URL to audit
        url: String,
        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },
    /// Check environment and diagnose issues
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ServiceConfig::from_env()?;
    if let Some(format) = &cli.log_format {
        config.log_format = format.parse::<LogFormat>()?;
    }
    if let Some(path) = cli.axe_path {
        config.axe_path = path;
    }
    if let Some(path) = cli.chromium_path {
        config.chromium_path = Some(path);
    }

    logging::init(cli.log_level.as_deref(), config.log_format);

    let result = match cli.command {
        None => cli::serve::run(config).await,
        Some(Commands::Serve {
            port,
            host,
            max_concurrent,
        }) => {
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(n) = max_concurrent {
                config.max_concurrent_audits = n;
            }
            cli::serve::run(config).await
        }
        Some(Commands::Audit { url, pretty }) => cli::audit_cmd::run(&url, config, pretty).await,
        Some(Commands::Doctor) => cli::doctor::run(&config).await,
    };

    if let Err(e) = &result {
        eprintln!("  Error: {e:#}");
        std::process::exit(1);
    }

    result
}
