mod cli;
mod commands;
mod hex_utils;
mod shutdown;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use nrfdump_core::Config;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command, SearchArgs};
use commands::dump::DumpOptions;
use shutdown::ShutdownSignal;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(format!("nrfdump={}", level).parse()?)
                .add_directive(format!("nrfdump_core={}", level).parse()?),
        )
        .init();

    let shutdown = Arc::new(ShutdownSignal::new());
    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || {
            warn!("Interrupt received, stopping after the current command...");
            shutdown.trigger();
        })?;
    }

    let result = match &cli.command {
        Command::Marker { address } => {
            let mut config = load_config(&cli, None)?;
            if let Some(address) = address {
                config.marker_address = *address;
            }
            commands::marker::run(&config)
        }
        Command::Find { search } => {
            let config = load_config(&cli, Some(search))?;
            commands::find::run(&config, &search.gadget_file, &shutdown)
        }
        Command::Dump {
            search,
            from,
            to,
            output,
            resume,
            rescan,
        } => {
            let config = load_config(&cli, Some(search))?;
            let options = DumpOptions {
                from: *from,
                to: *to,
                output: output.clone(),
                resume: *resume,
                gadget_file: search.gadget_file.clone(),
                rescan: *rescan,
            };
            commands::dump::run(&config, &options, &shutdown)
        }
    };

    if result.is_err() && shutdown.is_shutdown() {
        info!("Stopped by user");
    }
    result
}

/// Config file (if any), then command-line overrides
fn load_config(cli: &Cli, search: Option<&SearchArgs>) -> Result<Config> {
    let base = match &cli.config {
        Some(path) => {
            let config = Config::load(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            info!("Loaded config from {}", path.display());
            config
        }
        None => Config::default(),
    };

    let mut builder = Config::builder().base(base);
    if let Some(host) = &cli.host {
        builder = builder.host(host.clone());
    }
    if let Some(port) = cli.port {
        builder = builder.port(port);
    }
    if let Some(ms) = cli.settle_ms {
        builder = builder.settle_ms(ms);
    }
    if let Some(secs) = cli.timeout_secs {
        builder = builder.read_timeout_secs(secs);
    }
    if let Some(search) = search {
        if let Some(address) = search.marker_address {
            builder = builder.marker_address(address);
        }
        if let Some(bytes) = search.scan_window {
            builder = builder.scan_window(bytes);
        }
        if let Some(end) = search.scan_end {
            builder = builder.scan_end(end);
        }
    }
    Ok(builder.build())
}
