//! Find command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use nrfdump_core::{
    Config, Gadget, GadgetRecord, KnownMarker, Probe, StatusReport, Transport, discover,
};

use crate::shutdown::ShutdownSignal;

/// Run the find command
pub fn run(config: &Config, gadget_file: &Path, shutdown: &ShutdownSignal) -> Result<()> {
    let mut probe = nrfdump_core::connect(config)?;
    let (marker, gadget) = discover_gadget(&mut probe, config, shutdown)?;

    print_status(marker, gadget);
    GadgetRecord::new(marker, gadget)
        .save(gadget_file)
        .with_context(|| format!("Failed to save {}", gadget_file.display()))?;
    println!("Gadget saved to: {}", gadget_file.display());
    Ok(())
}

/// Establish the marker and run both discovery phases
pub fn discover_gadget<T: Transport>(
    probe: &mut Probe<T>,
    config: &Config,
    shutdown: &ShutdownSignal,
) -> Result<(KnownMarker, Gadget)> {
    let marker = KnownMarker::establish(probe, config.marker_address)
        .context("Failed to establish known marker")?;
    let gadget = discover(probe, marker, config.scan_limit(), shutdown.as_atomic())
        .context("Gadget discovery failed")?;
    Ok((marker, gadget))
}

pub fn print_status(marker: KnownMarker, gadget: Gadget) {
    println!();
    println!("=== The state of the game ===");
    println!("{}", StatusReport { marker, gadget });
    println!();
}
