//! Marker command implementation.

use anyhow::{Context, Result};
use nrfdump_core::{Config, KnownMarker};

/// Run the marker command
pub fn run(config: &Config) -> Result<()> {
    let mut probe = nrfdump_core::connect(config)?;
    let marker = KnownMarker::establish(&mut probe, config.marker_address)
        .context("Failed to establish known marker")?;

    println!("0x{:08X}: 0x{:08X}", marker.address, marker.value);
    Ok(())
}
