//! Known-value oracle.
//!
//! The marker is a word the debugger may still read on a protected part
//! (nRF51 `RBPCONF` in UICR). Seeing that value appear in a register later
//! shows the instruction under test copied from that exact address.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};
use crate::probe::Probe;
use crate::session::Transport;

/// nRF51 UICR `RBPCONF`
pub const DEFAULT_MARKER_ADDRESS: u32 = 0x1000_1004;

/// An (address, value) pair read once and never modified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownMarker {
    pub address: u32,
    pub value: u32,
}

impl KnownMarker {
    /// Validate a marker against the two register priming patterns.
    ///
    /// Registers are primed either with all zeros or with the marker
    /// address, so a value equal to either would be found everywhere.
    pub fn new(address: u32, value: u32) -> Result<Self> {
        if value == 0 || value == address {
            return Err(Error::AmbiguousMarker { address, value });
        }
        Ok(Self { address, value })
    }

    /// Read the marker from the target with `mdw`.
    pub fn establish<T: Transport>(probe: &mut Probe<T>, address: u32) -> Result<Self> {
        info!("Reading 0x{:08X} to establish known memory address / value...", address);
        let value = probe.read_memory_word(address)?;
        let marker = Self::new(address, value)?;
        info!("Known value at 0x{:08X} is 0x{:08X}", marker.address, marker.value);
        Ok(marker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::mock_probe;
    use crate::session::MockTransport;

    #[test]
    fn test_establish_marker() {
        let mut probe =
            mock_probe(MockTransport::new(0).with_word(DEFAULT_MARKER_ADDRESS, 0xFFFFFF00));
        let marker = KnownMarker::establish(&mut probe, DEFAULT_MARKER_ADDRESS).unwrap();
        assert_eq!(
            marker,
            KnownMarker {
                address: DEFAULT_MARKER_ADDRESS,
                value: 0xFFFFFF00
            }
        );
    }

    #[test]
    fn test_establish_rejects_zero() {
        let mut probe = mock_probe(MockTransport::new(0));
        let err = KnownMarker::establish(&mut probe, DEFAULT_MARKER_ADDRESS).unwrap_err();
        assert!(matches!(err, Error::AmbiguousMarker { value: 0, .. }));
    }

    #[test]
    fn test_establish_unparsable_response() {
        let mut probe = mock_probe(MockTransport::new(0).fail_memory_reads());
        let err = KnownMarker::establish(&mut probe, DEFAULT_MARKER_ADDRESS).unwrap_err();
        assert!(err.raw_response().unwrap().contains("Failed to read memory"));
    }

    #[test]
    fn test_marker_equal_to_address_is_ambiguous() {
        assert!(KnownMarker::new(0x1000, 0x1000).is_err());
        assert!(KnownMarker::new(0x1000, 0x1001).is_ok());
    }
}
