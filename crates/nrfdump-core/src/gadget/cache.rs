//! Gadget cache
//!
//! Saves a discovered gadget so later runs can skip the scan. A record is
//! only trusted while the marker word reads back unchanged and one replay of
//! the gadget still loads it.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::gadget::Gadget;
use crate::oracle::KnownMarker;
use crate::probe::Probe;
use crate::session::Transport;

/// Default cache file name
pub const DEFAULT_GADGET_FILE: &str = "gadget.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GadgetRecord {
    pub marker: KnownMarker,
    pub gadget: Gadget,
    pub created_at: DateTime<Utc>,
}

impl GadgetRecord {
    pub fn new(marker: KnownMarker, gadget: Gadget) -> Self {
        Self {
            marker,
            gadget,
            created_at: Utc::now(),
        }
    }

    /// Load a record, returning `None` if the file is missing or unreadable
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let path = path.as_ref();

        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                debug!("Gadget file not found or unreadable: {}", e);
                return None;
            }
        };

        match serde_json::from_str::<GadgetRecord>(&content) {
            Ok(record) => {
                debug!(
                    "Loaded gadget: pc=0x{:08X}, created_at={}",
                    record.gadget.instruction_address, record.created_at
                );
                Some(record)
            }
            Err(e) => {
                warn!("Failed to parse gadget file: {}", e);
                None
            }
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), json)?;
        info!("Gadget saved to {}", path.as_ref().display());
        Ok(())
    }

    /// Re-read the marker word, then replay the gadget once on the marker
    /// address and check that the output register receives the marker value.
    pub fn matches_target<T: Transport>(&self, probe: &mut Probe<T>) -> Result<bool> {
        let value = probe.read_memory_word(self.marker.address)?;
        if value != self.marker.value {
            warn!(
                "Marker at 0x{:08X} reads 0x{:08X}, gadget file recorded 0x{:08X}",
                self.marker.address, value, self.marker.value
            );
            return Ok(false);
        }

        let gadget = self.gadget;
        probe.set_all_registers(0)?;
        probe.write_register(gadget.input_register, self.marker.address)?;
        probe.step_at(gadget.instruction_address)?;
        let loaded = probe.read_register(gadget.output_register)?;
        if loaded != self.marker.value {
            warn!(
                "Gadget at 0x{:08X} left 0x{:08X} in {}, expected 0x{:08X}",
                gadget.instruction_address, loaded, gadget.output_register, self.marker.value
            );
            return Ok(false);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::mock_probe;
    use crate::registers::Register;
    use crate::session::MockTransport;
    use tempfile::tempdir;

    fn record() -> GadgetRecord {
        GadgetRecord::new(
            KnownMarker::new(0x1000_1004, 0xFFFF_FF00).unwrap(),
            Gadget {
                instruction_address: 0x114CC,
                input_register: Register::R5,
                output_register: Register::R3,
            },
        )
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(DEFAULT_GADGET_FILE);

        let saved = record();
        saved.save(&path).unwrap();

        let loaded = GadgetRecord::load_from_path(&path).unwrap();
        assert_eq!(loaded.marker, saved.marker);
        assert_eq!(loaded.gadget, saved.gadget);

        let json = fs::read_to_string(&path).unwrap();
        assert!(json.contains("\"input_register\": \"r5\""));
    }

    #[test]
    fn test_load_missing_or_corrupt() {
        let dir = tempdir().unwrap();
        assert!(GadgetRecord::load_from_path(dir.path().join("missing.json")).is_none());

        let path = dir.path().join("corrupt.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(GadgetRecord::load_from_path(&path).is_none());
    }

    #[test]
    fn test_matches_target() {
        let record = record();

        let mut same = mock_probe(
            MockTransport::new(0)
                .with_word(0x1000_1004, 0xFFFF_FF00)
                .with_load(0x114CC, Register::R5, Register::R3),
        );
        assert!(record.matches_target(&mut same).unwrap());
        assert_eq!(same.into_session().transport().steps(), 1);

        let mut other = mock_probe(
            MockTransport::new(0)
                .with_word(0x1000_1004, 0xFFFF_0000)
                .with_load(0x114CC, Register::R5, Register::R3),
        );
        assert!(!record.matches_target(&mut other).unwrap());
        assert_eq!(other.into_session().transport().steps(), 0);
    }

    #[test]
    fn test_same_marker_without_gadget_is_rejected() {
        let record = record();

        let mut no_load = mock_probe(MockTransport::new(0).with_word(0x1000_1004, 0xFFFF_FF00));
        assert!(!record.matches_target(&mut no_load).unwrap());

        // Load into another register than the recorded output register
        let mut moved = mock_probe(
            MockTransport::new(0)
                .with_word(0x1000_1004, 0xFFFF_FF00)
                .with_load(0x114CC, Register::R5, Register::R4),
        );
        assert!(!record.matches_target(&mut moved).unwrap());
    }
}
