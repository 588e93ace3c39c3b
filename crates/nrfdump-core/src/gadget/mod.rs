//! Read gadget discovery.
//!
//! A gadget is one instruction that loads the word at the address held in
//! one register into another register, e.g. `ldr r3, [r5]`. Discovery runs
//! in two phases:
//!
//! 1. [`GadgetFinder`] scans instruction addresses from the reset `pc` and
//!    yields a [`GadgetCandidate`] (address and output register).
//! 2. [`InputResolver`] probes the candidate one register at a time to find
//!    the input register, completing the [`Gadget`].
//!
//! Neither phase can tell a genuine load from an instruction that happens to
//! leave the marker value in a register some other way.

mod cache;
mod finder;
mod resolver;

use std::fmt;
use std::sync::atomic::AtomicBool;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::oracle::KnownMarker;
use crate::probe::Probe;
use crate::registers::Register;
use crate::session::Transport;

pub use cache::{DEFAULT_GADGET_FILE, GadgetRecord};
pub use finder::{DEFAULT_SCAN_WINDOW, GadgetFinder, INSTRUCTION_ALIGNMENT, ScanLimit};
pub use resolver::InputResolver;

/// Output of the address scan; the input register is still unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GadgetCandidate {
    pub instruction_address: u32,
    pub output_register: Register,
}

/// A fully resolved read primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gadget {
    pub instruction_address: u32,
    pub input_register: Register,
    pub output_register: Register,
}

/// Human-readable summary of what discovery established.
#[derive(Debug, Clone, Copy)]
pub struct StatusReport {
    pub marker: KnownMarker,
    pub gadget: Gadget,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Known address: 0x{:08X}", self.marker.address)?;
        writeln!(f, "Known value at the address: 0x{:08X}", self.marker.value)?;
        writeln!(f, "Instruction address: 0x{:08X}", self.gadget.instruction_address)?;
        writeln!(f, "Register in: {}", self.gadget.input_register)?;
        write!(f, "Register out: {}", self.gadget.output_register)
    }
}

/// Run both discovery phases against an established marker.
pub fn discover<T: Transport>(
    probe: &mut Probe<T>,
    marker: KnownMarker,
    limit: ScanLimit,
    cancel: &AtomicBool,
) -> Result<Gadget> {
    let candidate = GadgetFinder::new(probe, marker)
        .with_limit(limit)
        .find(cancel)?;
    InputResolver::new(probe, marker).resolve(candidate)
}
