use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, trace};

use crate::error::{Error, Result};
use crate::gadget::GadgetCandidate;
use crate::oracle::KnownMarker;
use crate::probe::Probe;
use crate::registers::Register;
use crate::session::Transport;

/// Thumb instructions are halfword aligned.
pub const INSTRUCTION_ALIGNMENT: u32 = 2;

/// Default number of bytes scanned past the reset `pc` (256 KiB)
pub const DEFAULT_SCAN_WINDOW: u32 = 0x4_0000;

/// Where the instruction scan gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanLimit {
    /// Scan at most this many bytes past the start address.
    Window(u32),
    /// Scan up to and including this address.
    UpTo(u32),
}

impl ScanLimit {
    /// Last address (inclusive) to try for a scan starting at `start`.
    pub fn end_for(&self, start: u32) -> u32 {
        match *self {
            Self::Window(bytes) => start.saturating_add(bytes),
            Self::UpTo(end) => end,
        }
    }
}

impl Default for ScanLimit {
    fn default() -> Self {
        Self::Window(DEFAULT_SCAN_WINDOW)
    }
}

/// Scans instruction addresses for one that loads the marker into a register.
pub struct GadgetFinder<'a, T: Transport> {
    probe: &'a mut Probe<T>,
    marker: KnownMarker,
    limit: ScanLimit,
}

impl<'a, T: Transport> GadgetFinder<'a, T> {
    pub fn new(probe: &'a mut Probe<T>, marker: KnownMarker) -> Self {
        Self {
            probe,
            marker,
            limit: ScanLimit::default(),
        }
    }

    pub fn with_limit(mut self, limit: ScanLimit) -> Self {
        self.limit = limit;
        self
    }

    /// Reset, halt and scan upward from the reset `pc` in
    /// [`INSTRUCTION_ALIGNMENT`] steps. The lowest matching address wins.
    ///
    /// Polls `cancel` between addresses and returns
    /// [`Error::Interrupted`] once it is set.
    pub fn find(&mut self, cancel: &AtomicBool) -> Result<GadgetCandidate> {
        info!("Searching for usable instruction...");
        self.probe.reset_halt()?;
        let start = self.probe.read_register(Register::Pc)?;
        let end = self.limit.end_for(start);
        if end < start {
            return Err(Error::GadgetNotFound { start, end });
        }
        info!("Scanning 0x{:08X}..=0x{:08X}", start, end);

        let mut pc = start;
        loop {
            if cancel.load(Ordering::SeqCst) {
                return Err(Error::Interrupted);
            }

            if let Some(output_register) = self.try_address(pc)? {
                info!(
                    "Known value found in register {} for pc = 0x{:08X}",
                    output_register, pc
                );
                return Ok(GadgetCandidate {
                    instruction_address: pc,
                    output_register,
                });
            }

            pc = match pc.checked_add(INSTRUCTION_ALIGNMENT) {
                Some(next) if next <= end => next,
                _ => return Err(Error::GadgetNotFound { start, end }),
            };
        }
    }

    /// Prime every register with the marker address, execute the instruction
    /// at `pc` and report which register (if any) now holds the marker value.
    pub fn try_address(&mut self, pc: u32) -> Result<Option<Register>> {
        debug!("pc = 0x{:08X}", pc);
        self.probe.set_all_registers(self.marker.address)?;
        self.probe.step_at(pc)?;
        let dump = self.probe.read_all_registers()?;
        trace!("Registers after step:\n{}", dump.text());
        Ok(dump.find_value(self.marker.value))
    }
}
