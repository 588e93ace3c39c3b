//! Memory dump through a resolved gadget.

mod output;
mod sink;

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::gadget::Gadget;
use crate::probe::Probe;
use crate::session::Transport;

pub use output::{DumpCheckpoint, DumpFile};
pub use sink::{BinarySink, ConsoleSink, WordSink};

/// Bytes per dumped word
pub const WORD_SIZE: u32 = 4;

/// Log progress every this many words unless configured otherwise
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 1024;

/// Inclusive address range walked in [`WORD_SIZE`] steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DumpRange {
    from: u32,
    to: u32,
}

impl DumpRange {
    pub fn new(from: u32, to: u32) -> Result<Self> {
        if to < from {
            return Err(Error::InvalidRange { from, to });
        }
        Ok(Self { from, to })
    }

    pub fn from(&self) -> u32 {
        self.from
    }

    pub fn to(&self) -> u32 {
        self.to
    }

    /// `(to - from) / 4 + 1`
    pub fn word_count(&self) -> u64 {
        u64::from((self.to - self.from) / WORD_SIZE) + 1
    }

    pub fn byte_len(&self) -> u64 {
        self.word_count() * u64::from(WORD_SIZE)
    }

    pub fn addresses(&self) -> impl Iterator<Item = u32> + use<> {
        let from = self.from;
        (0..self.word_count()).map(move |i| from + (i as u32) * WORD_SIZE)
    }

    /// The range left after the first `words` words, or `None` if nothing is left.
    pub fn skip_words(&self, words: u64) -> Option<Self> {
        if words >= self.word_count() {
            return None;
        }
        Some(Self {
            from: self.from + (words as u32) * WORD_SIZE,
            to: self.to,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DumpSummary {
    pub range: DumpRange,
    pub words: u64,
}

/// Replays a gadget once per word.
///
/// The gadget is not re-verified while dumping.
pub struct DumpEngine<'a, T: Transport> {
    probe: &'a mut Probe<T>,
    gadget: Gadget,
    progress_interval: u64,
}

impl<'a, T: Transport> DumpEngine<'a, T> {
    pub fn new(probe: &'a mut Probe<T>, gadget: Gadget) -> Self {
        Self {
            probe,
            gadget,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }

    pub fn with_progress_interval(mut self, words: u64) -> Self {
        self.progress_interval = words.max(1);
        self
    }

    /// Reset and halt once, then read every word of `range` into `sink`.
    ///
    /// Any error (including [`Error::Interrupted`]) leaves the words written
    /// so far in the sink, flushed.
    pub fn run<S: WordSink>(
        &mut self,
        range: DumpRange,
        sink: &mut S,
        cancel: &AtomicBool,
    ) -> Result<DumpSummary> {
        info!(
            "Dumping memory (0x{:08X} - 0x{:08X}, {} words)...",
            range.from(),
            range.to(),
            range.word_count()
        );
        self.probe.reset_halt()?;

        let result = self.copy_words(range, sink, cancel);
        sink.flush()?;
        let words = result?;

        info!("Dump complete ({} bytes)", words * u64::from(WORD_SIZE));
        Ok(DumpSummary { range, words })
    }

    fn copy_words<S: WordSink>(
        &mut self,
        range: DumpRange,
        sink: &mut S,
        cancel: &AtomicBool,
    ) -> Result<u64> {
        let total = range.word_count();
        let mut words = 0u64;

        for address in range.addresses() {
            if cancel.load(Ordering::SeqCst) {
                return Err(Error::Interrupted);
            }

            let value = self.read_word(address)?;
            debug!("0x{:08X}: 0x{:08X}", address, value);
            sink.write_word(address, value)?;
            words += 1;

            if words % self.progress_interval == 0 {
                info!(
                    "Progress: {}/{} words (at 0x{:08X})",
                    words, total, address
                );
            }
        }
        Ok(words)
    }

    /// Load `address` into the input register, execute the gadget and read
    /// the output register.
    pub fn read_word(&mut self, address: u32) -> Result<u32> {
        self.probe
            .write_register(self.gadget.input_register, address)?;
        self.probe.step_at(self.gadget.instruction_address)?;
        self.probe.read_register(self.gadget.output_register)
    }
}
