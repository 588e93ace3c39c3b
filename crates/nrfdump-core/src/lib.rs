//! # nrfdump
//!
//! Firmware extraction from read-back protected nRF51 parts through an
//! OpenOCD telnet session.
//!
//! With the core halted, the debugger may still write registers and
//! single-step, but not read protected memory. This crate:
//! - reads a known marker word from UICR ([`KnownMarker`])
//! - scans for an instruction that loads the marker into a register
//!   ([`GadgetFinder`])
//! - works out which register carries the address ([`InputResolver`])
//! - replays that instruction once per word to dump memory ([`DumpEngine`])
//!
//! Executing arbitrary instructions on the target can misconfigure it.

pub mod config;
pub mod dump;
pub mod error;
pub mod gadget;
pub mod oracle;
pub mod probe;
pub mod protocol;
pub mod registers;
pub mod session;

pub use config::{Config, ConfigBuilder};
pub use dump::{
    BinarySink, ConsoleSink, DumpCheckpoint, DumpEngine, DumpFile, DumpRange, DumpSummary,
    WORD_SIZE, WordSink,
};
pub use error::{Error, Result};
pub use gadget::{
    DEFAULT_GADGET_FILE, Gadget, GadgetCandidate, GadgetFinder, GadgetRecord, InputResolver,
    ScanLimit, StatusReport, discover,
};
pub use oracle::{DEFAULT_MARKER_ADDRESS, KnownMarker};
pub use probe::Probe;
pub use protocol::{Command, GRAMMAR_VERSION, RegisterDump};
pub use registers::{GENERAL, Register};
pub use session::{Session, SyncMode, TcpTransport, Transport};

/// Connect to the debug server described by `config` and consume its greeting.
pub fn connect(config: &Config) -> Result<Probe<TcpTransport>> {
    let transport = TcpTransport::connect(&config.host, config.port, config.read_timeout())?;
    let session = Session::open(transport, config.prompt.clone(), config.sync_mode())?;
    tracing::info!(
        "Connected to {}:{} ({})",
        config.host,
        config.port,
        session.banner().lines().next().unwrap_or("no banner").trim()
    );
    tracing::debug!("Response grammar {}", GRAMMAR_VERSION);
    Ok(Probe::new(session))
}
