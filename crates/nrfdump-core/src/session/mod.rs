//! Request/response session with the debug server.

mod telnet;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

use std::thread;
use std::time::Duration;

use tracing::{debug, trace};

use crate::error::Result;

pub use telnet::{TcpTransport, TelnetFilter, find_subsequence};

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockTransport, Program};

/// Settle delay used by the fixed-delay mode unless configured otherwise (10 ms)
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(10);

/// A line-oriented channel that ends every response with a prompt.
pub trait Transport {
    /// Write one command line (the newline is appended here).
    fn send_line(&mut self, line: &str) -> Result<()>;

    /// Block until `prompt` has been received and return the text before it.
    fn read_until(&mut self, prompt: &str) -> Result<String>;
}

/// How a command's completion is awaited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Read straight through to the next prompt.
    Prompt,
    /// Sleep for the settle delay after writing, then read to the prompt.
    FixedDelay(Duration),
}

impl SyncMode {
    /// `0` selects prompt synchronization.
    pub fn from_settle_ms(ms: u64) -> Self {
        if ms == 0 {
            Self::Prompt
        } else {
            Self::FixedDelay(Duration::from_millis(ms))
        }
    }
}

impl Default for SyncMode {
    fn default() -> Self {
        Self::FixedDelay(DEFAULT_SETTLE_DELAY)
    }
}

/// One connection to the debug server.
///
/// All commands go through [`Session::command`]; the most recent raw
/// response is retained for diagnostics.
pub struct Session<T: Transport> {
    transport: T,
    prompt: String,
    sync: SyncMode,
    banner: String,
    last_response: String,
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T, prompt: impl Into<String>, sync: SyncMode) -> Self {
        Self {
            transport,
            prompt: prompt.into(),
            sync,
            banner: String::new(),
            last_response: String::new(),
        }
    }

    /// Create a session and consume the server greeting up to the first prompt.
    pub fn open(transport: T, prompt: impl Into<String>, sync: SyncMode) -> Result<Self> {
        let mut session = Self::new(transport, prompt, sync);
        session.banner = session.transport.read_until(&session.prompt)?;
        debug!("Server banner: {}", session.banner.trim());
        Ok(session)
    }

    /// Send one command and return its response without the prompt.
    pub fn command(&mut self, cmd: &str) -> Result<String> {
        trace!("CMD: {}", cmd);
        self.transport.send_line(cmd)?;

        if let SyncMode::FixedDelay(delay) = self.sync {
            thread::sleep(delay);
        }

        self.last_response = self.transport.read_until(&self.prompt)?;
        Ok(self.last_response.clone())
    }

    pub fn banner(&self) -> &str {
        &self.banner
    }

    pub fn last_response(&self) -> &str {
        &self.last_response
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}
