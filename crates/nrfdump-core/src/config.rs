//! Runtime configuration.
//!
//! Loaded from an optional TOML file; every field has a default, and the CLI
//! overrides individual fields through [`ConfigBuilder`].
//!
//! ```toml
//! host = "localhost"
//! port = 4444
//! settle_ms = 10
//! marker_address = 0x10001004
//! scan_window = 0x40000
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dump::DEFAULT_PROGRESS_INTERVAL;
use crate::error::{Error, Result};
use crate::gadget::{DEFAULT_SCAN_WINDOW, ScanLimit};
use crate::oracle::DEFAULT_MARKER_ADDRESS;
use crate::protocol::DEFAULT_PROMPT;
use crate::session::{DEFAULT_SETTLE_DELAY, SyncMode};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Debug server host
    pub host: String,
    /// Debug server telnet port
    pub port: u16,
    /// Prompt terminating each response
    pub prompt: String,
    /// Delay between writing a command and reading its response; 0 reads
    /// straight to the prompt
    pub settle_ms: u64,
    /// Socket read timeout; unset blocks indefinitely
    pub read_timeout_secs: Option<u64>,
    /// Address of the known marker word
    pub marker_address: u32,
    /// Bytes scanned past the reset pc
    pub scan_window: u32,
    /// Last scanned address; takes precedence over `scan_window`
    pub scan_end: Option<u32>,
    /// Words between progress log lines
    pub progress_interval: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 4444,
            prompt: DEFAULT_PROMPT.to_string(),
            settle_ms: DEFAULT_SETTLE_DELAY.as_millis() as u64,
            read_timeout_secs: None,
            marker_address: DEFAULT_MARKER_ADDRESS,
            scan_window: DEFAULT_SCAN_WINDOW,
            scan_end: None,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.prompt.is_empty() {
            return Err(Error::Config("prompt must not be empty".to_string()));
        }
        if self.progress_interval == 0 {
            return Err(Error::Config("progress_interval must be positive".to_string()));
        }
        Ok(())
    }

    pub fn sync_mode(&self) -> SyncMode {
        SyncMode::from_settle_ms(self.settle_ms)
    }

    pub fn scan_limit(&self) -> ScanLimit {
        match self.scan_end {
            Some(end) => ScanLimit::UpTo(end),
            None => ScanLimit::Window(self.scan_window),
        }
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_secs.map(Duration::from_secs)
    }
}

/// Builder for Config; unset fields keep the base value
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    base: Option<Config>,
    host: Option<String>,
    port: Option<u16>,
    settle_ms: Option<u64>,
    read_timeout_secs: Option<u64>,
    marker_address: Option<u32>,
    scan_window: Option<u32>,
    scan_end: Option<u32>,
}

impl ConfigBuilder {
    /// Start from a loaded config instead of the defaults
    pub fn base(mut self, config: Config) -> Self {
        self.base = Some(config);
        self
    }

    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn settle_ms(mut self, ms: u64) -> Self {
        self.settle_ms = Some(ms);
        self
    }

    pub fn read_timeout_secs(mut self, secs: u64) -> Self {
        self.read_timeout_secs = Some(secs);
        self
    }

    pub fn marker_address(mut self, address: u32) -> Self {
        self.marker_address = Some(address);
        self
    }

    pub fn scan_window(mut self, bytes: u32) -> Self {
        self.scan_window = Some(bytes);
        self
    }

    pub fn scan_end(mut self, address: u32) -> Self {
        self.scan_end = Some(address);
        self
    }

    pub fn build(self) -> Config {
        let base = self.base.unwrap_or_default();
        Config {
            host: self.host.unwrap_or(base.host),
            port: self.port.unwrap_or(base.port),
            prompt: base.prompt,
            settle_ms: self.settle_ms.unwrap_or(base.settle_ms),
            read_timeout_secs: self.read_timeout_secs.or(base.read_timeout_secs),
            marker_address: self.marker_address.unwrap_or(base.marker_address),
            scan_window: self.scan_window.unwrap_or(base.scan_window),
            scan_end: self.scan_end.or(base.scan_end),
            progress_interval: base.progress_interval,
        }
    }
}
