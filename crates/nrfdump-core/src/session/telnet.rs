//! TCP transport for the OpenOCD telnet server.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use tracing::debug;

use crate::error::{Error, Result};
use crate::session::Transport;

/// Internal read buffer size.
const BUF_SIZE: usize = 4096;

const IAC: u8 = 255;
const DONT: u8 = 254;
const DO: u8 = 253;
const WONT: u8 = 252;
const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum FilterState {
    #[default]
    Data,
    Iac,
    Negotiate(u8),
    Sub,
    SubIac,
}

/// Strips telnet negotiation from the byte stream and refuses every option.
///
/// Sequences may be split across reads; state carries over between calls.
#[derive(Debug, Default)]
pub struct TelnetFilter {
    state: FilterState,
}

impl TelnetFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append payload bytes of `input` to `data` and refusals to `replies`.
    pub fn feed(&mut self, input: &[u8], data: &mut Vec<u8>, replies: &mut Vec<u8>) {
        for &byte in input {
            self.state = match (self.state, byte) {
                (FilterState::Data, IAC) => FilterState::Iac,
                (FilterState::Data, b) => {
                    data.push(b);
                    FilterState::Data
                }
                (FilterState::Iac, IAC) => {
                    data.push(IAC);
                    FilterState::Data
                }
                (FilterState::Iac, cmd @ (DO | DONT | WILL | WONT)) => FilterState::Negotiate(cmd),
                (FilterState::Iac, SB) => FilterState::Sub,
                (FilterState::Iac, _) => FilterState::Data,
                (FilterState::Negotiate(cmd), option) => {
                    match cmd {
                        DO => replies.extend_from_slice(&[IAC, WONT, option]),
                        WILL => replies.extend_from_slice(&[IAC, DONT, option]),
                        _ => {}
                    }
                    FilterState::Data
                }
                (FilterState::Sub, IAC) => FilterState::SubIac,
                (FilterState::Sub, _) => FilterState::Sub,
                (FilterState::SubIac, SE) => FilterState::Data,
                (FilterState::SubIac, _) => FilterState::Sub,
            };
        }
    }
}

/// Telnet connection to the debug server.
pub struct TcpTransport {
    stream: TcpStream,
    filter: TelnetFilter,
    buffer: Vec<u8>,
}

impl TcpTransport {
    /// Connect to `host:port`.
    ///
    /// Without `read_timeout`, a server that never prompts blocks forever.
    pub fn connect(host: &str, port: u16, read_timeout: Option<Duration>) -> Result<Self> {
        let stream = TcpStream::connect((host, port))
            .map_err(|e| Error::Connection(format!("{}:{} ({})", host, port, e)))?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(read_timeout)?;
        debug!("Connected to {}:{}", host, port);

        Ok(Self {
            stream,
            filter: TelnetFilter::new(),
            buffer: Vec::new(),
        })
    }

    fn fill_buffer(&mut self) -> Result<()> {
        let mut tmp = [0u8; BUF_SIZE];
        let n = self.stream.read(&mut tmp)?;
        if n == 0 {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "debug server closed the connection",
            )));
        }

        let mut replies = Vec::new();
        self.filter.feed(&tmp[..n], &mut self.buffer, &mut replies);
        if !replies.is_empty() {
            self.stream.write_all(&replies)?;
        }
        Ok(())
    }
}

impl Transport for TcpTransport {
    fn send_line(&mut self, line: &str) -> Result<()> {
        self.stream.write_all(line.as_bytes())?;
        self.stream.write_all(b"\n")?;
        self.stream.flush()?;
        Ok(())
    }

    fn read_until(&mut self, prompt: &str) -> Result<String> {
        let delim = prompt.as_bytes();
        loop {
            if let Some(pos) = find_subsequence(&self.buffer, delim) {
                let text: Vec<u8> = self.buffer.drain(..pos + delim.len()).take(pos).collect();
                return Ok(String::from_utf8_lossy(&text).replace('\r', ""));
            }
            self.fill_buffer()?;
        }
    }
}

/// Find a subsequence (delimiter) in a byte slice.
pub fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
