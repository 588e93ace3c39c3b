use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to connect to {0}")]
    Connection(String),

    #[error(
        "Unexpected response to `{command}` (expected {expected}, grammar {}): >{response}<",
        crate::protocol::GRAMMAR_VERSION
    )]
    ProtocolParse {
        command: String,
        expected: &'static str,
        response: String,
    },

    #[error("Marker value {value:#010x} at {address:#010x} cannot be told apart from the priming patterns")]
    AmbiguousMarker { address: u32, value: u32 },

    #[error("No usable instruction found in {start:#010x}..={end:#010x}")]
    GadgetNotFound { start: u32, end: u32 },

    #[error("Input register not found for instruction at {instruction_address:#010x}")]
    InputRegisterNotFound { instruction_address: u32 },

    #[error("Invalid dump range: {from:#010x}..={to:#010x}")]
    InvalidRange { from: u32, to: u32 },

    #[error("Cannot use {path}: {reason}")]
    DumpMismatch { path: String, reason: String },

    #[error("Invalid config: {0}")]
    Config(String),

    #[error("Interrupted")]
    Interrupted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error is a "file not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }

    /// Check if this error means a search ran out of candidates
    pub fn is_search_exhausted(&self) -> bool {
        matches!(
            self,
            Error::GadgetNotFound { .. } | Error::InputRegisterNotFound { .. }
        )
    }

    /// Raw server response attached to the error, if any
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Error::ProtocolParse { response, .. } => Some(response),
            _ => None,
        }
    }
}
