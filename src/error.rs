//! A dedicated error type for everything that can go wrong talking to
//! wpa_supplicant, encoding/decoding ANQP/DNS-SD frames, or pinging peers.
use std::fmt;
use std::io;

/// Codec-level error kinds (ANQP/DNS-SD, §4.1).
#[derive(Debug)]
pub enum CodecError {
    UnsupportedVersion(u8),
    UnsupportedProtocol(u8),
    UnknownType(u16),
    LabelTooLong(usize),
    MalformedName(String),
    TruncatedInput,
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::UnsupportedVersion(v) => write!(f, "unsupported version {}", v),
            CodecError::UnsupportedProtocol(p) => write!(f, "unsupported protocol type {}", p),
            CodecError::UnknownType(t) => write!(f, "unknown ANQP type {}", t),
            CodecError::LabelTooLong(n) => write!(f, "domain name label too long ({} bytes)", n),
            CodecError::MalformedName(s) => write!(f, "malformed domain name: {}", s),
            CodecError::TruncatedInput => write!(f, "truncated input"),
        }
    }
}

impl std::error::Error for CodecError {}

/// Top-level error type, one variant family per §7 taxonomy entry.
#[derive(Debug)]
pub enum Error {
    /// Socket send/receive/connect failure.
    Transport(io::Error),
    /// A request, attach, or detach exceeded its deadline.
    Timeout,
    /// wpa_supplicant replied with `FAIL` or an unexpected literal.
    CommandFailed(String),
    /// A control-socket line could not be parsed.
    ParseError(String),
    /// `SET_NETWORK`/`create_network` given a key not in the parameter table.
    UnsupportedParameter(String),
    /// A quoted event value was missing its closing quote.
    MalformedQuotedValue,
    /// ANQP/DNS-SD codec error.
    Codec(CodecError),
    /// The client has already been stopped.
    Stopped,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Transport(e) => write!(f, "transport error: {}", e),
            Error::Timeout => write!(f, "operation timed out"),
            Error::CommandFailed(reply) => write!(f, "command failed: {}", reply),
            Error::ParseError(s) => write!(f, "parse error: {}", s),
            Error::UnsupportedParameter(name) => write!(f, "unsupported parameter {}", name),
            Error::MalformedQuotedValue => write!(f, "run-away quoted value"),
            Error::Codec(e) => write!(f, "codec error: {}", e),
            Error::Stopped => write!(f, "client is stopped"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Transport(e) => Some(e),
            Error::Codec(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Transport(err)
    }
}

impl From<CodecError> for Error {
    fn from(err: CodecError) -> Self {
        Error::Codec(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
