//! Error types for the PLC gateway firmware.
//!
//! Each subsystem owns a small `Copy` error enum. Command errors wrap the
//! transport error that caused them; the binary reports everything else
//! through `anyhow` at the top.

use core::fmt;

// ---------------------------------------------------------------------------
// Serial transport errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// The link refused the command bytes on every write attempt.
    LinkWriteFailed,
    /// No result line arrived within the exchange retry budget.
    ResponseTimeout,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LinkWriteFailed => write!(f, "link write failed"),
            Self::ResponseTimeout => write!(f, "response timeout"),
        }
    }
}

// ---------------------------------------------------------------------------
// Decode errors
// ---------------------------------------------------------------------------

/// Soft decode failures. Callers log and skip rather than abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// A data line did not carry the expected fields.
    MalformedResponse(&'static str),
    /// A fixed-capacity container is full; the entry was dropped.
    CapacityExceeded,
    /// The response already holds its result line.
    ResponseClosed,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedResponse(what) => write!(f, "malformed response: {what}"),
            Self::CapacityExceeded => write!(f, "capacity exceeded"),
            Self::ResponseClosed => write!(f, "response already complete"),
        }
    }
}

// ---------------------------------------------------------------------------
// PLC command errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// Output level outside 0–100.
    OutputOutOfRange(u32),
    /// Station address is not 12 hex digits.
    InvalidMac,
    /// The modem answered with ERROR/FAIL.
    Rejected,
    /// The exchange itself failed.
    Transport(TransportError),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutputOutOfRange(v) => write!(f, "output value {v} outside 0-100"),
            Self::InvalidMac => write!(f, "invalid station MAC"),
            Self::Rejected => write!(f, "modem rejected command"),
            Self::Transport(e) => write!(f, "{e}"),
        }
    }
}

impl From<TransportError> for CommandError {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

// ---------------------------------------------------------------------------
// Connectivity errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    /// The link layer refused a configuration push.
    ConfigRejected,
    ConnectionFailed,
    /// Credential persistence failed.
    Storage,
}

impl fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => write!(
                f,
                "password invalid (must be 8-64 bytes for WPA2, or empty for open)"
            ),
            Self::ConfigRejected => write!(f, "link layer rejected configuration"),
            Self::ConnectionFailed => write!(f, "WiFi connection failed"),
            Self::Storage => write!(f, "credential storage failed"),
        }
    }
}
