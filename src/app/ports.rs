//! Port traits: the hexagonal boundary between gateway logic and the outside world.
//!
//! ```text
//!   UART driver ──▶ SerialLink   ──▶ PlcTransport ──▶ CommandChannel ──▶ PlcService
//!   NVS         ──▶ StoragePort  ──▶ CredentialStore
//!   WiFi driver ──▶ LinkControl  ──▶ ConnectivitySequencer / ProvisioningStager
//! ```
//!
//! Driven adapters in [`crate::adapters`] implement these traits. The
//! domain consumes them via generics, so nothing above this line touches
//! ESP-IDF directly.
//!
//! ## Security notes
//!
//! - **ConfigPort** implementations MUST validate before persisting.
//! - **StoragePort** implementations SHOULD keep the credential namespace on
//!   the encrypted NVS partition.

use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::error::{ConnectivityError, TransportError};
use crate::plc::response::CommandResponse;
use crate::wifi::credentials::{AccessPointConfig, ConnectivityConfig};

// ───────────────────────────────────────────────────────────────
// Serial link (driven adapter: PLC UART)
// ───────────────────────────────────────────────────────────────

/// Raw byte link to the PLC modem.
///
/// Arrival notifications do not go through this trait; the adapter posts
/// [`UartEvent`](crate::plc::transport::UartEvent)s to the transport's
/// [`LinkEvents`](crate::plc::transport::LinkEvents) queue.
pub trait SerialLink: Send {
    /// Queue `bytes` for transmission. Returns how many bytes were accepted.
    fn write(&mut self, bytes: &[u8]) -> Result<usize, SerialError>;

    /// Copy up to `buf.len()` received bytes into `buf`.
    fn read(&mut self, buf: &mut [u8]) -> usize;

    /// Drop everything in the receive buffer.
    fn flush_input(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Command channel (transport → PLC service)
// ───────────────────────────────────────────────────────────────

/// One command/response exchange with the modem.
pub trait CommandChannel {
    /// Transmit `command` and fill `response` from the modem's reply.
    ///
    /// `Ok(())` means a result line was seen; check
    /// [`CommandResponse::success`] for OK vs ERROR/FAIL.
    fn send(&self, command: &str, response: &mut CommandResponse) -> Result<(), TransportError>;
}

impl<T: CommandChannel + ?Sized> CommandChannel for Arc<T> {
    fn send(&self, command: &str, response: &mut CommandResponse) -> Result<(), TransportError> {
        (**self).send(command, response)
    }
}

impl<T: CommandChannel + ?Sized> CommandChannel for &T {
    fn send(&self, command: &str, response: &mut CommandResponse) -> Result<(), TransportError> {
        (**self).send(command, response)
    }
}

// ───────────────────────────────────────────────────────────────
// Link-layer control (driven adapter: WiFi driver)
// ───────────────────────────────────────────────────────────────

/// Station/soft-AP control surface of the WiFi driver.
///
/// Connection outcomes arrive asynchronously as
/// [`NetEvent`](crate::wifi::NetEvent)s; `connect` only reports whether
/// the attempt could be started.
pub trait LinkControl: Send {
    /// Push a station configuration to the driver.
    fn set_config(&mut self, config: &ConnectivityConfig) -> Result<(), ConnectivityError>;

    /// The station configuration the driver currently holds.
    fn get_config(&self) -> ConnectivityConfig;

    /// Start a station connection attempt.
    fn connect(&mut self) -> Result<(), ConnectivityError>;

    fn disconnect(&mut self);

    /// Bring up the provisioning soft-AP.
    fn start_access_point(&mut self, ap: &AccessPointConfig) -> Result<(), ConnectivityError>;
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists gateway configuration.
///
/// # Security
///
/// Implementations MUST validate config values before persisting.
/// Invalid ranges are rejected with [`ConfigError::ValidationFailed`],
/// not clamped.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`GatewayConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<GatewayConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &GatewayConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage.
///
/// - Keys are namespaced to prevent collisions between subsystems.
/// - Write operations MUST be atomic. The ESP-IDF NVS API guarantees this
///   per `nvs_commit()`.
pub trait StoragePort: Send {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key.  Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`SerialLink::write`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialError {
    /// The driver's transmit buffer cannot take the bytes right now.
    BufferFull,
    /// Driver-level failure.
    Io,
}

/// Errors from [`ConfigPort`] operations.
#[derive(Debug)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
}

impl core::fmt::Display for SerialError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::BufferFull => write!(f, "transmit buffer full"),
            Self::Io => write!(f, "UART I/O error"),
        }
    }
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl From<StorageError> for ConnectivityError {
    fn from(_: StorageError) -> Self {
        Self::Storage
    }
}
