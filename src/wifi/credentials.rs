//! Station credentials, soft-AP settings, and their persistence.

use log::{info, warn};

use crate::app::ports::{StorageError, StoragePort};
use crate::error::ConnectivityError;

pub const SSID_MAX_LEN: usize = 32;
pub const PASSWORD_MAX_LEN: usize = 64;
const PASSWORD_MIN_LEN: usize = 8;

pub const CREDENTIAL_NAMESPACE: &str = "storage";
pub const SSID_KEY: &str = "wifi_cfg_ssid";
pub const PASSWORD_KEY: &str = "wifi_cfg_pswd";

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

/// Every byte in `0x20..=0x7E` (space through tilde).
pub fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

pub fn validate_ssid(ssid: &str) -> Result<(), ConnectivityError> {
    if ssid.is_empty() || ssid.len() > SSID_MAX_LEN || !is_printable_ascii(ssid) {
        return Err(ConnectivityError::InvalidSsid);
    }
    Ok(())
}

/// Empty (open network) or 8–64 bytes for WPA2.
pub fn validate_password(password: &str) -> Result<(), ConnectivityError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < PASSWORD_MIN_LEN || password.len() > PASSWORD_MAX_LEN {
        return Err(ConnectivityError::InvalidPassword);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// Station configuration
// ───────────────────────────────────────────────────────────────

/// SSID + password pair. The default (empty SSID) means "no network".
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ConnectivityConfig {
    ssid: heapless::String<SSID_MAX_LEN>,
    password: heapless::String<PASSWORD_MAX_LEN>,
}

impl ConnectivityConfig {
    pub fn new(ssid: &str, password: &str) -> Result<Self, ConnectivityError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        Ok(Self {
            ssid: heapless::String::try_from(ssid).map_err(|()| ConnectivityError::InvalidSsid)?,
            password: heapless::String::try_from(password)
                .map_err(|()| ConnectivityError::InvalidPassword)?,
        })
    }

    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// No SSID: nothing to connect to.
    pub fn is_empty(&self) -> bool {
        self.ssid.is_empty()
    }

    pub fn is_open(&self) -> bool {
        self.password.is_empty()
    }
}

impl core::fmt::Debug for ConnectivityConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ConnectivityConfig")
            .field("ssid", &self.ssid.as_str())
            .field("password", &if self.is_open() { "" } else { "***" })
            .finish()
    }
}

/// Provisioning soft-AP settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPointConfig {
    pub ssid: heapless::String<SSID_MAX_LEN>,
    /// Empty means an open AP.
    pub password: heapless::String<PASSWORD_MAX_LEN>,
    pub channel: u8,
    pub max_stations: u8,
}

// ───────────────────────────────────────────────────────────────
// Credential persistence
// ───────────────────────────────────────────────────────────────

/// Station credentials in NVS, one key per field.
pub struct CredentialStore<S> {
    storage: S,
}

impl<S: StoragePort> CredentialStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    #[cfg(test)]
    pub(crate) fn storage(&self) -> &S {
        &self.storage
    }

    /// Stored credentials, or `None` unless both keys are present and valid.
    pub fn load(&self) -> Result<Option<ConnectivityConfig>, StorageError> {
        let mut ssid_buf = [0u8; SSID_MAX_LEN];
        let mut pass_buf = [0u8; PASSWORD_MAX_LEN];

        let ssid_len = match self.storage.read(CREDENTIAL_NAMESPACE, SSID_KEY, &mut ssid_buf) {
            Ok(n) => n,
            Err(StorageError::NotFound) => return Ok(None),
            Err(e) => return Err(e),
        };
        let pass_len = match self.storage.read(CREDENTIAL_NAMESPACE, PASSWORD_KEY, &mut pass_buf) {
            Ok(n) => n,
            Err(StorageError::NotFound) => return Ok(None),
            Err(e) => return Err(e),
        };

        let (Ok(ssid), Ok(password)) = (
            core::str::from_utf8(&ssid_buf[..ssid_len]),
            core::str::from_utf8(&pass_buf[..pass_len]),
        ) else {
            warn!("WiFi: stored credentials are not UTF-8, ignoring");
            return Ok(None);
        };

        match ConnectivityConfig::new(ssid, password) {
            Ok(cfg) => Ok(Some(cfg)),
            Err(e) => {
                warn!("WiFi: stored credentials invalid ({}), ignoring", e);
                Ok(None)
            }
        }
    }

    pub fn save(&mut self, config: &ConnectivityConfig) -> Result<(), StorageError> {
        self.storage
            .write(CREDENTIAL_NAMESPACE, SSID_KEY, config.ssid().as_bytes())?;
        self.storage
            .write(CREDENTIAL_NAMESPACE, PASSWORD_KEY, config.password().as_bytes())?;
        info!("WiFi: credentials for '{}' saved", config.ssid());
        Ok(())
    }

    pub fn erase(&mut self) -> Result<(), StorageError> {
        self.storage.delete(CREDENTIAL_NAMESPACE, SSID_KEY)?;
        self.storage.delete(CREDENTIAL_NAMESPACE, PASSWORD_KEY)?;
        info!("WiFi: stored credentials erased");
        Ok(())
    }
}
