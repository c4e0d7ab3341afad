//! NVS-backed configuration and credential storage.
//!
//! Gateway config is one postcard blob under `plcgw/gwcfg`; station
//! credentials use the `storage` namespace through [`StoragePort`]. Both
//! ports sit on the same three blob primitives, so the device and the
//! simulation backend differ only below them.

use crate::app::ports::{ConfigError, ConfigPort, StorageError, StoragePort};
use crate::config::GatewayConfig;
use crate::wifi::credentials::{is_printable_ascii, validate_password};
use log::{info, warn};

#[cfg(not(target_os = "espidf"))]
use std::{cell::RefCell, collections::HashMap};

const CONFIG_NAMESPACE: &str = "plcgw";
const CONFIG_KEY: &str = "gwcfg";

/// Largest config blob accepted from flash.
const MAX_BLOB_SIZE: usize = 512;

/// Raw ESP-IDF NVS calls. Errors stay as `esp_err_t` until the port edge.
#[cfg(target_os = "espidf")]
mod flash {
    use crate::app::ports::StorageError;
    use esp_idf_svc::sys::*;
    use log::warn;

    /// NVS namespace and key names are limited to 15 characters.
    const NAME_MAX: usize = 15;

    fn c_name(name: &str) -> [u8; NAME_MAX + 1] {
        let mut buf = [0u8; NAME_MAX + 1];
        let len = name.len().min(NAME_MAX);
        buf[..len].copy_from_slice(&name.as_bytes()[..len]);
        buf
    }

    fn check(ret: esp_err_t) -> Result<(), esp_err_t> {
        if ret == ESP_OK { Ok(()) } else { Err(ret) }
    }

    pub fn storage_error(ret: esp_err_t) -> StorageError {
        if ret == ESP_ERR_NVS_NOT_FOUND {
            StorageError::NotFound
        } else if ret == ESP_ERR_NVS_NOT_ENOUGH_SPACE {
            StorageError::Full
        } else {
            StorageError::IoError
        }
    }

    pub fn init() -> Result<(), esp_err_t> {
        // SAFETY: called once from the main task before any other NVS use.
        let ret = unsafe { nvs_flash_init() };
        if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
            warn!("NVS: erasing and re-initialising flash partition");
            check(unsafe { nvs_flash_erase() })?;
            return check(unsafe { nvs_flash_init() });
        }
        check(ret)
    }

    /// Open `namespace`, run `f`, commit if writable, close.
    fn with_namespace<T>(
        namespace: &str,
        write: bool,
        f: impl FnOnce(nvs_handle_t) -> Result<T, esp_err_t>,
    ) -> Result<T, esp_err_t> {
        let ns = c_name(namespace);
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };
        let mut handle: nvs_handle_t = 0;
        check(unsafe { nvs_open(ns.as_ptr().cast(), mode, &mut handle) })?;
        let result = f(handle).and_then(|value| {
            if write {
                check(unsafe { nvs_commit(handle) })?;
            }
            Ok(value)
        });
        unsafe { nvs_close(handle) };
        result
    }

    pub fn get(namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, esp_err_t> {
        with_namespace(namespace, false, |handle| {
            let key = c_name(key);
            let mut len = buf.len();
            check(unsafe {
                nvs_get_blob(handle, key.as_ptr().cast(), buf.as_mut_ptr().cast(), &mut len)
            })?;
            Ok(len)
        })
    }

    pub fn set(namespace: &str, key: &str, data: &[u8]) -> Result<(), esp_err_t> {
        with_namespace(namespace, true, |handle| {
            let key = c_name(key);
            check(unsafe {
                nvs_set_blob(handle, key.as_ptr().cast(), data.as_ptr().cast(), data.len())
            })
        })
    }

    pub fn erase(namespace: &str, key: &str) -> Result<(), esp_err_t> {
        let result = with_namespace(namespace, true, |handle| {
            let key = c_name(key);
            match unsafe { nvs_erase_key(handle, key.as_ptr().cast()) } {
                ret if ret == ESP_ERR_NVS_NOT_FOUND => Ok(()),
                ret => check(ret),
            }
        });
        // A namespace that was never created has nothing to erase.
        match result {
            Err(ret) if ret == ESP_ERR_NVS_NOT_FOUND => Ok(()),
            other => other,
        }
    }
}

pub struct NvsAdapter {
    /// `(namespace, key)` → blob.
    #[cfg(not(target_os = "espidf"))]
    store: RefCell<HashMap<(String, String), Vec<u8>>>,
}

impl NvsAdapter {
    /// Initialise NVS flash.
    ///
    /// On first boot or after a version mismatch the partition is erased
    /// and re-initialised automatically.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            flash::init().map_err(|e| {
                warn!("NVS: init failed ({})", e);
                ConfigError::IoError
            })?;
            info!("NvsAdapter: ESP-IDF NVS initialised");
            Ok(Self {})
        }

        #[cfg(not(target_os = "espidf"))]
        {
            info!("NvsAdapter: simulation backend");
            Ok(Self {
                store: RefCell::new(HashMap::new()),
            })
        }
    }

    fn get_blob(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        #[cfg(target_os = "espidf")]
        {
            flash::get(namespace, key, buf).map_err(flash::storage_error)
        }

        #[cfg(not(target_os = "espidf"))]
        {
            let store = self.store.borrow();
            let data = store
                .get(&(namespace.to_owned(), key.to_owned()))
                .ok_or(StorageError::NotFound)?;
            let len = data.len().min(buf.len());
            buf[..len].copy_from_slice(&data[..len]);
            Ok(len)
        }
    }

    fn set_blob(&self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        #[cfg(target_os = "espidf")]
        {
            flash::set(namespace, key, data).map_err(flash::storage_error)
        }

        #[cfg(not(target_os = "espidf"))]
        {
            self.store
                .borrow_mut()
                .insert((namespace.to_owned(), key.to_owned()), data.to_vec());
            Ok(())
        }
    }

    fn erase_blob(&self, namespace: &str, key: &str) -> Result<(), StorageError> {
        #[cfg(target_os = "espidf")]
        {
            flash::erase(namespace, key).map_err(flash::storage_error)
        }

        #[cfg(not(target_os = "espidf"))]
        {
            self.store
                .borrow_mut()
                .remove(&(namespace.to_owned(), key.to_owned()));
            Ok(())
        }
    }
}

/// Range-check every field before it reaches flash.
pub fn validate_config(cfg: &GatewayConfig) -> Result<(), ConfigError> {
    if !(9_600..=921_600).contains(&cfg.uart_baud_rate) {
        return Err(ConfigError::ValidationFailed(
            "uart_baud_rate must be 9600–921600",
        ));
    }
    if cfg.uart_tx_pin == cfg.uart_rx_pin {
        return Err(ConfigError::ValidationFailed(
            "uart_tx_pin and uart_rx_pin must differ",
        ));
    }
    if !(1..=10).contains(&cfg.write_attempts) {
        return Err(ConfigError::ValidationFailed("write_attempts must be 1–10"));
    }
    if !(1..=10).contains(&cfg.exchange_attempts) {
        return Err(ConfigError::ValidationFailed(
            "exchange_attempts must be 1–10",
        ));
    }
    if !(10..=1000).contains(&cfg.response_slice_ms) {
        return Err(ConfigError::ValidationFailed(
            "response_slice_ms must be 10–1000",
        ));
    }
    if !(1..=100).contains(&cfg.response_slices) {
        return Err(ConfigError::ValidationFailed(
            "response_slices must be 1–100",
        ));
    }
    if !(1..=13).contains(&cfg.ap_channel) {
        return Err(ConfigError::ValidationFailed("ap_channel must be 1–13"));
    }
    if !(1..=10).contains(&cfg.ap_max_stations) {
        return Err(ConfigError::ValidationFailed(
            "ap_max_stations must be 1–10",
        ));
    }
    if cfg.ap_ssid.is_empty() || !is_printable_ascii(&cfg.ap_ssid) {
        return Err(ConfigError::ValidationFailed(
            "ap_ssid must be 1–32 printable characters",
        ));
    }
    if validate_password(&cfg.ap_password).is_err() {
        return Err(ConfigError::ValidationFailed(
            "ap_password must be empty or 8–64 characters",
        ));
    }
    Ok(())
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<GatewayConfig, ConfigError> {
        let mut buf = [0u8; MAX_BLOB_SIZE];
        match self.get_blob(CONFIG_NAMESPACE, CONFIG_KEY, &mut buf) {
            Ok(len) => {
                let cfg = postcard::from_bytes(&buf[..len]).map_err(|_| ConfigError::Corrupted)?;
                info!("NvsAdapter: loaded config ({} bytes)", len);
                Ok(cfg)
            }
            Err(StorageError::NotFound) => {
                info!("NvsAdapter: no stored config, using defaults");
                Ok(GatewayConfig::default())
            }
            Err(e) => {
                warn!("NvsAdapter: config read failed ({:?}), using defaults", e);
                Ok(GatewayConfig::default())
            }
        }
    }

    fn save(&self, config: &GatewayConfig) -> Result<(), ConfigError> {
        validate_config(config)?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        self.set_blob(CONFIG_NAMESPACE, CONFIG_KEY, &bytes).map_err(|e| {
            warn!("NvsAdapter: config write failed ({:?})", e);
            ConfigError::IoError
        })?;
        info!("NvsAdapter: config saved ({} bytes)", bytes.len());
        Ok(())
    }
}

impl StoragePort for NvsAdapter {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        self.get_blob(namespace, key, buf)
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.set_blob(namespace, key, data)
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.erase_blob(namespace, key)
    }
}
