//! WiFi driver adapter.
//!
//! Implements [`LinkControl`]: station configuration, connect/disconnect,
//! and the provisioning soft-AP. Connection outcomes are not reported
//! here: they arrive as [`NetEvent`]s through [`forward_net_events`].
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::wifi::EspWifi`, driven
//!   without blocking so the sequencer never waits on the radio.
//! - **all other targets**: simulation that records what it was asked to do.

use log::{info, warn};

use crate::app::ports::LinkControl;
use crate::error::ConnectivityError;
use crate::wifi::credentials::{AccessPointConfig, ConnectivityConfig};
#[cfg(target_os = "espidf")]
use crate::wifi::NetEvent;

#[cfg(target_os = "espidf")]
use esp_idf_svc::{
    eventloop::{EspSubscription, EspSystemEventLoop, System},
    hal::modem::Modem,
    netif::IpEvent,
    nvs::EspDefaultNvsPartition,
    sys::EspError,
    wifi::{
        AccessPointConfiguration, AuthMethod, ClientConfiguration, Configuration, EspWifi,
        WifiEvent,
    },
};

// ───────────────────────────────────────────────────────────────
// ESP-IDF driver
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub struct WifiAdapter {
    wifi: EspWifi<'static>,
    /// Soft-AP kept alongside the station once provisioning opened it.
    access_point: Option<AccessPointConfiguration>,
}

#[cfg(target_os = "espidf")]
impl WifiAdapter {
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: EspDefaultNvsPartition,
    ) -> Result<Self, EspError> {
        let wifi = EspWifi::new(modem, sysloop, Some(nvs))?;
        info!("WiFi(espidf): driver initialised");
        Ok(Self {
            wifi,
            access_point: None,
        })
    }

    fn client_configuration(config: &ConnectivityConfig) -> Result<ClientConfiguration, ConnectivityError> {
        Ok(ClientConfiguration {
            ssid: config
                .ssid()
                .try_into()
                .map_err(|_| ConnectivityError::InvalidSsid)?,
            password: config
                .password()
                .try_into()
                .map_err(|_| ConnectivityError::InvalidPassword)?,
            auth_method: if config.is_open() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            },
            ..Default::default()
        })
    }

    fn apply(&mut self, client: ClientConfiguration) -> Result<(), ConnectivityError> {
        let configuration = match &self.access_point {
            Some(ap) => Configuration::Mixed(client, ap.clone()),
            None => Configuration::Client(client),
        };
        self.wifi.set_configuration(&configuration).map_err(|e| {
            warn!("WiFi(espidf): set_configuration failed ({})", e);
            ConnectivityError::ConfigRejected
        })?;
        if !self.wifi.is_started().unwrap_or(false) {
            self.wifi.start().map_err(|e| {
                warn!("WiFi(espidf): start failed ({})", e);
                ConnectivityError::ConfigRejected
            })?;
        }
        Ok(())
    }
}

#[cfg(target_os = "espidf")]
impl LinkControl for WifiAdapter {
    fn set_config(&mut self, config: &ConnectivityConfig) -> Result<(), ConnectivityError> {
        let client = Self::client_configuration(config)?;
        self.apply(client)
    }

    fn get_config(&self) -> ConnectivityConfig {
        let client = match self.wifi.get_configuration() {
            Ok(Configuration::Client(c)) | Ok(Configuration::Mixed(c, _)) => c,
            _ => return ConnectivityConfig::default(),
        };
        ConnectivityConfig::new(&client.ssid, &client.password).unwrap_or_default()
    }

    fn connect(&mut self) -> Result<(), ConnectivityError> {
        self.wifi.connect().map_err(|e| {
            warn!("WiFi(espidf): connect failed ({})", e);
            ConnectivityError::ConnectionFailed
        })
    }

    fn disconnect(&mut self) {
        if let Err(e) = self.wifi.disconnect() {
            // ESP_ERR_WIFI_NOT_STARTED / not connected: nothing to tear down.
            info!("WiFi(espidf): disconnect: {}", e);
        }
    }

    fn start_access_point(&mut self, ap: &AccessPointConfig) -> Result<(), ConnectivityError> {
        let configuration = AccessPointConfiguration {
            ssid: ap
                .ssid
                .as_str()
                .try_into()
                .map_err(|_| ConnectivityError::InvalidSsid)?,
            password: ap
                .password
                .as_str()
                .try_into()
                .map_err(|_| ConnectivityError::InvalidPassword)?,
            channel: ap.channel,
            max_connections: u16::from(ap.max_stations),
            auth_method: if ap.password.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            },
            ..Default::default()
        };
        self.access_point = Some(configuration);
        self.apply(ClientConfiguration::default())
    }
}

/// Forward station and IP events from the system event loop.
///
/// The returned subscriptions must be kept alive for as long as events
/// should flow.
#[cfg(target_os = "espidf")]
pub fn forward_net_events<F>(
    sysloop: &EspSystemEventLoop,
    on_event: F,
) -> Result<[EspSubscription<'static, System>; 2], EspError>
where
    F: Fn(NetEvent) + Clone + Send + 'static,
{
    let on_wifi = on_event.clone();
    let wifi = sysloop.subscribe::<WifiEvent, _>(move |event| match event {
        WifiEvent::StaConnected(_) => on_wifi(NetEvent::StaConnected),
        WifiEvent::StaDisconnected(_) => on_wifi(NetEvent::StaDisconnected),
        _ => {}
    })?;
    let ip = sysloop.subscribe::<IpEvent, _>(move |event| {
        if let IpEvent::DhcpIpAssigned(assignment) = event {
            info!("WiFi(espidf): got address {}", assignment.ip());
            on_event(NetEvent::GotAddress);
        }
    })?;
    Ok([wifi, ip])
}

// ───────────────────────────────────────────────────────────────
// Simulation
// ───────────────────────────────────────────────────────────────

/// Host-side stand-in for the radio.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default)]
pub struct WifiAdapter {
    config: ConnectivityConfig,
    access_point: Option<AccessPointConfig>,
    connected: bool,
    /// Refuse every `connect()` when set.
    pub refuse_connect: bool,
    pub connect_calls: u32,
    pub disconnect_calls: u32,
}

#[cfg(not(target_os = "espidf"))]
impl WifiAdapter {
    pub fn new() -> Self {
        info!("WiFi(sim): simulation backend");
        Self::default()
    }

    /// Whether a `connect()` was accepted since the last `disconnect()`.
    pub fn is_connecting(&self) -> bool {
        self.connected
    }

    pub fn access_point(&self) -> Option<&AccessPointConfig> {
        self.access_point.as_ref()
    }
}

#[cfg(not(target_os = "espidf"))]
impl LinkControl for WifiAdapter {
    fn set_config(&mut self, config: &ConnectivityConfig) -> Result<(), ConnectivityError> {
        self.config = config.clone();
        info!("WiFi(sim): station config '{}'", config.ssid());
        Ok(())
    }

    fn get_config(&self) -> ConnectivityConfig {
        self.config.clone()
    }

    fn connect(&mut self) -> Result<(), ConnectivityError> {
        self.connect_calls += 1;
        if self.config.is_empty() {
            return Err(ConnectivityError::NoCredentials);
        }
        if self.refuse_connect {
            warn!("WiFi(sim): connect to '{}' refused", self.config.ssid());
            return Err(ConnectivityError::ConnectionFailed);
        }
        self.connected = true;
        info!("WiFi(sim): connecting to '{}'", self.config.ssid());
        Ok(())
    }

    fn disconnect(&mut self) {
        self.disconnect_calls += 1;
        self.connected = false;
    }

    fn start_access_point(&mut self, ap: &AccessPointConfig) -> Result<(), ConnectivityError> {
        info!("WiFi(sim): soft-AP '{}' on channel {}", ap.ssid, ap.channel);
        self.access_point = Some(ap.clone());
        Ok(())
    }
}
