//! Gateway configuration parameters
//!
//! All tunables for the PLC link and the wireless connectivity manager.
//! Persisted as a postcard blob through [`ConfigPort`](crate::app::ports::ConfigPort);
//! a missing blob means defaults.

use core::time::Duration;

use serde::{Deserialize, Serialize};

use crate::plc::transport::TransportTiming;
use crate::wifi::credentials::AccessPointConfig;
use crate::wifi::sequencer::WifiPolicy;

/// Core gateway configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    // --- PLC UART ---
    /// UART baud rate (8 data bits, even parity, 1 stop bit)
    pub uart_baud_rate: u32,
    pub uart_tx_pin: u8,
    pub uart_rx_pin: u8,

    // --- Exchange policy ---
    /// Write attempts before `LinkWriteFailed`
    pub write_attempts: u8,
    /// Whole-exchange attempts before `ResponseTimeout`
    pub exchange_attempts: u8,
    /// One wait slice (milliseconds)
    pub response_slice_ms: u32,
    /// Wait slices per exchange attempt
    pub response_slices: u32,

    // --- PLC module ---
    /// Channel constant sent with every output-control command
    pub output_channel: u8,
    /// Pause before each module-init retry (milliseconds)
    pub init_retry_delay_ms: u32,

    // --- WiFi ---
    pub max_reconnect_attempts: u32,
    /// Delay before pushing a new or erased configuration (milliseconds)
    pub settle_delay_ms: u32,

    // --- Provisioning soft-AP ---
    pub ap_ssid: heapless::String<32>,
    pub ap_password: heapless::String<64>,
    pub ap_channel: u8,
    pub ap_max_stations: u8,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            // UART
            uart_baud_rate: 115_200,
            uart_tx_pin: 22,
            uart_rx_pin: 23,

            // Exchange policy: 5 × 20 × 100 ms worst case
            write_attempts: 5,
            exchange_attempts: 5,
            response_slice_ms: 100,
            response_slices: 20,

            // PLC module
            output_channel: 1,
            init_retry_delay_ms: 1000,

            // WiFi
            max_reconnect_attempts: 5,
            settle_delay_ms: 3000,

            // Soft-AP
            ap_ssid: truncated("PowerLine"),
            ap_password: truncated("utfpr_123456"),
            ap_channel: 2,
            ap_max_stations: 5,
        }
    }
}

impl GatewayConfig {
    pub fn transport_timing(&self) -> TransportTiming {
        TransportTiming {
            write_attempts: u32::from(self.write_attempts),
            exchange_attempts: u32::from(self.exchange_attempts),
            wait_slice: Duration::from_millis(u64::from(self.response_slice_ms)),
            wait_slices: self.response_slices,
        }
    }

    pub fn wifi_policy(&self) -> WifiPolicy {
        WifiPolicy {
            max_reconnect_attempts: self.max_reconnect_attempts,
            settle_delay: Duration::from_millis(u64::from(self.settle_delay_ms)),
        }
    }

    pub fn access_point(&self) -> AccessPointConfig {
        AccessPointConfig {
            ssid: self.ap_ssid.clone(),
            password: self.ap_password.clone(),
            channel: self.ap_channel,
            max_stations: self.ap_max_stations,
        }
    }

    pub fn init_retry_delay(&self) -> Duration {
        Duration::from_millis(u64::from(self.init_retry_delay_ms))
    }
}

/// Copy `s` into a fixed-capacity string, cutting at the last char
/// boundary that fits.
pub(crate) fn truncated<const N: usize>(s: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    for ch in s.chars() {
        if out.push(ch).is_err() {
            break;
        }
    }
    out
}
