//! PLC Gateway Firmware: Main Entry Point
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  UartLink          NvsAdapter          WifiAdapter             │
//! │  (SerialLink)      (Config+Storage)    (LinkControl)           │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │  PlcTransport ─▶ PlcService        Connectivity        │    │
//! │  │  [plc-rx]        [plc-init]        [wifi-seq][wifi-prov]│   │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Supervisor loop: periodic topology survey                     │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use core::time::Duration;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use log::{info, warn};

use plcgateway::adapters::nvs::NvsAdapter;
use plcgateway::adapters::uart::{UartLink, UartSettings};
use plcgateway::adapters::wifi::{self as wifi_adapter, WifiAdapter};
use plcgateway::app::ports::ConfigPort;
use plcgateway::config::GatewayConfig;
use plcgateway::drivers::task_pin::Core;
use plcgateway::plc::bringup;
use plcgateway::plc::{LinkEvents, PlcService, PlcTransport};
use plcgateway::wifi::Connectivity;

const INIT_TASK_PRIORITY: u8 = 5;
const INIT_TASK_STACK_KB: usize = 4;
const TOPOLOGY_SURVEY_INTERVAL: Duration = Duration::from_secs(60);

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  PLC Gateway v{}                    ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let nvs = NvsAdapter::new().map_err(|e| anyhow!("NVS init failed: {}", e))?;
    let config = match nvs.load() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            GatewayConfig::default()
        }
    };

    // ── 3. PLC link ───────────────────────────────────────────
    let events = Arc::new(LinkEvents::new());
    let link = UartLink::open(
        UartSettings {
            baud_rate: config.uart_baud_rate,
            tx_pin: config.uart_tx_pin,
            rx_pin: config.uart_rx_pin,
        },
        Arc::clone(&events),
    )?;
    let (transport, receiver) = PlcTransport::new(link, events, config.transport_timing());
    let _rx_task = receiver.spawn()?;

    let plc = Arc::new(PlcService::new(transport, config.output_channel));
    let _init_task = bringup::bring_up(Arc::clone(&plc), config.init_retry_delay()).spawn(
        Core::App,
        INIT_TASK_PRIORITY,
        INIT_TASK_STACK_KB,
    )?;

    // ── 4. WiFi connectivity ──────────────────────────────────
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let partition = EspDefaultNvsPartition::take()?;
    let wifi = WifiAdapter::new(peripherals.modem, sysloop.clone(), partition)?;

    let connectivity = Connectivity::new(wifi, nvs, config.wifi_policy(), config.access_point());
    let net = connectivity.handle();
    let _subscriptions = wifi_adapter::forward_net_events(&sysloop, move |event| {
        net.on_net_event(event);
    })?;
    let (connectivity, _wifi_tasks) = connectivity.start()?;

    info!("System ready. Entering supervisor loop.");

    // ── 5. Supervisor loop ────────────────────────────────────
    loop {
        std::thread::sleep(TOPOLOGY_SURVEY_INTERVAL);

        match plc.get_topology() {
            Ok(scan) => match scan.topology.to_json() {
                Ok(json) => info!("Topology ({:?}): {}", connectivity.state(), json),
                Err(e) => warn!("Topology: encoding failed ({})", e),
            },
            Err(e) => warn!("Topology survey failed: {}", e),
        }
    }
}
