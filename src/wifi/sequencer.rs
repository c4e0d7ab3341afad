//! Wireless connectivity sequencer.
//!
//! ```text
//!            Connect ──(stored creds)──▶ Connecting ──Connected──▶ Connected
//!               │                            │                        │
//!          (no creds)                   Disconnected ◀────────────────┘
//!               ▼                            ▼
//!        Provisioning (AP)            Reconnecting ── n < max ──▶ connect()
//!                                            │
//!                                       n == max ──▶ Connect
//! ```
//!
//! No transition is fatal. A connect attempt the driver refuses outright
//! is logged and left alone: the next station disconnect event drives the
//! following attempt, and the reconnect counter bounds those before the
//! flow is re-evaluated from `Connect`.
//!
//! The sequencer is the only writer of the active configuration. Requests
//! from other tasks wait in `WifiContext::requested` until
//! `RestartProvisioning` adopts them.

use core::time::Duration;
use std::sync::Arc;

use log::{debug, info, warn};

use crate::app::ports::{LinkControl, StoragePort};
use crate::signals::{Signal, SignalGroup, SignalHandler};
use crate::sync::lock;
use crate::wifi::credentials::ConnectivityConfig;
use crate::wifi::provisioning::ProvisionSignal;
use crate::wifi::SharedContext;

pub const TASK_NAME: &str = "wifi-seq\0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiSignal {
    /// Link layer reports an address: the station is up.
    Connected,
    /// Link layer lost the station connection.
    Disconnected,
    /// Evaluate stored credentials and connect or provision.
    Connect,
    /// Retry the current credentials.
    Reconnect,
    /// Push a newly requested configuration.
    RestartProvisioning,
    /// Forget stored credentials.
    ResetToDefault,
}

impl Signal for WifiSignal {
    const TABLE: &'static [Self] = &[
        Self::Connected,
        Self::Disconnected,
        Self::Connect,
        Self::Reconnect,
        Self::RestartProvisioning,
        Self::ResetToDefault,
    ];

    fn index(self) -> u32 {
        self as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Provisioning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WifiPolicy {
    /// Direct reconnects before re-evaluating from `Connect`.
    pub max_reconnect_attempts: u32,
    /// Pause before pushing a new or erased configuration.
    pub settle_delay: Duration,
}

impl Default for WifiPolicy {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: 5,
            settle_delay: Duration::from_secs(3),
        }
    }
}

pub struct ConnectivitySequencer<L, S> {
    ctx: SharedContext<L, S>,
    signals: Arc<SignalGroup<WifiSignal>>,
    provisioning: Arc<SignalGroup<ProvisionSignal>>,
    policy: WifiPolicy,
    reconnect_attempts: u32,
}

impl<L: LinkControl, S: StoragePort> ConnectivitySequencer<L, S> {
    pub fn new(
        ctx: SharedContext<L, S>,
        signals: Arc<SignalGroup<WifiSignal>>,
        provisioning: Arc<SignalGroup<ProvisionSignal>>,
        policy: WifiPolicy,
    ) -> Self {
        Self {
            ctx,
            signals,
            provisioning,
            policy,
            reconnect_attempts: 0,
        }
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    fn settle(&self) {
        if !self.policy.settle_delay.is_zero() {
            std::thread::sleep(self.policy.settle_delay);
        }
    }

    fn on_connected(&mut self) {
        self.reconnect_attempts = 0;
        {
            let mut ctx = lock(&self.ctx);
            ctx.state = WifiState::Connected;
            info!("WiFi: connected to '{}'", ctx.current.ssid());
        }
        self.provisioning.raise(ProvisionSignal::End);
    }

    fn on_disconnected(&mut self) {
        let mut ctx = lock(&self.ctx);
        if ctx.state == WifiState::Provisioning {
            debug!("WiFi: station idle while provisioning");
            return;
        }
        ctx.state = WifiState::Reconnecting;
        drop(ctx);
        self.signals.raise(WifiSignal::Reconnect);
    }

    fn on_connect(&mut self) {
        self.reconnect_attempts = 0;
        let mut ctx = lock(&self.ctx);

        let stored = match ctx.store.load() {
            Ok(stored) => stored,
            Err(e) => {
                warn!("WiFi: credential read failed ({})", e);
                None
            }
        };
        let Some(config) = stored else {
            info!("WiFi: no stored credentials, starting provisioning");
            drop(ctx);
            self.provisioning.raise(ProvisionSignal::Start);
            return;
        };

        info!("WiFi: connecting to '{}'", config.ssid());
        ctx.current = config;
        ctx.state = WifiState::Connecting;
        if let Err(e) = ctx.upload() {
            warn!("WiFi: connect failed ({})", e);
            drop(ctx);
            self.signals.raise(WifiSignal::Reconnect);
        }
    }

    fn on_reconnect(&mut self) {
        if self.reconnect_attempts >= self.policy.max_reconnect_attempts {
            warn!(
                "WiFi: {} reconnects failed, re-evaluating",
                self.reconnect_attempts
            );
            self.signals.raise(WifiSignal::Connect);
            return;
        }

        self.reconnect_attempts += 1;
        info!(
            "WiFi: reconnect attempt {}/{}",
            self.reconnect_attempts, self.policy.max_reconnect_attempts
        );
        let mut ctx = lock(&self.ctx);
        ctx.state = WifiState::Reconnecting;
        if let Err(e) = ctx.link.connect() {
            warn!("WiFi: reconnect refused ({}), waiting for link event", e);
        }
    }

    fn on_restart_provisioning(&mut self) {
        self.settle();
        self.reconnect_attempts = 0;
        let mut ctx = lock(&self.ctx);
        if let Some(requested) = ctx.requested.take() {
            ctx.current = requested;
        }
        info!("WiFi: applying new configuration for '{}'", ctx.current.ssid());
        ctx.state = WifiState::Connecting;
        if let Err(e) = ctx.upload() {
            warn!("WiFi: new configuration failed ({})", e);
            drop(ctx);
            self.signals.raise(WifiSignal::Connect);
        }
    }

    fn on_reset_to_default(&mut self) {
        self.settle();
        {
            let mut ctx = lock(&self.ctx);
            ctx.current = ConnectivityConfig::default();
            ctx.state = WifiState::Disconnected;
            ctx.link.disconnect();
            if let Err(e) = ctx.link.set_config(&ConnectivityConfig::default()) {
                warn!("WiFi: clearing station config failed ({})", e);
            }
            match ctx.store.erase() {
                Ok(()) => info!("WiFi: reset to defaults"),
                Err(e) => warn!("WiFi: erasing credentials failed ({})", e),
            }
        }
        self.signals.raise(WifiSignal::Connect);
    }
}

impl<L: LinkControl, S: StoragePort> SignalHandler<WifiSignal> for ConnectivitySequencer<L, S> {
    fn handle(&mut self, signal: WifiSignal) {
        match signal {
            WifiSignal::Connected => self.on_connected(),
            WifiSignal::Disconnected => self.on_disconnected(),
            WifiSignal::Connect => self.on_connect(),
            WifiSignal::Reconnect => self.on_reconnect(),
            WifiSignal::RestartProvisioning => self.on_restart_provisioning(),
            WifiSignal::ResetToDefault => self.on_reset_to_default(),
        }
    }
}
