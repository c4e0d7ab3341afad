//! Provisioning stage: link-layer notifications, the configuration soft-AP,
//! and persisting credentials once a station connection proves them.

use std::sync::Arc;

use log::{info, warn};

use crate::app::ports::{LinkControl, StoragePort};
use crate::signals::{Signal, SignalGroup, SignalHandler};
use crate::sync::lock;
use crate::wifi::credentials::{AccessPointConfig, ConnectivityConfig};
use crate::wifi::sequencer::{WifiSignal, WifiState};
use crate::wifi::SharedContext;

pub const TASK_NAME: &str = "wifi-prov\0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionSignal {
    /// Station obtained an address.
    LinkUp,
    /// Station association lost.
    LinkDown,
    /// Open the configuration access point.
    Start,
    /// Station connected; persist what got it there.
    End,
}

impl Signal for ProvisionSignal {
    const TABLE: &'static [Self] = &[Self::LinkUp, Self::LinkDown, Self::Start, Self::End];

    fn index(self) -> u32 {
        self as u32
    }
}

pub struct ProvisioningStager<L, S> {
    ctx: SharedContext<L, S>,
    wifi: Arc<SignalGroup<WifiSignal>>,
    access_point: AccessPointConfig,
}

impl<L: LinkControl, S: StoragePort> ProvisioningStager<L, S> {
    pub fn new(
        ctx: SharedContext<L, S>,
        wifi: Arc<SignalGroup<WifiSignal>>,
        access_point: AccessPointConfig,
    ) -> Self {
        Self {
            ctx,
            wifi,
            access_point,
        }
    }

    fn start(&mut self) {
        let mut ctx = lock(&self.ctx);
        ctx.link.disconnect();
        if let Err(e) = ctx.link.set_config(&ConnectivityConfig::default()) {
            warn!("WiFi: clearing station config failed ({})", e);
        }
        match ctx.link.start_access_point(&self.access_point) {
            Ok(()) => info!(
                "WiFi: provisioning AP '{}' up on channel {}",
                self.access_point.ssid, self.access_point.channel
            ),
            Err(e) => warn!("WiFi: provisioning AP failed ({})", e),
        }
        ctx.state = WifiState::Provisioning;
    }

    fn end(&mut self) {
        let mut ctx = lock(&self.ctx);
        if ctx.current.is_empty() {
            return;
        }
        let stored = ctx.store.load().ok().flatten();
        if stored.as_ref() == Some(&ctx.current) {
            return;
        }
        let current = ctx.current.clone();
        if let Err(e) = ctx.store.save(&current) {
            warn!("WiFi: persisting credentials failed ({})", e);
        }
    }
}

impl<L: LinkControl, S: StoragePort> SignalHandler<ProvisionSignal> for ProvisioningStager<L, S> {
    fn handle(&mut self, signal: ProvisionSignal) {
        match signal {
            ProvisionSignal::LinkUp => self.wifi.raise(WifiSignal::Connected),
            ProvisionSignal::LinkDown => self.wifi.raise(WifiSignal::Disconnected),
            ProvisionSignal::Start => self.start(),
            ProvisionSignal::End => self.end(),
        }
    }
}
