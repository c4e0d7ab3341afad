//! WiFi connectivity: the sequencer, the provisioning stage, and the
//! handle the rest of the firmware uses to steer them.
//!
//! ```text
//!   link-layer events ──▶ ConnectivityHandle::on_net_event
//!                                │ LinkUp / LinkDown
//!                                ▼
//!                      [wifi-prov] ProvisioningStager ──Connected/Disconnected──┐
//!                                ▲                                            ▼
//!                                └──── Start / End ──── [wifi-seq] ConnectivitySequencer
//! ```
//!
//! Both dispatchers share one [`WifiContext`]: the link-layer driver, the
//! credential store, and the configuration currently in effect.

pub mod credentials;
pub mod provisioning;
pub mod sequencer;

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use log::{debug, info};

use crate::app::ports::{LinkControl, StoragePort};
use crate::drivers::task_pin::Core;
use crate::error::ConnectivityError;
use crate::signals::{Dispatcher, SignalGroup};
use crate::sync::lock;

pub use credentials::{AccessPointConfig, ConnectivityConfig, CredentialStore};
pub use provisioning::{ProvisionSignal, ProvisioningStager};
pub use sequencer::{ConnectivitySequencer, WifiPolicy, WifiSignal, WifiState};

const DISPATCHER_PRIORITY: u8 = 5;
const DISPATCHER_STACK_KB: usize = 4;

/// Station events reported by the link-layer driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetEvent {
    StaConnected,
    StaDisconnected,
    GotAddress,
}

/// State shared by the sequencer and the provisioning stage.
pub struct WifiContext<L, S> {
    pub(crate) link: L,
    pub(crate) store: CredentialStore<S>,
    pub(crate) current: ConnectivityConfig,
    /// Configuration handed in by [`ConnectivityHandle::request_connect`],
    /// waiting for the sequencer to adopt it.
    pub(crate) requested: Option<ConnectivityConfig>,
    pub(crate) state: WifiState,
}

impl<L: LinkControl, S: StoragePort> WifiContext<L, S> {
    fn new(link: L, storage: S) -> Self {
        Self {
            link,
            store: CredentialStore::new(storage),
            current: ConnectivityConfig::default(),
            requested: None,
            state: WifiState::Disconnected,
        }
    }

    /// Disconnect, push `current` to the driver, and start connecting.
    pub(crate) fn upload(&mut self) -> Result<(), ConnectivityError> {
        self.link.disconnect();
        self.link
            .set_config(&self.current)
            .map_err(|_| ConnectivityError::ConfigRejected)?;
        self.link.connect()
    }
}

pub(crate) type SharedContext<L, S> = Arc<Mutex<WifiContext<L, S>>>;

// ── ConnectivityHandle ────────────────────────────────────────

/// Cloneable control surface for the connectivity dispatchers.
pub struct ConnectivityHandle<L, S> {
    ctx: SharedContext<L, S>,
    wifi: Arc<SignalGroup<WifiSignal>>,
    provisioning: Arc<SignalGroup<ProvisionSignal>>,
}

impl<L, S> Clone for ConnectivityHandle<L, S> {
    fn clone(&self) -> Self {
        Self {
            ctx: Arc::clone(&self.ctx),
            wifi: Arc::clone(&self.wifi),
            provisioning: Arc::clone(&self.provisioning),
        }
    }
}

impl<L: LinkControl, S: StoragePort> ConnectivityHandle<L, S> {
    /// Switch to `config`. Credentials are only persisted once the station
    /// actually connects with them.
    ///
    /// The sequencer adopts the request when it handles
    /// `RestartProvisioning`; a later request replaces an unadopted one.
    pub fn request_connect(&self, config: ConnectivityConfig) {
        info!("WiFi: new configuration requested for '{}'", config.ssid());
        lock(&self.ctx).requested = Some(config);
        self.wifi.raise(WifiSignal::RestartProvisioning);
    }

    /// Forget stored credentials and fall back to provisioning.
    pub fn request_disconnect(&self) {
        self.wifi.raise(WifiSignal::ResetToDefault);
    }

    /// Open the provisioning access point without touching stored credentials.
    pub fn request_reprovision(&self) {
        self.provisioning.raise(ProvisionSignal::Start);
    }

    /// Feed a link-layer station event into the dispatchers.
    pub fn on_net_event(&self, event: NetEvent) {
        match event {
            NetEvent::GotAddress => self.provisioning.raise(ProvisionSignal::LinkUp),
            NetEvent::StaDisconnected => self.provisioning.raise(ProvisionSignal::LinkDown),
            NetEvent::StaConnected => debug!("WiFi: associated, waiting for address"),
        }
    }

    pub fn state(&self) -> WifiState {
        lock(&self.ctx).state
    }

    pub fn current_config(&self) -> ConnectivityConfig {
        lock(&self.ctx).current.clone()
    }
}

// ── Connectivity ──────────────────────────────────────────────

/// Both connectivity dispatchers, not yet running.
pub struct Connectivity<L, S> {
    handle: ConnectivityHandle<L, S>,
    sequencer: Dispatcher<WifiSignal, ConnectivitySequencer<L, S>>,
    stager: Dispatcher<ProvisionSignal, ProvisioningStager<L, S>>,
}

impl<L: LinkControl, S: StoragePort> Connectivity<L, S> {
    pub fn new(link: L, storage: S, policy: WifiPolicy, access_point: AccessPointConfig) -> Self {
        let ctx = Arc::new(Mutex::new(WifiContext::new(link, storage)));
        let wifi = Arc::new(SignalGroup::new());
        let provisioning = Arc::new(SignalGroup::new());

        let sequencer = Dispatcher::new(
            sequencer::TASK_NAME,
            Arc::clone(&wifi),
            ConnectivitySequencer::new(
                Arc::clone(&ctx),
                Arc::clone(&wifi),
                Arc::clone(&provisioning),
                policy,
            ),
        );
        let stager = Dispatcher::new(
            provisioning::TASK_NAME,
            Arc::clone(&provisioning),
            ProvisioningStager::new(Arc::clone(&ctx), Arc::clone(&wifi), access_point),
        );

        Self {
            handle: ConnectivityHandle {
                ctx,
                wifi,
                provisioning,
            },
            sequencer,
            stager,
        }
    }

    pub fn handle(&self) -> ConnectivityHandle<L, S> {
        self.handle.clone()
    }

    /// Queue the boot-time `Connect`.
    pub fn boot(&self) {
        self.handle.wifi.raise(WifiSignal::Connect);
    }

    /// Run both dispatchers on the calling thread until neither has work,
    /// or `max_rounds` rounds have passed. Returns the rounds that did work.
    pub fn pump(&mut self, max_rounds: usize) -> usize {
        let mut rounds = 0;
        while rounds < max_rounds {
            let seq = self.sequencer.run_pending();
            let prov = self.stager.run_pending();
            if !seq && !prov {
                break;
            }
            rounds += 1;
        }
        rounds
    }

    pub fn sequencer(&self) -> &ConnectivitySequencer<L, S> {
        self.sequencer.handler()
    }
}

impl<L, S> Connectivity<L, S>
where
    L: LinkControl + 'static,
    S: StoragePort + 'static,
{
    /// Raise the boot `Connect` and move both dispatchers onto their tasks.
    pub fn start(self) -> std::io::Result<(ConnectivityHandle<L, S>, [JoinHandle<()>; 2])> {
        self.boot();
        let Self {
            handle,
            sequencer,
            stager,
        } = self;
        let seq = sequencer.spawn(Core::App, DISPATCHER_PRIORITY, DISPATCHER_STACK_KB)?;
        let prov = stager.spawn(Core::App, DISPATCHER_PRIORITY, DISPATCHER_STACK_KB)?;
        info!("WiFi: connectivity dispatchers running");
        Ok((handle, [seq, prov]))
    }
}
