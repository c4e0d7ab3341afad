//! PLC link bring-up: configure the modem at boot and keep retrying
//! until it accepts the configuration.

use core::time::Duration;
use std::sync::Arc;

use log::{info, warn};

use crate::app::ports::CommandChannel;
use crate::plc::service::PlcService;
use crate::signals::{Dispatcher, Signal, SignalGroup, SignalHandler};

pub const TASK_NAME: &str = "plc-init\0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlcSignal {
    /// Module configuration failed; retry it.
    InitFailed,
}

impl Signal for PlcSignal {
    const TABLE: &'static [Self] = &[Self::InitFailed];

    fn index(self) -> u32 {
        self as u32
    }
}

pub struct ModuleInitializer<C> {
    service: Arc<PlcService<C>>,
    signals: Arc<SignalGroup<PlcSignal>>,
    retry_delay: Duration,
    attempts: u32,
}

impl<C: CommandChannel> ModuleInitializer<C> {
    pub fn new(
        service: Arc<PlcService<C>>,
        signals: Arc<SignalGroup<PlcSignal>>,
        retry_delay: Duration,
    ) -> Self {
        Self {
            service,
            signals,
            retry_delay,
            attempts: 0,
        }
    }

    /// Configuration attempts made so far, including the boot attempt.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Try once; on failure schedule a retry through the dispatcher.
    pub fn configure(&mut self) -> bool {
        self.attempts += 1;
        match self.service.configure_module() {
            Ok(()) => {
                info!("PLC: bring-up complete after {} attempt(s)", self.attempts);
                true
            }
            Err(e) => {
                warn!("PLC: module init failed ({}), retrying", e);
                self.signals.raise(PlcSignal::InitFailed);
                false
            }
        }
    }
}

impl<C: CommandChannel> SignalHandler<PlcSignal> for ModuleInitializer<C> {
    fn handle(&mut self, signal: PlcSignal) {
        match signal {
            PlcSignal::InitFailed => {
                if !self.retry_delay.is_zero() {
                    std::thread::sleep(self.retry_delay);
                }
                self.configure();
            }
        }
    }
}

/// Dispatcher that owns the module initializer.
pub type PlcBringUp<C> = Dispatcher<PlcSignal, ModuleInitializer<C>>;

/// Run the boot-time configuration attempt and return the dispatcher
/// that retries it.
pub fn bring_up<C: CommandChannel>(service: Arc<PlcService<C>>, retry_delay: Duration) -> PlcBringUp<C> {
    let signals = Arc::new(SignalGroup::new());
    let mut initializer = ModuleInitializer::new(service, Arc::clone(&signals), retry_delay);
    initializer.configure();
    Dispatcher::new(TASK_NAME, signals, initializer)
}
