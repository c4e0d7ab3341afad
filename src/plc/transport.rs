//! Serial transport to the PLC modem.
//!
//! ```text
//!   caller ── send() ─┬─ token ──▶ write (≤ write_attempts) ──▶ SerialLink
//!                     │                                           │
//!                     └─ wait on Condvar (slices)                 │ bytes
//!                             ▲                                   ▼
//!                             │ notify on Result line     UART driver / ISR
//!                             │                                   │ UartEvent
//!                      PlcReceiver ◀── LinkEvents (embassy Channel, depth 20)
//! ```
//!
//! One exchange is in flight at a time: the token is held for the whole
//! send-and-wait sequence, and the receive task only ever writes into the
//! response parked in the exchange slot. The caller's response is moved in
//! when the exchange opens and moved back out when it closes.
//!
//! Opening an exchange also drops any unterminated tail left behind by an
//! earlier attempt, so a stale fragment can never prefix the next reply.

use core::time::Duration;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use futures_lite::future::block_on;
use log::{debug, error, info, trace, warn};

use crate::app::ports::{CommandChannel, SerialLink};
use crate::drivers::task_pin::{self, Core};
use crate::error::TransportError;
use crate::plc::line;
use crate::plc::response::CommandResponse;
use crate::sync::lock;

/// Matches the UART driver's event queue.
pub const UART_EVENT_QUEUE_DEPTH: usize = 20;
/// Matches the UART driver's receive ring.
pub const RX_BUFFER_SIZE: usize = 1024;

const RX_TASK_NAME: &str = "plc-rx\0";
const RX_TASK_PRIORITY: u8 = 12;
const RX_TASK_STACK_KB: usize = 4;

// ── Link events ───────────────────────────────────────────────

/// Notifications from the UART driver to the receive task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UartEvent {
    /// `n` bytes are waiting in the receive buffer.
    DataArrived(usize),
    /// Hardware FIFO overflowed; input is unreliable.
    Overflow,
    /// Driver ring buffer is full; input is unreliable.
    BufferFull,
    /// The link is gone; the receive task exits.
    Closed,
}

/// Bounded event queue between the UART driver and [`PlcReceiver`].
pub struct LinkEvents {
    channel: Channel<CriticalSectionRawMutex, UartEvent, UART_EVENT_QUEUE_DEPTH>,
}

impl Default for LinkEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkEvents {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Non-blocking post. Returns `false` if the queue was full.
    pub fn post(&self, event: UartEvent) -> bool {
        match self.channel.try_send(event) {
            Ok(()) => true,
            Err(_) => {
                warn!("UART event queue full, dropping {:?}", event);
                false
            }
        }
    }

    pub fn try_next(&self) -> Option<UartEvent> {
        self.channel.try_receive().ok()
    }

    /// Block the calling task until an event arrives.
    pub fn next(&self) -> UartEvent {
        block_on(self.channel.receive())
    }

    /// Drop every queued event. Returns how many were discarded.
    pub fn discard_pending(&self) -> usize {
        let mut dropped = 0;
        while self.channel.try_receive().is_ok() {
            dropped += 1;
        }
        dropped
    }
}

// ── Timing ────────────────────────────────────────────────────

/// Retry and timeout budget of one [`PlcTransport::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportTiming {
    pub write_attempts: u32,
    pub exchange_attempts: u32,
    pub wait_slice: Duration,
    pub wait_slices: u32,
}

impl Default for TransportTiming {
    fn default() -> Self {
        Self {
            write_attempts: 5,
            exchange_attempts: 5,
            wait_slice: Duration::from_millis(100),
            wait_slices: 20,
        }
    }
}

// ── Exchange slot ─────────────────────────────────────────────

#[derive(Default)]
struct Slot {
    /// `Some` while an exchange is open.
    response: Option<CommandResponse>,
    /// Unterminated tail of the last read.
    partial: String,
}

impl Slot {
    fn is_released(&self) -> bool {
        self.response.as_ref().is_some_and(CommandResponse::is_complete)
    }
}

struct Exchange {
    slot: Mutex<Slot>,
    released: Condvar,
}

// ── Transport (caller side) ───────────────────────────────────

pub struct PlcTransport<L> {
    link: Arc<Mutex<L>>,
    exchange: Arc<Exchange>,
    token: Mutex<()>,
    timing: TransportTiming,
}

impl<L: SerialLink> PlcTransport<L> {
    /// Build the caller side and its receive task over `link`.
    ///
    /// The link adapter must post to the same `events` queue.
    pub fn new(link: L, events: Arc<LinkEvents>, timing: TransportTiming) -> (Self, PlcReceiver<L>) {
        let link = Arc::new(Mutex::new(link));
        let exchange = Arc::new(Exchange {
            slot: Mutex::new(Slot::default()),
            released: Condvar::new(),
        });
        let receiver = PlcReceiver {
            link: Arc::clone(&link),
            exchange: Arc::clone(&exchange),
            events,
            buf: vec![0u8; RX_BUFFER_SIZE],
        };
        let transport = Self {
            link,
            exchange,
            token: Mutex::new(()),
            timing,
        };
        (transport, receiver)
    }

    pub fn timing(&self) -> TransportTiming {
        self.timing
    }

    /// Run one exchange. See [`CommandChannel::send`].
    pub fn send(&self, command: &str, response: &mut CommandResponse) -> Result<(), TransportError> {
        let _token = lock(&self.token);
        let shown = command.trim_end();
        debug!("PLC >> {}", shown);

        let mut outcome = Err(TransportError::ResponseTimeout);
        for attempt in 1..=self.timing.exchange_attempts {
            self.open_exchange();
            if let Err(e) = self.transmit(command.as_bytes()) {
                outcome = Err(e);
                break;
            }
            if self.await_release() {
                outcome = Ok(());
                break;
            }
            warn!(
                "PLC: no result for '{}' (attempt {}/{})",
                shown, attempt, self.timing.exchange_attempts
            );
        }

        *response = self.close_exchange();
        match outcome {
            Ok(()) => debug!("PLC: '{}' → success={}", shown, response.success()),
            Err(e) => error!("PLC: '{}' failed: {}", shown, e),
        }
        outcome
    }

    fn open_exchange(&self) {
        let mut slot = lock(&self.exchange.slot);
        if !slot.partial.is_empty() {
            debug!("PLC: dropping stale fragment {:?}", slot.partial);
            slot.partial.clear();
        }
        slot.response = Some(CommandResponse::new());
    }

    fn close_exchange(&self) -> CommandResponse {
        lock(&self.exchange.slot).response.take().unwrap_or_default()
    }

    /// Queue the command, retrying rejected writes.
    fn transmit(&self, bytes: &[u8]) -> Result<(), TransportError> {
        let attempts = self.timing.write_attempts;
        for attempt in 1..=attempts {
            match lock(&self.link).write(bytes) {
                Ok(n) if n == bytes.len() => return Ok(()),
                Ok(n) => warn!(
                    "PLC: short write {}/{} bytes (attempt {}/{})",
                    n,
                    bytes.len(),
                    attempt,
                    attempts
                ),
                Err(e) => warn!("PLC: write rejected: {} (attempt {}/{})", e, attempt, attempts),
            }
        }
        Err(TransportError::LinkWriteFailed)
    }

    /// Wait for the receive task to record a result line.
    fn await_release(&self) -> bool {
        let mut slot = lock(&self.exchange.slot);
        for _ in 0..self.timing.wait_slices {
            if slot.is_released() {
                return true;
            }
            slot = match self.exchange.released.wait_timeout(slot, self.timing.wait_slice) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        slot.is_released()
    }
}

impl<L: SerialLink> CommandChannel for PlcTransport<L> {
    fn send(&self, command: &str, response: &mut CommandResponse) -> Result<(), TransportError> {
        PlcTransport::send(self, command, response)
    }
}

// ── Receive task ──────────────────────────────────────────────

/// Background side: turns [`UartEvent`]s into response updates.
pub struct PlcReceiver<L> {
    link: Arc<Mutex<L>>,
    exchange: Arc<Exchange>,
    events: Arc<LinkEvents>,
    buf: Vec<u8>,
}

impl<L: SerialLink> PlcReceiver<L> {
    /// Process one event. Returns `false` once the link has closed.
    pub fn handle_event(&mut self, event: UartEvent) -> bool {
        match event {
            UartEvent::DataArrived(len) => {
                self.on_data(len);
                true
            }
            UartEvent::Overflow | UartEvent::BufferFull => {
                lock(&self.link).flush_input();
                lock(&self.exchange.slot).partial.clear();
                let dropped = self.events.discard_pending();
                warn!(
                    "PLC: UART {:?}, input flushed ({} queued events dropped)",
                    event, dropped
                );
                true
            }
            UartEvent::Closed => {
                info!("PLC: link closed, receive task exiting");
                false
            }
        }
    }

    /// Handle every queued event without blocking. Returns the count.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self.events.try_next() {
            handled += 1;
            if !self.handle_event(event) {
                break;
            }
        }
        handled
    }

    /// Receive loop; returns when the link closes.
    pub fn run(mut self) {
        loop {
            let event = self.events.next();
            if !self.handle_event(event) {
                return;
            }
        }
    }

    fn on_data(&mut self, mut len: usize) {
        while len > 0 {
            let want = len.min(self.buf.len());
            let n = lock(&self.link).read(&mut self.buf[..want]);
            if n == 0 {
                break;
            }
            len = len.saturating_sub(n);
            let text = String::from_utf8_lossy(&self.buf[..n]).into_owned();
            self.dispatch_complete_lines(&text);
        }
    }

    /// Append `text` to the pending tail and feed every terminated line to
    /// the open exchange.
    fn dispatch_complete_lines(&self, text: &str) {
        let mut slot = lock(&self.exchange.slot);
        slot.partial.push_str(text);
        let split = match slot.partial.rfind(|c: char| c == '\r' || c == '\n') {
            Some(pos) => pos + 1,
            None if slot.partial.len() > RX_BUFFER_SIZE => slot.partial.len(),
            None => return,
        };
        let rest = slot.partial.split_off(split);
        let burst = core::mem::replace(&mut slot.partial, rest);
        trace!("PLC << {:?}", burst);

        let summary = line::feed_burst(&burst, slot.response.as_mut());
        if summary.released {
            self.exchange.released.notify_all();
        }
    }
}

impl<L: SerialLink + 'static> PlcReceiver<L> {
    /// Start the receive loop as its own task.
    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        task_pin::spawn_on_core(Core::Pro, RX_TASK_PRIORITY, RX_TASK_STACK_KB, RX_TASK_NAME, move || {
            self.run();
        })
    }
}
