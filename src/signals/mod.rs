//! Signal dispatcher: named event bits driving a fixed handler table.
//!
//! ```text
//!   raise(A) ─┐                         ┌─▶ handle(A) ─┐
//!   raise(C) ─┼─▶ SignalGroup (u32) ──▶ │   handle(C)  │ table order,
//!   raise(A) ─┘    wait_any: take bits  └─▶ ...        │ one at a time
//!                        ▲                             │
//!                        └──── handlers may raise ◀────┘
//! ```
//!
//! Observed bits are cleared before any handler runs, so a handler that
//! re-raises its own signal gets it on the next wake-up instead of
//! recursing. Handlers of one dispatcher never run concurrently.

use core::fmt;
use core::marker::PhantomData;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use log::debug;

use crate::drivers::task_pin::{self, Core};
use crate::sync::lock;

/// A closed set of signals with a fixed dispatch order.
pub trait Signal: Copy + fmt::Debug + Send + Sync + 'static {
    /// Every signal, in dispatch order.
    const TABLE: &'static [Self];

    /// Bit position of this signal in its group.
    fn index(self) -> u32;

    fn bit(self) -> u32 {
        1 << self.index()
    }

    /// Union of every signal's bit.
    fn mask() -> u32 {
        Self::TABLE.iter().fold(0, |m, s| m | s.bit())
    }
}

// ── SignalSet ─────────────────────────────────────────────────

/// Pending signals observed in one wake-up.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SignalSet<S> {
    bits: u32,
    _marker: PhantomData<S>,
}

impl<S: Signal> SignalSet<S> {
    pub fn empty() -> Self {
        Self::from_bits(0)
    }

    fn from_bits(bits: u32) -> Self {
        Self {
            bits: bits & S::mask(),
            _marker: PhantomData,
        }
    }

    pub fn contains(&self, signal: S) -> bool {
        self.bits & signal.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Members in table order.
    pub fn iter(self) -> impl Iterator<Item = S> {
        S::TABLE.iter().copied().filter(move |s| self.contains(*s))
    }
}

impl<S: Signal> fmt::Debug for SignalSet<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

// ── SignalGroup ───────────────────────────────────────────────

/// Shared pending-bit register for one dispatcher instance.
pub struct SignalGroup<S> {
    bits: Mutex<u32>,
    raised: Condvar,
    _marker: PhantomData<fn() -> S>,
}

impl<S: Signal> Default for SignalGroup<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Signal> SignalGroup<S> {
    pub fn new() -> Self {
        Self {
            bits: Mutex::new(0),
            raised: Condvar::new(),
            _marker: PhantomData,
        }
    }

    fn lock(&self) -> MutexGuard<'_, u32> {
        lock(&self.bits)
    }

    /// Set `signal`'s bit and wake the dispatcher. Raising an already
    /// pending signal is a no-op.
    pub fn raise(&self, signal: S) {
        *self.lock() |= signal.bit();
        self.raised.notify_all();
    }

    /// Signals currently pending, without clearing them.
    pub fn pending(&self) -> SignalSet<S> {
        SignalSet::from_bits(*self.lock())
    }

    /// Take every pending signal without blocking.
    pub fn take(&self) -> SignalSet<S> {
        let mut bits = self.lock();
        let set = SignalSet::from_bits(*bits);
        *bits &= !S::mask();
        set
    }

    /// Block until at least one signal is pending, then take them all.
    pub fn wait_any(&self) -> SignalSet<S> {
        let mut bits = self.lock();
        while *bits & S::mask() == 0 {
            bits = self
                .raised
                .wait(bits)
                .unwrap_or_else(PoisonError::into_inner);
        }
        let set = SignalSet::from_bits(*bits);
        *bits &= !S::mask();
        set
    }
}

// ── Dispatcher ────────────────────────────────────────────────

/// Reaction to one signal. Runs on the dispatcher's task.
pub trait SignalHandler<S: Signal> {
    fn handle(&mut self, signal: S);
}

/// One dispatcher instance: a group plus the handler that owns its state.
pub struct Dispatcher<S, H> {
    name: &'static str,
    group: Arc<SignalGroup<S>>,
    handler: H,
}

impl<S: Signal, H: SignalHandler<S>> Dispatcher<S, H> {
    /// `name` is null-terminated; it doubles as the task name.
    pub fn new(name: &'static str, group: Arc<SignalGroup<S>>, handler: H) -> Self {
        Self {
            name,
            group,
            handler,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name.trim_end_matches('\0')
    }

    pub fn group(&self) -> &Arc<SignalGroup<S>> {
        &self.group
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Run the handler for each member of `set`, in table order.
    pub fn dispatch(&mut self, set: SignalSet<S>) {
        for signal in set.iter() {
            debug!("{}: {:?}", self.name(), signal);
            self.handler.handle(signal);
        }
    }

    /// Block for the next wake-up and dispatch it.
    pub fn run_once(&mut self) {
        let set = self.group.wait_any();
        self.dispatch(set);
    }

    /// Dispatch whatever is pending now. Returns `false` if nothing was.
    pub fn run_pending(&mut self) -> bool {
        let set = self.group.take();
        if set.is_empty() {
            return false;
        }
        self.dispatch(set);
        true
    }

    pub fn run(mut self) -> ! {
        loop {
            self.run_once();
        }
    }
}

impl<S: Signal, H: SignalHandler<S> + Send + 'static> Dispatcher<S, H> {
    /// Move the dispatcher onto its own task.
    pub fn spawn(self, core: Core, priority: u8, stack_kb: usize) -> std::io::Result<JoinHandle<()>> {
        let name = self.name;
        task_pin::spawn_on_core(core, priority, stack_kb, name, move || self.run())
    }
}
