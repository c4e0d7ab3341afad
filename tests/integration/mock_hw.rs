//! Mock hardware for integration tests.
//!
//! Every mock keeps its state behind an `Arc<Mutex<_>>` so a test can move
//! one clone into the code under test and inspect the other afterwards.

use plcgateway::app::ports::{LinkControl, SerialError, SerialLink, StorageError, StoragePort};
use plcgateway::error::ConnectivityError;
use plcgateway::plc::{LinkEvents, UartEvent};
use plcgateway::wifi::{AccessPointConfig, ConnectivityConfig};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── MockModem (SerialLink) ────────────────────────────────────

#[derive(Default)]
pub struct ModemState {
    rx: Vec<u8>,
    replies: VecDeque<String>,
    awaiting_reply: bool,
    pub writes: Vec<String>,
    /// Writes that arrived while an earlier command was still unanswered.
    pub overlaps: u32,
    pub flushes: u32,
}

/// Answers each write from a reply queue after `delay`, from another
/// thread, the way the UART driver reports arrivals.
#[derive(Clone)]
pub struct MockModem {
    pub state: Arc<Mutex<ModemState>>,
    events: Arc<LinkEvents>,
    delay: Duration,
    silent: bool,
}

#[allow(dead_code)]
impl MockModem {
    pub fn new(events: &Arc<LinkEvents>, delay: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(ModemState::default())),
            events: Arc::clone(events),
            delay,
            silent: false,
        }
    }

    /// Never answers.
    pub fn silent(events: &Arc<LinkEvents>) -> Self {
        Self {
            silent: true,
            ..Self::new(events, Duration::ZERO)
        }
    }

    /// Queue the reply to the next unanswered write. Writes beyond the
    /// queue are answered with `OK`.
    pub fn reply(&self, text: &str) {
        self.state.lock().unwrap().replies.push_back(text.to_string());
    }

    pub fn writes(&self) -> Vec<String> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn overlaps(&self) -> u32 {
        self.state.lock().unwrap().overlaps
    }
}

impl SerialLink for MockModem {
    fn write(&mut self, bytes: &[u8]) -> Result<usize, SerialError> {
        let reply = {
            let mut s = self.state.lock().unwrap();
            s.writes.push(String::from_utf8_lossy(bytes).into_owned());
            if self.silent {
                return Ok(bytes.len());
            }
            if s.awaiting_reply {
                s.overlaps += 1;
            }
            s.awaiting_reply = true;
            s.replies.pop_front().unwrap_or_else(|| "OK\r\n".to_string())
        };

        let state = Arc::clone(&self.state);
        let events = Arc::clone(&self.events);
        let delay = self.delay;
        std::thread::spawn(move || {
            std::thread::sleep(delay);
            {
                let mut s = state.lock().unwrap();
                s.rx.extend_from_slice(reply.as_bytes());
                s.awaiting_reply = false;
            }
            events.post(UartEvent::DataArrived(reply.len()));
        });
        Ok(bytes.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        let mut s = self.state.lock().unwrap();
        let n = buf.len().min(s.rx.len());
        buf[..n].copy_from_slice(&s.rx[..n]);
        s.rx.drain(..n);
        n
    }

    fn flush_input(&mut self) {
        let mut s = self.state.lock().unwrap();
        s.rx.clear();
        s.flushes += 1;
    }
}

// ── MemStorage (StoragePort) ──────────────────────────────────

#[derive(Clone, Default)]
pub struct MemStorage {
    pub map: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    pub writes: Arc<Mutex<u32>>,
}

#[allow(dead_code)]
impl MemStorage {
    pub fn get(&self, namespace: &str, key: &str) -> Option<String> {
        self.map
            .lock()
            .unwrap()
            .get(&format!("{namespace}::{key}"))
            .map(|v| String::from_utf8_lossy(v).into_owned())
    }

    pub fn write_count(&self) -> u32 {
        *self.writes.lock().unwrap()
    }
}

impl StoragePort for MemStorage {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let map = self.map.lock().unwrap();
        let data = map
            .get(&format!("{namespace}::{key}"))
            .ok_or(StorageError::NotFound)?;
        let n = data.len().min(buf.len());
        buf[..n].copy_from_slice(&data[..n]);
        Ok(n)
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        *self.writes.lock().unwrap() += 1;
        self.map
            .lock()
            .unwrap()
            .insert(format!("{namespace}::{key}"), data.to_vec());
        Ok(())
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.map
            .lock()
            .unwrap()
            .remove(&format!("{namespace}::{key}"));
        Ok(())
    }
}

// ── MockWifi (LinkControl) ────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WifiCall {
    SetConfig(String),
    Connect,
    Disconnect,
    StartAp(String),
}

#[derive(Default)]
pub struct WifiLog {
    pub calls: Vec<WifiCall>,
    pub config: ConnectivityConfig,
    /// `connect()` calls still to fail.
    pub connect_failures: u32,
}

#[derive(Clone, Default)]
pub struct MockWifi {
    pub log: Arc<Mutex<WifiLog>>,
}

#[allow(dead_code)]
impl MockWifi {
    pub fn failing(connect_failures: u32) -> Self {
        let wifi = Self::default();
        wifi.log.lock().unwrap().connect_failures = connect_failures;
        wifi
    }

    pub fn calls(&self) -> Vec<WifiCall> {
        self.log.lock().unwrap().calls.clone()
    }

    pub fn count(&self, call: &WifiCall) -> usize {
        self.log
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| *c == call)
            .count()
    }

    pub fn clear(&self) {
        self.log.lock().unwrap().calls.clear();
    }
}

impl LinkControl for MockWifi {
    fn set_config(&mut self, config: &ConnectivityConfig) -> Result<(), ConnectivityError> {
        let mut log = self.log.lock().unwrap();
        log.calls.push(WifiCall::SetConfig(config.ssid().to_string()));
        log.config = config.clone();
        Ok(())
    }

    fn get_config(&self) -> ConnectivityConfig {
        self.log.lock().unwrap().config.clone()
    }

    fn connect(&mut self) -> Result<(), ConnectivityError> {
        let mut log = self.log.lock().unwrap();
        log.calls.push(WifiCall::Connect);
        if log.connect_failures > 0 {
            log.connect_failures -= 1;
            return Err(ConnectivityError::ConnectionFailed);
        }
        Ok(())
    }

    fn disconnect(&mut self) {
        self.log.lock().unwrap().calls.push(WifiCall::Disconnect);
    }

    fn start_access_point(&mut self, ap: &AccessPointConfig) -> Result<(), ConnectivityError> {
        self.log
            .lock()
            .unwrap()
            .calls
            .push(WifiCall::StartAp(ap.ssid.to_string()));
        Ok(())
    }
}
