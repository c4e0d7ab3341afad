//! PLC modem UART adapter.
//!
//! Implements [`SerialLink`] and feeds the transport's [`LinkEvents`]
//! queue.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: UART1 through the ESP-IDF driver, 8E1,
//!   1024-byte rings. A small pump task drains the driver's event queue
//!   into [`LinkEvents`].
//! - **all other targets**: [`SimModem`], a scripted modem that answers
//!   the gateway's AT commands in-process.

use std::sync::Arc;

use log::{debug, info};

use crate::app::ports::{SerialError, SerialLink};
use crate::plc::transport::{LinkEvents, UartEvent};

#[cfg(target_os = "espidf")]
pub use espidf::{UartLink, UartSettings};

#[cfg(target_os = "espidf")]
mod espidf {
    use super::*;
    use crate::drivers::task_pin::{self, Core};
    use crate::plc::transport::{RX_BUFFER_SIZE, UART_EVENT_QUEUE_DEPTH};
    use esp_idf_svc::sys::*;
    use log::warn;

    const UART_PORT: uart_port_t = 1;
    const TX_BUFFER_SIZE: i32 = 1024;
    const PUMP_TASK_NAME: &str = "plc-uart\0";
    const PUMP_TASK_PRIORITY: u8 = 12;
    const PUMP_TASK_STACK_KB: usize = 3;

    #[derive(Debug, Clone, Copy)]
    pub struct UartSettings {
        pub baud_rate: u32,
        pub tx_pin: u8,
        pub rx_pin: u8,
    }

    /// Driver event queue handle, moved into the pump task.
    struct EventQueue(QueueHandle_t);

    // SAFETY: FreeRTOS queues are safe to use from any task.
    unsafe impl Send for EventQueue {}

    pub struct UartLink {
        _private: (),
    }

    impl UartLink {
        /// Install the UART driver and start forwarding its events.
        pub fn open(settings: UartSettings, events: Arc<LinkEvents>) -> Result<Self, EspError> {
            let config = uart_config_t {
                baud_rate: settings.baud_rate as i32,
                data_bits: uart_word_length_t_UART_DATA_8_BITS,
                parity: uart_parity_t_UART_PARITY_EVEN,
                stop_bits: uart_stop_bits_t_UART_STOP_BITS_1,
                flow_ctrl: uart_hw_flowcontrol_t_UART_HW_FLOWCTRL_DISABLE,
                ..Default::default()
            };

            let mut queue: QueueHandle_t = core::ptr::null_mut();
            // SAFETY: called once at boot; `config` and `queue` outlive the calls.
            unsafe {
                esp!(uart_param_config(UART_PORT, &config))?;
                esp!(uart_set_pin(
                    UART_PORT,
                    i32::from(settings.tx_pin),
                    i32::from(settings.rx_pin),
                    UART_PIN_NO_CHANGE,
                    UART_PIN_NO_CHANGE,
                ))?;
                esp!(uart_driver_install(
                    UART_PORT,
                    RX_BUFFER_SIZE as i32,
                    TX_BUFFER_SIZE,
                    UART_EVENT_QUEUE_DEPTH as i32,
                    &mut queue,
                    0,
                ))?;
            }
            info!(
                "UART: PLC link up at {} baud 8E1 (tx={}, rx={})",
                settings.baud_rate, settings.tx_pin, settings.rx_pin
            );

            let queue = EventQueue(queue);
            if let Err(e) = task_pin::spawn_on_core(
                Core::Pro,
                PUMP_TASK_PRIORITY,
                PUMP_TASK_STACK_KB,
                PUMP_TASK_NAME,
                move || pump_events(queue, events),
            ) {
                warn!("UART: event pump failed to start ({})", e);
                return Err(EspError::from_infallible::<ESP_FAIL>());
            }

            Ok(Self { _private: () })
        }
    }

    fn pump_events(queue: EventQueue, events: Arc<LinkEvents>) {
        // SAFETY: uart_event_t is a plain C struct; all-zero is valid.
        let mut event: uart_event_t = unsafe { core::mem::zeroed() };
        loop {
            // SAFETY: `event` is a valid uart_event_t-sized buffer.
            let got = unsafe {
                xQueueReceive(queue.0, &mut event as *mut _ as *mut _, u32::MAX)
            };
            if got == 0 {
                continue;
            }
            #[allow(non_upper_case_globals)]
            let mapped = match event.type_ {
                uart_event_type_t_UART_DATA => UartEvent::DataArrived(event.size),
                uart_event_type_t_UART_FIFO_OVF => UartEvent::Overflow,
                uart_event_type_t_UART_BUFFER_FULL => UartEvent::BufferFull,
                other => {
                    debug!("UART: event {} ignored", other);
                    continue;
                }
            };
            events.post(mapped);
        }
    }

    impl SerialLink for UartLink {
        fn write(&mut self, bytes: &[u8]) -> Result<usize, SerialError> {
            // SAFETY: the driver copies `bytes` into its TX ring before returning.
            let n = unsafe { uart_write_bytes(UART_PORT, bytes.as_ptr() as *const _, bytes.len()) };
            if n < 0 {
                return Err(SerialError::Io);
            }
            Ok(n as usize)
        }

        fn read(&mut self, buf: &mut [u8]) -> usize {
            // SAFETY: `buf` is valid for `buf.len()` bytes; zero timeout.
            let n = unsafe { uart_read_bytes(UART_PORT, buf.as_mut_ptr() as *mut _, buf.len() as u32, 0) };
            n.max(0) as usize
        }

        fn flush_input(&mut self) {
            // SAFETY: driver installed in `open`.
            unsafe {
                uart_flush_input(UART_PORT);
            }
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Simulation
// ───────────────────────────────────────────────────────────────

/// In-process modem answering the gateway's command set.
///
/// | Command            | Reply                                  |
/// |--------------------|----------------------------------------|
/// | `++`               | `OK`                                   |
/// | `AT+MODE=2`        | `OK`                                   |
/// | `AT+IOCTRL=...`    | `OK`                                   |
/// | `AT+TOPOINFO=1,4`  | one `+TOPOINFO:` line per node, `OK`   |
/// | anything else      | `ERROR`                                |
#[cfg(not(target_os = "espidf"))]
pub struct SimModem {
    events: Arc<LinkEvents>,
    topology: Vec<String>,
    tx: String,
    rx: Vec<u8>,
    commands: Vec<String>,
    /// Swallow commands without answering when set.
    pub silent: bool,
}

#[cfg(not(target_os = "espidf"))]
impl SimModem {
    pub fn new(events: Arc<LinkEvents>) -> Self {
        info!("UART(sim): simulated PLC modem");
        Self {
            events,
            topology: Vec::new(),
            tx: String::new(),
            rx: Vec::new(),
            commands: Vec::new(),
            silent: false,
        }
    }

    /// Topology payloads reported by `AT+TOPOINFO`.
    pub fn with_topology<I, S>(mut self, payloads: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.topology = payloads.into_iter().map(Into::into).collect();
        self
    }

    /// Every command received so far, without terminators.
    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// Queue `text` as if the modem sent it unprompted.
    pub fn inject(&mut self, text: &str) {
        self.rx.extend_from_slice(text.as_bytes());
        self.events.post(UartEvent::DataArrived(text.len()));
    }

    fn take_commands(&mut self) -> Vec<String> {
        let mut out = Vec::new();
        loop {
            if self.tx == "++" {
                out.push(core::mem::take(&mut self.tx));
                continue;
            }
            let Some(end) = self.tx.find("\r\n") else {
                return out;
            };
            let rest = self.tx.split_off(end + 2);
            let mut cmd = core::mem::replace(&mut self.tx, rest);
            cmd.truncate(end);
            out.push(cmd);
        }
    }

    fn reply_to(&self, command: &str) -> String {
        if command == "++" || command == "AT+MODE=2" || command.starts_with("AT+IOCTRL=") {
            return "OK\r\n".into();
        }
        if command == "AT+TOPOINFO=1,4" {
            let mut reply: String = self
                .topology
                .iter()
                .map(|p| format!("+TOPOINFO:{p}\r\n"))
                .collect();
            reply.push_str("OK\r\n");
            return reply;
        }
        "ERROR\r\n".into()
    }
}

#[cfg(not(target_os = "espidf"))]
impl SerialLink for SimModem {
    fn write(&mut self, bytes: &[u8]) -> Result<usize, SerialError> {
        self.tx.push_str(&String::from_utf8_lossy(bytes));
        for command in self.take_commands() {
            debug!("UART(sim) >> {:?}", command);
            self.commands.push(command.clone());
            if self.silent {
                continue;
            }
            let reply = self.reply_to(&command);
            self.inject(&reply);
        }
        Ok(bytes.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.rx.len());
        buf[..n].copy_from_slice(&self.rx[..n]);
        self.rx.drain(..n);
        n
    }

    fn flush_input(&mut self) {
        self.rx.clear();
    }
}
