//! PLC modem protocol engine.
//!
//! ```text
//!   PlcService ──▶ PlcTransport ──▶ SerialLink (UART)
//!       │               ▲
//!       │          PlcReceiver ── line::feed_burst ──▶ CommandResponse
//!       ▼
//!   topology::decode
//! ```

pub mod bringup;
pub mod commands;
pub mod line;
pub mod response;
pub mod service;
pub mod topology;
pub mod transport;

pub use response::CommandResponse;
pub use service::PlcService;
pub use topology::{MacAddress, Node, NodeRole, Topology, TopologyScan};
pub use transport::{LinkEvents, PlcReceiver, PlcTransport, TransportTiming, UartEvent};
