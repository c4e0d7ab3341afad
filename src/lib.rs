//! PLC gateway firmware library.
//!
//! Exposes the gateway logic for integration testing and host-side
//! simulation. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod error;
pub mod plc;
pub mod signals;
pub mod wifi;

pub mod adapters;
pub mod drivers;

mod sync;
