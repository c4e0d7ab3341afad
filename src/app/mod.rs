//! Application boundary.
//!
//! The gateway's domain logic lives in [`crate::plc`] and [`crate::wifi`];
//! every interaction with hardware happens through the **port traits**
//! defined in [`ports`], keeping both layers testable on the host.

pub mod ports;
