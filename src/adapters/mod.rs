//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter | Implements   | Connects to                        |
//! |---------|--------------|------------------------------------|
//! | `nvs`   | ConfigPort   | NVS / in-memory store              |
//! |         | StoragePort  |                                    |
//! | `uart`  | SerialLink   | ESP-IDF UART1 driver / `SimModem`  |
//! | `wifi`  | LinkControl  | ESP-IDF WiFi STA + soft-AP         |

pub mod nvs;
pub mod uart;
pub mod wifi;
