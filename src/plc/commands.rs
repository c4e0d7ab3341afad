//! AT command text understood by the PLC modem.

use core::fmt::Write as _;

use crate::plc::topology::MacAddress;

/// Switch the modem from data mode into AT command mode. Not terminated.
pub const ENTER_AT_MODE: &str = "++";
/// Put the modem in the gateway operating mode.
pub const SET_MODE: &str = "AT+MODE=2\r\n";
/// Query the mesh topology.
pub const TOPOLOGY_QUERY: &str = "AT+TOPOINFO=1,4\r\n";

pub const TERMINATOR: &str = "\r\n";

/// Longest output-control command: prefix, 12 hex digits, two numbers.
pub type OutputCommand = heapless::String<48>;

/// `AT+IOCTRL=<mac>,<channel>,<value>\r\n`
pub fn output_control(mac: &MacAddress, channel: u8, value: u8) -> OutputCommand {
    let mut cmd = OutputCommand::new();
    // Bounded by the type: 10 + 12 + 1 + 3 + 1 + 3 + 2 = 32 bytes.
    let _ = write!(cmd, "AT+IOCTRL={},{},{}{}", mac.to_hex(), channel, value, TERMINATOR);
    cmd
}

/// Operator text with the line terminator added when missing.
pub fn raw(text: &str) -> String {
    let mut cmd = String::from(text.trim_end_matches(|c: char| c == '\r' || c == '\n'));
    cmd.push_str(TERMINATOR);
    cmd
}
