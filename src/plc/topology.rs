//! PLC mesh topology: node records and the decoder for `AT+TOPOINFO` data.
//!
//! Each data line carries comma-separated fields in fixed order:
//!
//! ```text
//!   mac-hex , id , - , - , role , snr , attenuation , phase
//!   C1122334455667,1,x,x,1,10,5,2
//! ```
//!
//! Only the first 12 hex digits of the MAC field are decoded. Role code
//! [`ROLE_CODE_CONCENTRATOR`] marks a concentrator; anything else is a
//! station. Lists are capped at [`MAX_CONCENTRATORS`] / [`MAX_STATIONS`].

use core::fmt;

use log::warn;
use serde::{Serialize, Serializer};

use crate::error::DecodeError;

pub const MAX_CONCENTRATORS: usize = 3;
pub const MAX_STATIONS: usize = 10;

/// Role code the modem reports for a concentrator (CCO).
pub const ROLE_CODE_CONCENTRATOR: u16 = 1;

const MAC_HEX_DIGITS: usize = 12;
const TOPOLOGY_FIELDS: usize = 8;

// ── MAC address ───────────────────────────────────────────────

#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    /// Parse `AABBCCDDEEFF` or `AA:BB:CC:DD:EE:FF`.
    pub fn parse(text: &str) -> Result<Self, DecodeError> {
        let mut digits = heapless::String::<MAC_HEX_DIGITS>::new();
        for ch in text.chars().filter(|&c| c != ':') {
            digits
                .push(ch)
                .map_err(|()| DecodeError::MalformedResponse("MAC too long"))?;
        }
        if digits.len() != MAC_HEX_DIGITS {
            return Err(DecodeError::MalformedResponse("MAC too short"));
        }
        Self::from_hex_digits(digits.as_bytes())
    }

    /// Decode the first 12 hex digits of a topology MAC field.
    pub fn from_field(field: &str) -> Result<Self, DecodeError> {
        let digits = field
            .as_bytes()
            .get(..MAC_HEX_DIGITS)
            .ok_or(DecodeError::MalformedResponse("MAC field under 12 digits"))?;
        Self::from_hex_digits(digits)
    }

    fn from_hex_digits(digits: &[u8]) -> Result<Self, DecodeError> {
        let mut bytes = [0u8; 6];
        for (byte, pair) in bytes.iter_mut().zip(digits.chunks_exact(2)) {
            let hi = hex_value(pair[0]).ok_or(DecodeError::MalformedResponse("MAC not hex"))?;
            let lo = hex_value(pair[1]).ok_or(DecodeError::MalformedResponse("MAC not hex"))?;
            *byte = (hi << 4) | lo;
        }
        Ok(Self(bytes))
    }

    /// Colon-free uppercase hex, as the modem expects in commands.
    pub fn to_hex(&self) -> heapless::String<MAC_HEX_DIGITS> {
        const DIGITS: &[u8; 16] = b"0123456789ABCDEF";
        let mut out = heapless::String::new();
        for b in self.0 {
            // 6 bytes → 12 chars, always fits.
            let _ = out.push(DIGITS[(b >> 4) as usize] as char);
            let _ = out.push(DIGITS[(b & 0x0F) as usize] as char);
        }
        out
    }
}

fn hex_value(c: u8) -> Option<u8> {
    (c as char).to_digit(16).map(|d| d as u8)
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

impl fmt::Debug for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ── Nodes ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    Concentrator,
    Station,
}

impl NodeRole {
    pub fn from_code(code: u16) -> Self {
        if code == ROLE_CODE_CONCENTRATOR {
            Self::Concentrator
        } else {
            Self::Station
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Node {
    pub mac: MacAddress,
    pub id: u16,
    #[serde(skip)]
    pub role: NodeRole,
    pub attenuation: i16,
    pub snr: i16,
    pub phase: u8,
}

impl Node {
    /// Decode one topology data payload.
    ///
    /// A numeric field that does not parse, or does not fit its type, makes
    /// the whole line malformed. It is never read as zero, so a garbled
    /// metric cannot pose as a real measurement.
    pub fn parse(payload: &str) -> Result<Self, DecodeError> {
        let mut fields: heapless::Vec<&str, TOPOLOGY_FIELDS> = heapless::Vec::new();
        for part in payload.split(',').take(TOPOLOGY_FIELDS) {
            // take() bounds the count to capacity.
            let _ = fields.push(part.trim());
        }
        if fields.len() < TOPOLOGY_FIELDS {
            return Err(DecodeError::MalformedResponse("missing topology fields"));
        }

        Ok(Self {
            mac: MacAddress::from_field(fields[0])?,
            id: field(&fields, 1, "id")?,
            role: NodeRole::from_code(field(&fields, 4, "role")?),
            attenuation: field(&fields, 6, "attenuation")?,
            snr: field(&fields, 5, "snr")?,
            phase: field(&fields, 7, "phase")?,
        })
    }
}

fn field<T: core::str::FromStr>(
    fields: &[&str],
    index: usize,
    what: &'static str,
) -> Result<T, DecodeError> {
    fields[index]
        .parse()
        .map_err(|_| DecodeError::MalformedResponse(what))
}

// ── Topology ──────────────────────────────────────────────────

/// Snapshot of the mesh, serialized as `{"cco":[...],"sta":[...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Topology {
    #[serde(rename = "cco")]
    concentrators: heapless::Vec<Node, MAX_CONCENTRATORS>,
    #[serde(rename = "sta")]
    stations: heapless::Vec<Node, MAX_STATIONS>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// File `node` under its role. Fails when that list is full.
    pub fn insert(&mut self, node: Node) -> Result<(), DecodeError> {
        let pushed = match node.role {
            NodeRole::Concentrator => self.concentrators.push(node).is_ok(),
            NodeRole::Station => self.stations.push(node).is_ok(),
        };
        if pushed {
            Ok(())
        } else {
            Err(DecodeError::CapacityExceeded)
        }
    }

    pub fn concentrators(&self) -> &[Node] {
        &self.concentrators
    }

    pub fn stations(&self) -> &[Node] {
        &self.stations
    }

    pub fn len(&self) -> usize {
        self.concentrators.len() + self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Result of decoding one topology response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopologyScan {
    pub topology: Topology,
    /// The modem returned at least one data line.
    pub found: bool,
    /// Nodes that did not fit their role's list.
    pub dropped: usize,
    /// Lines that could not be decoded.
    pub malformed: usize,
}

/// Decode topology data lines into a [`TopologyScan`].
pub fn decode<S: AsRef<str>>(lines: &[S]) -> TopologyScan {
    let mut scan = TopologyScan {
        found: !lines.is_empty(),
        ..TopologyScan::default()
    };

    for line in lines {
        let line = line.as_ref();
        let node = match Node::parse(line) {
            Ok(node) => node,
            Err(e) => {
                scan.malformed += 1;
                warn!("Topology: skipping '{}': {}", line, e);
                continue;
            }
        };
        if scan.topology.insert(node).is_err() {
            scan.dropped += 1;
            warn!(
                "Topology: {:?} list full, dropping node {} ({})",
                node.role, node.id, node.mac
            );
        }
    }

    scan
}
