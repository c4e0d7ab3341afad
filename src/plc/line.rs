//! Line classifier for modem output.
//!
//! Every line the modem emits is exactly one of:
//!
//! ```text
//!   "...ERROR..." / "...FAIL..."  → Result(failure)
//!   "...OK..."                    → Result(success)
//!   no ':'                        → Notification   (logged, never stored)
//!   "+TAG:payload"                → Data            (echo = TAG)
//! ```
//!
//! Checks run in that order; the first match wins. A burst is the text of
//! one receive event, split on `\r`/`\n`. [`feed_burst`] walks it in
//! arrival order and applies each line to the in-flight response.

use log::{debug, info, warn};

use crate::error::DecodeError;
use crate::plc::response::CommandResponse;

/// Classification of one modem line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line<'a> {
    /// OK (`true`) or ERROR/FAIL (`false`).
    Result(bool),
    /// Unsolicited event text.
    Notification(&'a str),
    /// One data line belonging to the current command.
    Data { echo: &'a str, payload: &'a str },
}

pub fn classify(line: &str) -> Line<'_> {
    if line.contains("ERROR") || line.contains("FAIL") {
        return Line::Result(false);
    }
    if line.contains("OK") {
        return Line::Result(true);
    }
    let Some(sep) = line.find(':') else {
        return Line::Notification(line);
    };
    // Byte 0 is the '+' prefix.
    let echo = line.get(1..sep).unwrap_or("");
    Line::Data {
        echo,
        payload: &line[sep + 1..],
    }
}

/// Non-empty lines of a burst, in arrival order.
pub fn split_lines(burst: &str) -> impl Iterator<Item = &str> {
    burst
        .split(|c: char| c == '\r' || c == '\n')
        .filter(|l| !l.is_empty())
}

/// What one burst did to the in-flight exchange.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BurstSummary {
    /// A result line closed the response during this burst.
    pub released: bool,
    /// Data lines stored in the response.
    pub stored: usize,
    /// Data lines dropped (closed response, no exchange, or capacity).
    pub discarded: usize,
    pub notifications: usize,
}

/// Apply every line of `burst` to `response`.
///
/// `response` is `None` when no exchange is in flight; result and data
/// lines are then unsolicited and only logged. Data arriving after the
/// result line in the same burst is discarded.
pub fn feed_burst(burst: &str, mut response: Option<&mut CommandResponse>) -> BurstSummary {
    let mut summary = BurstSummary::default();

    for raw in split_lines(burst) {
        match classify(raw) {
            Line::Result(success) => match response.as_deref_mut() {
                Some(r) if !r.is_complete() => {
                    r.complete(success);
                    summary.released = true;
                    if !success {
                        info!("PLC: modem reported failure ({})", raw);
                    }
                }
                _ => debug!("PLC: unsolicited result line '{}'", raw),
            },
            Line::Notification(text) => {
                summary.notifications += 1;
                info!("PLC notification: {}", text);
            }
            Line::Data { echo, payload } => {
                let Some(r) = response.as_deref_mut() else {
                    summary.discarded += 1;
                    debug!("PLC: data line outside an exchange '{}'", raw);
                    continue;
                };
                match r.push_data(echo, payload) {
                    Ok(()) => summary.stored += 1,
                    Err(DecodeError::ResponseClosed) => {
                        summary.discarded += 1;
                        debug!("PLC: discarding data after result '{}'", raw);
                    }
                    Err(e) => {
                        summary.discarded += 1;
                        warn!("PLC: dropped data line '{}': {}", raw, e);
                    }
                }
            }
        }
    }

    summary
}
