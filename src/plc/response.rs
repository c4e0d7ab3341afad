//! Decoded outcome of one command/response exchange.

use serde::Serialize;

use crate::error::DecodeError;

/// Data lines kept per exchange.
pub const MAX_RESPONSE_LINES: usize = 16;
/// Bytes kept per data line.
pub const MAX_LINE_LEN: usize = 128;
/// Bytes kept of the echoed command tag.
pub const MAX_ECHO_LEN: usize = 16;

pub type ResponseLine = heapless::String<MAX_LINE_LEN>;

/// Result flag, echoed command tag and data lines of one exchange.
///
/// Once [`complete`](Self::complete) records the result line, the response
/// is closed and refuses further data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandResponse {
    success: bool,
    #[serde(skip)]
    complete: bool,
    command_echo: heapless::String<MAX_ECHO_LEN>,
    lines: heapless::Vec<ResponseLine, MAX_RESPONSE_LINES>,
}

impl CommandResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` only when the modem answered OK.
    pub fn success(&self) -> bool {
        self.success
    }

    /// A result line (OK/ERROR/FAIL) has been recorded.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn command_echo(&self) -> &str {
        &self.command_echo
    }

    pub fn lines(&self) -> &[ResponseLine] {
        &self.lines
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Append one data line payload, tagging the response with `echo`.
    pub fn push_data(&mut self, echo: &str, payload: &str) -> Result<(), DecodeError> {
        if self.complete {
            return Err(DecodeError::ResponseClosed);
        }
        let line = ResponseLine::try_from(payload).map_err(|()| DecodeError::CapacityExceeded)?;
        self.lines.push(line).map_err(|_| DecodeError::CapacityExceeded)?;
        self.command_echo = crate::config::truncated(echo);
        Ok(())
    }

    /// Record the result line. Only the first call has any effect.
    pub fn complete(&mut self, success: bool) {
        if self.complete {
            return;
        }
        self.success = success;
        self.complete = true;
    }
}
