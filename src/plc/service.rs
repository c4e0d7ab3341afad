//! Gateway-facing PLC operations built on one [`CommandChannel`].

use log::{info, warn};

use crate::app::ports::CommandChannel;
use crate::error::{CommandError, TransportError};
use crate::plc::commands;
use crate::plc::response::CommandResponse;
use crate::plc::topology::{self, MacAddress, TopologyScan};

/// Highest accepted output level.
pub const MAX_OUTPUT_VALUE: u32 = 100;

pub struct PlcService<C> {
    channel: C,
    output_channel: u8,
}

impl<C: CommandChannel> PlcService<C> {
    pub fn new(channel: C, output_channel: u8) -> Self {
        Self {
            channel,
            output_channel,
        }
    }

    /// Enter AT mode, then select the gateway operating mode.
    pub fn configure_module(&self) -> Result<(), CommandError> {
        self.expect_ok(commands::ENTER_AT_MODE)?;
        self.expect_ok(commands::SET_MODE)?;
        info!("PLC: module configured");
        Ok(())
    }

    /// Query and decode the mesh topology.
    ///
    /// An ERROR/FAIL result is reported as [`CommandError::Rejected`]. Data
    /// lines the modem sent before failing are not decoded.
    pub fn get_topology(&self) -> Result<TopologyScan, CommandError> {
        let response = self.expect_ok(commands::TOPOLOGY_QUERY)?;
        let scan = topology::decode(response.lines());
        info!(
            "PLC: topology {} CCO / {} STA{}",
            scan.topology.concentrators().len(),
            scan.topology.stations().len(),
            if scan.found { "" } else { " (no nodes visible)" }
        );
        Ok(scan)
    }

    /// Operator passthrough. The response is returned whatever the modem said.
    pub fn send_raw_command(&self, text: &str) -> Result<CommandResponse, TransportError> {
        let mut response = CommandResponse::new();
        self.channel.send(&commands::raw(text), &mut response)?;
        Ok(response)
    }

    /// Drive a station output to `value` percent.
    ///
    /// Range and address are checked before anything is transmitted.
    pub fn set_station_output(&self, mac: &str, value: u32) -> Result<(), CommandError> {
        if value > MAX_OUTPUT_VALUE {
            warn!("PLC: output value {} rejected", value);
            return Err(CommandError::OutputOutOfRange(value));
        }
        let mac = MacAddress::parse(mac).map_err(|_| CommandError::InvalidMac)?;
        let cmd = commands::output_control(&mac, self.output_channel, value as u8);
        self.expect_ok(&cmd)?;
        info!("PLC: station {} output → {}", mac, value);
        Ok(())
    }

    fn expect_ok(&self, command: &str) -> Result<CommandResponse, CommandError> {
        let mut response = CommandResponse::new();
        self.channel.send(command, &mut response)?;
        if response.success() {
            Ok(response)
        } else {
            Err(CommandError::Rejected)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// Answers each command from a script; records what was sent.
    struct FakeChannel {
        sent: RefCell<Vec<String>>,
        replies: RefCell<VecDeque<Result<(bool, Vec<&'static str>), TransportError>>>,
    }

    impl FakeChannel {
        fn new(replies: Vec<Result<(bool, Vec<&'static str>), TransportError>>) -> Self {
            Self {
                sent: RefCell::new(Vec::new()),
                replies: RefCell::new(replies.into()),
            }
        }
    }

    impl CommandChannel for FakeChannel {
        fn send(&self, command: &str, response: &mut CommandResponse) -> Result<(), TransportError> {
            self.sent.borrow_mut().push(command.to_string());
            let (ok, lines) = self
                .replies
                .borrow_mut()
                .pop_front()
                .unwrap_or(Ok((true, Vec::new())))?;
            for l in lines {
                response.push_data("T", l).unwrap();
            }
            response.complete(ok);
            Ok(())
        }
    }

    #[test]
    fn configure_enters_at_mode_then_sets_mode() {
        let svc = PlcService::new(FakeChannel::new(vec![]), 1);
        svc.configure_module().unwrap();
        assert_eq!(*svc.channel.sent.borrow(), ["++", "AT+MODE=2\r\n"]);
    }

    #[test]
    fn configure_stops_on_rejection() {
        let svc = PlcService::new(FakeChannel::new(vec![Ok((false, vec![]))]), 1);
        assert_eq!(svc.configure_module(), Err(CommandError::Rejected));
        assert_eq!(svc.channel.sent.borrow().len(), 1);
    }

    #[test]
    fn output_out_of_range_sends_nothing() {
        let svc = PlcService::new(FakeChannel::new(vec![]), 1);
        assert_eq!(
            svc.set_station_output("AA:BB:CC:DD:EE:FF", 101),
            Err(CommandError::OutputOutOfRange(101))
        );
        assert!(svc.channel.sent.borrow().is_empty());
    }

    #[test]
    fn output_bounds_are_accepted() {
        let svc = PlcService::new(FakeChannel::new(vec![]), 1);
        svc.set_station_output("AA:BB:CC:DD:EE:FF", 0).unwrap();
        svc.set_station_output("AA:BB:CC:DD:EE:FF", 100).unwrap();
        assert_eq!(
            *svc.channel.sent.borrow(),
            [
                "AT+IOCTRL=AABBCCDDEEFF,1,0\r\n",
                "AT+IOCTRL=AABBCCDDEEFF,1,100\r\n"
            ]
        );
    }

    #[test]
    fn bad_mac_sends_nothing() {
        let svc = PlcService::new(FakeChannel::new(vec![]), 1);
        assert_eq!(
            svc.set_station_output("not-a-mac", 50),
            Err(CommandError::InvalidMac)
        );
        assert!(svc.channel.sent.borrow().is_empty());
    }

    #[test]
    fn topology_is_decoded_from_data_lines() {
        let svc = PlcService::new(
            FakeChannel::new(vec![Ok((
                true,
                vec!["C1122334455667,1,x,x,1,10,5,2", "C8899AABBCCDD,2,x,x,0,20,8,1"],
            ))]),
            1,
        );
        let scan = svc.get_topology().unwrap();
        assert!(scan.found);
        assert_eq!(scan.topology.concentrators().len(), 1);
        assert_eq!(scan.topology.stations().len(), 1);
        assert_eq!(*svc.channel.sent.borrow(), ["AT+TOPOINFO=1,4\r\n"]);
    }

    #[test]
    fn rejected_topology_query_discards_partial_rows() {
        let svc = PlcService::new(
            FakeChannel::new(vec![Ok((false, vec!["C1122334455667,1,x,x,1,10,5,2"]))]),
            1,
        );
        assert_eq!(svc.get_topology(), Err(CommandError::Rejected));
        assert_eq!(svc.channel.sent.borrow().len(), 1);
    }

    #[test]
    fn raw_command_returns_failed_response() {
        let svc = PlcService::new(FakeChannel::new(vec![Ok((false, vec!["detail"]))]), 1);
        let r = svc.send_raw_command("AT+FOO").unwrap();
        assert!(!r.success());
        assert_eq!(r.lines()[0].as_str(), "detail");
        assert_eq!(*svc.channel.sent.borrow(), ["AT+FOO\r\n"]);
    }

    #[test]
    fn transport_failure_propagates() {
        let svc = PlcService::new(
            FakeChannel::new(vec![Err(TransportError::ResponseTimeout)]),
            1,
        );
        assert_eq!(
            svc.get_topology().unwrap_err(),
            CommandError::Transport(TransportError::ResponseTimeout)
        );
    }
}
