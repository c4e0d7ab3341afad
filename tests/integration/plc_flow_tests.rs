//! PLC service over the simulated modem adapter.

use plcgateway::adapters::uart::SimModem;
use plcgateway::error::{CommandError, TransportError};
use plcgateway::plc::bringup;
use plcgateway::plc::{LinkEvents, PlcService, PlcTransport, TransportTiming};
use std::sync::Arc;
use std::time::Duration;

fn timing() -> TransportTiming {
    TransportTiming {
        wait_slice: Duration::from_millis(5),
        ..TransportTiming::default()
    }
}

fn service(modem: impl FnOnce(Arc<LinkEvents>) -> SimModem) -> PlcService<PlcTransport<SimModem>> {
    let events = Arc::new(LinkEvents::new());
    let link = modem(Arc::clone(&events));
    let (transport, receiver) = PlcTransport::new(link, events, timing());
    std::thread::spawn(move || receiver.run());
    PlcService::new(transport, 1)
}

#[test]
fn module_configuration_succeeds() {
    let svc = service(SimModem::new);
    svc.configure_module().unwrap();
}

#[test]
fn bring_up_needs_no_retry_on_healthy_modem() {
    let svc = Arc::new(service(SimModem::new));
    let mut init = bringup::bring_up(svc, Duration::ZERO);
    assert_eq!(init.handler().attempts(), 1);
    assert!(!init.run_pending());
}

#[test]
fn topology_serializes_to_wire_shape() {
    let svc = service(|events| {
        SimModem::new(events).with_topology([
            "C1122334455667,1,x,x,1,10,5,2",
            "C8899AABBCCDD,2,x,x,0,20,8,1",
            "garbage",
        ])
    });

    let scan = svc.get_topology().unwrap();
    assert_eq!(scan.malformed, 1);
    assert_eq!(scan.dropped, 0);

    let json: serde_json::Value = serde_json::from_str(&scan.topology.to_json().unwrap()).unwrap();
    assert_eq!(json["cco"][0]["mac"], "C1:12:23:34:45:56");
    assert_eq!(json["cco"][0]["snr"], 10);
    assert_eq!(json["cco"][0]["attenuation"], 5);
    assert_eq!(json["sta"][0]["mac"], "C8:89:9A:AB:BC:CD");
    assert_eq!(json["sta"][0]["id"], 2);
    assert_eq!(json["sta"][0]["phase"], 1);
}

#[test]
fn fourth_concentrator_is_dropped() {
    let svc = service(|events| {
        SimModem::new(events).with_topology([
            "A10000000001,1,x,x,1,1,1,1",
            "A10000000002,2,x,x,1,1,1,1",
            "A10000000003,3,x,x,1,1,1,1",
            "A10000000004,4,x,x,1,1,1,1",
        ])
    });

    let scan = svc.get_topology().unwrap();
    assert!(scan.found);
    assert_eq!(scan.topology.concentrators().len(), 3);
    assert_eq!(scan.dropped, 1);
}

#[test]
fn empty_mesh_is_not_an_error() {
    let svc = service(SimModem::new);
    let scan = svc.get_topology().unwrap();
    assert!(!scan.found);
    assert!(scan.topology.is_empty());
}

#[test]
fn raw_command_returns_modem_verdict() {
    let svc = service(SimModem::new);
    let r = svc.send_raw_command("AT+UNKNOWN").unwrap();
    assert!(r.is_complete());
    assert!(!r.success());

    let r = svc.send_raw_command("AT+MODE=2\r\n").unwrap();
    assert!(r.success());
}

#[test]
fn station_output_is_accepted() {
    let svc = service(SimModem::new);
    svc.set_station_output("C8:89:9A:AB:BC:CD", 0).unwrap();
    svc.set_station_output("C8899AABBCCD", 100).unwrap();
    assert_eq!(
        svc.set_station_output("C8:89:9A", 50),
        Err(CommandError::InvalidMac)
    );
}

#[test]
fn unanswered_module_reports_timeout() {
    let events = Arc::new(LinkEvents::new());
    let mut modem = SimModem::new(Arc::clone(&events));
    modem.silent = true;
    let (transport, _receiver) = PlcTransport::new(
        modem,
        events,
        TransportTiming {
            wait_slice: Duration::from_millis(1),
            wait_slices: 2,
            ..TransportTiming::default()
        },
    );
    let svc = PlcService::new(transport, 1);
    assert_eq!(
        svc.configure_module(),
        Err(CommandError::Transport(TransportError::ResponseTimeout))
    );
}
