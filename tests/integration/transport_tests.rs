//! Serial transport against a modem that answers from another thread.

use plcgateway::error::{CommandError, TransportError};
use plcgateway::plc::{
    CommandResponse, LinkEvents, MacAddress, NodeRole, PlcService, PlcTransport, TransportTiming,
};
use std::sync::Arc;
use std::time::Duration;

use crate::mock_hw::MockModem;

fn timing() -> TransportTiming {
    TransportTiming {
        write_attempts: 5,
        exchange_attempts: 5,
        wait_slice: Duration::from_millis(5),
        wait_slices: 40,
    }
}

fn transport(modem: MockModem, events: Arc<LinkEvents>) -> PlcTransport<MockModem> {
    let (transport, receiver) = PlcTransport::new(modem, events, timing());
    std::thread::spawn(move || receiver.run());
    transport
}

#[test]
fn concurrent_senders_never_overlap() {
    let events = Arc::new(LinkEvents::new());
    let modem = MockModem::new(&events, Duration::from_millis(2));
    let observer = modem.clone();
    let transport = Arc::new(transport(modem, events));

    let workers: Vec<_> = (0..4)
        .map(|n| {
            let t = Arc::clone(&transport);
            std::thread::spawn(move || {
                for i in 0..5 {
                    let mut r = CommandResponse::new();
                    t.send(&format!("AT+PING={n},{i}\r\n"), &mut r).unwrap();
                    assert!(r.success());
                }
            })
        })
        .collect();
    for w in workers {
        w.join().unwrap();
    }

    assert_eq!(observer.writes().len(), 20);
    assert_eq!(observer.overlaps(), 0);
}

#[test]
fn topology_query_end_to_end() {
    let events = Arc::new(LinkEvents::new());
    let modem = MockModem::new(&events, Duration::from_millis(1));
    modem.reply(
        "+TOPOINFO:C1122334455667,1,x,x,1,10,5,2\r\n\
         +TOPOINFO:C8899AABBCCDD,2,x,x,0,20,8,1\r\n\
         OK\r\n",
    );
    let observer = modem.clone();
    let service = PlcService::new(transport(modem, events), 1);

    let scan = service.get_topology().unwrap();
    assert!(scan.found);
    assert_eq!(observer.writes(), ["AT+TOPOINFO=1,4\r\n"]);

    let cco = scan.topology.concentrators();
    assert_eq!(cco.len(), 1);
    assert_eq!(cco[0].mac, MacAddress([0xC1, 0x12, 0x23, 0x34, 0x45, 0x56]));
    assert_eq!(cco[0].id, 1);
    assert_eq!(cco[0].role, NodeRole::Concentrator);
    assert_eq!(cco[0].snr, 10);
    assert_eq!(cco[0].attenuation, 5);
    assert_eq!(cco[0].phase, 2);

    let sta = scan.topology.stations();
    assert_eq!(sta.len(), 1);
    assert_eq!(sta[0].mac, MacAddress([0xC8, 0x89, 0x9A, 0xAB, 0xBC, 0xCD]));
    assert_eq!(sta[0].id, 2);
    assert_eq!(sta[0].role, NodeRole::Station);
    assert_eq!(sta[0].snr, 20);
    assert_eq!(sta[0].attenuation, 8);
    assert_eq!(sta[0].phase, 1);
}

#[test]
fn silent_modem_times_out_after_five_transmissions() {
    let events = Arc::new(LinkEvents::new());
    let modem = MockModem::silent(&events);
    let observer = modem.clone();
    let (transport, _receiver) = PlcTransport::new(
        modem,
        events,
        TransportTiming {
            wait_slice: Duration::from_millis(1),
            wait_slices: 3,
            ..timing()
        },
    );

    let mut r = CommandResponse::new();
    assert_eq!(
        transport.send("AT+TOPOINFO=1,4\r\n", &mut r),
        Err(TransportError::ResponseTimeout)
    );
    assert!(!r.success());
    assert_eq!(observer.writes().len(), 5);
}

#[test]
fn rejected_output_command_surfaces_as_rejected() {
    let events = Arc::new(LinkEvents::new());
    let modem = MockModem::new(&events, Duration::from_millis(1));
    modem.reply("ERROR\r\n");
    let service = PlcService::new(transport(modem, events), 1);

    assert_eq!(
        service.set_station_output("AA:BB:CC:DD:EE:FF", 40),
        Err(CommandError::Rejected)
    );
}

#[test]
fn out_of_range_output_never_reaches_the_modem() {
    let events = Arc::new(LinkEvents::new());
    let modem = MockModem::new(&events, Duration::from_millis(1));
    let observer = modem.clone();
    let service = PlcService::new(transport(modem, events), 1);

    assert_eq!(
        service.set_station_output("AA:BB:CC:DD:EE:FF", 101),
        Err(CommandError::OutputOutOfRange(101))
    );
    service.set_station_output("aa:bb:cc:dd:ee:ff", 100).unwrap();
    assert_eq!(observer.writes(), ["AT+IOCTRL=AABBCCDDEEFF,1,100\r\n"]);
}
