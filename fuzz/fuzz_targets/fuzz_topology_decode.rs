//! Fuzz target: `topology::decode`
//!
//! Splits arbitrary input into candidate data lines and decodes them as a
//! topology response. Capacity and line accounting must always hold.
//!
//! cargo fuzz run fuzz_topology_decode

#![no_main]

use libfuzzer_sys::fuzz_target;
use plcgateway::plc::topology::{self, MAX_CONCENTRATORS, MAX_STATIONS};

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let lines: Vec<&str> = text.split('\n').collect();

    let scan = topology::decode(&lines);
    assert!(scan.topology.concentrators().len() <= MAX_CONCENTRATORS);
    assert!(scan.topology.stations().len() <= MAX_STATIONS);
    assert_eq!(
        scan.topology.len() + scan.dropped + scan.malformed,
        lines.len()
    );

    if let Ok(json) = scan.topology.to_json() {
        assert!(json.starts_with("{\"cco\":["));
    }
});
