//! Fuzz target: `line::feed_burst`
//!
//! Feeds arbitrary receive bursts into an open response and checks that
//! the response never grows past its line capacity and stays closed once
//! a result line has been applied.
//!
//! cargo fuzz run fuzz_burst_parser

#![no_main]

use libfuzzer_sys::fuzz_target;
use plcgateway::plc::line;
use plcgateway::plc::response::{CommandResponse, MAX_RESPONSE_LINES};

fuzz_target!(|data: &[u8]| {
    let burst = String::from_utf8_lossy(data);
    let mut response = CommandResponse::new();

    let summary = line::feed_burst(&burst, Some(&mut response));
    assert!(response.line_count() <= MAX_RESPONSE_LINES);
    assert_eq!(summary.released, response.is_complete());

    // A second pass over the same bytes must not reopen a closed response.
    let before = response.line_count();
    let was_complete = response.is_complete();
    let _ = line::feed_burst(&burst, Some(&mut response));
    if was_complete {
        assert_eq!(response.line_count(), before);
    }

    // No exchange in flight: everything is only logged.
    let _ = line::feed_burst(&burst, None);
});
