//! Connectivity sequencer and provisioning stage, driven cooperatively.

use plcgateway::config::GatewayConfig;
use plcgateway::wifi::credentials::{CREDENTIAL_NAMESPACE, PASSWORD_KEY, SSID_KEY};
use plcgateway::wifi::{Connectivity, ConnectivityConfig, NetEvent, WifiPolicy, WifiState};
use std::time::{Duration, Instant};

use crate::mock_hw::{MemStorage, MockWifi, WifiCall};

fn policy() -> WifiPolicy {
    WifiPolicy {
        max_reconnect_attempts: 5,
        settle_delay: Duration::ZERO,
    }
}

fn stored(ssid: &str, password: &str) -> MemStorage {
    let storage = MemStorage::default();
    {
        let mut map = storage.map.lock().unwrap();
        map.insert(format!("{CREDENTIAL_NAMESPACE}::{SSID_KEY}"), ssid.as_bytes().to_vec());
        map.insert(
            format!("{CREDENTIAL_NAMESPACE}::{PASSWORD_KEY}"),
            password.as_bytes().to_vec(),
        );
    }
    storage
}

fn connectivity(wifi: &MockWifi, storage: &MemStorage) -> Connectivity<MockWifi, MemStorage> {
    Connectivity::new(
        wifi.clone(),
        storage.clone(),
        policy(),
        GatewayConfig::default().access_point(),
    )
}

#[test]
fn first_boot_provisions_then_persists_on_connect() {
    let wifi = MockWifi::default();
    let storage = MemStorage::default();
    let mut c = connectivity(&wifi, &storage);
    let handle = c.handle();

    c.boot();
    c.pump(10);
    assert_eq!(handle.state(), WifiState::Provisioning);
    assert_eq!(wifi.count(&WifiCall::StartAp("PowerLine".into())), 1);
    assert_eq!(wifi.count(&WifiCall::Connect), 0);

    handle.request_connect(ConnectivityConfig::new("Home", "password123").unwrap());
    c.pump(10);
    assert_eq!(handle.state(), WifiState::Connecting);
    assert_eq!(wifi.count(&WifiCall::SetConfig("Home".into())), 1);
    assert_eq!(wifi.count(&WifiCall::Connect), 1);
    // Not persisted until the station actually comes up.
    assert_eq!(storage.get(CREDENTIAL_NAMESPACE, SSID_KEY), None);

    handle.on_net_event(NetEvent::StaConnected);
    handle.on_net_event(NetEvent::GotAddress);
    c.pump(10);
    assert_eq!(handle.state(), WifiState::Connected);
    assert_eq!(storage.get(CREDENTIAL_NAMESPACE, SSID_KEY).as_deref(), Some("Home"));
    assert_eq!(
        storage.get(CREDENTIAL_NAMESPACE, PASSWORD_KEY).as_deref(),
        Some("password123")
    );
}

#[test]
fn unchanged_credentials_are_not_rewritten() {
    let wifi = MockWifi::default();
    let storage = stored("Home", "password123");
    let mut c = connectivity(&wifi, &storage);
    let handle = c.handle();

    c.boot();
    c.pump(10);
    handle.on_net_event(NetEvent::GotAddress);
    c.pump(10);
    assert_eq!(handle.state(), WifiState::Connected);
    assert_eq!(storage.write_count(), 0);
}

#[test]
fn lost_link_reconnects_with_same_credentials() {
    let wifi = MockWifi::default();
    let storage = stored("Home", "password123");
    let mut c = connectivity(&wifi, &storage);
    let handle = c.handle();

    c.boot();
    c.pump(10);
    handle.on_net_event(NetEvent::GotAddress);
    c.pump(10);
    wifi.clear();

    handle.on_net_event(NetEvent::StaDisconnected);
    c.pump(10);
    assert_eq!(handle.state(), WifiState::Reconnecting);
    assert_eq!(wifi.calls(), [WifiCall::Connect]);
    assert_eq!(c.sequencer().reconnect_attempts(), 1);

    handle.on_net_event(NetEvent::GotAddress);
    c.pump(10);
    assert_eq!(handle.state(), WifiState::Connected);
    assert_eq!(c.sequencer().reconnect_attempts(), 0);
}

#[test]
fn refused_connect_leaves_dispatchers_idle() {
    let wifi = MockWifi::failing(u32::MAX);
    let storage = stored("Home", "password123");
    let mut c = connectivity(&wifi, &storage);

    c.boot();
    // Connect uploads and fails, one Reconnect is tried, then nothing.
    assert_eq!(c.pump(10_000), 2);
    assert_eq!(wifi.count(&WifiCall::Connect), 2);
    assert_eq!(c.sequencer().reconnect_attempts(), 1);
    assert_eq!(c.pump(10_000), 0);
}

#[test]
fn disconnect_events_drive_reconnects_until_fallback() {
    let wifi = MockWifi::failing(u32::MAX);
    let storage = stored("Home", "password123");
    let mut c = connectivity(&wifi, &storage);
    let handle = c.handle();

    c.boot();
    c.pump(10);
    for _ in 0..4 {
        handle.on_net_event(NetEvent::StaDisconnected);
        assert!(c.pump(100) < 100);
    }
    assert_eq!(c.sequencer().reconnect_attempts(), 5);
    assert_eq!(wifi.count(&WifiCall::Connect), 6);
    assert_eq!(wifi.count(&WifiCall::SetConfig("Home".into())), 1);

    // Budget spent: the next loss re-evaluates stored credentials.
    handle.on_net_event(NetEvent::StaDisconnected);
    assert!(c.pump(100) < 100);
    assert_eq!(wifi.count(&WifiCall::SetConfig("Home".into())), 2);
    assert_eq!(wifi.count(&WifiCall::Connect), 8);
    assert_eq!(c.sequencer().reconnect_attempts(), 1);
}

#[test]
fn request_during_pending_connect_is_not_lost() {
    let wifi = MockWifi::default();
    let storage = stored("Home", "password123");
    let mut c = connectivity(&wifi, &storage);
    let handle = c.handle();

    c.boot();
    handle.request_connect(ConnectivityConfig::new("Guest", "guest-pass").unwrap());
    c.pump(10);

    assert_eq!(
        wifi.calls(),
        [
            WifiCall::Disconnect,
            WifiCall::SetConfig("Home".into()),
            WifiCall::Connect,
            WifiCall::Disconnect,
            WifiCall::SetConfig("Guest".into()),
            WifiCall::Connect,
        ]
    );
    assert_eq!(handle.current_config().ssid(), "Guest");
}

#[test]
fn latest_request_wins() {
    let wifi = MockWifi::default();
    let storage = stored("Home", "password123");
    let mut c = connectivity(&wifi, &storage);
    let handle = c.handle();

    c.boot();
    c.pump(10);
    wifi.clear();
    handle.request_connect(ConnectivityConfig::new("First", "").unwrap());
    handle.request_connect(ConnectivityConfig::new("Second", "").unwrap());
    c.pump(10);

    assert_eq!(wifi.count(&WifiCall::SetConfig("First".into())), 0);
    assert_eq!(wifi.count(&WifiCall::SetConfig("Second".into())), 1);
    assert_eq!(handle.current_config().ssid(), "Second");
}

#[test]
fn new_configuration_waits_for_settle_delay() {
    let wifi = MockWifi::default();
    let storage = stored("Home", "password123");
    let mut c = Connectivity::new(
        wifi.clone(),
        storage.clone(),
        WifiPolicy {
            max_reconnect_attempts: 5,
            settle_delay: Duration::from_millis(40),
        },
        GatewayConfig::default().access_point(),
    );
    let handle = c.handle();

    c.boot();
    c.pump(10);
    handle.request_connect(ConnectivityConfig::new("Guest", "").unwrap());
    let started = Instant::now();
    c.pump(10);
    assert!(started.elapsed() >= Duration::from_millis(40));
    assert_eq!(wifi.count(&WifiCall::SetConfig("Guest".into())), 1);

    handle.request_disconnect();
    let started = Instant::now();
    c.pump(10);
    assert!(started.elapsed() >= Duration::from_millis(40));
    assert_eq!(handle.state(), WifiState::Provisioning);
}

#[test]
fn disconnect_request_erases_credentials_and_provisions() {
    let wifi = MockWifi::default();
    let storage = stored("Home", "password123");
    let mut c = connectivity(&wifi, &storage);
    let handle = c.handle();

    c.boot();
    c.pump(10);
    handle.request_disconnect();
    c.pump(10);

    assert!(handle.current_config().is_empty());
    assert_eq!(storage.get(CREDENTIAL_NAMESPACE, SSID_KEY), None);
    assert_eq!(storage.get(CREDENTIAL_NAMESPACE, PASSWORD_KEY), None);
    assert_eq!(handle.state(), WifiState::Provisioning);
    assert_eq!(wifi.count(&WifiCall::StartAp("PowerLine".into())), 1);
}

#[test]
fn reprovision_keeps_stored_credentials() {
    let wifi = MockWifi::default();
    let storage = stored("Home", "password123");
    let mut c = connectivity(&wifi, &storage);
    let handle = c.handle();

    c.boot();
    c.pump(10);
    handle.request_reprovision();
    c.pump(10);

    assert_eq!(handle.state(), WifiState::Provisioning);
    assert_eq!(storage.get(CREDENTIAL_NAMESPACE, SSID_KEY).as_deref(), Some("Home"));
}

#[test]
fn failed_new_configuration_falls_back_to_stored() {
    let wifi = MockWifi::default();
    let storage = stored("Home", "password123");
    let mut c = connectivity(&wifi, &storage);
    let handle = c.handle();

    c.boot();
    c.pump(10);
    wifi.log.lock().unwrap().connect_failures = 1;
    wifi.clear();

    handle.request_connect(ConnectivityConfig::new("Guest", "").unwrap());
    c.pump(10);

    assert_eq!(
        wifi.calls(),
        [
            WifiCall::Disconnect,
            WifiCall::SetConfig("Guest".into()),
            WifiCall::Connect,
            WifiCall::Disconnect,
            WifiCall::SetConfig("Home".into()),
            WifiCall::Connect,
        ]
    );
    assert_eq!(handle.current_config().ssid(), "Home");
}
