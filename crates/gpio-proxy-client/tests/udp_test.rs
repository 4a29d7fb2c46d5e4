//! End-to-end tests against the simulated daemon over loopback UDP.

use std::time::Duration;

use gpio_proxy_client::sim::{Direction, SimDaemon, SimServer};
use gpio_proxy_client::testing::MockTransport;
use gpio_proxy_client::{ClientError, PinManager, ProxyClient, ProxyConfig};

fn start_daemon(pins: usize) -> (gpio_proxy_client::sim::SimServerHandle, ProxyConfig) {
    let server = SimServer::bind("127.0.0.1:0", SimDaemon::new(pins)).expect("bind sim daemon");
    let handle = server.spawn().expect("spawn sim daemon");
    let config = ProxyConfig {
        host: "127.0.0.1".to_string(),
        port: handle.local_addr().port(),
        local_port: None,
        timeout_ms: Some(2000),
    };
    (handle, config)
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_claim_configure_set_free_over_udp() {
    let (server, config) = start_daemon(50);
    let pins = PinManager::new(ProxyClient::connect(&config).unwrap());

    pins.acquire(12, "HD_RS").unwrap();
    assert!(pins.is_claimed(12));
    assert_eq!(
        server.daemon().lock().pin(12).unwrap().owner.as_deref(),
        Some("HD_RS")
    );

    pins.configure_output(12, 0).unwrap();
    pins.set(12, 1).unwrap();
    assert_eq!(pins.get(12).unwrap(), 1);
    assert_eq!(
        server.daemon().lock().pin(12).unwrap().direction,
        Direction::Output
    );

    pins.release(12).unwrap();
    assert!(!pins.is_claimed(12));
    assert!(server.daemon().lock().owners().is_empty());

    server.shutdown().unwrap();
}

#[test]
fn test_two_clients_compete_for_a_pin() {
    let (server, config) = start_daemon(50);
    let first = PinManager::new(ProxyClient::connect(&config).unwrap());
    let second = PinManager::new(ProxyClient::connect(&config).unwrap());

    first.acquire(5, "first").unwrap();
    assert!(matches!(second.acquire(5, "X"), Err(ClientError::PinUnavailable(5))));
    assert!(second.claimed().is_empty());

    drop(first);
    second.acquire(5, "X").unwrap();
    server.shutdown().unwrap();
}

#[test]
fn test_probe_over_udp() {
    let (server, config) = start_daemon(10);
    server.daemon().lock().claim(3, "busy");

    let pins = PinManager::new(ProxyClient::connect(&config).unwrap());
    let available = pins.probe(0..12, "TEMP_PIN").unwrap();
    assert_eq!(available, vec![0, 1, 2, 4, 5, 6, 7, 8, 9]);
    assert_eq!(server.daemon().lock().owners(), vec![(3, "busy".to_string())]);
}

#[test]
fn test_timeout_against_silent_port() {
    // Bound but never answered.
    let silent = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
    let config = ProxyConfig {
        port: silent.local_addr().unwrap().port(),
        timeout_ms: Some(100),
        ..ProxyConfig::default()
    };

    let client = ProxyClient::connect(&config).unwrap();
    let err = client.get(1).unwrap_err();
    assert!(matches!(err, ClientError::Timeout { pin: 1, .. }), "{err}");
}

#[test]
fn test_shared_client_across_threads() {
    let (server, config) = start_daemon(50);
    let client = std::sync::Arc::new(
        ProxyClient::connect(&config)
            .unwrap()
            .with_timeout(Some(Duration::from_secs(2))),
    );

    let workers: Vec<_> = (0..4u32)
        .map(|i| {
            let client = client.clone();
            std::thread::spawn(move || {
                let pin = 10 + i;
                client.request_pin(pin, "worker").unwrap();
                client.configure_output(pin, 0).unwrap();
                for value in [1u8, 0, 1] {
                    client.set(pin, value).unwrap();
                    assert_eq!(client.get(pin).unwrap(), u32::from(value));
                }
                client.free_pin(pin).unwrap();
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }
    assert!(server.daemon().lock().owners().is_empty());
}

// ============================================================================
// Mock daemon scenarios
// ============================================================================

#[test]
fn test_mock_unavailable_pin_scenario() {
    let mock = MockTransport::scripted([vec![b'R', 0, 0, 0]]);
    let pins = PinManager::new(ProxyClient::new(mock.clone()));

    assert!(matches!(pins.acquire(5, "X"), Err(ClientError::PinUnavailable(5))));
    assert!(pins.claimed().is_empty());
    assert_eq!(mock.sent_count(), 1);
}

#[test]
fn test_mock_set_ignores_value() {
    let mock = MockTransport::scripted([
        vec![b'R', 0, 1, 0],
        vec![b'O', 0, 1, 0],
        vec![b'S', 0, 0xAB, 0],
        vec![b'F', 0, 0, 0],
    ]);
    let pins = PinManager::new(ProxyClient::new(mock.clone()));

    pins.acquire(12, "HD_RS").unwrap();
    pins.configure_output(12, 0).unwrap();
    pins.set(12, 1).unwrap();
    pins.release(12).unwrap();

    assert!(!pins.is_claimed(12));
    assert_eq!(mock.sent_operations(), b"ROSF".to_vec());
}
