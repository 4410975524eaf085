mod common;

use std::time::{Duration, Instant};

use common::{fast_config, SimulatedDevice};
use gnss_link::{Encoding, TransportError};

#[test]
fn send_appends_terminator() {
    let device = SimulatedDevice::silent();
    let mut transport = device.transport(fast_config());
    transport.send("$VERSIONA*1B").unwrap();
    assert_eq!(device.writes(), vec![b"$VERSIONA*1B\r\n".to_vec()]);
}

#[test]
fn send_raw_is_unchanged() {
    let device = SimulatedDevice::silent();
    let mut transport = device.transport(fast_config());
    transport.send_raw(&[0xb5, 0x62, 0x01, 0x21, 0x00, 0x00, 0x22, 0x67]).unwrap();
    assert_eq!(
        device.writes(),
        vec![vec![0xb5, 0x62, 0x01, 0x21, 0x00, 0x00, 0x22, 0x67]]
    );
}

#[test]
fn every_send_waits_out_the_command_delay() {
    let device = SimulatedDevice::silent();
    let config = fast_config().with_cmd_delay(Duration::from_millis(40));
    let mut transport = device.transport(config);

    let start = Instant::now();
    transport.send("$RESET*51").unwrap();
    transport.send("$RESET*51").unwrap();
    assert!(start.elapsed() >= Duration::from_millis(80));
    assert_eq!(device.write_count(), 2);
}

#[test]
fn close_twice_is_harmless() {
    let device = SimulatedDevice::silent();
    let mut transport = device.transport(fast_config());
    assert!(transport.is_open());
    transport.close();
    transport.close();
    assert!(!transport.is_open());
    assert!(!device.is_attached());
    assert!(matches!(transport.send("$RESET*51"), Err(TransportError::Closed)));
}

#[test]
fn read_lines_drains_available_data() {
    let device = SimulatedDevice::silent();
    device.push_rx(b"$GNGGA,1*00\r\n$GNRMC,2*00\r\npartial");
    let mut transport = device.transport(fast_config());
    assert_eq!(
        transport.read_lines().unwrap(),
        vec!["$GNGGA,1*00", "$GNRMC,2*00", "partial"]
    );
    assert!(transport.read_lines().unwrap().is_empty());
}

#[test]
fn read_lines_replaces_undecodable_bytes() {
    let device = SimulatedDevice::silent();
    device.push_rx(&[b'O', b'K', 0xff, b'\r', b'\n']);
    let mut transport = device.transport(fast_config());
    assert_eq!(transport.read_lines().unwrap(), vec!["OK\u{fffd}"]);

    device.push_rx(&[b'O', b'K', 0xb0, b'\n']);
    let mut latin1 = device.transport(fast_config().with_encoding(Encoding::Latin1));
    assert_eq!(latin1.read_lines().unwrap(), vec!["OK\u{b0}"]);
}

#[test]
fn read_until_stops_at_marker() {
    let device = SimulatedDevice::silent();
    device.push_rx(b"$GNGGA,1*00\r\n$command,VERSIONA,response: OK*45\r\n");
    let mut transport = device.transport(fast_config());

    let lines = transport.read_until(b"$command").unwrap();
    assert_eq!(lines, vec!["$GNGGA,1*00", "$command"]);
    // the rest of the reply is still there
    assert_eq!(
        transport.read_lines().unwrap(),
        vec![",VERSIONA,response: OK*45"]
    );
}

#[test]
fn read_until_timeout_returns_what_arrived() {
    let device = SimulatedDevice::silent();
    device.push_rx(b"$GNGGA,1*00\r\n");
    let mut transport = device.transport(fast_config());

    let start = Instant::now();
    let lines = transport.read_until(b"$command").unwrap();
    assert!(start.elapsed() >= Duration::from_millis(100));
    assert_eq!(lines, vec!["$GNGGA,1*00"]);
}

#[test]
fn read_until_line_joins_marker_and_line() {
    let device = SimulatedDevice::silent();
    device.push_rx(b"noise\r\n$command,VERSIONA,response: OK*45\r\n$GNGGA");
    let mut transport = device.transport(fast_config());

    let line = transport.read_until_line(b"$command").unwrap().unwrap();
    assert!(line.ends_with("$command,VERSIONA,response: OK*45"));
    assert!(!line.contains("GNGGA"));
}

#[test]
fn read_until_line_without_marker_is_none() {
    let device = SimulatedDevice::silent();
    device.push_rx(b"$GNGGA,1*00\r\n");
    let mut transport = device.transport(fast_config());
    assert_eq!(transport.read_until_line(b"$command").unwrap(), None);
}

#[test]
fn read_raw_returns_at_most_n_bytes() {
    let device = SimulatedDevice::silent();
    device.push_rx(&[1, 2, 3, 4, 5, 6]);
    let mut transport = device.transport(fast_config());
    assert_eq!(transport.read_raw(4).unwrap(), vec![1, 2, 3, 4]);
    assert_eq!(transport.read_raw(10).unwrap(), vec![5, 6]);
}
