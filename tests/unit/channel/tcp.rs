use super::*;

use std::time::Instant;

use serde_json::json;

const POLL: Duration = Duration::from_millis(20);

fn connect(addr: SocketAddr) -> TcpChannel {
    TcpChannel::connect(&addr.to_string(), Duration::from_secs(2), POLL).unwrap()
}

fn next_item(ch: &mut TcpChannel) -> Result<Received, ChannelError> {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        match ch.recv() {
            Ok(Received::Idle) if Instant::now() < deadline => continue,
            other => return other,
        }
    }
}

fn next_event(ch: &mut TcpChannel) -> Envelope {
    match next_item(ch) {
        Ok(Received::Event(e)) => e,
        other => panic!("expected an event, got {other:?}"),
    }
}

#[test]
fn connect_to_closed_port_fails_with_endpoint() {
    let addr = TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();
    let err = TcpChannel::connect(&addr.to_string(), Duration::from_millis(500), POLL)
        .err()
        .unwrap();
    match err {
        ChannelError::Connect { addr: got, .. } => assert_eq!(got, addr.to_string()),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn unresolvable_endpoint_fails_to_connect() {
    let err = TcpChannel::connect("no-port-here", Duration::from_millis(100), POLL)
        .err()
        .unwrap();
    assert!(matches!(err, ChannelError::Connect { .. }));
}

#[test]
fn late_viewer_receives_latest_snapshot_then_updates() {
    let publisher = TcpPublisher::bind("127.0.0.1:0", "graph").unwrap();
    assert_eq!(publisher.publish(&WorldState::default()).unwrap(), 0);

    let mut viewer = connect(publisher.local_addr());
    assert_eq!(viewer.addr(), publisher.local_addr().to_string());
    let first = next_event(&mut viewer);
    assert_eq!(first.event, "graph");
    assert_eq!(
        first.data,
        json!({"edges": {}, "local_transforms": {}, "world_transforms": {}})
    );
    assert_eq!(publisher.client_count(), 1);

    let delivered = publisher
        .publish_raw(&Envelope::new("other", json!(42)))
        .unwrap();
    assert_eq!(delivered, 1);
    let second = next_event(&mut viewer);
    assert_eq!(second, Envelope::new("other", json!(42)));
}

#[test]
fn idle_without_traffic() {
    let publisher = TcpPublisher::bind("127.0.0.1:0", "graph").unwrap();
    let mut viewer = connect(publisher.local_addr());
    assert!(matches!(viewer.recv(), Ok(Received::Idle)));
}

#[test]
fn dropping_publisher_closes_viewer() {
    let publisher = TcpPublisher::bind("127.0.0.1:0", "graph").unwrap();
    let mut viewer = connect(publisher.local_addr());
    drop(publisher);
    assert!(matches!(next_item(&mut viewer), Ok(Received::Closed)));
    assert!(matches!(viewer.recv(), Ok(Received::Closed)));
}

#[test]
fn malformed_lines_are_decode_errors_and_stream_continues() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let producer = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        stream
            .write_all(b"not json\n\n{\"event\":\"graph\",\"data\":1}\n{\"event\":\"tail\"}")
            .unwrap();
    });

    let mut viewer = connect(addr);
    assert!(matches!(next_item(&mut viewer), Err(ChannelError::Decode(_))));
    assert_eq!(next_event(&mut viewer), Envelope::new("graph", json!(1)));
    producer.join().unwrap();
    // Unterminated final message is delivered at EOF.
    assert_eq!(next_event(&mut viewer).event, "tail");
    assert!(matches!(next_item(&mut viewer), Ok(Received::Closed)));
}

#[test]
fn close_is_idempotent() {
    let publisher = TcpPublisher::bind("127.0.0.1:0", "graph").unwrap();
    let mut viewer = connect(publisher.local_addr());
    viewer.close();
    viewer.close();
    assert!(matches!(viewer.recv(), Ok(Received::Closed)));
}

#[test]
fn invalid_utf8_is_a_decode_error() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let producer = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        stream
            .write_all(b"{\"event\":\"gr\xffaph\",\"data\":1}\n")
            .unwrap();
    });

    let mut viewer = connect(addr);
    assert!(matches!(next_item(&mut viewer), Err(ChannelError::Decode(_))));
    producer.join().unwrap();
    assert!(matches!(next_item(&mut viewer), Ok(Received::Closed)));
}
