//! Config Tests

use std::time::Duration;

use tinyftp::config::{Config, TransportKind, DEFAULT_CHUNK_SIZE, MAX_DATAGRAM_SIZE};
use tinyftp::error::FtpError;

#[test]
fn test_defaults_are_valid() {
    let config = Config::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
    assert_eq!(config.transport, TransportKind::Stream);
    assert_eq!(config.read_timeout(), Some(Duration::from_secs(10)));
    assert_eq!(config.idle_timeout(), None);
}

#[test]
fn test_builder_sets_fields() {
    let config = Config::builder()
        .addr("0.0.0.0:9000")
        .transport(TransportKind::Datagram)
        .chunk_size(2048)
        .root_dir("/srv/files")
        .read_timeout_ms(0)
        .idle_timeout_ms(1500)
        .quiet(true)
        .once(true)
        .build();

    assert_eq!(config.addr, "0.0.0.0:9000");
    assert_eq!(config.transport, TransportKind::Datagram);
    assert_eq!(config.chunk_size, 2048);
    assert_eq!(config.read_timeout(), None);
    assert_eq!(config.idle_timeout(), Some(Duration::from_millis(1500)));
    assert!(config.quiet);
    assert!(config.once);
}

#[test]
fn test_zero_chunk_size_rejected() {
    let config = Config::builder().chunk_size(0).build();
    assert!(matches!(config.validate(), Err(FtpError::Config(_))));
}

#[test]
fn test_datagram_chunk_size_bounded() {
    let ok = Config::builder()
        .transport(TransportKind::Datagram)
        .chunk_size(MAX_DATAGRAM_SIZE)
        .build();
    assert!(ok.validate().is_ok());

    let too_big = Config::builder()
        .transport(TransportKind::Datagram)
        .chunk_size(MAX_DATAGRAM_SIZE + 1)
        .build();
    assert!(too_big.validate().is_err());

    // Streams have no datagram ceiling
    let stream = Config::builder().chunk_size(MAX_DATAGRAM_SIZE + 1).build();
    assert!(stream.validate().is_ok());
}

#[test]
fn test_transport_kind_from_str() {
    assert_eq!("tcp".parse::<TransportKind>().unwrap(), TransportKind::Stream);
    assert_eq!("UDP".parse::<TransportKind>().unwrap(), TransportKind::Datagram);
    assert_eq!("datagram".parse::<TransportKind>().unwrap(), TransportKind::Datagram);
    assert!("sctp".parse::<TransportKind>().is_err());
    assert_eq!(TransportKind::Datagram.to_string(), "udp");
}

#[test]
fn test_shutdown_grace_never_zero() {
    let config = Config::builder().shutdown_grace_ms(0).build();
    assert_eq!(config.shutdown_grace(), Duration::from_millis(1));
}
