use std::io::Write;
use std::net::{IpAddr, Ipv4Addr};

use crate::receiver::{ConfigError, MAX_LATENCY_FRAMES, ReceiverConfig};

#[test]
fn test_defaults() {
    let config = ReceiverConfig::default();
    assert_eq!(config.port, 5000);
    assert_eq!(config.sample_rate, 44_100);
    assert_eq!(config.frames_per_packet, 352);
    assert!(config.advertise);
    assert!(config.mac.is_none());
    assert_eq!(config.effective_latency(), 0);
}

#[test]
fn test_builder() {
    let config = ReceiverConfig::with_name("Kitchen")
        .with_port(0)
        .with_bind_address(IpAddr::V4(Ipv4Addr::LOCALHOST))
        .with_mac([1, 2, 3, 4, 5, 6])
        .with_latency(11_025)
        .with_advertise(false)
        .with_remote_discovery(false)
        .with_timing_interval_ms(500);

    assert_eq!(config.name, "Kitchen");
    assert_eq!(config.port, 0);
    assert_eq!(config.mac, Some([1, 2, 3, 4, 5, 6]));
    assert_eq!(config.effective_latency(), 11_025);
    assert!(!config.advertise);
    assert!(!config.remote_discovery);
    assert_eq!(config.timing_interval_ms, 500);
}

#[test]
fn test_latency_is_capped() {
    let config = ReceiverConfig::default().with_latency(1_000_000);
    assert_eq!(config.effective_latency(), MAX_LATENCY_FRAMES);
}

#[test]
fn test_partial_json_keeps_defaults() {
    let config =
        ReceiverConfig::from_json_str(r#"{ "name": "Den", "port": 6000, "latency": 22050 }"#)
            .unwrap();

    assert_eq!(config.name, "Den");
    assert_eq!(config.port, 6000);
    assert_eq!(config.latency, 22_050);
    assert_eq!(config.sample_rate, 44_100);
    assert!(config.remote_discovery);
}

#[test]
fn test_json_round_trip() {
    let config = ReceiverConfig::with_name("Office").with_mac([9, 8, 7, 6, 5, 4]);
    let json = serde_json::to_string(&config).unwrap();
    assert_eq!(ReceiverConfig::from_json_str(&json).unwrap(), config);
}

#[test]
fn test_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, r#"{{ "name": "Garage", "advertise": false }}"#).unwrap();

    let config = ReceiverConfig::from_file(file.path()).unwrap();
    assert_eq!(config.name, "Garage");
    assert!(!config.advertise);
}

#[test]
fn test_from_file_errors() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        ReceiverConfig::from_file(dir.path().join("missing.json")),
        Err(ConfigError::Io(_))
    ));

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "{{ not json").unwrap();
    assert!(matches!(
        ReceiverConfig::from_file(file.path()),
        Err(ConfigError::Json(_))
    ));
}

#[test]
fn test_zero_rates_are_rejected() {
    assert!(matches!(
        ReceiverConfig::from_json_str(r#"{ "sample_rate": 0 }"#),
        Err(ConfigError::Invalid {
            field: "sample_rate",
            ..
        })
    ));
    assert!(matches!(
        ReceiverConfig::from_json_str(r#"{ "frames_per_packet": 0 }"#),
        Err(ConfigError::Invalid {
            field: "frames_per_packet",
            ..
        })
    ));

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, r#"{{ "sample_rate": 0 }}"#).unwrap();
    assert!(matches!(
        ReceiverConfig::from_file(file.path()),
        Err(ConfigError::Invalid { .. })
    ));

    assert!(ReceiverConfig::default().validate().is_ok());
}
