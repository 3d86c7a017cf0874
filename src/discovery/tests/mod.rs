use super::advertiser::parse_mac_string;
use super::*;

#[test]
fn test_format_mac_for_service() {
    let mac = [0x58, 0x55, 0xCA, 0x1A, 0xE2, 0x88];
    assert_eq!(format_mac_for_service(&mac), "5855CA1AE288");
}

#[test]
fn test_parse_mac_string() {
    assert_eq!(
        parse_mac_string("58:55:ca:1a:e2:88").unwrap(),
        [0x58, 0x55, 0xCA, 0x1A, 0xE2, 0x88]
    );
    assert!(parse_mac_string("58:55:ca").is_err());
    assert!(parse_mac_string("58:55:ca:1a:e2:zz").is_err());
}

#[test]
fn test_device_mac_is_stable() {
    assert_eq!(get_device_mac(), get_device_mac());
}

#[test]
fn test_raop_txt_record() {
    let txt = TxtRecordBuilder::raop(44100);

    assert_eq!(txt.get("am"), Some("airesp32"));
    assert_eq!(txt.get("tp"), Some("UDP"));
    assert_eq!(txt.get("et"), Some("0,1"));
    assert_eq!(txt.get("md"), Some("0,1,2"));
    assert_eq!(txt.get("cn"), Some("0,1"));
    assert_eq!(txt.get("sr"), Some("44100"));
    assert_eq!(txt.get("vn"), Some("3"));

    let entries = txt.build();
    assert_eq!(entries.len(), 13);
    assert!(entries.contains(&"txtvers=1".to_string()));
    assert!(entries.contains(&"ek=1".to_string()));
}
