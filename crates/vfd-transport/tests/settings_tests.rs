//! 串口参数反序列化测试

use vfd_transport::{Parity, SerialSettings};

#[test]
fn test_partial_table_falls_back_to_defaults() {
    let settings: SerialSettings = toml::from_str("baud_rate = 19200").unwrap();
    assert_eq!(settings.baud_rate, 19200);
    assert_eq!(settings.data_bits, 8);
    assert_eq!(settings.parity, Parity::None);
    assert_eq!(settings.stop_bits, 1);
}

#[test]
fn test_parity_is_lowercase() {
    let settings: SerialSettings = toml::from_str(
        r#"
        parity = "even"
        stop_bits = 2
        "#,
    )
    .unwrap();
    assert_eq!(settings.parity, Parity::Even);
    assert_eq!(settings.describe(), "9600 8E2");
}

#[test]
fn test_unknown_parity_is_rejected() {
    let result: Result<SerialSettings, _> = toml::from_str(r#"parity = "mark""#);
    assert!(result.is_err());
}
