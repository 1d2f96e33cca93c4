//! Modbus-RTU CRC16
//!
//! 初始值 `0xFFFF`，多项式 `0xA001`（0x8005 的位反转形式），逐字节处理。
//! 线上传输顺序为低字节在前。

/// 计算 Modbus-RTU CRC16
///
/// # Example
///
/// ```
/// use vfd_protocol::crc16;
///
/// let crc = crc16(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x0A]);
/// assert_eq!(crc.to_le_bytes(), [0xC5, 0xCD]);
/// ```
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= u16::from(byte);
        for _ in 0..8 {
            if crc & 0x0001 != 0 {
                crc = (crc >> 1) ^ 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// 校验一个完整帧（末尾两字节为 CRC，低字节在前）
///
/// 少于 3 字节的帧（无法同时容纳数据和校验）直接判定为失败。
pub fn verify_crc(frame: &[u8]) -> bool {
    if frame.len() < 3 {
        return false;
    }
    let (data, tail) = frame.split_at(frame.len() - 2);
    crc16(data).to_le_bytes() == [tail[0], tail[1]]
}
