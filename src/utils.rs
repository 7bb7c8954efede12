//! Checksum and ASCII-hex helpers shared by the protocol descriptors.
//!
//! # Example
//!
//! ```
//! use plc_framing::utils::{crc16_modbus, lrc, format_bytes};
//!
//! assert_eq!(crc16_modbus(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x01]), 0x0A84);
//! assert_eq!(lrc(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x01]), 0xFB);
//! assert_eq!(format_bytes(&[0x03, 0x00, 0x1F]), "03 00 1F");
//! ```

/// Modbus RTU CRC-16 (polynomial 0xA001, initial 0xFFFF).
///
/// The result goes on the wire little-endian.
pub fn crc16_modbus(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= u16::from(byte);
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// Longitudinal redundancy check used by Modbus ASCII: the two's
/// complement of the byte sum.
pub fn lrc(data: &[u8]) -> u8 {
    data.iter()
        .fold(0u8, |acc, &b| acc.wrapping_add(b))
        .wrapping_neg()
}

/// Sum of all bytes modulo 256, as used by Mitsubishi computer link sum
/// checks.
pub fn sum_check(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// XOR of all bytes, as used by the Mewtocol block check code.
///
/// # Example
///
/// ```
/// use plc_framing::utils::bcc_xor;
///
/// assert_eq!(bcc_xor(b"%01#RCSX0000"), 0x1D);
/// ```
pub fn bcc_xor(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &b| acc ^ b)
}

/// Value of one ASCII hex digit (either case).
#[inline]
pub fn hex_digit(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'A'..=b'F' => Some(c - b'A' + 10),
        b'a'..=b'f' => Some(c - b'a' + 10),
        _ => None,
    }
}

/// Parses two ASCII hex digits into a byte.
///
/// # Example
///
/// ```
/// use plc_framing::utils::parse_hex_byte;
///
/// assert_eq!(parse_hex_byte(b'F', b'b'), Some(0xFB));
/// assert_eq!(parse_hex_byte(b'G', b'0'), None);
/// ```
pub fn parse_hex_byte(high: u8, low: u8) -> Option<u8> {
    Some(hex_digit(high)? << 4 | hex_digit(low)?)
}

/// Encodes a byte as two uppercase ASCII hex digits.
pub fn to_hex_ascii(value: u8) -> [u8; 2] {
    const DIGITS: &[u8; 16] = b"0123456789ABCDEF";
    [DIGITS[(value >> 4) as usize], DIGITS[(value & 0x0F) as usize]]
}

/// Decodes a run of ASCII hex digit pairs. Returns `None` on an odd length
/// or a non-hex character.
pub fn decode_ascii_hex(data: &[u8]) -> Option<Vec<u8>> {
    if data.len() % 2 != 0 {
        return None;
    }
    data.chunks_exact(2)
        .map(|pair| parse_hex_byte(pair[0], pair[1]))
        .collect()
}

/// Formats bytes as space-separated uppercase hex, for diagnostics.
pub fn format_bytes(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc16_known_frames() {
        assert_eq!(crc16_modbus(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x01]), 0x0A84);
        assert_eq!(crc16_modbus(&[]), 0xFFFF);
    }

    #[test]
    fn test_crc16_appended_frame_checks_to_zero() {
        let mut frame = vec![0x11, 0x03, 0x02, 0xAB, 0xCD];
        let crc = crc16_modbus(&frame);
        frame.extend_from_slice(&crc.to_le_bytes());
        assert_eq!(crc16_modbus(&frame), 0x0000);
    }

    #[test]
    fn test_lrc() {
        assert_eq!(lrc(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x01]), 0xFB);
        assert_eq!(lrc(&[]), 0x00);
        let data = [0x11, 0x03, 0x00, 0x6B, 0x00, 0x03];
        assert_eq!(sum_check(&data).wrapping_add(lrc(&data)), 0);
    }

    #[test]
    fn test_sum_check() {
        assert_eq!(sum_check(b"00FF1234\x03"), 0xB9);
        assert_eq!(sum_check(&[0xFF, 0x02]), 0x01);
    }

    #[test]
    fn test_bcc_xor() {
        assert_eq!(bcc_xor(b"%01#RCSX0000"), 0x1D);
        assert_eq!(bcc_xor(&[]), 0x00);
    }

    #[test]
    fn test_hex_helpers() {
        assert_eq!(hex_digit(b'7'), Some(7));
        assert_eq!(hex_digit(b'c'), Some(12));
        assert_eq!(hex_digit(b'x'), None);
        assert_eq!(to_hex_ascii(0xB9), *b"B9");
        assert_eq!(to_hex_ascii(0x05), *b"05");
        assert_eq!(decode_ascii_hex(b"0103FB"), Some(vec![0x01, 0x03, 0xFB]));
        assert_eq!(decode_ascii_hex(b"010"), None);
        assert_eq!(decode_ascii_hex(b"01ZZ"), None);
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(&[]), "");
        assert_eq!(format_bytes(&[0x46, 0x49]), "46 49");
    }
}
