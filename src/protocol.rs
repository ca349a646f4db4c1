//! Modbus-RTU wire protocol: register kinds, function codes, CRC and the
//! pure frame encode/decode functions.
//!
//! Only the three functions the indoor-bus adapter speaks are implemented:
//! 0x03 (read holding registers), 0x04 (read input registers) and 0x10
//! (write multiple registers). Frame assembly and validation are plain
//! functions over byte slices so they can be tested without a serial port;
//! the transport layer in [`crate::transport`] owns the actual line
//! discipline.

use bytes::{BufMut, BytesMut};
use crc::{Crc, CRC_16_MODBUS};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{GatewayError, GatewayResult};

/// CRC calculator for RTU frames (polynomial 0xA001 reflected, init 0xFFFF).
const CRC_MODBUS: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);

/// Maximum RTU frame size in bytes.
pub const MAX_FRAME_SIZE: usize = 256;

/// Maximum number of registers in a single read request.
pub const MAX_READ_WORDS: u16 = 125;

/// Maximum number of registers in a single write-multiple request.
pub const MAX_WRITE_WORDS: u16 = 123;

/// Length in bytes of a write-multiple reply (slave + fn + addr + count + CRC).
pub const WRITE_REPLY_LEN: usize = 8;

/// The two register tables the adapter exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegisterKind {
    /// Read-only table, function 0x04.
    Input,
    /// Read/write table, functions 0x03 / 0x10.
    Holding,
}

impl RegisterKind {
    /// The function code used to read this table.
    pub fn read_function(self) -> FunctionCode {
        match self {
            RegisterKind::Input => FunctionCode::ReadInput,
            RegisterKind::Holding => FunctionCode::ReadHolding,
        }
    }
}

impl fmt::Display for RegisterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RegisterKind::Input => "input",
            RegisterKind::Holding => "holding",
        })
    }
}

/// Modbus function codes used on the adapter link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum FunctionCode {
    /// Read Holding Registers (0x03)
    ReadHolding = 0x03,
    /// Read Input Registers (0x04)
    ReadInput = 0x04,
    /// Write Multiple Registers (0x10)
    WriteMultiple = 0x10,
}

impl FunctionCode {
    /// Convert from the wire byte.
    pub fn from_u8(value: u8) -> GatewayResult<Self> {
        match value {
            0x03 => Ok(FunctionCode::ReadHolding),
            0x04 => Ok(FunctionCode::ReadInput),
            0x10 => Ok(FunctionCode::WriteMultiple),
            _ => Err(GatewayError::frame(format!(
                "unsupported function code 0x{value:02X}"
            ))),
        }
    }

    /// Convert to the wire byte.
    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for FunctionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FunctionCode::ReadHolding => "Read Holding Registers",
            FunctionCode::ReadInput => "Read Input Registers",
            FunctionCode::WriteMultiple => "Write Multiple Registers",
        };
        write!(f, "{} (0x{:02X})", name, *self as u8)
    }
}

/// Compute the CRC-16/MODBUS checksum of a byte slice.
pub fn crc16(data: &[u8]) -> u16 {
    CRC_MODBUS.checksum(data)
}

/// Expected reply length in bytes for a register read of `count` words.
///
/// Slave + function + byte count + payload + CRC.
pub fn read_reply_len(count: u16) -> usize {
    5 + 2 * count as usize
}

/// Encode a read request frame for function 0x03 or 0x04.
pub fn encode_read_request(slave_id: u8, kind: RegisterKind, address: u16, count: u16) -> Vec<u8> {
    let mut frame = BytesMut::with_capacity(8);
    frame.put_u8(slave_id);
    frame.put_u8(kind.read_function().to_u8());
    frame.put_u16(address);
    frame.put_u16(count);
    let crc = crc16(&frame);
    frame.put_u16_le(crc);
    frame.to_vec()
}

/// Encode a write-multiple request frame (function 0x10).
pub fn encode_write_request(slave_id: u8, address: u16, words: &[u16]) -> GatewayResult<Vec<u8>> {
    if words.is_empty() {
        return Err(GatewayError::invalid_argument("write of zero registers"));
    }
    if words.len() > MAX_WRITE_WORDS as usize {
        return Err(GatewayError::invalid_argument(format!(
            "write of {} registers exceeds the frame limit",
            words.len()
        )));
    }

    let byte_count = words.len() * 2;
    let mut frame = BytesMut::with_capacity(9 + byte_count);
    frame.put_u8(slave_id);
    frame.put_u8(FunctionCode::WriteMultiple.to_u8());
    frame.put_u16(address);
    frame.put_u16(words.len() as u16);
    frame.put_u8(byte_count as u8);
    for &word in words {
        frame.put_u16(word);
    }
    let crc = crc16(&frame);
    frame.put_u16_le(crc);
    Ok(frame.to_vec())
}

/// Detect a Modbus exception reply to `function`.
///
/// Returns `Some` only when the frame starts with the exception function code
/// and carries a valid CRC; a corrupted frame is left for the caller to
/// classify as timeout or CRC failure.
pub fn detect_exception(frame: &[u8], function: FunctionCode) -> Option<GatewayError> {
    if frame.len() < 5 {
        return None;
    }
    if frame[1] != function.to_u8() | 0x80 {
        return None;
    }
    let received = u16::from_le_bytes([frame[3], frame[4]]);
    if crc16(&frame[..3]) != received {
        return None;
    }
    Some(GatewayError::exception(function.to_u8(), frame[2]))
}

fn check_crc(frame: &[u8]) -> GatewayResult<()> {
    let n = frame.len();
    let received = u16::from_le_bytes([frame[n - 2], frame[n - 1]]);
    let computed = crc16(&frame[..n - 2]);
    if received != computed {
        return Err(GatewayError::crc_mismatch(computed, received));
    }
    Ok(())
}

/// Validate a register read reply and extract the register words.
pub fn decode_read_reply(
    frame: &[u8],
    slave_id: u8,
    function: FunctionCode,
    count: u16,
) -> GatewayResult<Vec<u16>> {
    let expected = read_reply_len(count);
    if frame.len() < expected {
        return Err(GatewayError::frame(format!(
            "read reply truncated: {} of {} bytes",
            frame.len(),
            expected
        )));
    }
    let frame = &frame[..expected];

    if frame[0] != slave_id {
        return Err(GatewayError::frame(format!(
            "slave id mismatch: expected {}, got {}",
            slave_id, frame[0]
        )));
    }
    if frame[1] != function.to_u8() {
        return Err(GatewayError::frame(format!(
            "function mismatch: expected 0x{:02X}, got 0x{:02X}",
            function.to_u8(),
            frame[1]
        )));
    }
    if frame[2] != (count * 2) as u8 {
        return Err(GatewayError::frame(format!(
            "byte count mismatch: expected {}, got {}",
            count * 2,
            frame[2]
        )));
    }
    check_crc(frame)?;

    let words = (0..count as usize)
        .map(|i| u16::from_be_bytes([frame[3 + 2 * i], frame[4 + 2 * i]]))
        .collect();
    Ok(words)
}

/// Validate a write-multiple reply, which echoes the address and count.
pub fn decode_write_reply(
    frame: &[u8],
    slave_id: u8,
    address: u16,
    count: u16,
) -> GatewayResult<()> {
    if frame.len() < WRITE_REPLY_LEN {
        return Err(GatewayError::frame(format!(
            "write reply truncated: {} of {} bytes",
            frame.len(),
            WRITE_REPLY_LEN
        )));
    }
    let frame = &frame[..WRITE_REPLY_LEN];

    if frame[0] != slave_id {
        return Err(GatewayError::frame(format!(
            "slave id mismatch: expected {}, got {}",
            slave_id, frame[0]
        )));
    }
    if frame[1] != FunctionCode::WriteMultiple.to_u8() {
        return Err(GatewayError::frame(format!(
            "function mismatch: expected 0x10, got 0x{:02X}",
            frame[1]
        )));
    }
    let echoed_address = u16::from_be_bytes([frame[2], frame[3]]);
    let echoed_count = u16::from_be_bytes([frame[4], frame[5]]);
    if echoed_address != address || echoed_count != count {
        return Err(GatewayError::frame(format!(
            "write echo mismatch: got addr={echoed_address} count={echoed_count}, \
             expected addr={address} count={count}"
        )));
    }
    check_crc(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc_known_vectors() {
        // The classic Modbus reference request.
        assert_eq!(crc16(&[0x01, 0x04, 0x00, 0x00, 0x00, 0x02]), 0xCB71);
        assert_eq!(crc16(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x02]), 0x0BC4);
        // System status read used by discovery.
        assert_eq!(crc16(&[0x01, 0x04, 0x00, 0x00, 0x00, 0x09]), 0x0C30);
    }

    #[test]
    fn test_encode_system_status_read() {
        let frame = encode_read_request(1, RegisterKind::Input, 0, 9);
        assert_eq!(frame, vec![0x01, 0x04, 0x00, 0x00, 0x00, 0x09, 0x30, 0x0C]);
    }

    #[test]
    fn test_encode_holding_read() {
        let frame = encode_read_request(1, RegisterKind::Holding, 0, 2);
        assert_eq!(frame, vec![0x01, 0x03, 0x00, 0x00, 0x00, 0x02, 0xC4, 0x0B]);
    }

    #[test]
    fn test_encode_write_request() {
        let frame = encode_write_request(1, 2000, &[0x0001, 0x0002, 0x00EB]).unwrap();
        assert_eq!(frame[0], 0x01);
        assert_eq!(frame[1], 0x10);
        assert_eq!(u16::from_be_bytes([frame[2], frame[3]]), 2000);
        assert_eq!(u16::from_be_bytes([frame[4], frame[5]]), 3);
        assert_eq!(frame[6], 6);
        assert_eq!(u16::from_be_bytes([frame[7], frame[8]]), 0x0001);
        assert_eq!(u16::from_be_bytes([frame[11], frame[12]]), 0x00EB);
        // Trailer must verify against the payload.
        let n = frame.len();
        assert_eq!(
            crc16(&frame[..n - 2]),
            u16::from_le_bytes([frame[n - 2], frame[n - 1]])
        );

        assert!(encode_write_request(1, 0, &[]).is_err());
        assert!(encode_write_request(1, 0, &vec![0u16; 124]).is_err());
    }

    #[test]
    fn test_decode_read_reply() {
        let mut frame = vec![0x01, 0x04, 0x04, 0x00, 0x0A, 0x00, 0x0B];
        let crc = crc16(&frame);
        frame.extend_from_slice(&crc.to_le_bytes());

        let words = decode_read_reply(&frame, 1, FunctionCode::ReadInput, 2).unwrap();
        assert_eq!(words, vec![0x000A, 0x000B]);

        // Wrong slave id.
        assert!(matches!(
            decode_read_reply(&frame, 2, FunctionCode::ReadInput, 2),
            Err(GatewayError::Frame { .. })
        ));
        // Wrong function.
        assert!(matches!(
            decode_read_reply(&frame, 1, FunctionCode::ReadHolding, 2),
            Err(GatewayError::Frame { .. })
        ));
    }

    #[test]
    fn test_decode_read_reply_bad_crc() {
        let mut frame = vec![0x01, 0x04, 0x02, 0x12, 0x34];
        let crc = crc16(&frame);
        frame.extend_from_slice(&crc.to_le_bytes());
        let n = frame.len();
        frame[n - 1] ^= 0x01;

        assert!(matches!(
            decode_read_reply(&frame, 1, FunctionCode::ReadInput, 1),
            Err(GatewayError::CrcMismatch { .. })
        ));
    }

    #[test]
    fn test_decode_write_reply() {
        let mut frame = vec![0x01, 0x10, 0x07, 0xD0, 0x00, 0x03];
        let crc = crc16(&frame);
        frame.extend_from_slice(&crc.to_le_bytes());

        assert!(decode_write_reply(&frame, 1, 2000, 3).is_ok());
        // Echo mismatch.
        assert!(matches!(
            decode_write_reply(&frame, 1, 2003, 3),
            Err(GatewayError::Frame { .. })
        ));
        assert!(matches!(
            decode_write_reply(&frame, 1, 2000, 6),
            Err(GatewayError::Frame { .. })
        ));
    }

    #[test]
    fn test_detect_exception() {
        let mut frame = vec![0x01, 0x84, 0x02];
        let crc = crc16(&frame);
        frame.extend_from_slice(&crc.to_le_bytes());

        let err = detect_exception(&frame, FunctionCode::ReadInput).unwrap();
        assert!(matches!(
            err,
            GatewayError::Exception {
                function: 0x04,
                code: 0x02,
                ..
            }
        ));

        // A normal reply is not an exception.
        let normal = encode_read_request(1, RegisterKind::Input, 0, 9);
        assert!(detect_exception(&normal, FunctionCode::ReadInput).is_none());

        // An exception frame with a corrupt CRC is not classified.
        let n = frame.len();
        frame[n - 1] ^= 0x40;
        assert!(detect_exception(&frame, FunctionCode::ReadInput).is_none());
    }

    #[test]
    fn test_function_code_conversion() {
        assert_eq!(
            FunctionCode::from_u8(0x04).unwrap(),
            FunctionCode::ReadInput
        );
        assert_eq!(FunctionCode::WriteMultiple.to_u8(), 0x10);
        assert!(FunctionCode::from_u8(0x06).is_err());
    }
}
