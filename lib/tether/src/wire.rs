use crate::payload::Payload;
use crate::shared::{ErrorType, NetworkError, NetworkResult};

/// System channel frames. Every frame opens with a header byte packing the
/// opcode and the body widths:
///
/// ```text
/// opcode     = header >> 6          (0 = ping, 1 = pong)
/// seq_bytes  = ((header >> 3) & 7) + 1
/// time_bytes = (header & 7) + 1     (pong only)
/// ```
///
/// The body is the packed little-endian sequence, followed for pongs by the
/// packed responder time.
#[derive(Debug, Eq, PartialEq)]
pub enum SystemFrame {
    Ping { sequence: u64 },
    Pong { sequence: u64, time: u64 },
}

const OPCODE_PING: u8 = 0;
const OPCODE_PONG: u8 = 1;

impl SystemFrame {
    /// Encode into the supplied payload, which is rewound first.
    pub fn write(&self, payload: &mut Payload) -> NetworkResult<()> {
        payload.prepare(payload.capacity());

        match *self {
            SystemFrame::Ping { sequence } => {
                let seq_bytes = Payload::calc_packed_u64_bytes(sequence);

                payload.write_u8((OPCODE_PING << 6) | ((seq_bytes as u8 - 1) << 3))?;
                payload.write_packed_u64(seq_bytes, sequence)
            }
            SystemFrame::Pong { sequence, time } => {
                let seq_bytes = Payload::calc_packed_u64_bytes(sequence);
                let time_bytes = Payload::calc_packed_u64_bytes(time);

                let header =
                    (OPCODE_PONG << 6) | ((seq_bytes as u8 - 1) << 3) | (time_bytes as u8 - 1);

                payload.write_u8(header)?;
                payload.write_packed_u64(seq_bytes, sequence)?;
                payload.write_packed_u64(time_bytes, time)
            }
        }
    }

    /// Decode a frame from raw channel bytes.
    pub fn read(data: &[u8]) -> NetworkResult<SystemFrame> {
        let mut payload = Payload::new(data.len());
        payload.rebind(data.to_vec());

        let header = payload.read_u8()?;
        let opcode = header >> 6;
        let seq_bytes = ((header >> 3) & 0x07) as usize + 1;

        match opcode {
            OPCODE_PING => Ok(SystemFrame::Ping {
                sequence: payload.read_packed_u64(seq_bytes)?,
            }),
            OPCODE_PONG => {
                let time_bytes = (header & 0x07) as usize + 1;
                let sequence = payload.read_packed_u64(seq_bytes)?;
                let time = payload.read_packed_u64(time_bytes)?;

                Ok(SystemFrame::Pong { sequence, time })
            }
            _ => Err(NetworkError::Fatal(ErrorType::Serialization)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(frame: &SystemFrame) -> Vec<u8> {
        let mut payload = Payload::new(16);
        frame.write(&mut payload).unwrap();
        payload.pack().to_vec()
    }

    #[test]
    fn test_ping_header_single_byte_sequence() {
        let bytes = encode(&SystemFrame::Ping { sequence: 0x12 });

        assert_eq!(bytes, vec![0x00, 0x12]);
    }

    #[test]
    fn test_pong_header_with_time() {
        let bytes = encode(&SystemFrame::Pong { sequence: 0x1234, time: 0xabcdef });

        assert_eq!(bytes, vec![0x4a, 0x34, 0x12, 0xef, 0xcd, 0xab]);
    }

    #[test]
    fn test_pong_zero_time_is_one_byte() {
        let bytes = encode(&SystemFrame::Pong { sequence: 0x12, time: 0 });

        assert_eq!(bytes, vec![0x40, 0x12, 0x00]);
    }

    #[test]
    fn test_roundtrip() {
        for frame in vec![
            SystemFrame::Ping { sequence: 0 },
            SystemFrame::Ping { sequence: 0xffff },
            SystemFrame::Pong { sequence: 0x1_0000, time: 1_234_567_890_123 },
        ] {
            let bytes = encode(&frame);

            assert_eq!(SystemFrame::read(&bytes).unwrap(), frame);
        }
    }

    #[test]
    fn test_unknown_opcode_rejected() {
        let result = SystemFrame::read(&[0x80, 0x00]);

        assert_eq!(result.unwrap_err(), NetworkError::Fatal(ErrorType::Serialization));
    }

    #[test]
    fn test_truncated_frame_underflows() {
        // Header promises a two byte sequence but only one follows.
        let result = SystemFrame::read(&[0x08, 0x12]);

        assert_eq!(result.unwrap_err(), NetworkError::Fatal(ErrorType::Underflow));
    }

    #[test]
    fn test_empty_frame_underflows() {
        assert!(SystemFrame::read(&[]).is_err());
    }
}
