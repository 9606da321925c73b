use crate::shared::{ErrorType, NetworkError, NetworkResult};
use byteorder::{ByteOrder, LittleEndian};

/// Random access binary cursor over a growable byte buffer. All multi-byte
/// values are encoded little-endian. Every accessor is bounds checked against
/// the prepared capacity; reads past it fail with `Underflow`, writes with
/// `Overflow`. A failed accessor leaves the cursor where it was.
pub struct Payload {
    data: Vec<u8>,
    capacity: usize,
    position: usize,
}

macro_rules! scalar_codec {
    ($read_name:ident, $write_name:ident, $ty:ty, $size:expr, $bo_read:ident, $bo_write:ident) => {
        #[inline]
        pub fn $read_name(&mut self) -> NetworkResult<$ty> {
            self.check_read($size)?;
            let value = LittleEndian::$bo_read(&self.data[self.position..self.position + $size]);
            self.position += $size;
            Ok(value)
        }

        #[inline]
        pub fn $write_name(&mut self, value: $ty) -> NetworkResult<()> {
            self.check_write($size)?;
            LittleEndian::$bo_write(&mut self.data[self.position..self.position + $size], value);
            self.position += $size;
            Ok(())
        }
    };
}

impl Payload {
    #[inline]
    pub fn new(capacity: usize) -> Payload {
        Payload {
            data: vec![0; capacity],
            capacity,
            position: 0,
        }
    }

    /// Rebind the cursor to a fresh capacity, growing the held buffer in case
    /// it is smaller. The cursor is rewound to the start.
    #[inline]
    pub fn prepare(&mut self, capacity: usize) {
        if self.data.len() < capacity {
            self.data.resize(capacity, 0);
        }

        self.capacity = capacity;
        self.position = 0;
    }

    /// Adopt an existing buffer outright. Capacity becomes the buffer length
    /// and the cursor is rewound to the start.
    #[inline]
    pub fn rebind(&mut self, data: Vec<u8>) {
        self.capacity = data.len();
        self.data = data;
        self.position = 0;
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Move the cursor to an absolute offset within the prepared capacity.
    #[inline]
    pub fn seek(&mut self, position: usize) -> NetworkResult<()> {
        if position > self.capacity {
            return Err(NetworkError::Fatal(ErrorType::Overflow));
        }

        self.position = position;
        Ok(())
    }

    /// View over the bytes written so far, `[0, position)`.
    #[inline]
    pub fn pack(&self) -> &[u8] {
        &self.data[..self.position]
    }

    #[inline]
    fn check_read(&self, count: usize) -> NetworkResult<()> {
        if self.position + count > self.capacity {
            return Err(NetworkError::Fatal(ErrorType::Underflow));
        }

        Ok(())
    }

    #[inline]
    fn check_write(&self, count: usize) -> NetworkResult<()> {
        if self.position + count > self.capacity {
            return Err(NetworkError::Fatal(ErrorType::Overflow));
        }

        Ok(())
    }

    #[inline]
    pub fn read_u8(&mut self) -> NetworkResult<u8> {
        self.check_read(1)?;
        let value = self.data[self.position];
        self.position += 1;
        Ok(value)
    }

    #[inline]
    pub fn write_u8(&mut self, value: u8) -> NetworkResult<()> {
        self.check_write(1)?;
        self.data[self.position] = value;
        self.position += 1;
        Ok(())
    }

    #[inline]
    pub fn read_i8(&mut self) -> NetworkResult<i8> {
        self.read_u8().map(|value| value as i8)
    }

    #[inline]
    pub fn write_i8(&mut self, value: i8) -> NetworkResult<()> {
        self.write_u8(value as u8)
    }

    scalar_codec!(read_u16, write_u16, u16, 2, read_u16, write_u16);
    scalar_codec!(read_i16, write_i16, i16, 2, read_i16, write_i16);
    scalar_codec!(read_u32, write_u32, u32, 4, read_u32, write_u32);
    scalar_codec!(read_i32, write_i32, i32, 4, read_i32, write_i32);
    scalar_codec!(read_u64, write_u64, u64, 8, read_u64, write_u64);
    scalar_codec!(read_i64, write_i64, i64, 8, read_i64, write_i64);
    scalar_codec!(read_f32, write_f32, f32, 4, read_f32, write_f32);
    scalar_codec!(read_f64, write_f64, f64, 8, read_f64, write_f64);

    /// Verbatim copy out of the buffer.
    #[inline]
    pub fn read(&mut self, count: usize) -> NetworkResult<&[u8]> {
        self.check_read(count)?;
        let start = self.position;
        self.position += count;
        Ok(&self.data[start..start + count])
    }

    /// Verbatim copy into the buffer.
    #[inline]
    pub fn write(&mut self, bytes: &[u8]) -> NetworkResult<()> {
        self.check_write(bytes.len())?;
        self.data[self.position..self.position + bytes.len()].copy_from_slice(bytes);
        self.position += bytes.len();
        Ok(())
    }

    /// Consume bytes up to (not including) the first nul, advancing past the
    /// terminator. Returns an empty string without advancing when no
    /// terminator exists in the remaining capacity.
    pub fn read_string(&mut self) -> String {
        let remaining = &self.data[self.position..self.capacity];

        match remaining.iter().position(|&byte| byte == 0) {
            Some(terminator) => {
                let value = String::from_utf8_lossy(&remaining[..terminator]).into_owned();
                self.position += terminator + 1;
                value
            }
            None => String::new(),
        }
    }

    /// Write the string bytes followed by a nul terminator.
    pub fn write_string(&mut self, value: &str) -> NetworkResult<()> {
        self.check_write(value.len() + 1)?;
        self.write(value.as_bytes())?;
        self.write_u8(0)
    }

    /// Minimal number of bytes (1..=8) needed for the packed encoding of
    /// `value`: one plus the position of the highest non-zero octet.
    #[inline]
    pub fn calc_packed_u64_bytes(value: u64) -> usize {
        let bits = 64 - value.leading_zeros() as usize;
        ((bits + 7) / 8).max(1)
    }

    /// Read exactly `count` little-endian bytes as a packed integer.
    #[inline]
    pub fn read_packed_u64(&mut self, count: usize) -> NetworkResult<u64> {
        debug_assert!(count >= 1 && count <= 8);
        self.check_read(count)?;

        let mut value = 0u64;
        for offset in 0..count {
            value |= u64::from(self.data[self.position + offset]) << (offset * 8);
        }

        self.position += count;
        Ok(value)
    }

    /// Write exactly `count` little-endian bytes of `value`, least
    /// significant byte first.
    #[inline]
    pub fn write_packed_u64(&mut self, count: usize, value: u64) -> NetworkResult<()> {
        debug_assert!(count >= 1 && count <= 8);
        self.check_write(count)?;

        for offset in 0..count {
            self.data[self.position + offset] = (value >> (offset * 8)) as u8;
        }

        self.position += count;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_scalar_roundtrip() {
        let mut payload = Payload::new(64);

        payload.write_u8(0xab).unwrap();
        payload.write_i8(-100).unwrap();
        payload.write_u16(0xbeef).unwrap();
        payload.write_i16(-30000).unwrap();
        payload.write_u32(0xdead_beef).unwrap();
        payload.write_i32(-2_000_000_000).unwrap();
        payload.write_u64(0x0123_4567_89ab_cdef).unwrap();
        payload.write_i64(-9_000_000_000_000_000_000).unwrap();
        payload.write_f32(1.5).unwrap();
        payload.write_f64(-2.25).unwrap();

        payload.seek(0).unwrap();

        assert_eq!(payload.read_u8().unwrap(), 0xab);
        assert_eq!(payload.read_i8().unwrap(), -100);
        assert_eq!(payload.read_u16().unwrap(), 0xbeef);
        assert_eq!(payload.read_i16().unwrap(), -30000);
        assert_eq!(payload.read_u32().unwrap(), 0xdead_beef);
        assert_eq!(payload.read_i32().unwrap(), -2_000_000_000);
        assert_eq!(payload.read_u64().unwrap(), 0x0123_4567_89ab_cdef);
        assert_eq!(payload.read_i64().unwrap(), -9_000_000_000_000_000_000);
        assert_eq!(payload.read_f32().unwrap(), 1.5);
        assert_eq!(payload.read_f64().unwrap(), -2.25);
    }

    #[test]
    fn test_little_endian_layout() {
        let mut payload = Payload::new(8);

        payload.write_u32(0x0102_0304).unwrap();

        assert_eq!(payload.pack(), &[0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn test_write_overflow() {
        let mut payload = Payload::new(3);

        payload.write_u16(1).unwrap();

        let result = payload.write_u16(2);

        assert_eq!(result.unwrap_err(), NetworkError::Fatal(ErrorType::Overflow));
        assert_eq!(payload.position(), 2);
    }

    #[test]
    fn test_read_underflow() {
        let mut payload = Payload::new(3);

        payload.seek(2).unwrap();

        let result = payload.read_u32();

        assert_eq!(result.unwrap_err(), NetworkError::Fatal(ErrorType::Underflow));
        assert_eq!(payload.position(), 2);
    }

    #[test]
    fn test_prepare_grows_and_rewinds() {
        let mut payload = Payload::new(4);

        payload.write_u32(7).unwrap();
        payload.prepare(16);

        assert_eq!(payload.capacity(), 16);
        assert_eq!(payload.position(), 0);

        payload.write_u64(1).unwrap();
        payload.write_u64(2).unwrap();
    }

    #[test]
    fn test_rebind_adopts_buffer() {
        let mut payload = Payload::new(4);

        payload.rebind(vec![1, 2, 3]);

        assert_eq!(payload.capacity(), 3);
        assert_eq!(payload.read_u8().unwrap(), 1);
        assert_eq!(payload.read_u16().unwrap(), 0x0302);
    }

    #[test]
    fn test_read_string() {
        let mut payload = Payload::new(16);

        payload.write_string("hello").unwrap();
        payload.write_u8(0xff).unwrap();
        payload.seek(0).unwrap();

        assert_eq!(payload.read_string(), "hello");
        assert_eq!(payload.position(), 6);
        assert_eq!(payload.read_u8().unwrap(), 0xff);
    }

    #[test]
    fn test_read_string_without_terminator() {
        let mut payload = Payload::new(3);

        payload.rebind(vec![b'a', b'b', b'c']);

        assert_eq!(payload.read_string(), "");
        assert_eq!(payload.position(), 0);
    }

    #[test]
    fn test_calc_packed_bytes_boundaries() {
        assert_eq!(Payload::calc_packed_u64_bytes(0), 1);
        assert_eq!(Payload::calc_packed_u64_bytes(0xff), 1);
        assert_eq!(Payload::calc_packed_u64_bytes(0x100), 2);
        assert_eq!(Payload::calc_packed_u64_bytes(0xffff), 2);
        assert_eq!(Payload::calc_packed_u64_bytes(0x1_0000), 3);
        assert_eq!(Payload::calc_packed_u64_bytes(0xff_ffff), 3);
        assert_eq!(Payload::calc_packed_u64_bytes(0x0102_0304_05), 5);
        assert_eq!(Payload::calc_packed_u64_bytes(1u64 << 55), 7);
        assert_eq!(Payload::calc_packed_u64_bytes(1u64 << 56), 8);
        assert_eq!(Payload::calc_packed_u64_bytes(u64::max_value()), 8);
    }

    #[test]
    fn test_packed_roundtrip() {
        let mut payload = Payload::new(8);

        let count = Payload::calc_packed_u64_bytes(0x0102_0304_05);
        assert_eq!(count, 5);

        payload.write_packed_u64(count, 0x0102_0304_05).unwrap();
        payload.seek(0).unwrap();

        assert_eq!(payload.read_packed_u64(count).unwrap(), 0x0102_0304_05);
    }

    #[test]
    fn test_packed_layout() {
        let mut payload = Payload::new(8);

        payload.write_packed_u64(3, 0x0304_05).unwrap();

        assert_eq!(payload.pack(), &[0x05, 0x04, 0x03]);
    }

    #[test]
    fn test_packed_roundtrip_random() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(0x7e7e);
        let mut payload = Payload::new(8);

        for _ in 0..1000 {
            let value: u64 = rng.gen::<u64>() >> (rng.gen_range(0, 64) as u32);
            let count = Payload::calc_packed_u64_bytes(value);

            payload.prepare(8);
            payload.write_packed_u64(count, value).unwrap();
            payload.seek(0).unwrap();

            assert_eq!(payload.read_packed_u64(count).unwrap(), value);
        }
    }

    #[test]
    fn test_pack_view() {
        let mut payload = Payload::new(8);

        payload.write_u16(0xaabb).unwrap();

        assert_eq!(payload.pack().len(), 2);
        assert_eq!(payload.pack(), &[0xbb, 0xaa]);
    }
}
