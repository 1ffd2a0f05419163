//! Variable-length integer primitives
//!
//! Unsigned values are LEB128: seven bits per byte, low group first, high bit
//! set on every byte but the last. Signed values are zigzag-mapped first so
//! small negative numbers stay short.

use crate::result::{ContarError, ContarResult};

/// Longest encoding of a `u64`
const MAX_VARINT_BYTES: usize = 10;

/// Map a signed value onto the unsigned range, small magnitudes first
#[inline]
#[must_use]
pub const fn zigzag(value: i32) -> u32 {
    ((value << 1) ^ (value >> 31)) as u32
}

/// Inverse of [`zigzag`]
#[inline]
#[must_use]
pub const fn unzigzag(value: u32) -> i32 {
    ((value >> 1) as i32) ^ -((value & 1) as i32)
}

/// Append-only output buffer
#[derive(Debug, Default)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    /// Create an empty buffer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the encoded bytes
    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        self.buf
    }

    /// Append raw bytes
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Append an unsigned varint
    pub fn write_varint(&mut self, mut value: u64) {
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                self.buf.push(byte);
                return;
            }
            self.buf.push(byte | 0x80);
        }
    }

    /// Append a `u32` as a varint
    pub fn write_u32(&mut self, value: u32) {
        self.write_varint(u64::from(value));
    }

    /// Append a length or count as a varint
    pub fn write_len(&mut self, len: usize) {
        self.write_varint(len as u64);
    }

    /// Append a zigzag-encoded signed value
    pub fn write_i32(&mut self, value: i32) {
        self.write_u32(zigzag(value));
    }

    /// Append a length-prefixed UTF-8 string
    pub fn write_str(&mut self, s: &str) {
        self.write_len(s.len());
        self.write_bytes(s.as_bytes());
    }
}

/// Cursor over an encoded buffer
#[derive(Debug)]
pub struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    /// Start reading at the beginning of `data`
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes not read yet
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Current offset
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Read `n` raw bytes
    pub fn read_bytes(&mut self, n: usize, context: &str) -> ContarResult<&'a [u8]> {
        if n > self.remaining() {
            return Err(ContarError::truncated(context));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Read an unsigned varint
    pub fn read_varint(&mut self, context: &str) -> ContarResult<u64> {
        let mut value = 0u64;
        for i in 0..MAX_VARINT_BYTES {
            let byte = *self
                .data
                .get(self.pos)
                .ok_or_else(|| ContarError::truncated(context))?;
            self.pos += 1;
            let group = u64::from(byte & 0x7f);
            let shift = 7 * i as u32;
            if shift == 63 && group > 1 {
                return Err(ContarError::invalid(format!("varint overflow in {context}")));
            }
            value |= group << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(ContarError::invalid(format!("varint too long in {context}")))
    }

    /// Read a varint that must fit a `u32`
    pub fn read_u32(&mut self, context: &str) -> ContarResult<u32> {
        let value = self.read_varint(context)?;
        u32::try_from(value).map_err(|_| ContarError::invalid(format!("{context} value {value} exceeds u32")))
    }

    /// Read a zigzag-encoded signed value
    pub fn read_i32(&mut self, context: &str) -> ContarResult<i32> {
        self.read_u32(context).map(unzigzag)
    }

    /// Read a count; every counted element takes at least `min_element_bytes`
    ///
    /// Counts that could not possibly fit the remaining input are rejected
    /// before anything is allocated for them.
    pub fn read_count(&mut self, context: &str, min_element_bytes: usize) -> ContarResult<usize> {
        let count = self.read_varint(context)?;
        let count = usize::try_from(count)
            .map_err(|_| ContarError::invalid(format!("{context} count {count} too large")))?;
        if count.saturating_mul(min_element_bytes.max(1)) > self.remaining() {
            return Err(ContarError::truncated(format!("{context} ({count} entries)")));
        }
        Ok(count)
    }

    /// Read a length-prefixed UTF-8 string
    pub fn read_str(&mut self, context: &str) -> ContarResult<String> {
        let len = self.read_count(context, 1)?;
        let bytes = self.read_bytes(len, context)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| ContarError::invalid(format!("{context} is not UTF-8: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_known_encodings() {
        let mut enc = Encoder::new();
        enc.write_varint(0);
        enc.write_varint(127);
        enc.write_varint(128);
        enc.write_varint(300);
        assert_eq!(enc.finish(), vec![0x00, 0x7f, 0x80, 0x01, 0xac, 0x02]);
    }

    #[test]
    fn test_zigzag() {
        assert_eq!(zigzag(0), 0);
        assert_eq!(zigzag(-1), 1);
        assert_eq!(zigzag(1), 2);
        assert_eq!(zigzag(i32::MIN), u32::MAX);
        assert_eq!(unzigzag(u32::MAX), i32::MIN);
    }

    #[test]
    fn test_truncated_varint() {
        let mut dec = Decoder::new(&[0x80, 0x80]);
        assert!(matches!(
            dec.read_varint("hits"),
            Err(ContarError::Truncated { .. })
        ));
    }

    #[test]
    fn test_overlong_varint() {
        let bytes = [0xffu8; 11];
        let mut dec = Decoder::new(&bytes);
        assert!(matches!(
            dec.read_varint("hits"),
            Err(ContarError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_count_larger_than_input() {
        let mut enc = Encoder::new();
        enc.write_len(1_000_000);
        let bytes = enc.finish();
        let mut dec = Decoder::new(&bytes);
        assert!(dec.read_count("lines", 3).is_err());
    }

    #[test]
    fn test_u32_overflow() {
        let mut enc = Encoder::new();
        enc.write_varint(u64::from(u32::MAX) + 1);
        let bytes = enc.finish();
        assert!(Decoder::new(&bytes).read_u32("line").is_err());
    }

    proptest! {
        #[test]
        fn prop_varint_sequences(values in prop::collection::vec(any::<u64>(), 0..32)) {
            let mut enc = Encoder::new();
            for v in &values {
                enc.write_varint(*v);
            }
            let bytes = enc.finish();
            let mut dec = Decoder::new(&bytes);
            for v in &values {
                prop_assert_eq!(dec.read_varint("value").unwrap(), *v);
            }
            prop_assert_eq!(dec.remaining(), 0);
        }

        #[test]
        fn prop_zigzag_inverse(v in any::<i32>()) {
            prop_assert_eq!(unzigzag(zigzag(v)), v);
        }
    }
}
