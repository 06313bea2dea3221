//! The variable-length integer encoding used by packed records and blocks.
//!
//! Values are written in little-endian seven-bit groups; the high bit of each
//! byte marks a continuation. Values below `0x80` therefore take one byte.
//! Note this is *not* the Bitcoin CompactSize encoding.

use crate::{BitmarkDeserialize, BitmarkSerialize, Fault};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Varint64(u64);

impl Varint64 {
    pub fn from(value: u64) -> Varint64 {
        Varint64(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// Encoded size in bytes of `value`.
    pub fn size(value: u64) -> usize {
        let mut n = 1;
        let mut value = value;
        while value >= 0x80 {
            value >>= 7;
            n += 1;
        }
        n
    }
}

impl BitmarkSerialize for Varint64 {
    fn bitmark_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        let mut value = self.0;
        while value >= 0x80 {
            target.write_all(&[(value as u8) | 0x80])?;
            value >>= 7;
        }
        target.write_all(&[value as u8])
    }
}

impl BitmarkDeserialize for Varint64 {
    fn bitmark_deserialize<R: std::io::Read>(mut reader: R) -> Result<Varint64, Fault> {
        let mut value = 0u64;
        let mut shift = 0u32;
        loop {
            let byte = u8::bitmark_deserialize(&mut reader)?;
            if shift == 63 && byte > 1 {
                return Err(Fault::InvalidCount);
            }
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(Varint64(value));
            }
            shift += 7;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn encode(value: u64) -> Vec<u8> {
        Varint64::from(value)
            .bitmark_serialize_to_vec()
            .expect("writing to a vec is infallible")
    }

    #[test]
    fn single_byte_values() {
        assert_eq!(encode(0), vec![0x00]);
        assert_eq!(encode(99), vec![0x63]);
        assert_eq!(encode(0x7f), vec![0x7f]);
    }

    #[test]
    fn continuation_values() {
        assert_eq!(encode(0x80), vec![0x80, 0x01]);
        assert_eq!(encode(0x3fff), vec![0xff, 0x7f]);
    }

    #[test]
    fn truncated_input_is_rejected() {
        assert_eq!(
            Varint64::bitmark_deserialize(&[0x80u8][..]),
            Err(Fault::InvalidLength)
        );
    }

    #[test]
    fn overlong_input_is_rejected() {
        let overlong = [0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x7f];
        assert_eq!(
            Varint64::bitmark_deserialize(&overlong[..]),
            Err(Fault::InvalidCount)
        );
    }

    proptest! {
        #[test]
        fn round_trip(value in any::<u64>()) {
            let encoded = encode(value);
            prop_assert_eq!(encoded.len(), Varint64::size(value));
            let decoded = Varint64::bitmark_deserialize(&encoded[..]).unwrap();
            prop_assert_eq!(decoded.value(), value);
        }
    }
}
