//! Content-addressed identity for blocks and raw byte records.

use std::cmp::Ordering;
use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use primitive_types::U256;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::fault::Fault;
use crate::serialization::{sha256d, BitmarkDeserialize, BitmarkSerialize};

/// Number of bytes in a digest.
pub const DIGEST_SIZE: usize = 32;

/// A BTC-compatible double SHA-256 digest.
///
/// Stored as a little-endian byte array; rendered as a big-endian hex value
/// for printing; carried as little-endian base64 text for JSON encoding.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct Digest(pub [u8; DIGEST_SIZE]);

impl Digest {
    /// Digest a byte record.
    pub fn new(record: &[u8]) -> Digest {
        Digest(sha256d::digest(record))
    }

    /// Validate and copy a little-endian binary byte slice.
    pub fn from_bytes(buffer: &[u8]) -> Result<Digest, Fault> {
        if buffer.len() != DIGEST_SIZE {
            return Err(Fault::NotLink);
        }
        let mut digest = [0u8; DIGEST_SIZE];
        digest.copy_from_slice(buffer);
        Ok(Digest(digest))
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_SIZE] {
        &self.0
    }

    fn reversed(&self) -> [u8; DIGEST_SIZE] {
        let mut bytes = self.0;
        bytes.reverse();
        bytes
    }

    /// Compare against a proof-of-work target, interpreting the reversed
    /// bytes as a big-endian unsigned integer.
    pub fn cmp_target(&self, target: &U256) -> Ordering {
        U256::from_big_endian(&self.reversed()).cmp(target)
    }

    /// Little-endian word-swapped hex, the form BTC miners expect.
    pub fn btc_hex(&self) -> String {
        let mut buffer = [0u8; DIGEST_SIZE];
        for i in (0..DIGEST_SIZE).step_by(4) {
            buffer[i] = self.0[i + 3];
            buffer[i + 1] = self.0[i + 2];
            buffer[i + 2] = self.0[i + 1];
            buffer[i + 3] = self.0[i];
        }
        hex::encode(&buffer)
    }

    /// Little-endian hex, the form the stratum miner expects.
    pub fn miner_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.reversed()))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Digest")
            .field(&hex::encode(&self.reversed()))
            .finish()
    }
}

impl std::str::FromStr for Digest {
    type Err = Fault;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 2 * DIGEST_SIZE {
            return Err(Fault::NotLink);
        }
        let mut bytes = [0u8; DIGEST_SIZE];
        if hex::decode_to_slice(s, &mut bytes[..]).is_err() {
            return Err(Fault::InvalidCharacter);
        }
        bytes.reverse();
        Ok(Digest(bytes))
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Digest, D::Error> {
        struct DigestVisitor;

        impl<'de> Visitor<'de> for DigestVisitor {
            type Value = Digest;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("base64 encoded digest bytes")
            }

            fn visit_str<E: de::Error>(self, s: &str) -> Result<Digest, E> {
                let bytes = BASE64
                    .decode(s)
                    .map_err(|_| E::custom(Fault::InvalidCharacter))?;
                Digest::from_bytes(&bytes).map_err(E::custom)
            }
        }

        deserializer.deserialize_str(DigestVisitor)
    }
}

impl BitmarkSerialize for Digest {
    fn bitmark_serialize<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        self.0.bitmark_serialize(&mut target)
    }
}

impl BitmarkDeserialize for Digest {
    fn bitmark_deserialize<R: std::io::Read>(mut reader: R) -> Result<Digest, Fault> {
        Ok(Digest(<[u8; 32]>::bitmark_deserialize(&mut reader)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::{Digest as _, Sha256};

    #[test]
    fn display_is_reversed_double_sha256_hex() {
        let record = b"hello world";
        let digest = Digest::new(record);

        let mut expected: Vec<u8> = Sha256::digest(&Sha256::digest(record)).to_vec();
        expected.reverse();
        assert_eq!(digest.to_string(), hex::encode(&expected));
    }

    #[test]
    fn from_str_round_trips_display() {
        let digest = Digest::new(b"some record");
        let parsed: Digest = digest.to_string().parse().unwrap();
        assert_eq!(parsed, digest);
    }

    #[test]
    fn from_str_rejects_bad_input() {
        assert_eq!("deadbeef".parse::<Digest>(), Err(Fault::NotLink));
        let not_hex = "zz".repeat(32);
        assert_eq!(not_hex.parse::<Digest>(), Err(Fault::InvalidCharacter));
    }

    #[test]
    fn json_round_trip() {
        let digest = Digest::new(b"json me");
        let text = serde_json::to_string(&digest).unwrap();
        assert!(text.starts_with('"') && text.ends_with('"'));
        let back: Digest = serde_json::from_str(&text).unwrap();
        assert_eq!(back, digest);
    }

    #[test]
    fn target_comparison_uses_big_endian_value() {
        let mut bytes = [0u8; DIGEST_SIZE];
        bytes[31] = 0x01; // most significant byte after reversal
        let digest = Digest(bytes);

        let value = U256::from(1u64) << 248;
        assert_eq!(digest.cmp_target(&value), std::cmp::Ordering::Equal);
        assert_eq!(
            digest.cmp_target(&(value + 1)),
            std::cmp::Ordering::Less
        );
    }

    #[test]
    fn btc_hex_swaps_words() {
        let mut bytes = [0u8; DIGEST_SIZE];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = i as u8;
        }
        let digest = Digest(bytes);
        assert!(digest.btc_hex().starts_with("03020100"));
        assert_eq!(digest.miner_hex(), hex::encode(&bytes));
    }
}
