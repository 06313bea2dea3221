//! The content-addressed identity of a registered asset.

use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest as _, Sha512};

use crate::fault::Fault;
use crate::serialization::{BitmarkDeserialize, BitmarkSerialize};

/// Number of bytes in an asset index.
pub const ASSET_INDEX_SIZE: usize = 64;

// literal tag carried by the text forms, never by the raw bytes
const ASSET_INDEX_PREFIX: &str = "BMA0";
const ASSET_INDEX_PREFIX_SIZE: usize = 4;

/// The double SHA-512 over the canonical pre-signature bytes of an asset
/// registration record.
///
/// Stored as a little-endian byte array; rendered as a tagged big-endian hex
/// value for printing; carried as tagged little-endian base64 text for JSON
/// encoding.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct AssetIndex(pub [u8; ASSET_INDEX_SIZE]);

impl AssetIndex {
    /// Digest a canonical asset record.
    pub fn new(record: &[u8]) -> AssetIndex {
        let round_one = Sha512::digest(record);
        let round_two = Sha512::digest(&round_one);
        let mut index = [0u8; ASSET_INDEX_SIZE];
        index.copy_from_slice(&round_two);
        AssetIndex(index)
    }

    /// Validate and copy a little-endian binary byte slice.
    pub fn from_bytes(buffer: &[u8]) -> Result<AssetIndex, Fault> {
        if buffer.len() != ASSET_INDEX_SIZE {
            return Err(Fault::NotAssetIndex);
        }
        let mut index = [0u8; ASSET_INDEX_SIZE];
        index.copy_from_slice(buffer);
        Ok(AssetIndex(index))
    }

    pub fn as_bytes(&self) -> &[u8; ASSET_INDEX_SIZE] {
        &self.0
    }

    fn reversed(&self) -> [u8; ASSET_INDEX_SIZE] {
        let mut bytes = self.0;
        bytes.reverse();
        bytes
    }

    // tag ++ raw little-endian bytes, the staging for base64 text forms
    fn tagged(&self) -> Vec<u8> {
        let mut stage = Vec::with_capacity(ASSET_INDEX_PREFIX_SIZE + ASSET_INDEX_SIZE);
        stage.extend_from_slice(ASSET_INDEX_PREFIX.as_bytes());
        stage.extend_from_slice(&self.0);
        stage
    }
}

impl fmt::Display for AssetIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(ASSET_INDEX_PREFIX)?;
        f.write_str(&hex::encode(&self.reversed()))
    }
}

impl fmt::Debug for AssetIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AssetIndex")
            .field(&hex::encode(&self.reversed()))
            .finish()
    }
}

impl std::str::FromStr for AssetIndex {
    type Err = Fault;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != ASSET_INDEX_PREFIX_SIZE + 2 * ASSET_INDEX_SIZE {
            return Err(Fault::NotAssetIndex);
        }
        if !s.starts_with(ASSET_INDEX_PREFIX) {
            return Err(Fault::NotAssetIndex);
        }
        let mut bytes = [0u8; ASSET_INDEX_SIZE];
        if hex::decode_to_slice(&s[ASSET_INDEX_PREFIX_SIZE..], &mut bytes[..]).is_err() {
            return Err(Fault::InvalidCharacter);
        }
        bytes.reverse();
        Ok(AssetIndex(bytes))
    }
}

impl Serialize for AssetIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(&self.tagged()))
    }
}

impl<'de> Deserialize<'de> for AssetIndex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<AssetIndex, D::Error> {
        struct AssetIndexVisitor;

        impl<'de> Visitor<'de> for AssetIndexVisitor {
            type Value = AssetIndex;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("base64 encoded tagged asset index bytes")
            }

            fn visit_str<E: de::Error>(self, s: &str) -> Result<AssetIndex, E> {
                let bytes = BASE64
                    .decode(s)
                    .map_err(|_| E::custom(Fault::InvalidCharacter))?;
                if bytes.len() != ASSET_INDEX_PREFIX_SIZE + ASSET_INDEX_SIZE
                    || &bytes[..ASSET_INDEX_PREFIX_SIZE] != ASSET_INDEX_PREFIX.as_bytes()
                {
                    return Err(E::custom(Fault::NotAssetIndex));
                }
                AssetIndex::from_bytes(&bytes[ASSET_INDEX_PREFIX_SIZE..]).map_err(E::custom)
            }
        }

        deserializer.deserialize_str(AssetIndexVisitor)
    }
}

impl BitmarkSerialize for AssetIndex {
    fn bitmark_serialize<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        self.0.bitmark_serialize(&mut target)
    }
}

impl BitmarkDeserialize for AssetIndex {
    fn bitmark_deserialize<R: std::io::Read>(mut reader: R) -> Result<AssetIndex, Fault> {
        Ok(AssetIndex(<[u8; 64]>::bitmark_deserialize(&mut reader)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;

    #[test]
    fn display_carries_the_tag() {
        let index = AssetIndex::new(b"an asset record");
        let text = index.to_string();
        assert!(text.starts_with("BMA0"));
        assert_eq!(text.len(), 4 + 128);
        assert_eq!(text.parse::<AssetIndex>().unwrap(), index);
    }

    #[test]
    fn untagged_text_is_rejected() {
        let index = AssetIndex::new(b"an asset record");
        let untagged = index.to_string().split_off(4);
        assert_eq!(untagged.parse::<AssetIndex>(), Err(Fault::NotAssetIndex));
    }

    #[test]
    fn wrong_tag_is_rejected() {
        let index = AssetIndex::new(b"an asset record");
        let text = index.to_string().replacen("BMA0", "BMK0", 1);
        assert_eq!(text.parse::<AssetIndex>(), Err(Fault::NotAssetIndex));
    }

    #[test]
    fn json_round_trip_keeps_the_tag() {
        let index = AssetIndex::new(b"json me");
        let text = serde_json::to_string(&index).unwrap();

        let back: AssetIndex = serde_json::from_str(&text).unwrap();
        assert_eq!(back, index);

        // tag is inside the base64, not outside it
        let raw: String = serde_json::from_str::<String>(&text).unwrap();
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(&raw)
            .unwrap();
        assert_eq!(&decoded[..4], b"BMA0");
        assert_eq!(&decoded[4..], &index.0[..]);
    }

    #[test]
    fn untagged_json_is_rejected() {
        let index = AssetIndex::new(b"no tag");
        let untagged = format!(
            "\"{}\"",
            base64::engine::general_purpose::STANDARD.encode(&index.0)
        );
        assert!(serde_json::from_str::<AssetIndex>(&untagged).is_err());
    }

    #[test]
    fn from_bytes_checks_length() {
        assert_eq!(AssetIndex::from_bytes(&[0u8; 32]), Err(Fault::NotAssetIndex));
        assert!(AssetIndex::from_bytes(&[0u8; 64]).is_ok());
    }
}
