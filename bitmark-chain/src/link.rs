//! Transaction identity: the digest of a packed transaction record.

use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::digest::Digest;
use crate::fault::Fault;
use crate::serialization::{BitmarkDeserialize, BitmarkSerialize};

/// Number of bytes in a link.
pub const LINK_SIZE: usize = 32;

// literal tag carried by the text forms, never by the raw bytes
const LINK_PREFIX: &str = "BMK0";
const LINK_PREFIX_SIZE: usize = 4;

/// A transaction identifier: the double SHA-256 of the packed record.
///
/// The same value as a [`Digest`] over the record bytes; the tag on the text
/// forms distinguishes it in user input.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct Link(pub [u8; LINK_SIZE]);

impl Link {
    /// Digest a packed transaction record.
    pub fn new(record: &[u8]) -> Link {
        Link(*Digest::new(record).as_bytes())
    }

    /// Validate and copy a little-endian binary byte slice.
    pub fn from_bytes(buffer: &[u8]) -> Result<Link, Fault> {
        if buffer.len() != LINK_SIZE {
            return Err(Fault::NotLink);
        }
        let mut link = [0u8; LINK_SIZE];
        link.copy_from_slice(buffer);
        Ok(Link(link))
    }

    pub fn as_bytes(&self) -> &[u8; LINK_SIZE] {
        &self.0
    }

    fn reversed(&self) -> [u8; LINK_SIZE] {
        let mut bytes = self.0;
        bytes.reverse();
        bytes
    }

    fn tagged(&self) -> Vec<u8> {
        let mut stage = Vec::with_capacity(LINK_PREFIX_SIZE + LINK_SIZE);
        stage.extend_from_slice(LINK_PREFIX.as_bytes());
        stage.extend_from_slice(&self.0);
        stage
    }
}

impl From<Link> for Digest {
    fn from(link: Link) -> Digest {
        Digest(link.0)
    }
}

impl From<Digest> for Link {
    fn from(digest: Digest) -> Link {
        Link(digest.0)
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(LINK_PREFIX)?;
        f.write_str(&hex::encode(&self.reversed()))
    }
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Link")
            .field(&hex::encode(&self.reversed()))
            .finish()
    }
}

impl std::str::FromStr for Link {
    type Err = Fault;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != LINK_PREFIX_SIZE + 2 * LINK_SIZE {
            return Err(Fault::NotLink);
        }
        if !s.starts_with(LINK_PREFIX) {
            return Err(Fault::NotLink);
        }
        let mut bytes = [0u8; LINK_SIZE];
        if hex::decode_to_slice(&s[LINK_PREFIX_SIZE..], &mut bytes[..]).is_err() {
            return Err(Fault::InvalidCharacter);
        }
        bytes.reverse();
        Ok(Link(bytes))
    }
}

impl Serialize for Link {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(&self.tagged()))
    }
}

impl<'de> Deserialize<'de> for Link {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Link, D::Error> {
        struct LinkVisitor;

        impl<'de> Visitor<'de> for LinkVisitor {
            type Value = Link;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("base64 encoded tagged link bytes")
            }

            fn visit_str<E: de::Error>(self, s: &str) -> Result<Link, E> {
                let bytes = BASE64
                    .decode(s)
                    .map_err(|_| E::custom(Fault::InvalidCharacter))?;
                if bytes.len() != LINK_PREFIX_SIZE + LINK_SIZE
                    || &bytes[..LINK_PREFIX_SIZE] != LINK_PREFIX.as_bytes()
                {
                    return Err(E::custom(Fault::NotLink));
                }
                Link::from_bytes(&bytes[LINK_PREFIX_SIZE..]).map_err(E::custom)
            }
        }

        deserializer.deserialize_str(LinkVisitor)
    }
}

impl BitmarkSerialize for Link {
    fn bitmark_serialize<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        self.0.bitmark_serialize(&mut target)
    }
}

impl BitmarkDeserialize for Link {
    fn bitmark_deserialize<R: std::io::Read>(mut reader: R) -> Result<Link, Fault> {
        Ok(Link(<[u8; 32]>::bitmark_deserialize(&mut reader)?))
    }
}
