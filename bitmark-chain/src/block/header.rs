use std::io;

use chrono::{DateTime, Duration, Utc};
use primitive_types::U256;
use serde::{Deserialize, Serialize};

use crate::digest::Digest;
use crate::fault::Fault;
use crate::serialization::{sha256d, BitmarkDeserialize, BitmarkSerialize};

/// A block header, containing metadata about a block.
///
/// Blocks are chained together via the backwards reference (previous block
/// digest) present in the header. The 80-byte serialized form is digest
/// compatible with BTC mining hardware.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Header {
    /// The block's version field.
    pub version: u32,

    /// The digest of the previous block, linking this block into the chain.
    pub previous_block: Digest,

    /// The root of the transaction Merkle tree, binding the header to the
    /// transactions in the block.
    pub merkle_root: Digest,

    /// Unix epoch time (UTC) when the miner started hashing the header,
    /// according to the miner.
    pub time: DateTime<Utc>,

    /// The target threshold the header digest must not exceed, in the same
    /// compact nBits format used by Bitcoin.
    pub bits: u32,

    /// An arbitrary field miners change to vary the header digest.
    pub nonce: u32,
}

impl Header {
    /// Length of the serialized header in bytes.
    pub const fn len() -> usize {
        80
    }

    /// Compute the header digest: the double SHA-256 of the 80 header bytes.
    pub fn digest(&self) -> Digest {
        let mut hash_writer = sha256d::Writer::default();
        self.bitmark_serialize(&mut hash_writer)
            .expect("sha256d writer is infallible");
        Digest(hash_writer.finish())
    }

    /// Expand the compact difficulty field to the 256-bit target threshold.
    pub fn target(&self) -> U256 {
        let exponent = (self.bits >> 24) as usize;
        let mantissa = U256::from(self.bits & 0x007f_ffff);
        if exponent <= 3 {
            mantissa >> (8 * (3 - exponent))
        } else {
            mantissa << (8 * (exponent - 3))
        }
    }

    /// Whether the header digest satisfies its own difficulty target.
    pub fn meets_target(&self) -> bool {
        self.digest().cmp_target(&self.target()) != std::cmp::Ordering::Greater
    }

    /// Reject headers timestamped more than two hours past the local clock.
    ///
    /// Non-deterministic by nature: clocks vary between nodes, and a header
    /// rejected now may be accepted later.
    pub fn time_is_valid_at(&self, now: DateTime<Utc>) -> Result<(), Fault> {
        let two_hours_in_the_future = now
            .checked_add_signed(Duration::hours(2))
            .expect("two hours from now does not overflow");
        if self.time <= two_hours_in_the_future {
            Ok(())
        } else {
            Err(Fault::InvalidBlockHeader)
        }
    }
}

impl BitmarkSerialize for Header {
    fn bitmark_serialize<W: io::Write>(&self, mut target: W) -> Result<(), io::Error> {
        self.version.bitmark_serialize(&mut target)?;
        self.previous_block.bitmark_serialize(&mut target)?;
        self.merkle_root.bitmark_serialize(&mut target)?;
        self.time.bitmark_serialize(&mut target)?;
        self.bits.bitmark_serialize(&mut target)?;
        self.nonce.bitmark_serialize(&mut target)
    }
}

impl BitmarkDeserialize for Header {
    fn bitmark_deserialize<R: io::Read>(mut reader: R) -> Result<Self, Fault> {
        Ok(Header {
            version: u32::bitmark_deserialize(&mut reader)?,
            previous_block: Digest::bitmark_deserialize(&mut reader)?,
            merkle_root: Digest::bitmark_deserialize(&mut reader)?,
            time: <DateTime<Utc>>::bitmark_deserialize(&mut reader)?,
            bits: u32::bitmark_deserialize(&mut reader)?,
            nonce: u32::bitmark_deserialize(&mut reader)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn header() -> Header {
        Header {
            version: 1,
            previous_block: Digest::new(b"previous"),
            merkle_root: Digest::new(b"merkle"),
            time: Utc.timestamp(1_417_000_000, 0),
            bits: 0x207f_ffff,
            nonce: 7,
        }
    }

    #[test]
    fn serialized_header_is_80_bytes() {
        let bytes = header().bitmark_serialize_to_vec().unwrap();
        assert_eq!(bytes.len(), Header::len());

        let back = Header::bitmark_deserialize(&bytes[..]).unwrap();
        assert_eq!(back, header());
    }

    #[test]
    fn digest_covers_the_packed_header() {
        let h = header();
        let bytes = h.bitmark_serialize_to_vec().unwrap();
        assert_eq!(h.digest(), Digest::new(&bytes));
    }

    #[test]
    fn compact_target_expands() {
        // exponent 0x20, mantissa 0x7fffff: an easy regtest-style target
        let h = header();
        assert_eq!(h.target() >> (8 * 29), U256::from(0x7f_ffffu64));
    }

    #[test]
    fn difficulty_filter_follows_the_digest() {
        // nonce 7 digests above the easy target, nonce 1 below it
        assert!(!header().meets_target());

        let mut h = header();
        h.nonce = 1;
        assert!(h.meets_target());
    }

    #[test]
    fn future_timestamps_are_rejected() {
        let mut h = header();
        let now = Utc.timestamp(1_417_000_000, 0);
        assert!(h.time_is_valid_at(now).is_ok());

        h.time = now + Duration::hours(3);
        assert_eq!(h.time_is_valid_at(now), Err(Fault::InvalidBlockHeader));
    }
}
