//! Blocks and block-related structures.
//!
//! A packed block is the 80-byte header, a varint-prefixed coinbase section,
//! and a varint-counted list of transaction digests (the Merkle tree base).
//! Full transaction records travel and persist separately; a block binds
//! their identities. The block number rides at the front of the coinbase
//! section, the way BIP-34 puts heights in coinbase scripts.

mod header;

use chrono::{DateTime, Utc};

use crate::digest::{Digest, DIGEST_SIZE};
use crate::fault::Fault;
use crate::serialization::{sha256d, BitmarkDeserialize, BitmarkSerialize};
use crate::varint::Varint64;

pub use header::Header;

/// The maximum size of a packed block, in bytes.
pub const MAX_BLOCK_BYTES: u64 = 4_000_000;

/// A block in its serialized form, as stored and gossiped.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Packed(Vec<u8>);

/// An unpacked block.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Block {
    /// The chain height this block claims, from the coinbase prefix.
    pub number: u64,
    pub header: Header,
    /// The digest of the 80 header bytes.
    pub digest: Digest,
    pub timestamp: DateTime<Utc>,
    /// Identities of the transactions the block confirms, in tree order.
    pub transactions: Vec<Digest>,
    /// Opaque miner data; the leading varint is the block number.
    pub coinbase: Vec<u8>,
}

impl Packed {
    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Strictly decode a packed block.
    pub fn unpack(&self) -> Result<Block, Fault> {
        if self.0.len() < Header::len() || self.0.len() as u64 > MAX_BLOCK_BYTES {
            return Err(Fault::InvalidBlock);
        }

        // hash the raw header bytes once, before parsing them
        let digest = Digest(sha256d::digest(&self.0[..Header::len()]));
        let header = Header::bitmark_deserialize(&self.0[..Header::len()])?;

        let mut src: &[u8] = &self.0[Header::len()..];

        let coinbase = Vec::<u8>::bitmark_deserialize(&mut src)?;
        let number = Varint64::bitmark_deserialize(&coinbase[..])?.value();

        let count = Varint64::bitmark_deserialize(&mut src)?.value();
        if count > MAX_BLOCK_BYTES / DIGEST_SIZE as u64 {
            return Err(Fault::InvalidCount);
        }
        let mut transactions = Vec::with_capacity(count as usize);
        for _ in 0..count {
            transactions.push(Digest::bitmark_deserialize(&mut src)?);
        }
        if !src.is_empty() {
            return Err(Fault::InvalidBlock);
        }

        Ok(Block {
            number,
            digest,
            timestamp: header.time,
            header,
            transactions,
            coinbase,
        })
    }
}

impl From<Vec<u8>> for Packed {
    fn from(bytes: Vec<u8>) -> Packed {
        Packed(bytes)
    }
}

impl AsRef<[u8]> for Packed {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Block {
    /// Assemble an unpacked block; the coinbase gains the number prefix.
    pub fn assemble(
        number: u64,
        header: Header,
        miner_data: &[u8],
        transactions: Vec<Digest>,
    ) -> Block {
        let mut coinbase = Varint64::from(number)
            .bitmark_serialize_to_vec()
            .expect("writing to a vec is infallible");
        coinbase.extend_from_slice(miner_data);
        Block {
            number,
            digest: header.digest(),
            timestamp: header.time,
            header,
            transactions,
            coinbase,
        }
    }

    /// Serialize back to the canonical packed form.
    pub fn pack(&self) -> Result<Packed, Fault> {
        let mut bytes = Vec::new();
        self.header.bitmark_serialize(&mut bytes)?;
        self.coinbase.bitmark_serialize(&mut bytes)?;
        Varint64::from(self.transactions.len() as u64).bitmark_serialize(&mut bytes)?;
        for digest in &self.transactions {
            digest.bitmark_serialize(&mut bytes)?;
        }
        if bytes.len() as u64 > MAX_BLOCK_BYTES {
            return Err(Fault::InvalidBlock);
        }
        Ok(Packed(bytes))
    }

    /// Context-free validity: proof of work, clock window, Merkle binding.
    ///
    /// Chain linkage (number and previous digest against the local tip) is
    /// the store's check, made under its tip lock.
    pub fn check(&self, now: DateTime<Utc>) -> Result<(), Fault> {
        self.header.time_is_valid_at(now)?;
        if self.header.merkle_root != merkle_root(&self.transactions) {
            return Err(Fault::InvalidBlock);
        }
        if !self.header.meets_target() {
            return Err(Fault::InvalidBlock);
        }
        Ok(())
    }
}

impl std::fmt::Display for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Block")
            .field("number", &self.number)
            .field("digest", &self.digest)
            .finish()
    }
}

/// Fold transaction digests into a BTC-style Merkle root.
///
/// Pairs are double-SHA-256 hashed; an odd node is paired with itself. An
/// empty list folds to the zero digest.
pub fn merkle_root(digests: &[Digest]) -> Digest {
    if digests.is_empty() {
        return Digest::default();
    }
    let mut level: Vec<Digest> = digests.to_vec();
    while level.len() > 1 {
        let mut next = Vec::with_capacity((level.len() + 1) / 2);
        for pair in level.chunks(2) {
            let left = pair[0];
            let right = if pair.len() == 2 { pair[1] } else { pair[0] };
            let mut data = [0u8; 2 * DIGEST_SIZE];
            data[..DIGEST_SIZE].copy_from_slice(left.as_bytes());
            data[DIGEST_SIZE..].copy_from_slice(right.as_bytes());
            next.push(Digest::new(&data));
        }
        level = next;
    }
    level[0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn digests(n: usize) -> Vec<Digest> {
        (0..n)
            .map(|i| Digest::new(format!("tx-{}", i).as_bytes()))
            .collect()
    }

    fn test_block(number: u64, transactions: Vec<Digest>) -> Block {
        let header = Header {
            version: 1,
            previous_block: Digest::new(b"previous"),
            merkle_root: merkle_root(&transactions),
            time: Utc.timestamp(1_417_000_000, 0),
            bits: 0x207f_ffff,
            nonce: 0,
        };
        Block::assemble(number, header, b"miner pays itself", transactions)
    }

    #[test]
    fn pack_unpack_round_trip() {
        let block = test_block(42, digests(5));
        let packed = block.pack().unwrap();
        let back = packed.unpack().unwrap();
        assert_eq!(back, block);
        assert_eq!(back.number, 42);
        assert_eq!(back.digest, block.header.digest());
    }

    #[test]
    fn empty_transaction_list_round_trips() {
        let block = test_block(1, Vec::new());
        let back = block.pack().unwrap().unpack().unwrap();
        assert_eq!(back.transactions.len(), 0);
    }

    #[test]
    fn truncated_block_is_rejected() {
        let packed = test_block(3, digests(2)).pack().unwrap();
        let mut bytes = packed.into_bytes();
        bytes.truncate(bytes.len() - 1);
        assert!(Packed::from(bytes).unpack().is_err());
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let packed = test_block(3, digests(2)).pack().unwrap();
        let mut bytes = packed.into_bytes();
        bytes.push(0xff);
        assert_eq!(Packed::from(bytes).unpack(), Err(Fault::InvalidBlock));
    }

    #[test]
    fn merkle_root_of_one_is_the_leaf() {
        let leaves = digests(1);
        assert_eq!(merkle_root(&leaves), leaves[0]);
    }

    #[test]
    fn merkle_root_duplicates_the_odd_leaf() {
        let leaves = digests(3);
        let pair_one = {
            let mut data = [0u8; 64];
            data[..32].copy_from_slice(leaves[0].as_bytes());
            data[32..].copy_from_slice(leaves[1].as_bytes());
            Digest::new(&data)
        };
        let pair_two = {
            let mut data = [0u8; 64];
            data[..32].copy_from_slice(leaves[2].as_bytes());
            data[32..].copy_from_slice(leaves[2].as_bytes());
            Digest::new(&data)
        };
        let mut top = [0u8; 64];
        top[..32].copy_from_slice(pair_one.as_bytes());
        top[32..].copy_from_slice(pair_two.as_bytes());
        assert_eq!(merkle_root(&leaves), Digest::new(&top));
    }

    #[test]
    fn check_rejects_a_bad_merkle_root() {
        let mut block = test_block(9, digests(4));
        block.header.merkle_root = Digest::new(b"somewhere else");
        block.digest = block.header.digest();
        let now = block.header.time;
        assert!(block.check(now).is_err());
    }
}
