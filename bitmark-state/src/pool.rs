//! Ordered-key pools over the backing store.
//!
//! Each pool is a namespace selected by a single ASCII prefix byte; keys
//! inside a pool are compared as raw byte sequences, so big-endian numeric
//! keys scan in numeric order.
//!
//! Pool layout:
//!
//!   B<block-number>       packed block bytes
//!   T<tx-digest>          packed transaction bytes
//!   S<tx-digest>          state byte ++ u64 queue index
//!   U<counter>            tx-digest ++ u64 timestamp (unpaid queue)
//!   A<counter>            tx-digest (paid, available for mining)
//!   I<asset-index>        tx-digest of the registering AssetData
//!   O<tx-digest>          owner public key ++ registration digest
//!   K<pubkey><tx-digest>  kind byte ++ asset index (per-owner holdings)

use std::path::Path;

use tracing::error;

/// Pool name prefixes.
pub mod names {
    pub const BLOCK_DATA: u8 = b'B';
    pub const TRANSACTION_DATA: u8 = b'T';
    pub const TRANSACTION_STATE: u8 = b'S';
    pub const UNPAID_INDEX: u8 = b'U';
    pub const AVAILABLE_INDEX: u8 = b'A';
    pub const ASSET_DATA: u8 = b'I';
    pub const OWNER_INDEX: u8 = b'O';
    pub const OWNERSHIP_LIST: u8 = b'K';
}

/// A single ordered-key namespace.
///
/// Total on keys: lookups of absent keys return `None`. Storage faults are
/// not recoverable and terminate the process through [`fatal`].
#[derive(Clone)]
pub struct Pool {
    tree: sled::Tree,
    name: &'static str,
}

impl Pool {
    fn open(db: &sled::Db, prefix: u8, name: &'static str) -> Result<Pool, sled::Error> {
        let tree = db.open_tree([prefix])?;
        Ok(Pool { tree, name })
    }

    pub fn put(&self, key: &[u8], value: &[u8]) {
        self.tree
            .insert(key, value)
            .unwrap_or_else(|error| fatal(self.name, "put", &error));
    }

    pub fn get(&self, key: &[u8]) -> Option<sled::IVec> {
        self.tree
            .get(key)
            .unwrap_or_else(|error| fatal(self.name, "get", &error))
    }

    pub fn has(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    pub fn delete(&self, key: &[u8]) {
        self.tree
            .remove(key)
            .unwrap_or_else(|error| fatal(self.name, "delete", &error));
    }

    /// Up to `max` entries at keys `>= start`, in key order.
    pub fn fetch(&self, start: &[u8], max: usize) -> Vec<(sled::IVec, sled::IVec)> {
        self.tree
            .range(start.to_vec()..)
            .take(max)
            .map(|entry| entry.unwrap_or_else(|error| fatal(self.name, "fetch", &error)))
            .collect()
    }

    /// The highest-keyed entry, if any.
    pub fn last(&self) -> Option<(sled::IVec, sled::IVec)> {
        self.tree
            .last()
            .unwrap_or_else(|error| fatal(self.name, "last", &error))
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.tree.len()
    }
}

/// Every pool, opened over one store directory.
pub struct Pools {
    pub blocks: Pool,
    pub transactions: Pool,
    pub states: Pool,
    pub unpaid: Pool,
    pub available: Pool,
    pub assets: Pool,
    pub owners: Pool,
    pub ownership: Pool,
    db: sled::Db,
}

impl Pools {
    pub fn open(path: &Path) -> Result<Pools, sled::Error> {
        let db = sled::Config::new().path(path).open()?;
        Ok(Pools {
            blocks: Pool::open(&db, names::BLOCK_DATA, "blocks")?,
            transactions: Pool::open(&db, names::TRANSACTION_DATA, "transactions")?,
            states: Pool::open(&db, names::TRANSACTION_STATE, "states")?,
            unpaid: Pool::open(&db, names::UNPAID_INDEX, "unpaid")?,
            available: Pool::open(&db, names::AVAILABLE_INDEX, "available")?,
            assets: Pool::open(&db, names::ASSET_DATA, "assets")?,
            owners: Pool::open(&db, names::OWNER_INDEX, "owners")?,
            ownership: Pool::open(&db, names::OWNERSHIP_LIST, "ownership")?,
            db,
        })
    }

    /// Force buffered writes to disk.
    pub fn flush(&self) -> Result<(), sled::Error> {
        self.db.flush().map(|_| ())
    }
}

/// Terminate on an unrecoverable storage fault.
///
/// Continuing against a store that fails basic operations would let local
/// state silently diverge from the chain, so the process stops here.
fn fatal(pool: &str, operation: &str, error: &sled::Error) -> ! {
    error!(pool, operation, %error, "unrecoverable storage fault");
    std::process::abort();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn fetch_scans_in_key_order() {
        let dir = TempDir::new("pool-test").unwrap();
        let pools = Pools::open(dir.path()).unwrap();

        for n in [3u64, 1, 2].iter() {
            pools.unpaid.put(&n.to_be_bytes(), b"x");
        }

        let entries = pools.unpaid.fetch(&1u64.to_be_bytes(), 10);
        let keys: Vec<u64> = entries
            .iter()
            .map(|(k, _)| {
                let mut key = [0u8; 8];
                key.copy_from_slice(k);
                u64::from_be_bytes(key)
            })
            .collect();
        assert_eq!(keys, vec![1, 2, 3]);

        let from_two = pools.unpaid.fetch(&2u64.to_be_bytes(), 1);
        assert_eq!(from_two.len(), 1);
    }

    #[test]
    fn pools_are_disjoint_namespaces() {
        let dir = TempDir::new("pool-test").unwrap();
        let pools = Pools::open(dir.path()).unwrap();

        pools.transactions.put(b"same-key", b"tx");
        pools.states.put(b"same-key", b"state");

        assert_eq!(&pools.transactions.get(b"same-key").unwrap()[..], b"tx");
        assert_eq!(&pools.states.get(b"same-key").unwrap()[..], b"state");

        pools.transactions.delete(b"same-key");
        assert!(pools.transactions.get(b"same-key").is_none());
        assert!(pools.states.has(b"same-key"));
    }

    #[test]
    fn missing_keys_read_cleanly() {
        let dir = TempDir::new("pool-test").unwrap();
        let pools = Pools::open(dir.path()).unwrap();
        assert!(pools.blocks.get(b"nothing").is_none());
        assert!(pools.blocks.last().is_none());
        assert!(pools.blocks.fetch(b"", 5).is_empty());
    }
}
