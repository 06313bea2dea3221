//! Persistent chain state: the ordered-key pools, the transaction state
//! machine, the mining cursor, and the block store.

pub mod available;
mod block_store;
pub mod payment;
pub mod pool;
mod transaction;

use std::convert::TryInto;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, RwLock};

use thiserror::Error;

use bitmark_chain::digest::Digest;
use bitmark_chain::parameters::Network;

use pool::Pools;

pub use available::AvailableCursor;
pub use payment::{Payment, Prepaid};
pub use transaction::State;

/// Store configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Directory holding the pool database.
    pub path: PathBuf,
}

/// Failure to open or recover the backing store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),
    #[error("corrupt store: {0}")]
    Corrupt(&'static str),
}

// chain tip: the two values every subsystem reads together
struct ChainTip {
    next_number: u64,
    previous_link: Digest,
}

/// The node's persistent state.
///
/// One instance exists for the lifetime of the process, initialised before
/// any responder work begins. All interior locking is private: per-digest
/// transitions serialize on a 256-way shard of the digest's first byte, and
/// block finalization excludes them wholesale through `finalize`.
pub struct Store {
    pub(crate) pools: Pools,
    pub(crate) network: Network,
    chain: Mutex<ChainTip>,
    pub(crate) next_unpaid: AtomicU64,
    pub(crate) next_available: AtomicU64,
    shards: Vec<Mutex<()>>,
    pub(crate) finalize: RwLock<()>,
}

impl Store {
    /// Open the pools and recover counters and the chain tip.
    pub fn open(config: &Config, network: Network) -> Result<Store, StoreError> {
        let pools = Pools::open(&config.path)?;

        let next_unpaid = AtomicU64::new(next_counter(&pools.unpaid)?);
        let next_available = AtomicU64::new(next_counter(&pools.available)?);
        let chain = Mutex::new(recover_tip(&pools)?);

        let shards = (0..256).map(|_| Mutex::new(())).collect();

        Ok(Store {
            pools,
            network,
            chain,
            next_unpaid,
            next_available,
            shards,
            finalize: RwLock::new(()),
        })
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Next expected block number.
    pub fn height(&self) -> u64 {
        self.chain.lock().unwrap().next_number
    }

    /// Digest of the current chain tip.
    pub fn previous_link(&self) -> Digest {
        self.chain.lock().unwrap().previous_link
    }

    /// Force buffered writes to disk.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.pools.flush().map_err(StoreError::Storage)
    }

    pub(crate) fn lock_shard(&self, byte: u8) -> MutexGuard<'_, ()> {
        self.shards[byte as usize].lock().unwrap()
    }

    /// Lock two shards in index order; `None` second when they collide.
    pub(crate) fn lock_shard_pair(
        &self,
        a: u8,
        b: u8,
    ) -> (MutexGuard<'_, ()>, Option<MutexGuard<'_, ()>>) {
        if a == b {
            (self.lock_shard(a), None)
        } else {
            let low = a.min(b);
            let high = a.max(b);
            let first = self.lock_shard(low);
            let second = self.lock_shard(high);
            (first, Some(second))
        }
    }

    pub(crate) fn tip_mut(&self) -> MutexGuard<'_, ChainTip> {
        self.chain.lock().unwrap()
    }

    pub(crate) fn next_unpaid_counter(&self) -> u64 {
        self.next_unpaid.fetch_add(1, Ordering::SeqCst)
    }

    pub(crate) fn next_available_counter(&self) -> u64 {
        self.next_available.fetch_add(1, Ordering::SeqCst)
    }
}

// counters restart one past the highest stored queue key
fn next_counter(pool: &pool::Pool) -> Result<u64, StoreError> {
    match pool.last() {
        None => Ok(0),
        Some((key, _)) => {
            let key: [u8; 8] = key[..]
                .try_into()
                .map_err(|_| StoreError::Corrupt("queue key is not eight bytes"))?;
            Ok(u64::from_be_bytes(key) + 1)
        }
    }
}

fn recover_tip(pools: &Pools) -> Result<ChainTip, StoreError> {
    match pools.blocks.last() {
        None => Ok(ChainTip {
            next_number: 1,
            previous_link: Digest::default(),
        }),
        Some((key, value)) => {
            let key: [u8; 8] = key[..]
                .try_into()
                .map_err(|_| StoreError::Corrupt("block key is not eight bytes"))?;
            if value.len() < 80 {
                return Err(StoreError::Corrupt("stored block shorter than a header"));
            }
            Ok(ChainTip {
                next_number: u64::from_be_bytes(key) + 1,
                previous_link: Digest::new(&value[..80]),
            })
        }
    }
}
