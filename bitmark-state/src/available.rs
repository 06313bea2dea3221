//! Streaming of mining-ready transaction identities.

use std::collections::HashSet;
use std::convert::TryInto;

use tracing::{error, warn};

use bitmark_chain::assetindex::AssetIndex;
use bitmark_chain::digest::Digest;
use bitmark_chain::link::Link;
use bitmark_chain::record::Record;

use crate::transaction::State;
use crate::Store;

/// A restartable scan over the available queue.
///
/// The position is an eight-byte counter owned by the caller: keep the
/// cursor and pass it back to continue where the previous batch stopped.
pub struct AvailableCursor {
    count: u64,
    // assets already emitted in the batch being built
    assets: HashSet<AssetIndex>,
}

impl AvailableCursor {
    pub fn new() -> AvailableCursor {
        AvailableCursor::from_position(0)
    }

    /// Resume a scan at a previously returned [`position`](Self::position).
    pub fn from_position(count: u64) -> AvailableCursor {
        AvailableCursor {
            count,
            assets: HashSet::new(),
        }
    }

    /// The queue counter the next batch starts from.
    pub fn position(&self) -> u64 {
        self.count
    }

    /// Fetch up to `count` transaction ids ready to mine.
    ///
    /// An issue whose asset still waits on its first confirmation is
    /// preceded by that asset's id, so the miner can only ever confirm them
    /// in registration order. An empty result leaves the cursor unchanged.
    pub fn fetch_available(&mut self, store: &Store, count: usize) -> Vec<Digest> {
        self.assets.clear();

        let available = store
            .pools
            .available
            .fetch(&self.count.to_be_bytes(), count);
        if available.is_empty() {
            return Vec::new();
        }

        let mut results = Vec::with_capacity(count);

        'scan: for (key, value) in &available {
            let entry_counter = match key[..].try_into() {
                Ok(bytes) => u64::from_be_bytes(bytes),
                Err(_) => {
                    error!("malformed available queue key");
                    continue;
                }
            };
            let tx_id = match Link::from_bytes(value) {
                Ok(link) => link,
                Err(_) => {
                    error!("malformed available queue entry");
                    continue;
                }
            };

            // the transaction may have been mined since the fetch
            match store.state_of(&tx_id) {
                Some((State::Available, _)) => {}
                state => {
                    warn!(%tx_id, ?state, "skipping non-available queue entry");
                    continue;
                }
            }

            let record = match store
                .transaction(&tx_id)
                .and_then(|packed| packed.unpack(store.network).ok())
            {
                Some(record) => record,
                None => {
                    error!(%tx_id, "available transaction does not unpack");
                    continue;
                }
            };

            if let Record::BitmarkIssue(issue) = &record {
                if let Some(asset_link) = store.asset_transaction(&issue.asset_index) {
                    if let Some((State::WaitingIssueTransaction, _)) =
                        store.state_of(&asset_link)
                    {
                        if !self.assets.contains(&issue.asset_index) {
                            results.push(Digest::from(asset_link));
                            self.assets.insert(issue.asset_index);

                            if results.len() == count {
                                // restart at this issue so the pair stays
                                // ordered across batches
                                self.count = entry_counter;
                                break 'scan;
                            }
                        }
                    }
                } else {
                    warn!(%tx_id, "issue without a registered asset");
                    continue;
                }
            }

            results.push(Digest::from(tx_id));
            self.count = entry_counter + 1;

            if results.len() == count {
                break;
            }
        }

        results
    }
}

impl Default for AvailableCursor {
    fn default() -> AvailableCursor {
        AvailableCursor::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::tests::{open_store, signed_asset, signed_issue};
    use tempdir::TempDir;

    #[test]
    fn empty_queue_yields_nothing_and_keeps_the_cursor() {
        bitmark_test::init();
        let dir = TempDir::new("cursor-test").unwrap();
        let store = open_store(&dir);

        let mut cursor = AvailableCursor::new();
        assert!(cursor.fetch_available(&store, 10).is_empty());
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn waiting_asset_precedes_its_issue() {
        bitmark_test::init();
        let dir = TempDir::new("cursor-test").unwrap();
        let store = open_store(&dir);

        let asset_link = store.write(&signed_asset()).unwrap();
        let issue_link = store.write(&signed_issue(1)).unwrap();
        store.set_paid(&issue_link).unwrap();

        let mut cursor = AvailableCursor::new();
        let batch = cursor.fetch_available(&store, 10);
        assert_eq!(
            batch,
            vec![Digest::from(asset_link), Digest::from(issue_link)]
        );
    }

    #[test]
    fn asset_is_not_emitted_twice_for_sibling_issues() {
        bitmark_test::init();
        let dir = TempDir::new("cursor-test").unwrap();
        let store = open_store(&dir);

        let asset_link = store.write(&signed_asset()).unwrap();
        let first = store.write(&signed_issue(1)).unwrap();
        let second = store.write(&signed_issue(2)).unwrap();
        store.set_paid(&first).unwrap();
        store.set_paid(&second).unwrap();

        let mut cursor = AvailableCursor::new();
        let batch = cursor.fetch_available(&store, 10);
        assert_eq!(
            batch,
            vec![
                Digest::from(asset_link),
                Digest::from(first),
                Digest::from(second)
            ]
        );

        // no duplicates within the batch
        let unique: std::collections::HashSet<_> = batch.iter().collect();
        assert_eq!(unique.len(), batch.len());
    }

    #[test]
    fn batch_never_exceeds_the_requested_count() {
        bitmark_test::init();
        let dir = TempDir::new("cursor-test").unwrap();
        let store = open_store(&dir);

        let asset_link = store.write(&signed_asset()).unwrap();
        let issue_link = store.write(&signed_issue(1)).unwrap();
        store.set_paid(&issue_link).unwrap();

        // the asset insertion fills the batch; the issue must wait
        let mut cursor = AvailableCursor::new();
        let batch = cursor.fetch_available(&store, 1);
        assert_eq!(batch, vec![Digest::from(asset_link)]);

        // the batch becomes a block; the next one restarts at the issue
        store.finalize_transactions(&batch);
        let batch = cursor.fetch_available(&store, 10);
        assert_eq!(batch, vec![Digest::from(issue_link)]);
    }

    #[test]
    fn cursor_resumes_past_emitted_entries() {
        bitmark_test::init();
        let dir = TempDir::new("cursor-test").unwrap();
        let store = open_store(&dir);

        store.write(&signed_asset()).unwrap();
        let mut links = Vec::new();
        for nonce in 1..=4 {
            let link = store.write(&signed_issue(nonce)).unwrap();
            store.set_paid(&link).unwrap();
            links.push(Digest::from(link));
        }

        let mut cursor = AvailableCursor::new();
        let mut collected = Vec::new();
        loop {
            // each batch is mined before the next is fetched
            let batch = cursor.fetch_available(&store, 2);
            if batch.is_empty() {
                break;
            }
            store.finalize_transactions(&batch);
            collected.extend(batch);
        }

        // one asset insertion plus all four issues, in queue order
        assert_eq!(collected.len(), 5);
        assert_eq!(&collected[1..], &links[..]);
    }
}
