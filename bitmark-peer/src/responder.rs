//! The queue-driven responder.
//!
//! A single consumer owns the message-bus queue; every item is handed to its
//! own task so slow pool or network operations never stall the queue. The
//! loop watches the shutdown signal between items only — in-flight workers
//! run to completion.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use bitmark_chain::digest::Digest;
use bitmark_chain::fault::Fault;
use bitmark_chain::link::Link;
use bitmark_chain::{block, record};
use bitmark_state::{Payment, Store};

use crate::connections::{Announcement, Connections};

/// A remote block in both of its forms.
#[derive(Clone, Debug)]
pub struct BlockPair {
    pub unpacked: block::Block,
    pub packed: block::Packed,
}

/// An item from the message bus.
#[derive(Debug)]
pub enum Item {
    /// a block relayed by a connected peer
    Block(BlockPair),
    /// a block produced by the local miner, already saved locally
    Mined(block::Packed),
    /// a packed transaction from a peer or client RPC
    Transaction(record::Packed),
}

/// Integrates bus items into local state and gossips them onward.
pub struct Responder {
    store: Arc<Store>,
    connections: Arc<Connections>,
    payment: Arc<dyn Payment>,
}

impl Responder {
    pub fn new(
        store: Arc<Store>,
        connections: Arc<Connections>,
        payment: Arc<dyn Payment>,
    ) -> Responder {
        Responder {
            store,
            connections,
            payment,
        }
    }

    /// Consume the queue until shutdown or bus close.
    pub async fn run(
        self: Arc<Self>,
        mut queue: mpsc::UnboundedReceiver<Item>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!("starting");
        loop {
            tokio::select! {
                item = queue.recv() => match item {
                    Some(item) => {
                        let responder = self.clone();
                        tokio::spawn(async move { responder.process(item).await });
                    }
                    None => break,
                },
                _ = shutdown.changed() => break,
            }
        }
        info!("shutting down");
    }

    async fn process(&self, item: Item) {
        match item {
            Item::Block(pair) => self.incoming_block(pair).await,

            Item::Mined(packed) => {
                // the miner stores everything before announcing, so this
                // goes straight out
                info!("broadcasting mined block");
                self.connections.cast(Announcement::BlockPut(packed));
            }

            Item::Transaction(packed) => self.incoming_transaction(packed).await,
        }
    }

    async fn incoming_block(&self, pair: BlockPair) {
        let number = pair.unpacked.number;

        if number < self.store.height() {
            info!(number, "ignore block");
            return;
        }
        if number != self.store.height()
            || pair.unpacked.header.previous_block != self.store.previous_link()
        {
            // Too far ahead, or a fork: chain integrity cannot be verified
            // from here, so the block is neither saved nor forwarded; the
            // synchronisation path catches up instead.
            info!(number, "ignore non-next block");
            return;
        }

        if !self.fetch_missing_transactions(&pair.unpacked).await {
            warn!(number, "missing transactions, block not saved");
            return;
        }

        if let Err(fault) = pair.unpacked.check(Utc::now()) {
            warn!(number, %fault, "invalid block");
            return;
        }

        // save_block re-checks linkage under its own lock, so two workers
        // racing on the same height leave exactly one saved
        if let Err(fault) = self.store.save_block(&pair.unpacked, &pair.packed) {
            warn!(number, %fault, "block not saved");
            return;
        }

        self.connections.cast(Announcement::BlockPut(pair.packed));
    }

    // Ensure every transaction the block confirms is stored locally, asking
    // the active peers for any the bus has not delivered. False when one is
    // unobtainable.
    async fn fetch_missing_transactions(&self, block: &block::Block) -> bool {
        let missing: Vec<Digest> = block
            .transactions
            .iter()
            .filter(|digest| !self.store.has_transaction(digest))
            .cloned()
            .collect();
        if missing.is_empty() {
            return true;
        }

        let active = self.connections.active();
        for digest in missing {
            let mut found = false;
            for peer in &active {
                if let Some(packed) = self.connections.fetch_transaction(peer, digest).await {
                    if packed.link() != Link::from(digest) {
                        warn!(peer = %peer, "peer answered with a different transaction");
                        continue;
                    }
                    match self.store.write(&packed) {
                        Ok(_) | Err(Fault::TransactionAlreadyExists) => {
                            found = true;
                            break;
                        }
                        Err(fault) => {
                            warn!(%digest, %fault, "fetched transaction rejected");
                        }
                    }
                }
            }
            if !found {
                return false;
            }
        }
        true
    }

    async fn incoming_transaction(&self, packed: record::Packed) {
        match self.store.write(&packed) {
            Err(Fault::AssetNotFound) => info!("no asset, ignoring incoming transaction"),

            Err(Fault::TransactionAlreadyExists) => {
                debug!("duplicate, ignoring incoming transaction")
            }

            Err(fault) => warn!(%fault, "rejected incoming transaction"),

            Ok(link) => {
                info!(%link, "new transaction");

                // set paid immediately if possible
                if self.payment.is_paid(&link) {
                    if let Err(fault) = self.store.set_paid(&link) {
                        warn!(%link, %fault, "payment not recorded");
                    }
                }

                self.connections.cast(Announcement::TransactionPut(packed));
            }
        }
    }
}
