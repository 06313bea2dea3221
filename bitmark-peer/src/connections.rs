//! Registry of live peer connections.
//!
//! The bilateral transport registers a connection once its handshake
//! completes and removes it on disconnect. The responder only ever talks to
//! whatever is active at the moment of a cast.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use bitmark_chain::digest::Digest;
use bitmark_chain::{block, record};

const FETCH_DEADLINE: Duration = Duration::from_secs(5);

/// Announcement gossiped to every connected peer.
#[derive(Clone, Debug)]
pub enum Announcement {
    /// `Block.Put` carrying the packed block bytes.
    BlockPut(block::Packed),
    /// `Transaction.Put` carrying the packed record bytes.
    TransactionPut(record::Packed),
}

/// A request addressed to a single peer.
#[derive(Debug)]
pub enum PeerRequest {
    /// Ask for the packed transaction behind `digest`.
    FetchTransaction {
        digest: Digest,
        reply: oneshot::Sender<Option<record::Packed>>,
    },
}

/// Channel endpoints handed to a transport connection on registration.
pub struct PeerHandles {
    pub announcements: mpsc::UnboundedReceiver<Announcement>,
    pub requests: mpsc::UnboundedReceiver<PeerRequest>,
}

struct Peer {
    announcements: mpsc::UnboundedSender<Announcement>,
    requests: mpsc::UnboundedSender<PeerRequest>,
}

/// The set of currently-active peer connections.
#[derive(Default)]
pub struct Connections {
    peers: RwLock<HashMap<String, Peer>>,
}

impl Connections {
    pub fn new() -> Connections {
        Connections::default()
    }

    /// Register a connection under its peer name.
    pub fn insert(&self, name: &str) -> PeerHandles {
        let (announce_tx, announce_rx) = mpsc::unbounded_channel();
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        self.peers.write().unwrap().insert(
            name.to_string(),
            Peer {
                announcements: announce_tx,
                requests: request_tx,
            },
        );
        debug!(peer = %name, "connection registered");
        PeerHandles {
            announcements: announce_rx,
            requests: request_rx,
        }
    }

    pub fn remove(&self, name: &str) {
        self.peers.write().unwrap().remove(name);
        debug!(peer = %name, "connection removed");
    }

    /// Names of the currently-active connections.
    pub fn active(&self) -> Vec<String> {
        self.peers.read().unwrap().keys().cloned().collect()
    }

    /// Send to every active peer.
    ///
    /// A failed delivery is only warned about: the local copy is
    /// authoritative and the peer reconciles through synchronisation.
    pub fn cast(&self, announcement: Announcement) {
        let peers = self.peers.read().unwrap();
        for (name, peer) in peers.iter() {
            if peer.announcements.send(announcement.clone()).is_err() {
                warn!(peer = %name, "announcement not delivered");
            }
        }
    }

    /// Ask one peer for a transaction, with a short deadline.
    pub async fn fetch_transaction(&self, name: &str, digest: Digest) -> Option<record::Packed> {
        let (reply, response) = oneshot::channel();
        {
            let peers = self.peers.read().unwrap();
            let peer = peers.get(name)?;
            let request = PeerRequest::FetchTransaction { digest, reply };
            if peer.requests.send(request).is_err() {
                warn!(peer = %name, "fetch request not delivered");
                return None;
            }
        }

        match tokio::time::timeout(FETCH_DEADLINE, response).await {
            Ok(Ok(found)) => found,
            _ => {
                debug!(peer = %name, %digest, "transaction fetch failed");
                None
            }
        }
    }
}
