//! Peer gossip: the connection registry and the queue-driven responder.

pub mod connections;
pub mod responder;

pub use connections::{Announcement, Connections, PeerHandles, PeerRequest};
pub use responder::{BlockPair, Item, Responder};
