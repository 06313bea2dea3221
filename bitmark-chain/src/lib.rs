//! Core types for the bitmark property ledger: content-addressed identities,
//! the canonical record codec, and block structures.
#![allow(clippy::unit_arg)]

pub mod address;
pub mod assetindex;
pub mod block;
pub mod digest;
pub mod fault;
pub mod link;
pub mod parameters;
pub mod record;
pub mod serialization;
pub mod varint;

pub use digest::Digest;
pub use fault::Fault;
pub use serialization::{BitmarkDeserialize, BitmarkSerialize};
