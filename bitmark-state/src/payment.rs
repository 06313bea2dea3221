//! Narrow interface to the payment verification collaborator.

use bitmark_chain::link::Link;

/// Oracle deciding whether payment for a stored transaction has been seen.
///
/// The currency-chain watcher behind this trait lives outside this crate;
/// the state machine only consumes its verdict.
pub trait Payment: Send + Sync {
    fn is_paid(&self, link: &Link) -> bool;
}

/// Oracle that reports every transaction as paid.
///
/// Used while no currency checker is configured, e.g. on the test chain.
pub struct Prepaid;

impl Payment for Prepaid {
    fn is_paid(&self, _link: &Link) -> bool {
        true
    }
}
