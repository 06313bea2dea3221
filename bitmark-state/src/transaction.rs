//! The transaction state machine.
//!
//! Every stored transaction moves through
//! `unpaid -> available -> mined`, with `expired` as the drop-out edge for
//! records nobody pays for. Queue membership mirrors the state: exactly one
//! `U` or `A` entry while unpaid or available, none otherwise. The `S` entry
//! is written last in every transition so a crash is recoverable from `S`.

use std::convert::TryInto;

use chrono::{DateTime, Utc};
use tracing::{debug, trace, warn};

use bitmark_chain::address::Address;
use bitmark_chain::assetindex::AssetIndex;
use bitmark_chain::digest::Digest;
use bitmark_chain::fault::Fault;
use bitmark_chain::link::Link;
use bitmark_chain::record::{Packed, Record};

use crate::Store;

/// Lifecycle state of a stored transaction.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum State {
    /// Dropped from the unpaid queue without payment.
    Expired,
    /// Stored, awaiting payment.
    Unpaid,
    /// Paid for, eligible for inclusion in a block.
    Available,
    /// Confirmed by a saved block.
    Mined,
    /// An asset registration whose first issue is pending; the cursor emits
    /// it immediately before that issue.
    WaitingIssueTransaction,
}

impl State {
    fn to_byte(self) -> u8 {
        match self {
            State::Expired => b'E',
            State::Unpaid => b'U',
            State::Available => b'A',
            State::Mined => b'M',
            State::WaitingIssueTransaction => b'W',
        }
    }

    fn from_byte(byte: u8) -> Option<State> {
        match byte {
            b'E' => Some(State::Expired),
            b'U' => Some(State::Unpaid),
            b'A' => Some(State::Available),
            b'M' => Some(State::Mined),
            b'W' => Some(State::WaitingIssueTransaction),
            _ => None,
        }
    }
}

// ownership kind bytes for the K pool
const KIND_ASSET: u8 = b'A';
const KIND_ISSUE: u8 = b'I';
const KIND_TRANSFER: u8 = b'T';

fn encode_state(state: State, index: u64) -> [u8; 9] {
    let mut value = [0u8; 9];
    value[0] = state.to_byte();
    value[1..].copy_from_slice(&index.to_be_bytes());
    value
}

fn decode_state(value: &[u8]) -> Option<(State, u64)> {
    if value.len() != 9 {
        return None;
    }
    let state = State::from_byte(value[0])?;
    let index = u64::from_be_bytes(value[1..].try_into().ok()?);
    Some((state, index))
}

impl Store {
    /// Store a verified incoming record, leaving it unpaid.
    ///
    /// Validates everything the codec cannot check alone: the asset behind
    /// an issue must be registered, and a transfer must be signed by the
    /// owner the ledger currently records for its link.
    pub fn write(&self, packed: &Packed) -> Result<Link, Fault> {
        let record = packed.unpack(self.network)?;
        let link = packed.link();

        // pool-backed validation; reads only
        let asset_link = match &record {
            Record::AssetData(_) => None,

            Record::BitmarkIssue(issue) => {
                let found = self
                    .pools
                    .assets
                    .get(issue.asset_index.as_bytes())
                    .ok_or(Fault::AssetNotFound)?;
                Some(Link::from_bytes(&found)?)
            }

            Record::BitmarkTransfer(transfer) => {
                if !self.pools.transactions.has(transfer.link.as_bytes()) {
                    return Err(Fault::LinkNotFound);
                }
                let ownership = self
                    .pools
                    .owners
                    .get(transfer.link.as_bytes())
                    .ok_or(Fault::LinksToUnconfirmedTransaction)?;
                let current_owner = owner_address(self.network, &ownership)?;
                transfer
                    .verify_by(&current_owner)
                    .map_err(|_| Fault::NotCurrentOwner)?;
                None
            }
        };

        let _finalize = self.finalize.read().unwrap();
        let _shards = match asset_link {
            Some(asset) => self.lock_shard_pair(link.0[0], asset.0[0]),
            None => (self.lock_shard(link.0[0]), None),
        };

        if self.pools.transactions.has(link.as_bytes()) {
            return Err(Fault::TransactionAlreadyExists);
        }

        let counter = self.next_unpaid_counter();
        let timestamp = Utc::now().timestamp() as u64;

        self.pools.transactions.put(link.as_bytes(), packed.bytes());

        let mut unpaid_value = [0u8; 40];
        unpaid_value[..32].copy_from_slice(link.as_bytes());
        unpaid_value[32..].copy_from_slice(&timestamp.to_be_bytes());
        self.pools.unpaid.put(&counter.to_be_bytes(), &unpaid_value);

        match &record {
            Record::AssetData(asset) => {
                // first registration of a fingerprint owns the index entry
                let index = asset.asset_index();
                if !self.pools.assets.has(index.as_bytes()) {
                    self.pools.assets.put(index.as_bytes(), link.as_bytes());
                }
            }

            Record::BitmarkIssue(_) => {
                // a never-issued asset leaves the unpaid queue and waits on
                // its first issue instead
                let asset = asset_link.expect("issue validation resolved the asset");
                if let Some((State::Unpaid, index)) = self.state_of(&asset) {
                    self.pools.unpaid.delete(&index.to_be_bytes());
                    self.pools.states.put(
                        asset.as_bytes(),
                        &encode_state(State::WaitingIssueTransaction, 0),
                    );
                }
            }

            Record::BitmarkTransfer(_) => {}
        }

        self.pools
            .states
            .put(link.as_bytes(), &encode_state(State::Unpaid, counter));

        metrics::counter!("bitmark.transactions.written", 1);
        debug!(%link, "stored transaction");
        Ok(link)
    }

    /// Promote an unpaid transaction once payment is recorded.
    ///
    /// Idempotent: promoting a transaction that already moved on is a no-op.
    pub fn set_paid(&self, link: &Link) -> Result<(), Fault> {
        let _finalize = self.finalize.read().unwrap();
        let _shard = self.lock_shard(link.0[0]);

        let (state, index) = self.state_of(link).ok_or(Fault::LinkNotFound)?;
        if state != State::Unpaid {
            trace!(%link, ?state, "payment for a transaction that moved on");
            return Ok(());
        }

        let record = self
            .transaction(link)
            .ok_or(Fault::LinkNotFound)?
            .unpack(self.network)?;

        // ownership becomes visible at promotion; transfers can still fail
        // here (a competing transfer won the chain), so this runs before the
        // queues move
        match &record {
            Record::AssetData(asset) => {
                self.index_owner(
                    asset.registrant.public_key(),
                    link,
                    link,
                    KIND_ASSET,
                    asset.asset_index(),
                );
            }

            Record::BitmarkIssue(issue) => {
                self.index_owner(
                    issue.owner.public_key(),
                    link,
                    link,
                    KIND_ISSUE,
                    issue.asset_index,
                );
            }

            Record::BitmarkTransfer(transfer) => {
                self.pass_ownership(&transfer.link, transfer.owner.public_key(), link)?;
            }
        }

        self.pools.unpaid.delete(&index.to_be_bytes());
        let counter = self.next_available_counter();
        self.pools
            .available
            .put(&counter.to_be_bytes(), link.as_bytes());

        self.pools
            .states
            .put(link.as_bytes(), &encode_state(State::Available, counter));

        metrics::counter!("bitmark.transactions.available", 1);
        debug!(%link, "transaction available");
        Ok(())
    }

    /// Demote unpaid entries older than `horizon`; returns how many fell.
    pub fn expire_older_than(&self, horizon: DateTime<Utc>) -> usize {
        let horizon = horizon.timestamp().max(0) as u64;
        let mut expired = 0;
        let mut start = Vec::new();

        'scan: loop {
            let batch = self.pools.unpaid.fetch(&start, 100);
            if batch.is_empty() {
                break;
            }

            for (key, value) in &batch {
                if value.len() != 40 {
                    warn!("malformed unpaid queue entry");
                    continue;
                }
                let timestamp =
                    u64::from_be_bytes(value[32..].try_into().expect("length checked"));
                // counters are allocated in arrival order, so the first
                // young entry ends the sweep
                if timestamp >= horizon {
                    break 'scan;
                }

                let link = Link::from_bytes(&value[..32]).expect("length checked");

                let _finalize = self.finalize.read().unwrap();
                let _shard = self.lock_shard(link.0[0]);

                // the entry may have been promoted since the fetch
                if let Some((State::Unpaid, index)) = self.state_of(&link) {
                    if index.to_be_bytes()[..] == key[..] {
                        self.pools.unpaid.delete(key);
                        self.pools
                            .states
                            .put(link.as_bytes(), &encode_state(State::Expired, 0));
                        expired += 1;
                        debug!(%link, "expired unpaid transaction");
                    }
                }
            }

            let (last_key, _) = batch.last().expect("batch is non-empty");
            start = last_key.to_vec();
            start.push(0);
        }

        if expired > 0 {
            metrics::counter!("bitmark.transactions.expired", expired as u64);
        }
        expired
    }

    /// Mark every digest in a saved block as mined.
    ///
    /// Called with the finalize write lock held by the block save.
    pub(crate) fn finalize_transactions(&self, digests: &[Digest]) {
        for digest in digests {
            let link = Link::from(*digest);
            match self.state_of(&link) {
                None => {
                    // responder guarantees presence before saving
                    warn!(%link, "mined transaction has no state entry");
                    continue;
                }
                Some((State::Available, index)) => {
                    self.pools.available.delete(&index.to_be_bytes());
                }
                Some((State::Unpaid, index)) => {
                    self.pools.unpaid.delete(&index.to_be_bytes());
                }
                Some(_) => {}
            }
            self.pools
                .states
                .put(link.as_bytes(), &encode_state(State::Mined, 0));
        }
        metrics::counter!("bitmark.transactions.mined", digests.len() as u64);
    }

    /// Current state and queue index of a transaction.
    pub fn state_of(&self, link: &Link) -> Option<(State, u64)> {
        let value = self.pools.states.get(link.as_bytes())?;
        let decoded = decode_state(&value);
        if decoded.is_none() {
            warn!(%link, "malformed state entry");
        }
        decoded
    }

    /// The stored packed bytes of a transaction.
    pub fn transaction(&self, link: &Link) -> Option<Packed> {
        self.pools
            .transactions
            .get(link.as_bytes())
            .map(|bytes| Packed::from(bytes.to_vec()))
    }

    /// Whether the packed bytes behind `digest` are stored locally.
    pub fn has_transaction(&self, digest: &Digest) -> bool {
        self.pools.transactions.has(digest.as_bytes())
    }

    /// The registering transaction for an asset index.
    pub fn asset_transaction(&self, index: &AssetIndex) -> Option<Link> {
        let value = self.pools.assets.get(index.as_bytes())?;
        Link::from_bytes(&value).ok()
    }

    // O[link] = owner pubkey ++ registration digest
    // K[owner ++ link] = kind ++ asset index
    fn index_owner(
        &self,
        owner: &[u8; 32],
        link: &Link,
        registration: &Link,
        kind: u8,
        asset_index: AssetIndex,
    ) {
        let mut owner_value = [0u8; 64];
        owner_value[..32].copy_from_slice(owner);
        owner_value[32..].copy_from_slice(registration.as_bytes());
        self.pools.owners.put(link.as_bytes(), &owner_value);

        let mut holdings_key = [0u8; 64];
        holdings_key[..32].copy_from_slice(owner);
        holdings_key[32..].copy_from_slice(link.as_bytes());
        let mut holdings_value = [0u8; 65];
        holdings_value[0] = kind;
        holdings_value[1..].copy_from_slice(asset_index.as_bytes());
        self.pools.ownership.put(&holdings_key, &holdings_value);
    }

    // move the O and K entries from the previous transaction to this one
    fn pass_ownership(
        &self,
        previous: &Link,
        new_owner: &[u8; 32],
        link: &Link,
    ) -> Result<(), Fault> {
        let ownership = self
            .pools
            .owners
            .get(previous.as_bytes())
            .ok_or(Fault::LinksToUnconfirmedTransaction)?;
        if ownership.len() != 64 {
            warn!(%previous, "malformed ownership entry");
            return Err(Fault::LinkNotFound);
        }

        let mut previous_holdings_key = [0u8; 64];
        previous_holdings_key[..32].copy_from_slice(&ownership[..32]);
        previous_holdings_key[32..].copy_from_slice(previous.as_bytes());
        let asset_index = match self.pools.ownership.get(&previous_holdings_key) {
            Some(value) if value.len() == 65 => AssetIndex::from_bytes(&value[1..])?,
            _ => {
                warn!(%previous, "missing holdings entry");
                AssetIndex::from_bytes(&[0u8; 64])?
            }
        };

        self.pools.owners.delete(previous.as_bytes());
        self.pools.ownership.delete(&previous_holdings_key);

        let registration = Link::from_bytes(&ownership[32..])?;
        self.index_owner(new_owner, link, &registration, KIND_TRANSFER, asset_index);
        Ok(())
    }
}

fn owner_address(
    network: bitmark_chain::parameters::Network,
    ownership: &[u8],
) -> Result<Address, Fault> {
    if ownership.len() != 64 {
        return Err(Fault::NotPublicKey);
    }
    let mut public_key = [0u8; 32];
    public_key.copy_from_slice(&ownership[..32]);
    Ok(Address::ed25519(network, public_key))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::Config;

    use bitmark_chain::parameters::Network;
    use bitmark_chain::record::{AssetData, BitmarkIssue, BitmarkTransfer};
    use bitmark_test::vectors::{self, KeyPair, ISSUER, OWNER_ONE, OWNER_TWO, REGISTRANT};
    use tempdir::TempDir;

    pub(crate) fn open_store(dir: &TempDir) -> Store {
        Store::open(
            &Config {
                path: dir.path().to_path_buf(),
            },
            Network::Testing,
        )
        .unwrap()
    }

    fn address(pair: &KeyPair) -> Address {
        Address::ed25519(Network::Testing, pair.public_key)
    }

    pub(crate) fn signed_asset() -> Packed {
        let mut record = Record::AssetData(AssetData {
            description: "Just the description".to_string(),
            name: "Item's Name".to_string(),
            fingerprint: "0123456789abcdef".to_string(),
            registrant: address(&REGISTRANT),
            signature: Vec::new(),
        });
        sign_and_pack(&mut record, &REGISTRANT)
    }

    pub(crate) fn signed_issue(nonce: u64) -> Packed {
        let asset = AssetIndex::new(b"0123456789abcdef");
        let mut record = Record::BitmarkIssue(BitmarkIssue {
            asset_index: asset,
            owner: address(&ISSUER),
            nonce,
            signature: Vec::new(),
        });
        sign_and_pack(&mut record, &ISSUER)
    }

    pub(crate) fn signed_transfer(previous: Link, new_owner: &KeyPair, signer: &KeyPair) -> Packed {
        let mut record = Record::BitmarkTransfer(BitmarkTransfer {
            link: previous,
            owner: address(new_owner),
            signature: Vec::new(),
        });
        sign_and_pack(&mut record, signer)
    }

    fn sign_and_pack(record: &mut Record, signer: &KeyPair) -> Packed {
        let payload = record.signing_payload().unwrap();
        let signature = vectors::sign(&signer.private_key, &payload);
        match record {
            Record::AssetData(asset) => asset.signature = signature,
            Record::BitmarkIssue(issue) => issue.signature = signature,
            Record::BitmarkTransfer(transfer) => transfer.signature = signature,
        }
        record.pack(&address(signer)).unwrap()
    }

    #[test]
    fn write_leaves_a_transaction_unpaid() {
        bitmark_test::init();
        let dir = TempDir::new("state-test").unwrap();
        let store = open_store(&dir);

        let packed = signed_asset();
        let link = store.write(&packed).unwrap();

        assert_eq!(store.state_of(&link), Some((State::Unpaid, 0)));
        assert_eq!(store.transaction(&link).unwrap(), packed);
        assert_eq!(store.pools.unpaid.len(), 1);
        assert_eq!(store.pools.available.len(), 0);
    }

    #[test]
    fn duplicate_write_is_rejected_and_changes_nothing() {
        bitmark_test::init();
        let dir = TempDir::new("state-test").unwrap();
        let store = open_store(&dir);

        let packed = signed_asset();
        store.write(&packed).unwrap();
        let unpaid_before = store.pools.unpaid.len();
        let states_before = store.pools.states.len();

        assert_eq!(store.write(&packed), Err(Fault::TransactionAlreadyExists));
        assert_eq!(store.pools.unpaid.len(), unpaid_before);
        assert_eq!(store.pools.states.len(), states_before);
    }

    #[test]
    fn issue_requires_a_registered_asset() {
        bitmark_test::init();
        let dir = TempDir::new("state-test").unwrap();
        let store = open_store(&dir);

        assert_eq!(store.write(&signed_issue(1)), Err(Fault::AssetNotFound));
    }

    #[test]
    fn first_issue_parks_the_asset_behind_it() {
        bitmark_test::init();
        let dir = TempDir::new("state-test").unwrap();
        let store = open_store(&dir);

        let asset_link = store.write(&signed_asset()).unwrap();
        let issue_link = store.write(&signed_issue(1)).unwrap();

        assert_eq!(
            store.state_of(&asset_link),
            Some((State::WaitingIssueTransaction, 0))
        );
        assert_eq!(store.state_of(&issue_link), Some((State::Unpaid, 1)));
        // the asset left the unpaid queue
        assert_eq!(store.pools.unpaid.len(), 1);

        // a second issue leaves the marker alone
        let second = store.write(&signed_issue(2)).unwrap();
        assert_eq!(
            store.state_of(&asset_link),
            Some((State::WaitingIssueTransaction, 0))
        );
        assert_ne!(second, issue_link);
    }

    #[test]
    fn payment_moves_unpaid_to_available() {
        bitmark_test::init();
        let dir = TempDir::new("state-test").unwrap();
        let store = open_store(&dir);

        store.write(&signed_asset()).unwrap();
        let issue_link = store.write(&signed_issue(1)).unwrap();

        store.set_paid(&issue_link).unwrap();
        let (state, index) = store.state_of(&issue_link).unwrap();
        assert_eq!(state, State::Available);
        assert_eq!(store.pools.unpaid.len(), 0);
        assert!(store
            .pools
            .available
            .has(&index.to_be_bytes()));

        // ownership appears at promotion
        assert!(store.pools.owners.has(issue_link.as_bytes()));

        // promoting again is a no-op
        store.set_paid(&issue_link).unwrap();
        assert_eq!(store.state_of(&issue_link), Some((State::Available, index)));
    }

    #[test]
    fn transfers_follow_the_ownership_chain() {
        bitmark_test::init();
        let dir = TempDir::new("state-test").unwrap();
        let store = open_store(&dir);

        store.write(&signed_asset()).unwrap();
        let issue_link = store.write(&signed_issue(1)).unwrap();

        // transfer of an unpromoted issue is refused
        let early = signed_transfer(issue_link, &OWNER_ONE, &ISSUER);
        assert_eq!(
            store.write(&early),
            Err(Fault::LinksToUnconfirmedTransaction)
        );

        store.set_paid(&issue_link).unwrap();

        // wrong signer is not the current owner
        let forged = signed_transfer(issue_link, &OWNER_ONE, &OWNER_TWO);
        assert_eq!(store.write(&forged), Err(Fault::NotCurrentOwner));

        // the issuer hands the bitmark to owner one
        let transfer = signed_transfer(issue_link, &OWNER_ONE, &ISSUER);
        let transfer_link = store.write(&transfer).unwrap();
        store.set_paid(&transfer_link).unwrap();

        // ownership moved: the old link no longer authorises transfers
        assert!(store.pools.owners.has(transfer_link.as_bytes()));
        assert!(!store.pools.owners.has(issue_link.as_bytes()));

        // owner one can now pass it on
        let onward = signed_transfer(transfer_link, &OWNER_TWO, &OWNER_ONE);
        let onward_link = store.write(&onward).unwrap();
        store.set_paid(&onward_link).unwrap();
        assert!(store.pools.owners.has(onward_link.as_bytes()));
    }

    #[test]
    fn transfer_of_an_unknown_link_is_refused() {
        bitmark_test::init();
        let dir = TempDir::new("state-test").unwrap();
        let store = open_store(&dir);

        let ghost = Link::new(b"never stored");
        let transfer = signed_transfer(ghost, &OWNER_ONE, &ISSUER);
        assert_eq!(store.write(&transfer), Err(Fault::LinkNotFound));
    }

    #[test]
    fn expiry_drops_old_unpaid_entries() {
        bitmark_test::init();
        let dir = TempDir::new("state-test").unwrap();
        let store = open_store(&dir);

        let link = store.write(&signed_asset()).unwrap();

        // nothing is older than a horizon in the past
        let past = Utc::now() - chrono::Duration::hours(1);
        assert_eq!(store.expire_older_than(past), 0);
        assert_eq!(store.state_of(&link), Some((State::Unpaid, 0)));

        // everything is older than a horizon in the future
        let future = Utc::now() + chrono::Duration::hours(1);
        assert_eq!(store.expire_older_than(future), 1);
        assert_eq!(store.state_of(&link), Some((State::Expired, 0)));
        assert_eq!(store.pools.unpaid.len(), 0);
    }
}
