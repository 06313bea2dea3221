//! Transaction records and their canonical signed wire form.
//!
//! Three record variants exist: asset registration, issue of a single bitmark
//! against a registered asset, and transfer of an issued bitmark to a new
//! owner. A packed record is the variant tag, the variant body, then a
//! varint-prefixed Ed25519 signature over everything before it.

use std::io::{self, Read};

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::assetindex::{AssetIndex, ASSET_INDEX_SIZE};
use crate::fault::Fault;
use crate::link::{Link, LINK_SIZE};
use crate::parameters::Network;
use crate::serialization::{BitmarkDeserialize, BitmarkSerialize};
use crate::varint::Varint64;

// wire tags
const ASSET_DATA_TAG: u8 = 0x01;
const BITMARK_ISSUE_TAG: u8 = 0x02;
const BITMARK_TRANSFER_TAG: u8 = 0x03;

/// Maximum description bytes in an asset registration.
pub const MAX_DESCRIPTION_LENGTH: usize = 256;
/// Maximum name bytes in an asset registration.
pub const MAX_NAME_LENGTH: usize = 64;
/// Maximum fingerprint bytes in an asset registration.
pub const MAX_FINGERPRINT_LENGTH: usize = 1024;

const SIGNATURE_SIZE: usize = 64;

/// Registration of a property with the chain.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct AssetData {
    pub description: String,
    pub name: String,
    pub fingerprint: String,
    pub registrant: Address,
    pub signature: Vec<u8>,
}

/// Issue of one bitmark against a registered asset.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct BitmarkIssue {
    pub asset_index: AssetIndex,
    pub owner: Address,
    pub nonce: u64,
    pub signature: Vec<u8>,
}

/// Transfer of an issued bitmark to a new owner.
///
/// `link` names the previous transaction in the ownership chain; the record
/// is signed by the owner that transaction established.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct BitmarkTransfer {
    pub link: Link,
    pub owner: Address,
    pub signature: Vec<u8>,
}

/// A decoded transaction record.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Record {
    AssetData(AssetData),
    BitmarkIssue(BitmarkIssue),
    BitmarkTransfer(BitmarkTransfer),
}

/// The canonical signed bytes of a record.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Packed(Vec<u8>);

impl AssetData {
    /// The content-addressed identity of the registered property.
    ///
    /// Computed over the fingerprint alone, so re-registering the same
    /// property always lands on the same index.
    pub fn asset_index(&self) -> AssetIndex {
        AssetIndex::new(self.fingerprint.as_bytes())
    }

    fn pack_body<W: io::Write>(&self, mut target: W) -> Result<(), Fault> {
        if self.description.len() > MAX_DESCRIPTION_LENGTH {
            return Err(Fault::DescriptionTooLong);
        }
        if self.name.len() > MAX_NAME_LENGTH {
            return Err(Fault::NameTooLong);
        }
        if self.fingerprint.len() > MAX_FINGERPRINT_LENGTH {
            return Err(Fault::FingerprintTooLong);
        }
        ASSET_DATA_TAG.bitmark_serialize(&mut target)?;
        self.description.bitmark_serialize(&mut target)?;
        self.name.bitmark_serialize(&mut target)?;
        self.fingerprint.bitmark_serialize(&mut target)?;
        self.registrant.bitmark_serialize(&mut target)?;
        Ok(())
    }
}

impl BitmarkIssue {
    fn pack_body<W: io::Write>(&self, mut target: W) -> Result<(), Fault> {
        BITMARK_ISSUE_TAG.bitmark_serialize(&mut target)?;
        Varint64::from(ASSET_INDEX_SIZE as u64).bitmark_serialize(&mut target)?;
        self.asset_index.bitmark_serialize(&mut target)?;
        self.owner.bitmark_serialize(&mut target)?;
        Varint64::from(self.nonce).bitmark_serialize(&mut target)?;
        Ok(())
    }
}

impl BitmarkTransfer {
    fn pack_body<W: io::Write>(&self, mut target: W) -> Result<(), Fault> {
        BITMARK_TRANSFER_TAG.bitmark_serialize(&mut target)?;
        Varint64::from(LINK_SIZE as u64).bitmark_serialize(&mut target)?;
        self.link.bitmark_serialize(&mut target)?;
        self.owner.bitmark_serialize(&mut target)?;
        Ok(())
    }

    /// Verify the stored signature against the owner the ledger records for
    /// `link`.
    pub fn verify_by(&self, current_owner: &Address) -> Result<(), Fault> {
        let payload = {
            let mut body = Vec::new();
            self.pack_body(&mut body)?;
            body
        };
        current_owner.verify(&payload, &self.signature)
    }
}

impl Record {
    /// The bytes the record's signature must cover.
    pub fn signing_payload(&self) -> Result<Vec<u8>, Fault> {
        let mut body = Vec::new();
        match self {
            Record::AssetData(asset) => asset.pack_body(&mut body)?,
            Record::BitmarkIssue(issue) => issue.pack_body(&mut body)?,
            Record::BitmarkTransfer(transfer) => transfer.pack_body(&mut body)?,
        }
        Ok(body)
    }

    pub fn signature(&self) -> &[u8] {
        match self {
            Record::AssetData(asset) => &asset.signature,
            Record::BitmarkIssue(issue) => &issue.signature,
            Record::BitmarkTransfer(transfer) => &transfer.signature,
        }
    }

    fn set_signature(&mut self, signature: Vec<u8>) {
        match self {
            Record::AssetData(asset) => asset.signature = signature,
            Record::BitmarkIssue(issue) => issue.signature = signature,
            Record::BitmarkTransfer(transfer) => transfer.signature = signature,
        }
    }

    /// Produce the canonical packed bytes.
    ///
    /// The stored signature must already verify under `signer` — signing is
    /// the caller's job, the codec never sees a private key. `signer` is the
    /// registrant, the issuer, or for a transfer the *current* owner, who is
    /// not the owner named inside the record.
    pub fn pack(&self, signer: &Address) -> Result<Packed, Fault> {
        if self.signature().len() > SIGNATURE_SIZE {
            return Err(Fault::SignatureTooLong);
        }
        let mut packed = self.signing_payload()?;
        signer.verify(&packed, self.signature())?;

        Varint64::from(self.signature().len() as u64).bitmark_serialize(&mut packed)?;
        packed.extend_from_slice(self.signature());
        Ok(Packed(packed))
    }
}

impl Packed {
    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// The transaction id: the digest of the full packed bytes.
    pub fn link(&self) -> Link {
        Link::new(&self.0)
    }

    /// Strictly decode and verify a packed record.
    ///
    /// Checks that need ledger state — the asset behind an issue, the current
    /// owner behind a transfer — belong to the store's write path; everything
    /// local to the bytes is checked here, including the signature wherever
    /// the signer is embedded in the record itself.
    pub fn unpack(&self, network: Network) -> Result<Record, Fault> {
        let total = self.0.len();
        let mut src: &[u8] = &self.0;

        let tag = u8::bitmark_deserialize(&mut src)?;
        let mut record = match tag {
            ASSET_DATA_TAG => {
                let description =
                    read_string(&mut src, MAX_DESCRIPTION_LENGTH, Fault::DescriptionTooLong)?;
                let name = read_string(&mut src, MAX_NAME_LENGTH, Fault::NameTooLong)?;
                let fingerprint =
                    read_string(&mut src, MAX_FINGERPRINT_LENGTH, Fault::FingerprintTooLong)?;
                let registrant = Address::unpack(&mut src, network)?;
                Record::AssetData(AssetData {
                    description,
                    name,
                    fingerprint,
                    registrant,
                    signature: Vec::new(),
                })
            }

            BITMARK_ISSUE_TAG => {
                if Varint64::bitmark_deserialize(&mut src)?.value() != ASSET_INDEX_SIZE as u64 {
                    return Err(Fault::NotAssetIndex);
                }
                let asset_index = AssetIndex::bitmark_deserialize(&mut src)?;
                let owner = Address::unpack(&mut src, network)?;
                let nonce = Varint64::bitmark_deserialize(&mut src)?.value();
                Record::BitmarkIssue(BitmarkIssue {
                    asset_index,
                    owner,
                    nonce,
                    signature: Vec::new(),
                })
            }

            BITMARK_TRANSFER_TAG => {
                if Varint64::bitmark_deserialize(&mut src)?.value() != LINK_SIZE as u64 {
                    return Err(Fault::NotLink);
                }
                let link = Link::bitmark_deserialize(&mut src)?;
                let owner = Address::unpack(&mut src, network)?;
                Record::BitmarkTransfer(BitmarkTransfer {
                    link,
                    owner,
                    signature: Vec::new(),
                })
            }

            _ => return Err(Fault::NotTransactionType),
        };

        let signed_length = total - src.len();

        let signature_length = Varint64::bitmark_deserialize(&mut src)?.value();
        if signature_length > SIGNATURE_SIZE as u64 {
            return Err(Fault::SignatureTooLong);
        }
        let mut signature = vec![0u8; signature_length as usize];
        src.read_exact(&mut signature)?;
        if !src.is_empty() {
            return Err(Fault::NotTransactionPack);
        }

        match &record {
            Record::AssetData(asset) => {
                asset
                    .registrant
                    .verify(&self.0[..signed_length], &signature)?;
            }
            Record::BitmarkIssue(issue) => {
                issue.owner.verify(&self.0[..signed_length], &signature)?;
            }
            // a transfer is signed by the owner the ledger records for its
            // link; verification happens on the write path
            Record::BitmarkTransfer(_) => {}
        }

        record.set_signature(signature);
        Ok(record)
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

fn read_string<R: io::Read>(
    mut reader: R,
    maximum: usize,
    overflow: Fault,
) -> Result<String, Fault> {
    let length = Varint64::bitmark_deserialize(&mut reader)?.value();
    if length > maximum as u64 {
        return Err(overflow);
    }
    let mut buf = vec![0u8; length as usize];
    reader.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|_| Fault::InvalidCharacter)
}
