//! Classified error kinds shared by every layer.
//!
//! Callers are expected to match on the [`Kind`] of a fault rather than its
//! exact value; the predicates below exist for that purpose.

use std::io;

use thiserror::Error;

/// The class of a [`Fault`].
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum Kind {
    /// A record or file that must be unique already exists.
    Exists,
    /// Malformed bytes or values.
    Invalid,
    /// A field exceeds its maximum size.
    Length,
    /// A referenced record is absent.
    NotFound,
    /// An internal processing failure.
    Process,
    /// A well-formed record with the wrong content.
    Record,
}

/// Every failure the transaction and block pipeline can surface.
#[derive(Error, Copy, Clone, Debug, Eq, PartialEq)]
pub enum Fault {
    #[error("already initialised")]
    AlreadyInitialised,
    #[error("asset not found")]
    AssetNotFound,
    #[error("block not found")]
    BlockNotFound,
    #[error("cannot decode address")]
    CannotDecodeAddress,
    #[error("description too long")]
    DescriptionTooLong,
    #[error("fingerprint too long")]
    FingerprintTooLong,
    #[error("invalid block")]
    InvalidBlock,
    #[error("invalid block header")]
    InvalidBlockHeader,
    #[error("invalid character")]
    InvalidCharacter,
    #[error("invalid count")]
    InvalidCount,
    #[error("invalid key length")]
    InvalidKeyLength,
    #[error("invalid key type")]
    InvalidKeyType,
    #[error("invalid length")]
    InvalidLength,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("link not found")]
    LinkNotFound,
    #[error("links to unconfirmed transaction")]
    LinksToUnconfirmedTransaction,
    #[error("messaging terminated")]
    MessagingTerminated,
    #[error("name too long")]
    NameTooLong,
    #[error("not asset index")]
    NotAssetIndex,
    #[error("not current owner")]
    NotCurrentOwner,
    #[error("not link")]
    NotLink,
    #[error("not public key")]
    NotPublicKey,
    #[error("not transaction pack")]
    NotTransactionPack,
    #[error("not transaction type")]
    NotTransactionType,
    #[error("signature too long")]
    SignatureTooLong,
    #[error("transaction already exists")]
    TransactionAlreadyExists,
    #[error("wrong network for public key")]
    WrongNetworkForPublicKey,
}

impl Fault {
    /// The class this fault belongs to.
    pub fn kind(self) -> Kind {
        use Fault::*;
        match self {
            AlreadyInitialised | TransactionAlreadyExists => Kind::Exists,

            InvalidBlock | InvalidBlockHeader | InvalidCharacter | InvalidCount
            | InvalidKeyLength | InvalidKeyType | InvalidLength | InvalidSignature
            | LinksToUnconfirmedTransaction | WrongNetworkForPublicKey => Kind::Invalid,

            DescriptionTooLong | FingerprintTooLong | NameTooLong | SignatureTooLong => {
                Kind::Length
            }

            AssetNotFound | BlockNotFound | LinkNotFound => Kind::NotFound,

            MessagingTerminated => Kind::Process,

            CannotDecodeAddress | NotAssetIndex | NotCurrentOwner | NotLink | NotPublicKey
            | NotTransactionPack | NotTransactionType => Kind::Record,
        }
    }

    pub fn is_exists(self) -> bool {
        self.kind() == Kind::Exists
    }

    pub fn is_invalid(self) -> bool {
        self.kind() == Kind::Invalid
    }

    pub fn is_length(self) -> bool {
        self.kind() == Kind::Length
    }

    pub fn is_not_found(self) -> bool {
        self.kind() == Kind::NotFound
    }

    pub fn is_process(self) -> bool {
        self.kind() == Kind::Process
    }

    pub fn is_record(self) -> bool {
        self.kind() == Kind::Record
    }
}

// Reads during unpacking run over in-memory buffers, so an io error can only
// mean the record ended early.
impl From<io::Error> for Fault {
    fn from(_: io::Error) -> Fault {
        Fault::InvalidLength
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_classify() {
        assert_eq!(Fault::TransactionAlreadyExists.kind(), Kind::Exists);
        assert_eq!(Fault::WrongNetworkForPublicKey.kind(), Kind::Invalid);
        assert_eq!(Fault::NameTooLong.kind(), Kind::Length);
        assert_eq!(Fault::AssetNotFound.kind(), Kind::NotFound);
        assert_eq!(Fault::MessagingTerminated.kind(), Kind::Process);
        assert_eq!(Fault::NotCurrentOwner.kind(), Kind::Record);

        assert!(Fault::TransactionAlreadyExists.is_exists());
        assert!(Fault::LinkNotFound.is_not_found());
        assert!(!Fault::LinkNotFound.is_record());
    }

    #[test]
    fn messages_match_the_wire_names() {
        assert_eq!(
            Fault::WrongNetworkForPublicKey.to_string(),
            "wrong network for public key"
        );
        assert_eq!(
            Fault::TransactionAlreadyExists.to_string(),
            "transaction already exists"
        );
    }
}
