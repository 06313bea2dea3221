//! Account addresses: a public key wrapped with its key type and network.

use std::convert::TryFrom;
use std::fmt;
use std::io;

use ed25519_zebra::{Signature, VerificationKey};
use serde::{Deserialize, Serialize};

use crate::fault::Fault;
use crate::parameters::Network;
use crate::serialization::{BitmarkDeserialize, BitmarkSerialize};
use crate::varint::Varint64;

// Key type ids. The packed type byte is the id shifted left one bit with the
// test-network flag in bit zero.
const ED25519_KEY_TYPE: u8 = 0x09;
const TEST_NETWORK_FLAG: u8 = 0x01;

const ED25519_KEY_SIZE: usize = 32;

/// A record signer or owner.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Address {
    /// An Ed25519 public key.
    Ed25519 {
        /// test or live chain
        network: Network,
        /// the raw public key
        public_key: [u8; ED25519_KEY_SIZE],
    },
}

impl Address {
    pub fn ed25519(network: Network, public_key: [u8; ED25519_KEY_SIZE]) -> Address {
        Address::Ed25519 {
            network,
            public_key,
        }
    }

    pub fn network(&self) -> Network {
        match self {
            Address::Ed25519 { network, .. } => *network,
        }
    }

    pub fn public_key(&self) -> &[u8; ED25519_KEY_SIZE] {
        match self {
            Address::Ed25519 { public_key, .. } => public_key,
        }
    }

    /// Decode a packed address, checking its network flag against the node's.
    pub fn unpack<R: io::Read>(mut reader: R, network: Network) -> Result<Address, Fault> {
        let length = Varint64::bitmark_deserialize(&mut reader)?.value();
        if length == 0 || length > 1 + ED25519_KEY_SIZE as u64 {
            return Err(Fault::CannotDecodeAddress);
        }

        let type_byte = u8::bitmark_deserialize(&mut reader)?;
        let is_test = type_byte & TEST_NETWORK_FLAG != 0;
        if is_test != network.is_test() {
            return Err(Fault::WrongNetworkForPublicKey);
        }

        match type_byte >> 1 {
            ED25519_KEY_TYPE => {
                if length != 1 + ED25519_KEY_SIZE as u64 {
                    return Err(Fault::InvalidKeyLength);
                }
                let public_key = <[u8; 32]>::bitmark_deserialize(&mut reader)?;
                Ok(Address::Ed25519 {
                    network,
                    public_key,
                })
            }
            _ => Err(Fault::InvalidKeyType),
        }
    }

    /// Verify an Ed25519 signature over `message`.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), Fault> {
        let Address::Ed25519 { public_key, .. } = self;
        let key = VerificationKey::try_from(*public_key).map_err(|_| Fault::NotPublicKey)?;

        if signature.len() != 64 {
            return Err(Fault::InvalidSignature);
        }
        let mut bytes = [0u8; 64];
        bytes.copy_from_slice(signature);

        key.verify(&Signature::from(bytes), message)
            .map_err(|_| Fault::InvalidSignature)
    }
}

impl BitmarkSerialize for Address {
    fn bitmark_serialize<W: io::Write>(&self, mut target: W) -> Result<(), io::Error> {
        let Address::Ed25519 {
            network,
            public_key,
        } = self;

        let mut type_byte = ED25519_KEY_TYPE << 1;
        if network.is_test() {
            type_byte |= TEST_NETWORK_FLAG;
        }

        Varint64::from(1 + ED25519_KEY_SIZE as u64).bitmark_serialize(&mut target)?;
        type_byte.bitmark_serialize(&mut target)?;
        public_key.bitmark_serialize(&mut target)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Address::Ed25519 {
            network,
            public_key,
        } = self;
        f.debug_struct("Address")
            .field("network", network)
            .field("public_key", &hex::encode(&public_key[..]))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; 32] = [
        0x7a, 0x81, 0x92, 0x56, 0x5e, 0x6c, 0xa2, 0x35, 0x80, 0xe1, 0x81, 0x59, 0xef, 0x30, 0x73,
        0xf6, 0xe2, 0xfb, 0x8e, 0x7e, 0x9d, 0x31, 0x49, 0x7e, 0x79, 0xd7, 0x73, 0x1b, 0xa3, 0x74,
        0x11, 0x01,
    ];

    #[test]
    fn packed_form_matches_reference() {
        let address = Address::ed25519(Network::Testing, KEY);
        let packed = address.bitmark_serialize_to_vec().unwrap();

        assert_eq!(packed.len(), 34);
        assert_eq!(packed[0], 0x21); // type byte + key length
        assert_eq!(packed[1], 0x13); // ed25519, test network
        assert_eq!(&packed[2..], &KEY[..]);
    }

    #[test]
    fn unpack_round_trip() {
        let address = Address::ed25519(Network::Testing, KEY);
        let packed = address.bitmark_serialize_to_vec().unwrap();
        let back = Address::unpack(&packed[..], Network::Testing).unwrap();
        assert_eq!(back, address);
    }

    #[test]
    fn network_flag_is_checked() {
        let address = Address::ed25519(Network::Testing, KEY);
        let packed = address.bitmark_serialize_to_vec().unwrap();
        assert_eq!(
            Address::unpack(&packed[..], Network::Live),
            Err(Fault::WrongNetworkForPublicKey)
        );
    }

    #[test]
    fn unknown_key_type_is_rejected() {
        let mut packed = Address::ed25519(Network::Testing, KEY)
            .bitmark_serialize_to_vec()
            .unwrap();
        packed[1] = 0x0f; // type id 7, test network
        assert_eq!(
            Address::unpack(&packed[..], Network::Testing),
            Err(Fault::InvalidKeyType)
        );
    }

    #[test]
    fn short_key_is_rejected() {
        // length claims the type byte plus a 16 byte key
        let mut packed = vec![0x11, 0x13];
        packed.extend_from_slice(&KEY[..16]);
        assert_eq!(
            Address::unpack(&packed[..], Network::Testing),
            Err(Fault::InvalidKeyLength)
        );
    }
}
