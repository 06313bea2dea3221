//! Reference vectors for the record codec and the transaction pipeline.
//!
//! The key pairs and expected bytes come from the original conformance
//! vectors; private keys are in the 64-byte seed-plus-public-key layout.

use ed25519_zebra::SigningKey;
use lazy_static::lazy_static;

/// A fixed test identity.
pub struct KeyPair {
    pub public_key: [u8; 32],
    pub private_key: [u8; 64],
}

pub const REGISTRANT: KeyPair = KeyPair {
    public_key: [
        0x7a, 0x81, 0x92, 0x56, 0x5e, 0x6c, 0xa2, 0x35, 0x80, 0xe1, 0x81, 0x59, 0xef, 0x30, 0x73,
        0xf6, 0xe2, 0xfb, 0x8e, 0x7e, 0x9d, 0x31, 0x49, 0x7e, 0x79, 0xd7, 0x73, 0x1b, 0xa3, 0x74,
        0x11, 0x01,
    ],
    private_key: [
        0x66, 0xf5, 0x28, 0xd0, 0x2a, 0x64, 0x97, 0x3a, 0x2d, 0xa6, 0x5d, 0xb0, 0x53, 0xea, 0xd0,
        0xfd, 0x94, 0xca, 0x93, 0xeb, 0x9f, 0x74, 0x02, 0x3e, 0xbe, 0xdb, 0x2e, 0x57, 0xb2, 0x79,
        0xfd, 0xf3, 0x7a, 0x81, 0x92, 0x56, 0x5e, 0x6c, 0xa2, 0x35, 0x80, 0xe1, 0x81, 0x59, 0xef,
        0x30, 0x73, 0xf6, 0xe2, 0xfb, 0x8e, 0x7e, 0x9d, 0x31, 0x49, 0x7e, 0x79, 0xd7, 0x73, 0x1b,
        0xa3, 0x74, 0x11, 0x01,
    ],
};

pub const ISSUER: KeyPair = KeyPair {
    public_key: [
        0x9f, 0xc4, 0x86, 0xa2, 0x53, 0x4f, 0x17, 0xe3, 0x67, 0x07, 0xfa, 0x4b, 0x95, 0x3e, 0x3b,
        0x34, 0x00, 0xe2, 0x72, 0x9f, 0x65, 0x61, 0x16, 0xdd, 0x7b, 0x01, 0x8d, 0xf3, 0x46, 0x98,
        0xbd, 0xc2,
    ],
    private_key: [
        0xf3, 0xf7, 0xa1, 0xfc, 0x33, 0x10, 0x71, 0xc2, 0xb1, 0xcb, 0xbe, 0x4f, 0x3a, 0xee, 0x23,
        0x5a, 0xae, 0xcc, 0xd8, 0x5d, 0x2a, 0x80, 0x4c, 0x44, 0xb5, 0xc6, 0x03, 0xb4, 0xca, 0x4d,
        0x9e, 0xc0, 0x9f, 0xc4, 0x86, 0xa2, 0x53, 0x4f, 0x17, 0xe3, 0x67, 0x07, 0xfa, 0x4b, 0x95,
        0x3e, 0x3b, 0x34, 0x00, 0xe2, 0x72, 0x9f, 0x65, 0x61, 0x16, 0xdd, 0x7b, 0x01, 0x8d, 0xf3,
        0x46, 0x98, 0xbd, 0xc2,
    ],
};

pub const OWNER_ONE: KeyPair = KeyPair {
    public_key: [
        0x27, 0x64, 0x0e, 0x4a, 0xab, 0x92, 0xd8, 0x7b, 0x4a, 0x6a, 0x2f, 0x30, 0xb8, 0x81, 0xf4,
        0x49, 0x29, 0xf8, 0x66, 0x04, 0x3a, 0x84, 0x1c, 0x38, 0x14, 0xb1, 0x66, 0xb8, 0x89, 0x44,
        0xb0, 0x92,
    ],
    private_key: [
        0xc7, 0xae, 0x9f, 0x22, 0x32, 0x0e, 0xda, 0x65, 0x02, 0x89, 0xf2, 0x64, 0x7b, 0xc3, 0xa4,
        0x4f, 0xfa, 0xe0, 0x55, 0x79, 0xcb, 0x6a, 0x42, 0x20, 0x90, 0xb4, 0x59, 0xb3, 0x17, 0xed,
        0xf4, 0xa1, 0x27, 0x64, 0x0e, 0x4a, 0xab, 0x92, 0xd8, 0x7b, 0x4a, 0x6a, 0x2f, 0x30, 0xb8,
        0x81, 0xf4, 0x49, 0x29, 0xf8, 0x66, 0x04, 0x3a, 0x84, 0x1c, 0x38, 0x14, 0xb1, 0x66, 0xb8,
        0x89, 0x44, 0xb0, 0x92,
    ],
};

pub const OWNER_TWO: KeyPair = KeyPair {
    public_key: [
        0xa1, 0x36, 0x32, 0xd5, 0x42, 0x5a, 0xed, 0x3a, 0x6b, 0x62, 0xe2, 0xbb, 0x6d, 0xe4, 0xc9,
        0x59, 0x48, 0x41, 0xc1, 0x5b, 0x70, 0x15, 0x69, 0xec, 0x99, 0x99, 0xdc, 0x20, 0x1c, 0x35,
        0xf7, 0xb3,
    ],
    private_key: [
        0x8f, 0x83, 0x3e, 0x58, 0x30, 0xde, 0x63, 0x77, 0x89, 0x4a, 0x8d, 0xf2, 0xd4, 0x4b, 0x17,
        0x88, 0x39, 0x1d, 0xcd, 0xb8, 0xfa, 0x57, 0x22, 0x73, 0xd6, 0x2e, 0x9f, 0xcb, 0x37, 0x20,
        0x2a, 0xb9, 0xa1, 0x36, 0x32, 0xd5, 0x42, 0x5a, 0xed, 0x3a, 0x6b, 0x62, 0xe2, 0xbb, 0x6d,
        0xe4, 0xc9, 0x59, 0x48, 0x41, 0xc1, 0x5b, 0x70, 0x15, 0x69, 0xec, 0x99, 0x99, 0xdc, 0x20,
        0x1c, 0x35, 0xf7, 0xb3,
    ],
};

lazy_static! {
    /// Pre-signature body of the reference asset registration.
    pub static ref ASSET_BODY: Vec<u8> = hex::decode(
        "01144a75737420746865206465736372697074696f6e\
         0b4974656d2773204e616d65\
         1030313233343536373839616263646566\
         21137a8192565e6ca23580e18159ef3073f6e2fb8e7e9d31497e79d7731ba3741101"
    )
    .unwrap();

    /// Transaction id of the signed reference asset registration.
    pub static ref ASSET_TX_ID: Vec<u8> =
        hex::decode("d51d38d581af18d447f537d1b1549c928852ca1fdc094f2356c4f69ce717923b").unwrap();

    /// Asset index of the reference asset (double SHA-512 of its fingerprint).
    pub static ref ASSET_INDEX: Vec<u8> = hex::decode(
        "37de3195b879cf5692a564e7f19bd6203e3fd8cffa8064ebe86ec8fff8dbf326\
         ffa4d65cfef8350db4d72d93406f54fa0d06ce98005a939995ed05cc34fb7344"
    )
    .unwrap();

    /// Pre-signature body of the reference issue (nonce 99).
    pub static ref ISSUE_BODY: Vec<u8> = hex::decode(
        "024037de3195b879cf5692a564e7f19bd6203e3fd8cffa8064ebe86ec8fff8dbf326\
         ffa4d65cfef8350db4d72d93406f54fa0d06ce98005a939995ed05cc34fb7344\
         21139fc486a2534f17e36707fa4b953e3b3400e2729f656116dd7b018df34698bdc2\
         63"
    )
    .unwrap();

    /// Transaction id of the signed reference issue.
    pub static ref ISSUE_TX_ID: Vec<u8> =
        hex::decode("f697485ee8ddd76f8a3ef8b2ac4b3fc7fa77e4ee1cb3185350c2a47278b20475").unwrap();

    /// Transaction id of the transfer from the issuer to owner one.
    pub static ref TRANSFER_ONE_TX_ID: Vec<u8> =
        hex::decode("01c912e3a1e50ede0bc2af34868110648d5775c2e4ffab6bc5c6764c5e86fd0b").unwrap();

    /// Transaction id of the chained transfer from owner one to owner two.
    pub static ref TRANSFER_TWO_TX_ID: Vec<u8> =
        hex::decode("6c5c0e43f59806e519793dd61648731843068a0093db7b07766f7f7f2d18b919").unwrap();
}

/// Sign `message` with a vector key pair.
///
/// The first 32 bytes of the stored private key are the Ed25519 seed.
pub fn sign(private_key: &[u8; 64], message: &[u8]) -> Vec<u8> {
    let mut seed = [0u8; 32];
    seed.copy_from_slice(&private_key[..32]);
    let key = SigningKey::from(seed);
    <[u8; 64]>::from(key.sign(message)).to_vec()
}
