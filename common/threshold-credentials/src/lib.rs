// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

pub use bls12_381::{G1Projective, G2Projective, Scalar};

pub use error::{CredentialError, Result};
pub use scheme::aggregation::{
    aggregate_key_shares, aggregate_signature_shares, aggregate_signature_shares_and_verify,
    aggregate_verification_keys,
};
pub use scheme::double_use::BlindedSerialNumber;
pub use scheme::issuance::{
    attribute_from_canonical_bytes, blind_sign, generate_session_nonce, prepare_blind_sign,
    BlindSignRequest, CommitmentOpenings, SessionNonce,
};
pub use scheme::keygen::{
    keygen, ttp_keygen, AuthorityKeyShare, SecretKey, VerificationKey, VerificationKeyShare,
};
pub use scheme::setup::{setup, Parameters, ThresholdParameters};
pub use scheme::verification::{
    check_vk_pairing, prove_credential, verify, verify_credential, PresentationProof,
    RevealedValues,
};
pub use scheme::{BlindedSignature, PartialSignature, Signature, SignatureShare, SignerIndex};
pub use traits::{Base58, Bytable, CURRENT_SERIALIZATION_REVISION};
pub use utils::hash_to_scalar;

mod error;
mod impls;
mod proofs;
pub mod scheme;
#[cfg(test)]
mod tests;
mod traits;
pub mod utils;

pub type Attribute = Scalar;
pub type PrivateAttribute = Attribute;
pub type PublicAttribute = Attribute;
