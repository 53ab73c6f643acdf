// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

use crate::scheme::SignerIndex;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CredentialError>;

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Setup error: {0}")]
    Setup(String),

    #[error("failed to commit to the private attributes: {0}")]
    Commitment(String),

    #[error("Tried to prepare blind sign request for higher than specified number of attributes (max: {max}, requested: {requested})")]
    IssuanceMaxAttributes { max: usize, requested: usize },

    #[error("the blind sign request has an invalid proof of knowledge: {0}")]
    InvalidProofOfKnowledge(String),

    #[error("failed to unblind the partial signature: {0}")]
    Unblinding(String),

    #[error("received {received} distinct shares, but at least {threshold} are required")]
    InsufficientShares { threshold: u64, received: usize },

    #[error("the provided authority index set is invalid: {0}")]
    InvalidIndexSet(String),

    #[error("authority {index} signed over a different set of attributes than the rest")]
    InconsistentAttributeSet { index: SignerIndex },

    #[error("the provided keys were generated for different number of attributes")]
    InconsistentKeySize,

    #[error("Interpolation error: {0}")]
    Interpolation(String),

    #[error("Aggregation error: {0}")]
    Aggregation(String),

    #[error("failed to prepare the credential presentation: {0}")]
    Presentation(String),

    #[error("credential verification failure: {0}")]
    VerificationFailure(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Deserialization error, expected at least {min} bytes, got {actual}")]
    DeserializationMinLength { min: usize, actual: usize },

    #[error("Tried to deserialize {object} with bytes of invalid length. Expected {actual} < {target} or {modulus_target} % {modulus} == 0")]
    DeserializationInvalidLength {
        actual: usize,
        target: usize,
        modulus_target: usize,
        modulus: usize,
        object: String,
    },

    #[error("received data encoded with unsupported serialization revision {received} (current revision is {current})")]
    UnsupportedSerializationRevision { received: u8, current: u8 },

    #[error("Could not decode base 58 string - {0}")]
    MalformedString(#[from] bs58::decode::Error),
}
