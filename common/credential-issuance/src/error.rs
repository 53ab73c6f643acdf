// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

use nym_threshold_credentials::{CredentialError, SignerIndex};
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IssuanceError>;

#[derive(Debug, Error)]
pub enum IssuanceError {
    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error("authority {index} did not respond within {timeout:?}")]
    AuthorityTimeout { index: SignerIndex, timeout: Duration },

    #[error("authority {index} is unavailable: {reason}")]
    AuthorityUnavailable { index: SignerIndex, reason: String },

    #[error("authority {index} has returned an unusable response: {source}")]
    AuthorityFailure {
        index: SignerIndex,
        #[source]
        source: CredentialError,
    },

    #[error("authority {index} has published an inconsistent verification key")]
    InvalidVerificationKeyShare { index: SignerIndex },

    #[error("authority {expected} has responded on behalf of authority {received}")]
    MismatchedAuthorityIndex {
        expected: SignerIndex,
        received: SignerIndex,
    },

    #[error("the credential with serial number {serial} has already been spent")]
    AlreadySpent { serial: String },

    #[error("the presented credential does not reveal a serial number")]
    MissingSerialNumber,

    #[error("the master verification key has not been obtained yet")]
    MissingVerificationKey,

    #[error("there is no credential with id {id}")]
    UnknownCredential { id: u64 },

    #[error("the issuance attempt has been aborted")]
    IssuanceAborted,

    #[error("can't move the {machine} session from '{from}' to '{to}'")]
    InvalidStateTransition {
        machine: &'static str,
        from: String,
        to: String,
    },

    #[error("failed to load config file from {}: {source}", path.display())]
    ConfigLoadFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file {}: {source}", path.display())]
    ConfigParseFailure {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to save config file to {}: {source}", path.display())]
    ConfigSaveFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize the config: {0}")]
    ConfigSerializationFailure(#[from] toml::ser::Error),

    #[error("the provided configuration is invalid: {0}")]
    InvalidConfig(String),

    #[error("failed to (de)serialize worker message: {0}")]
    MalformedMessage(#[from] serde_json::Error),
}

impl IssuanceError {
    /// Failures caused by a single authority. The issuance attempt can carry on without it
    /// as long as enough of the other authorities respond.
    pub fn is_recoverable_per_authority(&self) -> bool {
        matches!(
            self,
            IssuanceError::AuthorityTimeout { .. }
                | IssuanceError::AuthorityUnavailable { .. }
                | IssuanceError::AuthorityFailure { .. }
                | IssuanceError::InvalidVerificationKeyShare { .. }
                | IssuanceError::MismatchedAuthorityIndex { .. }
        )
    }

    /// Expected outcomes at spend time that the application might want to react to,
    /// for example by obtaining a fresh credential.
    pub fn is_spend_rejection(&self) -> bool {
        matches!(
            self,
            IssuanceError::AlreadySpent { .. }
                | IssuanceError::MissingSerialNumber
                | IssuanceError::Credential(CredentialError::VerificationFailure(_))
        )
    }

    pub(crate) fn authority_failure(index: SignerIndex, source: CredentialError) -> Self {
        IssuanceError::AuthorityFailure { index, source }
    }
}
