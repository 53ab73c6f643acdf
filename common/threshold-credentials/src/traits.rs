// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

use crate::error::{CredentialError, Result};

/// Revision prepended to every encoded value that travels between the client,
/// the authorities and the verifiers.
pub const CURRENT_SERIALIZATION_REVISION: u8 = 1;

pub trait Bytable
where
    Self: Sized,
{
    fn to_byte_vec(&self) -> Vec<u8>;

    fn try_from_byte_slice(slice: &[u8]) -> Result<Self>;
}

pub trait Base58
where
    Self: Bytable,
{
    fn try_from_bs58<S: AsRef<str>>(x: S) -> Result<Self> {
        Self::try_from_byte_slice(&bs58::decode(x.as_ref()).into_vec()?)
    }

    fn to_bs58(&self) -> String {
        bs58::encode(self.to_byte_vec()).into_string()
    }
}

pub(crate) fn with_revision_prefix(body: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(body.len() + 1);
    bytes.push(CURRENT_SERIALIZATION_REVISION);
    bytes.extend_from_slice(body);
    bytes
}

pub(crate) fn strip_revision_prefix(bytes: &[u8]) -> Result<&[u8]> {
    let (revision, body) = bytes
        .split_first()
        .ok_or(CredentialError::DeserializationMinLength { min: 1, actual: 0 })?;

    if *revision != CURRENT_SERIALIZATION_REVISION {
        return Err(CredentialError::UnsupportedSerializationRevision {
            received: *revision,
            current: CURRENT_SERIALIZATION_REVISION,
        });
    }
    Ok(body)
}
