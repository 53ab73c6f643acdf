// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

use std::fmt::{self, Display, Formatter};
use std::hash::{Hash, Hasher};

use bls12_381::G2Projective;
use group::Curve;

use crate::error::{CredentialError, Result};
use crate::scheme::setup::Parameters;
use crate::traits::{strip_revision_prefix, with_revision_prefix, Base58, Bytable};
use crate::utils::try_deserialize_g2_projective;
use crate::Attribute;

/// Deterministic tag (zeta) derived from the credential serial number.
/// Presenting the same credential twice reveals the same tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlindedSerialNumber {
    pub(crate) inner: G2Projective,
}

impl BlindedSerialNumber {
    pub fn from_serial_number(params: &Parameters, serial_number: &Attribute) -> Self {
        BlindedSerialNumber {
            inner: params.gen2() * serial_number,
        }
    }

    pub fn to_bytes(&self) -> [u8; 96] {
        self.inner.to_affine().to_compressed()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let Ok(compressed) = <&[u8; 96]>::try_from(bytes) else {
            return Err(CredentialError::Deserialization(format!(
                "Tried to deserialize blinded serial number with incorrect number of bytes, expected 96, got {}",
                bytes.len()
            )));
        };

        let inner = try_deserialize_g2_projective(
            compressed,
            CredentialError::Deserialization(
                "failed to deserialize the blinded serial number (zeta)".to_string(),
            ),
        )?;

        Ok(BlindedSerialNumber { inner })
    }
}

impl Hash for BlindedSerialNumber {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_bytes().hash(state)
    }
}

impl Display for BlindedSerialNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(self.to_bytes()).into_string())
    }
}

impl TryFrom<&[u8]> for BlindedSerialNumber {
    type Error = CredentialError;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        BlindedSerialNumber::from_bytes(bytes)
    }
}

impl Bytable for BlindedSerialNumber {
    fn to_byte_vec(&self) -> Vec<u8> {
        with_revision_prefix(&self.to_bytes())
    }

    fn try_from_byte_slice(slice: &[u8]) -> Result<Self> {
        Self::from_bytes(strip_revision_prefix(slice)?)
    }
}

impl Base58 for BlindedSerialNumber {}
