// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

use bls12_381::{G1Projective, G2Prepared, G2Projective, Scalar};
use group::{Curve, Group};

use crate::error::{CredentialError, Result};
use crate::scheme::issuance::CommitmentOpenings;
use crate::scheme::keygen::VerificationKey;
use crate::scheme::setup::Parameters;
use crate::traits::{strip_revision_prefix, with_revision_prefix, Base58, Bytable};
use crate::utils::{check_bilinear_pairing, try_deserialize_g1_projective};
use crate::Attribute;

pub mod aggregation;
pub mod double_use;
pub mod issuance;
pub mod keygen;
pub mod setup;
pub mod verification;

pub type SignerIndex = u64;

fn g1_tuple_to_bytes(el: (&G1Projective, &G1Projective)) -> [u8; 96] {
    let mut bytes = [0u8; 96];
    bytes[..48].copy_from_slice(&el.0.to_affine().to_compressed());
    bytes[48..].copy_from_slice(&el.1.to_affine().to_compressed());
    bytes
}

fn recover_g1_tuple(bytes: &[u8], object: &str) -> Result<(G1Projective, G1Projective)> {
    if bytes.len() != 96 {
        return Err(CredentialError::Deserialization(format!(
            "{object} must be exactly 96 bytes, got {}",
            bytes.len()
        )));
    }

    // safety: we just checked for the length so the unwraps are fine
    #[allow(clippy::unwrap_used)]
    let first_bytes: &[u8; 48] = &bytes[..48].try_into().unwrap();
    #[allow(clippy::unwrap_used)]
    let second_bytes: &[u8; 48] = &bytes[48..].try_into().unwrap();

    let first = try_deserialize_g1_projective(
        first_bytes,
        CredentialError::Deserialization(format!("Failed to deserialize compressed {object} h")),
    )?;
    let second = try_deserialize_g1_projective(
        second_bytes,
        CredentialError::Deserialization(format!("Failed to deserialize compressed {object} s")),
    )?;

    Ok((first, second))
}

fn split_indexed(bytes: &[u8], object: &str) -> Result<(SignerIndex, [u8; 96])> {
    let body = strip_revision_prefix(bytes)?;
    if body.len() != 8 + 96 {
        return Err(CredentialError::Deserialization(format!(
            "{object} must be exactly {} bytes, got {}",
            1 + 8 + 96,
            bytes.len()
        )));
    }

    // safety: we just checked for the length so the unwraps are fine
    #[allow(clippy::unwrap_used)]
    let index = u64::from_le_bytes(body[..8].try_into().unwrap());
    #[allow(clippy::unwrap_used)]
    let sig_bytes = body[8..].try_into().unwrap();
    Ok((index, sig_bytes))
}

fn join_indexed(index: SignerIndex, sig_bytes: &[u8; 96]) -> Vec<u8> {
    let mut body = Vec::with_capacity(8 + 96);
    body.extend_from_slice(&index.to_le_bytes());
    body.extend_from_slice(sig_bytes);
    with_revision_prefix(&body)
}

// (h, s)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature(pub(crate) G1Projective, pub(crate) G1Projective);

impl Signature {
    pub(crate) fn sig1(&self) -> &G1Projective {
        &self.0
    }

    pub(crate) fn sig2(&self) -> &G1Projective {
        &self.1
    }

    /// Re-randomises the credential with a single fresh exponent, `(h^r, s^r)`.
    pub fn randomise_simple(&self, params: &Parameters) -> Signature {
        let r = params.random_scalar();
        Signature(self.0 * r, self.1 * r)
    }

    /// Re-randomises the credential as `(h^r', s^r' * h'^r)`, returning `r` which then has
    /// to be absorbed by the presentation's kappa.
    pub fn randomise(&self, params: &Parameters) -> (Signature, Scalar) {
        let r = params.random_scalar();
        let r_prime = params.random_scalar();
        let h_prime = self.0 * r_prime;
        let s_prime = (self.1 * r_prime) + (h_prime * r);
        (Signature(h_prime, s_prime), r)
    }

    pub fn to_bytes(self) -> [u8; 96] {
        g1_tuple_to_bytes((&self.0, &self.1))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Signature> {
        let (h, s) = recover_g1_tuple(bytes, "signature")?;
        Ok(Signature(h, s))
    }

    /// Verifies a single unblinded share against the verification key of the authority that issued it.
    pub fn verify(
        &self,
        params: &Parameters,
        partial_verification_key: &VerificationKey,
        private_attributes: &[Attribute],
        public_attributes: &[Attribute],
        commitment_hash: &G1Projective,
    ) -> Result<()> {
        if commitment_hash != &self.0 {
            return Err(CredentialError::Unblinding(
                "the signature was not issued for this commitment hash".to_string(),
            ));
        }

        if bool::from(self.0.is_identity()) {
            return Err(CredentialError::Unblinding(
                "the signature has an identity h".to_string(),
            ));
        }

        let signed_attributes = private_attributes
            .iter()
            .chain(public_attributes.iter())
            .zip(partial_verification_key.beta_g2.iter())
            .map(|(attr, beta_i)| beta_i * attr)
            .sum::<G2Projective>();

        if !check_bilinear_pairing(
            &self.0.to_affine(),
            &G2Prepared::from((partial_verification_key.alpha + signed_attributes).to_affine()),
            &self.1.to_affine(),
            params.prepared_miller_g2(),
        ) {
            return Err(CredentialError::Unblinding(
                "Verification of signature share failed".to_string(),
            ));
        }

        Ok(())
    }
}

impl Bytable for Signature {
    fn to_byte_vec(&self) -> Vec<u8> {
        with_revision_prefix(&self.to_bytes())
    }

    fn try_from_byte_slice(slice: &[u8]) -> Result<Self> {
        Signature::from_bytes(strip_revision_prefix(slice)?)
    }
}

impl Base58 for Signature {}

// (h, c)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlindedSignature(pub(crate) G1Projective, pub(crate) G1Projective);

impl BlindedSignature {
    pub fn commitment_hash(&self) -> &G1Projective {
        &self.0
    }

    /// Removes the blinding, `s = c - sum(beta_g1[i] * o[i])`.
    pub fn unblind(
        &self,
        partial_verification_key: &VerificationKey,
        openings: &CommitmentOpenings,
    ) -> Result<Signature> {
        if openings.len() > partial_verification_key.beta_g1.len() {
            return Err(CredentialError::Unblinding(format!(
                "received {} openings for a key supporting only {} attributes",
                openings.len(),
                partial_verification_key.beta_g1.len()
            )));
        }

        let blinding_removers = partial_verification_key
            .beta_g1
            .iter()
            .zip(openings.pedersen_openings().iter())
            .map(|(beta, opening)| beta * opening)
            .sum::<G1Projective>();

        Ok(Signature(self.0, self.1 - blinding_removers))
    }

    pub fn unblind_and_verify(
        &self,
        params: &Parameters,
        partial_verification_key: &VerificationKey,
        private_attributes: &[Attribute],
        public_attributes: &[Attribute],
        commitment_hash: &G1Projective,
        openings: &CommitmentOpenings,
    ) -> Result<Signature> {
        if private_attributes.len() != openings.len() {
            return Err(CredentialError::Unblinding(format!(
                "{} private attributes were provided alongside {} openings",
                private_attributes.len(),
                openings.len()
            )));
        }

        let unblinded = self.unblind(partial_verification_key, openings)?;
        unblinded.verify(
            params,
            partial_verification_key,
            private_attributes,
            public_attributes,
            commitment_hash,
        )?;
        Ok(unblinded)
    }

    pub fn to_bytes(&self) -> [u8; 96] {
        g1_tuple_to_bytes((&self.0, &self.1))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<BlindedSignature> {
        let (h, c) = recover_g1_tuple(bytes, "blinded signature")?;
        Ok(BlindedSignature(h, c))
    }
}

impl Bytable for BlindedSignature {
    fn to_byte_vec(&self) -> Vec<u8> {
        with_revision_prefix(&self.to_bytes())
    }

    fn try_from_byte_slice(slice: &[u8]) -> Result<Self> {
        BlindedSignature::from_bytes(strip_revision_prefix(slice)?)
    }
}

impl Base58 for BlindedSignature {}

/// Response of a single authority to a blind sign request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartialSignature {
    index: SignerIndex,
    blinded: BlindedSignature,
}

impl PartialSignature {
    pub fn new(index: SignerIndex, blinded: BlindedSignature) -> Self {
        PartialSignature { index, blinded }
    }

    pub fn index(&self) -> SignerIndex {
        self.index
    }

    pub fn blinded_signature(&self) -> &BlindedSignature {
        &self.blinded
    }

    pub fn unblind_and_verify(
        &self,
        params: &Parameters,
        partial_verification_key: &VerificationKey,
        private_attributes: &[Attribute],
        public_attributes: &[Attribute],
        commitment_hash: &G1Projective,
        openings: &CommitmentOpenings,
    ) -> Result<SignatureShare> {
        let signature = self.blinded.unblind_and_verify(
            params,
            partial_verification_key,
            private_attributes,
            public_attributes,
            commitment_hash,
            openings,
        )?;
        Ok(SignatureShare::new(signature, self.index))
    }
}

impl Bytable for PartialSignature {
    fn to_byte_vec(&self) -> Vec<u8> {
        join_indexed(self.index, &self.blinded.to_bytes())
    }

    fn try_from_byte_slice(slice: &[u8]) -> Result<Self> {
        let (index, sig_bytes) = split_indexed(slice, "partial signature")?;
        Ok(PartialSignature {
            index,
            blinded: BlindedSignature::from_bytes(&sig_bytes)?,
        })
    }
}

impl Base58 for PartialSignature {}

/// Unblinded signature tagged with the index of the authority that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureShare {
    signature: Signature,
    index: SignerIndex,
}

impl From<(Signature, SignerIndex)> for SignatureShare {
    fn from(value: (Signature, SignerIndex)) -> Self {
        SignatureShare {
            signature: value.0,
            index: value.1,
        }
    }
}

impl SignatureShare {
    pub fn new(signature: Signature, index: SignerIndex) -> Self {
        SignatureShare { signature, index }
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn index(&self) -> SignerIndex {
        self.index
    }
}

impl Bytable for SignatureShare {
    fn to_byte_vec(&self) -> Vec<u8> {
        join_indexed(self.index, &self.signature.to_bytes())
    }

    fn try_from_byte_slice(slice: &[u8]) -> Result<Self> {
        let (index, sig_bytes) = split_indexed(slice, "signature share")?;
        Ok(SignatureShare {
            signature: Signature::from_bytes(&sig_bytes)?,
            index,
        })
    }
}

impl Base58 for SignatureShare {}
