// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

use bls12_381::{G2Prepared, G2Projective, Scalar};
use group::{Curve, Group};
use tracing::debug;

use crate::error::{CredentialError, Result};
use crate::proofs::ProofKappaZeta;
use crate::scheme::double_use::BlindedSerialNumber;
use crate::scheme::keygen::VerificationKey;
use crate::scheme::setup::Parameters;
use crate::scheme::Signature;
use crate::traits::{strip_revision_prefix, with_revision_prefix, Base58, Bytable};
use crate::utils::{
    check_bilinear_pairing, try_deserialize_g2_projective, try_deserialize_scalar_vec,
};
use crate::{Attribute, PrivateAttribute, PublicAttribute};

/// Values disclosed by an accepted presentation that the caller still has to act upon,
/// most notably checking the serial tag against a spent ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevealedValues {
    pub blinded_serial_number: Option<BlindedSerialNumber>,
    pub public_attributes: Vec<PublicAttribute>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentationProof {
    // (h', s')
    blinded_credential: Signature,
    kappa: G2Projective,
    zeta: Option<BlindedSerialNumber>,
    public_attributes: Vec<PublicAttribute>,
    pi_v: ProofKappaZeta,
}

pub(crate) fn compute_kappa(
    params: &Parameters,
    verification_key: &VerificationKey,
    private_attributes: &[PrivateAttribute],
    blinding_factor: Scalar,
) -> G2Projective {
    params.gen2() * blinding_factor
        + verification_key.alpha
        + private_attributes
            .iter()
            .zip(verification_key.beta_g2.iter())
            .map(|(priv_attr, beta_i)| beta_i * priv_attr)
            .sum::<G2Projective>()
}

pub(crate) fn compute_zeta(params: &Parameters, serial_number: &PrivateAttribute) -> G2Projective {
    params.gen2() * serial_number
}

// everything the verifier gets to see in the clear is bound into the proof challenge
fn presentation_context(
    blinded_credential: &Signature,
    public_attributes: &[PublicAttribute],
) -> Vec<u8> {
    let mut context = Vec::with_capacity(96 + public_attributes.len() * 32);
    context.extend_from_slice(&blinded_credential.to_bytes());
    for attr in public_attributes {
        context.extend_from_slice(&attr.to_bytes());
    }
    context
}

impl PresentationProof {
    pub fn blinded_serial_number(&self) -> Option<&BlindedSerialNumber> {
        self.zeta.as_ref()
    }

    pub fn public_attributes(&self) -> &[PublicAttribute] {
        &self.public_attributes
    }

    /// Checks the proof against the expected public attributes and, on success, returns the
    /// values revealed by it.
    pub fn verify_and_reveal(
        &self,
        params: &Parameters,
        verification_key: &VerificationKey,
        expected_public_attributes: &[PublicAttribute],
    ) -> Result<RevealedValues> {
        if self.public_attributes != expected_public_attributes {
            return Err(CredentialError::VerificationFailure(
                "the revealed public attributes do not match the expected ones".to_string(),
            ));
        }

        let private_len = self.pi_v.private_attributes_len();
        if private_len + self.public_attributes.len() > verification_key.beta_g2.len() {
            return Err(CredentialError::VerificationFailure(format!(
                "the presentation carries {} attributes while the key supports only {}",
                private_len + self.public_attributes.len(),
                verification_key.beta_g2.len()
            )));
        }

        let context = presentation_context(&self.blinded_credential, &self.public_attributes);
        if !self.pi_v.verify(
            params,
            verification_key,
            &self.kappa,
            self.zeta.as_ref().map(|zeta| &zeta.inner),
            &context,
        ) {
            return Err(CredentialError::VerificationFailure(
                "the proof of knowledge of kappa and zeta is invalid".to_string(),
            ));
        }

        if bool::from(self.blinded_credential.0.is_identity()) {
            return Err(CredentialError::VerificationFailure(
                "the presented credential has an identity h".to_string(),
            ));
        }

        let public_part = self
            .public_attributes
            .iter()
            .zip(verification_key.beta_g2.iter().skip(private_len))
            .map(|(pub_attr, beta_i)| beta_i * pub_attr)
            .sum::<G2Projective>();

        if !check_bilinear_pairing(
            &self.blinded_credential.0.to_affine(),
            &G2Prepared::from((self.kappa + public_part).to_affine()),
            &self.blinded_credential.1.to_affine(),
            params.prepared_miller_g2(),
        ) {
            return Err(CredentialError::VerificationFailure(
                "the pairing check on the presented credential failed".to_string(),
            ));
        }

        Ok(RevealedValues {
            blinded_serial_number: self.zeta,
            public_attributes: self.public_attributes.clone(),
        })
    }

    // blinded credential || kappa || zeta flag || zeta? || public attributes len ||
    // public attributes || pi_v
    pub fn to_bytes(&self) -> Vec<u8> {
        let pi_v_bytes = self.pi_v.to_bytes();
        let mut bytes = Vec::with_capacity(
            96 + 96 + 1 + 96 + 8 + self.public_attributes.len() * 32 + pi_v_bytes.len(),
        );

        bytes.extend_from_slice(&self.blinded_credential.to_bytes());
        bytes.extend_from_slice(&self.kappa.to_affine().to_compressed());
        match &self.zeta {
            Some(zeta) => {
                bytes.push(1);
                bytes.extend_from_slice(&zeta.to_bytes());
            }
            None => bytes.push(0),
        }
        bytes.extend_from_slice(&(self.public_attributes.len() as u64).to_le_bytes());
        for attr in &self.public_attributes {
            bytes.extend_from_slice(&attr.to_bytes());
        }
        bytes.extend_from_slice(&pi_v_bytes);

        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<PresentationProof> {
        // blinded credential, kappa, zeta flag and the public attributes length
        const FIXED_LEN: usize = 96 + 96 + 1 + 8;
        if bytes.len() < FIXED_LEN {
            return Err(CredentialError::DeserializationMinLength {
                min: FIXED_LEN,
                actual: bytes.len(),
            });
        }

        let blinded_credential = Signature::from_bytes(&bytes[..96])?;

        // safety: bound checked + constant offset
        #[allow(clippy::unwrap_used)]
        let kappa_bytes: [u8; 96] = bytes[96..192].try_into().unwrap();
        let kappa = try_deserialize_g2_projective(
            &kappa_bytes,
            CredentialError::Deserialization("failed to deserialize kappa".to_string()),
        )?;

        let mut idx = 193;
        let zeta = match bytes[192] {
            0 => None,
            1 => {
                let zeta_bytes = bytes.get(idx..idx + 96).ok_or(
                    CredentialError::DeserializationMinLength {
                        min: FIXED_LEN + 96,
                        actual: bytes.len(),
                    },
                )?;
                idx += 96;
                Some(BlindedSerialNumber::from_bytes(zeta_bytes)?)
            }
            other => {
                return Err(CredentialError::Deserialization(format!(
                    "invalid zeta presence marker {other}"
                )))
            }
        };

        let public_len_bytes = bytes.get(idx..idx + 8).ok_or(
            CredentialError::DeserializationMinLength {
                min: idx + 8,
                actual: bytes.len(),
            },
        )?;
        // safety: `get` returned exactly 8 bytes
        #[allow(clippy::unwrap_used)]
        let public_len = u64::from_le_bytes(public_len_bytes.try_into().unwrap());
        idx += 8;

        let public_end = (public_len as usize)
            .checked_mul(32)
            .and_then(|len| len.checked_add(idx))
            .filter(|&end| end <= bytes.len())
            .ok_or(CredentialError::DeserializationMinLength {
                min: idx.saturating_add((public_len as usize).saturating_mul(32)),
                actual: bytes.len(),
            })?;

        let public_attributes = try_deserialize_scalar_vec(
            public_len,
            &bytes[idx..public_end],
            CredentialError::Deserialization(
                "failed to deserialize the revealed public attributes".to_string(),
            ),
        )?;

        let pi_v = ProofKappaZeta::from_bytes(&bytes[public_end..])?;

        Ok(PresentationProof {
            blinded_credential,
            kappa,
            zeta,
            public_attributes,
            pi_v,
        })
    }
}

impl Bytable for PresentationProof {
    fn to_byte_vec(&self) -> Vec<u8> {
        with_revision_prefix(&self.to_bytes())
    }

    fn try_from_byte_slice(slice: &[u8]) -> Result<Self> {
        PresentationProof::from_bytes(strip_revision_prefix(slice)?)
    }
}

impl Base58 for PresentationProof {}

/// Validates internal consistency of a (partial) verification key,
/// i.e. that `e(g1, beta_g2[i]) == e(beta_g1[i], g2)` for every attribute.
pub fn check_vk_pairing(params: &Parameters, verification_key: &VerificationKey) -> bool {
    if verification_key.beta_g1.len() != verification_key.beta_g2.len() {
        return false;
    }

    let g1 = params.gen1();
    verification_key
        .beta_g1
        .iter()
        .zip(verification_key.beta_g2.iter())
        .all(|(beta_g1, beta_g2)| {
            check_bilinear_pairing(
                g1,
                &G2Prepared::from(beta_g2.to_affine()),
                &beta_g1.to_affine(),
                params.prepared_miller_g2(),
            )
        })
}

/// Builds a fresh, unlinkable proof of possession of `signature`. The first private attribute,
/// if any, acts as the serial number and gets revealed as a [`BlindedSerialNumber`].
pub fn prove_credential(
    params: &Parameters,
    verification_key: &VerificationKey,
    signature: &Signature,
    private_attributes: &[PrivateAttribute],
    public_attributes: &[PublicAttribute],
) -> Result<PresentationProof> {
    let total = private_attributes.len() + public_attributes.len();
    if total > verification_key.beta_g2.len() {
        return Err(CredentialError::Presentation(format!(
            "tried to prove {total} attributes with a key supporting only {}",
            verification_key.beta_g2.len()
        )));
    }

    if bool::from(signature.0.is_identity()) {
        return Err(CredentialError::Presentation(
            "the credential has an identity h".to_string(),
        ));
    }

    let (blinded_credential, blinding_factor) = signature.randomise(params);

    let kappa = compute_kappa(params, verification_key, private_attributes, blinding_factor);
    let zeta = private_attributes
        .first()
        .map(|serial_number| compute_zeta(params, serial_number));

    let context = presentation_context(&blinded_credential, public_attributes);
    let pi_v = ProofKappaZeta::construct(
        params,
        verification_key,
        private_attributes,
        &blinding_factor,
        &kappa,
        zeta.as_ref(),
        &context,
    );

    debug!(
        "prepared credential presentation with {} private and {} public attributes",
        private_attributes.len(),
        public_attributes.len()
    );

    Ok(PresentationProof {
        blinded_credential,
        kappa,
        zeta: zeta.map(|inner| BlindedSerialNumber { inner }),
        public_attributes: public_attributes.to_vec(),
        pi_v,
    })
}

pub fn verify_credential(
    params: &Parameters,
    verification_key: &VerificationKey,
    proof: &PresentationProof,
    public_attributes: &[PublicAttribute],
) -> bool {
    proof
        .verify_and_reveal(params, verification_key, public_attributes)
        .is_ok()
}

/// Verifies a credential on fully known attributes.
pub fn verify(
    params: &Parameters,
    verification_key: &VerificationKey,
    attributes: &[Attribute],
    signature: &Signature,
) -> bool {
    if attributes.len() > verification_key.beta_g2.len() {
        return false;
    }

    if bool::from(signature.0.is_identity()) {
        return false;
    }

    let kappa = verification_key.alpha
        + attributes
            .iter()
            .zip(verification_key.beta_g2.iter())
            .map(|(m_i, b_i)| b_i * m_i)
            .sum::<G2Projective>();

    check_bilinear_pairing(
        &signature.0.to_affine(),
        &G2Prepared::from(kappa.to_affine()),
        &signature.1.to_affine(),
        params.prepared_miller_g2(),
    )
}
