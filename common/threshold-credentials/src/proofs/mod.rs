// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

use std::borrow::Borrow;

use bls12_381::{G1Projective, G2Projective, Scalar};
use digest::generic_array::typenum::Unsigned;
use digest::Digest;
use ff::Field;
use group::GroupEncoding;
use itertools::izip;
use sha2::Sha256;

use crate::error::{CredentialError, Result};
use crate::scheme::setup::Parameters;
use crate::scheme::keygen::VerificationKey;
use crate::utils::{try_deserialize_scalar, try_deserialize_scalar_vec};
use crate::Attribute;

type ChallengeDigest = Sha256;

/// Generates a Scalar challenge by hashing a number of elliptic curve points.
fn compute_challenge<D, I, B>(iter: I) -> Scalar
where
    D: Digest,
    I: Iterator<Item = B>,
    B: AsRef<[u8]>,
{
    let mut h = D::new();
    for point_representation in iter {
        h.update(point_representation);
    }
    let digest = h.finalize();

    // TODO: replace the zero padding with a proper hash-to-field once the issuance wire
    // format gets its next revision bump
    let mut bytes = [0u8; 64];
    let pad_size = 64usize
        .checked_sub(D::OutputSize::to_usize())
        .unwrap_or_default();

    bytes[pad_size..].copy_from_slice(&digest);

    Scalar::from_bytes_wide(&bytes)
}

fn produce_response(witness: &Scalar, challenge: &Scalar, secret: &Scalar) -> Scalar {
    witness - challenge * secret
}

// note: it's caller's responsibility to ensure witnesses.len() = secrets.len()
fn produce_responses<S>(witnesses: &[Scalar], challenge: &Scalar, secrets: &[S]) -> Vec<Scalar>
where
    S: Borrow<Scalar>,
{
    debug_assert_eq!(witnesses.len(), secrets.len());

    witnesses
        .iter()
        .zip(secrets.iter())
        .map(|(w, x)| produce_response(w, challenge, x.borrow()))
        .collect()
}

fn read_u64(bytes: &[u8], offset: usize) -> Option<u64> {
    let raw = bytes.get(offset..offset.checked_add(8)?)?;
    raw.try_into().ok().map(u64::from_le_bytes)
}

/// Proof of knowledge of the openings of the joint commitment `cm` and of every
/// per-attribute commitment `c_j`, and that they commit to the same private attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofCmCs {
    challenge: Scalar,
    response_opening: Scalar,
    response_openings: Vec<Scalar>,
    response_attributes: Vec<Scalar>,
}

impl ProofCmCs {
    #[allow(clippy::too_many_arguments)]
    fn challenge(
        params: &Parameters,
        commitment_hash: &G1Projective,
        commitment: &G1Projective,
        commitments: &[G1Projective],
        commitment_attributes: &G1Projective,
        commitments_attributes: &[G1Projective],
    ) -> Scalar {
        let hs_bytes = params.hs_bytes();
        let commitments_bytes = commitments
            .iter()
            .map(|cm| cm.to_bytes())
            .collect::<Vec<_>>();
        let commitments_attributes_bytes = commitments_attributes
            .iter()
            .map(|cm| cm.to_bytes())
            .collect::<Vec<_>>();

        compute_challenge::<ChallengeDigest, _, _>(
            std::iter::once(params.gen1().to_bytes().as_ref())
                .chain(hs_bytes.iter().map(|hs| hs.as_ref()))
                .chain(std::iter::once(commitment_hash.to_bytes().as_ref()))
                .chain(std::iter::once(commitment.to_bytes().as_ref()))
                .chain(commitments_bytes.iter().map(|cm| cm.as_ref()))
                .chain(std::iter::once(commitment_attributes.to_bytes().as_ref()))
                .chain(commitments_attributes_bytes.iter().map(|cm| cm.as_ref())),
        )
    }

    /// Construct non-interactive zero-knowledge proof of correctness of the commitments
    /// using the Fiat-Shamir heuristic.
    pub(crate) fn construct(
        params: &Parameters,
        commitment: &G1Projective,
        commitment_opening: &Scalar,
        commitment_hash: &G1Projective,
        commitments: &[G1Projective],
        pedersen_commitments_openings: &[Scalar],
        private_attributes: &[Attribute],
    ) -> Self {
        // witness creation
        let witness_commitment_opening = params.random_scalar();
        let witness_pedersen_commitments_openings =
            params.n_random_scalars(pedersen_commitments_openings.len());
        let witness_attributes = params.n_random_scalars(private_attributes.len());

        let g1 = params.gen1();

        // Ccm = (wr * g1) + (wm[0] * hs[0]) + ... + (wm[i] * hs[i])
        let commitment_attributes = g1 * witness_commitment_opening
            + witness_attributes
                .iter()
                .zip(params.gen_hs().iter())
                .map(|(wm_i, hs_i)| hs_i * wm_i)
                .sum::<G1Projective>();

        // Cc[j] = (wo[j] * g1) + (wm[j] * h)
        let commitments_attributes = witness_pedersen_commitments_openings
            .iter()
            .zip(witness_attributes.iter())
            .map(|(o_j, m_j)| g1 * o_j + commitment_hash * m_j)
            .collect::<Vec<_>>();

        let challenge = Self::challenge(
            params,
            commitment_hash,
            commitment,
            commitments,
            &commitment_attributes,
            &commitments_attributes,
        );

        // Responses
        let response_opening =
            produce_response(&witness_commitment_opening, &challenge, commitment_opening);
        let response_openings = produce_responses(
            &witness_pedersen_commitments_openings,
            &challenge,
            pedersen_commitments_openings,
        );
        let response_attributes =
            produce_responses(&witness_attributes, &challenge, private_attributes);

        ProofCmCs {
            challenge,
            response_opening,
            response_openings,
            response_attributes,
        }
    }

    pub(crate) fn verify(
        &self,
        params: &Parameters,
        commitment: &G1Projective,
        commitment_hash: &G1Projective,
        commitments: &[G1Projective],
        public_attributes: &[Attribute],
    ) -> bool {
        if self.response_attributes.len() != commitments.len()
            || self.response_openings.len() != commitments.len()
        {
            return false;
        }

        if commitments.len() + public_attributes.len() > params.max_attributes() {
            return false;
        }

        let g1 = params.gen1();

        // Cw = ((cm - public part) * c) + (rr * g1) + (rm[0] * hs[0]) + ... + (rm[n] * hs[n])
        let public_part = public_attributes
            .iter()
            .zip(params.gen_hs().iter().skip(self.response_attributes.len()))
            .map(|(pub_attr, hs)| hs * pub_attr)
            .sum::<G1Projective>();

        let commitment_attributes = (commitment - public_part) * self.challenge
            + g1 * self.response_opening
            + self
                .response_attributes
                .iter()
                .zip(params.gen_hs().iter())
                .map(|(res_attr, hs)| hs * res_attr)
                .sum::<G1Projective>();

        let commitments_attributes = izip!(
            commitments.iter(),
            self.response_openings.iter(),
            self.response_attributes.iter()
        )
        .map(|(cm_j, r_o_j, r_m_j)| cm_j * self.challenge + g1 * r_o_j + commitment_hash * r_m_j)
        .collect::<Vec<_>>();

        let challenge = Self::challenge(
            params,
            commitment_hash,
            commitment,
            commitments,
            &commitment_attributes,
            &commitments_attributes,
        );

        challenge == self.challenge
    }

    // challenge || response opening || openings len || response openings || attributes len ||
    // response attributes
    pub(crate) fn to_bytes(&self) -> Vec<u8> {
        let openings_len = self.response_openings.len() as u64;
        let attributes_len = self.response_attributes.len() as u64;

        let mut bytes = Vec::with_capacity(16 + (2 + openings_len + attributes_len) as usize * 32);

        bytes.extend_from_slice(&self.challenge.to_bytes());
        bytes.extend_from_slice(&self.response_opening.to_bytes());

        bytes.extend_from_slice(&openings_len.to_le_bytes());
        for ro in &self.response_openings {
            bytes.extend_from_slice(&ro.to_bytes());
        }

        bytes.extend_from_slice(&attributes_len.to_le_bytes());
        for rm in &self.response_attributes {
            bytes.extend_from_slice(&rm.to_bytes());
        }

        bytes
    }

    pub(crate) fn from_bytes(bytes: &[u8]) -> Result<Self> {
        // a request without private attributes still proves knowledge of the commitment opening
        if bytes.len() < 32 * 2 + 16 || (bytes.len() - 16) % 32 != 0 {
            return Err(CredentialError::DeserializationInvalidLength {
                actual: bytes.len(),
                target: 32 * 2 + 16,
                modulus_target: bytes.len().saturating_sub(16),
                modulus: 32,
                object: "proof of commitments".to_string(),
            });
        }

        // safety: bound checked + constant offset
        #[allow(clippy::unwrap_used)]
        let challenge_bytes = bytes[..32].try_into().unwrap();
        #[allow(clippy::unwrap_used)]
        let response_opening_bytes = bytes[32..64].try_into().unwrap();

        let challenge = try_deserialize_scalar(
            &challenge_bytes,
            CredentialError::Deserialization("Failed to deserialize challenge".to_string()),
        )?;

        let response_opening = try_deserialize_scalar(
            &response_opening_bytes,
            CredentialError::Deserialization(
                "Failed to deserialize the response to the random".to_string(),
            ),
        )?;

        let insufficient = || {
            CredentialError::Deserialization(
                "tried to deserialize proof of commitments with insufficient number of bytes provided"
                    .to_string(),
            )
        };

        let ro_len = read_u64(bytes, 64).ok_or_else(insufficient)?;
        let ro_start = 72;
        let ro_end = (ro_len as usize)
            .checked_mul(32)
            .and_then(|len| len.checked_add(ro_start))
            .ok_or_else(insufficient)?;

        let rm_len = read_u64(bytes, ro_end).ok_or_else(insufficient)?;
        let response_openings = try_deserialize_scalar_vec(
            ro_len,
            &bytes[ro_start..ro_end],
            CredentialError::Deserialization("Failed to deserialize openings response".to_string()),
        )?;

        let response_attributes = try_deserialize_scalar_vec(
            rm_len,
            &bytes[ro_end + 8..],
            CredentialError::Deserialization(
                "Failed to deserialize attributes response".to_string(),
            ),
        )?;

        Ok(ProofCmCs {
            challenge,
            response_opening,
            response_openings,
            response_attributes,
        })
    }
}

/// Proof of knowledge of the blinder and of every private attribute hidden inside kappa.
/// When the credential carries private attributes, the first one (the serial number) is
/// additionally bound to the revealed zeta.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofKappaZeta {
    // c
    challenge: Scalar,

    // responses
    response_blinder: Scalar,
    response_attributes: Vec<Scalar>,
}

impl ProofKappaZeta {
    fn challenge(
        params: &Parameters,
        verification_key: &VerificationKey,
        kappa: &G2Projective,
        zeta: Option<&G2Projective>,
        commitment_kappa: &G2Projective,
        commitment_zeta: Option<&G2Projective>,
        context: &[u8],
    ) -> Scalar {
        let beta_bytes = verification_key
            .beta_g2
            .iter()
            .map(|beta_i| beta_i.to_bytes())
            .collect::<Vec<_>>();
        let zeta_bytes = zeta.map(|zeta| zeta.to_bytes());
        let commitment_zeta_bytes = commitment_zeta.map(|cz| cz.to_bytes());

        compute_challenge::<ChallengeDigest, _, _>(
            std::iter::once(params.gen2().to_bytes().as_ref())
                .chain(std::iter::once(kappa.to_bytes().as_ref()))
                .chain(zeta_bytes.iter().map(|b| b.as_ref()))
                .chain(std::iter::once(verification_key.alpha.to_bytes().as_ref()))
                .chain(beta_bytes.iter().map(|b| b.as_ref()))
                .chain(std::iter::once(commitment_kappa.to_bytes().as_ref()))
                .chain(commitment_zeta_bytes.iter().map(|b| b.as_ref()))
                .chain(std::iter::once(context)),
        )
    }

    pub(crate) fn construct(
        params: &Parameters,
        verification_key: &VerificationKey,
        private_attributes: &[Attribute],
        blinding_factor: &Scalar,
        kappa: &G2Projective,
        zeta: Option<&G2Projective>,
        context: &[u8],
    ) -> Self {
        // create the witnesses
        let witness_blinder = params.random_scalar();
        let witness_attributes = params.n_random_scalars(private_attributes.len());

        // Aw = g2 * wt + alpha + beta[0] * wm[0] + ... + beta[i] * wm[i]
        let commitment_kappa = params.gen2() * witness_blinder
            + verification_key.alpha
            + witness_attributes
                .iter()
                .zip(verification_key.beta_g2.iter())
                .map(|(wm_i, beta_i)| beta_i * wm_i)
                .sum::<G2Projective>();

        // Bw = g2 * wm[0], tying the serial number to zeta
        let commitment_zeta = zeta
            .and(witness_attributes.first())
            .map(|w_serial| params.gen2() * w_serial);

        let challenge = Self::challenge(
            params,
            verification_key,
            kappa,
            zeta,
            &commitment_kappa,
            commitment_zeta.as_ref(),
            context,
        );

        ProofKappaZeta {
            challenge,
            response_blinder: produce_response(&witness_blinder, &challenge, blinding_factor),
            response_attributes: produce_responses(
                &witness_attributes,
                &challenge,
                private_attributes,
            ),
        }
    }

    pub(crate) fn private_attributes_len(&self) -> usize {
        self.response_attributes.len()
    }

    pub(crate) fn verify(
        &self,
        params: &Parameters,
        verification_key: &VerificationKey,
        kappa: &G2Projective,
        zeta: Option<&G2Projective>,
        context: &[u8],
    ) -> bool {
        if self.response_attributes.len() > verification_key.beta_g2.len() {
            return false;
        }

        // zeta is revealed if and only if there is a serial number to bind it to
        if zeta.is_some() == self.response_attributes.is_empty() {
            return false;
        }

        // Aw = (c * kappa) + (rt * g2) + ((1 - c) * alpha) + (rm[0] * beta[0]) + ... + (rm[i] * beta[i])
        let commitment_kappa = kappa * self.challenge
            + params.gen2() * self.response_blinder
            + verification_key.alpha * (Scalar::ONE - self.challenge)
            + self
                .response_attributes
                .iter()
                .zip(verification_key.beta_g2.iter())
                .map(|(priv_attr, beta_i)| beta_i * priv_attr)
                .sum::<G2Projective>();

        // Bw = (c * zeta) + (rm[0] * g2)
        let commitment_zeta = zeta
            .zip(self.response_attributes.first())
            .map(|(zeta, r_serial)| zeta * self.challenge + params.gen2() * r_serial);

        let challenge = Self::challenge(
            params,
            verification_key,
            kappa,
            zeta,
            &commitment_kappa,
            commitment_zeta.as_ref(),
            context,
        );

        challenge == self.challenge
    }

    // challenge || response blinder || attributes len || response attributes
    pub(crate) fn to_bytes(&self) -> Vec<u8> {
        let attributes_len = self.response_attributes.len() as u64;
        let mut bytes = Vec::with_capacity(8 + (2 + attributes_len as usize) * 32);

        bytes.extend_from_slice(&self.challenge.to_bytes());
        bytes.extend_from_slice(&self.response_blinder.to_bytes());
        bytes.extend_from_slice(&attributes_len.to_le_bytes());
        for rm in &self.response_attributes {
            bytes.extend_from_slice(&rm.to_bytes());
        }

        bytes
    }

    pub(crate) fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 32 * 2 + 8 || (bytes.len() - 8) % 32 != 0 {
            return Err(CredentialError::DeserializationInvalidLength {
                actual: bytes.len(),
                target: 32 * 2 + 8,
                modulus_target: bytes.len().saturating_sub(8),
                modulus: 32,
                object: "kappa and zeta proof".to_string(),
            });
        }

        // safety: bound checked + constant offset
        #[allow(clippy::unwrap_used)]
        let challenge_bytes = bytes[..32].try_into().unwrap();
        let challenge = try_deserialize_scalar(
            &challenge_bytes,
            CredentialError::Deserialization("Failed to deserialize challenge".to_string()),
        )?;

        #[allow(clippy::unwrap_used)]
        let blinder_bytes = bytes[32..64].try_into().unwrap();
        let response_blinder = try_deserialize_scalar(
            &blinder_bytes,
            CredentialError::Deserialization("failed to deserialize the blinder".to_string()),
        )?;

        #[allow(clippy::unwrap_used)]
        let attributes_len = u64::from_le_bytes(bytes[64..72].try_into().unwrap());
        let response_attributes = try_deserialize_scalar_vec(
            attributes_len,
            &bytes[72..],
            CredentialError::Deserialization(
                "failed to deserialize the attributes responses".to_string(),
            ),
        )?;

        Ok(ProofKappaZeta {
            challenge,
            response_blinder,
            response_attributes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheme::keygen::keygen;
    use crate::scheme::verification::{compute_kappa, compute_zeta};
    use crate::tests::helpers::random_scalars;
    use group::Group;
    use rand::thread_rng;

    #[test]
    fn proof_cm_cs_bytes_roundtrip() {
        let mut rng = thread_rng();

        for private_len in [0usize, 1, 2] {
            let params = Parameters::new(2).unwrap();
            let cm = G1Projective::random(&mut rng);
            let h = G1Projective::random(&mut rng);
            let r = params.random_scalar();
            let cms = (0..private_len)
                .map(|_| G1Projective::random(&mut rng))
                .collect::<Vec<_>>();
            let rs = params.n_random_scalars(private_len);
            let private_attributes = random_scalars!(params, private_len);

            let pi_s = ProofCmCs::construct(&params, &cm, &r, &h, &cms, &rs, &private_attributes);

            let bytes = pi_s.to_bytes();
            assert_eq!(ProofCmCs::from_bytes(&bytes).unwrap(), pi_s);
        }
    }

    #[test]
    fn proof_cm_cs_rejects_truncated_bytes() {
        let params = Parameters::new(2).unwrap();
        let mut rng = thread_rng();
        let cms = [G1Projective::random(&mut rng)];
        let pi_s = ProofCmCs::construct(
            &params,
            &G1Projective::random(&mut rng),
            &params.random_scalar(),
            &G1Projective::random(&mut rng),
            &cms,
            &params.n_random_scalars(1),
            &random_scalars!(params, 1),
        );

        let bytes = pi_s.to_bytes();
        assert!(ProofCmCs::from_bytes(&bytes[..bytes.len() - 32]).is_err());
        assert!(ProofCmCs::from_bytes(&bytes[..40]).is_err());
    }

    #[test]
    fn proof_kappa_zeta_verifies_and_roundtrips() {
        let params = Parameters::new(4).unwrap();
        let keypair = keygen(&params);
        let private_attributes = random_scalars!(params, 2);

        let r = params.random_scalar();
        let kappa = compute_kappa(&params, keypair.verification_key(), &private_attributes, r);
        let zeta = compute_zeta(&params, &private_attributes[0]);

        let pi_v = ProofKappaZeta::construct(
            &params,
            keypair.verification_key(),
            &private_attributes,
            &r,
            &kappa,
            Some(&zeta),
            b"context",
        );
        assert!(pi_v.verify(&params, keypair.verification_key(), &kappa, Some(&zeta), b"context"));
        assert!(!pi_v.verify(&params, keypair.verification_key(), &kappa, Some(&zeta), b"other"));
        assert!(!pi_v.verify(&params, keypair.verification_key(), &kappa, None, b"context"));

        let proof_bytes = pi_v.to_bytes();
        let proof_from_bytes = ProofKappaZeta::from_bytes(&proof_bytes).unwrap();
        assert_eq!(proof_from_bytes, pi_v);
        assert_eq!(proof_from_bytes.private_attributes_len(), 2);
    }

    #[test]
    fn proof_kappa_without_private_attributes_has_no_zeta() {
        let params = Parameters::new(1).unwrap();
        let keypair = keygen(&params);

        let r = params.random_scalar();
        let kappa = compute_kappa(&params, keypair.verification_key(), &[], r);
        let pi_v = ProofKappaZeta::construct(
            &params,
            keypair.verification_key(),
            &[],
            &r,
            &kappa,
            None,
            &[],
        );

        assert!(pi_v.verify(&params, keypair.verification_key(), &kappa, None, &[]));
        let fake_zeta = compute_zeta(&params, &params.random_scalar());
        assert!(!pi_v.verify(&params, keypair.verification_key(), &kappa, Some(&fake_zeta), &[]));
    }
}
