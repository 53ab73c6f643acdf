// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

use bls12_381::{G1Projective, Scalar};
use ff::Field;
use group::{Curve, GroupEncoding};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CredentialError, Result};
use crate::proofs::ProofCmCs;
use crate::scheme::keygen::SecretKey;
use crate::scheme::setup::Parameters;
use crate::scheme::BlindedSignature;
use crate::traits::{strip_revision_prefix, with_revision_prefix, Base58, Bytable};
use crate::utils::{hash_g1, try_deserialize_g1_projective, try_deserialize_scalar_vec};
use crate::Attribute;
#[cfg(test)]
use crate::Signature;

/// Fresh value identifying a single issuance attempt. Every authority contacted
/// during that attempt receives the same nonce.
pub type SessionNonce = [u8; 32];

pub fn generate_session_nonce() -> SessionNonce {
    let mut nonce = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut nonce);
    nonce
}

/// Parses a client supplied attribute, rejecting encodings outside of the scalar field.
pub fn attribute_from_canonical_bytes(bytes: &[u8]) -> Result<Attribute> {
    let Ok(array) = <[u8; 32]>::try_from(bytes) else {
        return Err(CredentialError::Commitment(format!(
            "attributes must be encoded on 32 bytes, got {}",
            bytes.len()
        )));
    };
    Option::<Scalar>::from(Scalar::from_bytes(&array)).ok_or_else(|| {
        CredentialError::Commitment("the attribute is not a canonical field element".to_string())
    })
}

/// Client side openings of every per-attribute commitment of a single issuance session.
/// Wiped on drop.
pub struct CommitmentOpenings {
    pedersen_openings: Vec<Scalar>,
}

impl CommitmentOpenings {
    pub fn len(&self) -> usize {
        self.pedersen_openings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pedersen_openings.is_empty()
    }

    pub(crate) fn pedersen_openings(&self) -> &[Scalar] {
        &self.pedersen_openings
    }
}

impl Zeroize for CommitmentOpenings {
    fn zeroize(&mut self) {
        for opening in self.pedersen_openings.iter_mut() {
            *opening = Scalar::ZERO;
        }
        self.pedersen_openings.clear();
    }
}

impl Drop for CommitmentOpenings {
    fn drop(&mut self) {
        self.zeroize()
    }
}

impl ZeroizeOnDrop for CommitmentOpenings {}

// Lambda
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlindSignRequest {
    // cm
    commitment: G1Projective,
    // h
    commitment_hash: G1Projective,
    // c
    private_attributes_commitments: Vec<G1Projective>,
    public_attributes: Vec<Attribute>,
    session_nonce: SessionNonce,
    // pi_s
    pi_s: ProofCmCs,
}

impl BlindSignRequest {
    fn verify_proof(&self, params: &Parameters) -> bool {
        self.pi_s.verify(
            params,
            &self.commitment,
            &self.commitment_hash,
            &self.private_attributes_commitments,
            &self.public_attributes,
        )
    }

    pub fn commitment_hash(&self) -> &G1Projective {
        &self.commitment_hash
    }

    pub fn session_nonce(&self) -> &SessionNonce {
        &self.session_nonce
    }

    pub fn public_attributes(&self) -> &[Attribute] {
        &self.public_attributes
    }

    pub fn num_private_attributes(&self) -> usize {
        self.private_attributes_commitments.len()
    }

    // cm || h || nonce || c_len || c || pub_len || pub || pi_s
    pub fn to_bytes(&self) -> Vec<u8> {
        let proof_bytes = self.pi_s.to_bytes();
        let c_len = self.private_attributes_commitments.len() as u64;
        let pub_len = self.public_attributes.len() as u64;

        let mut bytes = Vec::with_capacity(
            48 + 48 + 32 + 8 + c_len as usize * 48 + 8 + pub_len as usize * 32 + proof_bytes.len(),
        );

        bytes.extend_from_slice(&self.commitment.to_affine().to_compressed());
        bytes.extend_from_slice(&self.commitment_hash.to_affine().to_compressed());
        bytes.extend_from_slice(&self.session_nonce);
        bytes.extend_from_slice(&c_len.to_le_bytes());
        for c in &self.private_attributes_commitments {
            bytes.extend_from_slice(&c.to_affine().to_compressed());
        }
        bytes.extend_from_slice(&pub_len.to_le_bytes());
        for attr in &self.public_attributes {
            bytes.extend_from_slice(&attr.to_bytes());
        }
        bytes.extend_from_slice(&proof_bytes);

        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<BlindSignRequest> {
        const HEADER_LEN: usize = 48 + 48 + 32 + 8;
        if bytes.len() < HEADER_LEN + 8 {
            return Err(CredentialError::DeserializationMinLength {
                min: HEADER_LEN + 8,
                actual: bytes.len(),
            });
        }

        // safety: bound checked + constant offsets
        #[allow(clippy::unwrap_used)]
        let cm_bytes = bytes[..48].try_into().unwrap();
        let commitment = try_deserialize_g1_projective(
            &cm_bytes,
            CredentialError::Deserialization(
                "Failed to deserialize compressed commitment".to_string(),
            ),
        )?;

        #[allow(clippy::unwrap_used)]
        let cm_hash_bytes = bytes[48..96].try_into().unwrap();
        let commitment_hash = try_deserialize_g1_projective(
            &cm_hash_bytes,
            CredentialError::Deserialization(
                "Failed to deserialize compressed commitment hash".to_string(),
            ),
        )?;

        #[allow(clippy::unwrap_used)]
        let session_nonce: SessionNonce = bytes[96..128].try_into().unwrap();

        #[allow(clippy::unwrap_used)]
        let c_len = u64::from_le_bytes(bytes[128..136].try_into().unwrap()) as usize;
        let mut j = HEADER_LEN;

        let c_end = c_len
            .checked_mul(48)
            .and_then(|c_bytes| c_bytes.checked_add(j))
            .filter(|&end| end + 8 <= bytes.len())
            .ok_or(CredentialError::DeserializationMinLength {
                min: HEADER_LEN.saturating_add(c_len.saturating_mul(48)).saturating_add(8),
                actual: bytes.len(),
            })?;

        let mut private_attributes_commitments = Vec::with_capacity(c_len);
        for chunk in bytes[j..c_end].chunks_exact(48) {
            // safety: chunks_exact guarantees 48 byte long slices
            #[allow(clippy::unwrap_used)]
            let c_bytes = chunk.try_into().unwrap();
            let c = try_deserialize_g1_projective(
                &c_bytes,
                CredentialError::Deserialization(
                    "Failed to deserialize compressed private attribute commitment".to_string(),
                ),
            )?;
            private_attributes_commitments.push(c)
        }
        j = c_end;

        #[allow(clippy::unwrap_used)]
        let pub_len = u64::from_le_bytes(bytes[j..j + 8].try_into().unwrap());
        j += 8;
        let pub_end = (pub_len as usize)
            .checked_mul(32)
            .and_then(|pub_bytes| pub_bytes.checked_add(j))
            .filter(|&end| end <= bytes.len())
            .ok_or(CredentialError::DeserializationMinLength {
                min: j.saturating_add((pub_len as usize).saturating_mul(32)),
                actual: bytes.len(),
            })?;

        let public_attributes = try_deserialize_scalar_vec(
            pub_len,
            &bytes[j..pub_end],
            CredentialError::Deserialization("Failed to deserialize public attributes".to_string()),
        )?;

        let pi_s = ProofCmCs::from_bytes(&bytes[pub_end..])?;

        Ok(BlindSignRequest {
            commitment,
            commitment_hash,
            private_attributes_commitments,
            public_attributes,
            session_nonce,
            pi_s,
        })
    }
}

impl Bytable for BlindSignRequest {
    fn to_byte_vec(&self) -> Vec<u8> {
        with_revision_prefix(&self.to_bytes())
    }

    fn try_from_byte_slice(slice: &[u8]) -> Result<Self> {
        BlindSignRequest::from_bytes(strip_revision_prefix(slice)?)
    }
}

impl Base58 for BlindSignRequest {}

/// Produces g1^r * h0^m0 * h1^m1 * .... * hn^mn over the private attributes followed by
/// the public ones.
fn compute_attributes_commitment(
    params: &Parameters,
    commitment_opening: &Scalar,
    private_attributes: &[Attribute],
    public_attributes: &[Attribute],
) -> G1Projective {
    let attr_cm = private_attributes
        .iter()
        .chain(public_attributes.iter())
        .zip(params.gen_hs())
        .map(|(m, h)| h * m)
        .sum::<G1Projective>();

    params.gen1() * commitment_opening + attr_cm
}

/// Hashes the joint commitment, the public attributes and the session nonce onto G1.
pub fn compute_hash(
    commitment: &G1Projective,
    public_attributes: &[Attribute],
    session_nonce: &SessionNonce,
) -> G1Projective {
    let mut bytes = Vec::with_capacity(48 + public_attributes.len() * 32 + 32);
    bytes.extend_from_slice(commitment.to_bytes().as_ref());
    for attr in public_attributes {
        bytes.extend_from_slice(&attr.to_bytes());
    }
    bytes.extend_from_slice(session_nonce);
    hash_g1(bytes)
}

/// Builds cryptographic material required for blind sign.
pub fn prepare_blind_sign(
    params: &Parameters,
    private_attributes: &[Attribute],
    public_attributes: &[Attribute],
    session_nonce: &SessionNonce,
) -> Result<(CommitmentOpenings, BlindSignRequest)> {
    let requested = private_attributes.len() + public_attributes.len();
    if requested > params.max_attributes() {
        return Err(CredentialError::IssuanceMaxAttributes {
            max: params.max_attributes(),
            requested,
        });
    }

    let commitment_opening = params.random_scalar();
    let commitment = compute_attributes_commitment(
        params,
        &commitment_opening,
        private_attributes,
        public_attributes,
    );

    let commitment_hash = compute_hash(&commitment, public_attributes, session_nonce);

    // c_j = g1^o_j * h^m_j
    let pedersen_openings = params.n_random_scalars(private_attributes.len());
    let private_attributes_commitments = pedersen_openings
        .iter()
        .zip(private_attributes.iter())
        .map(|(o_j, m_j)| params.gen1() * o_j + commitment_hash * m_j)
        .collect::<Vec<_>>();

    let pi_s = ProofCmCs::construct(
        params,
        &commitment,
        &commitment_opening,
        &commitment_hash,
        &private_attributes_commitments,
        &pedersen_openings,
        private_attributes,
    );

    let openings = CommitmentOpenings { pedersen_openings };

    Ok((
        openings,
        BlindSignRequest {
            commitment,
            commitment_hash,
            private_attributes_commitments,
            public_attributes: public_attributes.to_vec(),
            session_nonce: *session_nonce,
            pi_s,
        },
    ))
}

/// Issues a blinded signature on a request after checking it was built over the expected
/// public attributes and carries a valid proof of knowledge.
pub fn blind_sign(
    params: &Parameters,
    signing_secret_key: &SecretKey,
    blind_sign_request: &BlindSignRequest,
    public_attributes: &[Attribute],
) -> Result<BlindedSignature> {
    let num_private = blind_sign_request.private_attributes_commitments.len();
    let requested = num_private + public_attributes.len();
    if requested > signing_secret_key.ys.len() {
        return Err(CredentialError::IssuanceMaxAttributes {
            max: signing_secret_key.ys.len(),
            requested,
        });
    }

    if blind_sign_request.public_attributes != public_attributes {
        return Err(CredentialError::InvalidProofOfKnowledge(
            "the request was built over unexpected public attributes".to_string(),
        ));
    }

    let h = compute_hash(
        &blind_sign_request.commitment,
        public_attributes,
        &blind_sign_request.session_nonce,
    );
    if h != blind_sign_request.commitment_hash {
        return Err(CredentialError::InvalidProofOfKnowledge(
            "Failed to verify the commitment hash".to_string(),
        ));
    }

    if !blind_sign_request.verify_proof(params) {
        return Err(CredentialError::InvalidProofOfKnowledge(
            "Failed to verify the proof of knowledge".to_string(),
        ));
    }

    // h ^ (x + pub_m[0] * y[m] + ... + pub_m[n] * y[m + n]) with a single multiplication
    let signed_public = h * (signing_secret_key.x
        + public_attributes
            .iter()
            .zip(signing_secret_key.ys.iter().skip(num_private))
            .map(|(attr, yi)| attr * yi)
            .sum::<Scalar>());

    // c[0] ^ y[0] * ... * c[m] ^ y[m]
    let signed_private = blind_sign_request
        .private_attributes_commitments
        .iter()
        .zip(signing_secret_key.ys.iter())
        .map(|(c, yi)| c * yi)
        .sum::<G1Projective>();

    Ok(BlindedSignature(h, signed_private + signed_public))
}

/// Creates a plain signature under a given secret key on a set of public attributes only.
#[cfg(test)]
pub(crate) fn sign(
    params: &Parameters,
    secret_key: &SecretKey,
    public_attributes: &[Attribute],
) -> Result<Signature> {
    if public_attributes.len() > secret_key.ys.len() {
        return Err(CredentialError::IssuanceMaxAttributes {
            max: secret_key.ys.len(),
            requested: public_attributes.len(),
        });
    }

    let h = params.gen1() * params.random_scalar();
    let exponent = secret_key.x
        + public_attributes
            .iter()
            .zip(secret_key.ys.iter())
            .map(|(m_i, y_i)| m_i * y_i)
            .sum::<Scalar>();

    Ok(Signature(h, h * exponent))
}
