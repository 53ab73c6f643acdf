// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

use core::borrow::Borrow;
use core::fmt::{self, Debug, Formatter};
use core::iter::Sum;
use core::ops::{Add, Mul};

use bls12_381::{G1Projective, G2Projective, Scalar};
use ff::Field;
use group::{Curve, Group};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CredentialError, Result};
use crate::scheme::setup::{Parameters, ThresholdParameters};
use crate::scheme::SignerIndex;
use crate::traits::{strip_revision_prefix, with_revision_prefix, Base58, Bytable};
use crate::utils::{
    try_deserialize_g1_projective, try_deserialize_g2_projective, try_deserialize_scalar,
    try_deserialize_scalar_vec, Polynomial,
};

pub struct SecretKey {
    pub(crate) x: Scalar,
    pub(crate) ys: Vec<Scalar>,
}

impl Debug for SecretKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKey")
            .field("x", &"<redacted>")
            .field("ys", &format_args!("<{} redacted scalars>", self.ys.len()))
            .finish()
    }
}

impl Zeroize for SecretKey {
    fn zeroize(&mut self) {
        self.x = Scalar::ZERO;
        for y in self.ys.iter_mut() {
            *y = Scalar::ZERO;
        }
        self.ys.clear();
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.zeroize()
    }
}

impl ZeroizeOnDrop for SecretKey {}

impl SecretKey {
    /// Following a (distributed) key generation process, scalar values can be obtained
    /// outside of the normal key generation process.
    pub fn create_from_raw(x: Scalar, ys: Vec<Scalar>) -> Self {
        SecretKey { x, ys }
    }

    /// Extract the Scalar copy of the underlying secrets.
    /// The caller of this function must exercise extreme care to not misuse the data and ensuring it gets zeroized
    pub fn hazmat_to_raw(&self) -> (Scalar, Vec<Scalar>) {
        (self.x, self.ys.clone())
    }

    pub fn size(&self) -> usize {
        self.ys.len()
    }

    /// Derive verification key using this secret key.
    pub fn verification_key(&self, params: &Parameters) -> VerificationKey {
        let g1 = params.gen1();
        let g2 = params.gen2();
        VerificationKey {
            alpha: g2 * self.x,
            beta_g1: self.ys.iter().map(|y| g1 * y).collect(),
            beta_g2: self.ys.iter().map(|y| g2 * y).collect(),
        }
    }

    // x || ys.len() || ys
    pub fn to_bytes(&self) -> Vec<u8> {
        let ys_len = self.ys.len();
        let mut bytes = Vec::with_capacity(8 + (ys_len + 1) * 32);

        bytes.extend_from_slice(&self.x.to_bytes());
        bytes.extend_from_slice(&(ys_len as u64).to_le_bytes());
        for y in self.ys.iter() {
            bytes.extend_from_slice(&y.to_bytes())
        }
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<SecretKey> {
        if bytes.len() < 32 * 2 + 8 || (bytes.len() - 8) % 32 != 0 {
            return Err(CredentialError::DeserializationInvalidLength {
                actual: bytes.len(),
                target: 32 * 2 + 8,
                modulus_target: bytes.len().saturating_sub(8),
                modulus: 32,
                object: "secret key".to_string(),
            });
        }

        // safety: bound checked + constant offset
        #[allow(clippy::unwrap_used)]
        let x_bytes: [u8; 32] = bytes[..32].try_into().unwrap();
        #[allow(clippy::unwrap_used)]
        let ys_len = u64::from_le_bytes(bytes[32..40].try_into().unwrap());

        let x = try_deserialize_scalar(
            &x_bytes,
            CredentialError::Deserialization("Failed to deserialize secret key scalar".to_string()),
        )?;
        let ys = try_deserialize_scalar_vec(
            ys_len,
            &bytes[40..],
            CredentialError::Deserialization("Failed to deserialize secret key scalars".to_string()),
        )?;

        Ok(SecretKey { x, ys })
    }
}

impl Bytable for SecretKey {
    fn to_byte_vec(&self) -> Vec<u8> {
        with_revision_prefix(&self.to_bytes())
    }

    fn try_from_byte_slice(slice: &[u8]) -> Result<Self> {
        SecretKey::from_bytes(strip_revision_prefix(slice)?)
    }
}

impl Base58 for SecretKey {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationKey {
    pub(crate) alpha: G2Projective,
    pub(crate) beta_g1: Vec<G1Projective>,
    pub(crate) beta_g2: Vec<G2Projective>,
}

impl<'b> Add<&'b VerificationKey> for VerificationKey {
    type Output = VerificationKey;

    #[inline]
    fn add(self, rhs: &'b VerificationKey) -> VerificationKey {
        // sizes are validated before any aggregation takes place,
        // mismatched keys would be silently truncated here
        debug_assert_eq!(self.beta_g1.len(), rhs.beta_g1.len());
        debug_assert_eq!(self.beta_g2.len(), rhs.beta_g2.len());

        VerificationKey {
            alpha: self.alpha + rhs.alpha,
            beta_g1: self
                .beta_g1
                .iter()
                .zip(rhs.beta_g1.iter())
                .map(|(self_beta, rhs_beta)| self_beta + rhs_beta)
                .collect(),
            beta_g2: self
                .beta_g2
                .iter()
                .zip(rhs.beta_g2.iter())
                .map(|(self_beta, rhs_beta)| self_beta + rhs_beta)
                .collect(),
        }
    }
}

impl<'a> Mul<Scalar> for &'a VerificationKey {
    type Output = VerificationKey;

    #[inline]
    fn mul(self, rhs: Scalar) -> Self::Output {
        VerificationKey {
            alpha: self.alpha * rhs,
            beta_g1: self.beta_g1.iter().map(|b_i| b_i * rhs).collect(),
            beta_g2: self.beta_g2.iter().map(|b_i| b_i * rhs).collect(),
        }
    }
}

impl<T> Sum<T> for VerificationKey
where
    T: Borrow<VerificationKey>,
{
    #[inline]
    fn sum<I>(iter: I) -> Self
    where
        I: Iterator<Item = T>,
    {
        let mut peekable = iter.peekable();
        let head_attributes = match peekable.peek() {
            Some(head) => head.borrow().beta_g2.len(),
            None => {
                // an empty sum carries no information about the expected key size
                return VerificationKey::identity(0);
            }
        };

        peekable.fold(
            VerificationKey::identity(head_attributes),
            |acc, item| acc + item.borrow(),
        )
    }
}

impl VerificationKey {
    /// Create a (kinda) identity verification key using specified
    /// number of 'beta' elements
    pub(crate) fn identity(beta_size: usize) -> Self {
        VerificationKey {
            alpha: G2Projective::identity(),
            beta_g1: vec![G1Projective::identity(); beta_size],
            beta_g2: vec![G2Projective::identity(); beta_size],
        }
    }

    pub fn alpha(&self) -> &G2Projective {
        &self.alpha
    }

    pub fn beta_g1(&self) -> &[G1Projective] {
        &self.beta_g1
    }

    pub fn beta_g2(&self) -> &[G2Projective] {
        &self.beta_g2
    }

    /// Number of attributes this key is able to verify.
    pub fn size(&self) -> usize {
        self.beta_g2.len()
    }

    // alpha || beta_g1.len() || beta_g1 || beta_g2
    pub fn to_bytes(&self) -> Vec<u8> {
        let beta_g1_len = self.beta_g1.len();
        let beta_g2_len = self.beta_g2.len();
        let mut bytes = Vec::with_capacity(96 + 8 + beta_g1_len * 48 + beta_g2_len * 96);

        bytes.extend_from_slice(&self.alpha.to_affine().to_compressed());
        bytes.extend_from_slice(&(beta_g1_len as u64).to_le_bytes());

        for beta_g1 in self.beta_g1.iter() {
            bytes.extend_from_slice(&beta_g1.to_affine().to_compressed())
        }

        for beta_g2 in self.beta_g2.iter() {
            bytes.extend_from_slice(&beta_g2.to_affine().to_compressed())
        }

        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<VerificationKey> {
        // at minimum there needs to be alpha, beta_g1 length and single beta_g1 and beta_g2 elements
        if bytes.len() < 96 + 8 + 48 + 96 || (bytes.len() - 8 - 96) % (96 + 48) != 0 {
            return Err(CredentialError::DeserializationInvalidLength {
                actual: bytes.len(),
                target: 96 + 8 + 48 + 96,
                modulus_target: bytes.len().saturating_sub(8 + 96),
                modulus: 96 + 48,
                object: "verification key".to_string(),
            });
        }

        // safety: bound checked + constant offset
        #[allow(clippy::unwrap_used)]
        let alpha_bytes: [u8; 96] = bytes[..96].try_into().unwrap();
        #[allow(clippy::unwrap_used)]
        let betas_len = u64::from_le_bytes(bytes[96..104].try_into().unwrap());

        let actual_betas_len = (bytes.len() - 104) / (96 + 48);

        if betas_len != actual_betas_len as u64 {
            return Err(CredentialError::Deserialization(format!(
                "Tried to deserialize verification key with inconsistent betas len (expected {betas_len}, got {actual_betas_len})"
            )));
        }

        let alpha = try_deserialize_g2_projective(
            &alpha_bytes,
            CredentialError::Deserialization(
                "Failed to deserialize verification key G2 point (alpha)".to_string(),
            ),
        )?;

        let beta_g1_end = 104 + actual_betas_len * 48;
        let beta_g1 = bytes[104..beta_g1_end]
            .chunks_exact(48)
            .map(|chunk| {
                // safety: chunks_exact guarantees 48 byte long slices
                #[allow(clippy::unwrap_used)]
                let beta_i_bytes: [u8; 48] = chunk.try_into().unwrap();
                try_deserialize_g1_projective(
                    &beta_i_bytes,
                    CredentialError::Deserialization(
                        "Failed to deserialize verification key G1 point (beta)".to_string(),
                    ),
                )
            })
            .collect::<Result<Vec<_>>>()?;

        let beta_g2 = bytes[beta_g1_end..]
            .chunks_exact(96)
            .map(|chunk| {
                // safety: chunks_exact guarantees 96 byte long slices
                #[allow(clippy::unwrap_used)]
                let beta_i_bytes: [u8; 96] = chunk.try_into().unwrap();
                try_deserialize_g2_projective(
                    &beta_i_bytes,
                    CredentialError::Deserialization(
                        "Failed to deserialize verification key G2 point (beta)".to_string(),
                    ),
                )
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(VerificationKey {
            alpha,
            beta_g1,
            beta_g2,
        })
    }
}

impl Bytable for VerificationKey {
    fn to_byte_vec(&self) -> Vec<u8> {
        with_revision_prefix(&self.to_bytes())
    }

    fn try_from_byte_slice(slice: &[u8]) -> Result<Self> {
        VerificationKey::from_bytes(strip_revision_prefix(slice)?)
    }
}

impl Base58 for VerificationKey {}

/// Partial verification key published by a single authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationKeyShare {
    key: VerificationKey,
    index: SignerIndex,
}

impl From<(VerificationKey, SignerIndex)> for VerificationKeyShare {
    fn from(value: (VerificationKey, SignerIndex)) -> Self {
        VerificationKeyShare {
            key: value.0,
            index: value.1,
        }
    }
}

impl VerificationKeyShare {
    pub fn new(key: VerificationKey, index: SignerIndex) -> Self {
        VerificationKeyShare { key, index }
    }

    pub fn key(&self) -> &VerificationKey {
        &self.key
    }

    pub fn index(&self) -> SignerIndex {
        self.index
    }
}

/// Key material held by a single signing authority.
#[derive(Debug)]
pub struct AuthorityKeyShare {
    index: SignerIndex,
    secret_key: SecretKey,
    verification_key: VerificationKey,
}

impl AuthorityKeyShare {
    pub fn from_keys(
        params: &Parameters,
        index: SignerIndex,
        secret_key: SecretKey,
    ) -> AuthorityKeyShare {
        let verification_key = secret_key.verification_key(params);
        AuthorityKeyShare {
            index,
            secret_key,
            verification_key,
        }
    }

    pub fn index(&self) -> SignerIndex {
        self.index
    }

    pub fn secret_key(&self) -> &SecretKey {
        &self.secret_key
    }

    pub fn verification_key(&self) -> &VerificationKey {
        &self.verification_key
    }

    pub fn verification_key_share(&self) -> VerificationKeyShare {
        VerificationKeyShare::new(self.verification_key.clone(), self.index)
    }
}

/// Generates a fresh key for a single-authority deployment. The resulting share has index 1.
pub fn keygen(params: &Parameters) -> AuthorityKeyShare {
    let attributes = params.max_attributes();

    let x = params.random_scalar();
    let ys = params.n_random_scalars(attributes);

    AuthorityKeyShare::from_keys(params, 1, SecretKey { x, ys })
}

/// Generate a set of n authority keys such that any t of them can jointly issue credentials.
/// The keys are dealt by a trusted party that gets to learn the joint secret.
pub fn ttp_keygen(
    params: &Parameters,
    threshold: u64,
    num_authorities: u64,
) -> Result<Vec<AuthorityKeyShare>> {
    let threshold_params = ThresholdParameters::new(threshold, num_authorities)?;
    let attributes = params.max_attributes();

    // generate polynomials
    let v = Polynomial::new_random(params, threshold_params.threshold() - 1);
    let ws = (0..attributes)
        .map(|_| Polynomial::new_random(params, threshold_params.threshold() - 1))
        .collect::<Vec<_>>();

    let polynomial_indices = (1..=threshold_params.authorities()).collect::<Vec<_>>();

    let keys = polynomial_indices
        .iter()
        .map(|&index| {
            let x = Scalar::from(index);
            let secret_key = SecretKey {
                x: v.evaluate(&x),
                ys: ws.iter().map(|w| w.evaluate(&x)).collect(),
            };
            AuthorityKeyShare::from_keys(params, index, secret_key)
        })
        .collect();

    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheme::aggregation::aggregate_verification_keys;
    use crate::utils::perform_lagrangian_interpolation_at_origin;

    #[test]
    fn keygen_produces_single_authority_share() {
        let params = Parameters::new(3).unwrap();
        let keypair = keygen(&params);

        assert_eq!(keypair.index(), 1);
        assert_eq!(keypair.secret_key().size(), 3);
        assert_eq!(keypair.verification_key().size(), 3);
        assert_eq!(
            keypair.verification_key(),
            &keypair.secret_key().verification_key(&params)
        );
    }

    #[test]
    fn ttp_keygen_rejects_invalid_thresholds() {
        let params = Parameters::new(2).unwrap();

        assert!(matches!(
            ttp_keygen(&params, 0, 3),
            Err(CredentialError::Setup(_))
        ));
        assert!(matches!(
            ttp_keygen(&params, 4, 3),
            Err(CredentialError::Setup(_))
        ));
        assert_eq!(ttp_keygen(&params, 3, 3).unwrap().len(), 3);
    }

    #[test]
    fn any_threshold_subset_recovers_the_same_master_secret() {
        let params = Parameters::new(2).unwrap();
        let keys = ttp_keygen(&params, 3, 5).unwrap();

        let recover = |subset: &[usize]| {
            let indices = subset.iter().map(|&i| keys[i].index()).collect::<Vec<_>>();
            let xs = subset
                .iter()
                .map(|&i| keys[i].secret_key().x)
                .collect::<Vec<_>>();
            perform_lagrangian_interpolation_at_origin(&indices, &xs).unwrap()
        };

        let first = recover(&[0, 1, 2]);
        assert_eq!(first, recover(&[2, 3, 4]));
        assert_eq!(first, recover(&[0, 2, 4]));

        // fewer than threshold shares land on an unrelated value
        let indices = [keys[0].index(), keys[1].index()];
        let xs = [keys[0].secret_key().x, keys[1].secret_key().x];
        assert_ne!(
            first,
            perform_lagrangian_interpolation_at_origin(&indices, &xs).unwrap()
        );

        // and the master verification key matches the master secret
        let shares = keys[..3]
            .iter()
            .map(|k| k.verification_key().clone())
            .collect::<Vec<_>>();
        let master_vk = aggregate_verification_keys(&shares, Some(&[1, 2, 3])).unwrap();
        assert_eq!(master_vk.alpha, params.gen2() * first);
    }

    #[test]
    fn verification_key_bytes_roundtrip() {
        for attributes in [1u32, 3] {
            let params = Parameters::new(attributes).unwrap();
            let keypair = keygen(&params);
            let vk = keypair.verification_key();

            let bytes = vk.to_bytes();
            assert_eq!(&VerificationKey::from_bytes(&bytes).unwrap(), vk);
            assert_eq!(&VerificationKey::try_from_bs58(vk.to_bs58()).unwrap(), vk);
            assert!(VerificationKey::from_bytes(&bytes[..bytes.len() - 1]).is_err());
        }
    }

    #[test]
    fn secret_key_bytes_roundtrip_and_zeroize() {
        let params = Parameters::new(2).unwrap();
        let keypair = keygen(&params);
        let bytes = keypair.secret_key().to_byte_vec();

        let mut recovered = SecretKey::try_from_byte_slice(&bytes).unwrap();
        assert_eq!(recovered.hazmat_to_raw(), keypair.secret_key().hazmat_to_raw());
        assert!(!format!("{recovered:?}").contains(&format!("{:?}", recovered.x)));

        recovered.zeroize();
        assert_eq!(recovered.x, Scalar::ZERO);
        assert_eq!(recovered.size(), 0);
    }
}
