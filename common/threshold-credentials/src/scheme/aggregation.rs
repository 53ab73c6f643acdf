// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

use core::iter::Sum;
use core::ops::Mul;

use bls12_381::{G2Prepared, G2Projective, Scalar};
use group::{Curve, Group};
use itertools::Itertools;
use tracing::{debug, warn};

use crate::error::{CredentialError, Result};
use crate::scheme::keygen::{VerificationKey, VerificationKeyShare};
use crate::scheme::setup::{Parameters, ThresholdParameters};
use crate::scheme::{Signature, SignatureShare, SignerIndex};
use crate::utils::{check_bilinear_pairing, perform_lagrangian_interpolation_at_origin};
use crate::Attribute;

pub(crate) trait Aggregatable: Sized {
    fn aggregate(aggregatable: &[Self], indices: Option<&[SignerIndex]>) -> Result<Self>;

    fn check_unique_indices(indices: &[SignerIndex]) -> bool {
        // if aggregation is a threshold one, all indices should be unique
        indices.iter().unique_by(|&index| index).count() == indices.len()
    }
}

impl<T> Aggregatable for T
where
    T: Sum,
    for<'a> T: Sum<&'a T>,
    for<'a> &'a T: Mul<Scalar, Output = T>,
{
    fn aggregate(aggregatable: &[T], indices: Option<&[SignerIndex]>) -> Result<T> {
        if aggregatable.is_empty() {
            return Err(CredentialError::Aggregation(
                "Empty set of values".to_string(),
            ));
        }

        if let Some(indices) = indices {
            if !Self::check_unique_indices(indices) {
                return Err(CredentialError::InvalidIndexSet(
                    "Non-unique indices".to_string(),
                ));
            }
            perform_lagrangian_interpolation_at_origin(indices, aggregatable)
        } else {
            // non-threshold
            Ok(aggregatable.iter().sum())
        }
    }
}

/// Ensures all provided verification keys were generated to verify the same number of attributes.
fn check_same_key_size(keys: &[VerificationKey]) -> bool {
    keys.iter().map(|vk| vk.beta_g1.len()).all_equal()
        && keys.iter().map(|vk| vk.beta_g2.len()).all_equal()
        && keys
            .iter()
            .all(|vk| vk.beta_g1.len() == vk.beta_g2.len())
}

pub fn aggregate_verification_keys(
    keys: &[VerificationKey],
    indices: Option<&[SignerIndex]>,
) -> Result<VerificationKey> {
    if !check_same_key_size(keys) {
        return Err(CredentialError::InconsistentKeySize);
    }
    Aggregatable::aggregate(keys, indices)
}

/// Recovers the master verification key out of the partial keys published by at least
/// `threshold` distinct authorities.
pub fn aggregate_key_shares(
    threshold_params: &ThresholdParameters,
    shares: &[VerificationKeyShare],
) -> Result<VerificationKey> {
    let (keys, indices): (Vec<_>, Vec<_>) = shares
        .iter()
        .map(|share| (share.key().clone(), share.index()))
        .unzip();

    threshold_params.check_index_set(&indices)?;
    aggregate_verification_keys(&keys, Some(&indices))
}

/// Combines at least `threshold` unblinded signature shares into the credential signature.
/// Every share must have been issued for the same commitment hash.
pub fn aggregate_signature_shares(
    threshold_params: &ThresholdParameters,
    shares: &[SignatureShare],
) -> Result<Signature> {
    let indices = shares.iter().map(|share| share.index()).collect::<Vec<_>>();
    threshold_params.check_index_set(&indices)?;

    let h = *shares
        .first()
        .ok_or(CredentialError::InsufficientShares {
            threshold: threshold_params.threshold(),
            received: 0,
        })?
        .signature()
        .sig1();

    if bool::from(h.is_identity()) {
        return Err(CredentialError::Aggregation(
            "the signature shares were issued for an identity commitment hash".to_string(),
        ));
    }

    if let Some(inconsistent) = shares.iter().find(|share| share.signature().sig1() != &h) {
        warn!(
            "signature share from authority {} has been issued for a different attribute set",
            inconsistent.index()
        );
        return Err(CredentialError::InconsistentAttributeSet {
            index: inconsistent.index(),
        });
    }

    let sigmas = shares
        .iter()
        .map(|share| *share.signature().sig2())
        .collect::<Vec<_>>();
    let aggr_sigma = Aggregatable::aggregate(&sigmas, Some(&indices))?;

    debug!("aggregated {} signature shares", shares.len());
    Ok(Signature(h, aggr_sigma))
}

/// Aggregates the shares and ensures the result is a valid signature on `attributes`
/// (private attributes followed by the public ones) under the master verification key.
pub fn aggregate_signature_shares_and_verify(
    params: &Parameters,
    threshold_params: &ThresholdParameters,
    verification_key: &VerificationKey,
    attributes: &[Attribute],
    shares: &[SignatureShare],
) -> Result<Signature> {
    if attributes.len() > verification_key.beta_g2.len() {
        return Err(CredentialError::Aggregation(format!(
            "tried to verify {} attributes with a key supporting only {}",
            attributes.len(),
            verification_key.beta_g2.len()
        )));
    }

    let signature = aggregate_signature_shares(threshold_params, shares)?;

    // Verify the signature
    let tmp = attributes
        .iter()
        .zip(verification_key.beta_g2.iter())
        .map(|(attr, beta_i)| beta_i * attr)
        .sum::<G2Projective>();

    if !check_bilinear_pairing(
        &signature.0.to_affine(),
        &G2Prepared::from((verification_key.alpha + tmp).to_affine()),
        &signature.1.to_affine(),
        params.prepared_miller_g2(),
    ) {
        return Err(CredentialError::Aggregation(
            "Verification of the aggregated signature failed".to_string(),
        ));
    }
    Ok(signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheme::issuance::sign;
    use crate::scheme::keygen::{keygen, ttp_keygen};
    use crate::tests::helpers::random_scalars;
    use crate::verify;
    use bls12_381::G1Projective;

    fn shares_for(
        keys: &[crate::AuthorityKeyShare],
        attributes: &[Attribute],
    ) -> Vec<SignatureShare> {
        // a shared h is what blind signing would normally guarantee
        let h = crate::utils::hash_g1(b"aggregation test");
        keys.iter()
            .map(|key| {
                let sk = key.secret_key();
                let s = h * (sk.x
                    + attributes
                        .iter()
                        .zip(sk.ys.iter())
                        .map(|(m, y)| m * y)
                        .sum::<Scalar>());
                SignatureShare::new(Signature(h, s), key.index())
            })
            .collect()
    }

    #[test]
    fn key_aggregation_works_for_any_subset() {
        let params = Parameters::new(3).unwrap();
        let threshold_params = ThresholdParameters::new(3, 5).unwrap();
        let keys = ttp_keygen(&params, 3, 5).unwrap();
        let vk_shares = keys
            .iter()
            .map(|k| k.verification_key_share())
            .collect::<Vec<_>>();

        let first = aggregate_key_shares(&threshold_params, &vk_shares[..3]).unwrap();
        let second = aggregate_key_shares(&threshold_params, &vk_shares[2..]).unwrap();
        let everyone = aggregate_key_shares(&threshold_params, &vk_shares).unwrap();

        assert_eq!(first, second);
        assert_eq!(first, everyone);
    }

    #[test]
    fn key_aggregation_rejects_mismatched_sizes() {
        let params_small = Parameters::new(1).unwrap();
        let params_big = Parameters::new(2).unwrap();

        let keys = [
            keygen(&params_small).verification_key().clone(),
            keygen(&params_big).verification_key().clone(),
        ];

        assert!(matches!(
            aggregate_verification_keys(&keys, Some(&[1, 2])),
            Err(CredentialError::InconsistentKeySize)
        ));
    }

    #[test]
    fn key_aggregation_rejects_bad_index_sets() {
        let params = Parameters::new(1).unwrap();
        let threshold_params = ThresholdParameters::new(2, 3).unwrap();
        let keys = ttp_keygen(&params, 2, 3).unwrap();
        let vk_shares = keys
            .iter()
            .map(|k| k.verification_key_share())
            .collect::<Vec<_>>();

        assert!(matches!(
            aggregate_key_shares(&threshold_params, &vk_shares[..1]),
            Err(CredentialError::InsufficientShares { .. })
        ));

        let duplicated = [vk_shares[0].clone(), vk_shares[0].clone()];
        assert!(matches!(
            aggregate_key_shares(&threshold_params, &duplicated),
            Err(CredentialError::InvalidIndexSet(_))
        ));

        assert!(aggregate_verification_keys(&[], None).is_err());
    }

    #[test]
    fn signature_aggregation_is_independent_of_the_subset() {
        let params = Parameters::new(2).unwrap();
        let threshold_params = ThresholdParameters::new(3, 5).unwrap();
        let attributes = random_scalars!(params, 2);

        let keys = ttp_keygen(&params, 3, 5).unwrap();
        let vk_shares = keys
            .iter()
            .map(|k| k.verification_key_share())
            .collect::<Vec<_>>();
        let master_vk = aggregate_key_shares(&threshold_params, &vk_shares).unwrap();

        let shares = shares_for(&keys, &attributes);

        let subsets: [&[usize]; 3] = [&[0, 1, 2], &[0, 2, 4], &[2, 3, 4]];
        let signatures = subsets
            .iter()
            .map(|subset| {
                let chosen = subset.iter().map(|&i| shares[i]).collect::<Vec<_>>();
                aggregate_signature_shares_and_verify(
                    &params,
                    &threshold_params,
                    &master_vk,
                    &attributes,
                    &chosen,
                )
                .unwrap()
            })
            .collect::<Vec<_>>();

        assert!(signatures.iter().all_equal());
        assert!(verify(&params, &master_vk, &attributes, &signatures[0]));
    }

    #[test]
    fn signature_aggregation_requires_consistent_commitment_hash() {
        let params = Parameters::new(1).unwrap();
        let threshold_params = ThresholdParameters::new(2, 3).unwrap();
        let attributes = random_scalars!(params, 1);
        let keys = ttp_keygen(&params, 2, 3).unwrap();

        let mut shares = shares_for(&keys, &attributes);
        let sig = sign(&params, keys[1].secret_key(), &attributes).unwrap();
        shares[1] = SignatureShare::new(sig, keys[1].index());

        assert!(matches!(
            aggregate_signature_shares(&threshold_params, &shares),
            Err(CredentialError::InconsistentAttributeSet { index: 2 })
        ));
    }

    #[test]
    fn tampered_share_fails_aggregated_verification() {
        let params = Parameters::new(1).unwrap();
        let threshold_params = ThresholdParameters::new(2, 3).unwrap();
        let attributes = random_scalars!(params, 1);
        let keys = ttp_keygen(&params, 2, 3).unwrap();
        let vk_shares = keys
            .iter()
            .map(|k| k.verification_key_share())
            .collect::<Vec<_>>();
        let master_vk = aggregate_key_shares(&threshold_params, &vk_shares).unwrap();

        let mut shares = shares_for(&keys, &attributes);
        let tampered = shares[0].signature();
        shares[0] = SignatureShare::new(
            Signature(tampered.0, tampered.1 + G1Projective::generator()),
            shares[0].index(),
        );

        assert!(matches!(
            aggregate_signature_shares_and_verify(
                &params,
                &threshold_params,
                &master_vk,
                &attributes,
                &shares[..2],
            ),
            Err(CredentialError::Aggregation(_))
        ));

        // aggregation itself still succeeds, the result just doesn't verify
        let aggregated = aggregate_signature_shares(&threshold_params, &shares[..2]).unwrap();
        assert!(!verify(&params, &master_vk, &attributes, &aggregated));
    }

    #[test]
    fn single_authority_aggregation_is_the_identity() {
        let params = Parameters::new(2).unwrap();
        let keypair = keygen(&params);
        let attributes = random_scalars!(params, 2);
        let sig = sign(&params, keypair.secret_key(), &attributes).unwrap();

        let aggregated = aggregate_signature_shares_and_verify(
            &params,
            &ThresholdParameters::single_authority(),
            keypair.verification_key(),
            &attributes,
            &[SignatureShare::new(sig, keypair.index())],
        )
        .unwrap();
        assert_eq!(aggregated, sig);
    }
}
