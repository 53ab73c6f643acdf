// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

use bls12_381::{G1Affine, G2Affine, G2Prepared, Scalar};
use ff::Field;
use group::Curve;
use itertools::Itertools;
use rand::thread_rng;

use crate::error::{CredentialError, Result};
use crate::scheme::SignerIndex;
use crate::utils::hash_g1;

#[derive(Debug)]
pub struct Parameters {
    /// Generator of the G1 group
    g1: G1Affine,
    /// Additional generators of the G1 group, one per supported attribute
    hs: Vec<G1Affine>,
    /// Generator of the G2 group
    g2: G2Affine,
    /// Precomputed G2 generator used for the miller loop
    _g2_prepared_miller: G2Prepared,
}

impl Parameters {
    pub fn new(num_attributes: u32) -> Result<Parameters> {
        if num_attributes == 0 {
            return Err(CredentialError::Setup(
                "Tried to setup the scheme for 0 attributes".to_string(),
            ));
        }

        let hs = (1..=num_attributes)
            .map(|i| hash_g1(format!("h{i}")).to_affine())
            .collect();

        Ok(Parameters {
            g1: G1Affine::generator(),
            hs,
            g2: G2Affine::generator(),
            _g2_prepared_miller: G2Prepared::from(G2Affine::generator()),
        })
    }

    pub(crate) fn gen1(&self) -> &G1Affine {
        &self.g1
    }

    pub(crate) fn gen2(&self) -> &G2Affine {
        &self.g2
    }

    pub(crate) fn gen_hs(&self) -> &[G1Affine] {
        &self.hs
    }

    pub(crate) fn hs_bytes(&self) -> Vec<[u8; 48]> {
        self.hs.iter().map(|h| h.to_compressed()).collect()
    }

    /// Maximum number of attributes (private and public combined) a credential can carry.
    pub fn max_attributes(&self) -> usize {
        self.hs.len()
    }

    pub fn random_scalar(&self) -> Scalar {
        // lazily-initialized thread-local random number generator, seeded by the system
        let mut rng = thread_rng();
        Scalar::random(&mut rng)
    }

    pub fn n_random_scalars(&self, n: usize) -> Vec<Scalar> {
        (0..n).map(|_| self.random_scalar()).collect()
    }

    pub(crate) fn prepared_miller_g2(&self) -> &G2Prepared {
        &self._g2_prepared_miller
    }
}

pub fn setup(num_attributes: u32) -> Result<Parameters> {
    Parameters::new(num_attributes)
}

/// Shape of a (t, n)-threshold deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdParameters {
    threshold: u64,
    authorities: u64,
}

impl ThresholdParameters {
    pub fn new(threshold: u64, authorities: u64) -> Result<Self> {
        if threshold == 0 {
            return Err(CredentialError::Setup(
                "the signing threshold must be at least 1".to_string(),
            ));
        }
        if threshold > authorities {
            return Err(CredentialError::Setup(format!(
                "the signing threshold ({threshold}) can't be higher than the number of authorities ({authorities})"
            )));
        }
        Ok(ThresholdParameters {
            threshold,
            authorities,
        })
    }

    /// The degenerate, single authority deployment.
    pub fn single_authority() -> Self {
        ThresholdParameters {
            threshold: 1,
            authorities: 1,
        }
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    pub fn authorities(&self) -> u64 {
        self.authorities
    }

    /// Ensures the indices are distinct, lie within `[1, n]` and that there are at least `t` of them.
    pub fn check_index_set(&self, indices: &[SignerIndex]) -> Result<()> {
        if let Some(out_of_range) = indices
            .iter()
            .find(|&&index| index == 0 || index > self.authorities)
        {
            return Err(CredentialError::InvalidIndexSet(format!(
                "index {out_of_range} is outside the [1, {}] range",
                self.authorities
            )));
        }

        if let Some(duplicate) = indices.iter().duplicates().next() {
            return Err(CredentialError::InvalidIndexSet(format!(
                "index {duplicate} has been provided more than once"
            )));
        }

        if (indices.len() as u64) < self.threshold {
            return Err(CredentialError::InsufficientShares {
                threshold: self.threshold,
                received: indices.len(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_requires_at_least_one_attribute() {
        assert!(setup(0).is_err());
        assert_eq!(setup(3).unwrap().max_attributes(), 3);
    }

    #[test]
    fn threshold_must_be_within_authority_count() {
        assert!(ThresholdParameters::new(0, 5).is_err());
        assert!(ThresholdParameters::new(6, 5).is_err());
        assert!(ThresholdParameters::new(5, 5).is_ok());
        assert_eq!(
            ThresholdParameters::new(1, 1).unwrap(),
            ThresholdParameters::single_authority()
        );
    }

    #[test]
    fn index_set_validation() {
        let params = ThresholdParameters::new(3, 5).unwrap();

        assert!(params.check_index_set(&[1, 3, 4]).is_ok());
        assert!(params.check_index_set(&[5, 4, 3, 2, 1]).is_ok());

        assert!(matches!(
            params.check_index_set(&[1, 2]),
            Err(CredentialError::InsufficientShares {
                threshold: 3,
                received: 2
            })
        ));
        assert!(matches!(
            params.check_index_set(&[1, 1, 2]),
            Err(CredentialError::InvalidIndexSet(_))
        ));
        assert!(matches!(
            params.check_index_set(&[0, 1, 2]),
            Err(CredentialError::InvalidIndexSet(_))
        ));
        assert!(matches!(
            params.check_index_set(&[1, 2, 6]),
            Err(CredentialError::InvalidIndexSet(_))
        ));
    }
}
