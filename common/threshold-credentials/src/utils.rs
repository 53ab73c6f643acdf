// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

use core::iter::Sum;
use core::ops::Mul;
use std::ops::Neg;

use bls12_381::hash_to_curve::{ExpandMsgXmd, HashToCurve};
use bls12_381::{
    multi_miller_loop, G1Affine, G1Projective, G2Affine, G2Prepared, G2Projective, Scalar,
};
use ff::Field;
use group::Group;
use sha2::{Digest, Sha512};

use crate::error::{CredentialError, Result};
use crate::scheme::setup::Parameters;
use crate::scheme::SignerIndex;

pub struct Polynomial {
    coefficients: Vec<Scalar>,
}

impl Polynomial {
    // for polynomial of degree n, we generate n+1 values
    // (for example for degree 1, like y = x + 2, we need [2,1])
    pub fn new_random(params: &Parameters, degree: u64) -> Self {
        Polynomial {
            coefficients: params.n_random_scalars((degree + 1) as usize),
        }
    }

    /// Evaluates the polynomial at point x.
    pub fn evaluate(&self, x: &Scalar) -> Scalar {
        let Some(constant_term) = self.coefficients.first() else {
            return Scalar::ZERO;
        };

        // at zero only the constant term survives
        if bool::from(x.is_zero()) {
            return *constant_term;
        }

        self.coefficients
            .iter()
            .enumerate()
            // coefficient[n] * x ^ n
            .map(|(i, coefficient)| coefficient * x.pow_vartime(&[i as u64, 0, 0, 0]))
            .sum()
    }
}

pub fn generate_lagrangian_coefficients_at_origin(points: &[SignerIndex]) -> Result<Vec<Scalar>> {
    let x = Scalar::ZERO;

    points
        .iter()
        .enumerate()
        .map(|(i, point_i)| {
            let mut numerator = Scalar::ONE;
            let mut denominator = Scalar::ONE;
            let xi = Scalar::from(*point_i);

            for (j, point_j) in points.iter().enumerate() {
                if j != i {
                    let xj = Scalar::from(*point_j);

                    // numerator = (x - xs[0]) * ... * (x - xs[j]), j != i
                    numerator *= x - xj;

                    // denominator = (xs[i] - x[0]) * ... * (xs[i] - x[j]), j != i
                    denominator *= xi - xj;
                }
            }

            Option::<Scalar>::from(denominator.invert())
                .map(|inv| numerator * inv)
                .ok_or_else(|| {
                    CredentialError::Interpolation(format!(
                        "index {point_i} appears more than once in the interpolation set"
                    ))
                })
        })
        .collect()
}

/// Performs a Lagrange interpolation at the origin for a polynomial defined by `points` and `values`.
/// It can be used for Scalars, G1 and G2 points as well as whole verification keys.
pub(crate) fn perform_lagrangian_interpolation_at_origin<T>(
    points: &[SignerIndex],
    values: &[T],
) -> Result<T>
where
    T: Sum,
    for<'a> &'a T: Mul<Scalar, Output = T>,
{
    if points.is_empty() || values.is_empty() {
        return Err(CredentialError::Interpolation(
            "Tried to perform lagrangian interpolation for an empty set of coordinates".to_string(),
        ));
    }

    if points.len() != values.len() {
        return Err(CredentialError::Interpolation(
            "Tried to perform lagrangian interpolation for an incomplete set of coordinates"
                .to_string(),
        ));
    }

    let coefficients = generate_lagrangian_coefficients_at_origin(points)?;

    Ok(coefficients
        .into_iter()
        .zip(values.iter())
        .map(|(coeff, val)| val * coeff)
        .sum())
}

// https://datatracker.ietf.org/doc/html/draft-irtf-cfrg-hash-to-curve-11#appendix-J.9.1
const G1_HASH_DOMAIN: &[u8] = b"QUUX-V01-CS02-with-BLS12381G1_XMD:SHA-256_SSWU_RO_";

const SCALAR_HASH_DOMAIN: &[u8] = b"NYM-THRESHOLD-CREDENTIALS-V01-HASH-TO-SCALAR";

pub fn hash_g1<M: AsRef<[u8]>>(msg: M) -> G1Projective {
    <G1Projective as HashToCurve<ExpandMsgXmd<sha2_09::Sha256>>>::hash_to_curve(msg, G1_HASH_DOMAIN)
}

/// Deterministically maps arbitrary bytes, such as a voucher serial string, onto an attribute.
pub fn hash_to_scalar<M: AsRef<[u8]>>(msg: M) -> Scalar {
    let digest = Sha512::new()
        .chain_update(SCALAR_HASH_DOMAIN)
        .chain_update(msg.as_ref())
        .finalize();

    let mut wide = [0u8; 64];
    wide.copy_from_slice(&digest);
    Scalar::from_bytes_wide(&wide)
}

pub fn try_deserialize_scalar_vec(
    expected_len: u64,
    bytes: &[u8],
    err: CredentialError,
) -> Result<Vec<Scalar>> {
    if expected_len.checked_mul(32) != Some(bytes.len() as u64) {
        return Err(err);
    }

    let mut out = Vec::with_capacity(expected_len as usize);
    for chunk in bytes.chunks_exact(32) {
        // safety: chunks_exact guarantees 32 byte long slices
        #[allow(clippy::unwrap_used)]
        let s_bytes: [u8; 32] = chunk.try_into().unwrap();
        match Option::<Scalar>::from(Scalar::from_bytes(&s_bytes)) {
            None => return Err(err),
            Some(scalar) => out.push(scalar),
        }
    }

    Ok(out)
}

pub fn try_deserialize_scalar(bytes: &[u8; 32], err: CredentialError) -> Result<Scalar> {
    Option::<Scalar>::from(Scalar::from_bytes(bytes)).ok_or(err)
}

pub fn try_deserialize_g1_projective(
    bytes: &[u8; 48],
    err: CredentialError,
) -> Result<G1Projective> {
    Option::<G1Affine>::from(G1Affine::from_compressed(bytes))
        .ok_or(err)
        .map(G1Projective::from)
}

pub fn try_deserialize_g2_projective(
    bytes: &[u8; 96],
    err: CredentialError,
) -> Result<G2Projective> {
    Option::<G2Affine>::from(G2Affine::from_compressed(bytes))
        .ok_or(err)
        .map(G2Projective::from)
}

/// Checks whether e(P, Q) * e(-R, S) == id
pub fn check_bilinear_pairing(p: &G1Affine, q: &G2Prepared, r: &G1Affine, s: &G2Prepared) -> bool {
    // a single final exponentiation instead of two separate pairings
    let multi_miller = multi_miller_loop(&[(p, q), (&r.neg(), s)]);
    multi_miller.final_exponentiation().is_identity().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_g1_matches_the_reference_vector() {
        // draft-irtf-cfrg-hash-to-curve-11, appendix J.9.1, empty message
        let expected: [u8; 96] = [
            0x05, 0x29, 0x26, 0xad, 0xd2, 0x20, 0x7b, 0x76, 0xca, 0x4f, 0xa5, 0x7a,
            0x87, 0x34, 0x41, 0x6c, 0x8d, 0xc9, 0x5e, 0x24, 0x50, 0x17, 0x72, 0xc8,
            0x14, 0x27, 0x87, 0x00, 0xee, 0xd6, 0xd1, 0xe4, 0xe8, 0xcf, 0x62, 0xd9,
            0xc0, 0x9d, 0xb0, 0xfa, 0xc3, 0x49, 0x61, 0x2b, 0x75, 0x9e, 0x79, 0xa1,
            0x08, 0xba, 0x73, 0x84, 0x53, 0xbf, 0xed, 0x09, 0xcb, 0x54, 0x6d, 0xbb,
            0x07, 0x83, 0xdb, 0xb3, 0xa5, 0xf1, 0xf5, 0x66, 0xed, 0x67, 0xbb, 0x6b,
            0xe0, 0xe8, 0xc6, 0x7e, 0x2e, 0x81, 0xa4, 0xcc, 0x68, 0xee, 0x29, 0x81,
            0x3b, 0xb7, 0x99, 0x49, 0x98, 0xf3, 0xea, 0xe0, 0xc9, 0xc6, 0xa2, 0x65,
        ];
        let expected = G1Affine::from_uncompressed(&expected).unwrap();

        assert_eq!(G1Affine::from(hash_g1(b"")), expected);
        assert_ne!(hash_g1(b"abc"), hash_g1(b""));
    }

    #[test]
    fn polynomial_evaluation() {
        // y = 42 (it should be 42 regardless of x)
        let poly = Polynomial {
            coefficients: vec![Scalar::from(42)],
        };

        assert_eq!(Scalar::from(42), poly.evaluate(&Scalar::from(1)));
        assert_eq!(Scalar::from(42), poly.evaluate(&Scalar::from(0)));
        assert_eq!(Scalar::from(42), poly.evaluate(&Scalar::from(10)));

        // y = x + 10, at x = 2 (exp: 12)
        let poly = Polynomial {
            coefficients: vec![Scalar::from(10), Scalar::from(1)],
        };
        assert_eq!(Scalar::from(12), poly.evaluate(&Scalar::from(2)));

        // y = x^4 - 5x^2 + 2x - 3, at x = 3 (exp: 39)
        let poly = Polynomial {
            coefficients: vec![
                (-Scalar::from(3)),
                Scalar::from(2),
                (-Scalar::from(5)),
                Scalar::ZERO,
                Scalar::from(1),
            ],
        };
        assert_eq!(Scalar::from(39), poly.evaluate(&Scalar::from(3)));

        // empty polynomial
        let poly = Polynomial {
            coefficients: vec![],
        };
        assert_eq!(Scalar::ZERO, poly.evaluate(&Scalar::from(1)));
    }

    #[test]
    fn performing_lagrangian_scalar_interpolation_at_origin() {
        // x^2 + 3
        // x, f(x):
        // 1, 4,
        // 2, 7,
        // 3, 12,
        let points = vec![1, 2, 3];
        let values = vec![Scalar::from(4), Scalar::from(7), Scalar::from(12)];

        assert_eq!(
            Scalar::from(3),
            perform_lagrangian_interpolation_at_origin(&points, &values).unwrap()
        );

        // x^3 + 3x^2 - 5x + 11
        // x, f(x):
        // 1, 10
        // 2, 21
        // 3, 50
        // 4, 103
        let points = vec![1, 2, 3, 4];
        let values = vec![
            Scalar::from(10),
            Scalar::from(21),
            Scalar::from(50),
            Scalar::from(103),
        ];

        assert_eq!(
            Scalar::from(11),
            perform_lagrangian_interpolation_at_origin(&points, &values).unwrap()
        );

        // more points than it is required
        // x^2 + x + 10
        // x, f(x)
        // 1, 12
        // 2, 16
        // 3, 22
        // 4, 30
        // 5, 40
        let points = vec![1, 2, 3, 4, 5];
        let values = vec![
            Scalar::from(12),
            Scalar::from(16),
            Scalar::from(22),
            Scalar::from(30),
            Scalar::from(40),
        ];

        assert_eq!(
            Scalar::from(10),
            perform_lagrangian_interpolation_at_origin(&points, &values).unwrap()
        );
    }

    #[test]
    fn interpolation_rejects_repeated_points() {
        let points = vec![1, 2, 2];
        let values = vec![Scalar::from(4), Scalar::from(7), Scalar::from(7)];

        assert!(matches!(
            perform_lagrangian_interpolation_at_origin(&points, &values),
            Err(CredentialError::Interpolation(_))
        ));
    }

    #[test]
    fn hashing_to_scalar_is_deterministic() {
        assert_eq!(hash_to_scalar("serial-abc123"), hash_to_scalar("serial-abc123"));
        assert_ne!(hash_to_scalar("serial-abc123"), hash_to_scalar("binding-xyz789"));
    }
}
