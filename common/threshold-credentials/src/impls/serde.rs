// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

use crate::scheme::double_use::BlindedSerialNumber;
use crate::scheme::issuance::BlindSignRequest;
use crate::scheme::keygen::VerificationKey;
use crate::scheme::verification::PresentationProof;
use crate::scheme::{BlindedSignature, PartialSignature, Signature, SignatureShare};
use crate::traits::Base58;
use serde::de::Unexpected;
use serde::{de::Error, de::Visitor, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

macro_rules! impl_serde {
    ($struct:ident, $visitor:ident) => {
        pub struct $visitor {}

        impl Serialize for $struct {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                serializer.serialize_str(&self.to_bs58())
            }
        }

        impl<'de> Visitor<'de> for $visitor {
            type Value = $struct;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(formatter, "A base58 encoded {}", stringify!($struct))
            }

            fn visit_str<E: Error>(self, s: &str) -> Result<Self::Value, E> {
                match $struct::try_from_bs58(s) {
                    Ok(x) => Ok(x),
                    Err(_) => Err(Error::invalid_value(Unexpected::Str(s), &self)),
                }
            }
        }

        impl<'de> Deserialize<'de> for $struct {
            fn deserialize<D>(deserializer: D) -> Result<$struct, D::Error>
            where
                D: Deserializer<'de>,
            {
                deserializer.deserialize_str($visitor {})
            }
        }
    };
}

impl_serde!(BlindSignRequest, V1);
impl_serde!(BlindedSignature, V2);
impl_serde!(PartialSignature, V3);
impl_serde!(SignatureShare, V4);
impl_serde!(Signature, V5);
impl_serde!(PresentationProof, V6);
impl_serde!(VerificationKey, V7);
impl_serde!(BlindedSerialNumber, V8);
