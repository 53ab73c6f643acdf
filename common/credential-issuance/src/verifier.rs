// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

use crate::config::VerifierConfig;
use crate::error::{IssuanceError, Result};
use crate::voucher::hash_public_attributes;
use async_trait::async_trait;
use nym_threshold_credentials::{
    BlindedSerialNumber, Parameters, PresentationProof, RevealedValues, VerificationKey,
};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

/// Record of serial numbers revealed by accepted presentations.
#[async_trait]
pub trait SpentLedger: Send + Sync {
    /// Atomically records the serial number.
    /// Returns `false` if it has already been recorded before.
    async fn try_mark_spent(&self, serial_number: &BlindedSerialNumber) -> Result<bool>;

    async fn is_spent(&self, serial_number: &BlindedSerialNumber) -> Result<bool>;
}

#[async_trait]
impl<L: SpentLedger + ?Sized> SpentLedger for Arc<L> {
    async fn try_mark_spent(&self, serial_number: &BlindedSerialNumber) -> Result<bool> {
        (**self).try_mark_spent(serial_number).await
    }

    async fn is_spent(&self, serial_number: &BlindedSerialNumber) -> Result<bool> {
        (**self).is_spent(serial_number).await
    }
}

#[derive(Debug, Default)]
pub struct InMemorySpentLedger {
    spent: RwLock<HashSet<BlindedSerialNumber>>,
}

impl InMemorySpentLedger {
    pub fn new() -> Self {
        Default::default()
    }

    pub async fn len(&self) -> usize {
        self.spent.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.spent.read().await.is_empty()
    }
}

#[async_trait]
impl SpentLedger for InMemorySpentLedger {
    async fn try_mark_spent(&self, serial_number: &BlindedSerialNumber) -> Result<bool> {
        Ok(self.spent.write().await.insert(*serial_number))
    }

    async fn is_spent(&self, serial_number: &BlindedSerialNumber) -> Result<bool> {
        Ok(self.spent.read().await.contains(serial_number))
    }
}

pub struct CredentialVerifier<L> {
    params: Arc<Parameters>,
    verification_key: VerificationKey,
    ledger: L,
    config: VerifierConfig,
}

impl<L> CredentialVerifier<L>
where
    L: SpentLedger,
{
    pub fn new(
        params: Arc<Parameters>,
        verification_key: VerificationKey,
        ledger: L,
        config: VerifierConfig,
    ) -> Self {
        CredentialVerifier {
            params,
            verification_key,
            ledger,
            config,
        }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Verifies the presentation without recording anything.
    pub fn verify(
        &self,
        proof: &PresentationProof,
        expected_public_attributes_plain: &[String],
    ) -> Result<RevealedValues> {
        let expected = hash_public_attributes(expected_public_attributes_plain);
        Ok(proof.verify_and_reveal(&self.params, &self.verification_key, &expected)?)
    }

    /// Verifies the presentation and records its serial number in the spent ledger.
    /// A serial number seen before results in [`IssuanceError::AlreadySpent`].
    #[instrument(skip_all)]
    pub async fn verify_and_spend(
        &self,
        proof: &PresentationProof,
        expected_public_attributes_plain: &[String],
    ) -> Result<RevealedValues> {
        let revealed = self.verify(proof, expected_public_attributes_plain)?;

        match &revealed.blinded_serial_number {
            Some(serial_number) => {
                if !self.ledger.try_mark_spent(serial_number).await? {
                    warn!("rejecting double spend of {serial_number}");
                    return Err(IssuanceError::AlreadySpent {
                        serial: serial_number.to_string(),
                    });
                }
                debug!("accepted credential with serial number {serial_number}");
            }
            None if self.config.require_serial_number => {
                return Err(IssuanceError::MissingSerialNumber)
            }
            None => debug!("accepted credential without a serial number"),
        }

        Ok(revealed)
    }
}
