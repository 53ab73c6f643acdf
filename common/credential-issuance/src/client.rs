// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

use crate::authority::{AuthorityClient, BlindSignRequestBody};
use crate::config::IssuanceConfig;
use crate::error::{IssuanceError, Result};
use crate::session::{IssuanceSession, IssuanceState};
use crate::voucher::CredentialAttributes;
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use nym_threshold_credentials::{
    aggregate_key_shares, aggregate_signature_shares_and_verify, check_vk_pairing,
    generate_session_nonce, prepare_blind_sign, prove_credential, CredentialError, Parameters,
    PartialSignature, PresentationProof, Signature, SignatureShare, SignerIndex,
    ThresholdParameters, VerificationKey, VerificationKeyShare,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Verification keys of a deployment: the aggregated master key and the partial keys
/// of every authority whose share passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentKeys {
    pub master_key: VerificationKey,
    pub partial_keys: BTreeMap<SignerIndex, VerificationKey>,
}

impl DeploymentKeys {
    pub fn partial_key(&self, index: SignerIndex) -> Option<&VerificationKey> {
        self.partial_keys.get(&index)
    }

    pub fn signers(&self) -> Vec<SignerIndex> {
        self.partial_keys.keys().copied().collect()
    }
}

/// Credential aggregated out of the shares of at least `threshold` authorities.
#[derive(Debug, Clone)]
pub struct IssuedCredential {
    signature: Signature,
    attributes: CredentialAttributes,
    signers: Vec<SignerIndex>,
}

impl IssuedCredential {
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn attributes(&self) -> &CredentialAttributes {
        &self.attributes
    }

    pub fn public_attributes_plain(&self) -> &[String] {
        self.attributes.public_attributes_plain()
    }

    /// Authorities whose shares went into the credential.
    pub fn signers(&self) -> &[SignerIndex] {
        &self.signers
    }

    /// Builds a fresh, unlinkable presentation of this credential.
    pub fn prepare_presentation(
        &self,
        params: &Parameters,
        verification_key: &VerificationKey,
    ) -> Result<PresentationProof> {
        Ok(prove_credential(
            params,
            verification_key,
            &self.signature,
            &self.attributes.private_attributes()?,
            &self.attributes.public_attributes(),
        )?)
    }
}

pub struct IssuanceClient<C> {
    params: Arc<Parameters>,
    threshold_params: ThresholdParameters,
    authorities: Vec<C>,
    authority_timeout: Duration,
}

impl<C> IssuanceClient<C>
where
    C: AuthorityClient,
{
    pub fn new(
        params: Arc<Parameters>,
        threshold_params: ThresholdParameters,
        authorities: Vec<C>,
        authority_timeout: Duration,
    ) -> Self {
        IssuanceClient {
            params,
            threshold_params,
            authorities,
            authority_timeout,
        }
    }

    pub fn from_config(
        config: &IssuanceConfig,
        params: Arc<Parameters>,
        authorities: Vec<C>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(IssuanceClient::new(
            params,
            config.threshold_parameters()?,
            authorities,
            config.authority_timeout,
        ))
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    pub fn shared_params(&self) -> Arc<Parameters> {
        Arc::clone(&self.params)
    }

    pub fn threshold_params(&self) -> ThresholdParameters {
        self.threshold_params
    }

    pub fn authorities(&self) -> &[C] {
        &self.authorities
    }

    async fn query_verification_key(&self, authority: &C) -> Result<VerificationKeyShare> {
        let index = authority.index();
        let key = timeout(self.authority_timeout, authority.verification_key())
            .await
            .map_err(|_| IssuanceError::AuthorityTimeout {
                index,
                timeout: self.authority_timeout,
            })??;

        // a share of any other size can't be aggregated with the honest ones
        if key.size() != self.params.max_attributes() || !check_vk_pairing(&self.params, &key) {
            return Err(IssuanceError::InvalidVerificationKeyShare { index });
        }
        Ok(VerificationKeyShare::new(key, index))
    }

    /// Contacts every authority for its partial verification key and aggregates the valid ones.
    #[instrument(skip_all)]
    pub async fn obtain_verification_key(&self) -> Result<DeploymentKeys> {
        let mut responses = self
            .authorities
            .iter()
            .map(|authority| async move {
                (authority.index(), self.query_verification_key(authority).await)
            })
            .collect::<FuturesUnordered<_>>();

        let mut shares = Vec::with_capacity(self.authorities.len());
        while let Some((index, response)) = responses.next().await {
            match response {
                Ok(share) => shares.push(share),
                Err(err) => warn!("excluding authority {index} from the key aggregation: {err}"),
            }
        }
        shares.sort_by_key(|share| share.index());

        if (shares.len() as u64) < self.threshold_params.threshold() {
            return Err(CredentialError::InsufficientShares {
                threshold: self.threshold_params.threshold(),
                received: shares.len(),
            }
            .into());
        }

        let master_key = aggregate_key_shares(&self.threshold_params, &shares)?;
        let partial_keys = shares
            .into_iter()
            .map(|share| (share.index(), share.key().clone()))
            .collect::<BTreeMap<_, _>>();
        debug!(
            "aggregated master verification key out of {} partial keys",
            partial_keys.len()
        );

        Ok(DeploymentKeys {
            master_key,
            partial_keys,
        })
    }

    async fn request_partial_signature(
        &self,
        authority: &C,
        body: &BlindSignRequestBody,
    ) -> Result<PartialSignature> {
        let index = authority.index();
        let partial = timeout(self.authority_timeout, authority.blind_sign(body))
            .await
            .map_err(|_| IssuanceError::AuthorityTimeout {
                index,
                timeout: self.authority_timeout,
            })??;

        if partial.index() != index {
            return Err(IssuanceError::MismatchedAuthorityIndex {
                expected: index,
                received: partial.index(),
            });
        }
        Ok(partial)
    }

    /// Runs a single issuance attempt: the request is sent to every authority concurrently and
    /// the attempt completes as soon as any `threshold` of them returned valid shares.
    /// Outstanding requests are dropped at that point.
    #[instrument(skip_all)]
    pub async fn issue_credential(
        &self,
        keys: &DeploymentKeys,
        attributes: &CredentialAttributes,
        cancel: &CancellationToken,
    ) -> Result<IssuedCredential> {
        let mut session = IssuanceSession::default();
        match self
            .run_issuance(&mut session, keys, attributes, cancel)
            .await
        {
            Ok(credential) => Ok(credential),
            Err(err) => {
                debug!("issuance attempt failed in state {:?}", session.state());
                if session.can_advance_to(IssuanceState::Failed) {
                    session.advance(IssuanceState::Failed)?;
                }
                Err(err)
            }
        }
    }

    async fn run_issuance(
        &self,
        session: &mut IssuanceSession,
        keys: &DeploymentKeys,
        attributes: &CredentialAttributes,
        cancel: &CancellationToken,
    ) -> Result<IssuedCredential> {
        let threshold = self.threshold_params.threshold();
        let private_attributes = attributes.private_attributes()?;
        let public_attributes = attributes.public_attributes();

        let session_nonce = generate_session_nonce();
        let (openings, blind_sign_request) = prepare_blind_sign(
            &self.params,
            &private_attributes,
            &public_attributes,
            &session_nonce,
        )?;
        session.advance(IssuanceState::CommitmentsBuilt)?;

        let commitment_hash = *blind_sign_request.commitment_hash();
        let body = BlindSignRequestBody::new(
            blind_sign_request,
            attributes.public_attributes_plain().to_vec(),
        );

        let mut pending = FuturesUnordered::new();
        for authority in &self.authorities {
            let index = authority.index();
            if keys.partial_key(index).is_none() {
                warn!("authority {index} has no valid verification key, not contacting it");
                continue;
            }
            let body = &body;
            pending.push(async move {
                (index, self.request_partial_signature(authority, body).await)
            });
        }
        session.advance(IssuanceState::RequestsSent)?;

        let mut shares: Vec<SignatureShare> = Vec::with_capacity(threshold as usize);
        while (shares.len() as u64) < threshold {
            // not enough authorities left to ever reach the threshold
            if ((shares.len() + pending.len()) as u64) < threshold {
                break;
            }

            let (index, response) = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("issuance attempt has been cancelled");
                    return Err(IssuanceError::IssuanceAborted);
                }
                next = pending.next() => match next {
                    Some(next) => next,
                    None => break,
                },
            };

            let share = response.and_then(|partial| {
                let partial_key = keys
                    .partial_key(index)
                    .ok_or(IssuanceError::InvalidVerificationKeyShare { index })?;
                partial
                    .unblind_and_verify(
                        &self.params,
                        partial_key,
                        &private_attributes,
                        &public_attributes,
                        &commitment_hash,
                        &openings,
                    )
                    .map_err(|source| IssuanceError::authority_failure(index, source))
            });

            match share {
                Ok(share) => {
                    debug!("obtained a valid signature share from authority {index}");
                    shares.push(share)
                }
                Err(err) if err.is_recoverable_per_authority() => {
                    warn!("excluding authority {index} from this issuance attempt: {err}")
                }
                Err(err) => return Err(err),
            }
        }
        // cancels whatever is still in flight
        drop(pending);
        drop(openings);

        if (shares.len() as u64) < threshold {
            return Err(CredentialError::InsufficientShares {
                threshold,
                received: shares.len(),
            }
            .into());
        }
        session.advance(IssuanceState::PartialSharesCollected)?;
        session.advance(IssuanceState::Unblinded)?;

        let mut all_attributes = private_attributes;
        all_attributes.extend_from_slice(&public_attributes);
        let signature = aggregate_signature_shares_and_verify(
            &self.params,
            &self.threshold_params,
            &keys.master_key,
            &all_attributes,
            &shares,
        )?;
        session.advance(IssuanceState::Aggregated)?;

        let signature = signature.randomise_simple(&self.params);
        session.advance(IssuanceState::Randomized)?;

        let mut signers = shares.iter().map(|share| share.index()).collect::<Vec<_>>();
        signers.sort_unstable();
        info!("aggregated credential out of shares from authorities {signers:?}");
        session.advance(IssuanceState::Ready)?;

        Ok(IssuedCredential {
            signature,
            attributes: attributes.clone(),
            signers,
        })
    }
}
