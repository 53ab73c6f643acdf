// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

use crate::config::IssuanceConfig;
use crate::error::{IssuanceError, Result};
use crate::policy::{IssuancePolicy, UnrestrictedIssuance};
use crate::voucher::hash_public_attributes;
use async_trait::async_trait;
use nym_threshold_credentials::{
    blind_sign, ttp_keygen, AuthorityKeyShare, BlindSignRequest, CredentialError,
    PartialSignature, Parameters, SignerIndex, VerificationKey,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Everything an authority needs to process a single blind sign request.
/// The session nonce travels inside the request itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindSignRequestBody {
    pub blind_sign_request: BlindSignRequest,

    pub public_attributes_plain: Vec<String>,
}

impl BlindSignRequestBody {
    pub fn new(blind_sign_request: BlindSignRequest, public_attributes_plain: Vec<String>) -> Self {
        BlindSignRequestBody {
            blind_sign_request,
            public_attributes_plain,
        }
    }
}

/// Signing service of a single authority. It keeps no per-request state.
#[derive(Debug)]
pub struct SigningAuthority {
    name: String,
    params: Arc<Parameters>,
    keys: AuthorityKeyShare,
    policy: Arc<dyn IssuancePolicy>,
}

impl SigningAuthority {
    pub fn new<S: Into<String>>(name: S, params: Arc<Parameters>, keys: AuthorityKeyShare) -> Self {
        SigningAuthority {
            name: name.into(),
            params,
            keys,
            policy: Arc::new(UnrestrictedIssuance),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: Arc<dyn IssuancePolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Deals fresh keys for every authority of the configured deployment.
    pub fn local_deployment(
        params: Arc<Parameters>,
        config: &IssuanceConfig,
    ) -> Result<Vec<SigningAuthority>> {
        config.validate()?;
        let keys = ttp_keygen(&params, config.threshold, config.authorities.len() as u64)?;

        Ok(keys
            .into_iter()
            .map(|keys| {
                let name = config
                    .authority_name(keys.index())
                    .map(ToString::to_string)
                    .unwrap_or_else(|| format!("authority-{}", keys.index()));
                SigningAuthority::new(name, Arc::clone(&params), keys)
            })
            .collect())
    }

    pub fn index(&self) -> SignerIndex {
        self.keys.index()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn verification_key(&self) -> &VerificationKey {
        self.keys.verification_key()
    }

    #[instrument(skip_all, fields(authority = self.keys.index()))]
    pub fn handle_blind_sign(
        &self,
        body: &BlindSignRequestBody,
    ) -> std::result::Result<PartialSignature, CredentialError> {
        let expected_plain = self
            .policy
            .expected_public_attributes(&body.public_attributes_plain)
            .map_err(|reason| {
                warn!("refusing to sign the requested public attributes: {reason}");
                CredentialError::InvalidProofOfKnowledge(reason)
            })?;

        // the request must commit to what this authority expects, not to what the client claimed
        let public_attributes = hash_public_attributes(&expected_plain);
        let blinded = blind_sign(
            &self.params,
            self.keys.secret_key(),
            &body.blind_sign_request,
            &public_attributes,
        )?;

        debug!(
            "issued partial signature over {} private and {} public attributes",
            body.blind_sign_request.num_private_attributes(),
            public_attributes.len()
        );
        Ok(PartialSignature::new(self.keys.index(), blinded))
    }
}

/// Transport towards a single signing authority.
#[async_trait]
pub trait AuthorityClient: Send + Sync {
    fn index(&self) -> SignerIndex;

    fn name(&self) -> &str;

    async fn verification_key(&self) -> Result<VerificationKey>;

    async fn blind_sign(&self, request: &BlindSignRequestBody) -> Result<PartialSignature>;
}

#[async_trait]
impl<T: AuthorityClient + ?Sized> AuthorityClient for Box<T> {
    fn index(&self) -> SignerIndex {
        (**self).index()
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    async fn verification_key(&self) -> Result<VerificationKey> {
        (**self).verification_key().await
    }

    async fn blind_sign(&self, request: &BlindSignRequestBody) -> Result<PartialSignature> {
        (**self).blind_sign(request).await
    }
}

/// In-process authority. Every message goes through its JSON encoding,
/// the same way it would when sent to a remote authority.
#[derive(Debug, Clone)]
pub struct LocalAuthority {
    inner: Arc<SigningAuthority>,
    latency: Option<Duration>,
}

impl LocalAuthority {
    pub fn new(inner: Arc<SigningAuthority>) -> Self {
        LocalAuthority {
            inner,
            latency: None,
        }
    }

    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn transport_error(&self, err: serde_json::Error) -> IssuanceError {
        IssuanceError::AuthorityUnavailable {
            index: self.inner.index(),
            reason: err.to_string(),
        }
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl From<SigningAuthority> for LocalAuthority {
    fn from(authority: SigningAuthority) -> Self {
        LocalAuthority::new(Arc::new(authority))
    }
}

#[async_trait]
impl AuthorityClient for LocalAuthority {
    fn index(&self) -> SignerIndex {
        self.inner.index()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn verification_key(&self) -> Result<VerificationKey> {
        self.simulate_latency().await;
        let raw = serde_json::to_string(self.inner.verification_key())
            .map_err(|err| self.transport_error(err))?;
        serde_json::from_str(&raw).map_err(|err| self.transport_error(err))
    }

    async fn blind_sign(&self, request: &BlindSignRequestBody) -> Result<PartialSignature> {
        let raw_request = serde_json::to_string(request).map_err(|err| self.transport_error(err))?;
        self.simulate_latency().await;

        let received: BlindSignRequestBody =
            serde_json::from_str(&raw_request).map_err(|err| self.transport_error(err))?;
        let partial = self
            .inner
            .handle_blind_sign(&received)
            .map_err(|source| IssuanceError::authority_failure(self.inner.index(), source))?;

        let raw_response =
            serde_json::to_string(&partial).map_err(|err| self.transport_error(err))?;
        serde_json::from_str(&raw_response).map_err(|err| self.transport_error(err))
    }
}
