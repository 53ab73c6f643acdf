// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

#![allow(dead_code)]

use async_trait::async_trait;
use nym_credential_issuance::{
    AuthorityClient, BlindSignRequestBody, CredentialAttributes, IssuanceClient, IssuanceConfig,
    IssuanceError, LocalAuthority, Result, SigningAuthority,
};
use nym_threshold_credentials::{
    generate_session_nonce, keygen, prepare_blind_sign, PartialSignature, Parameters,
    SignerIndex, VerificationKey,
};
use std::sync::Arc;
use std::time::Duration;

pub const AUTHORITY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behaviour {
    Honest,
    // publishes its key, but can't be reached when asked to sign
    Unavailable,
    // never answers the signing request
    Hanging,
    // answers with a share issued for an unrelated request
    Corrupt,
    // answers on behalf of another authority
    Impersonating(SignerIndex),
    // publishes a well formed key generated for more attributes than the deployment uses
    OversizedKey,
}

pub struct TestAuthority {
    inner: LocalAuthority,
    behaviour: Behaviour,
}

#[async_trait]
impl AuthorityClient for TestAuthority {
    fn index(&self) -> SignerIndex {
        self.inner.index()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn verification_key(&self) -> Result<VerificationKey> {
        match self.behaviour {
            Behaviour::OversizedKey => {
                let params = Parameters::new(5).unwrap();
                Ok(keygen(&params).verification_key().clone())
            }
            _ => self.inner.verification_key().await,
        }
    }

    async fn blind_sign(&self, request: &BlindSignRequestBody) -> Result<PartialSignature> {
        match self.behaviour {
            Behaviour::Honest | Behaviour::OversizedKey => self.inner.blind_sign(request).await,
            Behaviour::Unavailable => Err(IssuanceError::AuthorityUnavailable {
                index: self.index(),
                reason: "connection refused".to_string(),
            }),
            Behaviour::Hanging => futures::future::pending().await,
            Behaviour::Corrupt => {
                let params = Parameters::new(4).unwrap();
                let public = request.blind_sign_request.public_attributes();
                let (_, unrelated) = prepare_blind_sign(
                    &params,
                    &[params.random_scalar()],
                    public,
                    &generate_session_nonce(),
                )
                .unwrap();
                let body = BlindSignRequestBody::new(
                    unrelated,
                    request.public_attributes_plain.clone(),
                );
                self.inner.blind_sign(&body).await
            }
            Behaviour::Impersonating(other) => {
                let partial = self.inner.blind_sign(request).await?;
                Ok(PartialSignature::new(other, *partial.blinded_signature()))
            }
        }
    }
}

pub struct Deployment {
    pub config: IssuanceConfig,
    pub params: Arc<Parameters>,
    pub authorities: Vec<Arc<SigningAuthority>>,
}

impl Deployment {
    pub fn new(threshold: u64, authorities: u64) -> Self {
        let config =
            IssuanceConfig::new(threshold, authorities).with_authority_timeout(AUTHORITY_TIMEOUT);
        let params = Arc::new(config.parameters().unwrap());
        let authorities = SigningAuthority::local_deployment(Arc::clone(&params), &config)
            .unwrap()
            .into_iter()
            .map(Arc::new)
            .collect();

        Deployment {
            config,
            params,
            authorities,
        }
    }

    pub fn authority_clients<F>(&self, behaviour: F) -> Vec<TestAuthority>
    where
        F: Fn(SignerIndex) -> Behaviour,
    {
        self.authorities
            .iter()
            .map(|authority| TestAuthority {
                inner: LocalAuthority::new(Arc::clone(authority)),
                behaviour: behaviour(authority.index()),
            })
            .collect()
    }

    pub fn client<F>(&self, behaviour: F) -> IssuanceClient<TestAuthority>
    where
        F: Fn(SignerIndex) -> Behaviour,
    {
        IssuanceClient::from_config(
            &self.config,
            Arc::clone(&self.params),
            self.authority_clients(behaviour),
        )
        .unwrap()
    }

    pub fn honest_client(&self) -> IssuanceClient<TestAuthority> {
        self.client(|_| Behaviour::Honest)
    }

    /// Client for which only the listed authorities respond to signing requests.
    pub fn client_with_responders(
        &self,
        responders: &[SignerIndex],
    ) -> IssuanceClient<TestAuthority> {
        let responders = responders.to_vec();
        self.client(move |index| {
            if responders.contains(&index) {
                Behaviour::Honest
            } else {
                Behaviour::Unavailable
            }
        })
    }
}

pub fn scenario_attributes() -> CredentialAttributes {
    CredentialAttributes::new(
        vec!["serial-abc123".to_string(), "binding-xyz789".to_string()],
        vec!["v1".to_string()],
    )
}
