// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use nym_credential_issuance::{
    AuthorityClient, BlindSignRequestBody, IssuanceClient, IssuanceConfig, IssuanceError,
    LocalAuthority, SigningAuthority,
};
use nym_threshold_credentials::{PartialSignature, SignerIndex, VerificationKey};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Local authority that can be switched off to simulate an unreachable signer.
pub(crate) struct DemoAuthority {
    inner: LocalAuthority,
    online: bool,
}

#[async_trait]
impl AuthorityClient for DemoAuthority {
    fn index(&self) -> SignerIndex {
        self.inner.index()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn verification_key(&self) -> nym_credential_issuance::Result<VerificationKey> {
        self.inner.verification_key().await
    }

    async fn blind_sign(
        &self,
        request: &BlindSignRequestBody,
    ) -> nym_credential_issuance::Result<PartialSignature> {
        if !self.online {
            return Err(IssuanceError::AuthorityUnavailable {
                index: self.index(),
                reason: "the authority is offline".to_string(),
            });
        }
        self.inner.blind_sign(request).await
    }
}

pub(crate) fn load_config(path: &Path) -> anyhow::Result<IssuanceConfig> {
    if path.exists() {
        Ok(IssuanceConfig::read_from_toml_file(path)?)
    } else {
        warn!(
            "config file {} does not exist, using a default 3-out-of-5 deployment",
            path.display()
        );
        Ok(IssuanceConfig::new(3, 5))
    }
}

/// Deals keys for every configured authority and builds a client talking to them in-process.
pub(crate) fn local_issuance_client(
    config: &IssuanceConfig,
    offline: &[SignerIndex],
    latency: Option<Duration>,
) -> anyhow::Result<IssuanceClient<DemoAuthority>> {
    let params = Arc::new(config.parameters()?);
    let authorities = SigningAuthority::local_deployment(Arc::clone(&params), config)?
        .into_iter()
        .map(|authority| {
            let online = !offline.contains(&authority.index());
            info!(
                "authority {} ({}) is {}",
                authority.index(),
                authority.name(),
                if online { "online" } else { "offline" }
            );
            let mut inner = LocalAuthority::from(authority);
            if let Some(latency) = latency {
                inner = inner.with_latency(latency);
            }
            DemoAuthority { inner, online }
        })
        .collect();

    Ok(IssuanceClient::from_config(config, params, authorities)?)
}
