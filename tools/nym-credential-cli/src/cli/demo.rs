// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

use crate::deployment::{load_config, local_issuance_client};
use anyhow::bail;
use nym_credential_issuance::{
    CredentialAttributes, CredentialVerifier, InMemorySpentLedger, IssuanceError,
};
use nym_threshold_credentials::{Base58, SignerIndex};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(clap::Args, Debug)]
pub(crate) struct Args {
    /// Private attributes of the credential. The first one acts as its serial number.
    #[arg(long = "private", default_values_t = ["serial-abc123".to_string(), "binding-xyz789".to_string()])]
    private_attributes: Vec<String>,

    /// Public attributes of the credential.
    #[arg(long = "public", default_values_t = ["v1".to_string()])]
    public_attributes: Vec<String>,

    /// Indices of authorities that should not respond to signing requests.
    #[arg(long, value_delimiter = ',')]
    offline: Vec<SignerIndex>,

    /// Artificial latency of every authority, in milliseconds.
    #[arg(long)]
    latency_ms: Option<u64>,
}

pub(crate) async fn execute(config_path: &Path, args: Args) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let client = local_issuance_client(
        &config,
        &args.offline,
        args.latency_ms.map(Duration::from_millis),
    )?;

    let keys = client.obtain_verification_key().await?;
    info!("master verification key: {}", keys.master_key.to_bs58());

    let attributes = CredentialAttributes::new(args.private_attributes, args.public_attributes);
    let credential = client
        .issue_credential(&keys, &attributes, &CancellationToken::new())
        .await?;
    info!(
        "obtained credential {} from authorities {:?}",
        credential.signature().to_bs58(),
        credential.signers()
    );

    let verifier = CredentialVerifier::new(
        client.shared_params(),
        keys.master_key.clone(),
        Arc::new(InMemorySpentLedger::new()),
        config.verifier.clone(),
    );

    let proof = credential.prepare_presentation(client.params(), &keys.master_key)?;
    let revealed = verifier
        .verify_and_spend(&proof, credential.public_attributes_plain())
        .await?;
    match &revealed.blinded_serial_number {
        Some(serial_number) => info!("spent the credential with serial number {serial_number}"),
        None => info!("spent the credential, it has no serial number"),
    }

    // presenting it again must be caught by the ledger
    let second = credential.prepare_presentation(client.params(), &keys.master_key)?;
    match verifier
        .verify_and_spend(&second, credential.public_attributes_plain())
        .await
    {
        Err(err @ IssuanceError::AlreadySpent { .. }) => {
            info!("second presentation got rejected as expected: {err}")
        }
        Err(err) => warn!("second presentation got rejected: {err}"),
        Ok(_) if revealed.blinded_serial_number.is_none() => {
            warn!("credentials without serial numbers can be presented any number of times")
        }
        Ok(_) => bail!("the same credential has been accepted twice"),
    }

    Ok(())
}
