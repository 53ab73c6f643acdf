// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

use crate::deployment::{load_config, local_issuance_client};
use nym_credential_issuance::{CredentialWorker, InMemorySpentLedger};
use nym_threshold_credentials::SignerIndex;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info};

#[derive(clap::Args, Debug)]
pub(crate) struct Args {
    /// Indices of authorities that should not respond to signing requests.
    #[arg(long, value_delimiter = ',')]
    offline: Vec<SignerIndex>,
}

pub(crate) async fn execute(config_path: &Path, args: Args) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let client = local_issuance_client(&config, &args.offline, None)?;
    let mut worker = CredentialWorker::new(
        client,
        Arc::new(InMemorySpentLedger::new()),
        config.verifier.clone(),
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    info!("waiting for requests on stdin");
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = worker.handle_raw(line).await?;
        debug!("responding with {} bytes", response.len());
        stdout.write_all(response.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }

    info!("stdin has been closed, stopping the worker");
    Ok(())
}
