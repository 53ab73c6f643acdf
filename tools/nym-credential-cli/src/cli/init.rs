// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

use anyhow::bail;
use nym_credential_issuance::IssuanceConfig;
use std::path::Path;
use std::time::Duration;
use tracing::info;

#[derive(clap::Args, Debug)]
pub(crate) struct Args {
    /// Number of authorities required to issue a credential.
    #[arg(long, default_value_t = 3)]
    threshold: u64,

    /// Total number of authorities in the deployment.
    #[arg(long, default_value_t = 5)]
    authorities: u64,

    /// Maximum number of attributes, private and public combined, of a single credential.
    #[arg(long)]
    max_attributes: Option<u32>,

    /// Time given to every authority to respond, in seconds.
    #[arg(long)]
    authority_timeout_secs: Option<u64>,

    /// Overwrite the existing config file.
    #[arg(long)]
    force: bool,
}

pub(crate) fn execute(config_path: &Path, args: Args) -> anyhow::Result<()> {
    if config_path.exists() && !args.force {
        bail!(
            "config file {} already exists, use --force to overwrite it",
            config_path.display()
        )
    }

    let mut config = IssuanceConfig::new(args.threshold, args.authorities);
    if let Some(max_attributes) = args.max_attributes {
        config.max_attributes = max_attributes;
    }
    if let Some(timeout) = args.authority_timeout_secs {
        config.authority_timeout = Duration::from_secs(timeout);
    }
    config.validate()?;
    config.save_to_toml_file(config_path)?;

    info!(
        "saved the config of a {}-out-of-{} deployment to {}",
        config.threshold,
        config.authorities.len(),
        config_path.display()
    );
    Ok(())
}
