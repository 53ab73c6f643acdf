// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

use crate::error::{IssuanceError, Result};
use nym_threshold_credentials::{Parameters, SignerIndex, ThresholdParameters};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use std::{fs, io};
use tracing::debug;

pub const DEFAULT_MAX_ATTRIBUTES: u32 = 4;
pub const DEFAULT_AUTHORITY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthorityEntry {
    /// Threshold index of the authority, within `[1, n]`.
    pub index: SignerIndex,

    /// Human readable identifier used in logs.
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifierConfig {
    /// Reject presentations that do not reveal a serial number,
    /// as those can't be checked against the spent ledger.
    pub require_serial_number: bool,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        VerifierConfig {
            require_serial_number: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IssuanceConfig {
    pub threshold: u64,

    pub authorities: Vec<AuthorityEntry>,

    #[serde(default = "default_max_attributes")]
    pub max_attributes: u32,

    /// Time given to every authority to respond to a single request.
    #[serde(default = "default_authority_timeout", with = "humantime_serde")]
    pub authority_timeout: Duration,

    #[serde(default)]
    pub verifier: VerifierConfig,
}

fn default_max_attributes() -> u32 {
    DEFAULT_MAX_ATTRIBUTES
}

fn default_authority_timeout() -> Duration {
    DEFAULT_AUTHORITY_TIMEOUT
}

impl IssuanceConfig {
    /// Config of a deployment of `authorities` authorities with indices `1..=n`.
    pub fn new(threshold: u64, authorities: u64) -> Self {
        IssuanceConfig {
            threshold,
            authorities: (1..=authorities)
                .map(|index| AuthorityEntry {
                    index,
                    name: format!("authority-{index}"),
                })
                .collect(),
            max_attributes: DEFAULT_MAX_ATTRIBUTES,
            authority_timeout: DEFAULT_AUTHORITY_TIMEOUT,
            verifier: Default::default(),
        }
    }

    pub fn with_authority_timeout(mut self, authority_timeout: Duration) -> Self {
        self.authority_timeout = authority_timeout;
        self
    }

    pub fn read_from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("loading issuance config from {}", path.display());

        let content =
            fs::read_to_string(path).map_err(|source| IssuanceError::ConfigLoadFailure {
                path: path.to_path_buf(),
                source,
            })?;
        let config: IssuanceConfig =
            toml::from_str(&content).map_err(|source| IssuanceError::ConfigParseFailure {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_toml_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)?;

        let save = || -> io::Result<()> {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, content)
        };
        save().map_err(|source| IssuanceError::ConfigSaveFailure {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<()> {
        let n = self.authorities.len() as u64;
        if self.threshold == 0 || self.threshold > n {
            return Err(IssuanceError::InvalidConfig(format!(
                "the threshold must lie within [1, {n}], got {}",
                self.threshold
            )));
        }

        let mut seen = HashSet::new();
        for authority in &self.authorities {
            if authority.index == 0 || authority.index > n {
                return Err(IssuanceError::InvalidConfig(format!(
                    "authority '{}' has index {} outside of [1, {n}]",
                    authority.name, authority.index
                )));
            }
            if !seen.insert(authority.index) {
                return Err(IssuanceError::InvalidConfig(format!(
                    "index {} is assigned to more than one authority",
                    authority.index
                )));
            }
        }

        if self.max_attributes == 0 {
            return Err(IssuanceError::InvalidConfig(
                "credentials must support at least one attribute".to_string(),
            ));
        }

        if self.authority_timeout.is_zero() {
            return Err(IssuanceError::InvalidConfig(
                "the authority timeout can't be zero".to_string(),
            ));
        }

        Ok(())
    }

    pub fn threshold_parameters(&self) -> Result<ThresholdParameters> {
        Ok(ThresholdParameters::new(
            self.threshold,
            self.authorities.len() as u64,
        )?)
    }

    pub fn parameters(&self) -> Result<Parameters> {
        Ok(Parameters::new(self.max_attributes)?)
    }

    pub fn authority_name(&self, index: SignerIndex) -> Option<&str> {
        self.authorities
            .iter()
            .find(|authority| authority.index == index)
            .map(|authority| authority.name.as_str())
    }
}
