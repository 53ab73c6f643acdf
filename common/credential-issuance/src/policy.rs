// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

use crate::voucher::{BandwidthVoucher, VOUCHER_INFO_TYPE};
use std::fmt::Debug;

/// Authority side source of the public attributes it is willing to sign.
/// The attributes named by the client are only a claim until the policy confirms them.
pub trait IssuancePolicy: Debug + Send + Sync {
    /// Returns the plain public attributes the request must commit to,
    /// or the reason for refusing to sign over the claimed ones.
    fn expected_public_attributes(&self, claimed: &[String]) -> Result<Vec<String>, String>;
}

/// Signs over any public attributes. Only meant for deployments where the public
/// attributes carry no value of their own.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnrestrictedIssuance;

impl IssuancePolicy for UnrestrictedIssuance {
    fn expected_public_attributes(&self, claimed: &[String]) -> Result<Vec<String>, String> {
        Ok(claimed.to_vec())
    }
}

/// Only signs bandwidth vouchers whose value is backed by the authority.
#[derive(Debug, Clone, Copy)]
pub struct BandwidthVoucherPolicy {
    max_value: u64,
}

impl BandwidthVoucherPolicy {
    pub fn new(max_value: u64) -> Self {
        BandwidthVoucherPolicy { max_value }
    }

    pub fn max_value(&self) -> u64 {
        self.max_value
    }
}

impl IssuancePolicy for BandwidthVoucherPolicy {
    fn expected_public_attributes(&self, claimed: &[String]) -> Result<Vec<String>, String> {
        let value = BandwidthVoucher::validate_public_attributes(claimed)
            .ok_or_else(|| format!("the public attributes do not describe a {VOUCHER_INFO_TYPE}"))?;
        if value > self.max_value {
            return Err(format!(
                "voucher value {value} exceeds the backed value of {}",
                self.max_value
            ));
        }
        Ok(vec![value.to_string(), VOUCHER_INFO_TYPE.to_string()])
    }
}
