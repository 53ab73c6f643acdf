// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

pub use authority::{AuthorityClient, BlindSignRequestBody, LocalAuthority, SigningAuthority};
pub use client::{DeploymentKeys, IssuanceClient, IssuedCredential};
pub use config::{AuthorityEntry, IssuanceConfig, VerifierConfig};
pub use error::{IssuanceError, Result};
pub use policy::{BandwidthVoucherPolicy, IssuancePolicy, UnrestrictedIssuance};
pub use session::{IssuanceSession, IssuanceState, SpendSession, SpendState};
pub use verifier::{CredentialVerifier, InMemorySpentLedger, SpentLedger};
pub use voucher::{BandwidthVoucher, CredentialAttributes, PrivateAttributeInput};
pub use worker::{CredentialId, CredentialWorker, WorkerRequest, WorkerResponse};

pub mod authority;
pub mod client;
pub mod config;
pub mod error;
pub mod policy;
pub mod session;
pub mod verifier;
pub mod voucher;
pub mod worker;
