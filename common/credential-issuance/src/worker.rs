// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

use crate::authority::AuthorityClient;
use crate::client::{DeploymentKeys, IssuanceClient, IssuedCredential};
use crate::config::VerifierConfig;
use crate::error::{IssuanceError, Result};
use crate::session::{SpendSession, SpendState};
use crate::verifier::{CredentialVerifier, SpentLedger};
use crate::voucher::{CredentialAttributes, PrivateAttributeInput};
use nym_threshold_credentials::{SignerIndex, VerificationKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub type CredentialId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkerRequest {
    FetchVerificationKey,
    IssueCredential {
        private_attributes: Vec<PrivateAttributeInput>,
        public_attributes: Vec<String>,
    },
    SpendCredential {
        credential_id: CredentialId,
    },
    ListCredentials,
}

impl WorkerRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerRequest::FetchVerificationKey => "fetch_verification_key",
            WorkerRequest::IssueCredential { .. } => "issue_credential",
            WorkerRequest::SpendCredential { .. } => "spend_credential",
            WorkerRequest::ListCredentials => "list_credentials",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSummary {
    pub id: CredentialId,
    pub public_attributes: Vec<String>,
    pub signers: Vec<SignerIndex>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkerResponse {
    VerificationKey {
        verification_key: VerificationKey,
        signers: Vec<SignerIndex>,
    },
    CredentialIssued {
        credential_id: CredentialId,
        signers: Vec<SignerIndex>,
    },
    CredentialSpent {
        credential_id: CredentialId,
        serial_number: Option<String>,
        public_attributes: Vec<String>,
    },
    SpendRejected {
        credential_id: CredentialId,
        reason: String,
    },
    Credentials {
        credentials: Vec<CredentialSummary>,
    },
    Error {
        message: String,
    },
}

/// Explicit context object owning the client side of the protocol, the verifier
/// and every credential issued through it.
pub struct CredentialWorker<C, L> {
    client: IssuanceClient<C>,
    ledger: L,
    verifier_config: VerifierConfig,

    keys: Option<DeploymentKeys>,
    verifier: Option<CredentialVerifier<L>>,
    credentials: BTreeMap<CredentialId, IssuedCredential>,
    next_id: CredentialId,

    shutdown: CancellationToken,
}

impl<C, L> CredentialWorker<C, L>
where
    C: AuthorityClient,
    L: SpentLedger + Clone,
{
    pub fn new(client: IssuanceClient<C>, ledger: L, verifier_config: VerifierConfig) -> Self {
        CredentialWorker {
            client,
            ledger,
            verifier_config,
            keys: None,
            verifier: None,
            credentials: BTreeMap::new(),
            next_id: 1,
            shutdown: CancellationToken::new(),
        }
    }

    /// Token cancelling any issuance attempt currently run by this worker.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn credential(&self, id: CredentialId) -> Option<&IssuedCredential> {
        self.credentials.get(&id)
    }

    pub async fn handle(&mut self, request: WorkerRequest) -> WorkerResponse {
        debug!("handling '{}' request", request.kind());
        let result = match request {
            WorkerRequest::FetchVerificationKey => self.fetch_verification_key().await,
            WorkerRequest::IssueCredential {
                private_attributes,
                public_attributes,
            } => {
                self.issue_credential(CredentialAttributes::from_inputs(
                    private_attributes,
                    public_attributes,
                ))
                .await
            }
            WorkerRequest::SpendCredential { credential_id } => {
                self.spend_credential(credential_id).await
            }
            WorkerRequest::ListCredentials => Ok(self.list_credentials()),
        };

        result.unwrap_or_else(|err| {
            warn!("failed to handle the request: {err}");
            WorkerResponse::Error {
                message: err.to_string(),
            }
        })
    }

    /// Handles a single JSON encoded request. Malformed requests get an error response.
    pub async fn handle_raw(&mut self, raw: &str) -> Result<String> {
        let response = match serde_json::from_str::<WorkerRequest>(raw) {
            Ok(request) => self.handle(request).await,
            Err(err) => WorkerResponse::Error {
                message: IssuanceError::from(err).to_string(),
            },
        };
        Ok(serde_json::to_string(&response)?)
    }

    async fn fetch_verification_key(&mut self) -> Result<WorkerResponse> {
        let keys = self.client.obtain_verification_key().await?;
        let response = WorkerResponse::VerificationKey {
            verification_key: keys.master_key.clone(),
            signers: keys.signers(),
        };

        self.verifier = Some(CredentialVerifier::new(
            self.client.shared_params(),
            keys.master_key.clone(),
            self.ledger.clone(),
            self.verifier_config.clone(),
        ));
        self.keys = Some(keys);
        Ok(response)
    }

    async fn issue_credential(
        &mut self,
        attributes: CredentialAttributes,
    ) -> Result<WorkerResponse> {
        let keys = self.keys.as_ref().ok_or(IssuanceError::MissingVerificationKey)?;

        let cancel = self.shutdown.child_token();
        let credential = self
            .client
            .issue_credential(keys, &attributes, &cancel)
            .await?;

        let credential_id = self.next_id;
        self.next_id += 1;
        let signers = credential.signers().to_vec();
        self.credentials.insert(credential_id, credential);

        Ok(WorkerResponse::CredentialIssued {
            credential_id,
            signers,
        })
    }

    async fn spend_credential(&self, credential_id: CredentialId) -> Result<WorkerResponse> {
        let (Some(keys), Some(verifier)) = (&self.keys, &self.verifier) else {
            return Err(IssuanceError::MissingVerificationKey);
        };
        let credential = self
            .credentials
            .get(&credential_id)
            .ok_or(IssuanceError::UnknownCredential { id: credential_id })?;

        let mut session = SpendSession::default();
        let proof = match credential.prepare_presentation(self.client.params(), &keys.master_key)
        {
            Ok(proof) => proof,
            Err(err) => {
                session.advance(SpendState::Rejected)?;
                return Err(err);
            }
        };
        session.advance(SpendState::ProofBuilt)?;

        session.advance(SpendState::Submitted)?;
        match verifier
            .verify_and_spend(&proof, credential.public_attributes_plain())
            .await
        {
            Ok(revealed) => {
                session.advance(SpendState::Verified)?;
                Ok(WorkerResponse::CredentialSpent {
                    credential_id,
                    serial_number: revealed
                        .blinded_serial_number
                        .map(|serial_number| serial_number.to_string()),
                    public_attributes: credential.public_attributes_plain().to_vec(),
                })
            }
            Err(err) if err.is_spend_rejection() => {
                session.advance(SpendState::Rejected)?;
                Ok(WorkerResponse::SpendRejected {
                    credential_id,
                    reason: err.to_string(),
                })
            }
            Err(err) => Err(err),
        }
    }

    fn list_credentials(&self) -> WorkerResponse {
        WorkerResponse::Credentials {
            credentials: self
                .credentials
                .iter()
                .map(|(id, credential)| CredentialSummary {
                    id: *id,
                    public_attributes: credential.public_attributes_plain().to_vec(),
                    signers: credential.signers().to_vec(),
                })
                .collect(),
        }
    }
}

impl<C, L> Drop for CredentialWorker<C, L> {
    fn drop(&mut self) {
        self.shutdown.cancel()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_are_tagged_by_kind() {
        let request: WorkerRequest = serde_json::from_str(
            r#"{"kind":"issue_credential","private_attributes":["serial-abc123","binding-xyz789"],"public_attributes":["v1"]}"#,
        )
        .unwrap();
        assert_eq!(
            request,
            WorkerRequest::IssueCredential {
                private_attributes: vec!["serial-abc123".into(), "binding-xyz789".into()],
                public_attributes: vec!["v1".into()],
            }
        );

        let encoded: WorkerRequest = serde_json::from_str(
            r#"{"kind":"issue_credential","private_attributes":[{"scalar":"abc"}],"public_attributes":[]}"#,
        )
        .unwrap();
        assert_eq!(
            encoded,
            WorkerRequest::IssueCredential {
                private_attributes: vec![PrivateAttributeInput::Scalar {
                    scalar: "abc".into()
                }],
                public_attributes: Vec::new(),
            }
        );

        let spend: WorkerRequest =
            serde_json::from_str(r#"{"kind":"spend_credential","credential_id":3}"#).unwrap();
        assert_eq!(spend, WorkerRequest::SpendCredential { credential_id: 3 });
        assert_eq!(spend.kind(), "spend_credential");

        assert!(serde_json::from_str::<WorkerRequest>(r#"{"kind":"reset"}"#).is_err());
    }

    #[test]
    fn responses_are_tagged_by_kind() {
        let response = WorkerResponse::SpendRejected {
            credential_id: 1,
            reason: "already spent".to_string(),
        };
        let raw = serde_json::to_string(&response).unwrap();
        assert!(raw.contains(r#""kind":"spend_rejected""#));
        assert_eq!(serde_json::from_str::<WorkerResponse>(&raw).unwrap(), response);
    }
}
