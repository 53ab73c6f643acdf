// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

use common::{scenario_attributes, Behaviour, Deployment, AUTHORITY_TIMEOUT};
use nym_credential_issuance::{CredentialAttributes, IssuanceError, PrivateAttributeInput};
use nym_threshold_credentials::{hash_to_scalar, verify, verify_credential, CredentialError};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

mod common;

#[tokio::test]
async fn happy_path_with_three_of_five_authorities() {
    let deployment = Deployment::new(3, 5);
    let client = deployment.client_with_responders(&[1, 3, 4]);

    let keys = client.obtain_verification_key().await.unwrap();
    assert_eq!(keys.signers(), vec![1, 2, 3, 4, 5]);

    let attributes = scenario_attributes();
    let credential = client
        .issue_credential(&keys, &attributes, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(credential.signers(), &[1, 3, 4]);

    let mut all_attributes = attributes.private_attributes().unwrap();
    all_attributes.extend(attributes.public_attributes());
    assert!(verify(
        client.params(),
        &keys.master_key,
        &all_attributes,
        credential.signature()
    ));

    let proof = credential
        .prepare_presentation(client.params(), &keys.master_key)
        .unwrap();
    assert!(verify_credential(
        client.params(),
        &keys.master_key,
        &proof,
        &attributes.public_attributes()
    ));
}

#[tokio::test]
async fn two_responders_are_not_enough() {
    let deployment = Deployment::new(3, 5);
    let client = deployment.client_with_responders(&[1, 2]);
    let keys = client.obtain_verification_key().await.unwrap();

    let err = client
        .issue_credential(&keys, &scenario_attributes(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        IssuanceError::Credential(CredentialError::InsufficientShares {
            threshold: 3,
            received: 2
        })
    ));
}

#[tokio::test]
async fn misbehaving_authorities_are_excluded() {
    let deployment = Deployment::new(3, 5);
    let client = deployment.client(|index| match index {
        2 => Behaviour::Corrupt,
        5 => Behaviour::Impersonating(1),
        _ => Behaviour::Honest,
    });
    let keys = client.obtain_verification_key().await.unwrap();

    let credential = client
        .issue_credential(&keys, &scenario_attributes(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(credential.signers(), &[1, 3, 4]);
}

#[tokio::test]
async fn authority_with_oversized_key_is_left_out_of_the_aggregation() {
    let deployment = Deployment::new(3, 5);
    let client = deployment.client(|index| {
        if index == 5 {
            Behaviour::OversizedKey
        } else {
            Behaviour::Honest
        }
    });

    let keys = client.obtain_verification_key().await.unwrap();
    assert_eq!(keys.signers(), vec![1, 2, 3, 4]);
    assert!(keys.partial_key(5).is_none());

    let credential = client
        .issue_credential(&keys, &scenario_attributes(), &CancellationToken::new())
        .await
        .unwrap();
    assert!(!credential.signers().contains(&5));

    let proof = credential
        .prepare_presentation(client.params(), &keys.master_key)
        .unwrap();
    assert!(verify_credential(
        client.params(),
        &keys.master_key,
        &proof,
        &scenario_attributes().public_attributes()
    ));
}

#[tokio::test(start_paused = true)]
async fn slow_authorities_time_out() {
    let deployment = Deployment::new(2, 4);
    let client = deployment.client(|index| {
        if index <= 2 {
            Behaviour::Hanging
        } else {
            Behaviour::Honest
        }
    });
    let keys = client.obtain_verification_key().await.unwrap();

    let credential = client
        .issue_credential(&keys, &scenario_attributes(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(credential.signers(), &[3, 4]);

    let unreachable = deployment.client(|index| {
        if index == 4 {
            Behaviour::Honest
        } else {
            Behaviour::Hanging
        }
    });
    let start = Instant::now();
    let err = unreachable
        .issue_credential(&keys, &scenario_attributes(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        IssuanceError::Credential(CredentialError::InsufficientShares { received: 1, .. })
    ));
    assert!(start.elapsed() >= AUTHORITY_TIMEOUT);
}

#[tokio::test(start_paused = true)]
async fn attempt_fails_as_soon_as_threshold_is_out_of_reach() {
    let deployment = Deployment::new(3, 5);
    let client = deployment.client(|index| {
        if index <= 3 {
            Behaviour::Unavailable
        } else {
            Behaviour::Hanging
        }
    });
    let keys = client.obtain_verification_key().await.unwrap();

    let start = Instant::now();
    let err = client
        .issue_credential(&keys, &scenario_attributes(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        IssuanceError::Credential(CredentialError::InsufficientShares { received: 0, .. })
    ));
    // the hanging authorities were never waited for
    assert!(start.elapsed() < AUTHORITY_TIMEOUT);
}

#[tokio::test(start_paused = true)]
async fn issuance_can_be_cancelled() {
    let deployment = Deployment::new(2, 3);
    let client = deployment.client(|index| {
        if index == 1 {
            Behaviour::Honest
        } else {
            Behaviour::Hanging
        }
    });
    let keys = client.obtain_verification_key().await.unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let start = Instant::now();
    let err = client
        .issue_credential(&keys, &scenario_attributes(), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, IssuanceError::IssuanceAborted));
    assert!(start.elapsed() < AUTHORITY_TIMEOUT);
}

#[tokio::test]
async fn single_authority_without_private_attributes() {
    let deployment = Deployment::new(1, 1);
    let client = deployment.honest_client();
    let keys = client.obtain_verification_key().await.unwrap();

    let attributes = nym_credential_issuance::CredentialAttributes::new(
        Vec::new(),
        vec!["v1".to_string(), "free-pass".to_string()],
    );
    let credential = client
        .issue_credential(&keys, &attributes, &CancellationToken::new())
        .await
        .unwrap();

    let proof = credential
        .prepare_presentation(client.params(), &keys.master_key)
        .unwrap();
    assert!(proof.blinded_serial_number().is_none());
    assert!(verify_credential(
        client.params(),
        &keys.master_key,
        &proof,
        &attributes.public_attributes()
    ));
}

#[tokio::test]
async fn too_many_attributes_are_rejected_before_contacting_anyone() {
    let deployment = Deployment::new(2, 3);
    let client = deployment.honest_client();
    let keys = client.obtain_verification_key().await.unwrap();

    let attributes = nym_credential_issuance::CredentialAttributes::new(
        vec!["a".into(), "b".into(), "c".into()],
        vec!["d".into(), "e".into()],
    );
    let err = client
        .issue_credential(&keys, &attributes, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        IssuanceError::Credential(CredentialError::IssuanceMaxAttributes { .. })
    ));
}

#[tokio::test]
async fn non_canonical_attribute_encoding_fails_the_commitment() {
    let deployment = Deployment::new(2, 3);
    let client = deployment.honest_client();
    let keys = client.obtain_verification_key().await.unwrap();

    // every byte set is above the field modulus
    let non_canonical = PrivateAttributeInput::Scalar {
        scalar: bs58::encode([0xff; 32]).into_string(),
    };
    let attributes = CredentialAttributes::from_inputs(
        vec![non_canonical, "binding-xyz789".into()],
        vec!["v1".to_string()],
    );
    let err = client
        .issue_credential(&keys, &attributes, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        IssuanceError::Credential(CredentialError::Commitment(_))
    ));

    // the same serial number, once properly encoded, goes through
    let serial = hash_to_scalar("serial-abc123");
    let attributes = CredentialAttributes::from_inputs(
        vec![PrivateAttributeInput::scalar(&serial), "binding-xyz789".into()],
        vec!["v1".to_string()],
    );
    client
        .issue_credential(&keys, &attributes, &CancellationToken::new())
        .await
        .unwrap();
}
