//! End-to-end SCRAM authentication flows against the in-process broker
//! simulator, covering both hash families and every failure the client is
//! required to detect.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use kafka_sasl_client::scram::{ScramSha256, ScramSha512};
use kafka_sasl_client::testing::{Fault, ScramBrokerSimulator};
use kafka_sasl_client::{
    authenticate, authenticate_scram256, AuthError, SaslConfig, SaslMechanism,
};

fn config(mechanism: SaslMechanism) -> SaslConfig {
    SaslConfig {
        mechanism,
        username: "alice".to_string(),
        password: "pencil".to_string(),
    }
}

#[tokio::test]
async fn scram_sha256_full_flow_succeeds() {
    let broker = ScramBrokerSimulator::<ScramSha256>::new(0, "alice", "pencil")
        .with_salt(&BASE64.decode("QSXCR+Q6sek8bf92").unwrap())
        .with_iterations(4096);

    authenticate(&broker, &config(SaslMechanism::ScramSha256))
        .await
        .unwrap();
    assert_eq!(broker.rounds_served().await, 2);
}

#[tokio::test]
async fn scram_sha512_full_flow_succeeds() {
    let broker = ScramBrokerSimulator::<ScramSha512>::new(0, "alice", "pencil");

    authenticate(&broker, &config(SaslMechanism::ScramSha512))
        .await
        .unwrap();
    assert_eq!(broker.rounds_served().await, 2);
}

#[tokio::test]
async fn wrong_password_is_rejected_by_the_server() {
    let broker = ScramBrokerSimulator::<ScramSha256>::new(0, "alice", "pencil");

    let err = authenticate_scram256(&broker, "alice", "not-pencil")
        .await
        .unwrap_err();
    match err {
        AuthError::ServerRejected {
            broker_id,
            error_code,
            message,
        } => {
            assert_eq!(broker_id, 0);
            assert_eq!(error_code, 58);
            assert_eq!(message, "invalid credentials");
        }
        other => panic!("expected ServerRejected, got {other:?}"),
    }
    assert_eq!(broker.rounds_served().await, 2);
}

#[tokio::test]
async fn rejected_handshake_stops_before_any_credentials_flow() {
    let broker = ScramBrokerSimulator::<ScramSha256>::new(4, "alice", "pencil")
        .with_fault(Fault::RejectHandshake(33));

    let err = authenticate(&broker, &config(SaslMechanism::ScramSha256))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AuthError::HandshakeRejected {
            broker_id: 4,
            error_code: 33
        }
    ));
    assert_eq!(broker.rounds_served().await, 0);
}

#[tokio::test]
async fn mechanism_mismatch_is_rejected_at_handshake() {
    // A SHA-512 broker negotiating SHA-256 answers with
    // UNSUPPORTED_SASL_MECHANISM before any credentials flow.
    let broker = ScramBrokerSimulator::<ScramSha512>::new(1, "alice", "pencil");

    let err = authenticate(&broker, &config(SaslMechanism::ScramSha256))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AuthError::HandshakeRejected {
            broker_id: 1,
            error_code: 33
        }
    ));
}

#[tokio::test]
async fn first_round_rejection_surfaces_the_server_message() {
    let broker = ScramBrokerSimulator::<ScramSha256>::new(2, "alice", "pencil").with_fault(
        Fault::RejectFirstRound(58, Some("credentials expired".to_string())),
    );

    let err = authenticate(&broker, &config(SaslMechanism::ScramSha256))
        .await
        .unwrap_err();
    match err {
        AuthError::ServerRejected {
            broker_id,
            error_code,
            message,
        } => {
            assert_eq!(broker_id, 2);
            assert_eq!(error_code, 58);
            assert_eq!(message, "credentials expired");
        }
        other => panic!("expected ServerRejected, got {other:?}"),
    }
}

#[tokio::test]
async fn first_round_rejection_without_message_gets_placeholder() {
    let broker = ScramBrokerSimulator::<ScramSha256>::new(2, "alice", "pencil")
        .with_fault(Fault::RejectFirstRound(58, None));

    let err = authenticate(&broker, &config(SaslMechanism::ScramSha256))
        .await
        .unwrap_err();
    match err {
        AuthError::ServerRejected { message, .. } => {
            assert_eq!(message, "<no error message>");
        }
        other => panic!("expected ServerRejected, got {other:?}"),
    }
}

#[tokio::test]
async fn tampered_nonce_aborts_before_the_second_round() {
    let broker = ScramBrokerSimulator::<ScramSha256>::new(3, "alice", "pencil")
        .with_fault(Fault::TamperNonce);

    let err = authenticate(&broker, &config(SaslMechanism::ScramSha256))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::NonceMismatch { broker_id: 3 }));
    // No client-final message goes out: the proof is never computed.
    assert_eq!(broker.rounds_served().await, 1);
}

#[tokio::test]
async fn weak_iteration_count_aborts_before_key_derivation() {
    let broker = ScramBrokerSimulator::<ScramSha256>::new(5, "alice", "pencil")
        .with_fault(Fault::OfferIterations(1));

    let err = authenticate(&broker, &config(SaslMechanism::ScramSha256))
        .await
        .unwrap_err();
    match err {
        AuthError::WeakIterationCount {
            broker_id,
            iterations,
            minimum,
        } => {
            assert_eq!(broker_id, 5);
            assert_eq!(iterations, 1);
            assert_eq!(minimum, 4096);
        }
        other => panic!("expected WeakIterationCount, got {other:?}"),
    }
    assert_eq!(broker.rounds_served().await, 1);
}

#[tokio::test]
async fn scram_level_server_error_fails_the_attempt() {
    let broker = ScramBrokerSimulator::<ScramSha256>::new(6, "alice", "pencil")
        .with_fault(Fault::ServerError("other-error".to_string()));

    let err = authenticate(&broker, &config(SaslMechanism::ScramSha256))
        .await
        .unwrap_err();
    match err {
        AuthError::AuthenticationFailed { broker_id, message } => {
            assert_eq!(broker_id, 6);
            assert_eq!(message, "other-error");
        }
        other => panic!("expected AuthenticationFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn corrupted_server_signature_is_treated_as_unauthenticated() {
    let broker = ScramBrokerSimulator::<ScramSha256>::new(7, "alice", "pencil")
        .with_fault(Fault::CorruptSignature);

    let err = authenticate(&broker, &config(SaslMechanism::ScramSha256))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AuthError::ServerSignatureInvalid { broker_id: 7 }
    ));
}

#[tokio::test]
async fn direct_scram_entry_point_skips_the_handshake() {
    let broker = ScramBrokerSimulator::<ScramSha256>::new(0, "alice", "pencil");

    authenticate_scram256(&broker, "alice", "pencil")
        .await
        .unwrap();
    assert_eq!(broker.rounds_served().await, 2);
}

#[tokio::test]
async fn concurrent_attempts_against_independent_brokers() {
    let mut handles = Vec::new();
    for broker_id in 0..8 {
        handles.push(tokio::spawn(async move {
            let broker = ScramBrokerSimulator::<ScramSha256>::new(broker_id, "alice", "pencil");
            authenticate(&broker, &config(SaslMechanism::ScramSha256)).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
}
