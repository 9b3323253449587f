//! SASL mechanism negotiation with a broker.
//!
//! The handshake is the first round on a fresh connection: the client names
//! the mechanism it intends to use, and the broker either accepts or reports
//! an error code plus the mechanisms it does support.

use kafka_protocol::messages::SaslHandshakeRequest;
use kafka_protocol::protocol::StrBytes;
use tracing::debug;

use crate::config::SaslMechanism;
use crate::dispatch::BrokerDispatch;
use crate::error::{AuthError, Result};

/// Negotiate `mechanism` with the broker behind `broker`.
///
/// On success the broker is committed to that mechanism for the
/// SaslAuthenticate rounds that follow on the same connection.
///
/// # Errors
///
/// Returns [`AuthError::HandshakeRejected`] when the broker answers with a
/// non-zero error code, and [`AuthError::UnsupportedMechanism`] when the
/// response does not list the requested mechanism. The supported-mechanism
/// check runs even on a zero error code; a broker that accepts without
/// advertising the mechanism is misbehaving and gets no credentials.
pub async fn perform_handshake<D: BrokerDispatch + ?Sized>(
    broker: &D,
    mechanism: SaslMechanism,
) -> Result<()> {
    let mechanism_name = mechanism.mechanism_name();
    debug!(
        broker_id = broker.broker_id(),
        mechanism = mechanism_name,
        "sending SASL handshake"
    );

    let mut request = SaslHandshakeRequest::default();
    request.mechanism = StrBytes::from_string(mechanism_name.to_string());

    let response = broker.sasl_handshake(request).await?;

    if response.error_code != 0 {
        return Err(AuthError::HandshakeRejected {
            broker_id: broker.broker_id(),
            error_code: response.error_code,
        });
    }

    let supported: Vec<String> = response.mechanisms.iter().map(|m| m.to_string()).collect();
    if !supported.iter().any(|m| m == mechanism_name) {
        return Err(AuthError::UnsupportedMechanism {
            broker_id: broker.broker_id(),
            mechanism: mechanism_name.to_string(),
            supported,
        });
    }

    debug!(
        broker_id = broker.broker_id(),
        supported_mechanisms = ?supported,
        "SASL handshake accepted"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kafka_protocol::messages::{
        SaslAuthenticateRequest, SaslAuthenticateResponse, SaslHandshakeResponse,
    };

    /// Broker stub replaying one fixed handshake response.
    struct ScriptedBroker {
        error_code: i16,
        mechanisms: Vec<&'static str>,
    }

    #[async_trait]
    impl BrokerDispatch for ScriptedBroker {
        fn broker_id(&self) -> i32 {
            9
        }

        async fn sasl_handshake(
            &self,
            _request: SaslHandshakeRequest,
        ) -> crate::error::Result<SaslHandshakeResponse> {
            let mut response = SaslHandshakeResponse::default();
            response.error_code = self.error_code;
            response.mechanisms = self
                .mechanisms
                .iter()
                .map(|m| StrBytes::from_static_str(m))
                .collect();
            Ok(response)
        }

        async fn sasl_authenticate(
            &self,
            _request: SaslAuthenticateRequest,
        ) -> crate::error::Result<SaslAuthenticateResponse> {
            unreachable!("handshake tests never authenticate")
        }
    }

    #[tokio::test]
    async fn accepted_handshake_with_advertised_mechanism() {
        let broker = ScriptedBroker {
            error_code: 0,
            mechanisms: vec!["SCRAM-SHA-256", "SCRAM-SHA-512"],
        };
        perform_handshake(&broker, SaslMechanism::ScramSha512)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn non_zero_error_code_is_a_rejection() {
        let broker = ScriptedBroker {
            error_code: 33,
            mechanisms: vec!["SCRAM-SHA-256"],
        };
        let err = perform_handshake(&broker, SaslMechanism::ScramSha256)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AuthError::HandshakeRejected {
                broker_id: 9,
                error_code: 33
            }
        ));
    }

    #[tokio::test]
    async fn accepted_handshake_without_the_mechanism_is_rejected() {
        // A broker that answers zero but never advertises the mechanism.
        let broker = ScriptedBroker {
            error_code: 0,
            mechanisms: vec!["PLAIN", "GSSAPI"],
        };
        let err = perform_handshake(&broker, SaslMechanism::ScramSha256)
            .await
            .unwrap_err();
        match err {
            AuthError::UnsupportedMechanism {
                broker_id,
                mechanism,
                supported,
            } => {
                assert_eq!(broker_id, 9);
                assert_eq!(mechanism, "SCRAM-SHA-256");
                assert_eq!(supported, vec!["PLAIN", "GSSAPI"]);
            }
            other => panic!("expected UnsupportedMechanism, got {other:?}"),
        }
    }
}
