//! Drives a full SASL/SCRAM authentication against one broker.
//!
//! This is the async driver around the pure state machine in
//! [`crate::scram::client`]: it performs the mechanism handshake, then moves
//! the two SCRAM rounds across the [`BrokerDispatch`] boundary, checking the
//! outer SaslAuthenticate error code before handing any payload to the state
//! machine. Credentials and derived keys never appear in log output.

use bytes::Bytes;
use kafka_protocol::messages::{SaslAuthenticateRequest, SaslAuthenticateResponse};
use tracing::{debug, instrument};

use crate::config::{SaslConfig, SaslMechanism};
use crate::dispatch::BrokerDispatch;
use crate::error::{AuthError, Result};
use crate::handshake::perform_handshake;
use crate::scram::{ScramAlgorithm, ScramClient, ScramError, ScramSha256, ScramSha512};

/// Placeholder when the broker rejects a round without an error message.
const NO_ERROR_MESSAGE: &str = "<no error message>";

/// Authenticate the connection behind `broker` using the configured
/// mechanism.
///
/// Performs the SASL handshake and then the full SCRAM exchange. On return
/// the connection is authenticated and ready for regular Kafka requests.
///
/// # Errors
///
/// Any [`AuthError`] is terminal for this attempt; retrying means calling
/// again, which starts a fresh exchange with a fresh nonce.
#[instrument(skip(broker, config), fields(broker_id = broker.broker_id(), mechanism = config.mechanism.mechanism_name()))]
pub async fn authenticate<D: BrokerDispatch + ?Sized>(
    broker: &D,
    config: &SaslConfig,
) -> Result<()> {
    perform_handshake(broker, config.mechanism).await?;
    match config.mechanism {
        SaslMechanism::ScramSha256 => {
            authenticate_scram::<ScramSha256, D>(broker, &config.username, &config.password).await
        }
        SaslMechanism::ScramSha512 => {
            authenticate_scram::<ScramSha512, D>(broker, &config.username, &config.password).await
        }
    }
}

/// Run the SCRAM-SHA-256 exchange on an already-negotiated connection.
///
/// # Errors
///
/// See [`authenticate`].
pub async fn authenticate_scram256<D: BrokerDispatch + ?Sized>(
    broker: &D,
    username: &str,
    password: &str,
) -> Result<()> {
    authenticate_scram::<ScramSha256, D>(broker, username, password).await
}

/// Run the SCRAM-SHA-512 exchange on an already-negotiated connection.
///
/// # Errors
///
/// See [`authenticate`].
pub async fn authenticate_scram512<D: BrokerDispatch + ?Sized>(
    broker: &D,
    username: &str,
    password: &str,
) -> Result<()> {
    authenticate_scram::<ScramSha512, D>(broker, username, password).await
}

async fn authenticate_scram<A: ScramAlgorithm, D: BrokerDispatch + ?Sized>(
    broker: &D,
    username: &str,
    password: &str,
) -> Result<()> {
    let broker_id = broker.broker_id();
    debug!(broker_id, mechanism = A::NAME, "starting SCRAM exchange");

    let client = ScramClient::<A>::new(username, password);
    let (state, client_first) = client.client_first();

    let server_first = send_authenticate(broker, client_first).await?;
    let (state, client_final) = state
        .handle_server_first(&server_first)
        .map_err(|e| scram_error(broker_id, e))?;

    let server_final = send_authenticate(broker, client_final).await?;
    state
        .handle_server_final(&server_final)
        .map_err(|e| scram_error(broker_id, e))?;

    debug!(broker_id, mechanism = A::NAME, "SCRAM exchange complete");
    Ok(())
}

/// One SaslAuthenticate round: send a SCRAM payload, check the outer error
/// code, hand back the broker's SCRAM payload.
///
/// The outer error code is checked before the payload is interpreted: a
/// rejected round carries no trustworthy SCRAM bytes.
async fn send_authenticate<D: BrokerDispatch + ?Sized>(
    broker: &D,
    payload: Vec<u8>,
) -> Result<Vec<u8>> {
    let mut request = SaslAuthenticateRequest::default();
    request.auth_bytes = Bytes::from(payload);

    let response: SaslAuthenticateResponse = broker.sasl_authenticate(request).await?;

    if response.error_code != 0 {
        let message = response
            .error_message
            .map(|s| s.to_string())
            .unwrap_or_else(|| NO_ERROR_MESSAGE.to_string());
        return Err(AuthError::ServerRejected {
            broker_id: broker.broker_id(),
            error_code: response.error_code,
            message,
        });
    }

    Ok(response.auth_bytes.to_vec())
}

fn scram_error(broker_id: i32, error: ScramError) -> AuthError {
    match error {
        ScramError::Malformed(source) => AuthError::MalformedMessage { broker_id, source },
        ScramError::NonceMismatch => AuthError::NonceMismatch { broker_id },
        ScramError::WeakIterationCount {
            iterations,
            minimum,
        } => AuthError::WeakIterationCount {
            broker_id,
            iterations,
            minimum,
        },
        ScramError::ServerError(message) => AuthError::AuthenticationFailed { broker_id, message },
        ScramError::SignatureMismatch => AuthError::ServerSignatureInvalid { broker_id },
    }
}
