//! An in-process SCRAM broker with fault injection.
//!
//! [`ScramBrokerSimulator`] implements [`BrokerDispatch`] and performs real
//! server-side SCRAM verification with the same primitives the client uses:
//! it derives the stored key from the configured password, recovers the
//! client key from the submitted proof, and only signs the exchange when the
//! recovered key hashes back to the stored key. A configured [`Fault`] makes
//! it misbehave in one specific way so each client-side check can be
//! exercised in isolation.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use bytes::Bytes;
use kafka_protocol::messages::{
    SaslAuthenticateRequest, SaslAuthenticateResponse, SaslHandshakeRequest, SaslHandshakeResponse,
};
use kafka_protocol::protocol::StrBytes;
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;

use crate::dispatch::BrokerDispatch;
use crate::error::Result;
use crate::scram::ScramAlgorithm;

/// Kafka error code SASL_AUTHENTICATION_FAILED.
const SASL_AUTHENTICATION_FAILED: i16 = 58;

/// One way for the simulated broker to misbehave.
#[derive(Debug, Clone, Default)]
pub enum Fault {
    /// Behave as a correct broker.
    #[default]
    None,
    /// Answer the SASL handshake with this error code.
    RejectHandshake(i16),
    /// Reject the first authenticate round with this outer error code and
    /// optional error message.
    RejectFirstRound(i16, Option<String>),
    /// Reply with a combined nonce that does not extend the client's.
    TamperNonce,
    /// Offer this iteration count instead of the configured one.
    OfferIterations(u32),
    /// Accept the client proof but answer with a SCRAM `e=` error.
    ServerError(String),
    /// Accept the client proof but corrupt the server signature.
    CorruptSignature,
}

struct PendingExchange {
    client_first_bare: String,
    server_first: String,
    combined_nonce: String,
    iterations: u32,
}

#[derive(Default)]
struct SimulatorState {
    rounds_served: usize,
    pending: Option<PendingExchange>,
}

/// An in-process broker speaking the server side of one SCRAM mechanism.
pub struct ScramBrokerSimulator<A: ScramAlgorithm> {
    broker_id: i32,
    username: String,
    password: String,
    salt: Vec<u8>,
    iterations: u32,
    server_nonce_suffix: String,
    fault: Fault,
    state: Mutex<SimulatorState>,
    _algorithm: std::marker::PhantomData<A>,
}

impl<A: ScramAlgorithm> ScramBrokerSimulator<A> {
    /// Create a well-behaved simulated broker holding one credential.
    #[must_use]
    pub fn new(broker_id: i32, username: &str, password: &str) -> Self {
        Self {
            broker_id,
            username: username.to_string(),
            password: password.to_string(),
            salt: b"simulated-broker-salt".to_vec(),
            iterations: 4096,
            server_nonce_suffix: "3rfcNHYJY1ZVvWVs7j".to_string(),
            fault: Fault::None,
            state: Mutex::new(SimulatorState::default()),
            _algorithm: std::marker::PhantomData,
        }
    }

    /// Replace the salt offered in the server-first message.
    #[must_use]
    pub fn with_salt(mut self, salt: &[u8]) -> Self {
        self.salt = salt.to_vec();
        self
    }

    /// Replace the iteration count offered in the server-first message.
    #[must_use]
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    /// Configure the broker to misbehave.
    #[must_use]
    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.fault = fault;
        self
    }

    /// Number of authenticate rounds served so far.
    pub async fn rounds_served(&self) -> usize {
        self.state.lock().await.rounds_served
    }

    fn reject(&self, error_code: i16, message: Option<String>) -> SaslAuthenticateResponse {
        let mut response = SaslAuthenticateResponse::default();
        response.error_code = error_code;
        response.error_message = message.map(StrBytes::from_string);
        response
    }

    fn accept(&self, payload: String) -> SaslAuthenticateResponse {
        let mut response = SaslAuthenticateResponse::default();
        response.error_code = 0;
        response.auth_bytes = Bytes::from(payload);
        response
    }

    fn handle_client_first(
        &self,
        payload: &[u8],
    ) -> (SaslAuthenticateResponse, Option<PendingExchange>) {
        if let Fault::RejectFirstRound(code, message) = &self.fault {
            return (self.reject(*code, message.clone()), None);
        }

        let text = match std::str::from_utf8(payload) {
            Ok(text) => text,
            Err(_) => {
                return (
                    self.reject(
                        SASL_AUTHENTICATION_FAILED,
                        Some("client-first message is not UTF-8".to_string()),
                    ),
                    None,
                )
            }
        };
        let Some(bare) = text.strip_prefix("n,,") else {
            return (
                self.reject(
                    SASL_AUTHENTICATION_FAILED,
                    Some("missing GS2 header".to_string()),
                ),
                None,
            );
        };

        let mut username = None;
        let mut client_nonce = None;
        for part in bare.split(',') {
            if let Some(value) = part.strip_prefix("n=") {
                username = Some(value.to_string());
            } else if let Some(value) = part.strip_prefix("r=") {
                client_nonce = Some(value.to_string());
            }
        }
        let (Some(username), Some(client_nonce)) = (username, client_nonce) else {
            return (
                self.reject(
                    SASL_AUTHENTICATION_FAILED,
                    Some("malformed client-first message".to_string()),
                ),
                None,
            );
        };
        if username != self.username {
            return (
                self.reject(
                    SASL_AUTHENTICATION_FAILED,
                    Some("unknown user".to_string()),
                ),
                None,
            );
        }

        let combined_nonce = match self.fault {
            Fault::TamperNonce => format!("attacker{}", self.server_nonce_suffix),
            _ => format!("{client_nonce}{}", self.server_nonce_suffix),
        };
        let iterations = match self.fault {
            Fault::OfferIterations(iterations) => iterations,
            _ => self.iterations,
        };

        let server_first = format!(
            "r={combined_nonce},s={},i={iterations}",
            BASE64.encode(&self.salt)
        );

        let response = self.accept(server_first.clone());
        let pending = PendingExchange {
            client_first_bare: bare.to_string(),
            server_first,
            combined_nonce,
            iterations,
        };
        (response, Some(pending))
    }

    fn handle_client_final(
        &self,
        pending: &PendingExchange,
        payload: &[u8],
    ) -> SaslAuthenticateResponse {
        let text = match std::str::from_utf8(payload) {
            Ok(text) => text,
            Err(_) => {
                return self.reject(
                    SASL_AUTHENTICATION_FAILED,
                    Some("client-final message is not UTF-8".to_string()),
                )
            }
        };

        let mut channel_binding = None;
        let mut nonce = None;
        let mut proof = None;
        for part in text.split(',') {
            if let Some(value) = part.strip_prefix("c=") {
                channel_binding = Some(value.to_string());
            } else if let Some(value) = part.strip_prefix("r=") {
                nonce = Some(value.to_string());
            } else if let Some(value) = part.strip_prefix("p=") {
                proof = BASE64.decode(value).ok();
            }
        }
        let (Some(channel_binding), Some(nonce), Some(proof)) = (channel_binding, nonce, proof)
        else {
            return self.reject(
                SASL_AUTHENTICATION_FAILED,
                Some("malformed client-final message".to_string()),
            );
        };
        if channel_binding != "biws" || nonce != pending.combined_nonce {
            return self.reject(
                SASL_AUTHENTICATION_FAILED,
                Some("nonce or channel binding mismatch".to_string()),
            );
        }

        // Server-side proof verification: recover ClientKey from the proof
        // and check it hashes back to the stored key.
        let salted = A::hi(self.password.as_bytes(), &self.salt, pending.iterations);
        let client_key = A::hmac(salted.as_bytes(), b"Client Key");
        let stored_key = A::hash(&client_key);

        let without_proof = format!("c=biws,r={}", pending.combined_nonce);
        let auth_message = format!(
            "{},{},{}",
            pending.client_first_bare, pending.server_first, without_proof
        );
        let client_signature = A::hmac(&stored_key, auth_message.as_bytes());

        if proof.len() != client_signature.len() {
            return self.reject(
                SASL_AUTHENTICATION_FAILED,
                Some("invalid credentials".to_string()),
            );
        }
        let recovered_client_key: Vec<u8> = proof
            .iter()
            .zip(client_signature.iter())
            .map(|(p, s)| p ^ s)
            .collect();
        let recovered_stored_key = A::hash(&recovered_client_key);
        if !bool::from(recovered_stored_key.as_slice().ct_eq(&stored_key)) {
            return self.reject(
                SASL_AUTHENTICATION_FAILED,
                Some("invalid credentials".to_string()),
            );
        }

        if let Fault::ServerError(message) = &self.fault {
            return self.accept(format!("e={message}"));
        }

        let server_key = A::hmac(salted.as_bytes(), b"Server Key");
        let mut signature = A::hmac(&server_key, auth_message.as_bytes()).to_vec();
        if matches!(self.fault, Fault::CorruptSignature) {
            signature[0] ^= 0x01;
        }
        self.accept(format!("v={}", BASE64.encode(&signature)))
    }
}

#[async_trait]
impl<A: ScramAlgorithm> BrokerDispatch for ScramBrokerSimulator<A> {
    fn broker_id(&self) -> i32 {
        self.broker_id
    }

    async fn sasl_handshake(&self, request: SaslHandshakeRequest) -> Result<SaslHandshakeResponse> {
        let mut response = SaslHandshakeResponse::default();
        response.mechanisms = vec![
            StrBytes::from_static_str("SCRAM-SHA-256"),
            StrBytes::from_static_str("SCRAM-SHA-512"),
        ];
        response.error_code = match self.fault {
            Fault::RejectHandshake(code) => code,
            _ if &*request.mechanism == A::NAME => 0,
            // UNSUPPORTED_SASL_MECHANISM
            _ => 33,
        };
        Ok(response)
    }

    async fn sasl_authenticate(
        &self,
        request: SaslAuthenticateRequest,
    ) -> Result<SaslAuthenticateResponse> {
        let mut state = self.state.lock().await;
        state.rounds_served += 1;

        let response = match state.pending.take() {
            None => {
                let (response, pending) = self.handle_client_first(&request.auth_bytes);
                state.pending = pending;
                response
            }
            Some(pending) => self.handle_client_final(&pending, &request.auth_bytes),
        };
        Ok(response)
    }
}
