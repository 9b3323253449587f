//! The client side of one SCRAM exchange as an explicit state machine.
//!
//! States follow the protocol rounds: [`ScramClient`] (start) produces the
//! client-first payload and becomes [`AwaitingServerFirst`]; validating the
//! server-first payload produces the client-final payload and
//! [`AwaitingServerFinal`]; validating the server-final payload yields the
//! pass/fail outcome. Every transition consumes the state, so a round can
//! neither be skipped nor replayed, and no transition retries: any error is
//! terminal for the attempt, and a retry means a fresh machine with a fresh
//! nonce.
//!
//! The machine performs no I/O; the async driver in [`crate::authenticator`]
//! moves the payloads across the wire. All intermediate secrets live inside
//! the states and are zeroed on drop.

use std::marker::PhantomData;

use rand::{distributions::Alphanumeric, Rng};
use thiserror::Error;
use zeroize::Zeroizing;

use super::algorithm::{SaltedPassword, ScramAlgorithm};
use super::messages::{
    ClientFinalMessage, ClientFirstMessage, MessageError, ServerFinalMessage, ServerFirstMessage,
};

/// Length of the generated client nonce in characters.
pub const NONCE_LENGTH: usize = 130;

/// Terminal failures of one SCRAM exchange.
///
/// The driver attaches the broker identity when surfacing these as
/// [`crate::error::AuthError`].
#[derive(Error, Debug)]
pub enum ScramError {
    /// A server payload did not parse as a SCRAM message.
    #[error(transparent)]
    Malformed(#[from] MessageError),

    /// The echoed server nonce does not start with the client nonce.
    #[error("server nonce does not start with the client nonce")]
    NonceMismatch,

    /// The server offered an iteration count below the mechanism's floor.
    #[error("server iteration count {iterations} below required minimum {minimum}")]
    WeakIterationCount { iterations: u32, minimum: u32 },

    /// The server-final message carried an explicit `e=` error attribute.
    #[error("server reported authentication failure: {0}")]
    ServerError(String),

    /// The server signature did not match the locally computed one.
    #[error("server signature does not match calculated signature")]
    SignatureMismatch,
}

fn generate_nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(NONCE_LENGTH)
        .map(char::from)
        .collect()
}

/// Start state of a SCRAM exchange: owns the credentials and a fresh nonce.
pub struct ScramClient<A: ScramAlgorithm> {
    username: String,
    password: Zeroizing<String>,
    nonce: String,
    _algorithm: PhantomData<A>,
}

impl<A: ScramAlgorithm> ScramClient<A> {
    /// Begin a new authentication attempt with a fresh high-entropy client
    /// nonce.
    #[must_use]
    pub fn new(username: &str, password: &str) -> Self {
        Self::with_nonce(username, password, generate_nonce())
    }

    /// Begin an attempt with a caller-supplied nonce.
    ///
    /// Intended for tests driving the exchange against fixed reference
    /// vectors; production callers should use [`ScramClient::new`] so every
    /// attempt binds to a single-use random nonce.
    #[must_use]
    pub fn with_nonce(username: &str, password: &str, nonce: String) -> Self {
        Self {
            username: username.to_string(),
            password: Zeroizing::new(password.to_string()),
            nonce,
            _algorithm: PhantomData,
        }
    }

    /// Produce the client-first payload and advance to awaiting the
    /// server-first response.
    #[must_use]
    pub fn client_first(self) -> (AwaitingServerFirst<A>, Vec<u8>) {
        let client_first = ClientFirstMessage::new(&self.username, self.nonce.clone());
        let payload = client_first.message().into_bytes();
        (
            AwaitingServerFirst {
                password: self.password,
                client_nonce: self.nonce,
                client_first,
                _algorithm: PhantomData,
            },
            payload,
        )
    }
}

impl<A: ScramAlgorithm> std::fmt::Debug for ScramClient<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ScramClient(<redacted>)")
    }
}

/// Second state: the client-first message is on the wire.
pub struct AwaitingServerFirst<A: ScramAlgorithm> {
    password: Zeroizing<String>,
    client_nonce: String,
    client_first: ClientFirstMessage,
    _algorithm: PhantomData<A>,
}

impl<A: ScramAlgorithm> std::fmt::Debug for AwaitingServerFirst<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AwaitingServerFirst(<redacted>)")
    }
}

impl<A: ScramAlgorithm> AwaitingServerFirst<A> {
    /// Validate the server-first payload and produce the client-final
    /// payload.
    ///
    /// The nonce-prefix and iteration-floor checks run before any key
    /// derivation: derivation never executes on unchecked input. Both checks
    /// are security boundaries, not formatting validation.
    pub fn handle_server_first(
        self,
        payload: &[u8],
    ) -> Result<(AwaitingServerFinal<A>, Vec<u8>), ScramError> {
        let server_first = ServerFirstMessage::parse(payload)?;

        if !server_first.nonce().starts_with(&self.client_nonce) {
            return Err(ScramError::NonceMismatch);
        }
        if server_first.iterations() < A::MIN_ITERATIONS {
            return Err(ScramError::WeakIterationCount {
                iterations: server_first.iterations(),
                minimum: A::MIN_ITERATIONS,
            });
        }

        let salted_password = A::hi(
            self.password.as_bytes(),
            server_first.salt(),
            server_first.iterations(),
        );

        let client_final = ClientFinalMessage::new(server_first.nonce());
        let proof = A::client_proof(
            &salted_password,
            &self.client_first,
            &server_first,
            &client_final,
        );
        let payload = client_final.message(proof.as_bytes()).into_bytes();

        Ok((
            AwaitingServerFinal {
                salted_password,
                client_first: self.client_first,
                server_first,
                client_final,
                _algorithm: PhantomData,
            },
            payload,
        ))
    }
}

/// Third state: the client-final message is on the wire.
pub struct AwaitingServerFinal<A: ScramAlgorithm> {
    salted_password: SaltedPassword,
    client_first: ClientFirstMessage,
    server_first: ServerFirstMessage,
    client_final: ClientFinalMessage,
    _algorithm: PhantomData<A>,
}

impl<A: ScramAlgorithm> std::fmt::Debug for AwaitingServerFinal<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AwaitingServerFinal(<redacted>)")
    }
}

impl<A: ScramAlgorithm> AwaitingServerFinal<A> {
    /// Verify the server proved possession of the shared secret.
    ///
    /// `Ok(())` is the authenticated outcome; all secrets held by this state
    /// are dropped (and zeroed) on return either way.
    pub fn handle_server_final(self, payload: &[u8]) -> Result<(), ScramError> {
        let server_final = ServerFinalMessage::parse(payload)?;

        if let Some(error) = server_final.error() {
            return Err(ScramError::ServerError(error.to_string()));
        }

        let server_key = A::server_key(&self.salted_password);
        let expected = A::server_signature(
            &server_key,
            &self.client_first,
            &self.server_first,
            &self.client_final,
        );

        match server_final.signature() {
            Some(supplied) if expected.matches(supplied) => Ok(()),
            _ => Err(ScramError::SignatureMismatch),
        }
    }
}
