//! Domain error types for the SASL authentication engine.
//!
//! Uses `thiserror` for ergonomic error definitions with proper context.
//! Every failure is terminal for the current authentication attempt: none of
//! these errors are retried internally, because re-running a failed exchange
//! with stale nonce or derived-key material is unsafe. Callers that want to
//! retry must start an entirely fresh attempt.

use thiserror::Error;

use crate::scram::messages::MessageError;

/// Errors that occur while authenticating a connection to one broker.
///
/// Each variant carries the originating broker id and, where the protocol
/// supplies one, the server-provided human-readable message.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The broker rejected the SASL handshake request outright.
    #[error("broker {broker_id}: SASL handshake rejected (error code {error_code})")]
    HandshakeRejected { broker_id: i32, error_code: i16 },

    /// The handshake succeeded but the broker does not advertise the
    /// requested mechanism.
    #[error("broker {broker_id}: mechanism {mechanism} not supported by broker (supported: {supported:?})")]
    UnsupportedMechanism {
        broker_id: i32,
        mechanism: String,
        supported: Vec<String>,
    },

    /// An authenticate round came back with a non-success outer error code.
    #[error("broker {broker_id}: authenticate request rejected (error code {error_code}): {message}")]
    ServerRejected {
        broker_id: i32,
        error_code: i16,
        message: String,
    },

    /// A SCRAM payload from the broker did not parse.
    #[error("broker {broker_id}: malformed SCRAM message: {source}")]
    MalformedMessage {
        broker_id: i32,
        #[source]
        source: MessageError,
    },

    /// The echoed server nonce does not start with the client nonce that was
    /// sent. This is a security boundary against session-confusion attacks,
    /// not a formatting problem.
    #[error("broker {broker_id}: server nonce does not start with client nonce")]
    NonceMismatch { broker_id: i32 },

    /// The server offered an iteration count below the mechanism's floor,
    /// which would weaken the key derivation.
    #[error("broker {broker_id}: server iteration count {iterations} below required minimum {minimum}")]
    WeakIterationCount {
        broker_id: i32,
        iterations: u32,
        minimum: u32,
    },

    /// The server-final message carried an explicit SCRAM error attribute.
    #[error("broker {broker_id}: authentication failed: {message}")]
    AuthenticationFailed { broker_id: i32, message: String },

    /// The server signature did not match the locally computed one: the
    /// broker failed to prove possession of the shared secret. Treat as a
    /// potential man-in-the-middle, never as retryable.
    #[error("broker {broker_id}: server signature does not match calculated signature")]
    ServerSignatureInvalid { broker_id: i32 },

    /// Failed to encode a request for the wire.
    #[error("broker {broker_id}: failed to encode request: {message}")]
    ProtocolEncode { broker_id: i32, message: String },

    /// Failed to decode a response from the wire.
    #[error("broker {broker_id}: failed to decode response: {message}")]
    ProtocolDecode { broker_id: i32, message: String },

    /// A response arrived with the wrong correlation id.
    #[error("broker {broker_id}: correlation ID mismatch: expected {expected}, got {actual}")]
    CorrelationMismatch {
        broker_id: i32,
        expected: i32,
        actual: i32,
    },

    /// Transport failure (including request timeouts) during a dispatch.
    /// Cancelling an attempt is dropping its future; no variant is needed
    /// for it.
    #[error("broker {broker_id}: connection error: {source}")]
    Io {
        broker_id: i32,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;
