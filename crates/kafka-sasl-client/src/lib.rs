//! Client-side SASL/SCRAM authentication for Kafka broker connections.
//!
//! Implements the client half of SASL/SCRAM (RFC 5802) over the Kafka
//! SaslHandshake and SaslAuthenticate APIs, for both SCRAM-SHA-256 and
//! SCRAM-SHA-512. The crate is layered so each piece is testable on its own:
//!
//! - [`scram`] - the protocol itself: message codec, hash-family policy, and
//!   an I/O-free exchange state machine
//! - [`handshake`] - mechanism negotiation with the broker
//! - [`authenticator`] - the async driver tying handshake and exchange
//!   together over a transport
//! - [`dispatch`] - the transport boundary, one trait with one TCP
//!   implementation ([`connection`]) and one in-process implementation
//!   ([`testing`])
//!
//! # Example
//!
//! ```no_run
//! use kafka_sasl_client::{authenticate, BrokerConnection, SaslConfig, SaslMechanism};
//!
//! # async fn run() -> kafka_sasl_client::Result<()> {
//! let connection = BrokerConnection::new(0, "broker-0:9092".to_string(), "my-client");
//! connection.connect().await?;
//!
//! let config = SaslConfig {
//!     mechanism: SaslMechanism::ScramSha256,
//!     username: "alice".to_string(),
//!     password: "alice-secret".to_string(),
//! };
//! authenticate(&connection, &config).await?;
//! # Ok(())
//! # }
//! ```
//!
//! Credentials, salted passwords, derived keys and proofs are never logged,
//! and derived key material is zeroed on drop.

#![forbid(unsafe_code)]

pub mod authenticator;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod handshake;
pub mod scram;
pub mod testing;

pub use authenticator::{authenticate, authenticate_scram256, authenticate_scram512};
pub use config::{SaslConfig, SaslMechanism};
pub use connection::BrokerConnection;
pub use dispatch::BrokerDispatch;
pub use error::{AuthError, Result};
pub use handshake::perform_handshake;
