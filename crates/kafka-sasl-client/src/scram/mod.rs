//! Client-side SCRAM (RFC 5802) for SASL authentication.
//!
//! SCRAM (Salted Challenge Response Authentication Mechanism) proves both
//! sides know a shared secret without transmitting it, in two round trips.
//! The module is split the way the protocol is layered:
//!
//! - [`messages`] - the four wire message types and their text codec
//! - [`algorithm`] - per-hash-family policy (SHA-256, SHA-512): key
//!   derivation, proofs and signatures
//! - [`client`] - the exchange itself as an explicit state machine, free of
//!   any I/O

pub mod algorithm;
pub mod client;
pub mod messages;

pub use algorithm::{
    ClientProof, SaltedPassword, ScramAlgorithm, ScramSha256, ScramSha512, ServerKey,
    ServerSignature,
};
pub use client::{AwaitingServerFinal, AwaitingServerFirst, ScramClient, ScramError};
pub use messages::{
    ClientFinalMessage, ClientFirstMessage, MessageError, ServerFinalMessage, ServerFirstMessage,
};
