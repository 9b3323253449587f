//! SCRAM message types and their RFC 5802 text codec.
//!
//! The four messages exchanged during a SCRAM handshake use the
//! comma-separated `attr=value` text form of RFC 5802 section 7, carried as
//! opaque byte payloads inside the outer SaslAuthenticate envelope. Everything
//! here is a pure transform: no I/O, no crypto, no mutable state beyond the
//! set-once client proof.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use thiserror::Error;

/// GS2 header sent by a client that neither supports nor requires channel
/// binding.
pub const GS2_HEADER: &str = "n,,";

/// base64("n,,"): the channel-binding attribute echoed in the client-final
/// message.
pub const CHANNEL_BINDING: &str = "biws";

/// Errors produced when a server payload does not parse as a SCRAM message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MessageError {
    /// The payload is not valid UTF-8 text.
    #[error("payload is not valid UTF-8")]
    InvalidUtf8,
    /// A mandatory attribute is absent.
    #[error("missing mandatory field '{0}='")]
    MissingField(&'static str),
    /// An attribute is present but its value does not parse.
    #[error("invalid value for field '{0}='")]
    InvalidField(&'static str),
}

/// The message a client sends to open a SCRAM exchange.
///
/// Wire form: `n,,n=<username>,r=<client_nonce>`.
#[derive(Debug, Clone)]
pub struct ClientFirstMessage {
    username: String,
    nonce: String,
}

impl ClientFirstMessage {
    /// Build the first message from the authentication username and a fresh
    /// client nonce. `,` and `=` in the username are escaped per the RFC 5802
    /// `saslname` rules.
    #[must_use]
    pub fn new(username: &str, nonce: String) -> Self {
        let username = username.replace('=', "=3D").replace(',', "=2C");
        Self { username, nonce }
    }

    /// The client nonce carried in this message.
    #[must_use]
    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    /// client-first-message-bare: the part covered by the auth message.
    #[must_use]
    pub fn bare(&self) -> String {
        format!("n={},r={}", self.username, self.nonce)
    }

    /// The full wire form, including the GS2 header.
    #[must_use]
    pub fn message(&self) -> String {
        format!("{GS2_HEADER}{}", self.bare())
    }
}

/// The broker's reply to the client-first message.
///
/// Wire form: `r=<nonce>,s=<base64 salt>,i=<iterations>`.
#[derive(Debug, Clone)]
pub struct ServerFirstMessage {
    raw: String,
    nonce: String,
    salt: Vec<u8>,
    iterations: u32,
}

impl ServerFirstMessage {
    /// Parse a server-first payload. All three attributes are mandatory;
    /// the salt must be valid base64 and the iteration count decimal.
    pub fn parse(payload: &[u8]) -> Result<Self, MessageError> {
        let raw = std::str::from_utf8(payload).map_err(|_| MessageError::InvalidUtf8)?;

        let mut nonce = None;
        let mut salt = None;
        let mut iterations = None;

        for part in raw.split(',') {
            if let Some(value) = part.strip_prefix("r=") {
                nonce = Some(value.to_string());
            } else if let Some(value) = part.strip_prefix("s=") {
                salt = Some(
                    BASE64
                        .decode(value)
                        .map_err(|_| MessageError::InvalidField("s"))?,
                );
            } else if let Some(value) = part.strip_prefix("i=") {
                iterations = Some(
                    value
                        .parse::<u32>()
                        .map_err(|_| MessageError::InvalidField("i"))?,
                );
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            nonce: nonce.ok_or(MessageError::MissingField("r"))?,
            salt: salt.ok_or(MessageError::MissingField("s"))?,
            iterations: iterations.ok_or(MessageError::MissingField("i"))?,
        })
    }

    /// The combined nonce (client nonce plus server extension).
    #[must_use]
    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    /// The decoded salt bytes.
    #[must_use]
    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    /// The server-offered iteration count.
    #[must_use]
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// The exact text as received. The auth message must include it byte for
    /// byte, so the parsed fields are never re-serialized.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.raw
    }
}

/// The message a client sends after validating the server-first reply.
///
/// Wire form: `c=biws,r=<nonce>,p=<base64 proof>`. The proof is supplied at
/// serialization time, once the auth message (which covers only the
/// proof-less prefix) is fixed; a proof-less wire form cannot be produced.
#[derive(Debug, Clone)]
pub struct ClientFinalMessage {
    nonce: String,
}

impl ClientFinalMessage {
    /// Build the final message echoing the full combined nonce from the
    /// server-first reply.
    #[must_use]
    pub fn new(nonce: &str) -> Self {
        Self {
            nonce: nonce.to_string(),
        }
    }

    /// client-final-message-without-proof: the part covered by the auth
    /// message.
    #[must_use]
    pub fn without_proof(&self) -> String {
        format!("c={CHANNEL_BINDING},r={}", self.nonce)
    }

    /// The full wire form carrying the computed client proof.
    #[must_use]
    pub fn message(&self, proof: &[u8]) -> String {
        format!("{},p={}", self.without_proof(), BASE64.encode(proof))
    }
}

/// The broker's last word: a server signature on success, an error text on
/// rejection.
#[derive(Debug, Clone)]
pub struct ServerFinalMessage {
    signature: Option<Vec<u8>>,
    error: Option<String>,
}

impl ServerFinalMessage {
    /// Parse a server-final payload: either `v=<base64 signature>` or
    /// `e=<error text>`.
    pub fn parse(payload: &[u8]) -> Result<Self, MessageError> {
        let raw = std::str::from_utf8(payload).map_err(|_| MessageError::InvalidUtf8)?;

        if let Some(value) = raw.strip_prefix("v=") {
            let signature = BASE64
                .decode(value)
                .map_err(|_| MessageError::InvalidField("v"))?;
            Ok(Self {
                signature: Some(signature),
                error: None,
            })
        } else if let Some(value) = raw.strip_prefix("e=") {
            Ok(Self {
                signature: None,
                error: Some(value.to_string()),
            })
        } else {
            Err(MessageError::MissingField("v"))
        }
    }

    /// The error text, if the server rejected the exchange.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The server signature, if the server accepted the client proof.
    #[must_use]
    pub fn signature(&self) -> Option<&[u8]> {
        self.signature.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD as BASE64;

    #[test]
    fn client_first_wire_form() {
        let msg = ClientFirstMessage::new("user", "rOprNGfwEbeRWgbNEkqO".to_string());
        assert_eq!(msg.bare(), "n=user,r=rOprNGfwEbeRWgbNEkqO");
        assert_eq!(msg.message(), "n,,n=user,r=rOprNGfwEbeRWgbNEkqO");
    }

    #[test]
    fn client_first_escapes_reserved_characters() {
        let msg = ClientFirstMessage::new("a=b,c", "nonce".to_string());
        assert_eq!(msg.bare(), "n=a=3Db=2Cc,r=nonce");
    }

    #[test]
    fn server_first_parses_all_fields() {
        let msg = ServerFirstMessage::parse(b"r=clientservernonce,s=c2FsdA==,i=4096").unwrap();
        assert_eq!(msg.nonce(), "clientservernonce");
        assert_eq!(msg.salt(), b"salt");
        assert_eq!(msg.iterations(), 4096);
        assert_eq!(msg.message(), "r=clientservernonce,s=c2FsdA==,i=4096");
    }

    #[test]
    fn server_first_tolerates_extensions() {
        let msg = ServerFirstMessage::parse(b"r=nonce,s=c2FsdA==,i=4096,x=whatever").unwrap();
        assert_eq!(msg.iterations(), 4096);
    }

    #[test]
    fn server_first_missing_nonce() {
        let err = ServerFirstMessage::parse(b"s=c2FsdA==,i=4096").unwrap_err();
        assert_eq!(err, MessageError::MissingField("r"));
    }

    #[test]
    fn server_first_missing_salt() {
        let err = ServerFirstMessage::parse(b"r=nonce,i=4096").unwrap_err();
        assert_eq!(err, MessageError::MissingField("s"));
    }

    #[test]
    fn server_first_missing_iterations() {
        let err = ServerFirstMessage::parse(b"r=nonce,s=c2FsdA==").unwrap_err();
        assert_eq!(err, MessageError::MissingField("i"));
    }

    #[test]
    fn server_first_rejects_invalid_salt_encoding() {
        let err = ServerFirstMessage::parse(b"r=nonce,s=!!!,i=4096").unwrap_err();
        assert_eq!(err, MessageError::InvalidField("s"));
    }

    #[test]
    fn server_first_rejects_non_numeric_iterations() {
        let err = ServerFirstMessage::parse(b"r=nonce,s=c2FsdA==,i=lots").unwrap_err();
        assert_eq!(err, MessageError::InvalidField("i"));
    }

    #[test]
    fn server_first_rejects_non_utf8() {
        let err = ServerFirstMessage::parse(&[0xff, 0xfe, 0x00]).unwrap_err();
        assert_eq!(err, MessageError::InvalidUtf8);
    }

    #[test]
    fn client_final_wire_form() {
        let msg = ClientFinalMessage::new("combinednonce");
        assert_eq!(msg.without_proof(), "c=biws,r=combinednonce");
        assert_eq!(
            msg.message(b"proofbytes"),
            format!("c=biws,r=combinednonce,p={}", BASE64.encode(b"proofbytes"))
        );
    }

    #[test]
    fn channel_binding_is_base64_of_gs2_header() {
        assert_eq!(BASE64.encode(GS2_HEADER.as_bytes()), CHANNEL_BINDING);
    }

    #[test]
    fn server_final_parses_signature() {
        let msg = ServerFinalMessage::parse(b"v=c2lnbmF0dXJl").unwrap();
        assert_eq!(msg.signature(), Some(&b"signature"[..]));
        assert_eq!(msg.error(), None);
    }

    #[test]
    fn server_final_parses_error() {
        let msg = ServerFinalMessage::parse(b"e=other-error").unwrap();
        assert_eq!(msg.error(), Some("other-error"));
        assert_eq!(msg.signature(), None);
    }

    #[test]
    fn server_final_rejects_unknown_attribute() {
        let err = ServerFinalMessage::parse(b"x=unexpected").unwrap_err();
        assert_eq!(err, MessageError::MissingField("v"));
    }

    #[test]
    fn server_final_rejects_invalid_signature_encoding() {
        let err = ServerFinalMessage::parse(b"v=!!!not-base64!!!").unwrap_err();
        assert_eq!(err, MessageError::InvalidField("v"));
    }
}
