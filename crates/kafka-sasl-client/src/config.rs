//! Configuration types for broker authentication.
//!
//! These are plain value types; loading them from a configuration file is the
//! embedding client's concern.

use serde::{Deserialize, Serialize};

/// SASL mechanism used to authenticate broker connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum SaslMechanism {
    /// SASL/SCRAM-SHA-256 - salted challenge-response authentication.
    #[serde(rename = "SCRAM-SHA-256")]
    ScramSha256,
    /// SASL/SCRAM-SHA-512 - salted challenge-response authentication.
    #[serde(rename = "SCRAM-SHA-512")]
    ScramSha512,
}

impl SaslMechanism {
    /// Get the Kafka mechanism name as used in the SASL handshake.
    #[must_use]
    pub fn mechanism_name(&self) -> &'static str {
        match self {
            Self::ScramSha256 => "SCRAM-SHA-256",
            Self::ScramSha512 => "SCRAM-SHA-512",
        }
    }
}

/// SASL authentication configuration for one broker connection.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SaslConfig {
    /// SASL mechanism to use.
    pub mechanism: SaslMechanism,

    /// Username for authentication.
    pub username: String,

    /// Password for authentication.
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mechanism_names_match_kafka_wire_names() {
        assert_eq!(SaslMechanism::ScramSha256.mechanism_name(), "SCRAM-SHA-256");
        assert_eq!(SaslMechanism::ScramSha512.mechanism_name(), "SCRAM-SHA-512");
    }
}
