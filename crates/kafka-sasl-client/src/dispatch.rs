//! The boundary between the authentication flow and a broker transport.
//!
//! The handshake negotiator and the SCRAM driver speak to a broker only
//! through [`BrokerDispatch`]: one SASL request out, one response back, in
//! order, on one connection. SASL state is per-connection on the broker side,
//! so interleaving rounds from different exchanges on one transport is never
//! valid; implementations serialize their round trips.
//!
//! [`crate::connection::BrokerConnection`] implements this over TCP;
//! [`crate::testing::ScramBrokerSimulator`] implements it in-process.

use async_trait::async_trait;
use kafka_protocol::messages::{
    SaslAuthenticateRequest, SaslAuthenticateResponse, SaslHandshakeRequest, SaslHandshakeResponse,
};

use crate::error::Result;

/// Request/response access to one broker's SASL endpoints.
#[async_trait]
pub trait BrokerDispatch: Send + Sync {
    /// Identity of the broker behind this dispatch, for error attribution.
    fn broker_id(&self) -> i32;

    /// Send a SaslHandshake request and await the broker's response.
    ///
    /// # Errors
    ///
    /// Returns an error on transport or protocol codec failure. A handshake
    /// the broker rejects still resolves to `Ok` with a non-zero
    /// `error_code`; interpreting that is the caller's job.
    async fn sasl_handshake(&self, request: SaslHandshakeRequest) -> Result<SaslHandshakeResponse>;

    /// Send a SaslAuthenticate request and await the broker's response.
    ///
    /// # Errors
    ///
    /// Returns an error on transport or protocol codec failure, as for
    /// [`sasl_handshake`](BrokerDispatch::sasl_handshake).
    async fn sasl_authenticate(
        &self,
        request: SaslAuthenticateRequest,
    ) -> Result<SaslAuthenticateResponse>;
}
