//! TCP transport to a single Kafka broker.
//!
//! Manages one TCP connection with correlation id tracking for
//! request/response matching, and implements [`BrokerDispatch`] so the
//! authentication flow can run over it. Requests are framed with a 4-byte
//! big-endian length prefix; each round trip holds the stream lock so SASL
//! rounds on this connection never interleave.

use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use kafka_protocol::messages::{
    ApiKey, RequestHeader, ResponseHeader, SaslAuthenticateRequest, SaslAuthenticateResponse,
    SaslHandshakeRequest, SaslHandshakeResponse,
};
use kafka_protocol::protocol::{Decodable, Encodable, HeaderVersion, StrBytes};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use crate::dispatch::BrokerDispatch;
use crate::error::{AuthError, Result};

/// Default connection timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default request timeout.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// SaslHandshake API version used on the wire. Version 1 puts the
/// SaslAuthenticate rounds inside Kafka request envelopes rather than raw
/// SASL tokens, and is non-flexible, so the response header carries only the
/// correlation id.
const SASL_HANDSHAKE_VERSION: i16 = 1;

/// SaslAuthenticate API version used on the wire. Version 1 is non-flexible
/// and carries the error code, optional error message and auth bytes needed
/// here.
const SASL_AUTHENTICATE_VERSION: i16 = 1;

/// A connection to a single Kafka broker (plaintext TCP).
pub struct BrokerConnection {
    broker_id: i32,
    address: String,
    client_id: StrBytes,
    stream: Mutex<Option<TcpStream>>,
    correlation_id: AtomicI32,
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl BrokerConnection {
    /// Create a new broker connection (not yet connected).
    #[must_use]
    pub fn new(broker_id: i32, address: String, client_id: &str) -> Self {
        Self::with_timeouts(
            broker_id,
            address,
            client_id,
            DEFAULT_CONNECT_TIMEOUT,
            DEFAULT_REQUEST_TIMEOUT,
        )
    }

    /// Create a new broker connection with custom timeouts.
    #[must_use]
    pub fn with_timeouts(
        broker_id: i32,
        address: String,
        client_id: &str,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Self {
        Self {
            broker_id,
            address,
            client_id: StrBytes::from_string(client_id.to_string()),
            stream: Mutex::new(None),
            correlation_id: AtomicI32::new(0),
            connect_timeout,
            request_timeout,
        }
    }

    /// Get the broker ID.
    #[must_use]
    pub fn broker_id(&self) -> i32 {
        self.broker_id
    }

    /// Get the broker address.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Check if the connection is established.
    pub async fn is_connected(&self) -> bool {
        self.stream.lock().await.is_some()
    }

    /// Connect to the broker.
    ///
    /// Establishes the TCP connection only; authentication is driven
    /// separately via [`crate::authenticator::authenticate`].
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Io`] if the connection fails or times out.
    #[instrument(skip(self), fields(broker_id = self.broker_id, address = %self.address))]
    pub async fn connect(&self) -> Result<()> {
        let stream = match timeout(self.connect_timeout, TcpStream::connect(&self.address)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                warn!(error = %e, "failed to connect to broker");
                return Err(AuthError::Io {
                    broker_id: self.broker_id,
                    source: e,
                });
            }
            Err(_) => {
                warn!("connection timeout");
                return Err(AuthError::Io {
                    broker_id: self.broker_id,
                    source: std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        "connection timeout",
                    ),
                });
            }
        };

        *self.stream.lock().await = Some(stream);
        debug!("TCP connection established");
        Ok(())
    }

    /// Disconnect from the broker.
    pub async fn disconnect(&self) {
        *self.stream.lock().await = None;
    }

    /// Generate a new correlation ID.
    fn next_correlation_id(&self) -> i32 {
        self.correlation_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Encode a request, run one framed round trip, decode the response.
    ///
    /// Verifies the response correlation id against the one sent before
    /// decoding the body.
    async fn dispatch<Req, Resp>(&self, request: &Req, api_key: ApiKey, api_version: i16) -> Result<Resp>
    where
        Req: Encodable + HeaderVersion,
        Resp: Decodable + HeaderVersion,
    {
        let correlation_id = self.next_correlation_id();

        let mut header = RequestHeader::default();
        header.request_api_key = api_key as i16;
        header.request_api_version = api_version;
        header.correlation_id = correlation_id;
        header.client_id = Some(self.client_id.clone());

        let mut buf = BytesMut::new();
        header
            .encode(&mut buf, Req::header_version(api_version))
            .map_err(|e| AuthError::ProtocolEncode {
                broker_id: self.broker_id,
                message: format!("failed to encode request header: {e}"),
            })?;
        request
            .encode(&mut buf, api_version)
            .map_err(|e| AuthError::ProtocolEncode {
                broker_id: self.broker_id,
                message: format!("failed to encode request body: {e}"),
            })?;

        let response_bytes = self.round_trip(&buf).await?;

        let mut data = Bytes::from(response_bytes);
        let response_header = ResponseHeader::decode(&mut data, Resp::header_version(api_version))
            .map_err(|e| AuthError::ProtocolDecode {
                broker_id: self.broker_id,
                message: format!("failed to decode response header: {e}"),
            })?;

        if response_header.correlation_id != correlation_id {
            return Err(AuthError::CorrelationMismatch {
                broker_id: self.broker_id,
                expected: correlation_id,
                actual: response_header.correlation_id,
            });
        }

        Resp::decode(&mut data, api_version).map_err(|e| AuthError::ProtocolDecode {
            broker_id: self.broker_id,
            message: format!("failed to decode response body: {e}"),
        })
    }

    /// Write one length-prefixed request and read one length-prefixed
    /// response.
    ///
    /// The stream lock is held across the full round trip. On I/O failure or
    /// timeout the stream is dropped, because a half-completed frame leaves
    /// the connection unusable.
    async fn round_trip(&self, request_bytes: &[u8]) -> Result<Vec<u8>> {
        let mut guard = self.stream.lock().await;
        let stream = guard.as_mut().ok_or_else(|| AuthError::Io {
            broker_id: self.broker_id,
            source: std::io::Error::new(std::io::ErrorKind::NotConnected, "not connected"),
        })?;

        let mut write_buf = BytesMut::with_capacity(4 + request_bytes.len());
        write_buf.put_u32(request_bytes.len() as u32);
        write_buf.extend_from_slice(request_bytes);

        let result = timeout(self.request_timeout, async {
            stream.write_all(&write_buf).await?;
            stream.flush().await?;

            let mut len_buf = [0u8; 4];
            stream.read_exact(&mut len_buf).await?;
            let response_len = u32::from_be_bytes(len_buf) as usize;

            let mut response_buf = vec![0u8; response_len];
            stream.read_exact(&mut response_buf).await?;
            Ok::<_, std::io::Error>(response_buf)
        })
        .await;

        match result {
            Ok(Ok(buf)) => Ok(buf),
            Ok(Err(e)) => {
                *guard = None;
                Err(AuthError::Io {
                    broker_id: self.broker_id,
                    source: e,
                })
            }
            Err(_) => {
                *guard = None;
                Err(AuthError::Io {
                    broker_id: self.broker_id,
                    source: std::io::Error::new(std::io::ErrorKind::TimedOut, "request timeout"),
                })
            }
        }
    }
}

#[async_trait]
impl BrokerDispatch for BrokerConnection {
    fn broker_id(&self) -> i32 {
        self.broker_id
    }

    async fn sasl_handshake(&self, request: SaslHandshakeRequest) -> Result<SaslHandshakeResponse> {
        self.dispatch(&request, ApiKey::SaslHandshake, SASL_HANDSHAKE_VERSION)
            .await
    }

    async fn sasl_authenticate(
        &self,
        request: SaslAuthenticateRequest,
    ) -> Result<SaslAuthenticateResponse> {
        self.dispatch(
            &request,
            ApiKey::SaslAuthenticate,
            SASL_AUTHENTICATE_VERSION,
        )
        .await
    }
}
