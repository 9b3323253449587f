//! Per-hash-family SCRAM algorithm policy.
//!
//! One strategy trait covers everything that differs between SCRAM-SHA-256
//! and SCRAM-SHA-512: the hash primitive and the minimum acceptable
//! iteration count. The proof and signature computations of RFC 5802
//! section 3 are provided methods, so there is exactly one copy of that
//! control flow.

use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2_hmac;
use sha2::{Digest, Sha256, Sha512};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use super::messages::{ClientFinalMessage, ClientFirstMessage, ServerFirstMessage};

macro_rules! derived_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        ///
        /// The bytes are zeroed when the value is dropped and never appear in
        /// `Debug` output.
        pub struct $name(Zeroizing<Vec<u8>>);

        impl $name {
            pub(crate) fn new(bytes: Vec<u8>) -> Self {
                Self(Zeroizing::new(bytes))
            }

            /// Raw bytes of the derived value.
            #[must_use]
            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(concat!(stringify!($name), "(<redacted>)"))
            }
        }
    };
}

derived_key!(
    /// Salted password produced by the RFC 5802 `Hi` function.
    SaltedPassword
);
derived_key!(
    /// ClientKey XOR ClientSignature, sent in the client-final message.
    ClientProof
);
derived_key!(
    /// HMAC(SaltedPassword, "Server Key"), input to the server signature.
    ServerKey
);
derived_key!(
    /// HMAC(ServerKey, AuthMessage), the server's proof of the shared secret.
    ServerSignature
);

impl ServerSignature {
    /// Constant-time comparison against the signature supplied by the
    /// server.
    #[must_use]
    pub fn matches(&self, supplied: &[u8]) -> bool {
        bool::from(self.0.as_slice().ct_eq(supplied))
    }
}

/// The exact concatenation hashed into proofs and signatures (RFC 5802
/// section 3). Any byte deviation here invalidates mutual authentication, so
/// the server-first part is the raw received text, never a re-serialization.
pub(crate) fn auth_message(
    client_first: &ClientFirstMessage,
    server_first: &ServerFirstMessage,
    client_final: &ClientFinalMessage,
) -> String {
    format!(
        "{},{},{}",
        client_first.bare(),
        server_first.message(),
        client_final.without_proof()
    )
}

/// Strategy for one SCRAM hash family.
///
/// The state machine in [`super::client`] is generic over this trait; two
/// zero-sized instances exist, [`ScramSha256`] and [`ScramSha512`].
pub trait ScramAlgorithm: Send + Sync + 'static {
    /// Kafka mechanism name, e.g. `"SCRAM-SHA-256"`.
    const NAME: &'static str;

    /// Floor below which a server-offered iteration count is rejected.
    /// Protects against downgrade of the key-derivation cost.
    const MIN_ITERATIONS: u32;

    /// Digest output length in bytes.
    const KEY_LEN: usize;

    /// HMAC keyed with `key` over `data`.
    fn hmac(key: &[u8], data: &[u8]) -> Zeroizing<Vec<u8>>;

    /// The underlying hash function.
    fn hash(data: &[u8]) -> Vec<u8>;

    /// The RFC 5802 `Hi` function: iterated-HMAC key stretching of the
    /// password with the server-supplied salt, i.e. PBKDF2.
    fn hi(password: &[u8], salt: &[u8], iterations: u32) -> SaltedPassword;

    /// ClientProof = ClientKey XOR HMAC(H(ClientKey), AuthMessage).
    fn client_proof(
        salted_password: &SaltedPassword,
        client_first: &ClientFirstMessage,
        server_first: &ServerFirstMessage,
        client_final: &ClientFinalMessage,
    ) -> ClientProof {
        let client_key = Self::hmac(salted_password.as_bytes(), b"Client Key");
        let stored_key = Self::hash(&client_key);
        let auth = auth_message(client_first, server_first, client_final);
        let client_signature = Self::hmac(&stored_key, auth.as_bytes());
        let proof = client_key
            .iter()
            .zip(client_signature.iter())
            .map(|(key, sig)| key ^ sig)
            .collect();
        ClientProof::new(proof)
    }

    /// ServerKey = HMAC(SaltedPassword, "Server Key").
    fn server_key(salted_password: &SaltedPassword) -> ServerKey {
        ServerKey::new(Self::hmac(salted_password.as_bytes(), b"Server Key").to_vec())
    }

    /// ServerSignature = HMAC(ServerKey, AuthMessage).
    fn server_signature(
        server_key: &ServerKey,
        client_first: &ClientFirstMessage,
        server_first: &ServerFirstMessage,
        client_final: &ClientFinalMessage,
    ) -> ServerSignature {
        let auth = auth_message(client_first, server_first, client_final);
        ServerSignature::new(Self::hmac(server_key.as_bytes(), auth.as_bytes()).to_vec())
    }
}

/// SCRAM-SHA-256 (RFC 7677).
#[derive(Debug, Clone, Copy)]
pub struct ScramSha256;

impl ScramAlgorithm for ScramSha256 {
    const NAME: &'static str = "SCRAM-SHA-256";
    const MIN_ITERATIONS: u32 = 4096;
    const KEY_LEN: usize = 32;

    fn hmac(key: &[u8], data: &[u8]) -> Zeroizing<Vec<u8>> {
        let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("HMAC can take key of any size");
        mac.update(data);
        Zeroizing::new(mac.finalize().into_bytes().to_vec())
    }

    fn hash(data: &[u8]) -> Vec<u8> {
        Sha256::digest(data).to_vec()
    }

    fn hi(password: &[u8], salt: &[u8], iterations: u32) -> SaltedPassword {
        let mut output = vec![0u8; Self::KEY_LEN];
        pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut output);
        SaltedPassword::new(output)
    }
}

/// SCRAM-SHA-512 (RFC 7677 variant used by Kafka brokers).
#[derive(Debug, Clone, Copy)]
pub struct ScramSha512;

impl ScramAlgorithm for ScramSha512 {
    const NAME: &'static str = "SCRAM-SHA-512";
    const MIN_ITERATIONS: u32 = 4096;
    const KEY_LEN: usize = 64;

    fn hmac(key: &[u8], data: &[u8]) -> Zeroizing<Vec<u8>> {
        let mut mac = Hmac::<Sha512>::new_from_slice(key).expect("HMAC can take key of any size");
        mac.update(data);
        Zeroizing::new(mac.finalize().into_bytes().to_vec())
    }

    fn hash(data: &[u8]) -> Vec<u8> {
        Sha512::digest(data).to_vec()
    }

    fn hi(password: &[u8], salt: &[u8], iterations: u32) -> SaltedPassword {
        let mut output = vec![0u8; Self::KEY_LEN];
        pbkdf2_hmac::<Sha512>(password, salt, iterations, &mut output);
        SaltedPassword::new(output)
    }
}
