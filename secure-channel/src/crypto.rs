//! Cryptographic primitives used by the secure channel: the network-wide signing keypair (used
//! to authenticate ephemeral ECDH public keys during the handshake) and the ephemeral
//! Diffie-Hellman exchange itself.
//!
//! Mirrors the alias-only style of a committee crypto module: callers only ever see the
//! newtypes below, never the underlying scheme implementations, so the scheme can be swapped in
//! one place without breaking call sites.

use fastcrypto::{
    ed25519,
    error::FastCryptoError,
    traits::{KeyPair as _, Signer as _, ToFromBytes as _, VerifyingKey as _},
};
use hkdf::Hkdf;
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;
use x25519_dalek::{EphemeralSecret, PublicKey as X25519PublicKey};
use zeroize::Zeroize;

/// Length in bytes of the AEAD key derived for an established channel (AES-256-GCM).
pub const AEAD_KEY_LEN: usize = 32;

/// The network-wide keypair used to sign every node's ephemeral public key during the
/// handshake. Shared out of band across the cluster at bootstrap time.
pub struct NetworkKeyPair(ed25519::Ed25519KeyPair);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkPublicKey(ed25519::Ed25519PublicKey);

pub struct NetworkSignature(ed25519::Ed25519Signature);

impl NetworkKeyPair {
    pub fn generate<R: rand::Rng + fastcrypto::traits::AllowedRng>(rng: &mut R) -> Self {
        Self(ed25519::Ed25519KeyPair::generate(rng))
    }

    pub fn public(&self) -> NetworkPublicKey {
        NetworkPublicKey(self.0.public().clone())
    }

    pub fn sign(&self, message: &[u8]) -> NetworkSignature {
        NetworkSignature(self.0.sign(message))
    }
}

impl Clone for NetworkKeyPair {
    fn clone(&self) -> Self {
        Self(self.0.copy())
    }
}

impl NetworkPublicKey {
    pub fn verify(&self, message: &[u8], signature: &NetworkSignature) -> Result<(), FastCryptoError> {
        self.0.verify(message, &signature.0)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.as_bytes().to_vec()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FastCryptoError> {
        Ok(Self(ed25519::Ed25519PublicKey::from_bytes(bytes)?))
    }
}

/// Serialized as its raw bytes; cluster config files carry this over the wire/on disk, so it
/// needs a stable encoding independent of `fastcrypto`'s own derive (if any).
impl serde::Serialize for NetworkPublicKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serde_bytes::Bytes::new(&self.to_bytes()).serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for NetworkPublicKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes = <serde_bytes::ByteBuf as serde::Deserialize>::deserialize(deserializer)?;
        Self::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

impl NetworkSignature {
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.as_bytes().to_vec()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FastCryptoError> {
        Ok(Self(ed25519::Ed25519Signature::from_bytes(bytes)?))
    }
}

/// Ephemeral ECDH exchange context for one side of a channel handshake. Valid only while the
/// channel is `INITIATED`; `establish` consumes it.
pub struct KeyExchangeContext {
    secret: Option<EphemeralSecret>,
    public: X25519PublicKey,
}

impl KeyExchangeContext {
    pub fn new() -> Self {
        let secret = EphemeralSecret::random_from_rng(OsRng);
        let public = X25519PublicKey::from(&secret);
        Self {
            secret: Some(secret),
            public,
        }
    }

    /// The local side's ephemeral public key, as a fixed 32-byte encoding.
    pub fn own_public(&self) -> [u8; 32] {
        *self.public.as_bytes()
    }

    /// Consume the context against the peer's ephemeral public key, deriving a symmetric AEAD
    /// key via HKDF-SHA256 over the raw Diffie-Hellman shared secret.
    ///
    /// Panics if called twice; the channel state machine guarantees this is called at most once
    /// per `KeyExchangeContext`.
    pub fn compute_aead_key(mut self, peer_public: &[u8; 32]) -> [u8; AEAD_KEY_LEN] {
        let secret = self.secret.take().expect("key exchange already consumed");
        let peer_public = X25519PublicKey::from(*peer_public);
        let mut shared_secret = secret.diffie_hellman(&peer_public).to_bytes();

        let hk = Hkdf::<Sha256>::new(None, &shared_secret);
        let mut key = [0u8; AEAD_KEY_LEN];
        hk.expand(b"ccf-consensus-channel-aead", &mut key)
            .expect("HKDF output length is valid for SHA-256");

        shared_secret.zeroize();
        key
    }
}

impl Default for KeyExchangeContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Fills `dst` with cryptographically secure random bytes. Used for nonces that are not the
/// per-channel sequence number (none at present; kept as the single entry point so a future
/// caller doesn't reach for `rand` directly).
#[allow(dead_code)]
pub(crate) fn fill_random(dst: &mut [u8]) {
    OsRng.fill_bytes(dst);
}
