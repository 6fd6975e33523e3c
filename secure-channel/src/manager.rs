//! Owns every peer `Channel`, keyed by `NodeId`. Produces and verifies the signed-public
//! handshake blob, and wraps channel AEAD operations for authenticated send/recv of arbitrary
//! consensus frames.
//!
//! The map is a concurrent, insert-only `DashMap`: the consensus thread is the only writer
//! (channels are created lazily on first reference and never removed), while authenticated-send
//! may be invoked from a networking thread concurrently with authenticated-recv on another.

use dashmap::DashMap;
use tracing::warn;

use crate::{
    channel::{Channel, ChannelStatus},
    crypto::{NetworkKeyPair, NetworkPublicKey, NetworkSignature},
    error::ChannelError,
    header::GcmHeader,
    NodeId,
};

/// Byte layout of the signed-public blob: `u64 len_pub | pub | u64 len_sig | sig`, both length
/// prefixes fixed at 64-bit little-endian regardless of host `size_t` width.
const LEN_PREFIX_SIZE: usize = 8;

pub struct ChannelManager {
    channels: DashMap<NodeId, Channel>,
    network_keypair: NetworkKeyPair,
    network_public: NetworkPublicKey,
}

impl ChannelManager {
    pub fn new(network_keypair: NetworkKeyPair) -> Self {
        let network_public = network_keypair.public();
        Self {
            channels: DashMap::new(),
            network_keypair,
            network_public,
        }
    }

    pub fn network_public(&self) -> NetworkPublicKey {
        self.network_public.clone()
    }

    /// Returns the peer's channel status, creating the channel lazily if this is the first
    /// reference to it.
    pub fn channel_status(&self, peer: NodeId) -> ChannelStatus {
        self.channels
            .entry(peer)
            .or_insert_with(|| Channel::new(peer))
            .status()
    }

    /// Builds the local ephemeral public key for `peer`, signed by the network keypair, in the
    /// bit-exact wire layout documented above. Returns `None` if the channel is already
    /// established (there is no ephemeral public key left to sign).
    pub fn get_signed_public(&self, peer: NodeId) -> Option<Vec<u8>> {
        let own_public = {
            let entry = self.channels.entry(peer).or_insert_with(|| Channel::new(peer));
            entry.get_public()?
        };

        let signature = self.network_keypair.sign(&own_public);
        let sig_bytes = signature.to_bytes();

        let mut out = Vec::with_capacity(2 * LEN_PREFIX_SIZE + own_public.len() + sig_bytes.len());
        out.extend_from_slice(&(own_public.len() as u64).to_le_bytes());
        out.extend_from_slice(&own_public);
        out.extend_from_slice(&(sig_bytes.len() as u64).to_le_bytes());
        out.extend_from_slice(&sig_bytes);
        Some(out)
    }

    /// Parses, verifies, and installs a peer's signed-public blob. On success, moves the
    /// channel to `Established`.
    pub fn load_peer_signed_public(
        &self,
        peer: NodeId,
        blob: &[u8],
    ) -> Result<(), ChannelError> {
        let (peer_public, signature_bytes) = parse_signed_public(peer, blob)?;

        let signature = NetworkSignature::from_bytes(signature_bytes).map_err(|_| {
            ChannelError::MalformedSignedPublic {
                peer,
                reason: "signature bytes do not decode",
            }
        })?;
        self.network_public
            .verify(peer_public, &signature)
            .map_err(|_| ChannelError::SignatureVerification { peer })?;

        let mut peer_public_arr = [0u8; 32];
        if peer_public.len() != peer_public_arr.len() {
            return Err(ChannelError::MalformedSignedPublic {
                peer,
                reason: "peer public key is not 32 bytes",
            });
        }
        peer_public_arr.copy_from_slice(peer_public);

        let mut entry = self.channels.entry(peer).or_insert_with(|| Channel::new(peer));
        if !entry.load_peer_public(&peer_public_arr) {
            return Err(ChannelError::Precondition { peer });
        }
        entry.establish();
        Ok(())
    }

    /// Tags/encrypts `plaintext` for `peer`, returning the wire header and leaving the ciphertext
    /// in place. Fails with `Precondition` if the channel is not yet established.
    pub fn authenticated_send(
        &self,
        peer: NodeId,
        aad: &[u8],
        plaintext: &mut Vec<u8>,
    ) -> Result<GcmHeader, ChannelError> {
        let entry = self.channels.entry(peer).or_insert_with(|| Channel::new(peer));
        entry.encrypt(aad, plaintext)
    }

    /// Verifies and decrypts an inbound frame from `peer`. Returns `Ok(false)` on tag mismatch
    /// (caller should drop the frame and log, per the malformed-frame disposition); never
    /// writes partial plaintext on failure.
    pub fn authenticated_recv(
        &self,
        peer: NodeId,
        header: &GcmHeader,
        aad: &[u8],
        ciphertext: &mut Vec<u8>,
    ) -> Result<bool, ChannelError> {
        let entry = self.channels.entry(peer).or_insert_with(|| Channel::new(peer));
        let ok = entry.decrypt(header, aad, ciphertext)?;
        if !ok {
            warn!(peer, "authenticated-recv failed tag verification, dropping frame");
        }
        Ok(ok)
    }
}

/// Parses `len_pub | pub | len_sig | sig` and validates that the declared lengths exactly
/// consume the buffer: rejects both a too-long prefix (overruns the buffer) and a too-short
/// signature (the signature must use every remaining byte).
fn parse_signed_public(peer: NodeId, blob: &[u8]) -> Result<(&[u8], &[u8]), ChannelError> {
    let too_short = || ChannelError::MalformedSignedPublic {
        peer,
        reason: "buffer shorter than the declared length prefix",
    };

    if blob.len() < LEN_PREFIX_SIZE {
        return Err(too_short());
    }
    let (len_pub_bytes, rest) = blob.split_at(LEN_PREFIX_SIZE);
    let len_pub = u64::from_le_bytes(len_pub_bytes.try_into().unwrap()) as usize;

    if len_pub > rest.len() {
        return Err(too_short());
    }
    let (pub_bytes, rest) = rest.split_at(len_pub);

    if rest.len() < LEN_PREFIX_SIZE {
        return Err(too_short());
    }
    let (len_sig_bytes, rest) = rest.split_at(LEN_PREFIX_SIZE);
    let len_sig = u64::from_le_bytes(len_sig_bytes.try_into().unwrap()) as usize;

    if len_sig > rest.len() {
        return Err(too_short());
    }
    if len_sig < rest.len() {
        return Err(ChannelError::MalformedSignedPublic {
            peer,
            reason: "signature does not consume all remaining bytes",
        });
    }

    Ok((pub_bytes, rest))
}
