//! Per-peer secure channel: ephemeral ECDH handshake followed by AEAD tagging/encryption with a
//! monotonic nonce.

use aes_gcm::{
    aead::{AeadInPlace, KeyInit},
    Aes256Gcm, Key,
};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::{
    crypto::{KeyExchangeContext, AEAD_KEY_LEN},
    error::ChannelError,
    header::{nonce_for, GcmHeader, TAG_LEN},
    NodeId,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelStatus {
    Initiated,
    Established,
}

/// A single peer's channel state. Created lazily by the `ChannelManager` and moves
/// `Initiated -> Established` exactly once.
pub struct Channel {
    peer: NodeId,
    status: ChannelStatus,
    ctx: Option<KeyExchangeContext>,
    key: Option<Aes256Gcm>,
    seq_no: AtomicU64,
}

impl Channel {
    pub(crate) fn new(peer: NodeId) -> Self {
        Self {
            peer,
            status: ChannelStatus::Initiated,
            ctx: Some(KeyExchangeContext::new()),
            key: None,
            seq_no: AtomicU64::new(0),
        }
    }

    pub fn status(&self) -> ChannelStatus {
        self.status
    }

    /// The local side's ephemeral public key while `Initiated`; `None` once `Established` (the
    /// key-exchange context has already been consumed and freed).
    pub fn get_public(&self) -> Option<[u8; 32]> {
        match self.status {
            ChannelStatus::Established => None,
            ChannelStatus::Initiated => {
                Some(self.ctx.as_ref().expect("ctx present while Initiated").own_public())
            }
        }
    }

    /// Loads the peer's ephemeral public key. Refused once `Established` (returns `false`).
    pub fn load_peer_public(&mut self, peer_public: &[u8; 32]) -> bool {
        if self.status == ChannelStatus::Established {
            return false;
        }
        let ctx = self.ctx.take().expect("ctx present while Initiated");
        let key_bytes = ctx.compute_aead_key(peer_public);
        self.key = Some(Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes)));
        true
    }

    /// Moves the channel to `Established`. Must be called after a successful
    /// `load_peer_public`.
    pub fn establish(&mut self) {
        self.status = ChannelStatus::Established;
        debug!(peer = self.peer, "channel established");
    }

    fn next_nonce(&self) -> u64 {
        self.seq_no.fetch_add(1, Ordering::Relaxed)
    }

    fn require_established(&self) -> Result<&Aes256Gcm, ChannelError> {
        if self.status != ChannelStatus::Established {
            return Err(ChannelError::Precondition { peer: self.peer });
        }
        Ok(self.key.as_ref().expect("key present while Established"))
    }

    /// Authenticates `aad` without encrypting any payload; returns the header carrying the
    /// fresh nonce and the resulting tag.
    pub fn tag(&self, aad: &[u8]) -> Result<GcmHeader, ChannelError> {
        let key = self.require_established()?;
        let seq_no = self.next_nonce();
        let mut empty = Vec::new();
        let computed_tag = key
            .encrypt_in_place_detached(&nonce_for(seq_no).into(), aad, &mut empty)
            .expect("AES-256-GCM encryption of an empty buffer cannot fail");
        Ok(GcmHeader::new(seq_no, computed_tag.into()))
    }

    /// Verifies a header/AAD pair produced by `tag`. Returns `false` on tag mismatch.
    pub fn verify(&self, header: &GcmHeader, aad: &[u8]) -> Result<bool, ChannelError> {
        let key = self.require_established()?;
        let mut empty = Vec::new();
        let ok = key
            .decrypt_in_place_detached(&header.nonce().into(), aad, &mut empty, &header.tag.into())
            .is_ok();
        Ok(ok)
    }

    /// Encrypts `plaintext` in place, authenticating `aad`. Returns the header carrying the
    /// fresh nonce and resulting tag; `plaintext` is overwritten with ciphertext.
    pub fn encrypt(&self, aad: &[u8], plaintext: &mut Vec<u8>) -> Result<GcmHeader, ChannelError> {
        let key = self.require_established()?;
        let seq_no = self.next_nonce();
        let tag = key
            .encrypt_in_place_detached(&nonce_for(seq_no).into(), aad, plaintext)
            .map_err(|_| ChannelError::Precondition { peer: self.peer })?;
        Ok(GcmHeader::new(seq_no, tag.into()))
    }

    /// Decrypts `ciphertext` in place. Returns `false` (and leaves `ciphertext` untouched) on
    /// tag mismatch; never writes partial plaintext on failure.
    pub fn decrypt(
        &self,
        header: &GcmHeader,
        aad: &[u8],
        ciphertext: &mut Vec<u8>,
    ) -> Result<bool, ChannelError> {
        let key = self.require_established()?;
        let backup = ciphertext.clone();
        match key.decrypt_in_place_detached(&header.nonce().into(), aad, ciphertext, &header.tag.into()) {
            Ok(()) => Ok(true),
            Err(_) => {
                *ciphertext = backup;
                Ok(false)
            }
        }
    }
}
