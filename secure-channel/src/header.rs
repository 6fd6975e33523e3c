//! Fixed-layout AEAD header: a little-endian sequence number used as the GCM nonce, plus the
//! 16-byte authentication tag. Analogous to a `GcmHeader<sizeof(SeqNo)>` used as the on-wire
//! framing for every tagged/encrypted/verified/decrypted payload.

pub const TAG_LEN: usize = 16;
pub const NONCE_LEN: usize = 12;
pub const HEADER_LEN: usize = 8 + TAG_LEN;

/// On-wire header: `seq_no` (u64 LE) followed by the GCM tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GcmHeader {
    pub seq_no: u64,
    pub tag: [u8; TAG_LEN],
}

/// Expands a sequence number into a 96-bit GCM nonce: the 8-byte counter followed by 4 zero
/// bytes. The counter is never reused for a given key, which is all AES-GCM requires of its
/// nonce.
pub fn nonce_for(seq_no: u64) -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    nonce[..8].copy_from_slice(&seq_no.to_le_bytes());
    nonce
}

impl GcmHeader {
    pub fn new(seq_no: u64, tag: [u8; TAG_LEN]) -> Self {
        Self { seq_no, tag }
    }

    pub fn nonce(&self) -> [u8; NONCE_LEN] {
        nonce_for(self.seq_no)
    }

    pub fn to_bytes(self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[..8].copy_from_slice(&self.seq_no.to_le_bytes());
        out[8..].copy_from_slice(&self.tag);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != HEADER_LEN {
            return None;
        }
        let mut seq_bytes = [0u8; 8];
        seq_bytes.copy_from_slice(&bytes[..8]);
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&bytes[8..]);
        Some(Self {
            seq_no: u64::from_le_bytes(seq_bytes),
            tag,
        })
    }
}
