//! On-wire framing exchanged with peers, over the channel transport (§6). Not used for the
//! loopback path, which bypasses framing entirely.

use crate::ids::{Index, NodeId, View};

pub const MSG_TYPE_PBFT_MESSAGE: u8 = 1;
pub const MSG_TYPE_PBFT_APPEND_ENTRIES: u8 = 2;

const ENVELOPE_HEADER_LEN: usize = 1 + 8;

/// The fixed header prepended to every non-loopback outbound frame: `{msg_type, from_node}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeHeader {
    pub msg_type: u8,
    pub from_node: NodeId,
}

impl EnvelopeHeader {
    pub fn new(msg_type: u8, from_node: NodeId) -> Self {
        Self { msg_type, from_node }
    }

    pub fn encode_prefixed(self, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(ENVELOPE_HEADER_LEN + payload.len());
        out.push(self.msg_type);
        out.extend_from_slice(&self.from_node.to_le_bytes());
        out.extend_from_slice(payload);
        out
    }

    /// Splits `bytes` into its envelope header and the remainder, without copying the remainder.
    pub fn decode(bytes: &[u8]) -> Option<(Self, &[u8])> {
        if bytes.len() < ENVELOPE_HEADER_LEN {
            return None;
        }
        let msg_type = bytes[0];
        let mut from_node_bytes = [0u8; 8];
        from_node_bytes.copy_from_slice(&bytes[1..ENVELOPE_HEADER_LEN]);
        let from_node = NodeId::from_le_bytes(from_node_bytes);
        Some((Self { msg_type, from_node }, &bytes[ENVELOPE_HEADER_LEN..]))
    }
}

/// Fixed-record descriptor for `pbft_append_entries` frames (§6.2). Serialized with a trivial
/// fixed layout rather than a self-describing format: the record's shape never changes and this
/// keeps it dependency-free of the adapter's own `bcs`-encoded `Request` type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendEntriesDescriptor {
    pub prev_idx: Index,
    pub idx: Index,
    pub from_node: NodeId,
    pub term: View,
}

const APPEND_ENTRIES_LEN: usize = 8 * 4;

impl AppendEntriesDescriptor {
    pub fn encode(self) -> [u8; APPEND_ENTRIES_LEN] {
        let mut out = [0u8; APPEND_ENTRIES_LEN];
        out[0..8].copy_from_slice(&self.prev_idx.to_le_bytes());
        out[8..16].copy_from_slice(&self.idx.to_le_bytes());
        out[16..24].copy_from_slice(&self.from_node.to_le_bytes());
        out[24..32].copy_from_slice(&self.term.to_le_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < APPEND_ENTRIES_LEN {
            return None;
        }
        let field = |range: std::ops::Range<usize>| -> u64 {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&bytes[range]);
            u64::from_le_bytes(buf)
        };
        Some(Self {
            prev_idx: field(0..8),
            idx: field(8..16),
            from_node: field(16..24),
            term: field(24..32),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_round_trips() {
        let header = EnvelopeHeader::new(MSG_TYPE_PBFT_MESSAGE, 7);
        let framed = header.encode_prefixed(b"payload");
        let (decoded, rest) = EnvelopeHeader::decode(&framed).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(rest, b"payload");
    }

    #[test]
    fn envelope_decode_rejects_short_buffer() {
        assert!(EnvelopeHeader::decode(&[1, 2, 3]).is_none());
    }

    #[test]
    fn append_entries_descriptor_round_trips() {
        let descriptor = AppendEntriesDescriptor {
            prev_idx: 10,
            idx: 13,
            from_node: 2,
            term: 4,
        };
        let encoded = descriptor.encode();
        assert_eq!(AppendEntriesDescriptor::decode(&encoded), Some(descriptor));
    }
}
