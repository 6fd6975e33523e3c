//! Network Shim (§4.2): wraps every outbound Replica Core message in a framed, authenticated
//! envelope, and demultiplexes inbound envelopes to either the Replica Core or the append-entries
//! path.
//!
//! Holds a shared, non-owning reference to the `ChannelManager` and a `SinkHandle` back into the
//! Replica Core's message sink, set once after construction (§9 sink-handle design note).

use std::sync::Arc;

use secure_channel::{ChannelManager, GcmHeader, NodeId};
use tracing::warn;

use crate::{
    collaborators::{DeserialiseOutcome, Ledger, Store},
    error::{AdapterError, FatalReason},
    ids::Index,
    metrics::Metrics,
    replica_core::ReplicaCore,
    sink::SinkHandle,
    wire::{AppendEntriesDescriptor, EnvelopeHeader, MSG_TYPE_PBFT_APPEND_ENTRIES, MSG_TYPE_PBFT_MESSAGE},
};

pub struct NetworkShim {
    local_id: NodeId,
    channels: Arc<ChannelManager>,
    // `SinkHandle<T>` requires a sized `T`; `Arc<dyn ReplicaCore>` is one (a trait object pointer
    // is a concrete two-word type), so the sink just holds that directly wrapped in the handle's
    // own `Arc`.
    replica_sink: SinkHandle<Arc<dyn ReplicaCore>>,
    metrics: Arc<Metrics>,
}

impl NetworkShim {
    pub fn new(local_id: NodeId, channels: Arc<ChannelManager>, metrics: Arc<Metrics>) -> Self {
        Self {
            local_id,
            channels,
            replica_sink: SinkHandle::unattached(),
            metrics,
        }
    }

    pub fn attach_replica_core(&self, replica: Arc<dyn ReplicaCore>) {
        self.replica_sink.attach(Arc::new(replica));
    }

    /// Outbound send (§4.2). Loopback when `destination == local_id` bypasses framing and the
    /// channel layer entirely; this is the mandatory path for a single replica (`f == 0`) issuing
    /// messages to itself. Returns the original message size regardless of path.
    pub fn send(&self, message: &[u8], destination: NodeId) -> Result<usize, AdapterError> {
        let len = message.len();
        if destination == self.local_id {
            self.replica_sink.get()?.receive_message(message);
            return Ok(len);
        }

        let header = EnvelopeHeader::new(MSG_TYPE_PBFT_MESSAGE, self.local_id);
        let mut body = header.encode_prefixed(message);
        // Envelope and payload are both encrypted; nothing here needs to be visible on the
        // wire unencrypted, so the AAD is empty.
        let aead_header = self.channels.authenticated_send(destination, &[], &mut body)?;

        // Handing `aead_header || body` to the actual transport is outside this crate; the
        // shim's contract is to produce the framed, encrypted buffer and report the size sent.
        let _ = aead_header;
        Ok(len)
    }

    /// Completes the handshake with `peer` using a signed-public blob received out of band
    /// (§4.5). Bumps `channel_handshakes_completed` on success.
    pub fn complete_handshake(&self, peer: NodeId, blob: &[u8]) -> Result<(), AdapterError> {
        self.channels.load_peer_signed_public(peer, blob)?;
        self.metrics.channel_handshakes_completed.inc();
        Ok(())
    }

    /// Authenticate-recv's one wire frame from `peer` and, on success, dispatches the decrypted
    /// envelope the same way `recv_message` does. A failed tag verification drops the frame and
    /// bumps `channel_frames_dropped` rather than treating it as fatal (§7: malformed frames are
    /// recoverable, not a distinguished failure).
    pub fn recv_wire_frame(
        &self,
        peer: NodeId,
        header: &GcmHeader,
        aad: &[u8],
        ciphertext: &mut Vec<u8>,
        ledger: &mut dyn Ledger,
        store: &mut dyn Store,
    ) -> Result<(), AdapterError> {
        if !self.channels.authenticated_recv(peer, header, aad, ciphertext)? {
            self.metrics.channel_frames_dropped.inc();
            return Ok(());
        }
        self.recv_message(ciphertext, ledger, store)
    }

    /// `get_next_message`/`has_messages` are not used by this transport; calling either is an
    /// invariant violation (§4.2, §7).
    pub fn get_next_message(&self) -> Result<Vec<u8>, AdapterError> {
        Err(FatalReason::UnusedNetworkInterface.into())
    }

    pub fn has_messages(&self) -> Result<bool, AdapterError> {
        Err(FatalReason::UnusedNetworkInterface.into())
    }

    /// Inbound dispatch (§4.2). `framed` is the authenticated-recv'd, already-decrypted envelope
    /// (msg_type + from_node + payload).
    pub fn recv_message(
        &self,
        framed: &[u8],
        ledger: &mut dyn Ledger,
        store: &mut dyn Store,
    ) -> Result<(), AdapterError> {
        let (header, payload) = EnvelopeHeader::decode(framed)
            .ok_or(AdapterError::MalformedRequest("envelope header truncated"))?;

        match header.msg_type {
            MSG_TYPE_PBFT_MESSAGE => {
                self.replica_sink.get()?.receive_message(payload);
                Ok(())
            }
            MSG_TYPE_PBFT_APPEND_ENTRIES => {
                let descriptor = AppendEntriesDescriptor::decode(payload)
                    .ok_or(AdapterError::MalformedRequest("append-entries descriptor truncated"))?;
                self.apply_append_entries(descriptor, ledger, store)
            }
            other => {
                warn!(msg_type = other, "dropping frame with unknown msg_type");
                Ok(())
            }
        }
    }

    /// Applies entries `(prev_idx, idx]` (§4.2): record into the ledger, deserialize against the
    /// store, and hand the result to the Replica Core. On malformed data the ledger is truncated
    /// back to `prev_idx` and the batch is abandoned.
    fn apply_append_entries(
        &self,
        descriptor: AppendEntriesDescriptor,
        ledger: &mut dyn Ledger,
        store: &mut dyn Store,
    ) -> Result<(), AdapterError> {
        let replica = self.replica_sink.get()?;
        let public_only = true;

        for index in (descriptor.prev_idx + 1)..=descriptor.idx {
            let (handle, ok) = ledger.record_entry(&index.to_le_bytes());
            if !ok {
                warn!(index, "malformed append-entries record, truncating batch");
                ledger.truncate(descriptor.prev_idx);
                self.metrics.append_entries_truncated.inc();
                return Ok(());
            }

            match store.deserialise_views(handle, public_only) {
                (DeserialiseOutcome::Pass, Some(tx)) => replica.playback_transaction(tx),
                (DeserialiseOutcome::Pass, None) => {}
                (DeserialiseOutcome::PassSignature, _) => {
                    return Err(FatalReason::SignatureUnderBft { index }.into())
                }
                (DeserialiseOutcome::Failed, _) => {
                    return Err(FatalReason::StoreDeserialiseFailed { index }.into())
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use prometheus::Registry;
    use rand::rngs::OsRng;
    use secure_channel::NetworkKeyPair;

    use super::*;
    use crate::replica_core::mock::MockReplicaCore;

    /// Records every entry handed to it; `malformed_at` makes `record_entry` fail for one index,
    /// to exercise the truncate-and-abort path (boundary scenario 6).
    struct FakeLedger {
        entries: Vec<Index>,
        truncated_to: Option<Index>,
        malformed_at: Option<Index>,
        next_handle: u64,
    }

    impl FakeLedger {
        fn new(malformed_at: Option<Index>) -> Self {
            Self {
                entries: Vec::new(),
                truncated_to: None,
                malformed_at,
                next_handle: 0,
            }
        }
    }

    impl Ledger for FakeLedger {
        fn put_entry(&mut self, _data: &[u8]) {}

        fn record_entry(&mut self, data: &[u8]) -> (crate::collaborators::EntryHandle, bool) {
            let index = u64::from_le_bytes(data.try_into().unwrap());
            if Some(index) == self.malformed_at {
                return (0, false);
            }
            let handle = self.next_handle;
            self.next_handle += 1;
            self.entries.push(index);
            (handle, true)
        }

        fn truncate(&mut self, index: Index) {
            self.truncated_to = Some(index);
            self.entries.retain(|&e| e <= index);
        }

        fn skip_entry(&mut self, _data: &[u8]) {}
    }

    struct FakeStore {
        applied: Vec<crate::collaborators::EntryHandle>,
    }

    impl FakeStore {
        fn new() -> Self {
            Self { applied: Vec::new() }
        }
    }

    impl Store for FakeStore {
        fn current_version(&self) -> crate::ids::SeqNo {
            0
        }

        fn compact(&mut self, _version: crate::ids::SeqNo) {}

        fn deserialise_views(
            &mut self,
            handle: crate::collaborators::EntryHandle,
            _public_only: bool,
        ) -> (DeserialiseOutcome, Option<crate::collaborators::Transaction>) {
            self.applied.push(handle);
            (DeserialiseOutcome::Pass, Some(vec![handle as u8]))
        }
    }

    #[test]
    fn loopback_delivers_directly_and_bypasses_channels() {
        let channels = Arc::new(ChannelManager::new(NetworkKeyPair::generate(&mut OsRng)));
        let shim = NetworkShim::new(0, channels, Arc::new(Metrics::new(&Registry::new())));
        let replica = Arc::new(MockReplicaCore::new(0));
        shim.attach_replica_core(replica.clone());

        let sent = shim.send(b"hello", 0).unwrap();
        assert_eq!(sent, 5);
        assert_eq!(replica.received_messages.lock().unwrap().len(), 1);
        assert_eq!(replica.received_messages.lock().unwrap()[0], b"hello");
    }

    #[test]
    fn unused_network_interface_is_fatal() {
        let channels = Arc::new(ChannelManager::new(NetworkKeyPair::generate(&mut OsRng)));
        let shim = NetworkShim::new(0, channels, Arc::new(Metrics::new(&Registry::new())));
        assert!(matches!(
            shim.get_next_message(),
            Err(AdapterError::Fatal(FatalReason::UnusedNetworkInterface))
        ));
        assert!(matches!(
            shim.has_messages(),
            Err(AdapterError::Fatal(FatalReason::UnusedNetworkInterface))
        ));
    }

    /// Boundary scenario 6: batch `(prev_idx=10, idx=13)` with entry 12 malformed ends the
    /// ledger at index 10; entries 11-13 never reach the store.
    #[test]
    fn append_entries_truncates_on_malformed_entry() {
        let channels = Arc::new(ChannelManager::new(NetworkKeyPair::generate(&mut OsRng)));
        let shim = NetworkShim::new(0, channels, Arc::new(Metrics::new(&Registry::new())));
        let replica = Arc::new(MockReplicaCore::new(0));
        shim.attach_replica_core(replica);

        let descriptor = AppendEntriesDescriptor {
            prev_idx: 10,
            idx: 13,
            from_node: 1,
            term: 0,
        };
        let header = EnvelopeHeader::new(MSG_TYPE_PBFT_APPEND_ENTRIES, 1);
        let framed = header.encode_prefixed(&descriptor.encode());

        let mut ledger = FakeLedger::new(Some(12));
        let mut store = FakeStore::new();
        shim.recv_message(&framed, &mut ledger, &mut store).unwrap();

        assert_eq!(ledger.truncated_to, Some(10));
        assert_eq!(ledger.entries, vec![11]);
        assert_eq!(store.applied, vec![0]);
    }

    #[test]
    fn complete_handshake_counts_toward_metrics() {
        let shared_network_key = NetworkKeyPair::generate(&mut OsRng);
        let node_a_channels = Arc::new(ChannelManager::new(shared_network_key.clone()));
        let node_b_channels = Arc::new(ChannelManager::new(shared_network_key));
        let metrics = Arc::new(Metrics::new(&Registry::new()));
        let shim_a = NetworkShim::new(0, node_a_channels.clone(), metrics.clone());
        let shim_b = NetworkShim::new(1, node_b_channels, metrics.clone());

        let a_blob = node_a_channels.get_signed_public(1).unwrap();
        shim_b.complete_handshake(0, &a_blob).unwrap();

        assert_eq!(metrics.channel_handshakes_completed.get(), 1);
    }

    #[test]
    fn recv_wire_frame_drops_and_counts_failed_tag_verification() {
        let shared_network_key = NetworkKeyPair::generate(&mut OsRng);
        let node_a_channels = Arc::new(ChannelManager::new(shared_network_key.clone()));
        let node_b_channels = Arc::new(ChannelManager::new(shared_network_key));
        let metrics = Arc::new(Metrics::new(&Registry::new()));
        let shim_a = NetworkShim::new(0, node_a_channels.clone(), metrics.clone());
        let shim_b = NetworkShim::new(1, node_b_channels.clone(), metrics.clone());
        let replica_b = Arc::new(MockReplicaCore::new(1));
        shim_b.attach_replica_core(replica_b.clone());

        let a_blob = node_a_channels.get_signed_public(1).unwrap();
        let b_blob = node_b_channels.get_signed_public(0).unwrap();
        shim_b.complete_handshake(0, &a_blob).unwrap();
        shim_a.complete_handshake(1, &b_blob).unwrap();

        let mut body = EnvelopeHeader::new(MSG_TYPE_PBFT_MESSAGE, 0).encode_prefixed(b"hello");
        let header = node_a_channels.authenticated_send(1, &[], &mut body).unwrap();
        body[0] ^= 0x01; // corrupt the ciphertext so the peer's tag verification fails

        let mut ledger = FakeLedger::new(None);
        let mut store = FakeStore::new();
        shim_b
            .recv_wire_frame(0, &header, &[], &mut body, &mut ledger, &mut store)
            .unwrap();

        assert!(replica_b.received_messages.lock().unwrap().is_empty());
        assert_eq!(metrics.channel_frames_dropped.get(), 1);
    }
}
