//! The Consensus Adapter (C4, §4.3): the bridge between the Replica Core and the surrounding
//! ledger/store/RPC layer. Owns view translation, global-commit bookkeeping, request submission,
//! membership reconfiguration, ledger replication, and inbound frame dispatch — everything listed
//! under "Ownership" in §3 as exclusively the adapter's.

use std::sync::{atomic::{AtomicU64, Ordering}, Arc};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::info;

use crate::{
    client_proxy::{ClientProxyBinding, Request},
    collaborators::{Ledger, RpcSessions, Store},
    error::{AdapterError, FatalReason},
    global_commit::GlobalCommitState,
    ids::{Index, NodeId, SeqNo, View, VIEW_OFFSET},
    metrics::Metrics,
    network_shim::NetworkShim,
    replica_core::{CallerRequestId, GlobalCommitHandler, NodeConf, PrincipalInfo, ReplicaCore},
};

/// One entry of a `replicate` batch: `(index, data, globally_committable)`. The third field is
/// carried through to mirror the source's signature but is not otherwise interpreted here — it
/// informs the Replica Core's own batching policy, which is out of scope (§4.1).
pub struct ReplicateEntry {
    pub index: Index,
    pub data: Vec<u8>,
    pub globally_committable: bool,
}

pub struct ConsensusAdapter {
    local_id: NodeId,
    replica: Arc<dyn ReplicaCore>,
    network_shim: Arc<NetworkShim>,
    client_proxy: Arc<ClientProxyBinding>,
    ledger: Mutex<Box<dyn Ledger>>,
    store: Mutex<Box<dyn Store>>,
    global_commit: Mutex<GlobalCommitState>,
    append_entries_index: AtomicU64,
    next_rid: AtomicU64,
    metrics: Arc<Metrics>,
}

impl ConsensusAdapter {
    /// Wires the adapter together and registers it with the Replica Core: the reply handler is
    /// the Client Proxy Binding, the global-commit handler is the adapter itself. Two-phase like
    /// the Network Shim's sink handle (§9): the `Arc<Self>` must exist before it can register
    /// itself as a callback target.
    pub fn new(
        local_id: NodeId,
        replica: Arc<dyn ReplicaCore>,
        network_shim: Arc<NetworkShim>,
        client_proxy: Arc<ClientProxyBinding>,
        ledger: Box<dyn Ledger>,
        store: Box<dyn Store>,
        metrics: Arc<Metrics>,
    ) -> Arc<Self> {
        let adapter = Arc::new(Self {
            local_id,
            replica: replica.clone(),
            network_shim,
            client_proxy: client_proxy.clone(),
            ledger: Mutex::new(ledger),
            store: Mutex::new(store),
            global_commit: Mutex::new(GlobalCommitState::new()),
            append_entries_index: AtomicU64::new(0),
            next_rid: AtomicU64::new(0),
            metrics,
        });
        replica.register_reply_handler(client_proxy);
        replica.register_global_commit(adapter.clone());
        adapter
    }

    /// `on_request` (§4.3): serializes the request, submits it via the Client Proxy, and returns
    /// whether the Replica Core accepted it. `session_id` is folded into the `CallerRequestId` so
    /// the eventual reply can be routed back without the Replica Core knowing about sessions.
    pub fn on_request(
        &self,
        actor: u8,
        caller_id: u64,
        caller_cert: Vec<u8>,
        payload: Vec<u8>,
        session_id: u64,
    ) -> Result<bool, AdapterError> {
        let request = Request::new(actor, caller_id, caller_cert, payload);
        let serialized = ClientProxyBinding::encode_request(&request)
            .map_err(|_| AdapterError::MalformedRequest("request failed to serialize"))?;

        let rid = CallerRequestId {
            rid: self.next_rid.fetch_add(1, Ordering::Relaxed),
            session_id,
        };
        let accepted = self.replica.submit_request(rid, &serialized);
        if accepted {
            self.metrics.requests_submitted.inc();
        } else {
            self.metrics.requests_rejected.inc();
        }
        Ok(accepted)
    }

    /// `replicate` (§4.3): appends every entry to the ledger in order, advancing
    /// `append_entries_index`. The caller is responsible for contiguity with the current cursor.
    pub fn replicate(&self, entries: &[ReplicateEntry]) -> bool {
        let mut ledger = self.ledger.lock();
        for entry in entries {
            ledger.put_entry(&entry.data);
            self.append_entries_index.store(entry.index, Ordering::Relaxed);
            self.metrics.entries_replicated.inc();
        }
        true
    }

    /// `recv_message` (§4.2/§4.3): dispatches an already-authenticated inbound frame to the
    /// Replica Core or the append-entries path.
    pub fn recv_message(&self, bytes: &[u8]) -> Result<(), AdapterError> {
        let mut ledger = self.ledger.lock();
        let mut store = self.store.lock();
        self.network_shim.recv_message(bytes, &mut **ledger, &mut **store)
    }

    /// `send` passthrough, exposed so hosts driving the Network Shim directly don't need a
    /// separate handle.
    pub fn send(&self, message: &[u8], destination: NodeId) -> Result<usize, AdapterError> {
        self.network_shim.send(message, destination)
    }

    /// `get_view()`: `replica.view() + 2`, applied bit-exactly at this boundary (§3, §9).
    pub fn get_view(&self) -> View {
        self.replica.view() + VIEW_OFFSET
    }

    /// `get_view(seqno)`: looks up the view-change history, `+2`. Fails fatally only if no entry
    /// matches, which the default `(0, 0)` entry makes unreachable (§4.3, §7).
    pub fn get_view_at(&self, seqno: SeqNo) -> Result<View, AdapterError> {
        self.global_commit
            .lock()
            .history()
            .view_at(seqno)
            .ok_or_else(|| FatalReason::NoViewHistoryMatch { seqno }.into())
    }

    pub fn get_commit_seqno(&self) -> SeqNo {
        self.global_commit.lock().global_commit_seqno()
    }

    pub fn primary(&self) -> NodeId {
        self.replica.primary()
    }

    pub fn is_primary(&self) -> bool {
        self.replica.is_primary()
    }

    pub fn is_backup(&self) -> bool {
        !self.is_primary()
    }

    /// `add_configuration` (§4.3): a no-op when `node_conf` describes the local replica (already
    /// registered at construction), otherwise registers a new principal with the Replica Core.
    pub fn add_configuration(&self, _seqno: SeqNo, _configuration_id: u64, node_conf: NodeConf) {
        if node_conf.node_id == self.local_id {
            return;
        }
        self.replica.add_principal(PrincipalInfo::local(
            node_conf.node_id,
            node_conf.cert,
            node_conf.host_name,
        ));
    }

    /// The only time source the Replica Core sees (§5); the host must call this regularly.
    pub fn periodic(&self, elapsed: Duration) {
        self.replica.periodic(elapsed);
    }

    pub fn set_f(&self, f: u32) {
        self.replica.set_f(f);
    }

    /// `emit_signature()`: reads the store's current version and asks the Replica Core to embed
    /// a signature in the next pre-prepare at or after it.
    pub fn emit_signature(&self) {
        let version = self.store.lock().current_version();
        self.replica.emit_signature_on_next_pp(version);
    }
}

impl GlobalCommitHandler for ConsensusAdapter {
    /// The global-commit callback (§4.3, §3): monotone update of `global_commit_seqno`, a
    /// view-change history append on a strictly higher view, then a store compaction.
    fn on_global_commit(&self, version: SeqNo, view: View) {
        let accepted = self.global_commit.lock().on_global_commit(version, view);
        let Some(version) = accepted else {
            return;
        };
        self.store.lock().compact(version);
        self.metrics.global_commit_seqno.set(version as i64);
        self.metrics.current_view.set((view + VIEW_OFFSET) as i64);
        info!(version, view, "global commit advanced");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use prometheus::Registry;
    use rand::rngs::OsRng;
    use secure_channel::{ChannelManager, NetworkKeyPair};

    use super::*;
    use crate::{
        collaborators::{DeserialiseOutcome, EntryHandle, Transaction},
        replica_core::mock::MockReplicaCore,
    };

    struct FakeLedger {
        entries: Vec<Vec<u8>>,
    }

    impl Ledger for FakeLedger {
        fn put_entry(&mut self, data: &[u8]) {
            self.entries.push(data.to_vec());
        }

        fn record_entry(&mut self, data: &[u8]) -> (EntryHandle, bool) {
            self.entries.push(data.to_vec());
            (self.entries.len() as u64 - 1, true)
        }

        fn truncate(&mut self, index: Index) {
            self.entries.truncate(index as usize);
        }

        fn skip_entry(&mut self, _data: &[u8]) {}
    }

    struct FakeStore {
        version: SeqNo,
        compacted_to: Option<SeqNo>,
    }

    impl Store for FakeStore {
        fn current_version(&self) -> SeqNo {
            self.version
        }

        fn compact(&mut self, version: SeqNo) {
            self.compacted_to = Some(version);
        }

        fn deserialise_views(
            &mut self,
            _handle: EntryHandle,
            _public_only: bool,
        ) -> (DeserialiseOutcome, Option<Transaction>) {
            (DeserialiseOutcome::Pass, None)
        }
    }

    struct FakeRpcSessions;

    #[async_trait]
    impl RpcSessions for FakeRpcSessions {
        async fn reply_async(&self, _session_id: u64, _payload: Vec<u8>) {}
    }

    fn build_adapter(local_id: NodeId) -> (Arc<ConsensusAdapter>, Arc<MockReplicaCore>) {
        let replica = Arc::new(MockReplicaCore::new(local_id));
        let channels = Arc::new(ChannelManager::new(NetworkKeyPair::generate(&mut OsRng)));
        let metrics = Arc::new(Metrics::new(&Registry::new()));
        let network_shim = Arc::new(NetworkShim::new(local_id, channels, metrics.clone()));
        network_shim.attach_replica_core(replica.clone());
        let client_proxy = Arc::new(ClientProxyBinding::new(
            Arc::new(FakeRpcSessions),
            tokio::runtime::Handle::current(),
        ));
        let ledger: Box<dyn Ledger> = Box::new(FakeLedger { entries: Vec::new() });
        let store: Box<dyn Store> = Box::new(FakeStore {
            version: 0,
            compacted_to: None,
        });
        let adapter = ConsensusAdapter::new(
            local_id,
            replica.clone() as Arc<dyn ReplicaCore>,
            network_shim,
            client_proxy,
            ledger,
            store,
            metrics,
        );
        (adapter, replica)
    }

    #[tokio::test]
    async fn on_request_delegates_to_replica_core() {
        let (adapter, replica) = build_adapter(0);
        let accepted = adapter
            .on_request(1, 7, vec![1, 2, 3], b"payload".to_vec(), 42)
            .unwrap();
        assert!(accepted);
        assert_eq!(replica.submitted_requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn on_request_reports_rejection() {
        let (adapter, replica) = build_adapter(0);
        replica
            .accept_requests
            .store(false, std::sync::atomic::Ordering::Relaxed);
        let accepted = adapter
            .on_request(1, 7, vec![], b"payload".to_vec(), 42)
            .unwrap();
        assert!(!accepted);
    }

    #[tokio::test]
    async fn get_view_applies_fixed_offset() {
        let (adapter, replica) = build_adapter(0);
        replica.set_view(3);
        assert_eq!(adapter.get_view(), 5);
    }

    #[tokio::test]
    async fn add_configuration_is_noop_for_local_id() {
        let (adapter, replica) = build_adapter(0);
        adapter.add_configuration(
            10,
            1,
            NodeConf {
                node_id: 0,
                port: "9000".to_string(),
                cert: vec![],
                host_name: "self".to_string(),
            },
        );
        assert!(replica.added_principals.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn add_configuration_registers_remote_principal() {
        let (adapter, replica) = build_adapter(0);
        adapter.add_configuration(
            10,
            1,
            NodeConf {
                node_id: 1,
                port: "9001".to_string(),
                cert: vec![9],
                host_name: "peer".to_string(),
            },
        );
        assert_eq!(replica.added_principals.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn global_commit_callback_updates_state_and_compacts() {
        let (adapter, replica) = build_adapter(0);
        replica.fire_global_commit(5, 2);
        assert_eq!(adapter.get_commit_seqno(), 5);
        assert_eq!(adapter.get_view_at(0).unwrap(), VIEW_OFFSET);
        assert_eq!(adapter.get_view_at(5).unwrap(), 2 + VIEW_OFFSET);
    }

    #[tokio::test]
    async fn replicate_appends_entries_in_order() {
        let (adapter, _replica) = build_adapter(0);
        let entries = vec![
            ReplicateEntry {
                index: 1,
                data: b"a".to_vec(),
                globally_committable: true,
            },
            ReplicateEntry {
                index: 2,
                data: b"b".to_vec(),
                globally_committable: true,
            },
        ];
        assert!(adapter.replicate(&entries));
    }

    #[tokio::test]
    async fn is_backup_negates_is_primary() {
        let (adapter, replica) = build_adapter(0);
        replica.set_primary(1);
        assert!(adapter.is_backup());
    }
}
