//! The external contract for the BFT Replica Core (§4.1). The Replica Core's own message
//! ordering, view change, and checkpointing are out of scope for this crate — it is consumed
//! purely through this trait, and in tests through `MockReplicaCore` below.

use std::{sync::Arc, time::Duration};

use crate::{
    collaborators::Transaction,
    ids::{NodeId, SeqNo, View},
};

/// Identifies an outstanding client request the way the source's
/// `kv::TxHistory::RequestID` does: a request id paired with the originating RPC session, so
/// the reply path can route back without the Replica Core knowing anything about sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallerRequestId {
    pub rid: u64,
    pub session_id: u64,
}

/// Invoked by the Replica Core when an application-level reply to a client request is ready.
pub trait ReplyHandler: Send + Sync {
    fn on_reply(&self, caller_rid: CallerRequestId, status: i32, payload: Vec<u8>);
}

/// Invoked by the Replica Core whenever a batch globally commits.
pub trait GlobalCommitHandler: Send + Sync {
    fn on_global_commit(&self, version: SeqNo, view: View);
}

/// Per-authority descriptor passed through to the Replica Core unchanged. `ip` is an invalid
/// placeholder (`"256.256.256.204"`-shaped filler) in the source; these addressing fields are
/// unused in the transport path used here and are preserved only as opaque filler, never
/// inspected.
#[derive(Debug, Clone)]
pub struct PrincipalInfo {
    pub id: NodeId,
    pub port: u16,
    pub ip: String,
    pub cert: Vec<u8>,
    pub host_name: String,
    pub is_replica: bool,
}

pub const PLACEHOLDER_IP: &str = "256.256.256.204";

impl PrincipalInfo {
    pub fn local(id: NodeId, cert: Vec<u8>, host_name: String) -> Self {
        Self {
            id,
            port: 0,
            ip: PLACEHOLDER_IP.to_string(),
            cert,
            host_name,
            is_replica: true,
        }
    }
}

/// A reconfiguration entry as handed to `ConsensusAdapter::add_configuration`.
#[derive(Debug, Clone)]
pub struct NodeConf {
    pub node_id: NodeId,
    pub port: String,
    pub cert: Vec<u8>,
    pub host_name: String,
}

/// Initialization parameters consumed by the Replica Core: node descriptor, replica/client
/// counts, fault bound, timeouts, and the derived max-requests-per-signature. The 40*8192-byte
/// scratch arena from the source is modeled as `memory_arena_bytes` purely for parity with a
/// real FFI binding; the in-crate `MockReplicaCore` ignores it.
#[derive(Debug, Clone)]
pub struct ReplicaCoreInit {
    pub local: PrincipalInfo,
    pub num_replicas: u32,
    pub num_clients: u32,
    pub max_faulty: u32,
    pub auth_timeout: Duration,
    pub view_timeout: Duration,
    pub status_timeout: Duration,
    pub recovery_timeout: Duration,
    pub sig_max_tx: u64,
    pub max_requests_in_batch: u64,
    pub memory_arena_bytes: usize,
}

impl ReplicaCoreInit {
    pub fn max_requests_between_signatures(&self) -> u64 {
        self.sig_max_tx / self.max_requests_in_batch
    }
}

impl Default for ReplicaCoreInit {
    fn default() -> Self {
        Self {
            local: PrincipalInfo::local(0, Vec::new(), "localhost".to_string()),
            num_replicas: 1,
            num_clients: 1,
            max_faulty: 0,
            auth_timeout: Duration::from_millis(1_800_000),
            view_timeout: Duration::from_millis(5_000),
            status_timeout: Duration::from_millis(100),
            recovery_timeout: Duration::from_millis(9_999_250_000),
            sig_max_tx: 1000,
            max_requests_in_batch: 1,
            memory_arena_bytes: 40 * 8192,
        }
    }
}

/// The opaque BFT Replica Core capability set (§4.1).
pub trait ReplicaCore: Send + Sync {
    fn receive_message(&self, bytes: &[u8]);

    fn view(&self) -> View;
    fn primary(&self) -> NodeId;
    fn is_primary(&self) -> bool;

    fn register_reply_handler(&self, handler: Arc<dyn ReplyHandler>);
    fn register_global_commit(&self, handler: Arc<dyn GlobalCommitHandler>);

    fn playback_transaction(&self, tx: Transaction);
    fn emit_signature_on_next_pp(&self, version: SeqNo);
    fn set_f(&self, f: u32);

    /// The Client Proxy's entrypoint into the Replica Core: submits a serialized client request
    /// for ordering, returning whether it was accepted. Distinct from `receive_message`, which
    /// is the network-facing entrypoint for already-ordered protocol frames.
    fn submit_request(&self, rid: CallerRequestId, serialized_request: &[u8]) -> bool;

    /// Registers a new principal (peer replica) with the Replica Core, analogous to
    /// `Byz_add_principal`.
    fn add_principal(&self, info: PrincipalInfo);

    /// Advances the Replica Core's internal timers. The only time source it has.
    fn periodic(&self, elapsed: Duration);
}
