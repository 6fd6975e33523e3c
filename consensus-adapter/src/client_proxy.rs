//! Client Proxy Binding (C5, §4.3 reply callback): correlates adapter-level request submissions
//! with the Replica Core's own request ids, and routes replies back to the originating RPC
//! session. Folded out of the Replica Core's opaque `submit_request`/reply machinery as a thin
//! layer the adapter owns directly, per the §9 callback-context design note.

use std::sync::Arc;

use tracing::warn;

use crate::{
    collaborators::RpcSessions,
    replica_core::{CallerRequestId, ReplyHandler},
};

/// Serialized request shape handed to the Replica Core (§6.4): `{actor, caller_id, caller_cert,
/// payload, reserved_empty}`. `reserved_empty` mirrors an unused trailing field in the source and
/// is carried through unread.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Request {
    pub actor: u8,
    pub caller_id: u64,
    pub caller_cert: Vec<u8>,
    pub payload: Vec<u8>,
    pub reserved_empty: Vec<u8>,
}

impl Request {
    pub fn new(actor: u8, caller_id: u64, caller_cert: Vec<u8>, payload: Vec<u8>) -> Self {
        Self {
            actor,
            caller_id,
            caller_cert,
            payload,
            reserved_empty: Vec::new(),
        }
    }
}

/// Implements `ReplyHandler`: the Replica Core calls `on_reply` with the `CallerRequestId` it was
/// given at submission time, and this binding extracts the embedded session id to route the
/// payload back via `RpcSessions::reply_async`.
pub struct ClientProxyBinding {
    rpc_sessions: Arc<dyn RpcSessions>,
    runtime: tokio::runtime::Handle,
}

impl ClientProxyBinding {
    pub fn new(rpc_sessions: Arc<dyn RpcSessions>, runtime: tokio::runtime::Handle) -> Self {
        Self {
            rpc_sessions,
            runtime,
        }
    }

    pub fn encode_request(request: &Request) -> Result<Vec<u8>, bcs::Error> {
        bcs::to_bytes(request)
    }
}

impl ReplyHandler for ClientProxyBinding {
    /// Invoked synchronously from the consensus thread (§5): the actual I/O is handed off to the
    /// async RPC session layer via `spawn`, never awaited inline.
    fn on_reply(&self, caller_rid: CallerRequestId, status: i32, payload: Vec<u8>) {
        let rpc_sessions = self.rpc_sessions.clone();
        let session_id = caller_rid.session_id;
        self.runtime.spawn(async move {
            if status != 0 {
                warn!(session_id, status, "replica core reported non-zero reply status");
            }
            rpc_sessions.reply_async(session_id, payload).await;
        });
    }
}
