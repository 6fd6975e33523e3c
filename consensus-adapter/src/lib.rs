//! Consensus adapter: drives a Practical Byzantine Fault Tolerant replica core on behalf of a
//! host ledger. Forwards client requests into the replica, translates between the replica's
//! internal view/sequence numbering and the ledger's notion of committed state, replicates
//! ordered log entries into a local ledger, and dispatches inbound network frames to either the
//! replica core or the ledger append path.
//!
//! The Replica Core itself — message ordering, view change, checkpointing — is out of scope and
//! consumed only through [`replica_core::ReplicaCore`]. Node-to-node transport security is
//! handled by the sibling `secure-channel` crate.

pub mod adapter;
pub mod client_proxy;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod global_commit;
pub mod ids;
pub mod metrics;
pub mod network_shim;
pub mod replica_core;
pub mod sink;
pub mod view_history;
pub mod wire;

pub use adapter::{ConsensusAdapter, ReplicateEntry};
pub use error::{AdapterError, FatalReason};
pub use ids::{Index, NodeId, SeqNo, View, VIEW_OFFSET};
