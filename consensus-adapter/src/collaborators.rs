//! Interfaces-only bindings to the external collaborators named in the specification: the
//! Ledger, the Key-Value Store, and the RPC Session Manager. Only the adapter's own behavior is
//! implemented here; the collaborators themselves are out of scope and are modeled as traits so
//! the adapter can be exercised against in-memory fakes (see each consuming module's
//! `#[cfg(test)]` block).

use async_trait::async_trait;

use crate::ids::{Index, SeqNo};

/// Opaque handle a Ledger hands back from `record_entry`, later passed to
/// `Store::deserialise_views` so the store knows which bytes to interpret.
pub type EntryHandle = u64;

/// A deserialized transaction, ready for `ReplicaCore::playback_transaction`. Treated as opaque
/// bytes here; the actual application state machine lives entirely outside this crate.
pub type Transaction = Vec<u8>;

/// The append-only ledger. `put_entry` is used for locally-originated entries (via
/// `ConsensusAdapter::replicate`); `record_entry`/`truncate`/`skip_entry` are used while
/// applying an inbound append-entries batch.
pub trait Ledger: Send + Sync {
    /// Appends `data` as a new entry, advancing the ledger's own cursor.
    fn put_entry(&mut self, data: &[u8]);

    /// Records an entry received from a peer, returning a handle for later deserialisation and
    /// whether the write succeeded (fails only on malformed data).
    fn record_entry(&mut self, data: &[u8]) -> (EntryHandle, bool);

    /// Truncates the ledger back to (and including) `index`, discarding everything after it.
    fn truncate(&mut self, index: Index);

    /// Skips over an already-applied entry's payload without re-recording it.
    fn skip_entry(&mut self, data: &[u8]);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeserialiseOutcome {
    Failed,
    Pass,
    PassSignature,
}

/// The key-value store backing replicated state.
pub trait Store: Send + Sync {
    fn current_version(&self) -> SeqNo;

    /// Compacts the store up to (and including) `version`.
    fn compact(&mut self, version: SeqNo);

    /// Deserializes the entry at `handle` into the store. `public_only` restricts
    /// deserialisation to the public domain, the default for a joining replica that has not
    /// yet received the private-domain key material.
    fn deserialise_views(
        &mut self,
        handle: EntryHandle,
        public_only: bool,
    ) -> (DeserialiseOutcome, Option<Transaction>);
}

/// The RPC session manager fronting clients. `reply_async` is expected to be callable from any
/// thread and to hand the payload off to the session's own I/O path.
#[async_trait]
pub trait RpcSessions: Send + Sync {
    async fn reply_async(&self, session_id: u64, payload: Vec<u8>);
}
