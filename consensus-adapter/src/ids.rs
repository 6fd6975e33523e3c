//! Identifiers and counters used across the adapter. Kept as plain type aliases, matching how
//! `consensus-config` exposes `AuthorityIndex`/`Stake`/`Epoch` as aliases rather than newtypes:
//! the values round-trip through several external interfaces (the ledger, the store, the
//! replica core) where a newtype would only add friction.

pub use secure_channel::NodeId;

/// Committed index assigned by the Replica Core. Monotonically increasing.
pub type SeqNo = u64;

/// PBFT view number, as seen internally by the Replica Core (before the `+2` offset applied at
/// the adapter boundary).
pub type View = u64;

/// Append-only position in the local ledger. Independent of `SeqNo`.
pub type Index = u64;

/// Fixed offset applied to every view the adapter returns externally, reserving low view values
/// for the surrounding system's non-BFT states. Preserved bit-exactly at both view-returning
/// boundaries: `ConsensusAdapter::view()` and `ConsensusAdapter::view_at(seqno)`.
pub const VIEW_OFFSET: View = 2;

/// Sentinel meaning "no committed version yet", mirroring the host ledger's `NoVersion`.
pub const NO_VERSION: SeqNo = 0;
