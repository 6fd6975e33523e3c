use thiserror::Error;

use crate::ids::{Index, SeqNo};

/// Why a fatal condition was raised. Fatal means: surface a distinguished failure to the host;
/// the adapter itself never retries or attempts local recovery for these.
#[derive(Debug, Error)]
pub enum FatalReason {
    #[error("store failed to deserialise log entry at index {index}")]
    StoreDeserialiseFailed { index: Index },

    #[error("received a history signature (PASS_SIGNATURE) at index {index} while running BFT consensus")]
    SignatureUnderBft { index: Index },

    #[error("no view-change history entry covers seqno {seqno}; the initial (0, 0) entry should make this unreachable")]
    NoViewHistoryMatch { seqno: SeqNo },

    #[error("network shim asked for get_next_message/has_messages, which this transport never uses")]
    UnusedNetworkInterface,
}

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("fatal: {0}")]
    Fatal(#[from] FatalReason),

    #[error("secure channel error: {0}")]
    Channel(#[from] secure_channel::ChannelError),

    #[error("malformed request: {0}")]
    MalformedRequest(&'static str),

    #[error("replica core sink used before it was attached")]
    SinkNotAttached,

    #[error("replica core rejected the submission")]
    SubmissionRejected,
}
