use thiserror::Error;

use crate::NodeId;

/// Errors surfaced by the secure channel layer.
///
/// `Precondition` corresponds to the "fatal precondition" disposition in the error handling
/// design: an AEAD operation was attempted on a channel that has not reached `ESTABLISHED`. The
/// host decides what to do with it (abort, tear down the peer connection, ...); this crate never
/// panics on it.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel with peer {peer} is not established yet")]
    Precondition { peer: NodeId },

    #[error("signed public blob for peer {peer} is malformed: {reason}")]
    MalformedSignedPublic { peer: NodeId, reason: &'static str },

    #[error("signature on peer {peer}'s public key failed verification")]
    SignatureVerification { peer: NodeId },
}
