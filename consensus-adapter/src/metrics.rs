//! Prometheus metrics for the adapter (§10 ambient stack). One `Metrics` struct built once from
//! a caller-supplied `Registry` and shared behind an `Arc` the same way a consensus node's own
//! metrics struct is threaded through its components.

use prometheus::{register_int_counter_with_registry, register_int_gauge_with_registry, IntCounter, IntGauge, Registry};

pub struct Metrics {
    pub requests_submitted: IntCounter,
    pub requests_rejected: IntCounter,
    pub entries_replicated: IntCounter,
    pub append_entries_truncated: IntCounter,
    pub global_commit_seqno: IntGauge,
    pub current_view: IntGauge,
    pub channel_handshakes_completed: IntCounter,
    pub channel_frames_dropped: IntCounter,
}

impl Metrics {
    pub fn new(registry: &Registry) -> Self {
        Self {
            requests_submitted: register_int_counter_with_registry!(
                "consensus_adapter_requests_submitted_total",
                "Client requests accepted by the Replica Core",
                registry,
            )
            .unwrap(),
            requests_rejected: register_int_counter_with_registry!(
                "consensus_adapter_requests_rejected_total",
                "Client requests rejected by the Replica Core",
                registry,
            )
            .unwrap(),
            entries_replicated: register_int_counter_with_registry!(
                "consensus_adapter_entries_replicated_total",
                "Ledger entries appended via replicate()",
                registry,
            )
            .unwrap(),
            append_entries_truncated: register_int_counter_with_registry!(
                "consensus_adapter_append_entries_truncated_total",
                "Append-entries batches abandoned due to a malformed record",
                registry,
            )
            .unwrap(),
            global_commit_seqno: register_int_gauge_with_registry!(
                "consensus_adapter_global_commit_seqno",
                "Current global_commit_seqno",
                registry,
            )
            .unwrap(),
            current_view: register_int_gauge_with_registry!(
                "consensus_adapter_current_view",
                "Current externally-visible view (with the +2 offset applied)",
                registry,
            )
            .unwrap(),
            channel_handshakes_completed: register_int_counter_with_registry!(
                "consensus_adapter_channel_handshakes_completed_total",
                "Secure channel handshakes that reached ESTABLISHED",
                registry,
            )
            .unwrap(),
            channel_frames_dropped: register_int_counter_with_registry!(
                "consensus_adapter_channel_frames_dropped_total",
                "Inbound frames dropped for failing authenticated-recv",
                registry,
            )
            .unwrap(),
        }
    }
}
