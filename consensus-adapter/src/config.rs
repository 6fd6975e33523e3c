//! Operator-facing configuration (§10 ambient stack): runtime parameters tolerant of
//! per-node defaults, plus the cluster membership each node bootstraps with. Modeled on
//! `consensus-config`'s `Parameters`/`CommitteeBuilder` split — tunables get a `#[serde(default =
//! ...)]` function each, membership gets a builder that produces an immutable `ClusterConfig`.

use std::time::Duration;

use secure_channel::{NetworkKeyPair, NetworkPublicKey, NodeId};
use serde::{Deserialize, Serialize};

use crate::replica_core::ReplicaCoreInit;

/// Tunables an operator may override; every field has a sensible default so a bare config file
/// is valid. Mirrors `ReplicaCoreInit`'s timeouts/counts but in a serializable, humantime-friendly
/// shape meant for a config file rather than direct construction.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Parameters {
    #[serde(default = "Parameters::default_auth_timeout")]
    pub auth_timeout: Duration,

    #[serde(default = "Parameters::default_view_timeout")]
    pub view_timeout: Duration,

    #[serde(default = "Parameters::default_status_timeout")]
    pub status_timeout: Duration,

    #[serde(default = "Parameters::default_recovery_timeout")]
    pub recovery_timeout: Duration,

    #[serde(default = "Parameters::default_sig_max_tx")]
    pub sig_max_tx: u64,

    #[serde(default = "Parameters::default_max_requests_in_batch")]
    pub max_requests_in_batch: u64,

    #[serde(default = "Parameters::default_memory_arena_bytes")]
    pub memory_arena_bytes: usize,
}

impl Parameters {
    pub fn default_auth_timeout() -> Duration {
        Duration::from_millis(1_800_000)
    }

    pub fn default_view_timeout() -> Duration {
        Duration::from_millis(5_000)
    }

    pub fn default_status_timeout() -> Duration {
        Duration::from_millis(100)
    }

    pub fn default_recovery_timeout() -> Duration {
        Duration::from_millis(9_999_250_000)
    }

    pub fn default_sig_max_tx() -> u64 {
        1000
    }

    pub fn default_max_requests_in_batch() -> u64 {
        1
    }

    pub fn default_memory_arena_bytes() -> usize {
        40 * 8192
    }

    /// Folds these tunables into a `ReplicaCoreInit`, given the per-node fields a `Parameters`
    /// file cannot know in advance (identity, cluster size, fault bound).
    pub fn into_replica_core_init(
        self,
        local: crate::replica_core::PrincipalInfo,
        num_replicas: u32,
        num_clients: u32,
        max_faulty: u32,
    ) -> ReplicaCoreInit {
        ReplicaCoreInit {
            local,
            num_replicas,
            num_clients,
            max_faulty,
            auth_timeout: self.auth_timeout,
            view_timeout: self.view_timeout,
            status_timeout: self.status_timeout,
            recovery_timeout: self.recovery_timeout,
            sig_max_tx: self.sig_max_tx,
            max_requests_in_batch: self.max_requests_in_batch,
            memory_arena_bytes: self.memory_arena_bytes,
        }
    }
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            auth_timeout: Parameters::default_auth_timeout(),
            view_timeout: Parameters::default_view_timeout(),
            status_timeout: Parameters::default_status_timeout(),
            recovery_timeout: Parameters::default_recovery_timeout(),
            sig_max_tx: Parameters::default_sig_max_tx(),
            max_requests_in_batch: Parameters::default_max_requests_in_batch(),
            memory_arena_bytes: Parameters::default_memory_arena_bytes(),
        }
    }
}

/// One cluster member's bootstrap-time identity: its id and the network public key its signed
/// handshake blobs must verify against.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MemberInfo {
    pub node_id: NodeId,
    pub network_key: NetworkPublicKey,
    pub host_name: String,
}

/// The cluster's membership as known at bootstrap: which nodes exist and the shared network
/// keypair used to bootstrap every channel (§4.5 "shared across the cluster during bootstrap").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClusterConfig {
    local_id: NodeId,
    members: Vec<MemberInfo>,
}

impl ClusterConfig {
    pub fn local_id(&self) -> NodeId {
        self.local_id
    }

    pub fn members(&self) -> &[MemberInfo] {
        &self.members
    }

    pub fn num_replicas(&self) -> u32 {
        self.members.len() as u32
    }

    pub fn max_faulty(&self) -> u32 {
        (self.num_replicas().saturating_sub(1)) / 3
    }
}

/// Builder mirroring `CommitteeBuilder`: membership is constructed via repeated `add_member`,
/// then consumed once with `build`.
pub struct ClusterConfigBuilder {
    local_id: NodeId,
    members: Vec<MemberInfo>,
}

impl ClusterConfigBuilder {
    pub fn new(local_id: NodeId) -> Self {
        Self {
            local_id,
            members: Vec::new(),
        }
    }

    pub fn add_member(&mut self, node_id: NodeId, network_key: NetworkPublicKey, host_name: String) -> &mut Self {
        self.members.push(MemberInfo {
            node_id,
            network_key,
            host_name,
        });
        self
    }

    pub fn build(self) -> ClusterConfig {
        assert!(
            self.members.iter().any(|m| m.node_id == self.local_id),
            "local_id must be present among the cluster members"
        );
        ClusterConfig {
            local_id: self.local_id,
            members: self.members,
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::OsRng;

    use super::*;

    #[test]
    fn parameters_default_matches_documented_timeouts() {
        let parameters = Parameters::default();
        assert_eq!(parameters.view_timeout, Duration::from_millis(5_000));
        assert_eq!(parameters.status_timeout, Duration::from_millis(100));
        assert_eq!(parameters.memory_arena_bytes, 40 * 8192);
    }

    #[test]
    fn cluster_config_builder_requires_local_member() {
        let mut builder = ClusterConfigBuilder::new(0);
        builder.add_member(0, NetworkKeyPair::generate(&mut OsRng).public(), "node-0".to_string());
        builder.add_member(1, NetworkKeyPair::generate(&mut OsRng).public(), "node-1".to_string());
        let cluster = builder.build();
        assert_eq!(cluster.num_replicas(), 2);
        assert_eq!(cluster.max_faulty(), 0);
    }

    #[test]
    #[should_panic(expected = "local_id must be present")]
    fn cluster_config_builder_panics_without_local_member() {
        let mut builder = ClusterConfigBuilder::new(5);
        builder.add_member(0, NetworkKeyPair::generate(&mut OsRng).public(), "node-0".to_string());
        builder.build();
    }
}
