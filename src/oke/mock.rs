//! In-memory platform double for tests.
//!
//! Mutations apply immediately so that subsequent fresh reads observe the
//! new state; work request polling follows a per-request script and repeats
//! the last status once the script is exhausted.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::error::OkeupError;
use crate::oke::client::OkeApi;
use crate::oke::types::{
    ClusterInfo, CyclingOptions, NodePoolInfo, WorkRequestHandle, WorkRequestStatus,
};

#[derive(Debug, Clone)]
pub enum ScriptedPoll {
    Status(WorkRequestStatus),
    TransientError,
    FatalError,
}

#[derive(Default)]
struct State {
    clusters: HashMap<String, ClusterInfo>,
    node_pools: HashMap<String, NodePoolInfo>,
    cluster_pools: HashMap<String, Vec<String>>,
    scripts: HashMap<String, VecDeque<ScriptedPoll>>,
    last_status: HashMap<String, WorkRequestStatus>,
    poll_counts: HashMap<String, u32>,
    calls: Vec<String>,
    fail_operations: Vec<String>,
    next_wr: u32,
}

pub struct MockApi {
    state: Mutex<State>,
}

impl MockApi {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    pub fn add_cluster(&self, cluster: ClusterInfo) {
        let mut state = self.state.lock().unwrap();
        state.clusters.insert(cluster.id.clone(), cluster);
    }

    pub fn add_node_pool(&self, cluster_id: &str, pool: NodePoolInfo) {
        let mut state = self.state.lock().unwrap();
        state
            .cluster_pools
            .entry(cluster_id.to_string())
            .or_default()
            .push(pool.id.clone());
        state.node_pools.insert(pool.id.clone(), pool);
    }

    /// Script the poll outcomes for a work request id. Without a script,
    /// work requests succeed on the first poll.
    pub fn script_work_request(&self, id: &str, script: Vec<ScriptedPoll>) {
        let mut state = self.state.lock().unwrap();
        state.scripts.insert(id.to_string(), script.into());
    }

    /// Make every subsequent mutating call for the named operation fail as a
    /// platform rejection.
    pub fn fail_operation(&self, operation: &str) {
        let mut state = self.state.lock().unwrap();
        state.fail_operations.push(operation.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self, prefix: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    pub fn poll_count(&self, work_request_id: &str) -> u32 {
        self.state
            .lock()
            .unwrap()
            .poll_counts
            .get(work_request_id)
            .copied()
            .unwrap_or(0)
    }

    fn execute(
        &self,
        operation: &'static str,
        resource: &str,
        call: String,
        apply: impl FnOnce(&mut State),
    ) -> Result<WorkRequestHandle, OkeupError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        if state.fail_operations.iter().any(|op| op == operation) {
            return Err(OkeupError::execution(operation, resource, "rejected by mock"));
        }
        apply(&mut state);
        state.next_wr += 1;
        let id = format!("wr-{}", state.next_wr);
        Ok(WorkRequestHandle {
            id,
            operation,
            status: WorkRequestStatus::Accepted,
        })
    }
}

fn with_v(version: &str) -> String {
    if version.starts_with('v') {
        version.to_string()
    } else {
        format!("v{}", version)
    }
}

impl OkeApi for MockApi {
    async fn list_clusters(&self, compartment_id: &str) -> Result<Vec<ClusterInfo>, OkeupError> {
        let state = self.state.lock().unwrap();
        if state.fail_operations.iter().any(|op| op == "list_clusters") {
            return Err(OkeupError::cli(
                &["ce", "cluster", "list"],
                "rejected by mock",
            ));
        }
        let mut clusters: Vec<ClusterInfo> = state
            .clusters
            .values()
            .filter(|c| c.compartment_id == compartment_id)
            .cloned()
            .collect();
        clusters.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(clusters)
    }

    async fn get_cluster(&self, cluster_id: &str) -> Result<ClusterInfo, OkeupError> {
        let state = self.state.lock().unwrap();
        state
            .clusters
            .get(cluster_id)
            .cloned()
            .ok_or_else(|| OkeupError::ClusterNotFound(cluster_id.to_string()))
    }

    async fn list_node_pools(
        &self,
        _compartment_id: &str,
        cluster_id: &str,
    ) -> Result<Vec<NodePoolInfo>, OkeupError> {
        let state = self.state.lock().unwrap();
        let ids = state.cluster_pools.get(cluster_id).cloned().unwrap_or_default();
        Ok(ids
            .iter()
            .filter_map(|id| state.node_pools.get(id).cloned())
            .collect())
    }

    async fn get_node_pool(&self, node_pool_id: &str) -> Result<NodePoolInfo, OkeupError> {
        let state = self.state.lock().unwrap();
        state
            .node_pools
            .get(node_pool_id)
            .cloned()
            .ok_or_else(|| OkeupError::NodePoolNotFound(node_pool_id.to_string()))
    }

    async fn upgrade_cluster(
        &self,
        cluster_id: &str,
        target_version: &str,
    ) -> Result<WorkRequestHandle, OkeupError> {
        let id = cluster_id.to_string();
        let version = with_v(target_version);
        self.execute(
            "upgrade-control-plane",
            cluster_id,
            format!("upgrade_cluster:{}:{}", cluster_id, version),
            move |state| {
                if let Some(cluster) = state.clusters.get_mut(&id) {
                    cluster.kubernetes_version = version;
                    cluster.available_upgrades.clear();
                }
            },
        )
    }

    async fn upgrade_node_pool(
        &self,
        node_pool_id: &str,
        target_version: &str,
    ) -> Result<WorkRequestHandle, OkeupError> {
        let id = node_pool_id.to_string();
        let version = with_v(target_version);
        self.execute(
            "upgrade-node-pools",
            node_pool_id,
            format!("upgrade_node_pool:{}:{}", node_pool_id, version),
            move |state| {
                if let Some(pool) = state.node_pools.get_mut(&id) {
                    pool.kubernetes_version = version;
                }
            },
        )
    }

    async fn cycle_node_pool(
        &self,
        node_pool_id: &str,
        options: &CyclingOptions,
    ) -> Result<WorkRequestHandle, OkeupError> {
        self.execute(
            "cycle-nodes",
            node_pool_id,
            format!("cycle_node_pool:{}:{}", node_pool_id, options),
            |_| {},
        )
    }

    async fn update_node_pool_image(
        &self,
        node_pool_id: &str,
        image_id: &str,
    ) -> Result<WorkRequestHandle, OkeupError> {
        let id = node_pool_id.to_string();
        let image = image_id.to_string();
        self.execute(
            "bump-image",
            node_pool_id,
            format!("update_node_pool_image:{}:{}", node_pool_id, image_id),
            move |state| {
                if let Some(pool) = state.node_pools.get_mut(&id) {
                    pool.image_id = Some(image);
                }
            },
        )
    }

    async fn delete_cluster(&self, cluster_id: &str) -> Result<WorkRequestHandle, OkeupError> {
        let id = cluster_id.to_string();
        self.execute(
            "delete-cluster",
            cluster_id,
            format!("delete_cluster:{}", cluster_id),
            move |state| {
                state.clusters.remove(&id);
            },
        )
    }

    async fn delete_bucket(&self, namespace: &str, bucket_name: &str) -> Result<(), OkeupError> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(format!("delete_bucket:{}:{}", namespace, bucket_name));
        if state.fail_operations.iter().any(|op| op == "delete-bucket") {
            return Err(OkeupError::execution(
                "delete-bucket",
                bucket_name,
                "rejected by mock",
            ));
        }
        Ok(())
    }

    async fn get_work_request(
        &self,
        work_request_id: &str,
    ) -> Result<WorkRequestStatus, OkeupError> {
        let mut state = self.state.lock().unwrap();
        *state
            .poll_counts
            .entry(work_request_id.to_string())
            .or_insert(0) += 1;

        let next = state
            .scripts
            .get_mut(work_request_id)
            .and_then(|script| script.pop_front());

        match next {
            Some(ScriptedPoll::Status(status)) => {
                state
                    .last_status
                    .insert(work_request_id.to_string(), status);
                Ok(status)
            }
            Some(ScriptedPoll::TransientError) => {
                Err(OkeupError::TransientPoll("mock transport glitch".to_string()))
            }
            Some(ScriptedPoll::FatalError) => Err(OkeupError::cli(
                &["ce", "work-request", "get"],
                "mock deterministic failure",
            )),
            None => Ok(state
                .last_status
                .get(work_request_id)
                .copied()
                .unwrap_or(WorkRequestStatus::Succeeded)),
        }
    }
}

/// Convenience builders shared across module tests.
pub fn cluster(id: &str, name: &str, version: &str, upgrades: &[&str]) -> ClusterInfo {
    ClusterInfo {
        id: id.to_string(),
        name: name.to_string(),
        kubernetes_version: version.to_string(),
        lifecycle_state: crate::oke::types::LifecycleState::Active,
        compartment_id: "ocid1.compartment.oc1..test".to_string(),
        available_upgrades: upgrades.iter().map(|s| s.to_string()).collect(),
    }
}

pub fn node_pool(id: &str, name: &str, version: &str, node_count: usize) -> NodePoolInfo {
    NodePoolInfo {
        id: id.to_string(),
        name: name.to_string(),
        kubernetes_version: version.to_string(),
        lifecycle_state: crate::oke::types::LifecycleState::Active,
        node_count,
        image_id: Some("ocid1.image.oc1..base".to_string()),
    }
}
