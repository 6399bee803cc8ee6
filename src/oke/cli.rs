//! OCI CLI subprocess glue.
//!
//! [`CliClient`] implements [`OkeApi`] by invoking the `oci` binary with
//! `--output json` and parsing the documented response shapes. The SDK
//! itself is never linked; the CLI is the platform boundary.

use serde::Deserialize;
use serde_json::json;
use tokio::process::Command;
use tracing::debug;

use crate::error::OkeupError;
use crate::oke::client::OkeApi;
use crate::oke::types::{
    ClusterInfo, CyclingOptions, LifecycleState, NodePoolInfo, WorkRequestHandle,
    WorkRequestStatus,
};

/// Scoped credentials/context for one region. Owned by the caller and passed
/// in; there is no process-wide session singleton.
#[derive(Debug, Clone)]
pub struct CliAuth {
    pub region: String,
    pub profile: Option<String>,
    pub config_file: Option<String>,
}

impl CliAuth {
    pub fn new(region: impl Into<String>, profile: Option<String>) -> Self {
        Self {
            region: region.into(),
            profile,
            config_file: None,
        }
    }
}

/// `oci` CLI-backed implementation of the platform contract.
#[derive(Debug, Clone)]
pub struct CliClient {
    auth: CliAuth,
}

// ---------------------------------------------------------------------------
// CLI JSON response shapes (kebab-case keys, wrapped in a "data" envelope)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct ClusterData {
    id: String,
    name: String,
    #[serde(rename = "kubernetes-version")]
    kubernetes_version: String,
    #[serde(rename = "lifecycle-state")]
    lifecycle_state: LifecycleState,
    #[serde(rename = "compartment-id")]
    compartment_id: String,
    #[serde(rename = "available-kubernetes-upgrades", default)]
    available_kubernetes_upgrades: Vec<String>,
}

impl From<ClusterData> for ClusterInfo {
    fn from(data: ClusterData) -> Self {
        ClusterInfo {
            id: data.id,
            name: data.name,
            kubernetes_version: data.kubernetes_version,
            lifecycle_state: data.lifecycle_state,
            compartment_id: data.compartment_id,
            available_upgrades: data.available_kubernetes_upgrades,
        }
    }
}

#[derive(Debug, Deserialize)]
struct NodePoolData {
    id: String,
    name: String,
    #[serde(rename = "kubernetes-version")]
    kubernetes_version: String,
    #[serde(rename = "lifecycle-state")]
    lifecycle_state: LifecycleState,
    #[serde(default)]
    nodes: Option<Vec<serde_json::Value>>,
    #[serde(rename = "node-source-details", default)]
    node_source_details: Option<NodeSourceDetails>,
}

#[derive(Debug, Deserialize)]
struct NodeSourceDetails {
    #[serde(rename = "image-id", default)]
    image_id: Option<String>,
}

impl From<NodePoolData> for NodePoolInfo {
    fn from(data: NodePoolData) -> Self {
        NodePoolInfo {
            id: data.id,
            name: data.name,
            kubernetes_version: data.kubernetes_version,
            lifecycle_state: data.lifecycle_state,
            node_count: data.nodes.map(|n| n.len()).unwrap_or(0),
            image_id: data.node_source_details.and_then(|d| d.image_id),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WorkRequestAccepted {
    #[serde(rename = "opc-work-request-id")]
    opc_work_request_id: String,
}

#[derive(Debug, Deserialize)]
struct WorkRequestData {
    status: WorkRequestStatus,
}

/// Kubernetes versions are sent to the platform with the `v` prefix.
fn api_version(version: &str) -> String {
    if version.starts_with('v') {
        version.to_string()
    } else {
        format!("v{}", version)
    }
}

impl CliClient {
    pub fn new(auth: CliAuth) -> Self {
        Self { auth }
    }

    pub fn region(&self) -> &str {
        &self.auth.region
    }

    /// Spawn one `oci` invocation and collect its output. A failure to launch
    /// the binary at all is deterministic and never retried.
    async fn spawn(&self, args: &[&str]) -> Result<std::process::Output, OkeupError> {
        let mut cmd = Command::new("oci");
        cmd.args(args).args(["--output", "json"]);
        cmd.args(["--region", &self.auth.region]);
        if let Some(profile) = &self.auth.profile {
            cmd.args(["--profile", profile]);
        }
        if let Some(config_file) = &self.auth.config_file {
            cmd.args(["--config-file", config_file]);
        }

        debug!("oci {}", args.join(" "));
        cmd.output()
            .await
            .map_err(|e| OkeupError::cli(args, format!("failed to spawn oci: {}", e)))
    }

    /// Run one `oci` invocation and return its stdout.
    async fn run(&self, args: &[&str]) -> Result<String, OkeupError> {
        let output = self.spawn(args).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OkeupError::cli(args, stderr.trim().to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn run_parsed<T: serde::de::DeserializeOwned>(
        &self,
        args: &[&str],
    ) -> Result<T, OkeupError> {
        let stdout = self.run(args).await?;
        serde_json::from_str(&stdout)
            .map_err(|e| OkeupError::cli(args, format!("unparseable response: {}", e)))
    }

    /// Run a mutating call and lift CLI failures into execution errors with
    /// full context.
    async fn run_mutating(
        &self,
        operation: &'static str,
        resource: &str,
        args: &[&str],
    ) -> Result<WorkRequestHandle, OkeupError> {
        let accepted: WorkRequestAccepted = match self.run_parsed(args).await {
            Ok(accepted) => accepted,
            Err(OkeupError::Cli { detail, .. }) => {
                return Err(OkeupError::execution(operation, resource, detail));
            }
            Err(e) => return Err(e),
        };

        debug!(
            "{} accepted, work request {}",
            operation, accepted.opc_work_request_id
        );
        Ok(WorkRequestHandle {
            id: accepted.opc_work_request_id,
            operation,
            status: WorkRequestStatus::Accepted,
        })
    }
}

impl OkeApi for CliClient {
    async fn list_clusters(&self, compartment_id: &str) -> Result<Vec<ClusterInfo>, OkeupError> {
        let data: Envelope<Vec<ClusterData>> = self
            .run_parsed(&[
                "ce",
                "cluster",
                "list",
                "--compartment-id",
                compartment_id,
                "--lifecycle-state",
                "ACTIVE",
            ])
            .await?;
        Ok(data.data.into_iter().map(ClusterInfo::from).collect())
    }

    async fn get_cluster(&self, cluster_id: &str) -> Result<ClusterInfo, OkeupError> {
        let data: Envelope<ClusterData> = self
            .run_parsed(&["ce", "cluster", "get", "--cluster-id", cluster_id])
            .await?;
        Ok(data.data.into())
    }

    async fn list_node_pools(
        &self,
        compartment_id: &str,
        cluster_id: &str,
    ) -> Result<Vec<NodePoolInfo>, OkeupError> {
        let data: Envelope<Vec<NodePoolData>> = self
            .run_parsed(&[
                "ce",
                "node-pool",
                "list",
                "--compartment-id",
                compartment_id,
                "--cluster-id",
                cluster_id,
            ])
            .await?;
        Ok(data.data.into_iter().map(NodePoolInfo::from).collect())
    }

    async fn get_node_pool(&self, node_pool_id: &str) -> Result<NodePoolInfo, OkeupError> {
        let data: Envelope<NodePoolData> = self
            .run_parsed(&["ce", "node-pool", "get", "--node-pool-id", node_pool_id])
            .await?;
        Ok(data.data.into())
    }

    async fn upgrade_cluster(
        &self,
        cluster_id: &str,
        target_version: &str,
    ) -> Result<WorkRequestHandle, OkeupError> {
        let version = api_version(target_version);
        self.run_mutating(
            "upgrade-control-plane",
            cluster_id,
            &[
                "ce",
                "cluster",
                "update",
                "--cluster-id",
                cluster_id,
                "--kubernetes-version",
                &version,
            ],
        )
        .await
    }

    async fn upgrade_node_pool(
        &self,
        node_pool_id: &str,
        target_version: &str,
    ) -> Result<WorkRequestHandle, OkeupError> {
        let version = api_version(target_version);
        self.run_mutating(
            "upgrade-node-pools",
            node_pool_id,
            &[
                "ce",
                "node-pool",
                "update",
                "--node-pool-id",
                node_pool_id,
                "--kubernetes-version",
                &version,
            ],
        )
        .await
    }

    async fn cycle_node_pool(
        &self,
        node_pool_id: &str,
        options: &CyclingOptions,
    ) -> Result<WorkRequestHandle, OkeupError> {
        let details = cycling_details_json(options);
        self.run_mutating(
            "cycle-nodes",
            node_pool_id,
            &[
                "ce",
                "node-pool",
                "update",
                "--node-pool-id",
                node_pool_id,
                "--node-pool-cycling-details",
                &details,
                "--force",
            ],
        )
        .await
    }

    async fn update_node_pool_image(
        &self,
        node_pool_id: &str,
        image_id: &str,
    ) -> Result<WorkRequestHandle, OkeupError> {
        let details = json!({ "sourceType": "IMAGE", "imageId": image_id }).to_string();
        self.run_mutating(
            "bump-image",
            node_pool_id,
            &[
                "ce",
                "node-pool",
                "update",
                "--node-pool-id",
                node_pool_id,
                "--node-source-details",
                &details,
                "--force",
            ],
        )
        .await
    }

    async fn delete_cluster(&self, cluster_id: &str) -> Result<WorkRequestHandle, OkeupError> {
        self.run_mutating(
            "delete-cluster",
            cluster_id,
            &["ce", "cluster", "delete", "--cluster-id", cluster_id, "--force"],
        )
        .await
    }

    async fn delete_bucket(&self, namespace: &str, bucket_name: &str) -> Result<(), OkeupError> {
        let args = [
            "os",
            "bucket",
            "delete",
            "--namespace",
            namespace,
            "--bucket-name",
            bucket_name,
            "--force",
        ];
        match self.run(&args).await {
            Ok(_) => Ok(()),
            Err(OkeupError::Cli { detail, .. }) => {
                Err(OkeupError::execution("delete-bucket", bucket_name, detail))
            }
            Err(e) => Err(e),
        }
    }

    async fn get_work_request(
        &self,
        work_request_id: &str,
    ) -> Result<WorkRequestStatus, OkeupError> {
        let args = [
            "ce",
            "work-request",
            "get",
            "--work-request-id",
            work_request_id,
        ];
        let output = self.spawn(&args).await?;
        if !output.status.success() {
            // A refused status query is typically throttling or a transport
            // blip; the poller owns the retry budget for those.
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OkeupError::TransientPoll(stderr.trim().to_string()));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let data: Envelope<WorkRequestData> = serde_json::from_str(&stdout)
            .map_err(|e| OkeupError::cli(&args, format!("unparseable response: {}", e)))?;
        Ok(data.data.status)
    }
}

/// Cycling details payload: boot volume replacement, counts as strings per
/// the service schema.
fn cycling_details_json(options: &CyclingOptions) -> String {
    let mut details = json!({
        "isNodeCyclingEnabled": true,
        "cycleModes": ["BOOT_VOLUME_REPLACE"],
        "maximumUnavailable": options.maximum_unavailable.to_string(),
    });
    if let Some(surge) = options.maximum_surge {
        details["maximumSurge"] = json!(surge.to_string());
    }
    details.to_string()
}
