//! External collaborator contract for the OKE control plane.
//!
//! The orchestrator never talks to Oracle Cloud directly; everything goes
//! through this trait. Production uses [`crate::oke::cli::CliClient`], which
//! shells out to the `oci` CLI; tests substitute an in-memory double.

use crate::error::OkeupError;
use crate::oke::types::{
    ClusterInfo, CyclingOptions, NodePoolInfo, WorkRequestHandle, WorkRequestStatus,
};

#[allow(async_fn_in_trait)]
pub trait OkeApi {
    // Read-only queries.

    async fn list_clusters(&self, compartment_id: &str) -> Result<Vec<ClusterInfo>, OkeupError>;

    async fn get_cluster(&self, cluster_id: &str) -> Result<ClusterInfo, OkeupError>;

    async fn list_node_pools(
        &self,
        compartment_id: &str,
        cluster_id: &str,
    ) -> Result<Vec<NodePoolInfo>, OkeupError>;

    async fn get_node_pool(&self, node_pool_id: &str) -> Result<NodePoolInfo, OkeupError>;

    // Mutating calls. Each returns a work request handle; the platform may
    // refuse with an execution error.

    async fn upgrade_cluster(
        &self,
        cluster_id: &str,
        target_version: &str,
    ) -> Result<WorkRequestHandle, OkeupError>;

    async fn upgrade_node_pool(
        &self,
        node_pool_id: &str,
        target_version: &str,
    ) -> Result<WorkRequestHandle, OkeupError>;

    async fn cycle_node_pool(
        &self,
        node_pool_id: &str,
        options: &CyclingOptions,
    ) -> Result<WorkRequestHandle, OkeupError>;

    async fn update_node_pool_image(
        &self,
        node_pool_id: &str,
        image_id: &str,
    ) -> Result<WorkRequestHandle, OkeupError>;

    async fn delete_cluster(&self, cluster_id: &str) -> Result<WorkRequestHandle, OkeupError>;

    /// Bucket deletion is synchronous on the platform side; no work request.
    async fn delete_bucket(&self, namespace: &str, bucket_name: &str) -> Result<(), OkeupError>;

    // Status polling.

    async fn get_work_request(
        &self,
        work_request_id: &str,
    ) -> Result<WorkRequestStatus, OkeupError>;
}
