//! Common types for OKE resources and work requests.

use std::fmt;

use serde::Deserialize;

use crate::error::OkeupError;

/// OCI resource lifecycle states relevant to cluster operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    Creating,
    Active,
    Updating,
    Deleting,
    Deleted,
    Failed,
    NeedsAttention,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleState::Creating => "CREATING",
            LifecycleState::Active => "ACTIVE",
            LifecycleState::Updating => "UPDATING",
            LifecycleState::Deleting => "DELETING",
            LifecycleState::Deleted => "DELETED",
            LifecycleState::Failed => "FAILED",
            LifecycleState::NeedsAttention => "NEEDS_ATTENTION",
            LifecycleState::Unknown => "UNKNOWN",
        };
        write!(f, "{}", s)
    }
}

/// Work request status as reported by the container engine service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkRequestStatus {
    Accepted,
    InProgress,
    Succeeded,
    Failed,
    Canceling,
    Canceled,
}

impl WorkRequestStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            WorkRequestStatus::Succeeded | WorkRequestStatus::Failed | WorkRequestStatus::Canceled
        )
    }
}

impl fmt::Display for WorkRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkRequestStatus::Accepted => "ACCEPTED",
            WorkRequestStatus::InProgress => "IN_PROGRESS",
            WorkRequestStatus::Succeeded => "SUCCEEDED",
            WorkRequestStatus::Failed => "FAILED",
            WorkRequestStatus::Canceling => "CANCELING",
            WorkRequestStatus::Canceled => "CANCELED",
        };
        write!(f, "{}", s)
    }
}

/// Handle to an asynchronous mutating operation on the platform.
#[derive(Debug, Clone)]
pub struct WorkRequestHandle {
    pub id: String,
    /// Catalog name of the operation that issued this request.
    pub operation: &'static str,
    pub status: WorkRequestStatus,
}

/// Summary information about an OKE cluster.
#[derive(Debug, Clone)]
pub struct ClusterInfo {
    pub id: String,
    pub name: String,
    pub kubernetes_version: String,
    pub lifecycle_state: LifecycleState,
    pub compartment_id: String,
    pub available_upgrades: Vec<String>,
}

impl ClusterInfo {
    pub fn needs_upgrade(&self) -> bool {
        !self.available_upgrades.is_empty()
    }
}

impl fmt::Display for ClusterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) - {}",
            self.name, self.kubernetes_version, self.lifecycle_state
        )
    }
}

/// Summary information about an OKE node pool.
#[derive(Debug, Clone)]
pub struct NodePoolInfo {
    pub id: String,
    pub name: String,
    pub kubernetes_version: String,
    pub lifecycle_state: LifecycleState,
    /// Worker count; 0 when the listing did not include nodes.
    pub node_count: usize,
    pub image_id: Option<String>,
}

/// Rolling-replacement options for node cycling (boot volume replace).
#[derive(Debug, Clone)]
pub struct CyclingOptions {
    pub maximum_unavailable: u32,
    pub maximum_surge: Option<u32>,
}

impl Default for CyclingOptions {
    fn default() -> Self {
        Self {
            maximum_unavailable: 1,
            maximum_surge: None,
        }
    }
}

impl fmt::Display for CyclingOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.maximum_surge {
            Some(surge) => write!(
                f,
                "max_unavailable={}, max_surge={}",
                self.maximum_unavailable, surge
            ),
            None => write!(f, "max_unavailable={}", self.maximum_unavailable),
        }
    }
}

/// Strip the `v` prefix OKE puts on Kubernetes versions.
pub fn normalize_version(version: &str) -> &str {
    version.strip_prefix('v').unwrap_or(version)
}

/// Parse an OKE Kubernetes version ("v1.29.1" or "1.29.1").
pub fn parse_version(version: &str) -> Result<semver::Version, OkeupError> {
    semver::Version::parse(normalize_version(version))
        .map_err(|_| OkeupError::InvalidVersion(version.to_string()))
}

/// True when both strings name the same version, ignoring the `v` prefix.
pub fn same_version(a: &str, b: &str) -> bool {
    normalize_version(a) == normalize_version(b)
}

/// Pick the highest version from a list of available upgrades.
pub fn latest_upgrade(available: &[String]) -> Option<&String> {
    available
        .iter()
        .filter(|v| parse_version(v).is_ok())
        .max_by_key(|v| parse_version(v).ok())
}
