//! Static registry of OKE lifecycle operations.
//!
//! Every operation the tool can perform is listed here with its risk class
//! and dry-run capability, so the set of valid operations is statically
//! enumerable and checkable.

use std::fmt;

/// How dangerous an operation is to a live cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskClass {
    ReadOnly,
    Mutating,
    Destructive,
}

impl RiskClass {
    /// Mutating and destructive operations require an approved request
    /// before execution.
    pub fn requires_approval(self) -> bool {
        !matches!(self, RiskClass::ReadOnly)
    }
}

impl fmt::Display for RiskClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskClass::ReadOnly => "read-only",
            RiskClass::Mutating => "mutating",
            RiskClass::Destructive => "destructive",
        };
        write!(f, "{}", s)
    }
}

/// Closed set of operations okeup knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    VersionReport,
    UpgradeControlPlane,
    UpgradeNodePools,
    CycleNodes,
    BumpImage,
    DeleteBucket,
    DeleteCluster,
}

/// Catalog entry for one operation. Immutable once registered.
#[derive(Debug, Clone, Copy)]
pub struct OperationSpec {
    pub kind: OperationKind,
    pub name: &'static str,
    pub risk: RiskClass,
    pub supports_dry_run: bool,
    pub required_parameters: &'static [&'static str],
    /// Phase this operation belongs to inside the composite upgrade workflow.
    pub phase: Option<&'static str>,
}

const VERSION_REPORT: OperationSpec = OperationSpec {
    kind: OperationKind::VersionReport,
    name: "version-report",
    risk: RiskClass::ReadOnly,
    supports_dry_run: false,
    required_parameters: &["project", "stage"],
    phase: Some("Discovery"),
};

const UPGRADE_CONTROL_PLANE: OperationSpec = OperationSpec {
    kind: OperationKind::UpgradeControlPlane,
    name: "upgrade-control-plane",
    risk: RiskClass::Mutating,
    supports_dry_run: true,
    required_parameters: &["project", "stage", "region", "cluster-id"],
    phase: Some("Control Plane"),
};

const UPGRADE_NODE_POOLS: OperationSpec = OperationSpec {
    kind: OperationKind::UpgradeNodePools,
    name: "upgrade-node-pools",
    risk: RiskClass::Mutating,
    supports_dry_run: true,
    required_parameters: &["project", "stage", "region", "node-pool-id", "target-version"],
    phase: Some("Node Pool Config"),
};

const CYCLE_NODES: OperationSpec = OperationSpec {
    kind: OperationKind::CycleNodes,
    name: "cycle-nodes",
    risk: RiskClass::Mutating,
    supports_dry_run: true,
    required_parameters: &["project", "stage", "region", "node-pool-id"],
    phase: Some("Node Cycling"),
};

const BUMP_IMAGE: OperationSpec = OperationSpec {
    kind: OperationKind::BumpImage,
    name: "bump-image",
    risk: RiskClass::Mutating,
    supports_dry_run: true,
    required_parameters: &["project", "stage", "region", "node-pool-id", "image-id"],
    phase: None,
};

const DELETE_BUCKET: OperationSpec = OperationSpec {
    kind: OperationKind::DeleteBucket,
    name: "delete-bucket",
    risk: RiskClass::Destructive,
    supports_dry_run: true,
    required_parameters: &["project", "stage", "region", "namespace", "bucket-name"],
    phase: None,
};

const DELETE_CLUSTER: OperationSpec = OperationSpec {
    kind: OperationKind::DeleteCluster,
    name: "delete-cluster",
    risk: RiskClass::Destructive,
    supports_dry_run: true,
    required_parameters: &["project", "stage", "region", "cluster-id"],
    phase: None,
};

/// All registered operations.
pub const CATALOG: &[&OperationSpec] = &[
    &VERSION_REPORT,
    &UPGRADE_CONTROL_PLANE,
    &UPGRADE_NODE_POOLS,
    &CYCLE_NODES,
    &BUMP_IMAGE,
    &DELETE_BUCKET,
    &DELETE_CLUSTER,
];

impl OperationKind {
    /// Look up the catalog entry for this operation.
    pub const fn spec(self) -> &'static OperationSpec {
        match self {
            OperationKind::VersionReport => &VERSION_REPORT,
            OperationKind::UpgradeControlPlane => &UPGRADE_CONTROL_PLANE,
            OperationKind::UpgradeNodePools => &UPGRADE_NODE_POOLS,
            OperationKind::CycleNodes => &CYCLE_NODES,
            OperationKind::BumpImage => &BUMP_IMAGE,
            OperationKind::DeleteBucket => &DELETE_BUCKET,
            OperationKind::DeleteCluster => &DELETE_CLUSTER,
        }
    }
}

/// Find an operation by its registered name.
pub fn lookup(name: &str) -> Option<&'static OperationSpec> {
    CATALOG.iter().find(|spec| spec.name == name).copied()
}
