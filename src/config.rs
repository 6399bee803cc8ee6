//! CLI configuration, argument parsing and the meta.yaml compartment map.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::Deserialize;

use crate::error::OkeupError;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const COMMIT: &str = env!("BUILD_COMMIT");
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// OKE cluster upgrade orchestration CLI tool.
///
/// Drives cluster lifecycle operations (version reporting, control plane
/// upgrades, node pool upgrades, node cycling, image updates, deletion)
/// through dry-run previews and per-instance approval gates.
#[derive(Parser, Debug, Clone)]
#[command(name = "okeup")]
#[command(about = "OKE cluster upgrade orchestration CLI tool")]
#[command(version = const_format::formatcp!(
    "{} (commit: {}, build date: {})",
    VERSION, COMMIT, BUILD_DATE
))]
pub struct Args {
    /// OCI profile to use
    #[arg(long, env = "OCI_CLI_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Path to the project/stage/region configuration file
    #[arg(long, default_value = "meta.yaml", env = "OKEUP_META", global = true)]
    pub meta: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", env = "OKEUP_LOG_LEVEL", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Version report for all clusters of a project/stage, across regions
    Report {
        #[arg(long)]
        project: String,
        #[arg(long)]
        stage: String,
        /// Ceiling for concurrent region fetches
        #[arg(long)]
        region_workers: Option<usize>,
    },

    /// Orchestrated cluster upgrade: control plane, node pool config, node cycling
    Upgrade {
        #[arg(long)]
        project: String,
        #[arg(long)]
        stage: String,
        #[arg(long)]
        region: String,
        #[arg(long)]
        cluster_id: String,
        /// Target Kubernetes version (e.g. 1.29.1); defaults to the latest
        /// available upgrade
        #[arg(long)]
        target: Option<String>,
        /// Show previews without executing
        #[arg(long, default_value = "false")]
        dry_run: bool,
        /// Issue approved node pool operations concurrently (non-production only)
        #[arg(long, default_value = "false")]
        parallel: bool,
        /// Maximum nodes unavailable while cycling
        #[arg(long, default_value_t = 1)]
        maximum_unavailable: u32,
        /// Additional surge nodes while cycling
        #[arg(long)]
        maximum_surge: Option<u32>,
    },

    /// Cycle the worker nodes of one node pool (boot volume replacement)
    Cycle {
        #[arg(long)]
        project: String,
        #[arg(long)]
        stage: String,
        #[arg(long)]
        region: String,
        #[arg(long)]
        node_pool_id: String,
        #[arg(long, default_value_t = 1)]
        maximum_unavailable: u32,
        #[arg(long)]
        maximum_surge: Option<u32>,
        #[arg(long, default_value = "false")]
        dry_run: bool,
    },

    /// Roll a new node image onto a node pool
    BumpImage {
        #[arg(long)]
        project: String,
        #[arg(long)]
        stage: String,
        #[arg(long)]
        region: String,
        #[arg(long)]
        node_pool_id: String,
        #[arg(long)]
        image_id: String,
        #[arg(long, default_value = "false")]
        dry_run: bool,
    },

    /// Delete a resource (requires a typed confirmation phrase)
    Delete {
        #[command(subcommand)]
        target: DeleteTarget,
    },

    /// List the registered operations, or show one in detail
    Operations {
        /// Operation name (e.g. upgrade-control-plane)
        name: Option<String>,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum DeleteTarget {
    /// Delete an OKE cluster
    Cluster {
        #[arg(long)]
        project: String,
        #[arg(long)]
        stage: String,
        #[arg(long)]
        region: String,
        #[arg(long)]
        cluster_id: String,
        #[arg(long, default_value = "false")]
        dry_run: bool,
    },
    /// Delete an object storage bucket
    Bucket {
        #[arg(long)]
        project: String,
        #[arg(long)]
        stage: String,
        #[arg(long)]
        region: String,
        #[arg(long)]
        namespace: String,
        #[arg(long)]
        bucket_name: String,
        #[arg(long, default_value = "false")]
        dry_run: bool,
    },
}

// ---------------------------------------------------------------------------
// meta.yaml
// ---------------------------------------------------------------------------

/// Keys at the realm level that are not region names.
const REALM_RESERVED_KEYS: &[&str] = &["tenancy-ocid", "tenancy-name"];

/// One entry under a realm: either a region mapping or reserved tenancy
/// metadata.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RealmEntry {
    Region { compartment_id: String },
    Reserved(String),
}

type RealmMap = BTreeMap<String, RealmEntry>;
type StageMap = BTreeMap<String, RealmMap>;
type ProjectMap = BTreeMap<String, StageMap>;

/// Parsed meta.yaml:
/// `projects.<project>.<stage>.<realm>.<region>.compartment_id`.
#[derive(Debug, Clone, Deserialize)]
pub struct Meta {
    projects: BTreeMap<String, ProjectMap>,
}

fn available(keys: impl Iterator<Item = impl AsRef<str>>) -> String {
    keys.map(|k| k.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl Meta {
    pub fn load(path: &Path) -> Result<Self, OkeupError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| OkeupError::ConfigRead(format!("{}: {}", path.display(), e)))?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self, OkeupError> {
        serde_yaml::from_str(raw).map_err(|e| OkeupError::ConfigRead(e.to_string()))
    }

    fn stage(&self, project: &str, stage: &str) -> Result<&StageMap, OkeupError> {
        let stages = self.projects.get(project).ok_or_else(|| {
            OkeupError::ConfigNotFound(format!(
                "project '{}' not found. Available projects: {}",
                project,
                available(self.projects.keys())
            ))
        })?;
        stages.get(stage).ok_or_else(|| {
            OkeupError::ConfigNotFound(format!(
                "stage '{}' not found for project '{}'. Available stages: {}",
                stage,
                project,
                available(stages.keys())
            ))
        })
    }

    /// All (region, compartment_id) pairs for a project/stage, across realms,
    /// excluding reserved realm-level keys.
    pub fn region_compartments(
        &self,
        project: &str,
        stage: &str,
    ) -> Result<Vec<(String, String)>, OkeupError> {
        let realms = self.stage(project, stage)?;
        let mut pairs = Vec::new();
        for realm in realms.values() {
            for (region, entry) in realm {
                if REALM_RESERVED_KEYS.contains(&region.as_str()) {
                    continue;
                }
                if let RealmEntry::Region { compartment_id } = entry {
                    pairs.push((region.clone(), compartment_id.clone()));
                }
            }
        }
        if pairs.is_empty() {
            return Err(OkeupError::ConfigNotFound(format!(
                "no regions configured for projects.{}.{}",
                project, stage
            )));
        }
        Ok(pairs)
    }

    /// Compartment for one region of a project/stage, searching every realm.
    pub fn compartment_for_region(
        &self,
        project: &str,
        stage: &str,
        region: &str,
    ) -> Result<String, OkeupError> {
        let pairs = self.region_compartments(project, stage)?;
        pairs
            .iter()
            .find(|(r, _)| r == region)
            .map(|(_, c)| c.clone())
            .ok_or_else(|| {
                OkeupError::ConfigNotFound(format!(
                    "region '{}' not found for projects.{}.{}. Available regions: {}",
                    region,
                    project,
                    stage,
                    available(pairs.iter().map(|(r, _)| r.as_str()))
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const META: &str = r#"
projects:
  project-alpha:
    dev:
      oc1:
        tenancy-ocid: ocid1.tenancy.oc1..dev
        tenancy-name: alpha-dev
        us-phoenix-1:
          compartment_id: ocid1.compartment.oc1..phx
        us-ashburn-1:
          compartment_id: ocid1.compartment.oc1..iad
    prod:
      oc1:
        tenancy-ocid: ocid1.tenancy.oc1..prod
        us-phoenix-1:
          compartment_id: ocid1.compartment.oc1..prodphx
      oc17:
        us-chicago-1:
          compartment_id: ocid1.compartment.oc17..ord
"#;

    #[test]
    fn test_parse_meta() {
        let meta = Meta::parse(META).unwrap();
        let pairs = meta.region_compartments("project-alpha", "dev").unwrap();
        assert_eq!(pairs.len(), 2);
    }

    #[test]
    fn test_reserved_keys_are_not_regions() {
        let meta = Meta::parse(META).unwrap();
        let pairs = meta.region_compartments("project-alpha", "dev").unwrap();
        assert!(pairs.iter().all(|(r, _)| !r.starts_with("tenancy")));
    }

    #[test]
    fn test_regions_collected_across_realms() {
        let meta = Meta::parse(META).unwrap();
        let pairs = meta.region_compartments("project-alpha", "prod").unwrap();
        let regions: Vec<&str> = pairs.iter().map(|(r, _)| r.as_str()).collect();
        assert!(regions.contains(&"us-phoenix-1"));
        assert!(regions.contains(&"us-chicago-1"));
    }

    #[test]
    fn test_compartment_for_region() {
        let meta = Meta::parse(META).unwrap();
        let compartment = meta
            .compartment_for_region("project-alpha", "dev", "us-ashburn-1")
            .unwrap();
        assert_eq!(compartment, "ocid1.compartment.oc1..iad");
    }

    #[test]
    fn test_unknown_project_lists_alternatives() {
        let meta = Meta::parse(META).unwrap();
        let err = meta.region_compartments("project-omega", "dev").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("project-omega"));
        assert!(msg.contains("project-alpha"));
    }

    #[test]
    fn test_unknown_stage_lists_alternatives() {
        let meta = Meta::parse(META).unwrap();
        let err = meta
            .region_compartments("project-alpha", "staging")
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("staging"));
        assert!(msg.contains("dev"));
        assert!(msg.contains("prod"));
    }

    #[test]
    fn test_unknown_region_lists_alternatives() {
        let meta = Meta::parse(META).unwrap();
        let err = meta
            .compartment_for_region("project-alpha", "dev", "eu-frankfurt-1")
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("eu-frankfurt-1"));
        assert!(msg.contains("us-phoenix-1"));
    }

    #[test]
    fn test_args_parse_upgrade() {
        let args = Args::try_parse_from([
            "okeup",
            "upgrade",
            "--project",
            "project-alpha",
            "--stage",
            "dev",
            "--region",
            "us-phoenix-1",
            "--cluster-id",
            "ocid1.cluster.oc1..aaa",
            "--target",
            "1.29.1",
            "--dry-run",
        ])
        .unwrap();

        match args.command {
            Command::Upgrade {
                ref target,
                dry_run,
                parallel,
                maximum_unavailable,
                ..
            } => {
                assert_eq!(target.as_deref(), Some("1.29.1"));
                assert!(dry_run);
                assert!(!parallel);
                assert_eq!(maximum_unavailable, 1);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_args_parse_delete_bucket() {
        let args = Args::try_parse_from([
            "okeup",
            "delete",
            "bucket",
            "--project",
            "project-alpha",
            "--stage",
            "dev",
            "--region",
            "us-phoenix-1",
            "--namespace",
            "axfoo",
            "--bucket-name",
            "scratch",
        ])
        .unwrap();

        match args.command {
            Command::Delete {
                target: DeleteTarget::Bucket { ref bucket_name, .. },
            } => assert_eq!(bucket_name, "scratch"),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_args_parse_operations() {
        let args = Args::try_parse_from(["okeup", "operations", "cycle-nodes"]).unwrap();
        match args.command {
            Command::Operations { ref name } => assert_eq!(name.as_deref(), Some("cycle-nodes")),
            other => panic!("unexpected command: {:?}", other),
        }

        let args = Args::try_parse_from(["okeup", "operations"]).unwrap();
        assert!(matches!(args.command, Command::Operations { name: None }));
    }

    #[test]
    fn test_args_require_subcommand() {
        assert!(Args::try_parse_from(["okeup"]).is_err());
    }
}
