//! Multi-region cluster version report.

use chrono::{DateTime, Utc};
use futures::StreamExt;

use crate::error::OkeupError;
use crate::oke::client::OkeApi;
use crate::oke::types::{ClusterInfo, NodePoolInfo};

/// Ceiling for concurrent region fetches.
pub const DEFAULT_REGION_WORKERS: usize = 4;

#[derive(Debug, Clone)]
pub struct ClusterReport {
    pub cluster: ClusterInfo,
    pub node_pools: Vec<NodePoolInfo>,
}

#[derive(Debug, Clone)]
pub struct RegionReport {
    pub region: String,
    pub clusters: Vec<ClusterReport>,
    /// Set when the region could not be inspected. One region failing does
    /// not abort the report.
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct VersionReport {
    pub project: String,
    pub stage: String,
    pub generated_at: DateTime<Utc>,
    pub regions: Vec<RegionReport>,
}

impl VersionReport {
    pub fn total_clusters(&self) -> usize {
        self.regions.iter().map(|r| r.clusters.len()).sum()
    }

    pub fn clusters_needing_upgrade(&self) -> usize {
        self.regions
            .iter()
            .flat_map(|r| &r.clusters)
            .filter(|c| c.cluster.needs_upgrade())
            .count()
    }

    pub fn total_node_pools(&self) -> usize {
        self.regions
            .iter()
            .flat_map(|r| &r.clusters)
            .map(|c| c.node_pools.len())
            .sum()
    }
}

pub fn worker_ceiling(requested: Option<usize>, n: usize) -> usize {
    requested.unwrap_or(DEFAULT_REGION_WORKERS).min(n).max(1)
}

async fn fetch_region<A: OkeApi>(
    api: &A,
    region: &str,
    compartment_id: &str,
) -> RegionReport {
    let clusters = match api.list_clusters(compartment_id).await {
        Ok(clusters) => clusters,
        Err(e) => {
            tracing::warn!(region, error = %e, "region fetch failed");
            return RegionReport {
                region: region.to_string(),
                clusters: Vec::new(),
                error: Some(e.to_string()),
            };
        }
    };

    let mut reports = Vec::with_capacity(clusters.len());
    for cluster in clusters {
        match api.list_node_pools(compartment_id, &cluster.id).await {
            Ok(node_pools) => reports.push(ClusterReport { cluster, node_pools }),
            Err(e) => {
                tracing::warn!(region, cluster = %cluster.name, error = %e, "node pool listing failed");
                return RegionReport {
                    region: region.to_string(),
                    clusters: reports,
                    error: Some(format!("node pools of {}: {}", cluster.name, e)),
                };
            }
        }
    }

    RegionReport {
        region: region.to_string(),
        clusters: reports,
        error: None,
    }
}

/// Builds the report by fanning out over regions with a bounded worker pool.
/// `make_api` produces a region-scoped client.
pub async fn build_report<A, F>(
    make_api: F,
    project: &str,
    stage: &str,
    regions: &[(String, String)],
    workers: Option<usize>,
) -> Result<VersionReport, OkeupError>
where
    A: OkeApi,
    F: Fn(&str) -> A,
{
    let ceiling = worker_ceiling(workers, regions.len());
    tracing::debug!(regions = regions.len(), workers = ceiling, "building version report");

    let mut region_reports: Vec<RegionReport> = futures::stream::iter(
        regions.iter().map(|(region, compartment_id)| {
            let api = make_api(region);
            async move { fetch_region(&api, region, compartment_id).await }
        }),
    )
    .buffer_unordered(ceiling)
    .collect()
    .await;

    // buffer_unordered finishes in completion order; restore input order.
    region_reports.sort_by_key(|r| {
        regions
            .iter()
            .position(|(region, _)| *region == r.region)
            .unwrap_or(usize::MAX)
    });

    Ok(VersionReport {
        project: project.to_string(),
        stage: stage.to_string(),
        generated_at: Utc::now(),
        regions: region_reports,
    })
}
