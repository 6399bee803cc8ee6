//! Version report and operation catalog rendering as kubectl-style tables.

use colored::Colorize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::catalog::{CATALOG, OperationSpec};
use crate::oke::report::VersionReport;

/// Row for the cluster version table.
#[derive(Tabled)]
struct ClusterRow {
    #[tabled(rename = "REGION")]
    region: String,
    #[tabled(rename = "CLUSTER")]
    cluster: String,
    #[tabled(rename = "VERSION")]
    version: String,
    #[tabled(rename = "STATE")]
    state: String,
    #[tabled(rename = "UPGRADES")]
    upgrades: String,
    #[tabled(rename = "NODEPOOLS")]
    node_pools: String,
}

fn apply_table_style(table: &mut Table) {
    use tabled::settings::object::Columns;
    use tabled::settings::themes::Theme;
    use tabled::settings::{Modify, Padding};

    let mut theme = Theme::from_style(Style::empty());
    theme.remove_horizontal_lines();
    table.with(theme);
    table.with(Modify::new(Columns::new(..)).with(Padding::new(0, 2, 0, 0)));
}

fn build_rows(report: &VersionReport) -> Vec<ClusterRow> {
    let mut rows = Vec::new();
    for region in &report.regions {
        for entry in &region.clusters {
            let upgrades = if entry.cluster.available_upgrades.is_empty() {
                "-".to_string()
            } else {
                entry.cluster.available_upgrades.join(", ")
            };

            // Pools lagging behind the control plane are worth seeing at
            // a glance.
            let lagging = entry
                .node_pools
                .iter()
                .filter(|p| p.kubernetes_version != entry.cluster.kubernetes_version)
                .count();
            let node_pools = if lagging > 0 {
                format!("{} ({} behind)", entry.node_pools.len(), lagging)
            } else {
                entry.node_pools.len().to_string()
            };

            rows.push(ClusterRow {
                region: region.region.clone(),
                cluster: entry.cluster.name.clone(),
                version: entry.cluster.kubernetes_version.clone(),
                state: entry.cluster.lifecycle_state.to_string(),
                upgrades,
                node_pools,
            });
        }
    }
    rows
}

/// Print the multi-region version report with a totals footer.
pub fn print_version_report(report: &VersionReport) {
    println!(
        "{} (stage: {}, generated {}):",
        format!("Clusters/{}", report.project).bold(),
        report.stage,
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );

    let rows = build_rows(report);
    if rows.is_empty() {
        println!("No clusters found.");
    } else {
        let mut table = Table::new(&rows);
        apply_table_style(&mut table);
        println!("{}", table);
    }

    for region in &report.regions {
        if let Some(error) = &region.error {
            println!(
                "{} {}: {}",
                "✗".red(),
                region.region,
                error.dimmed()
            );
        }
    }

    println!();
    let needing = report.clusters_needing_upgrade();
    println!(
        "Summary: {} clusters, {} node pools, {}",
        report.total_clusters(),
        report.total_node_pools(),
        if needing > 0 {
            format!("{} upgradable", needing).yellow().to_string()
        } else {
            "all up to date".green().to_string()
        }
    );
}

/// Row for the operation catalog table.
#[derive(Tabled)]
struct OperationRow {
    #[tabled(rename = "OPERATION")]
    operation: String,
    #[tabled(rename = "RISK")]
    risk: String,
    #[tabled(rename = "DRY-RUN")]
    dry_run: String,
    #[tabled(rename = "PHASE")]
    phase: String,
    #[tabled(rename = "PARAMETERS")]
    parameters: String,
}

fn operation_row(spec: &OperationSpec) -> OperationRow {
    OperationRow {
        operation: spec.name.to_string(),
        risk: spec.risk.to_string(),
        dry_run: if spec.supports_dry_run { "yes" } else { "no" }.to_string(),
        phase: spec.phase.unwrap_or("-").to_string(),
        parameters: spec.required_parameters.join(", "),
    }
}

/// Print the full operation catalog, or one entry in detail.
pub fn print_operation_catalog(spec: Option<&OperationSpec>) {
    let rows: Vec<OperationRow> = match spec {
        Some(spec) => vec![operation_row(spec)],
        None => CATALOG.iter().map(|spec| operation_row(spec)).collect(),
    };
    let mut table = Table::new(&rows);
    apply_table_style(&mut table);
    println!("{}", table);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::OperationKind;
    use crate::oke::report::{ClusterReport, RegionReport};
    use chrono::Utc;

    fn report() -> VersionReport {
        let cluster = crate::oke::mock::cluster(
            "ocid1.cluster.oc1..a",
            "alpha",
            "v1.28.2",
            &["v1.29.1"],
        );
        let pools = vec![
            crate::oke::mock::node_pool("ocid1.nodepool.oc1..p1", "pool-1", "v1.28.2", 3),
            crate::oke::mock::node_pool("ocid1.nodepool.oc1..p2", "pool-2", "v1.27.9", 2),
        ];
        VersionReport {
            project: "project-alpha".to_string(),
            stage: "dev".to_string(),
            generated_at: Utc::now(),
            regions: vec![RegionReport {
                region: "us-phoenix-1".to_string(),
                clusters: vec![ClusterReport {
                    cluster,
                    node_pools: pools,
                }],
                error: None,
            }],
        }
    }

    #[test]
    fn test_rows_flag_lagging_pools() {
        let rows = build_rows(&report());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].node_pools, "2 (1 behind)");
        assert_eq!(rows[0].upgrades, "v1.29.1");
    }

    #[test]
    fn test_operation_rows_carry_catalog_fields() {
        let spec = OperationKind::UpgradeNodePools.spec();
        let row = operation_row(spec);
        assert_eq!(row.operation, "upgrade-node-pools");
        assert_eq!(row.risk, "mutating");
        assert_eq!(row.dry_run, "yes");
        assert_eq!(row.phase, "Node Pool Config");
        assert!(row.parameters.contains("target-version"));
    }

    #[test]
    fn test_operation_catalog_renders_every_entry() {
        print_operation_catalog(None);
        print_operation_catalog(Some(OperationKind::DeleteCluster.spec()));
    }

    #[test]
    fn test_empty_report_renders() {
        let empty = VersionReport {
            project: "p".to_string(),
            stage: "dev".to_string(),
            generated_at: Utc::now(),
            regions: Vec::new(),
        };
        assert!(build_rows(&empty).is_empty());
        print_version_report(&empty);
    }
}
