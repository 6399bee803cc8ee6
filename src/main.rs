//! okeup - OKE cluster upgrade orchestration CLI tool.
//!
//! Interactive tool for operating OKE clusters with:
//! - Multi-region version reports
//! - Sequential control plane and node pool upgrades
//! - Dry-run previews before every mutation
//! - Per-instance approval gates with typed confirmations

mod approval;
mod catalog;
mod config;
mod error;
mod oke;
mod output;
mod preview;
mod workflow;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use tracing::{debug, error};

use approval::{ApprovalGate, TerminalPrompter};
use config::{Args, Command, DeleteTarget, Meta};
use error::OkeupError;
use oke::cli::{CliAuth, CliClient};
use oke::cycle;
use oke::delete;
use oke::image;
use oke::report;
use oke::types::CyclingOptions;
use oke::upgrade::{self, UpgradeOptions};
use output::{print_operation_catalog, print_upgrade_summary, print_version_report};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    if let Err(e) = init_tracing(&args.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    debug!("Starting okeup - OKE Upgrade Orchestration Tool");

    if let Err(e) = run(args).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing subscriber.
fn init_tracing(log_level: &str) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .map_err(|e| anyhow::anyhow!("Failed to initialize log filter: {}", e))?;

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}

fn client(region: &str, profile: Option<&str>) -> CliClient {
    CliClient::new(CliAuth::new(region, profile.map(str::to_string)))
}

/// Main application logic.
async fn run(args: Args) -> Result<()> {
    // The catalog listing needs no configuration or credentials.
    if let Command::Operations { name } = &args.command {
        let spec = match name.as_deref() {
            Some(name) => Some(catalog::lookup(name).ok_or_else(|| {
                OkeupError::ConfigNotFound(format!(
                    "operation '{}' not found. Available operations: {}",
                    name,
                    catalog::CATALOG
                        .iter()
                        .map(|s| s.name)
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })?),
            None => None,
        };
        print_operation_catalog(spec);
        return Ok(());
    }

    let meta = Meta::load(&args.meta)?;
    let profile = args.profile.as_deref();
    let mut gate = ApprovalGate::new(TerminalPrompter);

    match args.command {
        Command::Report {
            project,
            stage,
            region_workers,
        } => {
            let regions = meta.region_compartments(&project, &stage)?;
            let report = report::build_report(
                |region| client(region, profile),
                &project,
                &stage,
                &regions,
                region_workers,
            )
            .await?;
            print_version_report(&report);
        }

        Command::Upgrade {
            project,
            stage,
            region,
            cluster_id,
            target,
            dry_run,
            parallel,
            maximum_unavailable,
            maximum_surge,
        } => {
            // region lookup doubles as a project/stage sanity check
            meta.compartment_for_region(&project, &stage, &region)?;

            if parallel && !upgrade::parallel_allowed(&stage) {
                return Err(OkeupError::precondition(
                    "upgrade-node-pools",
                    format!("--parallel is not allowed for stage '{}'", stage),
                )
                .into());
            }

            let api = client(&region, profile);
            let options = UpgradeOptions {
                dry_run,
                parallel,
                cycling: CyclingOptions {
                    maximum_unavailable,
                    maximum_surge,
                },
            };
            let (workflow, summary) =
                upgrade::run_upgrade(&api, &mut gate, &cluster_id, target.as_deref(), &options)
                    .await?;
            print_upgrade_summary(&workflow, &summary);
        }

        Command::Cycle {
            project,
            stage,
            region,
            node_pool_id,
            maximum_unavailable,
            maximum_surge,
            dry_run,
        } => {
            meta.compartment_for_region(&project, &stage, &region)?;
            let api = client(&region, profile);
            let options = CyclingOptions {
                maximum_unavailable,
                maximum_surge,
            };
            cycle::run_cycle(&api, &mut gate, &node_pool_id, &options, dry_run).await?;
        }

        Command::BumpImage {
            project,
            stage,
            region,
            node_pool_id,
            image_id,
            dry_run,
        } => {
            meta.compartment_for_region(&project, &stage, &region)?;
            let api = client(&region, profile);
            image::run_bump_image(&api, &mut gate, &node_pool_id, &image_id, dry_run).await?;
        }

        Command::Delete { target } => match target {
            DeleteTarget::Cluster {
                project,
                stage,
                region,
                cluster_id,
                dry_run,
            } => {
                meta.compartment_for_region(&project, &stage, &region)?;
                let api = client(&region, profile);
                delete::run_delete_cluster(&api, &mut gate, &cluster_id, dry_run).await?;
            }
            DeleteTarget::Bucket {
                project,
                stage,
                region,
                namespace,
                bucket_name,
                dry_run,
            } => {
                meta.compartment_for_region(&project, &stage, &region)?;
                let api = client(&region, profile);
                delete::run_delete_bucket(&api, &mut gate, &namespace, &bucket_name, dry_run)
                    .await?;
            }
        },

        // Handled before configuration is loaded.
        Command::Operations { .. } => {}
    }

    println!();
    println!("{}", "Done.".green());
    Ok(())
}
