//! Orchestrated cluster upgrade.
//!
//! Four phases, strictly ordered: discovery, control plane upgrade, node
//! pool configuration, node cycling. Every mutating instance is previewed
//! and individually gated; rejecting one node pool never blocks its
//! siblings, but rejecting the control plane leaves the later phases unable
//! to meet their preconditions.

use std::time::Duration;

use colored::Colorize;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};

use crate::approval::{fingerprint, ApprovalGate, ApprovalRequest, ApprovedAction, Prompter};
use crate::catalog::OperationKind;
use crate::error::OkeupError;
use crate::oke::client::OkeApi;
use crate::oke::cycle::cycle_preview;
use crate::oke::poll::{verify_succeeded, PollConfig};
use crate::oke::types::{
    latest_upgrade, parse_version, same_version, ClusterInfo, CyclingOptions, LifecycleState,
    NodePoolInfo, WorkRequestHandle,
};
use crate::preview::{print_preview, PreviewResult};
use crate::workflow::{PhaseState, Workflow};

pub const UPGRADE_PHASES: [&str; 4] = [
    "Discovery",
    "Control Plane",
    "Node Pool Config",
    "Node Cycling",
];

pub const PHASE_DISCOVERY: usize = 0;
pub const PHASE_CONTROL_PLANE: usize = 1;
pub const PHASE_POOL_CONFIG: usize = 2;
pub const PHASE_CYCLING: usize = 3;

/// Ceiling for concurrently executing node pool operations.
pub const MAX_PARALLEL_POOLS: usize = 4;

/// Parallel execution is reserved for non-production stages. Approvals stay
/// one-per-instance either way.
pub fn parallel_allowed(stage: &str) -> bool {
    stage != "prod"
}

fn exec_ceiling(parallel: bool, n: usize) -> usize {
    if parallel {
        n.min(MAX_PARALLEL_POOLS).max(1)
    } else {
        1
    }
}

#[derive(Debug, Clone, Default)]
pub struct UpgradeOptions {
    pub dry_run: bool,
    pub parallel: bool,
    pub cycling: CyclingOptions,
}

#[derive(Debug, Clone)]
pub struct SkippedPool {
    pub pool: NodePoolInfo,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct UpgradePlan {
    pub cluster: ClusterInfo,
    /// Resolved target, `v`-prefixed.
    pub target_version: String,
    pub control_plane_needed: bool,
    pub pool_upgrades: Vec<NodePoolInfo>,
    pub skipped_pools: Vec<SkippedPool>,
}

impl UpgradePlan {
    pub fn is_noop(&self) -> bool {
        !self.control_plane_needed && self.pool_upgrades.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct UpgradeSummary {
    pub cluster_id: String,
    pub cluster_name: String,
    pub previous_version: String,
    pub new_version: String,
    pub pools_upgraded: Vec<String>,
    pub pools_cycled: Vec<String>,
    pub work_requests: Vec<String>,
    pub warnings: Vec<String>,
}

fn resolve_target(cluster: &ClusterInfo, requested: Option<&str>) -> Result<String, OkeupError> {
    match requested {
        Some(version) => {
            parse_version(version)?;
            if same_version(version, &cluster.kubernetes_version) {
                return Ok(cluster.kubernetes_version.clone());
            }
            cluster
                .available_upgrades
                .iter()
                .find(|v| same_version(v, version))
                .cloned()
                .ok_or_else(|| {
                    OkeupError::UpgradeNotPossible(format!(
                        "'{}' is not an available upgrade for {} (at {}). Available: {}",
                        version,
                        cluster.name,
                        cluster.kubernetes_version,
                        if cluster.available_upgrades.is_empty() {
                            "none".to_string()
                        } else {
                            cluster.available_upgrades.join(", ")
                        }
                    ))
                })
        }
        // No explicit target: latest available upgrade, or the current
        // control plane version when the pools merely lag behind it.
        None => Ok(latest_upgrade(&cluster.available_upgrades)
            .cloned()
            .unwrap_or_else(|| cluster.kubernetes_version.clone())),
    }
}

/// Read the cluster and its node pools and decide what the upgrade would
/// touch. Read-only.
pub async fn discover<A: OkeApi>(
    api: &A,
    cluster_id: &str,
    target: Option<&str>,
) -> Result<UpgradePlan, OkeupError> {
    let cluster = api.get_cluster(cluster_id).await?;
    if cluster.lifecycle_state != LifecycleState::Active {
        return Err(OkeupError::precondition(
            "upgrade-control-plane",
            format!("cluster {} is {}", cluster.name, cluster.lifecycle_state),
        ));
    }

    let target_version = resolve_target(&cluster, target)?;
    let control_plane_needed = !same_version(&cluster.kubernetes_version, &target_version);

    let pools = api
        .list_node_pools(&cluster.compartment_id, &cluster.id)
        .await?;
    let mut pool_upgrades = Vec::new();
    let mut skipped_pools = Vec::new();
    for pool in pools {
        if pool.lifecycle_state != LifecycleState::Active {
            skipped_pools.push(SkippedPool {
                reason: format!("lifecycle state {}", pool.lifecycle_state),
                pool,
            });
        } else if same_version(&pool.kubernetes_version, &target_version) {
            skipped_pools.push(SkippedPool {
                reason: format!("already at {}", target_version),
                pool,
            });
        } else {
            pool_upgrades.push(pool);
        }
    }

    Ok(UpgradePlan {
        cluster,
        target_version,
        control_plane_needed,
        pool_upgrades,
        skipped_pools,
    })
}

fn phase_header(index: usize) {
    println!();
    println!(
        "{}",
        format!(
            "[Phase {}/{}] {}",
            index + 1,
            UPGRADE_PHASES.len(),
            UPGRADE_PHASES[index]
        )
        .bold()
    );
}

fn spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})").unwrap());
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

pub fn print_plan(plan: &UpgradePlan) {
    println!(
        "Cluster {} at {}, target {}",
        plan.cluster.name.bold(),
        plan.cluster.kubernetes_version,
        plan.target_version.bold()
    );
    if plan.control_plane_needed {
        println!(
            "  control plane: {} -> {}",
            plan.cluster.kubernetes_version, plan.target_version
        );
    } else {
        println!("  control plane: already at target");
    }
    for pool in &plan.pool_upgrades {
        println!(
            "  node pool {}: {} -> {} ({} nodes)",
            pool.name, pool.kubernetes_version, plan.target_version, pool.node_count
        );
    }
    for skipped in &plan.skipped_pools {
        println!(
            "  node pool {}: {} ({})",
            skipped.pool.name,
            "unchanged".dimmed(),
            skipped.reason
        );
    }
}

fn control_plane_preview(plan: &UpgradePlan) -> Result<PreviewResult, OkeupError> {
    let spec = OperationKind::UpgradeControlPlane.spec();
    let mut preview = PreviewResult::for_operation(spec)?;
    preview.push(
        format!("{} control plane", plan.cluster.name),
        plan.cluster.kubernetes_version.clone(),
        plan.target_version.clone(),
    );
    Ok(preview)
}

fn pool_config_preview(pool: &NodePoolInfo, target: &str) -> Result<PreviewResult, OkeupError> {
    let spec = OperationKind::UpgradeNodePools.spec();
    let mut preview = PreviewResult::for_operation(spec)?;
    preview.push(
        format!("{} kubernetes version", pool.name),
        pool.kubernetes_version.clone(),
        target.to_string(),
    );
    Ok(preview)
}

struct Approved {
    pool: NodePoolInfo,
    token: ApprovedAction,
    fingerprint: String,
    operation: &'static str,
}

/// Run the full four-phase upgrade. Rejections produce warnings and a
/// halted-but-successful return; execution and verification failures mark
/// the phase FAILED and surface as errors.
pub async fn run_upgrade<A: OkeApi, P: Prompter>(
    api: &A,
    gate: &mut ApprovalGate<P>,
    cluster_id: &str,
    target: Option<&str>,
    options: &UpgradeOptions,
) -> Result<(Workflow, UpgradeSummary), OkeupError> {
    let mut workflow = Workflow::new(&UPGRADE_PHASES);
    let mut warnings: Vec<String> = Vec::new();
    let mut pools_upgraded: Vec<String> = Vec::new();
    let mut upgraded_ids: Vec<String> = Vec::new();
    let mut pools_cycled: Vec<String> = Vec::new();

    // Phase 1: discovery. Read-only, no gate.
    phase_header(PHASE_DISCOVERY);
    workflow.begin(PHASE_DISCOVERY)?;
    workflow.transition(PHASE_DISCOVERY, PhaseState::Executing)?;
    let plan = discover(api, cluster_id, target).await?;
    print_plan(&plan);
    workflow.transition(PHASE_DISCOVERY, PhaseState::Complete)?;

    let summary_base = |workflow: &Workflow,
                        new_version: String,
                        pools_upgraded: Vec<String>,
                        pools_cycled: Vec<String>,
                        warnings: Vec<String>| UpgradeSummary {
        cluster_id: plan.cluster.id.clone(),
        cluster_name: plan.cluster.name.clone(),
        previous_version: plan.cluster.kubernetes_version.clone(),
        new_version,
        pools_upgraded,
        pools_cycled,
        work_requests: workflow.work_requests(),
        warnings,
    };

    if plan.is_noop() {
        println!("{} nothing to upgrade", "✓".green());
        for index in [PHASE_CONTROL_PLANE, PHASE_POOL_CONFIG, PHASE_CYCLING] {
            workflow.transition(index, PhaseState::Skipped)?;
        }
        let version = plan.cluster.kubernetes_version.clone();
        let summary = summary_base(&workflow, version, Vec::new(), Vec::new(), warnings);
        return Ok((workflow, summary));
    }

    if options.dry_run {
        print_dry_run(&plan, &options.cycling)?;
        for index in [PHASE_CONTROL_PLANE, PHASE_POOL_CONFIG, PHASE_CYCLING] {
            workflow.transition(index, PhaseState::Skipped)?;
        }
        let version = plan.cluster.kubernetes_version.clone();
        let summary = summary_base(&workflow, version, Vec::new(), Vec::new(), warnings);
        return Ok((workflow, summary));
    }

    // Phase 2: control plane.
    phase_header(PHASE_CONTROL_PLANE);
    if !plan.control_plane_needed {
        println!("control plane already at {}", plan.target_version);
        workflow.transition(PHASE_CONTROL_PLANE, PhaseState::Skipped)?;
    } else {
        workflow.begin(PHASE_CONTROL_PLANE)?;
        let preview = control_plane_preview(&plan)?;
        print_preview(&preview);
        workflow.transition(PHASE_CONTROL_PLANE, PhaseState::AwaitingApproval)?;

        let spec = OperationKind::UpgradeControlPlane.spec();
        let request = ApprovalRequest::new(
            spec,
            &preview,
            &plan.cluster.name,
            "API server restarts; workloads keep running",
        );
        match gate.await_response(&request)? {
            Some(token) => {
                workflow.transition(PHASE_CONTROL_PLANE, PhaseState::Executing)?;
                token.consume(
                    spec.name,
                    &fingerprint(spec.name, &plan.cluster.name, &preview.changes),
                )?;

                let handle = match api
                    .upgrade_cluster(&plan.cluster.id, &plan.target_version)
                    .await
                {
                    Ok(handle) => handle,
                    Err(e) => {
                        workflow.transition(PHASE_CONTROL_PLANE, PhaseState::Failed)?;
                        return Err(e);
                    }
                };
                workflow.record_work_request(PHASE_CONTROL_PLANE, &handle.id);
                workflow.transition(PHASE_CONTROL_PLANE, PhaseState::Verifying)?;

                let pb = spinner(format!(
                    "upgrading control plane of {} to {}",
                    plan.cluster.name, plan.target_version
                ));
                let verified =
                    verify_succeeded(api, &handle, &plan.cluster.name, &PollConfig::control_plane())
                        .await;
                pb.finish_and_clear();
                if let Err(e) = verified {
                    workflow.transition(PHASE_CONTROL_PLANE, PhaseState::Failed)?;
                    return Err(e);
                }
                workflow.transition(PHASE_CONTROL_PLANE, PhaseState::Complete)?;
                println!(
                    "{} control plane at {}",
                    "✓".green(),
                    plan.target_version
                );
            }
            None => {
                workflow.transition(PHASE_CONTROL_PLANE, PhaseState::Skipped)?;
                warnings.push(format!(
                    "control plane upgrade of {} rejected",
                    plan.cluster.name
                ));
            }
        }
    }

    // Phase 3 precondition: the control plane must actually be at the
    // target before any pool follows it. A rejected control plane upgrade
    // halts here with the remaining phases untouched.
    let fresh = api.get_cluster(&plan.cluster.id).await?;
    if !same_version(&fresh.kubernetes_version, &plan.target_version) {
        let warning = format!(
            "control plane is at {}, not {}; node pool phases not started",
            fresh.kubernetes_version, plan.target_version
        );
        println!("{} {}", "!".yellow().bold(), warning);
        warnings.push(warning);
        let summary = summary_base(
            &workflow,
            fresh.kubernetes_version.clone(),
            pools_upgraded,
            pools_cycled,
            warnings,
        );
        return Ok((workflow, summary));
    }

    // Phase 3: node pool configuration.
    phase_header(PHASE_POOL_CONFIG);
    if plan.pool_upgrades.is_empty() {
        println!("every node pool is already at {}", plan.target_version);
        workflow.transition(PHASE_POOL_CONFIG, PhaseState::Skipped)?;
    } else {
        workflow.begin(PHASE_POOL_CONFIG)?;
        workflow.transition(PHASE_POOL_CONFIG, PhaseState::AwaitingApproval)?;

        let spec = OperationKind::UpgradeNodePools.spec();
        let impact = "new nodes launch at the target version; existing nodes follow when cycled";

        if options.parallel {
            // Parallel policy: every approval is still requested one at a
            // time, but the approved calls execute concurrently afterwards.
            let mut approved: Vec<Approved> = Vec::new();
            for pool in &plan.pool_upgrades {
                let preview = pool_config_preview(pool, &plan.target_version)?;
                print_preview(&preview);
                let request = ApprovalRequest::new(spec, &preview, &pool.name, impact);
                match gate.await_response(&request)? {
                    Some(token) => approved.push(Approved {
                        pool: pool.clone(),
                        token,
                        fingerprint: fingerprint(spec.name, &pool.name, &preview.changes),
                        operation: spec.name,
                    }),
                    None => {
                        warnings.push(format!("node pool upgrade of {} rejected", pool.name));
                        println!("{} skipped {}", "○".yellow(), pool.name);
                    }
                }
            }

            if !approved.is_empty() {
                workflow.transition(PHASE_POOL_CONFIG, PhaseState::Executing)?;
                let ceiling = exec_ceiling(true, approved.len());
                tracing::debug!(pools = approved.len(), ceiling, "upgrading node pool configs");

                let target = plan.target_version.clone();
                let results: Vec<Result<(NodePoolInfo, WorkRequestHandle), OkeupError>> =
                    futures::stream::iter(approved.into_iter().map(|entry| {
                        let target = target.clone();
                        async move {
                            entry.token.consume(entry.operation, &entry.fingerprint)?;
                            let handle = api.upgrade_node_pool(&entry.pool.id, &target).await?;
                            verify_succeeded(
                                api,
                                &handle,
                                &entry.pool.name,
                                &PollConfig::node_pool_config(),
                            )
                            .await?;
                            println!("{} upgraded {}", "✓".green(), entry.pool.name);
                            Ok((entry.pool, handle))
                        }
                    }))
                    .buffer_unordered(ceiling)
                    .collect()
                    .await;

                let mut first_error = None;
                for result in results {
                    match result {
                        Ok((pool, handle)) => {
                            workflow.record_work_request(PHASE_POOL_CONFIG, &handle.id);
                            upgraded_ids.push(pool.id);
                            pools_upgraded.push(pool.name);
                        }
                        Err(e) => first_error = first_error.or(Some(e)),
                    }
                }
                if let Some(e) = first_error {
                    workflow.transition(PHASE_POOL_CONFIG, PhaseState::Failed)?;
                    return Err(e);
                }
            }
        } else {
            // Sequential policy: each sibling runs to completion before the
            // next approval is requested, so every prompt carries the
            // outcome of the previous instance.
            let mut started = false;
            for pool in &plan.pool_upgrades {
                let preview = pool_config_preview(pool, &plan.target_version)?;
                print_preview(&preview);
                let request = ApprovalRequest::new(spec, &preview, &pool.name, impact);
                let Some(token) = gate.await_response(&request)? else {
                    warnings.push(format!("node pool upgrade of {} rejected", pool.name));
                    println!("{} skipped {}", "○".yellow(), pool.name);
                    continue;
                };
                if !started {
                    workflow.transition(PHASE_POOL_CONFIG, PhaseState::Executing)?;
                    started = true;
                }
                token.consume(spec.name, &fingerprint(spec.name, &pool.name, &preview.changes))?;

                let handle = match api.upgrade_node_pool(&pool.id, &plan.target_version).await {
                    Ok(handle) => handle,
                    Err(e) => {
                        workflow.transition(PHASE_POOL_CONFIG, PhaseState::Failed)?;
                        return Err(e);
                    }
                };
                workflow.record_work_request(PHASE_POOL_CONFIG, &handle.id);
                if let Err(e) =
                    verify_succeeded(api, &handle, &pool.name, &PollConfig::node_pool_config())
                        .await
                {
                    workflow.transition(PHASE_POOL_CONFIG, PhaseState::Failed)?;
                    return Err(e);
                }
                upgraded_ids.push(pool.id.clone());
                pools_upgraded.push(pool.name.clone());
                println!("{} upgraded {}", "✓".green(), pool.name);
            }
        }

        if upgraded_ids.is_empty() {
            workflow.transition(PHASE_POOL_CONFIG, PhaseState::Skipped)?;
        } else {
            // Confirm against fresh reads before calling the phase done.
            workflow.transition(PHASE_POOL_CONFIG, PhaseState::Verifying)?;
            for pool_id in &upgraded_ids {
                let pool = api.get_node_pool(pool_id).await?;
                if !same_version(&pool.kubernetes_version, &plan.target_version) {
                    workflow.transition(PHASE_POOL_CONFIG, PhaseState::Failed)?;
                    return Err(OkeupError::execution(
                        spec.name,
                        &pool.name,
                        format!("pool reports {} after upgrade", pool.kubernetes_version),
                    ));
                }
            }
            workflow.transition(PHASE_POOL_CONFIG, PhaseState::Complete)?;
        }
    }

    // Phase 4: node cycling. Only pools whose configuration moved are
    // cycled; their existing nodes still run the previous version.
    phase_header(PHASE_CYCLING);
    if upgraded_ids.is_empty() {
        println!("no node pools to cycle");
        workflow.transition(PHASE_CYCLING, PhaseState::Skipped)?;
    } else {
        workflow.begin(PHASE_CYCLING)?;
        workflow.transition(PHASE_CYCLING, PhaseState::AwaitingApproval)?;

        let spec = OperationKind::CycleNodes.spec();

        if options.parallel {
            let mut approved: Vec<Approved> = Vec::new();
            for pool_id in &upgraded_ids {
                let pool = api.get_node_pool(pool_id).await?;
                let preview = cycle_preview(&pool, &options.cycling)?;
                print_preview(&preview);
                let request = ApprovalRequest::new(
                    spec,
                    &preview,
                    &pool.name,
                    format!("{} nodes replaced one surge wave at a time", pool.node_count),
                );
                match gate.await_response(&request)? {
                    Some(token) => approved.push(Approved {
                        fingerprint: fingerprint(spec.name, &pool.name, &preview.changes),
                        pool,
                        token,
                        operation: spec.name,
                    }),
                    None => {
                        warnings.push(format!("node cycling of {} rejected", pool.name));
                        println!("{} skipped {}", "○".yellow(), pool.name);
                    }
                }
            }

            if !approved.is_empty() {
                workflow.transition(PHASE_CYCLING, PhaseState::Executing)?;
                let ceiling = exec_ceiling(true, approved.len());
                tracing::debug!(pools = approved.len(), ceiling, "cycling node pools");

                let cycling = options.cycling.clone();
                let results: Vec<Result<(String, WorkRequestHandle), OkeupError>> =
                    futures::stream::iter(approved.into_iter().map(|entry| {
                        let cycling = cycling.clone();
                        async move {
                            entry.token.consume(entry.operation, &entry.fingerprint)?;
                            let handle = api.cycle_node_pool(&entry.pool.id, &cycling).await?;
                            verify_succeeded(
                                api,
                                &handle,
                                &entry.pool.name,
                                &PollConfig::node_cycling(),
                            )
                            .await?;
                            println!("{} cycled {}", "✓".green(), entry.pool.name);
                            Ok((entry.pool.name.clone(), handle))
                        }
                    }))
                    .buffer_unordered(ceiling)
                    .collect()
                    .await;

                let mut first_error = None;
                for result in results {
                    match result {
                        Ok((pool_name, handle)) => {
                            workflow.record_work_request(PHASE_CYCLING, &handle.id);
                            pools_cycled.push(pool_name);
                        }
                        Err(e) => first_error = first_error.or(Some(e)),
                    }
                }
                if let Some(e) = first_error {
                    workflow.transition(PHASE_CYCLING, PhaseState::Failed)?;
                    return Err(e);
                }
            }
        } else {
            let mut started = false;
            for pool_id in &upgraded_ids {
                let pool = api.get_node_pool(pool_id).await?;
                let preview = cycle_preview(&pool, &options.cycling)?;
                print_preview(&preview);
                let request = ApprovalRequest::new(
                    spec,
                    &preview,
                    &pool.name,
                    format!("{} nodes replaced one surge wave at a time", pool.node_count),
                );
                let Some(token) = gate.await_response(&request)? else {
                    warnings.push(format!("node cycling of {} rejected", pool.name));
                    println!("{} skipped {}", "○".yellow(), pool.name);
                    continue;
                };
                if !started {
                    workflow.transition(PHASE_CYCLING, PhaseState::Executing)?;
                    started = true;
                }
                token.consume(spec.name, &fingerprint(spec.name, &pool.name, &preview.changes))?;

                let handle = match api.cycle_node_pool(&pool.id, &options.cycling).await {
                    Ok(handle) => handle,
                    Err(e) => {
                        workflow.transition(PHASE_CYCLING, PhaseState::Failed)?;
                        return Err(e);
                    }
                };
                workflow.record_work_request(PHASE_CYCLING, &handle.id);
                if let Err(e) =
                    verify_succeeded(api, &handle, &pool.name, &PollConfig::node_cycling()).await
                {
                    workflow.transition(PHASE_CYCLING, PhaseState::Failed)?;
                    return Err(e);
                }
                pools_cycled.push(pool.name.clone());
                println!("{} cycled {}", "✓".green(), pool.name);
            }
        }

        if pools_cycled.is_empty() {
            workflow.transition(PHASE_CYCLING, PhaseState::Skipped)?;
        } else {
            workflow.transition(PHASE_CYCLING, PhaseState::Verifying)?;
            workflow.transition(PHASE_CYCLING, PhaseState::Complete)?;
        }
    }

    let final_cluster = api.get_cluster(&plan.cluster.id).await?;
    let summary = summary_base(
        &workflow,
        final_cluster.kubernetes_version,
        pools_upgraded,
        pools_cycled,
        warnings,
    );
    Ok((workflow, summary))
}

fn print_dry_run(plan: &UpgradePlan, cycling: &CyclingOptions) -> Result<(), OkeupError> {
    if plan.control_plane_needed {
        print_preview(&control_plane_preview(plan)?);
    }
    for pool in &plan.pool_upgrades {
        print_preview(&pool_config_preview(pool, &plan.target_version)?);
        print_preview(&cycle_preview(pool, cycling)?);
    }
    Ok(())
}
