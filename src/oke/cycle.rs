//! Worker node cycling: boot volume replacement across a node pool.

use colored::Colorize;

use crate::approval::{fingerprint, ApprovalGate, ApprovalRequest, Prompter};
use crate::catalog::OperationKind;
use crate::error::OkeupError;
use crate::oke::client::OkeApi;
use crate::oke::poll::{verify_succeeded, PollConfig};
use crate::oke::types::{CyclingOptions, LifecycleState, NodePoolInfo, WorkRequestHandle};
use crate::preview::{print_preview, PreviewResult};

/// Preview of a cycle over one node pool. Cycling replaces every node, so
/// the whole pool appears as the changed resource.
pub fn cycle_preview(
    pool: &NodePoolInfo,
    options: &CyclingOptions,
) -> Result<PreviewResult, OkeupError> {
    let spec = OperationKind::CycleNodes.spec();
    let mut preview = PreviewResult::for_operation(spec)?;
    preview.push(
        format!("{} ({} nodes)", pool.name, pool.node_count),
        "current boot volumes",
        format!("replaced via BOOT_VOLUME_REPLACE, {}", options),
    );
    Ok(preview)
}

/// Preview, gate, execute and verify a cycle for one node pool. Returns the
/// completed work request handle, or `None` when the operator rejects.
pub async fn approve_and_cycle<A: OkeApi, P: Prompter>(
    api: &A,
    gate: &mut ApprovalGate<P>,
    pool: &NodePoolInfo,
    options: &CyclingOptions,
    poll: &PollConfig,
) -> Result<Option<WorkRequestHandle>, OkeupError> {
    let spec = OperationKind::CycleNodes.spec();
    let preview = cycle_preview(pool, options)?;
    print_preview(&preview);

    let request = ApprovalRequest::new(
        spec,
        &preview,
        &pool.name,
        format!("{} nodes replaced one surge wave at a time", pool.node_count),
    );
    let Some(token) = gate.await_response(&request)? else {
        println!("{} skipped {}", "○".yellow(), pool.name);
        return Ok(None);
    };
    token.consume(spec.name, &fingerprint(spec.name, &pool.name, &preview.changes))?;

    let mut handle = api.cycle_node_pool(&pool.id, options).await?;
    println!(
        "{} cycling {} (work request {})",
        "→".cyan(),
        pool.name,
        handle.id
    );
    verify_succeeded(api, &handle, &pool.name, poll).await?;
    handle.status = crate::oke::types::WorkRequestStatus::Succeeded;
    println!("{} cycled {}", "✓".green(), pool.name);
    Ok(Some(handle))
}

/// Standalone `cycle` subcommand: fresh read, precondition check, preview,
/// then the gated execution.
pub async fn run_cycle<A: OkeApi, P: Prompter>(
    api: &A,
    gate: &mut ApprovalGate<P>,
    node_pool_id: &str,
    options: &CyclingOptions,
    dry_run: bool,
) -> Result<Option<WorkRequestHandle>, OkeupError> {
    let pool = api.get_node_pool(node_pool_id).await?;
    if pool.lifecycle_state != LifecycleState::Active {
        return Err(OkeupError::precondition(
            "cycle-nodes",
            format!("node pool {} is {}", pool.name, pool.lifecycle_state),
        ));
    }

    if dry_run {
        let preview = cycle_preview(&pool, options)?;
        print_preview(&preview);
        return Ok(None);
    }

    approve_and_cycle(api, gate, &pool, options, &PollConfig::node_cycling()).await
}
