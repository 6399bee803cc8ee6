//! Node pool image updates.

use colored::Colorize;

use crate::approval::{fingerprint, ApprovalGate, ApprovalRequest, Prompter};
use crate::catalog::OperationKind;
use crate::error::OkeupError;
use crate::oke::client::OkeApi;
use crate::oke::poll::{verify_succeeded, PollConfig};
use crate::oke::types::{LifecycleState, WorkRequestHandle};
use crate::preview::{print_preview, PreviewResult};

/// Point a node pool at a new node image. New nodes launch from the image;
/// existing nodes keep theirs until cycled.
pub async fn run_bump_image<A: OkeApi, P: Prompter>(
    api: &A,
    gate: &mut ApprovalGate<P>,
    node_pool_id: &str,
    image_id: &str,
    dry_run: bool,
) -> Result<Option<WorkRequestHandle>, OkeupError> {
    let spec = OperationKind::BumpImage.spec();
    let pool = api.get_node_pool(node_pool_id).await?;
    if pool.lifecycle_state != LifecycleState::Active {
        return Err(OkeupError::precondition(
            spec.name,
            format!("node pool {} is {}", pool.name, pool.lifecycle_state),
        ));
    }

    let current = pool.image_id.as_deref().unwrap_or("(unknown)");
    if current == image_id {
        println!(
            "{} {} already uses {}",
            "✓".green(),
            pool.name,
            image_id
        );
        return Ok(None);
    }

    let mut preview = PreviewResult::for_operation(spec)?;
    preview.push(format!("{} node image", pool.name), current, image_id);
    print_preview(&preview);

    if dry_run {
        return Ok(None);
    }

    let request = ApprovalRequest::new(
        spec,
        &preview,
        &pool.name,
        "existing nodes keep their image until the pool is cycled",
    );
    let Some(token) = gate.await_response(&request)? else {
        println!("{} skipped {}", "○".yellow(), pool.name);
        return Ok(None);
    };
    token.consume(spec.name, &fingerprint(spec.name, &pool.name, &preview.changes))?;

    let handle = api.update_node_pool_image(&pool.id, image_id).await?;
    println!(
        "{} updating image of {} (work request {})",
        "→".cyan(),
        pool.name,
        handle.id
    );
    verify_succeeded(api, &handle, &pool.name, &PollConfig::node_pool_config()).await?;
    println!("{} image updated on {}", "✓".green(), pool.name);
    Ok(Some(handle))
}
