//! Destructive deletions. Both paths demand the typed confirmation phrase
//! rather than a yes/no answer.

use colored::Colorize;

use crate::approval::{fingerprint, ApprovalGate, ApprovalRequest, Prompter};
use crate::catalog::OperationKind;
use crate::error::OkeupError;
use crate::oke::client::OkeApi;
use crate::oke::poll::{verify_succeeded, PollConfig};
use crate::oke::types::WorkRequestHandle;
use crate::preview::{print_preview, PreviewResult};

pub async fn run_delete_cluster<A: OkeApi, P: Prompter>(
    api: &A,
    gate: &mut ApprovalGate<P>,
    cluster_id: &str,
    dry_run: bool,
) -> Result<Option<WorkRequestHandle>, OkeupError> {
    let spec = OperationKind::DeleteCluster.spec();
    let cluster = api.get_cluster(cluster_id).await?;

    let mut preview = PreviewResult::for_operation(spec)?;
    preview.push(
        cluster.name.clone(),
        format!("cluster at {}", cluster.kubernetes_version),
        "deleted",
    );
    print_preview(&preview);

    if dry_run {
        return Ok(None);
    }

    let request = ApprovalRequest::new(
        spec,
        &preview,
        &cluster.name,
        "workloads, node pools and the control plane are destroyed",
    );
    let Some(token) = gate.await_response(&request)? else {
        println!("{} kept {}", "○".yellow(), cluster.name);
        return Ok(None);
    };
    token.consume(spec.name, &fingerprint(spec.name, &cluster.name, &preview.changes))?;

    let handle = api.delete_cluster(&cluster.id).await?;
    println!(
        "{} deleting {} (work request {})",
        "→".cyan(),
        cluster.name,
        handle.id
    );
    verify_succeeded(api, &handle, &cluster.name, &PollConfig::control_plane()).await?;
    println!("{} deleted {}", "✓".green(), cluster.name);
    Ok(Some(handle))
}

/// Bucket deletion completes synchronously; there is no work request to poll.
pub async fn run_delete_bucket<A: OkeApi, P: Prompter>(
    api: &A,
    gate: &mut ApprovalGate<P>,
    namespace: &str,
    bucket_name: &str,
    dry_run: bool,
) -> Result<bool, OkeupError> {
    let spec = OperationKind::DeleteBucket.spec();

    let mut preview = PreviewResult::for_operation(spec)?;
    preview.push(
        format!("{}/{}", namespace, bucket_name),
        "bucket and all objects",
        "deleted",
    );
    print_preview(&preview);

    if dry_run {
        return Ok(false);
    }

    let request = ApprovalRequest::new(
        spec,
        &preview,
        bucket_name,
        "every object in the bucket is destroyed",
    );
    let Some(token) = gate.await_response(&request)? else {
        println!("{} kept {}", "○".yellow(), bucket_name);
        return Ok(false);
    };
    token.consume(spec.name, &fingerprint(spec.name, bucket_name, &preview.changes))?;

    api.delete_bucket(namespace, bucket_name).await?;
    println!("{} deleted {}/{}", "✓".green(), namespace, bucket_name);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::ScriptedPrompter;
    use crate::oke::mock::{self, MockApi};

    const CLUSTER: &str = "ocid1.cluster.oc1..a";

    fn setup() -> MockApi {
        let api = MockApi::new();
        api.add_cluster(mock::cluster(CLUSTER, "alpha", "v1.29.1", &[]));
        api
    }

    #[tokio::test]
    async fn test_yes_does_not_satisfy_the_delete_phrase() {
        let api = setup();
        let mut gate = ApprovalGate::new(ScriptedPrompter::new(&["yes"]));

        let handle = run_delete_cluster(&api, &mut gate, CLUSTER, false)
            .await
            .unwrap();

        assert!(handle.is_none());
        assert_eq!(api.call_count("delete_cluster:"), 0);
        assert!(api.get_cluster(CLUSTER).await.is_ok());
    }

    #[tokio::test]
    async fn test_exact_phrase_deletes_the_cluster() {
        let api = setup();
        let mut gate = ApprovalGate::new(ScriptedPrompter::new(&["delete alpha"]));

        let handle = run_delete_cluster(&api, &mut gate, CLUSTER, false)
            .await
            .unwrap();

        assert!(handle.is_some());
        assert_eq!(api.call_count("delete_cluster:"), 1);
        assert!(api.get_cluster(CLUSTER).await.is_err());
    }

    #[tokio::test]
    async fn test_dry_run_shows_preview_only() {
        let api = setup();
        let mut gate = ApprovalGate::new(ScriptedPrompter::new(&[]));

        let handle = run_delete_cluster(&api, &mut gate, CLUSTER, true)
            .await
            .unwrap();

        assert!(handle.is_none());
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_bucket_phrase_uses_the_bucket_name() {
        let api = MockApi::new();
        let mut gate = ApprovalGate::new(ScriptedPrompter::new(&["delete scratch"]));

        let deleted = run_delete_bucket(&api, &mut gate, "axfoo", "scratch", false)
            .await
            .unwrap();

        assert!(deleted);
        assert_eq!(api.calls(), vec!["delete_bucket:axfoo:scratch"]);
    }

    #[tokio::test]
    async fn test_bucket_rejection_is_not_an_error() {
        let api = MockApi::new();
        let mut gate = ApprovalGate::new(ScriptedPrompter::new(&["delete other"]));

        let deleted = run_delete_bucket(&api, &mut gate, "axfoo", "scratch", false)
            .await
            .unwrap();

        assert!(!deleted);
        assert!(api.calls().is_empty());
    }
}
