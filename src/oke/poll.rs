//! Work request status polling.
//!
//! Re-queries a work request until it reaches a terminal status. Transient
//! poll failures are retried with bounded exponential backoff; exceeding the
//! retry bound or the overall wait surfaces an ambiguous-timeout error. A
//! terminal FAILED status is never retried.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::OkeupError;
use crate::oke::client::OkeApi;
use crate::oke::types::{WorkRequestHandle, WorkRequestStatus};

const INITIAL_BACKOFF: Duration = Duration::from_secs(2);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Poll bounds. The overall wait is per-operation; the transient retry bound
/// and backoff shape are fixed.
#[derive(Debug, Clone)]
pub struct PollConfig {
    pub check_interval: Duration,
    pub max_wait: Duration,
    pub max_transient_retries: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(10),
            max_wait: Duration::from_secs(30 * 60),
            max_transient_retries: 5,
        }
    }
}

impl PollConfig {
    pub fn with_max_wait_minutes(minutes: u64) -> Self {
        Self {
            max_wait: Duration::from_secs(minutes * 60),
            ..Self::default()
        }
    }

    /// Control plane upgrades typically land within the hour.
    pub fn control_plane() -> Self {
        Self::with_max_wait_minutes(60)
    }

    /// Node pool config updates are quick; the version bump itself does not
    /// touch workers.
    pub fn node_pool_config() -> Self {
        Self::with_max_wait_minutes(30)
    }

    /// Cycling replaces every worker; budget for the slowest pool.
    pub fn node_cycling() -> Self {
        Self::with_max_wait_minutes(120)
    }
}

/// Wait until the work request reaches a terminal status and return it.
///
/// The returned status may be FAILED; mapping that to a phase failure is the
/// caller's decision. Timeout is its own error, distinct from failure: the
/// outcome is unknown and must not be assumed either way.
pub async fn wait_for_terminal<A: OkeApi>(
    api: &A,
    handle: &WorkRequestHandle,
    config: &PollConfig,
) -> Result<WorkRequestStatus, OkeupError> {
    let start = Instant::now();
    let mut consecutive_failures: u32 = 0;
    let mut backoff = INITIAL_BACKOFF;
    let mut last_cause: Option<String> = None;

    loop {
        if start.elapsed() > config.max_wait {
            return Err(OkeupError::PollTimeoutAmbiguous {
                work_request_id: handle.id.clone(),
                waited_secs: start.elapsed().as_secs(),
                detail: match last_cause {
                    Some(cause) => format!("last poll failure: {}", cause),
                    None => "no terminal status observed".to_string(),
                },
            });
        }

        match api.get_work_request(&handle.id).await {
            Ok(status) => {
                consecutive_failures = 0;
                backoff = INITIAL_BACKOFF;
                debug!("work request {} status: {}", handle.id, status);

                if status.is_terminal() {
                    return Ok(status);
                }
                tokio::time::sleep(config.check_interval).await;
            }
            Err(OkeupError::TransientPoll(cause)) => {
                consecutive_failures += 1;
                if consecutive_failures > config.max_transient_retries {
                    warn!(
                        "giving up on work request {} after {} consecutive poll failures",
                        handle.id, consecutive_failures
                    );
                    return Err(OkeupError::PollTimeoutAmbiguous {
                        work_request_id: handle.id.clone(),
                        waited_secs: start.elapsed().as_secs(),
                        detail: format!(
                            "{} consecutive transient poll failures, last: {}",
                            consecutive_failures, cause
                        ),
                    });
                }
                debug!(
                    "transient poll failure {}/{} for {}: {}",
                    consecutive_failures, config.max_transient_retries, handle.id, cause
                );
                last_cause = Some(cause);
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
            // Anything else is deterministic. Retrying cannot help and
            // masking it as a timeout would drop the real cause.
            Err(e) => return Err(e),
        }
    }
}

/// Wait for terminal status and require SUCCEEDED; FAILED or CANCELED become
/// execution errors carrying the originating operation and resource.
pub async fn verify_succeeded<A: OkeApi>(
    api: &A,
    handle: &WorkRequestHandle,
    resource: &str,
    config: &PollConfig,
) -> Result<(), OkeupError> {
    let status = wait_for_terminal(api, handle, config).await?;
    match status {
        WorkRequestStatus::Succeeded => Ok(()),
        other => Err(OkeupError::execution(
            handle.operation,
            resource,
            format!("work request {} ended {}", handle.id, other),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oke::mock::{MockApi, ScriptedPoll};

    fn handle(id: &str) -> WorkRequestHandle {
        WorkRequestHandle {
            id: id.to_string(),
            operation: "upgrade-control-plane",
            status: WorkRequestStatus::Accepted,
        }
    }

    fn fast_config() -> PollConfig {
        PollConfig {
            check_interval: Duration::from_millis(10),
            max_wait: Duration::from_secs(60),
            max_transient_retries: 3,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_reaches_succeeded() {
        let api = MockApi::new();
        api.script_work_request(
            "wr-1",
            vec![
                ScriptedPoll::Status(WorkRequestStatus::Accepted),
                ScriptedPoll::Status(WorkRequestStatus::InProgress),
                ScriptedPoll::Status(WorkRequestStatus::Succeeded),
            ],
        );

        let status = wait_for_terminal(&api, &handle("wr-1"), &fast_config())
            .await
            .unwrap();
        assert_eq!(status, WorkRequestStatus::Succeeded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_failed_is_returned_not_retried() {
        let api = MockApi::new();
        api.script_work_request(
            "wr-1",
            vec![ScriptedPoll::Status(WorkRequestStatus::Failed)],
        );

        let status = wait_for_terminal(&api, &handle("wr-1"), &fast_config())
            .await
            .unwrap();
        assert_eq!(status, WorkRequestStatus::Failed);
        // Exactly one poll: a terminal failure must not be re-queried.
        assert_eq!(api.poll_count("wr-1"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_retried_then_recovered() {
        let api = MockApi::new();
        api.script_work_request(
            "wr-1",
            vec![
                ScriptedPoll::TransientError,
                ScriptedPoll::TransientError,
                ScriptedPoll::Status(WorkRequestStatus::Succeeded),
            ],
        );

        let status = wait_for_terminal(&api, &handle("wr-1"), &fast_config())
            .await
            .unwrap();
        assert_eq!(status, WorkRequestStatus::Succeeded);
        assert_eq!(api.poll_count("wr-1"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_beyond_bound_surface_ambiguous_timeout() {
        let api = MockApi::new();
        api.script_work_request(
            "wr-1",
            vec![
                ScriptedPoll::TransientError,
                ScriptedPoll::TransientError,
                ScriptedPoll::TransientError,
                ScriptedPoll::TransientError,
                ScriptedPoll::TransientError,
            ],
        );

        let err = wait_for_terminal(&api, &handle("wr-1"), &fast_config())
            .await
            .unwrap_err();
        assert!(matches!(err, OkeupError::PollTimeoutAmbiguous { .. }));
        // Bound is 3 retries: initial failure plus retries, then give up.
        assert_eq!(api.poll_count("wr-1"), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overall_wait_bound_surfaces_ambiguous_timeout() {
        let api = MockApi::new();
        // Never terminal.
        api.script_work_request(
            "wr-1",
            vec![ScriptedPoll::Status(WorkRequestStatus::InProgress)],
        );

        let config = PollConfig {
            check_interval: Duration::from_secs(10),
            max_wait: Duration::from_secs(25),
            max_transient_retries: 3,
        };
        let err = wait_for_terminal(&api, &handle("wr-1"), &config)
            .await
            .unwrap_err();
        match err {
            OkeupError::PollTimeoutAmbiguous {
                work_request_id,
                waited_secs,
                ..
            } => {
                assert_eq!(work_request_id, "wr-1");
                assert!(waited_secs >= 25);
            }
            other => panic!("expected ambiguous timeout, got {}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ambiguous_timeout_reports_last_poll_failure() {
        let api = MockApi::new();
        api.script_work_request(
            "wr-1",
            vec![
                ScriptedPoll::TransientError,
                ScriptedPoll::TransientError,
                ScriptedPoll::TransientError,
                ScriptedPoll::TransientError,
            ],
        );

        let err = wait_for_terminal(&api, &handle("wr-1"), &fast_config())
            .await
            .unwrap_err();
        match err {
            OkeupError::PollTimeoutAmbiguous { detail, .. } => {
                assert!(detail.contains("mock transport glitch"), "{}", detail);
            }
            other => panic!("expected ambiguous timeout, got {}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_deterministic_poll_failure_surfaces_immediately() {
        let api = MockApi::new();
        api.script_work_request("wr-1", vec![ScriptedPoll::FatalError]);

        let err = wait_for_terminal(&api, &handle("wr-1"), &fast_config())
            .await
            .unwrap_err();
        assert!(matches!(err, OkeupError::Cli { .. }), "got {}", err);
        // No retry budget spent on an error that cannot heal.
        assert_eq!(api.poll_count("wr-1"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_verify_succeeded_maps_failed_to_execution_error() {
        let api = MockApi::new();
        api.script_work_request(
            "wr-1",
            vec![ScriptedPoll::Status(WorkRequestStatus::Failed)],
        );

        let err = verify_succeeded(&api, &handle("wr-1"), "prod-a", &fast_config())
            .await
            .unwrap_err();
        match err {
            OkeupError::Execution { operation, resource, cause } => {
                assert_eq!(operation, "upgrade-control-plane");
                assert_eq!(resource, "prod-a");
                assert!(cause.contains("FAILED"));
            }
            other => panic!("expected execution error, got {}", other),
        }
    }

    #[test]
    fn test_poll_config_presets() {
        assert_eq!(PollConfig::control_plane().max_wait, Duration::from_secs(3600));
        assert_eq!(
            PollConfig::node_cycling().max_wait,
            Duration::from_secs(7200)
        );
        assert_eq!(PollConfig::default().max_transient_retries, 5);
    }
}
