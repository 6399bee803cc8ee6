//! Custom error types for okeup.

use thiserror::Error;

/// Errors that can occur during OKE lifecycle operations.
#[derive(Error, Debug)]
pub enum OkeupError {
    /// A phase precondition evaluated false against freshly read state.
    /// Recoverable by waiting and re-checking; surfaced, never auto-retried.
    #[error("Precondition not met for {operation}: {details}")]
    PreconditionNotMet { operation: String, details: String },

    /// The catalog entry declares no dry-run capability. Configuration error,
    /// fatal to that operation.
    #[error("Operation '{0}' does not support dry-run preview")]
    UnsupportedPreview(String),

    /// The platform refused a mutating request.
    #[error("[{operation}] execution rejected for {resource}: {cause}")]
    Execution {
        operation: String,
        resource: String,
        cause: String,
    },

    /// A single status poll failed for a transient reason. Retried with
    /// bounded exponential backoff by the poller; never surfaced raw.
    #[error("Transient poll failure: {0}")]
    TransientPoll(String),

    /// The poll bound was exceeded without observing a terminal status.
    /// The work request may or may not have completed.
    #[error(
        "Work request {work_request_id} did not reach a terminal state within {waited_secs}s; outcome unknown ({detail})"
    )]
    PollTimeoutAmbiguous {
        work_request_id: String,
        waited_secs: u64,
        detail: String,
    },

    #[error("Cluster not found: {0}")]
    ClusterNotFound(String),

    #[error("Node pool not found: {0}")]
    NodePoolNotFound(String),

    #[error("Invalid Kubernetes version: {0}")]
    InvalidVersion(String),

    #[error("Upgrade not possible: {0}")]
    UpgradeNotPossible(String),

    #[error("Configuration not found: {0}")]
    ConfigNotFound(String),

    #[error("Failed to read configuration: {0}")]
    ConfigRead(String),

    /// OCI CLI subprocess failure (spawn error, non-zero exit, unparseable output).
    #[error("[{command}] OCI CLI invocation failed: {detail}")]
    Cli { command: String, detail: String },

    #[error("Failed to read approval response: {0}")]
    Prompt(String),

    /// An approved action was presented for a different operation instance.
    #[error("Approval does not authorize this action: {0}")]
    ApprovalScopeMismatch(String),

    #[error("Phase ordering violation: {0}")]
    PhaseOrder(String),

    #[error("Operation cancelled by user")]
    UserCancelled,
}

impl OkeupError {
    /// Build a CLI invocation error, keeping only the leading command words
    /// so the message stays readable.
    pub fn cli(command: &[&str], detail: impl Into<String>) -> Self {
        let command = command
            .iter()
            .take(3)
            .copied()
            .collect::<Vec<_>>()
            .join(" ");
        OkeupError::Cli {
            command,
            detail: detail.into(),
        }
    }

    /// Build an execution rejection error for a mutating call.
    pub fn execution(
        operation: &str,
        resource: impl Into<String>,
        cause: impl Into<String>,
    ) -> Self {
        OkeupError::Execution {
            operation: operation.to_string(),
            resource: resource.into(),
            cause: cause.into(),
        }
    }

    /// Build a precondition failure for a named operation.
    pub fn precondition(operation: &str, details: impl Into<String>) -> Self {
        OkeupError::PreconditionNotMet {
            operation: operation.to_string(),
            details: details.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_cluster_not_found() {
        let err = OkeupError::ClusterNotFound("ocid1.cluster.oc1..aaa".to_string());
        assert_eq!(err.to_string(), "Cluster not found: ocid1.cluster.oc1..aaa");
    }

    #[test]
    fn test_error_display_unsupported_preview() {
        let err = OkeupError::UnsupportedPreview("version-report".to_string());
        assert_eq!(
            err.to_string(),
            "Operation 'version-report' does not support dry-run preview"
        );
    }

    #[test]
    fn test_error_display_poll_timeout_ambiguous() {
        let err = OkeupError::PollTimeoutAmbiguous {
            work_request_id: "wr-1".to_string(),
            waited_secs: 3600,
            detail: "last poll failure: connection reset".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("wr-1"));
        assert!(msg.contains("3600s"));
        assert!(msg.contains("outcome unknown"));
        assert!(msg.contains("connection reset"));
    }

    #[test]
    fn test_error_cli_helper_truncates_command() {
        let err = OkeupError::cli(
            &["ce", "cluster", "update", "--cluster-id", "ocid1"],
            "exit status 1",
        );
        assert!(err.to_string().contains("[ce cluster update]"));
        assert!(err.to_string().contains("exit status 1"));
    }

    #[test]
    fn test_error_execution_helper() {
        let err = OkeupError::execution(
            "upgrade-control-plane",
            "ocid1.cluster.oc1..aaa",
            "409 conflict",
        );
        let msg = err.to_string();
        assert!(msg.contains("[upgrade-control-plane]"));
        assert!(msg.contains("ocid1.cluster.oc1..aaa"));
        assert!(msg.contains("409 conflict"));
    }

    #[test]
    fn test_error_display_user_cancelled() {
        let err = OkeupError::UserCancelled;
        assert_eq!(err.to_string(), "Operation cancelled by user");
    }

    #[test]
    fn test_error_precondition_helper() {
        let err = OkeupError::precondition("upgrade-node-pools", "cluster not at target version");
        assert_eq!(
            err.to_string(),
            "Precondition not met for upgrade-node-pools: cluster not at target version"
        );
    }
}
