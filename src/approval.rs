//! Approval gate for mutating and destructive operations.
//!
//! One approval authorizes exactly one operation instance. The gate blocks
//! until a response arrives and applies a strict acceptance grammar:
//! case-insensitive yes/no for standard mutating operations, an exact
//! `delete <resource>` phrase for destructive ones. Anything ambiguous is
//! treated as rejection, never guessed.

use chrono::{DateTime, Utc};
use colored::Colorize;
use dialoguer::Input;

use crate::catalog::{OperationSpec, RiskClass};
use crate::error::OkeupError;
use crate::preview::PreviewResult;

/// A pending request for human approval of one operation instance.
///
/// Constructing a request requires the preview that was shown to the
/// requester, so a mutating call can never be put up for approval without a
/// preceding dry run.
#[derive(Debug)]
pub struct ApprovalRequest {
    pub operation: &'static str,
    pub resource: String,
    pub scope_description: String,
    pub risk: RiskClass,
    pub created_at: DateTime<Utc>,
    fingerprint: String,
}

impl ApprovalRequest {
    pub fn new(
        spec: &'static OperationSpec,
        preview: &PreviewResult,
        resource: impl Into<String>,
        impact: impl Into<String>,
    ) -> Self {
        let resource = resource.into();
        let mut scope = format!("{} on {}", spec.name, resource);
        for change in &preview.changes {
            scope.push_str(&format!(
                "\n  {}: {} -> {}",
                change.resource, change.current, change.proposed
            ));
        }
        let impact = impact.into();
        if !impact.is_empty() {
            scope.push_str(&format!("\n  impact: {}", impact));
        }

        let fingerprint = fingerprint(spec.name, &resource, &preview.changes);
        Self {
            operation: spec.name,
            resource,
            scope_description: scope,
            risk: spec.risk,
            created_at: Utc::now(),
            fingerprint,
        }
    }

    /// The literal phrase a destructive operation demands.
    pub fn confirmation_phrase(&self) -> String {
        format!("delete {}", self.resource)
    }
}

/// Identity of one operation instance: operation name, target resource and
/// the exact changes that were previewed and approved.
pub fn fingerprint(operation: &str, resource: &str, changes: &[crate::preview::Change]) -> String {
    let mut parts = vec![operation.to_string(), resource.to_string()];
    for change in changes {
        parts.push(format!(
            "{}={}->{}",
            change.resource, change.current, change.proposed
        ));
    }
    parts.join("|")
}

/// Single-use authorization token. Only the gate constructs one, and only
/// for an approved request; consuming it checks that the action matches the
/// approved instance exactly.
#[derive(Debug)]
#[must_use = "an approval that is never consumed authorized nothing"]
pub struct ApprovedAction {
    operation: &'static str,
    fingerprint: String,
}

impl ApprovedAction {
    /// Consume the token for the given action. Errors when the action is not
    /// the one that was approved.
    pub fn consume(self, operation: &str, fingerprint: &str) -> Result<(), OkeupError> {
        if self.operation == operation && self.fingerprint == fingerprint {
            Ok(())
        } else {
            Err(OkeupError::ApprovalScopeMismatch(format!(
                "approved '{}', attempted '{}'",
                self.operation, operation
            )))
        }
    }
}

/// Outcome of one approval request. Rejection is expected control flow, not
/// an error.
#[derive(Debug, PartialEq, Eq)]
pub enum ApprovalResponse {
    Approved,
    Rejected,
}

/// Seam for reading approval responses. Production uses the terminal;
/// tests script responses.
pub trait Prompter {
    fn read_line(&mut self, prompt: &str) -> Result<String, OkeupError>;
}

/// Interactive prompter backed by dialoguer.
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn read_line(&mut self, prompt: &str) -> Result<String, OkeupError> {
        Input::new()
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()
            .map_err(|e| match e {
                dialoguer::Error::IO(io)
                    if io.kind() == std::io::ErrorKind::Interrupted =>
                {
                    OkeupError::UserCancelled
                }
                other => OkeupError::Prompt(other.to_string()),
            })
    }
}

/// Apply the acceptance grammar for a risk class.
///
/// Destructive operations only accept the exact confirmation phrase; in
/// particular `y` and `yes` are rejections there.
pub fn accepts(risk: RiskClass, input: &str, confirmation_phrase: &str) -> bool {
    match risk {
        RiskClass::ReadOnly => true,
        RiskClass::Mutating => {
            matches!(input.trim().to_lowercase().as_str(), "yes" | "y")
        }
        RiskClass::Destructive => input.trim() == confirmation_phrase,
    }
}

/// The approval gate. Holds the prompter and suspends the workflow while a
/// response is pending; no timeout.
pub struct ApprovalGate<P: Prompter> {
    prompter: P,
}

impl<P: Prompter> ApprovalGate<P> {
    pub fn new(prompter: P) -> Self {
        Self { prompter }
    }

    /// Present the request and block until a response arrives. Returns the
    /// single-use token on approval, `None` on rejection.
    pub fn await_response(
        &mut self,
        request: &ApprovalRequest,
    ) -> Result<Option<ApprovedAction>, OkeupError> {
        println!();
        println!("{}", "Approval required".yellow().bold());
        println!("{}", request.scope_description);

        let question = match request.risk {
            RiskClass::Destructive => {
                println!(
                    "{}",
                    "This action is irreversible.".red().bold()
                );
                format!(
                    "Type '{}' to confirm (anything else cancels)",
                    request.confirmation_phrase()
                )
            }
            _ => format!(
                "Proceed with {} on {}? [yes/no]",
                request.operation, request.resource
            ),
        };

        let raw = self.prompter.read_line(&question)?;
        if accepts(request.risk, &raw, &request.confirmation_phrase()) {
            tracing::info!(
                operation = request.operation,
                resource = %request.resource,
                "approval granted"
            );
            Ok(Some(ApprovedAction {
                operation: request.operation,
                fingerprint: request.fingerprint.clone(),
            }))
        } else {
            tracing::info!(
                operation = request.operation,
                resource = %request.resource,
                "approval rejected"
            );
            println!("{}", format!("Skipped: {}", request.resource).dimmed());
            Ok(None)
        }
    }
}

/// Scripted prompter for tests: pops canned responses in order and records
/// every prompt it was shown.
#[cfg(test)]
pub(crate) struct ScriptedPrompter {
    responses: std::collections::VecDeque<String>,
    pub prompts: Vec<String>,
}

#[cfg(test)]
impl ScriptedPrompter {
    pub fn new(responses: &[&str]) -> Self {
        Self {
            responses: responses.iter().map(|s| s.to_string()).collect(),
            prompts: Vec::new(),
        }
    }
}

#[cfg(test)]
impl Prompter for ScriptedPrompter {
    fn read_line(&mut self, prompt: &str) -> Result<String, OkeupError> {
        self.prompts.push(prompt.to_string());
        self.responses
            .pop_front()
            .ok_or_else(|| OkeupError::Prompt("no scripted response left".to_string()))
    }
}
