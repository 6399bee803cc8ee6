//! Dry-run preview engine.
//!
//! Previews are built exclusively from read-only queries, so they are
//! side-effect-free by construction: the execution path is never reached
//! while assembling a [`PreviewResult`].

use colored::Colorize;

use crate::catalog::OperationSpec;
use crate::error::OkeupError;

/// A single intended change: a resource moving from its current value to a
/// proposed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub resource: String,
    pub current: String,
    pub proposed: String,
}

/// Ordered list of changes an operation would apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewResult {
    pub operation: &'static str,
    pub changes: Vec<Change>,
}

impl PreviewResult {
    /// Start an empty preview for an operation. Fails when the catalog entry
    /// declares no dry-run capability.
    pub fn for_operation(spec: &'static OperationSpec) -> Result<Self, OkeupError> {
        if !spec.supports_dry_run {
            return Err(OkeupError::UnsupportedPreview(spec.name.to_string()));
        }
        Ok(Self {
            operation: spec.name,
            changes: Vec::new(),
        })
    }

    pub fn push(
        &mut self,
        resource: impl Into<String>,
        current: impl Into<String>,
        proposed: impl Into<String>,
    ) {
        self.changes.push(Change {
            resource: resource.into(),
            current: current.into(),
            proposed: proposed.into(),
        });
    }

    /// True when the operation would change nothing.
    pub fn is_noop(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Print a preview block to the console. Always shown to the requester
/// before any approval is requested.
pub fn print_preview(preview: &PreviewResult) {
    println!();
    println!(
        "{}",
        format!("[DRY RUN] {}", preview.operation).yellow().bold()
    );
    if preview.is_noop() {
        println!("  {} nothing to change", "→".cyan());
        return;
    }
    for change in &preview.changes {
        println!(
            "  {}: {} -> {}",
            change.resource,
            change.current.dimmed(),
            change.proposed.bold()
        );
    }
}
