//! End-of-run upgrade summary.

use colored::Colorize;

use crate::oke::upgrade::UpgradeSummary;
use crate::workflow::{PhaseState, Workflow};

fn phase_icon(state: PhaseState) -> colored::ColoredString {
    match state {
        PhaseState::Complete => "✓".green(),
        PhaseState::Skipped => "○".yellow(),
        PhaseState::Failed => "✗".red(),
        _ => "·".dimmed(),
    }
}

pub fn print_upgrade_summary(workflow: &Workflow, summary: &UpgradeSummary) {
    println!();
    println!("{}", "Upgrade Summary:".bold());
    println!("{}", "-".repeat(40));
    println!("  Cluster: {}", summary.cluster_name.bold());
    if summary.previous_version == summary.new_version {
        println!("  Version: {}", summary.new_version);
    } else {
        println!(
            "  Version: {} -> {}",
            summary.previous_version,
            summary.new_version.green()
        );
    }

    println!();
    for phase in workflow.phases() {
        println!("  {} {}: {}", phase_icon(phase.state), phase.name, phase.state);
    }

    if !summary.pools_upgraded.is_empty() {
        println!();
        println!("  Pools upgraded: {}", summary.pools_upgraded.join(", "));
    }
    if !summary.pools_cycled.is_empty() {
        println!("  Pools cycled: {}", summary.pools_cycled.join(", "));
    }

    if !summary.work_requests.is_empty() {
        println!();
        println!("  Work requests:");
        for id in &summary.work_requests {
            println!("    {}", id.dimmed());
        }
    }

    if !summary.warnings.is_empty() {
        println!();
        for warning in &summary.warnings {
            println!("  {} {}", "⚠".yellow(), warning);
        }
    }

    println!();
    if workflow.is_complete() {
        println!("  {} Upgrade complete", "✓".green());
    } else if workflow.is_halted() {
        println!("  {} Upgrade halted", "✗".red());
    } else {
        println!("  {} Upgrade partially applied", "⚠".yellow());
    }
}
