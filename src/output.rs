//! Output formatting module.

pub mod summary;
pub mod table;

pub use summary::print_upgrade_summary;
pub use table::{print_operation_catalog, print_version_report};
