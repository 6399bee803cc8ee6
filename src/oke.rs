//! OKE operations module.

pub mod cli;
pub mod client;
pub mod cycle;
pub mod delete;
pub mod image;
pub mod poll;
pub mod report;
pub mod types;
pub mod upgrade;

#[cfg(test)]
pub(crate) mod mock;
