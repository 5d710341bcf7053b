//! AMI cleanup orchestration.
//!
//! [`AmiCleaner`] drives a single pass over the account's images: fetch every
//! owned image, keep those matching the [`amiclean::CleanupPolicy`], then
//! deregister each one and delete its snapshots. The outcome is returned as a
//! [`CleanupReport`].
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** This crate sequences calls between the selection
//! rules in [`amiclean`] and the [`amiclean::ImageService`] port. It contains
//! no EC2 details of its own.

pub mod cleaner;
pub mod report;

#[cfg(test)]
mod testing;

pub use cleaner::AmiCleaner;
pub use report::{CleanupReport, PurgeOutcome, PurgeTargets};
