//! Core domain for the AMI cleaner.
//!
//! This crate contains the identifiers, value types, selection policy, and
//! error types used throughout the workspace, plus the [`ImageService`] port
//! through which the rest of the workspace reaches EC2.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; the `ec2` crate defines *how* to supply it and
//! the `cleaner` crate sequences the calls.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`ImageId`, `SnapshotId`, `CleanupRunId`) |
//! | [`types`] | Value types (`Image`, `Tag`, `RetentionDays`, `Timestamp`, etc.) |
//! | [`policy`] | Selection criteria and tag matching |
//! | [`ports`] | The [`ImageService`] trait |
//! | [`errors`] | Cloud, policy, and run-level error types |

pub mod errors;
pub mod identifiers;
pub mod policy;
pub mod ports;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use errors::{CleanupError, CloudError, PolicyError};
pub use identifiers::{CleanupRunId, ImageId, SnapshotId};
pub use policy::{
    expiration_from_retention, image_creation_time, match_tags, parse_creation_date,
    CleanupPolicy, TagFilter, TagMatch, BRANCH_TAG_KEY, TAG_NOT_FOUND,
};
pub use ports::ImageService;
pub use types::{BlockDeviceMapping, Image, RetentionDays, RootDeviceType, Tag, Timestamp};
