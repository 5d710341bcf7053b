//! Error types for the AMI cleanup domain.
//!
//! [`CloudError`] is what an [`crate::ImageService`] implementation returns when
//! an EC2 call fails. [`PolicyError`] covers invalid selection policies and
//! unreadable image metadata. [`CleanupError`] is the top-level error of a
//! cleanup run and records which step failed for which resource.

use thiserror::Error;

use crate::{ImageId, SnapshotId};

// ---------------------------------------------------------------------------
// Cloud errors
// ---------------------------------------------------------------------------

/// An EC2 API call failed.
///
/// Infrastructure crates flatten their SDK errors into this type so the domain
/// never depends on SDK error types. The original error is kept as `source`
/// for logging.
#[derive(Debug, Error)]
#[error("{operation} failed: {message}")]
pub struct CloudError {
    /// Name of the API operation (e.g. `"DescribeImages"`).
    pub operation: &'static str,
    /// Human-readable description, including the service error code when EC2
    /// supplied one.
    pub message: String,
    /// Underlying SDK error, if any.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl CloudError {
    /// Creates a [`CloudError`] without an underlying source.
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
            source: None,
        }
    }

    /// Attaches the underlying error.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

// ---------------------------------------------------------------------------
// Policy errors
// ---------------------------------------------------------------------------

/// A selection policy is invalid, or image metadata cannot be evaluated
/// against it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    /// An image's creation date could not be parsed.
    #[error("invalid creation date '{value}': {reason}")]
    InvalidCreationDate {
        /// The raw value EC2 reported.
        value: String,
        /// Parser error description.
        reason: String,
    },

    /// The image has no creation date at all.
    #[error("image has no creation date")]
    MissingCreationDate,

    /// The retention period reaches back past the earliest representable
    /// timestamp.
    #[error("retention of {days} days is out of range")]
    RetentionOutOfRange {
        /// The configured retention.
        days: u32,
    },

    /// Inversion was requested but there is no tag to invert.
    #[error("tag inversion requires a tag filter")]
    InvertWithoutTag,

    /// A tag filter was given with an empty key.
    #[error("tag filter key must not be empty")]
    EmptyTagKey,

    /// The branch shorthand was empty (or just `!`).
    #[error("branch name must not be empty")]
    EmptyBranch,
}

// ---------------------------------------------------------------------------
// Run-level errors
// ---------------------------------------------------------------------------

/// Errors that abort a cleanup run.
#[derive(Debug, Error)]
pub enum CleanupError {
    /// The list of owned images could not be fetched.
    #[error("unable to get list of available images")]
    Describe(#[source] CloudError),

    /// An image could not be deregistered. None of its snapshots were touched.
    #[error("unable to deregister AMI {image_id}")]
    Deregister {
        /// The image being deregistered.
        image_id: ImageId,
        /// Underlying cloud failure.
        #[source]
        source: CloudError,
    },

    /// A snapshot could not be deleted. The owning image is already
    /// deregistered; later snapshots of the same image were not attempted.
    #[error("unable to delete snapshot {snapshot_id} of AMI {image_id}")]
    DeleteSnapshot {
        /// The (already deregistered) image that referenced the snapshot.
        image_id: ImageId,
        /// The snapshot being deleted.
        snapshot_id: SnapshotId,
        /// Underlying cloud failure.
        #[source]
        source: CloudError,
    },

    /// The cleanup configuration is invalid. Produced before any API call.
    #[error("configuration error: {0}")]
    Configuration(#[from] PolicyError),
}
