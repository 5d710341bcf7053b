//! Shared value types for the AMI cleanup domain.
//!
//! [`Image`] is deliberately a narrow projection of the EC2 image description:
//! only the fields the selection policy and the purge step read. The `ec2`
//! crate is responsible for converting SDK types into these.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{ImageId, SnapshotId};

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

/// A key/value tag attached to an EC2 resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    /// Tag key (e.g. `"Branch"`).
    pub key: String,
    /// Tag value (e.g. `"master"`).
    pub value: String,
}

impl Tag {
    /// Creates a new [`Tag`].
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

/// The kind of root device an image boots from.
///
/// Only EBS-backed images are ever purged: their storage is a set of
/// snapshots this tool knows how to delete. Instance-store images keep their
/// bundle in S3, which is out of scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RootDeviceType {
    /// `"ebs"`.
    Ebs,
    /// `"instance-store"`.
    InstanceStore,
    /// Any value EC2 reports that this tool does not recognise.
    Other(String),
}

impl RootDeviceType {
    /// Parses the string form reported by EC2.
    pub fn parse(value: &str) -> Self {
        match value {
            "ebs" => Self::Ebs,
            "instance-store" => Self::InstanceStore,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns the EC2 string form.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Ebs => "ebs",
            Self::InstanceStore => "instance-store",
            Self::Other(value) => value,
        }
    }
}

impl std::fmt::Display for RootDeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One block device mapping of an image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDeviceMapping {
    /// Device name (e.g. `"/dev/xvda"`).
    pub device_name: Option<String>,
    /// Snapshot backing this device. `None` for ephemeral (instance-store)
    /// mappings and EBS mappings created without a snapshot.
    pub snapshot_id: Option<SnapshotId>,
}

/// An image owned by the calling account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    /// AMI identifier.
    pub id: ImageId,
    /// Image name. EC2 allows images without one.
    pub name: Option<String>,
    /// Creation timestamp exactly as EC2 reported it (e.g.
    /// `"2019-03-01T12:00:00.000Z"`). Parsed by
    /// [`crate::policy::parse_creation_date`].
    pub creation_date: Option<String>,
    /// Root device kind.
    pub root_device_type: RootDeviceType,
    /// Block device mappings in the order EC2 returned them.
    pub block_device_mappings: Vec<BlockDeviceMapping>,
    /// Tags attached to the image.
    pub tags: Vec<Tag>,
}

impl Image {
    /// Returns the image name, or the empty string for unnamed images.
    pub fn name_or_empty(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }

    /// Returns `true` if this image boots from an EBS volume.
    pub fn is_ebs_backed(&self) -> bool {
        self.root_device_type == RootDeviceType::Ebs
    }

    /// Every snapshot referenced by this image's block device mappings, in
    /// mapping order. Mappings without a snapshot are skipped.
    pub fn snapshot_ids(&self) -> Vec<SnapshotId> {
        self.block_device_mappings
            .iter()
            .filter_map(|mapping| mapping.snapshot_id.clone())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Retention
// ---------------------------------------------------------------------------

/// Minimum age, in days, before an image becomes a purge candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RetentionDays(u32);

impl RetentionDays {
    /// Default retention used when none is configured.
    pub const DEFAULT: Self = Self(30);

    /// Creates a [`RetentionDays`] from a raw day count.
    pub fn new(days: u32) -> Self {
        Self(days)
    }

    /// Returns the number of days.
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl Default for RetentionDays {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl std::fmt::Display for RetentionDays {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} days", self.0)
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }

    /// Returns this timestamp moved `days` whole days into the past, or
    /// `None` if that falls outside the representable range.
    pub fn minus_days(self, days: RetentionDays) -> Option<Self> {
        self.0
            .checked_sub_signed(Duration::days(i64::from(days.as_u32())))
            .map(Self)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}
