//! Results of a cleanup run.

use serde::Serialize;

use amiclean::{CleanupRunId, Image, ImageId, SnapshotId, Timestamp};

/// What happened to one selected image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PurgeOutcome {
    /// The image was deregistered and its snapshots deleted, or would have
    /// been when `dry_run` is set.
    Purged {
        /// The purged image.
        image_id: ImageId,
        /// Snapshots deleted along with it, in deletion order.
        snapshot_ids: Vec<SnapshotId>,
        /// `true` if no mutating call was made.
        dry_run: bool,
    },
    /// The image was selected but left alone.
    Skipped {
        /// The skipped image.
        image_id: ImageId,
        /// Why it was left alone.
        reason: String,
    },
}

impl PurgeOutcome {
    /// The image this outcome refers to.
    pub fn image_id(&self) -> &ImageId {
        match self {
            Self::Purged { image_id, .. } | Self::Skipped { image_id, .. } => image_id,
        }
    }
}

/// The AMI and snapshot ids a set of images would purge.
///
/// Only EBS-backed images contribute; instance-store images are never purged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PurgeTargets {
    /// Images to deregister.
    pub image_ids: Vec<ImageId>,
    /// Snapshots to delete, grouped by image in input order.
    pub snapshot_ids: Vec<SnapshotId>,
}

impl PurgeTargets {
    /// Collects the purge targets of `images`.
    pub fn from_images<'a>(images: impl IntoIterator<Item = &'a Image>) -> Self {
        let mut targets = Self::default();
        for image in images.into_iter().filter(|image| image.is_ebs_backed()) {
            targets.image_ids.push(image.id.clone());
            targets.snapshot_ids.extend(image.snapshot_ids());
        }
        targets
    }

    /// Returns `true` if there is nothing to purge.
    pub fn is_empty(&self) -> bool {
        self.image_ids.is_empty() && self.snapshot_ids.is_empty()
    }
}

/// Summary of a completed cleanup run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// Identifier of this run.
    pub run_id: CleanupRunId,
    /// `true` if no mutating call was made.
    pub dry_run: bool,
    /// Images created after this instant were kept regardless of other criteria.
    pub expiration: Timestamp,
    /// Number of owned images examined.
    pub examined: usize,
    /// Ids planned for purging, computed before any mutating call.
    pub targets: PurgeTargets,
    /// Per-image outcome, in processing order.
    pub outcomes: Vec<PurgeOutcome>,
}

impl CleanupReport {
    /// Number of images that matched the policy.
    pub fn selected(&self) -> usize {
        self.outcomes.len()
    }

    /// Number of images deregistered (or that would have been).
    pub fn purged_images(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, PurgeOutcome::Purged { .. }))
            .count()
    }

    /// Number of snapshots deleted (or that would have been).
    pub fn purged_snapshots(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| match o {
                PurgeOutcome::Purged { snapshot_ids, .. } => snapshot_ids.len(),
                PurgeOutcome::Skipped { .. } => 0,
            })
            .sum()
    }

    /// Number of selected images left alone.
    pub fn skipped(&self) -> usize {
        self.selected() - self.purged_images()
    }
}

impl std::fmt::Display for CleanupReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let verb = if self.dry_run { "would purge" } else { "purged" };
        writeln!(
            f,
            "run {}: examined {} images (expiration {}), {} selected",
            self.run_id,
            self.examined,
            self.expiration,
            self.selected()
        )?;
        for outcome in &self.outcomes {
            match outcome {
                PurgeOutcome::Purged { image_id, snapshot_ids, .. } => {
                    let snapshots: Vec<&str> = snapshot_ids.iter().map(SnapshotId::as_str).collect();
                    writeln!(f, "  {verb} {image_id} [{}]", snapshots.join(", "))?;
                }
                PurgeOutcome::Skipped { image_id, reason } => {
                    writeln!(f, "  skipped {image_id}: {reason}")?;
                }
            }
        }
        write!(
            f,
            "{verb} {} images and {} snapshots; skipped {}",
            self.purged_images(),
            self.purged_snapshots(),
            self.skipped()
        )
    }
}
