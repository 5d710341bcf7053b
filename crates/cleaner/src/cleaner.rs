//! The select-and-purge pipeline.

use tracing::{debug, error, info, info_span, warn, Instrument};

use amiclean::{
    image_creation_time, CleanupError, CleanupPolicy, CleanupRunId, CloudError, Image,
    ImageService,
};

use crate::report::{CleanupReport, PurgeOutcome, PurgeTargets};

/// Selects images against a [`CleanupPolicy`] and purges them through an
/// [`ImageService`].
///
/// Unless `delete` is set the cleaner runs dry: it logs what it would do and
/// makes no mutating call.
pub struct AmiCleaner<S> {
    policy: CleanupPolicy,
    delete: bool,
    service: S,
}

impl<S: ImageService> AmiCleaner<S> {
    /// Creates a cleaner, validating the policy first.
    pub fn new(policy: CleanupPolicy, delete: bool, service: S) -> Result<Self, CleanupError> {
        policy.validate()?;
        Ok(Self {
            policy,
            delete,
            service,
        })
    }

    /// The policy images are checked against.
    pub fn policy(&self) -> &CleanupPolicy {
        &self.policy
    }

    /// `true` when no mutating call will be made.
    pub fn is_dry_run(&self) -> bool {
        !self.delete
    }

    /// Fetches every image owned by this account.
    ///
    /// EC2 cannot filter on creation date or on the *absence* of a tag value,
    /// so all owned images are fetched and filtered locally.
    pub async fn get_images(&self) -> Result<Vec<Image>, CleanupError> {
        self.service
            .describe_owned_images()
            .await
            .map_err(CleanupError::Describe)
    }

    /// Returns `true` if no instance in this account runs `image`.
    pub async fn check_unused(&self, image: &Image) -> Result<bool, CloudError> {
        let in_use = self.service.image_in_use(&image.id).await?;
        Ok(!in_use)
    }

    /// Returns `true` if `image` meets every purge criterion.
    ///
    /// Anything that prevents a criterion from being evaluated (unreadable
    /// creation date, failed usage lookup) keeps the image.
    pub async fn check_image(&self, image: &Image) -> bool {
        if !self.policy.matches_name(image) {
            return false;
        }

        let created = match image_creation_time(image) {
            Ok(created) => created,
            Err(e) => {
                warn!(ami_id = %image.id, error = %e, "cannot determine image age; keeping it");
                return false;
            }
        };
        if !self.policy.is_expired(created) {
            return false;
        }

        if self.policy.unused_only {
            match self.check_unused(image).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(ami_id = %image.id, "image in use by an instance; keeping it");
                    return false;
                }
                Err(e) => {
                    error!(ami_id = %image.id, error = %e, "could not check for image in use");
                    return false;
                }
            }
        }

        let (selected, lookup) = self.policy.tag_decision(image);
        if selected {
            let (tag_key, tag_value) = lookup
                .map(|m| (m.tag.key, m.tag.value))
                .unwrap_or_default();
            debug!(
                ami_id = %image.id,
                ami_name = image.name_or_empty(),
                ami_tag_key = %tag_key,
                ami_tag_value = %tag_value,
                ami_creation_date = %created,
                "ami matched selection criteria"
            );
        }
        selected
    }

    /// Images in `images` that meet every purge criterion, in input order.
    pub async fn find_images_to_purge(&self, images: &[Image]) -> Vec<Image> {
        let mut selected = Vec::new();
        for image in images {
            if self.check_image(image).await {
                selected.push(image.clone());
            }
        }
        selected
    }

    /// Deregisters `image` and deletes its snapshots.
    ///
    /// The image is deregistered first; a snapshot still referenced by a
    /// registered image cannot be deleted. Processing stops at the first
    /// failure. Images not backed by EBS are left alone.
    pub async fn purge_image(&self, image: &Image) -> Result<PurgeOutcome, CleanupError> {
        if !image.is_ebs_backed() {
            info!(
                ami_id = %image.id,
                root_device_type = %image.root_device_type,
                "image root device not EBS; will not purge"
            );
            return Ok(PurgeOutcome::Skipped {
                image_id: image.id.clone(),
                reason: format!("root device is {}", image.root_device_type),
            });
        }

        let snapshot_ids = image.snapshot_ids();

        if self.delete {
            info!(ami_id = %image.id, "deregistering ami");
            self.service
                .deregister_image(&image.id)
                .await
                .map_err(|source| CleanupError::Deregister {
                    image_id: image.id.clone(),
                    source,
                })?;
        } else {
            info!(ami_id = %image.id, "would deregister ami");
        }

        for snapshot_id in &snapshot_ids {
            if self.delete {
                info!(ami_id = %image.id, snapshot_id = %snapshot_id, "deleting snapshot");
                self.service
                    .delete_snapshot(snapshot_id)
                    .await
                    .map_err(|source| CleanupError::DeleteSnapshot {
                        image_id: image.id.clone(),
                        snapshot_id: snapshot_id.clone(),
                        source,
                    })?;
            } else {
                info!(ami_id = %image.id, snapshot_id = %snapshot_id, "would delete snapshot");
            }
        }

        Ok(PurgeOutcome::Purged {
            image_id: image.id.clone(),
            snapshot_ids,
            dry_run: !self.delete,
        })
    }

    /// Runs the whole pipeline: fetch, select, purge.
    ///
    /// The first purge failure aborts the run; images after it are not
    /// touched.
    pub async fn run(&self, run_id: CleanupRunId) -> Result<CleanupReport, CleanupError> {
        let span = info_span!("ami_cleanup", run_id = %run_id, dry_run = !self.delete);
        async move {
            let images = self.get_images().await?;
            info!(count = images.len(), expiration = %self.policy.expiration, "fetched owned images");

            let selected = self.find_images_to_purge(&images).await;
            let targets = PurgeTargets::from_images(&selected);
            info!(
                selected = selected.len(),
                amis = targets.image_ids.len(),
                snapshots = targets.snapshot_ids.len(),
                "purge plan ready"
            );

            let mut outcomes = Vec::with_capacity(selected.len());
            for image in &selected {
                outcomes.push(self.purge_image(image).await?);
            }

            Ok(CleanupReport {
                run_id,
                dry_run: !self.delete,
                expiration: self.policy.expiration,
                examined: images.len(),
                targets,
                outcomes,
            })
        }
        .instrument(span)
        .await
    }
}
