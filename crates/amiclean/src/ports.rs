//! Port traits implemented by infrastructure crates.
//!
//! The domain describes *what* it needs from the cloud; the `ec2` crate
//! supplies it. Tests substitute an in-memory implementation.

use async_trait::async_trait;

use crate::{CloudError, Image, ImageId, SnapshotId};

/// Access to the EC2 image, instance, and snapshot APIs.
///
/// Every call maps to exactly one EC2 request. Implementations must not retry
/// or paginate beyond what their SDK does by default.
#[async_trait]
pub trait ImageService: Send + Sync {
    /// Lists all images owned by the calling account.
    async fn describe_owned_images(&self) -> Result<Vec<Image>, CloudError>;

    /// Returns `true` if any instance in this account was launched from the
    /// image.
    ///
    /// Images shared with other accounts may be in use there; that cannot be
    /// observed from here.
    async fn image_in_use(&self, image_id: &ImageId) -> Result<bool, CloudError>;

    /// Deregisters the image. Its snapshots are left in place.
    async fn deregister_image(&self, image_id: &ImageId) -> Result<(), CloudError>;

    /// Deletes an EBS snapshot.
    async fn delete_snapshot(&self, snapshot_id: &SnapshotId) -> Result<(), CloudError>;
}

#[async_trait]
impl<T: ImageService + ?Sized> ImageService for std::sync::Arc<T> {
    async fn describe_owned_images(&self) -> Result<Vec<Image>, CloudError> {
        (**self).describe_owned_images().await
    }

    async fn image_in_use(&self, image_id: &ImageId) -> Result<bool, CloudError> {
        (**self).image_in_use(image_id).await
    }

    async fn deregister_image(&self, image_id: &ImageId) -> Result<(), CloudError> {
        (**self).deregister_image(image_id).await
    }

    async fn delete_snapshot(&self, snapshot_id: &SnapshotId) -> Result<(), CloudError> {
        (**self).delete_snapshot(snapshot_id).await
    }
}
