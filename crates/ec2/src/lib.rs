//! EC2 infrastructure adapter.
//!
//! Implements [`amiclean::ImageService`] on top of `aws-sdk-ec2`.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** SDK client construction, request building, response
//! conversion, and SDK error flattening all live here. The [`amiclean`] and
//! `cleaner` crates see only [`amiclean::ImageService`].
//!
//! Each trait method issues exactly one EC2 request. Retries, timeouts, and
//! credential refresh are whatever the SDK does by default; no pagination is
//! performed.

mod convert;

use async_trait::async_trait;
use aws_config::{meta::region::RegionProviderChain, BehaviorVersion, Region, SdkConfig};
use aws_sdk_ec2::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_ec2::types::Filter;
use aws_sdk_ec2::Client;
use tracing::{debug, warn};

use amiclean::{CloudError, Image, ImageId, ImageService, SnapshotId};

pub use convert::image_from_sdk;

/// Owner alias that restricts `DescribeImages` to the caller's own images.
const OWNER_SELF: &str = "self";

/// `DescribeInstances` filter matching instances launched from an image.
const IMAGE_ID_FILTER: &str = "image-id";

/// Loads the shared AWS configuration.
///
/// `region` and `profile` override the standard provider chain (environment,
/// shared config files, SSO, instance metadata) when given.
pub async fn load_sdk_config(region: Option<String>, profile: Option<String>) -> SdkConfig {
    let region_provider =
        RegionProviderChain::first_try(region.map(Region::new)).or_default_provider();
    let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(region_provider);
    if let Some(profile) = profile {
        loader = loader.profile_name(profile);
    }
    loader.load().await
}

/// [`ImageService`] backed by the EC2 API.
#[derive(Debug, Clone)]
pub struct Ec2ImageService {
    client: Client,
}

impl Ec2ImageService {
    /// Wraps an existing EC2 client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a client from a loaded [`SdkConfig`].
    pub fn from_conf(config: &SdkConfig) -> Self {
        Self::new(Client::new(config))
    }

    /// Region the client talks to, if one was resolved.
    pub fn region(&self) -> Option<&Region> {
        self.client.config().region()
    }
}

/// Flattens an SDK error into a [`CloudError`], keeping the EC2 error code.
fn cloud_error<E>(operation: &'static str, err: E) -> CloudError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let message = match (err.code(), err.message()) {
        (Some(code), Some(message)) => format!("{code}: {message}"),
        (Some(code), None) => code.to_string(),
        _ => DisplayErrorContext(&err).to_string(),
    };
    CloudError::new(operation, message).with_source(err)
}

#[async_trait]
impl ImageService for Ec2ImageService {
    async fn describe_owned_images(&self) -> Result<Vec<Image>, CloudError> {
        let output = self
            .client
            .describe_images()
            .owners(OWNER_SELF)
            .send()
            .await
            .map_err(|e| cloud_error("DescribeImages", e))?;

        let images: Vec<Image> = output
            .images()
            .iter()
            .filter_map(|raw| {
                let image = image_from_sdk(raw);
                if image.is_none() {
                    warn!(ami_name = raw.name().unwrap_or_default(), "skipping image without an id");
                }
                image
            })
            .collect();
        debug!(count = images.len(), "described owned images");
        Ok(images)
    }

    async fn image_in_use(&self, image_id: &ImageId) -> Result<bool, CloudError> {
        let filter = Filter::builder()
            .name(IMAGE_ID_FILTER)
            .values(image_id.as_str())
            .build();
        let output = self
            .client
            .describe_instances()
            .filters(filter)
            .send()
            .await
            .map_err(|e| cloud_error("DescribeInstances", e))?;

        let reservations = output.reservations().len();
        debug!(ami_id = %image_id, reservations, "looked up instances using image");
        Ok(reservations > 0)
    }

    async fn deregister_image(&self, image_id: &ImageId) -> Result<(), CloudError> {
        self.client
            .deregister_image()
            .image_id(image_id.as_str())
            .send()
            .await
            .map_err(|e| cloud_error("DeregisterImage", e))?;
        Ok(())
    }

    async fn delete_snapshot(&self, snapshot_id: &SnapshotId) -> Result<(), CloudError> {
        self.client
            .delete_snapshot()
            .snapshot_id(snapshot_id.as_str())
            .send()
            .await
            .map_err(|e| cloud_error("DeleteSnapshot", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_ec2::error::ErrorMetadata;
    use aws_sdk_ec2::operation::describe_images::DescribeImagesOutput;
    use aws_sdk_ec2::operation::describe_instances::{
        DescribeInstancesError, DescribeInstancesOutput,
    };
    use aws_sdk_ec2::types::{self, DeviceType, Reservation};
    use aws_smithy_mocks::{mock, mock_client};
    use std::error::Error as _;

    fn ami(id: &str) -> ImageId {
        ImageId::new(id).unwrap()
    }

    #[tokio::test]
    async fn image_with_reservations_is_in_use() {
        let rule = mock!(aws_sdk_ec2::Client::describe_instances)
            .match_requests(|req| {
                req.filters().iter().any(|f| {
                    f.name() == Some(IMAGE_ID_FILTER) && f.values() == ["ami-1"]
                })
            })
            .then_output(|| {
                DescribeInstancesOutput::builder()
                    .reservations(Reservation::builder().reservation_id("r-1").build())
                    .build()
            });
        let service = Ec2ImageService::new(mock_client!(aws_sdk_ec2, [&rule]));

        assert!(service.image_in_use(&ami("ami-1")).await.unwrap());
        assert_eq!(rule.num_calls(), 1);
    }

    #[tokio::test]
    async fn image_without_reservations_is_unused() {
        let rule = mock!(aws_sdk_ec2::Client::describe_instances)
            .then_output(|| DescribeInstancesOutput::builder().build());
        let service = Ec2ImageService::new(mock_client!(aws_sdk_ec2, [&rule]));

        assert!(!service.image_in_use(&ami("ami-1")).await.unwrap());
    }

    #[tokio::test]
    async fn service_errors_keep_code_and_message() {
        let rule = mock!(aws_sdk_ec2::Client::describe_instances).then_error(|| {
            DescribeInstancesError::generic(
                ErrorMetadata::builder()
                    .code("UnauthorizedOperation")
                    .message("You are not authorized to perform this operation.")
                    .build(),
            )
        });
        let service = Ec2ImageService::new(mock_client!(aws_sdk_ec2, [&rule]));

        let err = service.image_in_use(&ami("ami-1")).await.unwrap_err();
        assert_eq!(err.operation, "DescribeInstances");
        assert_eq!(
            err.message,
            "UnauthorizedOperation: You are not authorized to perform this operation."
        );
        assert_eq!(
            err.to_string(),
            "DescribeInstances failed: UnauthorizedOperation: You are not authorized to perform this operation."
        );
        assert!(err.source().is_some());
    }

    #[tokio::test]
    async fn describes_only_own_images_and_skips_those_without_id() {
        let rule = mock!(aws_sdk_ec2::Client::describe_images)
            .match_requests(|req| req.owners() == [OWNER_SELF])
            .then_output(|| {
                DescribeImagesOutput::builder()
                    .images(
                        types::Image::builder()
                            .image_id("ami-1")
                            .name("web-1")
                            .creation_date("2024-01-01T00:00:00.000Z")
                            .root_device_type(DeviceType::Ebs)
                            .build(),
                    )
                    .images(types::Image::builder().name("nameless").build())
                    .build()
            });
        let service = Ec2ImageService::new(mock_client!(aws_sdk_ec2, [&rule]));

        let images = service.describe_owned_images().await.unwrap();
        assert_eq!(rule.num_calls(), 1);
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].id, ami("ami-1"));
        assert_eq!(images[0].name.as_deref(), Some("web-1"));
        assert!(images[0].is_ebs_backed());
    }
}
