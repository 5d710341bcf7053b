//! In-memory [`ImageService`] used by the unit tests.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

use amiclean::{
    BlockDeviceMapping, CloudError, Image, ImageId, ImageService, RootDeviceType, SnapshotId, Tag,
};

/// One recorded call against the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    DescribeImages,
    DescribeInstances(String),
    DeregisterImage(String),
    DeleteSnapshot(String),
}

#[derive(Default)]
pub struct FakeImageService {
    pub images: Vec<Image>,
    pub in_use: HashSet<String>,
    pub fail_describe: bool,
    pub fail_in_use: HashSet<String>,
    pub fail_deregister: HashSet<String>,
    pub fail_delete: HashSet<String>,
    calls: Mutex<Vec<Call>>,
}

impl FakeImageService {
    pub fn with_images(images: Vec<Image>) -> Self {
        Self {
            images,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls that would have changed something in the account.
    pub fn mutations(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::DeregisterImage(_) | Call::DeleteSnapshot(_)))
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ImageService for FakeImageService {
    async fn describe_owned_images(&self) -> Result<Vec<Image>, CloudError> {
        self.record(Call::DescribeImages);
        if self.fail_describe {
            return Err(CloudError::new("DescribeImages", "UnauthorizedOperation"));
        }
        Ok(self.images.clone())
    }

    async fn image_in_use(&self, image_id: &ImageId) -> Result<bool, CloudError> {
        self.record(Call::DescribeInstances(image_id.to_string()));
        if self.fail_in_use.contains(image_id.as_str()) {
            return Err(CloudError::new("DescribeInstances", "RequestLimitExceeded"));
        }
        Ok(self.in_use.contains(image_id.as_str()))
    }

    async fn deregister_image(&self, image_id: &ImageId) -> Result<(), CloudError> {
        self.record(Call::DeregisterImage(image_id.to_string()));
        if self.fail_deregister.contains(image_id.as_str()) {
            return Err(CloudError::new("DeregisterImage", "InvalidAMIID.Unavailable"));
        }
        Ok(())
    }

    async fn delete_snapshot(&self, snapshot_id: &SnapshotId) -> Result<(), CloudError> {
        self.record(Call::DeleteSnapshot(snapshot_id.to_string()));
        if self.fail_delete.contains(snapshot_id.as_str()) {
            return Err(CloudError::new("DeleteSnapshot", "InvalidSnapshot.InUse"));
        }
        Ok(())
    }
}

pub fn ebs_image(id: &str, name: &str, created: &str, snapshots: &[&str]) -> Image {
    Image {
        id: ImageId::new(id).unwrap(),
        name: Some(name.to_string()),
        creation_date: Some(created.to_string()),
        root_device_type: RootDeviceType::Ebs,
        block_device_mappings: snapshots
            .iter()
            .enumerate()
            .map(|(i, snap)| BlockDeviceMapping {
                device_name: Some(format!("/dev/xvd{}", (b'a' + i as u8) as char)),
                snapshot_id: SnapshotId::new(*snap),
            })
            .collect(),
        tags: Vec::new(),
    }
}

pub fn instance_store_image(id: &str, name: &str, created: &str) -> Image {
    Image {
        id: ImageId::new(id).unwrap(),
        name: Some(name.to_string()),
        creation_date: Some(created.to_string()),
        root_device_type: RootDeviceType::InstanceStore,
        block_device_mappings: vec![BlockDeviceMapping {
            device_name: Some("/dev/sdb".to_string()),
            snapshot_id: None,
        }],
        tags: Vec::new(),
    }
}

pub fn tagged(mut image: Image, key: &str, value: &str) -> Image {
    image.tags.push(Tag::new(key, value));
    image
}
