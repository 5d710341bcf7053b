//! Conversion from SDK shapes to domain types.

use aws_sdk_ec2::types;

use amiclean::{BlockDeviceMapping, Image, ImageId, RootDeviceType, SnapshotId, Tag};

/// Converts an SDK image description into a domain [`Image`].
///
/// Returns `None` if EC2 omitted the image id. A missing root device type is
/// treated as unknown so the image can never be purged.
pub fn image_from_sdk(raw: &types::Image) -> Option<Image> {
    let id = ImageId::new(raw.image_id()?)?;

    let root_device_type = raw
        .root_device_type()
        .map(|t| RootDeviceType::parse(t.as_str()))
        .unwrap_or_else(|| RootDeviceType::Other(String::new()));

    let block_device_mappings = raw
        .block_device_mappings()
        .iter()
        .map(|mapping| BlockDeviceMapping {
            device_name: mapping.device_name().map(str::to_string),
            snapshot_id: mapping
                .ebs()
                .and_then(|ebs| ebs.snapshot_id())
                .and_then(SnapshotId::new),
        })
        .collect();

    let tags = raw
        .tags()
        .iter()
        .filter_map(|tag| Some(Tag::new(tag.key()?, tag.value().unwrap_or_default())))
        .collect();

    Some(Image {
        id,
        name: raw.name().map(str::to_string),
        creation_date: raw.creation_date().map(str::to_string),
        root_device_type,
        block_device_mappings,
        tags,
    })
}
