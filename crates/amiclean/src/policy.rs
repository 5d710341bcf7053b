//! Image selection policy.
//!
//! A [`CleanupPolicy`] decides whether an image is a purge candidate. The
//! decision is the conjunction of four criteria, evaluated cheapest first:
//!
//! 1. the image name starts with the configured prefix;
//! 2. the image was created at or before the expiration instant;
//! 3. (optionally) no instance in this account runs the image;
//! 4. the image's tag matches the filter, XOR the `invert` flag.
//!
//! Criterion 3 needs an API call, so it is sequenced by the `cleaner` crate;
//! everything here is pure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Image, PolicyError, RetentionDays, Tag, Timestamp};

/// Placeholder value reported when an image lacks the filter's tag key.
pub const TAG_NOT_FOUND: &str = "not found";

/// Tag key used by the `--branch` shorthand.
pub const BRANCH_TAG_KEY: &str = "Branch";

// ---------------------------------------------------------------------------
// Tag matching
// ---------------------------------------------------------------------------

/// The tag a candidate image must carry (or, when inverted, must not carry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagFilter {
    /// Tag key to look up on the image.
    pub key: String,
    /// Value the tag must have to count as a match.
    pub value: String,
}

impl TagFilter {
    /// Creates a [`TagFilter`], rejecting an empty key.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Result<Self, PolicyError> {
        let key = key.into();
        if key.is_empty() {
            return Err(PolicyError::EmptyTagKey);
        }
        Ok(Self {
            key,
            value: value.into(),
        })
    }

    /// Expands the branch shorthand into a filter on the `Branch` tag.
    ///
    /// `"master"` selects images built from `master`; `"!master"` selects
    /// images built from any branch *but* `master`. The returned flag is the
    /// inversion to apply.
    pub fn from_branch(value: &str) -> Result<(Self, bool), PolicyError> {
        let (branch, invert) = match value.strip_prefix('!') {
            Some(rest) => (rest, true),
            None => (value, false),
        };
        if branch.is_empty() {
            return Err(PolicyError::EmptyBranch);
        }
        Ok((Self::new(BRANCH_TAG_KEY, branch)?, invert))
    }
}

/// Outcome of looking up a [`TagFilter`] on an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagMatch {
    /// `true` when the image has the filter key set to the filter value.
    pub matched: bool,
    /// The image's tag with the filter key, or `{key, "not found"}` when the
    /// image has no such tag.
    pub tag: Tag,
}

/// Looks up `filter.key` on `image`.
///
/// The first tag with the filter key decides: it matches when its value equals
/// the filter value. An image without the key never matches.
pub fn match_tags(image: &Image, filter: &TagFilter) -> TagMatch {
    match image.tags.iter().find(|tag| tag.key == filter.key) {
        Some(tag) => TagMatch {
            matched: tag.value == filter.value,
            tag: tag.clone(),
        },
        None => TagMatch {
            matched: false,
            tag: Tag::new(filter.key.clone(), TAG_NOT_FOUND),
        },
    }
}

// ---------------------------------------------------------------------------
// Age
// ---------------------------------------------------------------------------

/// Returns the instant before which images are old enough to purge.
///
/// Fails when `days` reaches further back than a timestamp can represent.
pub fn expiration_from_retention(
    now: Timestamp,
    days: RetentionDays,
) -> Result<Timestamp, PolicyError> {
    now.minus_days(days)
        .ok_or(PolicyError::RetentionOutOfRange {
            days: days.as_u32(),
        })
}

/// Parses an EC2 creation date (`2006-01-02T15:04:05.000Z`).
///
/// Any RFC 3339 timestamp is accepted; offsets are normalised to UTC.
pub fn parse_creation_date(value: &str) -> Result<Timestamp, PolicyError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| Timestamp::from_utc(dt.with_timezone(&Utc)))
        .map_err(|e| PolicyError::InvalidCreationDate {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

/// Parses the creation date of `image`, failing if it is absent.
pub fn image_creation_time(image: &Image) -> Result<Timestamp, PolicyError> {
    match image.creation_date.as_deref() {
        Some(value) => parse_creation_date(value),
        None => Err(PolicyError::MissingCreationDate),
    }
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Criteria an image must meet to be purged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupPolicy {
    /// Required image name prefix. Empty matches every image.
    pub name_prefix: String,
    /// Tag filter. `None` means the tag criterion is always satisfied.
    pub tag: Option<TagFilter>,
    /// Select images that do *not* match `tag`.
    pub invert: bool,
    /// Only select images no instance in this account is running.
    pub unused_only: bool,
    /// Images created after this instant are too young to purge.
    pub expiration: Timestamp,
}

impl CleanupPolicy {
    /// Creates a policy that selects every image created at or before
    /// `expiration`. Narrow it with the builder methods.
    pub fn new(expiration: Timestamp) -> Self {
        Self {
            name_prefix: String::new(),
            tag: None,
            invert: false,
            unused_only: false,
            expiration,
        }
    }

    /// Sets the required name prefix.
    #[must_use]
    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    /// Sets the tag filter and whether it is inverted.
    #[must_use]
    pub fn with_tag(mut self, tag: TagFilter, invert: bool) -> Self {
        self.tag = Some(tag);
        self.invert = invert;
        self
    }

    /// Restricts selection to images not used by any instance.
    #[must_use]
    pub fn unused_only(mut self, unused_only: bool) -> Self {
        self.unused_only = unused_only;
        self
    }

    /// Checks the policy is internally consistent.
    pub fn validate(&self) -> Result<(), PolicyError> {
        match &self.tag {
            None if self.invert => Err(PolicyError::InvertWithoutTag),
            Some(tag) if tag.key.is_empty() => Err(PolicyError::EmptyTagKey),
            _ => Ok(()),
        }
    }

    /// Returns `true` if the image name starts with the configured prefix.
    pub fn matches_name(&self, image: &Image) -> bool {
        image.name_or_empty().starts_with(&self.name_prefix)
    }

    /// Returns `true` if an image created at `created` is old enough.
    pub fn is_expired(&self, created: Timestamp) -> bool {
        created <= self.expiration
    }

    /// Evaluates the tag criterion.
    ///
    /// Returns whether the image is selected (`invert != matched`) together
    /// with the tag lookup, which callers log.
    pub fn tag_decision(&self, image: &Image) -> (bool, Option<TagMatch>) {
        match &self.tag {
            Some(filter) => {
                let lookup = match_tags(image, filter);
                (self.invert != lookup.matched, Some(lookup))
            }
            None => (!self.invert, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ImageId, RootDeviceType};
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> Timestamp {
        Timestamp::from_utc(Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap())
    }

    fn image(name: Option<&str>, tags: &[(&str, &str)]) -> Image {
        Image {
            id: ImageId::new("ami-1").unwrap(),
            name: name.map(str::to_string),
            creation_date: Some("2020-01-01T00:00:00.000Z".to_string()),
            root_device_type: RootDeviceType::Ebs,
            block_device_mappings: Vec::new(),
            tags: tags.iter().map(|(k, v)| Tag::new(*k, *v)).collect(),
        }
    }

    fn filter(key: &str, value: &str) -> TagFilter {
        TagFilter::new(key, value).unwrap()
    }

    #[test]
    fn match_tags_reports_matching_tag() {
        let img = image(Some("web"), &[("Env", "prod"), ("Branch", "master")]);
        let result = match_tags(&img, &filter("Branch", "master"));
        assert!(result.matched);
        assert_eq!(result.tag, Tag::new("Branch", "master"));
    }

    #[test]
    fn match_tags_reports_image_value_on_mismatch() {
        let img = image(Some("web"), &[("Branch", "feature-x")]);
        let result = match_tags(&img, &filter("Branch", "master"));
        assert!(!result.matched);
        assert_eq!(result.tag, Tag::new("Branch", "feature-x"));
    }

    #[test]
    fn match_tags_reports_not_found_for_missing_key() {
        let img = image(Some("web"), &[("Env", "prod")]);
        let result = match_tags(&img, &filter("Branch", "master"));
        assert!(!result.matched);
        assert_eq!(result.tag, Tag::new("Branch", TAG_NOT_FOUND));
    }

    #[test]
    fn match_tags_uses_first_tag_with_the_key() {
        let img = image(Some("web"), &[("Branch", "dev"), ("Branch", "master")]);
        assert!(!match_tags(&img, &filter("Branch", "master")).matched);
    }

    #[test]
    fn parse_creation_date_accepts_ec2_format() {
        let parsed = parse_creation_date("2019-03-01T12:30:45.000Z").unwrap();
        assert_eq!(
            parsed.as_datetime(),
            Utc.with_ymd_and_hms(2019, 3, 1, 12, 30, 45).unwrap()
        );
    }

    #[test]
    fn parse_creation_date_rejects_garbage() {
        let err = parse_creation_date("yesterday").unwrap_err();
        assert!(matches!(err, PolicyError::InvalidCreationDate { ref value, .. } if value == "yesterday"));
    }

    #[test]
    fn missing_creation_date_is_an_error() {
        let mut img = image(None, &[]);
        img.creation_date = None;
        assert_eq!(
            image_creation_time(&img),
            Err(PolicyError::MissingCreationDate)
        );
    }

    #[test]
    fn expiration_is_retention_days_before_now() {
        let expiration = expiration_from_retention(at(2024, 2, 1), RetentionDays::new(31));
        assert_eq!(expiration, Ok(at(2024, 1, 1)));
    }

    #[test]
    fn retention_beyond_representable_range_is_an_error() {
        assert_eq!(
            expiration_from_retention(Timestamp::now(), RetentionDays::new(u32::MAX)),
            Err(PolicyError::RetentionOutOfRange { days: u32::MAX })
        );
    }

    #[test]
    fn images_created_exactly_at_expiration_are_expired() {
        let policy = CleanupPolicy::new(at(2024, 1, 1));
        assert!(policy.is_expired(at(2023, 12, 31)));
        assert!(policy.is_expired(at(2024, 1, 1)));
        assert!(!policy.is_expired(at(2024, 1, 2)));
    }

    #[test]
    fn name_prefix_matching() {
        let policy = CleanupPolicy::new(at(2024, 1, 1)).with_name_prefix("web-");
        assert!(policy.matches_name(&image(Some("web-2024"), &[])));
        assert!(!policy.matches_name(&image(Some("db-2024"), &[])));
        assert!(!policy.matches_name(&image(None, &[])));

        let any = CleanupPolicy::new(at(2024, 1, 1));
        assert!(any.matches_name(&image(None, &[])));
    }

    #[test]
    fn tag_decision_is_match_xor_invert() {
        let tagged = image(Some("web"), &[("Branch", "master")]);
        let other = image(Some("web"), &[("Branch", "dev")]);
        let base = CleanupPolicy::new(at(2024, 1, 1));

        let direct = base.clone().with_tag(filter("Branch", "master"), false);
        assert!(direct.tag_decision(&tagged).0);
        assert!(!direct.tag_decision(&other).0);

        let inverted = base.with_tag(filter("Branch", "master"), true);
        assert!(!inverted.tag_decision(&tagged).0);
        assert!(inverted.tag_decision(&other).0);
    }

    #[test]
    fn tag_decision_without_filter_selects() {
        let policy = CleanupPolicy::new(at(2024, 1, 1));
        let (selected, lookup) = policy.tag_decision(&image(Some("web"), &[]));
        assert!(selected);
        assert!(lookup.is_none());
    }

    #[test]
    fn validate_rejects_invert_without_tag() {
        let mut policy = CleanupPolicy::new(at(2024, 1, 1));
        policy.invert = true;
        assert_eq!(policy.validate(), Err(PolicyError::InvertWithoutTag));
    }

    #[test]
    fn validate_rejects_empty_tag_key() {
        let mut policy = CleanupPolicy::new(at(2024, 1, 1));
        policy.tag = Some(TagFilter {
            key: String::new(),
            value: "x".to_string(),
        });
        assert_eq!(policy.validate(), Err(PolicyError::EmptyTagKey));
        assert_eq!(TagFilter::new("", "x"), Err(PolicyError::EmptyTagKey));
    }

    #[test]
    fn branch_shorthand_expands_to_branch_tag() {
        let (tag, invert) = TagFilter::from_branch("master").unwrap();
        assert_eq!(tag, filter(BRANCH_TAG_KEY, "master"));
        assert!(!invert);

        let (tag, invert) = TagFilter::from_branch("!master").unwrap();
        assert_eq!(tag, filter(BRANCH_TAG_KEY, "master"));
        assert!(invert);

        assert_eq!(TagFilter::from_branch("!"), Err(PolicyError::EmptyBranch));
        assert_eq!(TagFilter::from_branch(""), Err(PolicyError::EmptyBranch));
    }
}
