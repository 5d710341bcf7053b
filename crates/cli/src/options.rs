//! Command-line options and their translation into a [`CleanupPolicy`].

use clap::{Parser, ValueEnum};

use amiclean::{
    expiration_from_retention, CleanupPolicy, PolicyError, RetentionDays, TagFilter, Timestamp,
};

/// Deregister old AMIs and delete their EBS snapshots.
///
/// Runs dry by default: nothing is deregistered or deleted unless `--delete`
/// is given. Earlier releases deleted unless `-n` was passed; `-n/--dryrun`
/// is still accepted and now only restates the default.
#[derive(Debug, Parser)]
#[command(name = "ami-cleaner", version)]
pub struct Options {
    /// Actually deregister AMIs and delete their snapshots
    #[arg(long, conflicts_with = "dry_run")]
    pub delete: bool,

    /// Only report what would be purged (the default)
    #[arg(short = 'n', long = "dryrun")]
    pub dry_run: bool,

    /// Age of an AMI in days before it is a candidate for removal
    #[arg(long, default_value_t = RetentionDays::DEFAULT.as_u32())]
    pub days: u32,

    /// Only consider AMIs whose name starts with this prefix
    #[arg(long, default_value = "")]
    pub prefix: String,

    /// Tag key an AMI must carry to be purged
    #[arg(long, requires = "tag_value", conflicts_with = "branch")]
    pub tag_key: Option<String>,

    /// Value the tag must have
    #[arg(long, requires = "tag_key", conflicts_with = "branch")]
    pub tag_value: Option<String>,

    /// Branch to purge. Preface with ! to purge all branches *but* this one
    /// (eg, !master purges all AMIs not built from master)
    #[arg(short = 'b', long, conflicts_with = "invert")]
    pub branch: Option<String>,

    /// Purge AMIs that do NOT match the tag
    #[arg(long, requires = "tag_key")]
    pub invert: bool,

    /// Only purge AMIs no instance in this account is running
    #[arg(long)]
    pub unused: bool,

    /// The AWS profile to use
    #[arg(short, long, env = "PROFILE")]
    pub profile: Option<String>,

    /// The AWS region to use
    #[arg(short, long, env = "REGION")]
    pub region: Option<String>,

    /// Format of the report printed on stdout
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    /// Format of the log lines written to stderr
    #[arg(long, value_enum, env = "AMI_CLEANER_LOG_FORMAT", default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,
}

/// Report format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary.
    Text,
    /// The full report as JSON.
    Json,
}

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    /// Multi-line, human-oriented output.
    Pretty,
}

impl Options {
    /// `true` when mutating calls should be made.
    pub fn delete(&self) -> bool {
        self.delete && !self.dry_run
    }

    /// Builds the selection policy, with the age threshold measured from `now`.
    pub fn policy(&self, now: Timestamp) -> Result<CleanupPolicy, PolicyError> {
        let expiration = expiration_from_retention(now, RetentionDays::new(self.days))?;
        let mut policy = CleanupPolicy::new(expiration)
            .with_name_prefix(self.prefix.as_str())
            .unused_only(self.unused);

        if let Some(branch) = &self.branch {
            let (tag, invert) = TagFilter::from_branch(branch)?;
            policy = policy.with_tag(tag, invert);
        } else if let (Some(key), Some(value)) = (&self.tag_key, &self.tag_value) {
            policy = policy.with_tag(TagFilter::new(key.as_str(), value.as_str())?, self.invert);
        }

        policy.validate()?;
        Ok(policy)
    }
}
