use clap::Parser;
use std::path::PathBuf;

/// Import a Twitter/X data export into a Bluesky account.
///
/// Flags override values from the config file and `SKYLIFT__*` variables.
#[derive(Parser, Debug)]
#[command(name = "skylift")]
#[command(version)]
pub struct Cli {
    /// Path to `tweets.js` or the unpacked archive directory
    #[arg(long, env = "SKYLIFT_ARCHIVE")]
    pub archive: Option<PathBuf>,

    /// Configuration file (defaults to ./skylift.yaml when present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Where resume state is kept
    #[arg(long)]
    pub checkpoint_dir: Option<PathBuf>,

    /// Only import posts on or after this date (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    pub min_date: Option<String>,

    /// Only import posts on or before this date (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    pub max_date: Option<String>,

    /// Import replies to other accounts too
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub import_replies: Option<bool>,

    /// Re-create reply chains between imported posts
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub link_threads: Option<bool>,

    /// Skip posts flagged as sensitive
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub skip_sensitive: Option<bool>,

    /// Skip retweets (on by default; pass `--skip-retweets false` to keep them)
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub skip_retweets: Option<bool>,

    /// Comma separated words; posts containing any of them are skipped
    #[arg(long, value_delimiter = ',')]
    pub skip_words: Vec<String>,

    /// Comma separated handles you have used on the source network
    #[arg(long = "handles", value_delimiter = ',')]
    pub owner_handles: Vec<String>,

    /// Bluesky service URL
    #[arg(long)]
    pub service: Option<String>,

    /// Bluesky handle or email
    #[arg(long, env = "BSKY_IDENTIFIER")]
    pub identifier: Option<String>,

    /// Bluesky app password
    #[arg(long, env = "BSKY_APP_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Seconds to wait between posts
    #[arg(long)]
    pub post_interval_secs: Option<u64>,

    /// Filter and plan only; do not log in or post
    #[arg(long)]
    pub dry_run: bool,

    /// Debug logging, mirrored to stderr
    #[arg(short, long)]
    pub verbose: bool,
}
