//! Merge CLI flags over loaded configuration into the immutable run settings.
use crate::cli::Cli;
use chrono::{DateTime, NaiveDate, Utc};
use skylift_common::observability::{LogConfig, LogFormat};
use skylift_common::{Result, SkyliftError};
use skylift_config::{LoggingSection, SkyliftConfig};
use skylift_import::{ImportFilterConfig, ImportSettings, ThrottleSettings};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone)]
pub struct Credentials {
    pub service: String,
    pub identifier: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("service", &self.service)
            .field("identifier", &self.identifier)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct RunSettings {
    pub archive_path: PathBuf,
    pub filters: ImportFilterConfig,
    pub import: ImportSettings,
    /// `None` only for dry runs.
    pub credentials: Option<Credentials>,
    pub dry_run: bool,
}

impl RunSettings {
    pub fn resolve(cli: &Cli, config: SkyliftConfig) -> Result<Self> {
        let archive_path = cli
            .archive
            .clone()
            .or_else(|| config.archive_path.clone())
            .ok_or_else(|| SkyliftError::Config("no archive path given (--archive)".into()))?;

        let f = &config.filters;
        let min_date = bound(cli.min_date.as_deref().or(f.min_date.as_deref()), "min_date")?;
        let max_date = bound(cli.max_date.as_deref().or(f.max_date.as_deref()), "max_date")?;
        if let (Some(min), Some(max)) = (min_date, max_date) {
            if min > max {
                return Err(SkyliftError::Config(format!(
                    "min_date {min} is after max_date {max}"
                )));
            }
        }

        let skip_words = if cli.skip_words.is_empty() {
            &f.skip_words
        } else {
            &cli.skip_words
        };
        let owner_handles = if cli.owner_handles.is_empty() {
            &f.owner_handles
        } else {
            &cli.owner_handles
        };

        let filters = ImportFilterConfig {
            min_date,
            max_date,
            import_replies: cli.import_replies.unwrap_or(f.import_replies),
            link_threads: cli.link_threads.unwrap_or(f.link_threads),
            skip_sensitive: cli.skip_sensitive.unwrap_or(f.skip_sensitive),
            skip_retweets: cli.skip_retweets.unwrap_or(f.skip_retweets),
            ..ImportFilterConfig::default()
        }
        .with_skip_words(skip_words)
        .with_owner_handles(owner_handles);

        if !filters.import_replies && filters.owner_handles.is_empty() {
            tracing::warn!(
                hint = "pass --handles to keep self-replies",
                "settings.no_owner_handles"
            );
        }

        let t = &config.throttle;
        let import = ImportSettings {
            checkpoint_dir: cli
                .checkpoint_dir
                .clone()
                .unwrap_or_else(|| config.checkpoint_dir_or_default()),
            throttle: ThrottleSettings {
                post_interval: Duration::from_secs(
                    cli.post_interval_secs.unwrap_or(t.post_interval_secs),
                ),
                rate_limit_cooldown: Duration::from_secs(t.rate_limit_cooldown_secs),
                soft_budget: t.soft_budget,
                budget_pause: Duration::from_secs(t.budget_pause_secs),
            },
        };

        let credentials = match credentials(cli, &config) {
            Some(c) => Some(c),
            None if cli.dry_run => None,
            None => {
                return Err(SkyliftError::Config(
                    "Bluesky identifier and app password are required (--identifier/--password)"
                        .into(),
                ));
            }
        };

        Ok(Self {
            archive_path,
            filters,
            import,
            credentials,
            dry_run: cli.dry_run,
        })
    }
}

fn credentials(cli: &Cli, config: &SkyliftConfig) -> Option<Credentials> {
    let d = &config.destination;
    let identifier = cli.identifier.clone().or_else(|| d.identifier.clone())?;
    let password = cli.password.clone().or_else(|| d.password.clone())?;
    if identifier.trim().is_empty() || password.is_empty() {
        return None;
    }
    Some(Credentials {
        service: cli.service.clone().unwrap_or_else(|| d.service.clone()),
        identifier: identifier.trim().to_string(),
        password,
    })
}

fn bound(raw: Option<&str>, name: &str) -> Result<Option<DateTime<Utc>>> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            parse_date_bound(s).ok_or_else(|| {
                SkyliftError::Config(format!(
                    "{name}: expected YYYY-MM-DD or an RFC 3339 timestamp, got {s:?}"
                ))
            })
        })
        .transpose()
}

/// `YYYY-MM-DD` is read as midnight UTC.
pub fn parse_date_bound(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

pub fn log_config(section: &LoggingSection, verbose: bool) -> LogConfig {
    LogConfig {
        log_dir: section.dir.clone(),
        emit_stderr: section.emit_stderr.unwrap_or(true),
        format: section
            .format
            .as_deref()
            .map(LogFormat::parse)
            .unwrap_or(LogFormat::Text),
        ..LogConfig::default()
    }
    .verbose(verbose)
}
