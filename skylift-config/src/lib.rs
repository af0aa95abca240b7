//! Loader for Skylift configuration with YAML + environment overlays.
//!
//! Precedence, lowest first: built-in defaults, YAML files in the order they
//! were added, then `SKYLIFT__`-prefixed environment variables
//! (`SKYLIFT__DESTINATION__IDENTIFIER`, `SKYLIFT__FILTERS__SKIP_WORDS=a,b`).
//! String values may reference other variables as `${VAR}`; expansion is
//! repeated up to a fixed depth so chained references resolve and cycles stop.
//!
//! ```yaml
//! archive_path: ~/Downloads/twitter-2023/
//! filters:
//!   min_date: 2015-01-01
//!   owner_handles: [old_me, me]
//!   skip_words: [giveaway]
//! destination:
//!   identifier: me.bsky.social
//!   password: ${BSKY_APP_PASSWORD}
//! throttle:
//!   post_interval_secs: 15
//! ```
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;
const ENV_PREFIX: &str = "SKYLIFT";

/// File name looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "skylift.yaml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SkyliftConfig {
    pub archive_path: Option<PathBuf>,
    pub checkpoint_dir: Option<PathBuf>,
    pub filters: FilterSection,
    pub destination: DestinationSection,
    pub throttle: ThrottleSection,
    pub logging: LoggingSection,
}

impl SkyliftConfig {
    /// Configured checkpoint directory, or a per-user data directory.
    pub fn checkpoint_dir_or_default(&self) -> PathBuf {
        self.checkpoint_dir.clone().unwrap_or_else(default_checkpoint_dir)
    }
}

pub fn default_checkpoint_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("skylift").join("checkpoint"))
        .unwrap_or_else(|| PathBuf::from(".skylift"))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilterSection {
    /// `YYYY-MM-DD` or RFC 3339.
    pub min_date: Option<String>,
    pub max_date: Option<String>,
    pub import_replies: bool,
    pub link_threads: bool,
    pub skip_sensitive: bool,
    pub skip_retweets: bool,
    pub skip_words: Vec<String>,
    pub owner_handles: Vec<String>,
}

impl Default for FilterSection {
    fn default() -> Self {
        Self {
            min_date: None,
            max_date: None,
            import_replies: false,
            link_threads: true,
            skip_sensitive: false,
            skip_retweets: true,
            skip_words: Vec::new(),
            owner_handles: Vec::new(),
        }
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct DestinationSection {
    pub service: String,
    pub identifier: Option<String>,
    pub password: Option<String>,
}

impl Default for DestinationSection {
    fn default() -> Self {
        Self {
            service: "https://bsky.social".into(),
            identifier: None,
            password: None,
        }
    }
}

impl std::fmt::Debug for DestinationSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DestinationSection")
            .field("service", &self.service)
            .field("identifier", &self.identifier)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ThrottleSection {
    pub post_interval_secs: u64,
    pub rate_limit_cooldown_secs: u64,
    /// `0` disables the soft budget.
    pub soft_budget: u32,
    pub budget_pause_secs: u64,
}

impl Default for ThrottleSection {
    fn default() -> Self {
        Self {
            post_interval_secs: 15,
            rate_limit_cooldown_secs: 300,
            soft_budget: 1500,
            budget_pause_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// `text` or `json`.
    pub format: Option<String>,
    pub dir: Option<PathBuf>,
    pub emit_stderr: Option<bool>,
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("filters.skip_words")
        .with_list_parse_key("filters.owner_handles")
}

/// Builder hides the `config` crate wiring (YAML + env overrides).
pub struct SkyliftConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for SkyliftConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl SkyliftConfigLoader {
    /// Start from defaults; environment overrides are applied last in [`Self::load`].
    ///
    /// ```
    /// use skylift_config::SkyliftConfigLoader;
    ///
    /// let config = SkyliftConfigLoader::new()
    ///     .with_yaml_str("archive_path: /data/export\nfilters:\n  skip_words: [giveaway]")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.archive_path.unwrap().to_str(), Some("/data/export"));
    /// assert_eq!(config.filters.skip_words, ["giveaway"]);
    /// assert!(config.filters.skip_retweets);
    /// assert_eq!(config.throttle.post_interval_secs, 15);
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
        }
    }

    /// Attach a required YAML/TOML/JSON file; the `config` crate infers format by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that may be missing.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Allow tests/CLI to merge inline YAML snippets.
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Merge all sources, expand `${VAR}` placeholders and deserialize.
    ///
    /// ```
    /// use skylift_config::SkyliftConfigLoader;
    ///
    /// unsafe { std::env::set_var("DOC_BSKY_PASSWORD", "from-env"); }
    ///
    /// let config = SkyliftConfigLoader::new()
    ///     .with_yaml_str("destination:\n  identifier: me.bsky.social\n  password: ${DOC_BSKY_PASSWORD}")
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// assert_eq!(config.destination.password.as_deref(), Some("from-env"));
    /// assert_eq!(config.destination.service, "https://bsky.social");
    ///
    /// unsafe { std::env::remove_var("DOC_BSKY_PASSWORD"); }
    /// ```
    pub fn load(self) -> Result<SkyliftConfig, ConfigError> {
        let cfg = self.builder.add_source(environment()).build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))
    }
}
