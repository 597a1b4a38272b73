//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    num::{NonZeroU32, NonZeroUsize},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::cache::{CacheConfig, IntervalUnit};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "wpp";
const ENV_PREFIX: &str = "WPP";
const DEFAULT_CACHE_INTERVAL_VALUE: u64 = 1;
const DEFAULT_CACHE_BACKEND_TIMEOUT_MS: u64 = 250;
const DEFAULT_CACHE_CAPACITY: u64 = 512;

/// Command-line arguments for the `wpp` binary.
#[derive(Debug, Parser)]
#[command(name = "wpp", version, about = "Popular-posts widget settings tool")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "WPP_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: GlobalOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Normalize a widget instance and print it with its cache fingerprint.
    Normalize(NormalizeArgs),
    /// Print the cache fingerprint of a stored widget instance.
    Fingerprint(FingerprintArgs),
    /// Print the widget defaults in their persisted shape.
    Defaults,
}

#[derive(Debug, Args, Clone)]
pub struct NormalizeArgs {
    /// JSON object holding the submitted settings.
    #[arg(value_name = "INPUT", value_hint = ValueHint::FilePath)]
    pub input: PathBuf,

    /// Previously saved instance; defaults are used when omitted.
    #[arg(long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub previous: Option<PathBuf>,

    /// Treat INPUT as flat admin-form fields rather than a stored instance.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub form: bool,
}

#[derive(Debug, Args, Clone)]
pub struct FingerprintArgs {
    /// Stored widget instance (JSON).
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub file: PathBuf,
}

#[derive(Debug, Args, Default, Clone)]
pub struct GlobalOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,

    /// Override the widget defaults file.
    #[arg(long = "defaults-file", value_name = "PATH", global = true)]
    pub defaults_file: Option<PathBuf>,

    /// Toggle the result cache.
    #[arg(
        long = "cache-active",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub cache_active: Option<bool>,
}

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub cache: CacheSettings,
    pub widget: WidgetSettings,
    pub defaults: DefaultsSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub active: bool,
    pub interval_value: NonZeroU32,
    pub interval_unit: IntervalUnit,
    pub backend_timeout: Duration,
    pub capacity: NonZeroUsize,
    pub single_flight: bool,
}

/// Administrative options consulted while rendering the widget.
#[derive(Debug, Clone, Default)]
pub struct WidgetSettings {
    /// Load the list with a follow-up request instead of inline.
    pub ajax: bool,
    /// Lazy-load thumbnails of deferred lists.
    pub thumbnail_lazyload: bool,
}

/// How a widget instance is served under the loaded settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServePlan {
    pub cache_active: bool,
    pub ttl_secs: u64,
    pub single_flight: bool,
    pub delivery: Delivery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Delivery {
    /// List rendered into the sidebar markup.
    Inline,
    /// List fetched by a follow-up request.
    Deferred,
}

#[derive(Debug, Clone, Default)]
pub struct DefaultsSettings {
    /// JSON file with the site's widget defaults; built-ins when absent.
    pub file: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    cache: RawCacheSettings,
    widget: RawWidgetSettings,
    defaults: RawDefaultsSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &GlobalOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(path) = overrides.defaults_file.as_ref() {
            self.defaults.file = Some(path.clone());
        }
        if let Some(active) = overrides.cache_active {
            self.cache.active = Some(active);
        }
    }
}

impl Settings {
    pub fn serve_plan(&self) -> ServePlan {
        let cache = CacheConfig::from(&self.cache);
        ServePlan {
            cache_active: cache.active,
            ttl_secs: cache.ttl().as_secs(),
            single_flight: cache.single_flight,
            delivery: if self.widget.ajax {
                Delivery::Deferred
            } else {
                Delivery::Inline
            },
        }
    }

    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            cache,
            widget,
            defaults,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            cache: build_cache_settings(cache)?,
            widget: build_widget_settings(widget),
            defaults: build_defaults_settings(defaults)?,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let interval_value = non_zero_u32(
        cache.interval_value.unwrap_or(DEFAULT_CACHE_INTERVAL_VALUE),
        "cache.interval_value",
    )?;

    let interval_unit = match cache.interval_unit {
        Some(unit) => IntervalUnit::parse(&unit).ok_or_else(|| {
            LoadError::invalid(
                "cache.interval_unit",
                format!("`{unit}` is not one of minute|hour|day|week|month|year"),
            )
        })?,
        None => IntervalUnit::default(),
    };

    let timeout_ms = cache
        .backend_timeout_ms
        .unwrap_or(DEFAULT_CACHE_BACKEND_TIMEOUT_MS);
    if timeout_ms == 0 {
        return Err(LoadError::invalid(
            "cache.backend_timeout_ms",
            "must be greater than zero",
        ));
    }

    let capacity_value = cache.capacity.unwrap_or(DEFAULT_CACHE_CAPACITY);
    let capacity = usize::try_from(capacity_value)
        .ok()
        .and_then(NonZeroUsize::new)
        .ok_or_else(|| LoadError::invalid("cache.capacity", "must be a positive entry count"))?;

    Ok(CacheSettings {
        active: cache.active.unwrap_or(false),
        interval_value,
        interval_unit,
        backend_timeout: Duration::from_millis(timeout_ms),
        capacity,
        single_flight: cache.single_flight.unwrap_or(true),
    })
}

fn build_widget_settings(widget: RawWidgetSettings) -> WidgetSettings {
    WidgetSettings {
        ajax: widget.ajax.unwrap_or(false),
        thumbnail_lazyload: widget.thumbnail_lazyload.unwrap_or(false),
    }
}

fn build_defaults_settings(defaults: RawDefaultsSettings) -> Result<DefaultsSettings, LoadError> {
    if defaults
        .file
        .as_ref()
        .is_some_and(|path| path.as_os_str().is_empty())
    {
        return Err(LoadError::invalid("defaults.file", "path must not be empty"));
    }
    Ok(DefaultsSettings {
        file: defaults.file,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    active: Option<bool>,
    interval_value: Option<u64>,
    interval_unit: Option<String>,
    backend_timeout_ms: Option<u64>,
    capacity: Option<u64>,
    single_flight: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawWidgetSettings {
    ajax: Option<bool>,
    thumbnail_lazyload: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDefaultsSettings {
    file: Option<PathBuf>,
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
