use std::path::PathBuf;

use crate::downloader::CsvEncoding;
use crate::error::ConfigError;
use crate::share::normalize_public_url;

const DEFAULT_BIND: &str = "0.0.0.0:8501";
const DEFAULT_SHARE_TTL_MINUTES: i64 = 10;
/// Links live at most a day.
pub const MAX_SHARE_TTL_MINUTES: i64 = 24 * 60;
const DEFAULT_LIST_OPTIONS: &str = "list_options.json";
const DEFAULT_PAYLOAD_LINK_LIMIT: usize = 2000;

/// Credentials for the object store used for signed download URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectStorageConfig {
    /// Project URL, e.g. `https://xyz.supabase.co` (no trailing slash).
    pub url: String,
    pub service_key: String,
    pub bucket: String,
}

/// Process settings, read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind: String,
    /// Externally reachable base URL, already normalized. `None` when unset.
    pub public_url: Option<String>,
    pub share_ttl_minutes: i64,
    pub csv_encoding: CsvEncoding,
    pub list_options_path: PathBuf,
    /// Longest `?payload=` link handed out before falling back to the token store.
    pub payload_link_limit: usize,
    pub storage: Option<ObjectStorageConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            bind: DEFAULT_BIND.to_string(),
            public_url: None,
            share_ttl_minutes: DEFAULT_SHARE_TTL_MINUTES,
            csv_encoding: CsvEncoding::default(),
            list_options_path: PathBuf::from(DEFAULT_LIST_OPTIONS),
            payload_link_limit: DEFAULT_PAYLOAD_LINK_LIMIT,
            storage: None,
        }
    }
}

impl AppConfig {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through `lookup`; unset or blank variables keep their defaults.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `TASKSHEET_BIND` | `0.0.0.0:8501` |
    /// | `TASKSHEET_PUBLIC_URL` | unset |
    /// | `TASKSHEET_SHARE_TTL_MINUTES` | `10` (1 to 1440) |
    /// | `TASKSHEET_CSV_ENCODING` | `utf-8-sig` |
    /// | `TASKSHEET_LIST_OPTIONS` | `list_options.json` |
    /// | `TASKSHEET_PAYLOAD_LINK_LIMIT` | `2000` |
    /// | `SUPABASE_URL`, `SUPABASE_SERVICE_ROLE_KEY`, `SUPABASE_BUCKET` | unset |
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut config = AppConfig::default();

        if let Some(bind) = get("TASKSHEET_BIND") {
            config.bind = bind;
        }

        config.public_url = get("TASKSHEET_PUBLIC_URL")
            .map(|url| normalize_public_url(&url))
            .filter(|url| !url.is_empty());

        if let Some(value) = get("TASKSHEET_SHARE_TTL_MINUTES") {
            config.share_ttl_minutes = match value.parse::<i64>() {
                Ok(minutes) if (1..=MAX_SHARE_TTL_MINUTES).contains(&minutes) => minutes,
                Ok(_) => {
                    return Err(ConfigError::OutOfRange {
                        name: "TASKSHEET_SHARE_TTL_MINUTES",
                        value,
                        min: 1,
                        max: MAX_SHARE_TTL_MINUTES,
                    });
                }
                Err(_) => {
                    return Err(ConfigError::InvalidNumber {
                        name: "TASKSHEET_SHARE_TTL_MINUTES",
                        value,
                    });
                }
            };
        }

        if let Some(value) = get("TASKSHEET_CSV_ENCODING") {
            config.csv_encoding = value.parse().map_err(|message| ConfigError::Invalid {
                name: "TASKSHEET_CSV_ENCODING",
                message,
            })?;
        }

        if let Some(path) = get("TASKSHEET_LIST_OPTIONS") {
            config.list_options_path = PathBuf::from(path);
        }

        if let Some(value) = get("TASKSHEET_PAYLOAD_LINK_LIMIT") {
            config.payload_link_limit = match value.parse::<usize>() {
                Ok(limit) if limit > 0 => limit,
                _ => {
                    return Err(ConfigError::InvalidNumber {
                        name: "TASKSHEET_PAYLOAD_LINK_LIMIT",
                        value,
                    });
                }
            };
        }

        // All three are needed; a partial set is treated as not configured.
        config.storage = match (
            get("SUPABASE_URL"),
            get("SUPABASE_SERVICE_ROLE_KEY"),
            get("SUPABASE_BUCKET"),
        ) {
            (Some(url), Some(service_key), Some(bucket)) => Some(ObjectStorageConfig {
                url: url.trim_end_matches('/').to_string(),
                service_key,
                bucket,
            }),
            _ => None,
        };

        Ok(config)
    }
}
