use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;
use serde_json::{Map, Value};
use url::Url;

/// Largest page the server is asked for in one refresh.
pub const MAX_ASSET_COUNT: u32 = 500;

const ROTATION_INTERVAL_RANGE: (Duration, Duration) =
    (Duration::from_secs(5), Duration::from_secs(3600));
const REFRESH_INTERVAL_RANGE: (Duration, Duration) =
    (Duration::from_secs(60), Duration::from_secs(86_400));

/// Which retrieval strategy a query mode uses, without its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Random,
    Recent,
    Album,
    Favorites,
    MetadataSearch,
}

impl QueryKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::Recent => "recent",
            Self::Album => "album",
            Self::Favorites => "favorites",
            Self::MetadataSearch => "metadata-search",
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Retrieval strategy plus the parameters that strategy understands.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum QueryMode {
    /// Random sample of `count` assets.
    Random {
        #[serde(default)]
        count: Option<u32>,
    },
    /// First page of the full collection. `params` are passed through as
    /// query parameters (e.g. `order: asc`).
    Recent {
        #[serde(default)]
        count: Option<u32>,
        #[serde(default)]
        params: BTreeMap<String, Value>,
    },
    /// Assets embedded in one album.
    Album {
        #[serde(default, rename = "album-id")]
        album_id: Option<String>,
    },
    /// Like `Recent`, with the favorites-only filter forced on.
    Favorites {
        #[serde(default)]
        count: Option<u32>,
        #[serde(default)]
        params: BTreeMap<String, Value>,
    },
    /// Structured search; `filters` are merged into the request body.
    MetadataSearch {
        #[serde(default)]
        count: Option<u32>,
        #[serde(default)]
        filters: Map<String, Value>,
    },
}

impl QueryMode {
    pub fn kind(&self) -> QueryKind {
        match self {
            Self::Random { .. } => QueryKind::Random,
            Self::Recent { .. } => QueryKind::Recent,
            Self::Album { .. } => QueryKind::Album,
            Self::Favorites { .. } => QueryKind::Favorites,
            Self::MetadataSearch { .. } => QueryKind::MetadataSearch,
        }
    }

    /// Per-mode count override, if the mode takes one.
    pub fn count(&self) -> Option<u32> {
        match self {
            Self::Random { count }
            | Self::Recent { count, .. }
            | Self::Favorites { count, .. }
            | Self::MetadataSearch { count, .. } => *count,
            Self::Album { .. } => None,
        }
    }
}

impl Default for QueryMode {
    fn default() -> Self {
        Self::Random { count: None }
    }
}

/// API key for the photo server. Never printed.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Configuration {
    /// Base URL of the photo server, e.g. `http://192.168.1.100:2283`.
    pub host: String,
    /// Sent as `x-api-key` on every request.
    pub api_key: ApiKey,
    /// Which assets to rotate through.
    pub query: QueryMode,
    /// Default page/sample size for modes that do not set their own `count`.
    pub asset_count: u32,
    /// Time each photo stays on screen.
    #[serde(with = "humantime_serde")]
    pub rotation_interval: Duration,
    /// Time between re-queries of the candidate list.
    #[serde(with = "humantime_serde")]
    pub refresh_interval: Duration,
    /// Upper bound on a single preview download.
    #[serde(with = "humantime_serde")]
    pub thumbnail_timeout: Duration,
    /// Upper bound on JSON calls and the connectivity probe.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(mut self) -> Result<Self> {
        self.host = self.host.trim().trim_end_matches('/').to_string();
        ensure!(!self.host.is_empty(), "host must be set");
        let url = Url::parse(&self.host)
            .with_context(|| format!("host `{}` is not a valid URL", self.host))?;
        ensure!(
            matches!(url.scheme(), "http" | "https"),
            "host must use http or https, got `{}`",
            url.scheme()
        );
        ensure!(!self.api_key.expose().trim().is_empty(), "api-key must be set");

        ensure!(
            (1..=MAX_ASSET_COUNT).contains(&self.asset_count),
            "asset-count must be between 1 and {MAX_ASSET_COUNT}"
        );
        if let Some(count) = self.query.count() {
            ensure!(
                (1..=MAX_ASSET_COUNT).contains(&count),
                "query.count must be between 1 and {MAX_ASSET_COUNT}"
            );
        }

        ensure_within(
            "rotation-interval",
            self.rotation_interval,
            ROTATION_INTERVAL_RANGE,
        )?;
        ensure_within(
            "refresh-interval",
            self.refresh_interval,
            REFRESH_INTERVAL_RANGE,
        )?;
        ensure!(
            !self.thumbnail_timeout.is_zero(),
            "thumbnail-timeout must be positive"
        );
        ensure!(
            !self.request_timeout.is_zero(),
            "request-timeout must be positive"
        );
        Ok(self)
    }

    /// Count used for the configured query.
    pub fn effective_count(&self) -> u32 {
        self.query.count().unwrap_or(self.asset_count)
    }
}

fn ensure_within(name: &str, value: Duration, (min, max): (Duration, Duration)) -> Result<()> {
    ensure!(
        value >= min && value <= max,
        "{name} must be between {} and {}, got {}",
        humantime::format_duration(min),
        humantime::format_duration(max),
        humantime::format_duration(value)
    );
    Ok(())
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            host: String::new(),
            api_key: ApiKey::default(),
            query: QueryMode::default(),
            asset_count: 50,
            rotation_interval: Duration::from_secs(30),
            refresh_interval: Duration::from_secs(300),
            thumbnail_timeout: Duration::from_secs(15),
            request_timeout: Duration::from_secs(30),
        }
    }
}
