//! Configuration for the BucketNest client

use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_PUBLIC_FUNCTION: &str = "get-shared-collection";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing environment variable {0}")]
    MissingVar(&'static str),

    #[error("Invalid Supabase URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("The anon key must not be empty")]
    EmptyKey,

    #[error("Could not build HTTP client: {0}")]
    HttpClient(String),
}

/// How a store brings its cache up to date after a write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconcileStrategy {
    /// Re-fetch the whole collection
    #[default]
    Refetch,
    /// Merge the row returned by the write into the cache
    MergeReturned,
}

/// Where public slug lookups are served from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PublicLookup {
    /// Query the tables directly as the anon role
    #[default]
    Table,
    /// Call the public HTTP function
    EdgeFunction,
}

/// Tunables for the stores and the gateway
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Per-request HTTP timeout
    pub request_timeout: Option<Duration>,

    /// Wall-clock budget for resolving a single item
    pub resolve_timeout: Duration,

    /// Bulk fetches tried before falling back to a direct lookup
    pub bulk_fetch_attempts: u32,

    pub slug_length: usize,

    /// Shorter search queries return nothing
    pub search_min_chars: usize,

    pub search_limit: usize,

    pub reconcile: ReconcileStrategy,

    pub public_lookup: PublicLookup,

    pub public_function: String,

    /// JSON file holding the pre-auth demo profile
    pub legacy_profile_path: Option<PathBuf>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Some(Duration::from_secs(30)),
            resolve_timeout: Duration::from_secs(10),
            bulk_fetch_attempts: 3,
            slug_length: 10,
            search_min_chars: 3,
            search_limit: 10,
            reconcile: ReconcileStrategy::Refetch,
            public_lookup: PublicLookup::Table,
            public_function: DEFAULT_PUBLIC_FUNCTION.to_string(),
            legacy_profile_path: None,
        }
    }
}

impl ClientOptions {
    pub fn with_request_timeout(mut self, value: Option<Duration>) -> Self {
        self.request_timeout = value;
        self
    }

    pub fn with_resolve_timeout(mut self, value: Duration) -> Self {
        self.resolve_timeout = value;
        self
    }

    pub fn with_bulk_fetch_attempts(mut self, value: u32) -> Self {
        self.bulk_fetch_attempts = value;
        self
    }

    pub fn with_slug_length(mut self, value: usize) -> Self {
        self.slug_length = value;
        self
    }

    pub fn with_search_min_chars(mut self, value: usize) -> Self {
        self.search_min_chars = value;
        self
    }

    pub fn with_search_limit(mut self, value: usize) -> Self {
        self.search_limit = value;
        self
    }

    pub fn with_reconcile(mut self, value: ReconcileStrategy) -> Self {
        self.reconcile = value;
        self
    }

    pub fn with_public_lookup(mut self, value: PublicLookup) -> Self {
        self.public_lookup = value;
        self
    }

    pub fn with_public_function(mut self, value: &str) -> Self {
        self.public_function = value.to_string();
        self
    }

    pub fn with_legacy_profile_path(mut self, value: impl Into<PathBuf>) -> Self {
        self.legacy_profile_path = Some(value.into());
        self
    }
}

/// Project URL, anon key and options
#[derive(Debug, Clone)]
pub struct BucketNestConfig {
    pub url: String,
    pub anon_key: String,
    pub options: ClientOptions,
}

impl BucketNestConfig {
    pub fn new(url: &str, anon_key: &str, options: ClientOptions) -> Result<Self, ConfigError> {
        let parsed = Url::parse(url).map_err(|e| ConfigError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme {}", parsed.scheme()),
            });
        }
        if anon_key.trim().is_empty() {
            return Err(ConfigError::EmptyKey);
        }
        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            options,
        })
    }

    /// Reads `SUPABASE_URL` and `SUPABASE_ANON_KEY`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = env::var("SUPABASE_URL").map_err(|_| ConfigError::MissingVar("SUPABASE_URL"))?;
        let key = env::var("SUPABASE_ANON_KEY")
            .map_err(|_| ConfigError::MissingVar("SUPABASE_ANON_KEY"))?;
        Self::new(&url, &key, ClientOptions::default())
    }

    pub fn with_options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = ClientOptions::default();
        assert_eq!(options.resolve_timeout, Duration::from_secs(10));
        assert_eq!(options.bulk_fetch_attempts, 3);
        assert_eq!(options.slug_length, 10);
        assert_eq!(options.search_min_chars, 3);
        assert_eq!(options.search_limit, 10);
        assert_eq!(options.reconcile, ReconcileStrategy::Refetch);
        assert_eq!(options.public_lookup, PublicLookup::Table);
        assert_eq!(options.public_function, "get-shared-collection");
    }

    #[test]
    fn new_normalizes_and_validates() {
        let config =
            BucketNestConfig::new("https://abc.supabase.co/", "anon", ClientOptions::default())
                .unwrap();
        assert_eq!(config.url, "https://abc.supabase.co");

        assert!(matches!(
            BucketNestConfig::new("not a url", "anon", ClientOptions::default()),
            Err(ConfigError::InvalidUrl { .. })
        ));
        assert_eq!(
            BucketNestConfig::new("https://abc.supabase.co", " ", ClientOptions::default())
                .unwrap_err(),
            ConfigError::EmptyKey
        );
    }
}
