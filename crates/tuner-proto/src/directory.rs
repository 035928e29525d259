//! Station directory and the cascading loader that fills it.
//!
//! A load walks an ordered list of [`StationSource`]s and stops at the first
//! one that answers with a decodable station list.  When every source fails
//! the directory is filled with [`seed_stations`].  Exactly one of those
//! outcomes replaces the directory contents; sources are never merged.
//!
//! The `loading` flag is raised before the first source is tried and lowered
//! by a drop guard after the directory has been replaced, so it is cleared on
//! every exit path (including a cancelled or panicking load task).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, ORIGIN};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::DirectoryConfig;
use crate::station::{normalize_all, seed_stations, RawStation, Station};

// ── errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("malformed station list: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("invalid source configuration: {0}")]
    Config(String),
}

// ── directory ─────────────────────────────────────────────────────────────────

/// Where the current directory contents came from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DirectoryOrigin {
    /// Nothing loaded yet.
    #[default]
    Empty,
    /// A network source answered.
    Source { name: String },
    /// Every source failed; the built-in seed list is in use.
    Seed,
}

impl DirectoryOrigin {
    pub fn label(&self) -> String {
        match self {
            Self::Empty => "not loaded".to_string(),
            Self::Source { name } => name.clone(),
            Self::Seed => "built-in stations".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Contents {
    stations: Vec<Station>,
    origin: DirectoryOrigin,
}

/// Shared, cheaply cloneable handle to the in-memory station list.
#[derive(Debug, Clone, Default)]
pub struct Directory {
    contents: Arc<RwLock<Contents>>,
    loading: Arc<AtomicBool>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    pub async fn stations(&self) -> Vec<Station> {
        self.contents.read().await.stations.clone()
    }

    pub async fn origin(&self) -> DirectoryOrigin {
        self.contents.read().await.origin.clone()
    }

    pub async fn len(&self) -> usize {
        self.contents.read().await.stations.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// First station carrying `id` (identifiers are not guaranteed unique).
    pub async fn find(&self, id: &str) -> Option<Station> {
        self.contents
            .read()
            .await
            .stations
            .iter()
            .find(|s| s.id == id)
            .cloned()
    }

    async fn replace(&self, stations: Vec<Station>, origin: DirectoryOrigin) {
        let mut contents = self.contents.write().await;
        contents.stations = stations;
        contents.origin = origin;
    }
}

/// Raises the loading flag for as long as it lives.
struct LoadingGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> LoadingGuard<'a> {
    fn engage(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self { flag }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

// ── sources ───────────────────────────────────────────────────────────────────

/// One step of the load cascade.
#[async_trait]
pub trait StationSource: Send + Sync {
    /// Short name used in logs and in [`DirectoryOrigin::Source`].
    fn name(&self) -> &str;

    async fn fetch(&self) -> Result<Vec<Station>, DirectoryError>;
}

/// Which radio-browser query a source issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioBrowserQuery {
    /// `/json/stations/bycountrycodeexact/{cc}?limit=N&order=random`
    ByCountryCodeExact,
    /// `/json/stations/search?limit=N&countrycode={cc}&order=random`
    Search,
}

/// A radio-browser.info mirror.
pub struct RadioBrowserSource {
    name: String,
    base_url: String,
    query: RadioBrowserQuery,
    country_code: String,
    limit: u32,
    origin: Option<HeaderValue>,
    client: reqwest::Client,
}

impl RadioBrowserSource {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        query: RadioBrowserQuery,
        country_code: impl Into<String>,
        limit: u32,
        client: reqwest::Client,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            query,
            country_code: country_code.into(),
            limit,
            origin: None,
            client,
        }
    }

    /// Send an `Origin` header with every request.
    pub fn with_origin(mut self, origin: &str) -> Result<Self, DirectoryError> {
        let value = HeaderValue::from_str(origin)
            .map_err(|e| DirectoryError::Config(format!("origin {:?}: {}", origin, e)))?;
        self.origin = Some(value);
        Ok(self)
    }

    fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        match self.query {
            RadioBrowserQuery::ByCountryCodeExact => format!(
                "{}/json/stations/bycountrycodeexact/{}",
                base, self.country_code
            ),
            RadioBrowserQuery::Search => format!("{}/json/stations/search", base),
        }
    }

    fn query_params(&self) -> Vec<(&'static str, String)> {
        match self.query {
            RadioBrowserQuery::ByCountryCodeExact => vec![
                ("limit", self.limit.to_string()),
                ("order", "random".to_string()),
            ],
            RadioBrowserQuery::Search => vec![
                ("limit", self.limit.to_string()),
                ("countrycode", self.country_code.clone()),
                ("order", "random".to_string()),
            ],
        }
    }
}

#[async_trait]
impl StationSource for RadioBrowserSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<Vec<Station>, DirectoryError> {
        let mut request = self
            .client
            .get(self.endpoint())
            .query(&self.query_params());
        if let Some(origin) = &self.origin {
            request = request.header(ORIGIN, origin.clone());
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(DirectoryError::Status(response.status()));
        }
        let body = response.bytes().await?;
        let raw: Vec<RawStation> = serde_json::from_slice(&body)?;
        Ok(normalize_all(raw))
    }
}

// ── loader ────────────────────────────────────────────────────────────────────

/// A source that failed during a load, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFailure {
    pub source_name: String,
    pub error: String,
}

/// Summary of one completed load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadReport {
    pub origin: DirectoryOrigin,
    pub count: usize,
    pub failures: Vec<SourceFailure>,
}

pub struct DirectoryLoader {
    sources: Vec<Box<dyn StationSource>>,
}

impl DirectoryLoader {
    pub fn new(sources: Vec<Box<dyn StationSource>>) -> Self {
        Self { sources }
    }

    /// Primary mirror (with `Origin` header) followed by the fallback mirror.
    pub fn from_config(config: &DirectoryConfig) -> Result<Self, DirectoryError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        let primary = RadioBrowserSource::new(
            "primary",
            config.primary_url.clone(),
            RadioBrowserQuery::ByCountryCodeExact,
            config.country_code.clone(),
            config.limit,
            client.clone(),
        )
        .with_origin(&config.origin)?;

        let fallback = RadioBrowserSource::new(
            "fallback",
            config.fallback_url.clone(),
            RadioBrowserQuery::Search,
            config.country_code.clone(),
            config.limit,
            client,
        );

        Ok(Self::new(vec![Box::new(primary), Box::new(fallback)]))
    }

    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }

    /// Run the cascade and replace `directory` with its result.
    pub async fn load(&self, directory: &Directory) -> LoadReport {
        self.load_notifying(directory, || {}).await
    }

    /// Like [`load`](Self::load), calling `started` once the loading flag is
    /// raised and before the first source is tried.
    pub async fn load_notifying<F>(&self, directory: &Directory, started: F) -> LoadReport
    where
        F: FnOnce() + Send,
    {
        let _loading = LoadingGuard::engage(&directory.loading);
        started();

        let mut failures = Vec::new();
        for source in &self.sources {
            match source.fetch().await {
                Ok(stations) => {
                    info!(
                        "Loaded {} stations from {} source",
                        stations.len(),
                        source.name()
                    );
                    let origin = DirectoryOrigin::Source {
                        name: source.name().to_string(),
                    };
                    let count = stations.len();
                    directory.replace(stations, origin.clone()).await;
                    return LoadReport {
                        origin,
                        count,
                        failures,
                    };
                }
                Err(e) => {
                    warn!("Station source '{}' failed: {}", source.name(), e);
                    failures.push(SourceFailure {
                        source_name: source.name().to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        warn!("All station sources failed, using built-in stations");
        let stations = seed_stations();
        let count = stations.len();
        directory.replace(stations, DirectoryOrigin::Seed).await;
        LoadReport {
            origin: DirectoryOrigin::Seed,
            count,
            failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Canned source that records the loading flag it saw while fetching.
    struct Canned {
        name: &'static str,
        result: Mutex<Option<Result<Vec<Station>, DirectoryError>>>,
        directory: Directory,
        saw_loading: Arc<Mutex<Option<bool>>>,
    }

    impl Canned {
        fn new(
            name: &'static str,
            result: Result<Vec<Station>, DirectoryError>,
            directory: &Directory,
        ) -> (Self, Arc<Mutex<Option<bool>>>) {
            let saw_loading = Arc::new(Mutex::new(None));
            (
                Self {
                    name,
                    result: Mutex::new(Some(result)),
                    directory: directory.clone(),
                    saw_loading: saw_loading.clone(),
                },
                saw_loading,
            )
        }
    }

    #[async_trait]
    impl StationSource for Canned {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch(&self) -> Result<Vec<Station>, DirectoryError> {
            *self.saw_loading.lock().unwrap() = Some(self.directory.is_loading());
            self.result
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(DirectoryError::Config("fetched twice".into())))
        }
    }

    fn station(id: &str) -> Station {
        Station {
            id: id.to_string(),
            name: format!("Station {}", id),
            url_resolved: format!("https://example.org/{}", id),
            ..Station::default()
        }
    }

    fn failed() -> Result<Vec<Station>, DirectoryError> {
        Err(DirectoryError::Status(reqwest::StatusCode::BAD_GATEWAY))
    }

    #[tokio::test]
    async fn test_primary_success_skips_fallback() {
        let directory = Directory::new();
        let (primary, primary_saw) = Canned::new("primary", Ok(vec![station("a")]), &directory);
        let (fallback, fallback_saw) = Canned::new("fallback", Ok(vec![station("b")]), &directory);
        let loader = DirectoryLoader::new(vec![Box::new(primary), Box::new(fallback)]);

        assert!(!directory.is_loading());
        let report = loader.load(&directory).await;
        assert!(!directory.is_loading());

        assert_eq!(*primary_saw.lock().unwrap(), Some(true));
        assert_eq!(*fallback_saw.lock().unwrap(), None);
        assert_eq!(
            report.origin,
            DirectoryOrigin::Source {
                name: "primary".into()
            }
        );
        assert!(report.failures.is_empty());
        let ids: Vec<String> = directory.stations().await.into_iter().map(|s| s.id).collect();
        assert_eq!(ids, ["a"]);
    }

    #[tokio::test]
    async fn test_fallback_used_after_primary_failure() {
        let directory = Directory::new();
        let (primary, _) = Canned::new("primary", failed(), &directory);
        let (fallback, fallback_saw) =
            Canned::new("fallback", Ok(vec![station("b"), station("c")]), &directory);
        let loader = DirectoryLoader::new(vec![Box::new(primary), Box::new(fallback)]);

        let report = loader.load(&directory).await;

        assert_eq!(*fallback_saw.lock().unwrap(), Some(true));
        assert!(!directory.is_loading());
        assert_eq!(report.count, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].source_name, "primary");
        let ids: Vec<String> = directory.stations().await.into_iter().map(|s| s.id).collect();
        assert_eq!(ids, ["b", "c"]);
    }

    #[tokio::test]
    async fn test_seed_list_when_everything_fails() {
        let directory = Directory::new();
        let (primary, _) = Canned::new("primary", failed(), &directory);
        let (fallback, fallback_saw) = Canned::new("fallback", failed(), &directory);
        let loader = DirectoryLoader::new(vec![Box::new(primary), Box::new(fallback)]);

        let report = loader.load(&directory).await;

        assert_eq!(*fallback_saw.lock().unwrap(), Some(true));
        assert!(!directory.is_loading());
        assert_eq!(report.origin, DirectoryOrigin::Seed);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(directory.stations().await, seed_stations());
        assert_eq!(directory.origin().await, DirectoryOrigin::Seed);
    }

    #[tokio::test]
    async fn test_empty_success_is_accepted_wholesale() {
        let directory = Directory::new();
        let (primary, _) = Canned::new("primary", Ok(Vec::new()), &directory);
        let (fallback, fallback_saw) = Canned::new("fallback", Ok(vec![station("b")]), &directory);
        let loader = DirectoryLoader::new(vec![Box::new(primary), Box::new(fallback)]);

        let report = loader.load(&directory).await;

        assert_eq!(report.count, 0);
        assert!(directory.is_empty().await);
        assert_eq!(*fallback_saw.lock().unwrap(), None);
    }

    #[tokio::test]
    async fn test_reload_replaces_not_merges() {
        let directory = Directory::new();
        let (first, _) = Canned::new("primary", Ok(vec![station("a"), station("b")]), &directory);
        DirectoryLoader::new(vec![Box::new(first)])
            .load(&directory)
            .await;
        assert_eq!(directory.len().await, 2);

        let (second, _) = Canned::new("primary", failed(), &directory);
        DirectoryLoader::new(vec![Box::new(second)])
            .load(&directory)
            .await;
        assert_eq!(directory.stations().await, seed_stations());
    }

    #[tokio::test]
    async fn test_started_hook_sees_loading_flag() {
        let directory = Directory::new();
        let (primary, _) = Canned::new("primary", Ok(vec![station("a")]), &directory);
        let loader = DirectoryLoader::new(vec![Box::new(primary)]);

        let seen = Arc::new(Mutex::new(None));
        let hook_seen = seen.clone();
        let hook_dir = directory.clone();
        loader
            .load_notifying(&directory, move || {
                *hook_seen.lock().unwrap() = Some(hook_dir.is_loading());
            })
            .await;

        assert_eq!(*seen.lock().unwrap(), Some(true));
        assert!(!directory.is_loading());
    }

    #[test]
    fn test_loading_guard_clears_on_drop() {
        let flag = AtomicBool::new(false);
        {
            let _guard = LoadingGuard::engage(&flag);
            assert!(flag.load(Ordering::SeqCst));
        }
        assert!(!flag.load(Ordering::SeqCst));
    }

    #[test]
    fn test_endpoints() {
        let client = reqwest::Client::new();
        let primary = RadioBrowserSource::new(
            "primary",
            "https://all.api.radio-browser.info/",
            RadioBrowserQuery::ByCountryCodeExact,
            "in",
            1300,
            client.clone(),
        );
        assert_eq!(
            primary.endpoint(),
            "https://all.api.radio-browser.info/json/stations/bycountrycodeexact/in"
        );
        let fallback = RadioBrowserSource::new(
            "fallback",
            "https://de1.api.radio-browser.info",
            RadioBrowserQuery::Search,
            "in",
            1300,
            client,
        );
        assert_eq!(
            fallback.endpoint(),
            "https://de1.api.radio-browser.info/json/stations/search"
        );
        assert!(fallback
            .query_params()
            .contains(&("countrycode", "in".to_string())));
    }
}
