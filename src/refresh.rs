//! Periodic and on-demand refresh of both reputation stores.
//!
//! The coordinator is a single task owning a trigger queue: a manual
//! refresh is a message, not a call into shared state. One task runs every
//! cycle, so refreshes for a source never overlap, and pending triggers are
//! drained before a cycle starts so a burst coalesces into one refresh.

use crate::cache;
use crate::config::{Config, IpSourceConfig};
use crate::email_store::{EmailSnapshot, EmailStore};
use crate::error::{FetchError, RefreshError};
use crate::fetcher::SourceFetcher;
use crate::ip_store::{self, IpStore};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::interval;

/// Source name used for the disposable-domain list in outcomes and logs.
pub const EMAIL_SOURCE_NAME: &str = "disposable_domains";

/// What a refresh cycle did for one source. Never silently dropped; every
/// outcome is logged.
#[derive(Debug)]
pub enum RefreshOutcome {
    /// New data was fetched, parsed and published.
    Applied { source: String, entries: usize },
    /// Fetch or parse failed; stale data was retained instead.
    Retained {
        source: String,
        error: RefreshError,
        fallback: Fallback,
    },
}

/// Which stale data a failed refresh fell back to.
#[derive(Debug)]
pub enum Fallback {
    /// A live in-memory snapshot already existed and was kept.
    PreviousSnapshot,
    /// No live snapshot; the on-disk cache file was loaded instead.
    CacheFile { entries: usize },
    /// Neither live data nor a usable cache; the source stays empty and
    /// every lookup against it misses.
    Empty,
}

impl RefreshOutcome {
    pub fn source(&self) -> &str {
        match self {
            RefreshOutcome::Applied { source, .. } => source,
            RefreshOutcome::Retained { source, .. } => source,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, RefreshOutcome::Applied { .. })
    }

    fn log(&self) {
        match self {
            RefreshOutcome::Applied { source, entries } => {
                log::info!("Synced {entries} entries for '{source}'");
            }
            RefreshOutcome::Retained {
                source,
                error,
                fallback,
            } => match fallback {
                Fallback::PreviousSnapshot => {
                    log::warn!("Refresh of '{source}' failed ({error}); keeping previous snapshot");
                }
                Fallback::CacheFile { entries } => {
                    log::warn!(
                        "Refresh of '{source}' failed ({error}); loaded {entries} entries from cache"
                    );
                }
                Fallback::Empty => {
                    log::warn!(
                        "Refresh of '{source}' failed ({error}); no cache available, source is empty"
                    );
                }
            },
        }
    }
}

/// Manual trigger entry point. Cloneable; triggers sent while a cycle is
/// running are coalesced into one follow-up cycle.
#[derive(Debug, Clone)]
pub struct RefreshHandle {
    sender: mpsc::UnboundedSender<()>,
}

impl RefreshHandle {
    pub fn trigger(&self) {
        if self.sender.send(()).is_err() {
            log::warn!("Refresh coordinator is gone, manual trigger dropped");
        }
    }
}

pub struct RefreshCoordinator {
    config: Arc<Config>,
    fetcher: SourceFetcher,
    email_store: Arc<EmailStore>,
    ip_store: Arc<IpStore>,
    receiver: mpsc::UnboundedReceiver<()>,
}

impl RefreshCoordinator {
    pub fn new(
        config: Arc<Config>,
        email_store: Arc<EmailStore>,
        ip_store: Arc<IpStore>,
    ) -> (Self, RefreshHandle) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                config,
                fetcher: SourceFetcher::new(),
                email_store,
                ip_store,
                receiver,
            },
            RefreshHandle { sender },
        )
    }

    /// Load whatever cache files exist into stores that have no data yet.
    /// Returns the number of sources populated.
    pub async fn warm_start(&self) -> usize {
        let mut loaded = 0;

        if self.email_store.snapshot().is_empty() {
            if let Ok(entries) = cache::read_entries(&self.config.email_cache_path()).await {
                if !entries.is_empty() {
                    log::info!(
                        "Warm start: {} disposable domains from cache",
                        entries.len()
                    );
                    self.email_store
                        .publish(EmailSnapshot::from_entries(entries, None));
                    loaded += 1;
                }
            }
        }

        for source in &self.config.ip_sources {
            if self.ip_store.snapshot().has_source(&source.name) {
                continue;
            }
            if let Ok(entries) = cache::read_entries(&self.config.ip_cache_path(&source.name)).await
            {
                log::info!(
                    "Warm start: {} addresses for '{}' from cache",
                    entries.len(),
                    source.name
                );
                self.ip_store.publish_source(&source.name, entries, None);
                loaded += 1;
            }
        }

        loaded
    }

    /// Refresh every configured source once. Sources are independent: one
    /// failure never blocks or invalidates another's refresh.
    pub async fn refresh_all(&self, origin: &str) -> Vec<RefreshOutcome> {
        log::info!("Starting {origin} refresh of all reputation sources");

        let mut outcomes = Vec::with_capacity(1 + self.config.ip_sources.len());
        outcomes.push(self.refresh_email().await);
        for source in &self.config.ip_sources {
            outcomes.push(self.refresh_ip_source(source).await);
        }

        for outcome in &outcomes {
            outcome.log();
        }
        outcomes
    }

    async fn refresh_email(&self) -> RefreshOutcome {
        let fetched = self
            .fetcher
            .fetch(
                EMAIL_SOURCE_NAME,
                &self.config.email_source.url,
                self.config.email_source.timeout(),
            )
            .await;
        self.apply_email_result(fetched).await
    }

    async fn refresh_ip_source(&self, source: &IpSourceConfig) -> RefreshOutcome {
        let fetched = self
            .fetcher
            .fetch(&source.name, &source.url, source.timeout())
            .await;
        self.apply_ip_result(&source.name, fetched).await
    }

    /// Apply a fetch result for the email source: publish + persist on
    /// success, retain-with-fallback on failure.
    async fn apply_email_result(&self, fetched: Result<Vec<u8>, FetchError>) -> RefreshOutcome {
        let parsed = fetched.map_err(RefreshError::from).and_then(|raw| {
            EmailSnapshot::parse(EMAIL_SOURCE_NAME, &raw, Utc::now()).map_err(RefreshError::from)
        });

        match parsed {
            Ok(snapshot) => {
                let entries = snapshot.len();
                // Best effort: a failed cache write never blocks the
                // in-memory snapshot.
                if let Err(e) =
                    cache::write_entries(&self.config.email_cache_path(), snapshot.domains()).await
                {
                    log::warn!("Failed to persist '{EMAIL_SOURCE_NAME}' cache: {e}");
                }
                self.email_store.publish(snapshot);
                RefreshOutcome::Applied {
                    source: EMAIL_SOURCE_NAME.to_string(),
                    entries,
                }
            }
            Err(error) => {
                let fallback = if !self.email_store.snapshot().is_empty() {
                    Fallback::PreviousSnapshot
                } else {
                    match cache::read_entries(&self.config.email_cache_path()).await {
                        Ok(entries) if !entries.is_empty() => {
                            let count = entries.len();
                            self.email_store
                                .publish(EmailSnapshot::from_entries(entries, None));
                            Fallback::CacheFile { entries: count }
                        }
                        _ => Fallback::Empty,
                    }
                };
                RefreshOutcome::Retained {
                    source: EMAIL_SOURCE_NAME.to_string(),
                    error,
                    fallback,
                }
            }
        }
    }

    /// Apply a fetch result for one IP source.
    async fn apply_ip_result(
        &self,
        source_name: &str,
        fetched: Result<Vec<u8>, FetchError>,
    ) -> RefreshOutcome {
        let parsed = fetched.map_err(RefreshError::from).and_then(|raw| {
            ip_store::parse_source(source_name, &raw).map_err(RefreshError::from)
        });

        match parsed {
            Ok(addrs) => {
                let entries = addrs.len();
                if let Err(e) =
                    cache::write_entries(&self.config.ip_cache_path(source_name), &addrs).await
                {
                    log::warn!("Failed to persist '{source_name}' cache: {e}");
                }
                self.ip_store
                    .publish_source(source_name, addrs, Some(Utc::now()));
                RefreshOutcome::Applied {
                    source: source_name.to_string(),
                    entries,
                }
            }
            Err(error) => {
                let fallback = if self.ip_store.snapshot().has_source(source_name) {
                    Fallback::PreviousSnapshot
                } else {
                    match cache::read_entries(&self.config.ip_cache_path(source_name)).await {
                        Ok(entries) => {
                            let count = entries.len();
                            self.ip_store.publish_source(source_name, entries, None);
                            Fallback::CacheFile { entries: count }
                        }
                        Err(_) => Fallback::Empty,
                    }
                };
                RefreshOutcome::Retained {
                    source: source_name.to_string(),
                    error,
                    fallback,
                }
            }
        }
    }

    /// Warm-start from cache, run an initial sync, then serve the periodic
    /// schedule and manual triggers until the handle side is dropped.
    pub async fn run(mut self) {
        self.warm_start().await;
        self.refresh_all("startup").await;

        let mut ticker = interval(self.config.sync_interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // An interval's first tick completes immediately; the startup sync
        // already covered it.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.refresh_all("scheduled").await;
                }
                msg = self.receiver.recv() => match msg {
                    Some(()) => {
                        // Coalesce triggers that piled up while we were busy
                        while self.receiver.try_recv().is_ok() {}
                        self.refresh_all("manual").await;
                    }
                    None => {
                        log::info!("All refresh handles dropped, stopping coordinator");
                        break;
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn test_setup(data_dir: &Path) -> (RefreshCoordinator, Arc<EmailStore>, Arc<IpStore>) {
        let config = Arc::new(Config {
            data_dir: data_dir.to_path_buf(),
            ..Config::default()
        });
        let email_store = Arc::new(EmailStore::new());
        let ip_store = Arc::new(IpStore::new());
        let (coordinator, _handle) =
            RefreshCoordinator::new(config, Arc::clone(&email_store), Arc::clone(&ip_store));
        (coordinator, email_store, ip_store)
    }

    #[tokio::test]
    async fn test_successful_refresh_publishes_and_persists() {
        let dir = TempDir::new().unwrap();
        let (coordinator, email_store, _) = test_setup(dir.path());

        let outcome = coordinator
            .apply_email_result(Ok(b"mailinator.com\ntempmail.com\n".to_vec()))
            .await;

        assert!(outcome.is_applied());
        assert_eq!(email_store.domain_count(), 2);
        assert!(email_store.last_updated().is_some());

        let cached = cache::read_entries(&dir.path().join("disposable_domains.txt"))
            .await
            .unwrap();
        assert_eq!(cached.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_previous_snapshot() {
        let dir = TempDir::new().unwrap();
        let (coordinator, email_store, _) = test_setup(dir.path());

        coordinator
            .apply_email_result(Ok(b"mailinator.com\n".to_vec()))
            .await;
        let before = email_store.evaluate("x@mailinator.com").unwrap();

        let outcome = coordinator
            .apply_email_result(Err(FetchError::Timeout))
            .await;

        match outcome {
            RefreshOutcome::Retained {
                fallback: Fallback::PreviousSnapshot,
                ..
            } => {}
            other => panic!("Expected retained-previous, got {other:?}"),
        }
        assert_eq!(email_store.evaluate("x@mailinator.com").unwrap(), before);
    }

    #[tokio::test]
    async fn test_cold_start_falls_back_to_cache_file() {
        let dir = TempDir::new().unwrap();

        // A previous process run left a cache file behind
        {
            let (coordinator, _, _) = test_setup(dir.path());
            coordinator
                .apply_email_result(Ok(b"mailinator.com\n".to_vec()))
                .await;
        }

        let (coordinator, email_store, _) = test_setup(dir.path());
        assert_eq!(email_store.domain_count(), 0);

        let outcome = coordinator
            .apply_email_result(Err(FetchError::HttpStatus(503)))
            .await;

        match outcome {
            RefreshOutcome::Retained {
                fallback: Fallback::CacheFile { entries: 1 },
                ..
            } => {}
            other => panic!("Expected cache-file fallback, got {other:?}"),
        }
        assert!(email_store.evaluate("x@mailinator.com").unwrap().disposable);
        // Cache warm loads carry no retrieval timestamp
        assert!(email_store.last_updated().is_none());
    }

    #[tokio::test]
    async fn test_no_data_no_cache_stays_empty() {
        let dir = TempDir::new().unwrap();
        let (coordinator, email_store, _) = test_setup(dir.path());

        let outcome = coordinator
            .apply_email_result(Err(FetchError::Timeout))
            .await;

        match outcome {
            RefreshOutcome::Retained {
                fallback: Fallback::Empty,
                ..
            } => {}
            other => panic!("Expected empty fallback, got {other:?}"),
        }
        // Degrades to all-clear rather than failing
        let finding = email_store.evaluate("x@mailinator.com").unwrap();
        assert!(!finding.disposable);
    }

    #[tokio::test]
    async fn test_parse_failure_treated_like_fetch_failure() {
        let dir = TempDir::new().unwrap();
        let (coordinator, email_store, _) = test_setup(dir.path());

        coordinator
            .apply_email_result(Ok(b"mailinator.com\n".to_vec()))
            .await;

        let outcome = coordinator
            .apply_email_result(Ok(vec![0xff, 0xfe, 0x00]))
            .await;

        match outcome {
            RefreshOutcome::Retained {
                error: RefreshError::Parse(_),
                fallback: Fallback::PreviousSnapshot,
                ..
            } => {}
            other => panic!("Expected retained-on-parse-failure, got {other:?}"),
        }
        assert_eq!(email_store.domain_count(), 1);
    }

    #[tokio::test]
    async fn test_ip_source_failure_is_isolated() {
        let dir = TempDir::new().unwrap();
        let (coordinator, _, ip_store) = test_setup(dir.path());

        let ok = coordinator
            .apply_ip_result("ipsum", Ok(b"1.2.3.4\n5.6.7.8\n".to_vec()))
            .await;
        let failed = coordinator
            .apply_ip_result("bruteforceblocker", Err(FetchError::Timeout))
            .await;

        assert!(ok.is_applied());
        assert!(!failed.is_applied());

        let finding = ip_store.evaluate("1.2.3.4").unwrap();
        assert_eq!(finding.sources, vec!["ipsum".to_string()]);
    }

    #[tokio::test]
    async fn test_ip_refresh_failure_keeps_previous_source_data() {
        let dir = TempDir::new().unwrap();
        let (coordinator, _, ip_store) = test_setup(dir.path());

        coordinator
            .apply_ip_result("ipsum", Ok(b"1.2.3.4\n".to_vec()))
            .await;
        coordinator
            .apply_ip_result("ipsum", Err(FetchError::Transport("reset".to_string())))
            .await;

        assert!(ip_store.evaluate("1.2.3.4").unwrap().blacklisted);
    }

    #[tokio::test]
    async fn test_warm_start_loads_both_caches() {
        let dir = TempDir::new().unwrap();

        {
            let (coordinator, _, _) = test_setup(dir.path());
            coordinator
                .apply_email_result(Ok(b"mailinator.com\n".to_vec()))
                .await;
            coordinator
                .apply_ip_result("ipsum", Ok(b"1.2.3.4\n".to_vec()))
                .await;
        }

        let (coordinator, email_store, ip_store) = test_setup(dir.path());
        let loaded = coordinator.warm_start().await;

        assert_eq!(loaded, 2);
        assert!(email_store.evaluate("x@mailinator.com").unwrap().disposable);
        assert!(ip_store.evaluate("1.2.3.4").unwrap().blacklisted);
    }

    #[tokio::test]
    async fn test_warm_start_without_cache_is_a_noop() {
        let dir = TempDir::new().unwrap();
        let (coordinator, email_store, _) = test_setup(dir.path());

        assert_eq!(coordinator.warm_start().await, 0);
        assert_eq!(email_store.domain_count(), 0);
    }

    #[tokio::test]
    async fn test_trigger_after_coordinator_drop_does_not_panic() {
        let dir = TempDir::new().unwrap();
        let config = Arc::new(Config {
            data_dir: dir.path().to_path_buf(),
            ..Config::default()
        });
        let (coordinator, handle) = RefreshCoordinator::new(
            config,
            Arc::new(EmailStore::new()),
            Arc::new(IpStore::new()),
        );
        drop(coordinator);
        handle.trigger();
    }
}
