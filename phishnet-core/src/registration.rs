use crate::data::RegistrationCache;
use crate::error::Result;
use crate::lexical::normalize_domain;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use phishnet_scanner::rdap::{self, DEFAULT_RDAP_BASE, RegistrationData};
use phishnet_scanner::{FetchProvider, ProgressCallback, ScanError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub const UNKNOWN_AGE: i64 = -1;
pub const DEFAULT_LOOKUP_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRecord {
    pub domain: String,
    pub domain_age_days: i64,
    pub registrar: Option<String>,
    pub creation_date: Option<DateTime<Utc>>,
    pub expiration_date: Option<DateTime<Utc>>,
}

impl RegistrationRecord {
    /// The record stored for a domain whose lookup failed.
    pub fn unknown(domain: &str) -> Self {
        Self {
            domain: domain.to_string(),
            domain_age_days: UNKNOWN_AGE,
            registrar: None,
            creation_date: None,
            expiration_date: None,
        }
    }

    pub fn from_lookup(domain: &str, data: RegistrationData, looked_up_at: DateTime<Utc>) -> Self {
        let domain_age_days = data
            .creation_date
            .map(|created| age_in_days(created, looked_up_at))
            .unwrap_or(UNKNOWN_AGE);

        Self {
            domain: domain.to_string(),
            domain_age_days,
            registrar: data.registrar,
            creation_date: data.creation_date,
            expiration_date: data.expiration_date,
        }
    }

    pub fn has_known_age(&self) -> bool {
        self.domain_age_days != UNKNOWN_AGE
    }
}

/// Whole days from `created` to `now`, floored.
pub fn age_in_days(created: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - created).num_seconds().div_euclid(86_400)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    Found(RegistrationData),
    Failed(String),
}

/// Resolves domains to registration records through the persistent cache.
///
/// Cache hits return immediately. Misses go out over RDAP, one at a time per
/// domain, and every outbound lookup (across all workers) waits for the
/// previous one by at least `lookup_delay`. Failed lookups are cached too.
pub struct RegistrationResolver<P> {
    provider: P,
    cache: Arc<RegistrationCache>,
    rdap_base: String,
    timeout: Duration,
    lookup_delay: Duration,
    concurrency: usize,
    progress_callback: Option<ProgressCallback>,
    last_lookup: Mutex<Option<Instant>>,
    domain_locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
    lookups: AtomicUsize,
}

impl<P: FetchProvider> RegistrationResolver<P> {
    pub fn new(provider: P, cache: Arc<RegistrationCache>) -> Self {
        Self {
            provider,
            cache,
            rdap_base: DEFAULT_RDAP_BASE.to_string(),
            timeout: DEFAULT_LOOKUP_TIMEOUT,
            lookup_delay: DEFAULT_LOOKUP_DELAY,
            concurrency: DEFAULT_CONCURRENCY,
            progress_callback: None,
            last_lookup: Mutex::new(None),
            domain_locks: StdMutex::new(HashMap::new()),
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn with_rdap_base(mut self, base: impl Into<String>) -> Self {
        self.rdap_base = base.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_lookup_delay(mut self, delay: Duration) -> Self {
        self.lookup_delay = delay;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn cache(&self) -> &RegistrationCache {
        &self.cache
    }

    /// Outbound lookups issued by this resolver so far.
    pub fn lookups_performed(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }

    /// Only cache errors surface here; lookup failures become an
    /// unknown-age record.
    pub async fn resolve(&self, domain: &str) -> Result<RegistrationRecord> {
        let domain = normalize_domain(domain);
        if domain.is_empty() {
            return Ok(RegistrationRecord::unknown(""));
        }

        if let Some(cached) = self.cache.get(&domain)? {
            debug!("Registration cache hit for {}", domain);
            self.report(&domain);
            return Ok(cached);
        }

        let lock = self.domain_lock(&domain);
        let guard = lock.lock().await;
        let result = self.resolve_locked(&domain).await;
        drop(guard);
        self.release_domain_lock(&domain, lock);
        result
    }

    /// Number of domains that currently have a lookup lock allocated.
    pub fn locked_domains(&self) -> usize {
        self.domain_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    async fn resolve_locked(&self, domain: &str) -> Result<RegistrationRecord> {
        // Another worker may have finished this domain while we waited.
        if let Some(cached) = self.cache.get(domain)? {
            debug!("Registration cache hit for {} after wait", domain);
            self.report(domain);
            return Ok(cached);
        }

        let record = match self.lookup(domain).await {
            LookupOutcome::Found(data) => RegistrationRecord::from_lookup(domain, data, Utc::now()),
            LookupOutcome::Failed(error) => {
                warn!("Failed to fetch registration data for {}: {}", domain, error);
                RegistrationRecord::unknown(domain)
            }
        };

        let stored = self.cache.append_if_absent(&record)?;
        self.report(domain);
        Ok(stored)
    }

    /// One record per input domain, same order.
    pub async fn resolve_many(&self, domains: &[String]) -> Result<Vec<RegistrationRecord>> {
        info!(
            "Resolving {} domains with {} workers ({:?} between lookups)",
            domains.len(),
            self.concurrency,
            self.lookup_delay
        );

        let records: Vec<RegistrationRecord> = stream::iter(domains)
            .map(|domain| self.resolve(domain))
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        info!(
            "Resolved {} domains with {} outbound lookups",
            records.len(),
            self.lookups_performed()
        );
        Ok(records)
    }

    /// A single RDAP query, paced against every other query from this resolver.
    pub async fn lookup(&self, domain: &str) -> LookupOutcome {
        self.pace().await;
        self.lookups.fetch_add(1, Ordering::Relaxed);

        let url = rdap::domain_url(&self.rdap_base, domain);
        debug!("Looking up registration for {} via {}", domain, url);

        match self.fetch_registration(&url).await {
            Ok(data) => LookupOutcome::Found(data),
            Err(e) => LookupOutcome::Failed(format!("{}: {}", e.kind(), e)),
        }
    }

    async fn fetch_registration(&self, url: &str) -> std::result::Result<RegistrationData, ScanError> {
        let response = tokio::time::timeout(self.timeout, self.provider.fetch(url, self.timeout))
            .await
            .map_err(|_| ScanError::Timeout(self.timeout))??;

        let response = response.error_for_status()?;
        rdap::registration_data_from_body(&response.body)
    }

    fn report(&self, domain: &str) {
        if let Some(ref callback) = self.progress_callback {
            callback(domain.to_string());
        }
    }

    async fn pace(&self) {
        let mut last_lookup = self.last_lookup.lock().await;
        if let Some(previous) = *last_lookup {
            tokio::time::sleep_until(previous + self.lookup_delay).await;
        }
        *last_lookup = Some(Instant::now());
    }

    fn domain_lock(&self, domain: &str) -> Arc<Mutex<()>> {
        let mut locks = self
            .domain_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks.entry(domain.to_string()).or_default().clone()
    }

    /// Drops the map entry once no other worker holds or waits on it. Clones
    /// are only handed out under the map lock, so the count cannot grow here.
    fn release_domain_lock(&self, domain: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self
            .domain_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // One reference in the map, one held by the caller.
        if Arc::strong_count(&lock) <= 2 {
            locks.remove(domain);
        }
    }
}
