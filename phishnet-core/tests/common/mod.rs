#![allow(dead_code)]

use phishnet_core::RegistrationCache;
use phishnet_scanner::error::Result;
use phishnet_scanner::{FetchProvider, FetchResponse, ScanError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub const RDAP_BASE: &str = "http://rdap.test";

/// In-memory provider: canned responses per URL, optional delays, and a log
/// of every request made.
#[derive(Default)]
pub struct FakeProvider {
    responses: HashMap<String, (u16, String)>,
    delays: HashMap<String, Duration>,
    requests: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, status: u16, body: &str) -> Self {
        self.responses
            .insert(url.to_string(), (status, body.to_string()));
        self
    }

    pub fn delay(mut self, url: &str, delay: Duration) -> Self {
        self.delays.insert(url.to_string(), delay);
        self
    }

    /// Registers an RDAP answer for `domain` under [`RDAP_BASE`].
    pub fn registration(self, domain: &str, created: &str, registrar: &str) -> Self {
        let url = format!("{}/domain/{}", RDAP_BASE, domain);
        let body = rdap_body(domain, created, registrar);
        self.page(&url, 200, &body)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_for(&self, url: &str) -> usize {
        self.requests().iter().filter(|r| *r == url).count()
    }
}

impl FetchProvider for FakeProvider {
    async fn fetch(&self, url: &str, _timeout: Duration) -> Result<FetchResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(url.to_string());

        if let Some(delay) = self.delays.get(url) {
            tokio::time::sleep(*delay).await;
        }

        match self.responses.get(url) {
            Some((status, body)) => Ok(FetchResponse {
                url: url.to_string(),
                status_code: *status,
                content_type: Some("text/html".to_string()),
                body: body.clone(),
            }),
            None => Err(ScanError::Other(format!("no route to {}", url))),
        }
    }
}

pub fn rdap_body(domain: &str, created: &str, registrar: &str) -> String {
    format!(
        r#"{{
            "objectClassName": "domain",
            "ldhName": "{domain}",
            "events": [
                {{"eventAction": "registration", "eventDate": "{created}"}},
                {{"eventAction": "expiration", "eventDate": "2030-01-01T00:00:00Z"}}
            ],
            "entities": [
                {{
                    "roles": ["registrar"],
                    "vcardArray": ["vcard", [["version", {{}}, "text", "4.0"], ["fn", {{}}, "text", "{registrar}"]]]
                }}
            ]
        }}"#
    )
}

pub fn rdap_url(domain: &str) -> String {
    format!("{}/domain/{}", RDAP_BASE, domain)
}

pub fn create_test_cache() -> (TempDir, Arc<RegistrationCache>) {
    let temp_dir = TempDir::new().unwrap();
    let cache_path = temp_dir.path().join("registration_cache.db");
    let cache = RegistrationCache::open(&cache_path).unwrap();
    (temp_dir, Arc::new(cache))
}
