// Tests for registration resolution through the cache

mod common;

use common::{FakeProvider, RDAP_BASE, create_test_cache, rdap_url};
use phishnet_core::RegistrationResolver;
use phishnet_core::registration::LookupOutcome;
use std::sync::Arc;
use std::time::Duration;

fn resolver(
    provider: Arc<FakeProvider>,
    cache: Arc<phishnet_core::RegistrationCache>,
) -> RegistrationResolver<Arc<FakeProvider>> {
    RegistrationResolver::new(provider, cache)
        .with_rdap_base(RDAP_BASE)
        .with_lookup_delay(Duration::ZERO)
        .with_timeout(Duration::from_secs(5))
}

// ============================================================================
// Cache Behaviour
// ============================================================================

#[tokio::test]
async fn test_resolve_twice_issues_one_lookup() {
    let (_temp_dir, cache) = create_test_cache();
    let provider = Arc::new(FakeProvider::new().registration(
        "example.com",
        "1995-08-14T04:00:00Z",
        "Example Registrar, Inc.",
    ));
    let resolver = resolver(provider.clone(), cache);

    let first = resolver.resolve("example.com").await.unwrap();
    let second = resolver.resolve("example.com").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(provider.calls(), 1);
    assert_eq!(resolver.lookups_performed(), 1);
    assert_eq!(first.registrar.as_deref(), Some("Example Registrar, Inc."));
    assert!(first.domain_age_days > 10_000);
}

#[tokio::test]
async fn test_resolve_normalizes_domain() {
    let (_temp_dir, cache) = create_test_cache();
    let provider = Arc::new(FakeProvider::new().registration(
        "example.com",
        "2000-01-01T00:00:00Z",
        "Registrar",
    ));
    let resolver = resolver(provider.clone(), cache.clone());

    let record = resolver.resolve("  Example.COM ").await.unwrap();
    assert_eq!(record.domain, "example.com");
    assert!(cache.get("example.com").unwrap().is_some());
    assert_eq!(provider.requests(), vec![rdap_url("example.com")]);
}

#[tokio::test]
async fn test_cached_record_is_served_without_lookup() {
    let (_temp_dir, cache) = create_test_cache();
    let mut seeded = phishnet_core::RegistrationRecord::unknown("old.com");
    seeded.domain_age_days = 42;
    cache.append(&seeded).unwrap();

    let provider = Arc::new(FakeProvider::new());
    let resolver = resolver(provider.clone(), cache);

    assert_eq!(resolver.resolve("old.com").await.unwrap(), seeded);
    assert_eq!(provider.calls(), 0);
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_failed_lookup_is_cached_as_unknown() {
    let (_temp_dir, cache) = create_test_cache();
    let provider = Arc::new(FakeProvider::new());
    let resolver = resolver(provider.clone(), cache.clone());

    let record = resolver.resolve("nowhere.tk").await.unwrap();
    assert_eq!(record.domain_age_days, -1);
    assert!(record.registrar.is_none());
    assert!(record.creation_date.is_none());

    // The failure is remembered, so the domain is not queried again.
    let again = resolver.resolve("nowhere.tk").await.unwrap();
    assert_eq!(again, record);
    assert_eq!(provider.calls(), 1);
    assert_eq!(cache.len().unwrap(), 1);
}

#[tokio::test]
async fn test_missing_creation_date_yields_unknown_age() {
    let (_temp_dir, cache) = create_test_cache();
    let body = r#"{"ldhName": "example.com", "events": [{"eventAction": "last changed", "eventDate": "2020-01-01T00:00:00Z"}]}"#;
    let provider = Arc::new(FakeProvider::new().page(&rdap_url("example.com"), 200, body));
    let resolver = resolver(provider, cache);

    let record = resolver.resolve("example.com").await.unwrap();
    assert_eq!(record.domain_age_days, -1);
    assert!(record.creation_date.is_none());
}

#[tokio::test]
async fn test_not_found_status_is_failure() {
    let (_temp_dir, cache) = create_test_cache();
    let provider = Arc::new(FakeProvider::new().page(&rdap_url("gone.com"), 404, "{}"));
    let resolver = resolver(provider, cache);

    match resolver.lookup("gone.com").await {
        LookupOutcome::Failed(error) => assert!(error.contains("404")),
        other => panic!("expected failure, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_lookup_timeout_is_failure() {
    let (_temp_dir, cache) = create_test_cache();
    let provider = Arc::new(
        FakeProvider::new()
            .registration("slow.com", "2000-01-01T00:00:00Z", "Registrar")
            .delay(&rdap_url("slow.com"), Duration::from_secs(60)),
    );
    let resolver = resolver(provider, cache).with_timeout(Duration::from_secs(2));

    let record = resolver.resolve("slow.com").await.unwrap();
    assert_eq!(record.domain_age_days, -1);
}

#[tokio::test]
async fn test_empty_domain_skips_lookup() {
    let (_temp_dir, cache) = create_test_cache();
    let provider = Arc::new(FakeProvider::new());
    let resolver = resolver(provider.clone(), cache.clone());

    let records = resolver
        .resolve_many(&["".to_string(), "   ".to_string()])
        .await
        .unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.domain_age_days == -1));
    assert_eq!(provider.calls(), 0);
    assert!(cache.is_empty().unwrap());
}

// ============================================================================
// Concurrency and Pacing
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_resolution_of_one_domain_looks_up_once() {
    let (_temp_dir, cache) = create_test_cache();
    let provider = Arc::new(
        FakeProvider::new()
            .registration("shared.com", "2010-01-01T00:00:00Z", "Registrar")
            .delay(&rdap_url("shared.com"), Duration::from_millis(50)),
    );
    let resolver = Arc::new(resolver(provider.clone(), cache.clone()));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let resolver = resolver.clone();
        handles.push(tokio::spawn(async move {
            resolver.resolve("shared.com").await.unwrap()
        }));
    }

    let mut records = Vec::new();
    for handle in handles {
        records.push(handle.await.unwrap());
    }

    assert!(records.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(provider.calls(), 1);
    assert_eq!(cache.len().unwrap(), 1);
    assert_eq!(resolver.locked_domains(), 0);
}

#[tokio::test]
async fn test_domain_locks_released_after_resolution() {
    let (_temp_dir, cache) = create_test_cache();
    let provider = Arc::new(
        FakeProvider::new()
            .registration("a.com", "2001-01-01T00:00:00Z", "A")
            .registration("b.com", "2002-01-01T00:00:00Z", "B"),
    );
    let resolver = resolver(provider, cache).with_concurrency(4);

    let domains: Vec<String> = ["a.com", "b.com", "missing.com", "a.com"]
        .iter()
        .map(|d| d.to_string())
        .collect();
    resolver.resolve_many(&domains).await.unwrap();

    assert_eq!(resolver.lookups_performed(), 3);
    assert_eq!(resolver.locked_domains(), 0);
}

#[tokio::test]
async fn test_resolve_many_preserves_order_and_dedups_lookups() {
    let (_temp_dir, cache) = create_test_cache();
    let provider = Arc::new(
        FakeProvider::new()
            .registration("a.com", "2001-01-01T00:00:00Z", "A")
            .registration("b.com", "2002-01-01T00:00:00Z", "B"),
    );
    let resolver = resolver(provider.clone(), cache).with_concurrency(1);

    let domains = vec!["b.com".to_string(), "a.com".to_string(), "b.com".to_string()];
    let records = resolver.resolve_many(&domains).await.unwrap();

    let resolved: Vec<&str> = records.iter().map(|r| r.domain.as_str()).collect();
    assert_eq!(resolved, vec!["b.com", "a.com", "b.com"]);
    assert_eq!(provider.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_outbound_lookups_are_paced() {
    let (_temp_dir, cache) = create_test_cache();
    let provider = Arc::new(
        FakeProvider::new()
            .registration("a.com", "2001-01-01T00:00:00Z", "A")
            .registration("b.com", "2002-01-01T00:00:00Z", "B")
            .registration("c.com", "2003-01-01T00:00:00Z", "C"),
    );
    let resolver = resolver(provider.clone(), cache).with_lookup_delay(Duration::from_secs(1));

    let start = tokio::time::Instant::now();
    let domains = vec!["a.com".to_string(), "b.com".to_string(), "c.com".to_string()];
    resolver.resolve_many(&domains).await.unwrap();

    // First lookup goes immediately, the other two wait a second each.
    assert!(start.elapsed() >= Duration::from_secs(2));
    assert_eq!(provider.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_cache_hits_are_not_paced() {
    let (_temp_dir, cache) = create_test_cache();
    for domain in ["a.com", "b.com", "c.com"] {
        cache
            .append(&phishnet_core::RegistrationRecord::unknown(domain))
            .unwrap();
    }
    let provider = Arc::new(FakeProvider::new());
    let resolver = resolver(provider, cache).with_lookup_delay(Duration::from_secs(1));

    let start = tokio::time::Instant::now();
    let domains = vec!["a.com".to_string(), "b.com".to_string(), "c.com".to_string()];
    resolver.resolve_many(&domains).await.unwrap();

    assert!(start.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn test_resolved_record_joins_padded_hostname() {
    use phishnet_core::LexicalAnalyzer;
    use phishnet_core::dataset::join_features;
    use phishnet_core::lexical::extract_domain;
    use std::collections::HashMap;

    let (_temp_dir, cache) = create_test_cache();
    let provider = Arc::new(FakeProvider::new().registration(
        "example.com",
        "2000-01-01T00:00:00Z",
        "Registrar",
    ));
    let resolver = resolver(provider, cache);

    let url = "http:// Example.com/login";
    let record = resolver.resolve(&extract_domain(url)).await.unwrap();
    assert_eq!(record.domain, "example.com");

    let registrations = HashMap::from([(record.domain.clone(), record)]);
    let lexical = LexicalAnalyzer::default().analyze_bulk(&[url.to_string()]);
    let joined = join_features(lexical, &HashMap::new(), &registrations);

    let row = joined[0].clone().into_row(phishnet_core::Label::Phishing);
    assert!(row.domain_age_days > 0);
    assert_eq!(row.registrar.as_deref(), Some("Registrar"));
}
