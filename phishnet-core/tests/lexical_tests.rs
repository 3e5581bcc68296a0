// Tests for lexical URL features

use phishnet_core::LexicalAnalyzer;
use phishnet_core::lexical::{analyze, extract_domain};

fn defaults() -> LexicalAnalyzer {
    LexicalAnalyzer::default()
}

// ============================================================================
// Hostname Features
// ============================================================================

#[test]
fn test_ip_address_detection() {
    let analyzer = defaults();
    assert!(analyzer.analyze("http://1.2.3.4/path").uses_ip_address);
    assert!(analyzer.analyze("http://192.168.1.1:8080/login").uses_ip_address);
    assert!(analyzer.analyze("http://999.999.999.999/").uses_ip_address);
    assert!(!analyzer.analyze("http://example.com").uses_ip_address);
    assert!(!analyzer.analyze("http://1.2.3.4.example.com").uses_ip_address);
}

#[test]
fn test_ip_in_path_is_not_ip_host() {
    let features = defaults().analyze("http://example.com/1.2.3.4");
    assert!(!features.uses_ip_address);
}

#[test]
fn test_suspicious_tld() {
    let analyzer = defaults();
    assert!(analyzer.analyze("http://foo.tk").suspicious_tld);
    assert!(analyzer.analyze("http://FOO.TK/login").suspicious_tld);
    assert!(!analyzer.analyze("http://foo.com").suspicious_tld);
    // Only the hostname counts.
    assert!(!analyzer.analyze("http://foo.com/page.tk").suspicious_tld);
}

#[test]
fn test_dots_and_dashes_count_hostname_only() {
    let features = defaults().analyze("http://a-b.example.com/x-y/z.html?q=1.2");
    assert_eq!(features.num_dots, 2);
    assert!(features.has_dash);

    let features = defaults().analyze("http://example.com/x-y/z.html");
    assert_eq!(features.num_dots, 1);
    assert!(!features.has_dash);
}

// ============================================================================
// Whole-URL Features
// ============================================================================

#[test]
fn test_brand_keyword_case_insensitive() {
    let analyzer = defaults();
    assert!(
        analyzer
            .analyze("http://secure-paypal-login.example.com")
            .has_brand_keyword
    );
    assert!(analyzer.analyze("http://example.com/PayPal/verify").has_brand_keyword);
    assert!(!analyzer.analyze("http://example.com/account").has_brand_keyword);
}

#[test]
fn test_at_and_special_chars_scan_whole_url() {
    let features = defaults().analyze("http://example.com/redirect?to=x@y.com");
    assert!(features.has_at);
    assert!(features.has_special_chars);

    let features = defaults().analyze("http://example.com/plain/path");
    assert!(!features.has_at);
    assert!(!features.has_special_chars);
}

#[test]
fn test_url_length_counts_characters() {
    let features = defaults().analyze("http://例え.jp");
    assert_eq!(features.url_length, 12);
}

#[test]
fn test_url_without_hostname() {
    let features = defaults().analyze("paypal-login.tk/verify");
    assert_eq!(features.num_dots, 0);
    assert!(!features.has_dash);
    assert!(!features.suspicious_tld);
    assert!(features.has_brand_keyword);
}

// ============================================================================
// Configuration and Determinism
// ============================================================================

#[test]
fn test_analyze_is_deterministic() {
    let analyzer = defaults();
    let url = "http://user@secure-bank.xyz:8443/login.php?id=1&next=%2F";
    assert_eq!(analyzer.analyze(url), analyzer.analyze(url));
}

#[test]
fn test_custom_lists() {
    let keywords = vec!["Netflix".to_string()];
    let tlds = vec![".shop".to_string()];

    let features = analyze("http://netflix-billing.shop", &keywords, &tlds);
    assert!(features.has_brand_keyword);
    assert!(features.suspicious_tld);

    let features = analyze("http://paypal.tk", &keywords, &tlds);
    assert!(!features.has_brand_keyword);
    assert!(!features.suspicious_tld);
}

#[test]
fn test_analyze_bulk_preserves_order() {
    let urls = vec![
        "http://b.com".to_string(),
        "http://a.tk".to_string(),
        "http://b.com".to_string(),
    ];
    let features = defaults().analyze_bulk(&urls);
    assert_eq!(features.len(), 3);
    assert_eq!(features[0].url, "http://b.com");
    assert!(features[1].suspicious_tld);
    assert_eq!(features[0], features[2]);
}

#[test]
fn test_extract_domain_matches_analysis() {
    assert_eq!(extract_domain("HTTPS://Login.PayPal.com.evil.tk/a"), "login.paypal.com.evil.tk");
    assert_eq!(extract_domain("ftp://files.example.org"), "files.example.org");
}
