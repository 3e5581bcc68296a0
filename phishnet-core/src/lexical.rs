// Lexical URL features: pure functions of the URL string, no I/O

use serde::{Deserialize, Serialize};

pub const DEFAULT_BRAND_KEYWORDS: [&str; 7] = [
    "google",
    "paypal",
    "apple",
    "amazon",
    "microsoft",
    "facebook",
    "bank",
];

pub const DEFAULT_SUSPICIOUS_TLDS: [&str; 10] = [
    ".tk", ".ml", ".ga", ".cf", ".gq", ".xyz", ".top", ".work", ".support", ".info",
];

const SPECIAL_CHARS: [char; 8] = ['$', '%', '&', '=', '?', '#', '_', '~'];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LexicalFeatures {
    pub url: String,
    pub url_length: usize,
    pub num_dots: usize,
    pub uses_ip_address: bool,
    pub has_at: bool,
    pub has_dash: bool,
    pub has_special_chars: bool,
    pub suspicious_tld: bool,
    pub has_brand_keyword: bool,
}

/// Holds the keyword and TLD lists so bulk analysis doesn't re-normalise them per URL.
#[derive(Debug, Clone)]
pub struct LexicalAnalyzer {
    brand_keywords: Vec<String>,
    suspicious_tlds: Vec<String>,
}

impl LexicalAnalyzer {
    pub fn new<K, T>(brand_keywords: K, suspicious_tlds: T) -> Self
    where
        K: IntoIterator,
        K::Item: AsRef<str>,
        T: IntoIterator,
        T::Item: AsRef<str>,
    {
        Self {
            brand_keywords: normalize_list(brand_keywords),
            suspicious_tlds: normalize_list(suspicious_tlds),
        }
    }

    pub fn brand_keywords(&self) -> &[String] {
        &self.brand_keywords
    }

    pub fn suspicious_tlds(&self) -> &[String] {
        &self.suspicious_tlds
    }

    pub fn analyze(&self, url: &str) -> LexicalFeatures {
        analyze(url, &self.brand_keywords, &self.suspicious_tlds)
    }

    /// One result per input, same order.
    pub fn analyze_bulk(&self, urls: &[String]) -> Vec<LexicalFeatures> {
        urls.iter().map(|url| self.analyze(url)).collect()
    }
}

impl Default for LexicalAnalyzer {
    fn default() -> Self {
        Self::new(DEFAULT_BRAND_KEYWORDS, DEFAULT_SUSPICIOUS_TLDS)
    }
}

fn normalize_list<I>(items: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    items
        .into_iter()
        .map(|item| item.as_ref().trim().to_lowercase())
        .filter(|item| !item.is_empty())
        .collect()
}

/// Computes every lexical feature for `url`. Never fails; a URL without an
/// authority simply has an empty hostname.
///
/// `has_at`, `has_special_chars` and `has_brand_keyword` look at the whole
/// URL (path and query included), while `num_dots`, `has_dash` and
/// `suspicious_tld` only look at the hostname.
pub fn analyze(url: &str, brand_keywords: &[String], suspicious_tlds: &[String]) -> LexicalFeatures {
    let hostname = extract_domain(url);
    let lowered_url = url.to_lowercase();

    LexicalFeatures {
        url: url.to_string(),
        url_length: url.chars().count(),
        num_dots: hostname.matches('.').count(),
        uses_ip_address: is_dotted_quad(&hostname),
        has_at: url.contains('@'),
        has_dash: hostname.contains('-'),
        has_special_chars: url.contains(SPECIAL_CHARS),
        suspicious_tld: suspicious_tlds
            .iter()
            .any(|tld| hostname.ends_with(tld.to_lowercase().as_str())),
        has_brand_keyword: brand_keywords
            .iter()
            .any(|keyword| lowered_url.contains(keyword.to_lowercase().as_str())),
    }
}

/// Lowercased hostname of `url`, or an empty string when there is none.
///
/// Follows the generic `scheme://userinfo@host:port/path` layout without any
/// normalisation, so `999.999.999.999` stays as written.
pub fn extract_domain(url: &str) -> String {
    let url = url.trim_start_matches(|c: char| c <= ' ');
    let rest = strip_scheme(url);

    let Some(after_slashes) = rest.strip_prefix("//") else {
        return String::new();
    };

    let authority_end = after_slashes
        .find(['/', '?', '#'])
        .unwrap_or(after_slashes.len());
    let authority = &after_slashes[..authority_end];

    let host_port = authority
        .rsplit_once('@')
        .map_or(authority, |(_, host_port)| host_port);

    let host = match host_port.strip_prefix('[') {
        Some(bracketed) => bracketed.split(']').next().unwrap_or_default(),
        None => host_port.split(':').next().unwrap_or_default(),
    };

    host.to_lowercase()
}

/// Key used for every domain-keyed lookup: the cache, the resolver and the
/// feature join all go through this so they agree on spelling.
pub fn normalize_domain(domain: &str) -> String {
    domain.trim().to_lowercase()
}

fn strip_scheme(url: &str) -> &str {
    match url.split_once(':') {
        Some((scheme, rest)) if is_scheme(scheme) => rest,
        _ => url,
    }
}

fn is_scheme(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Exactly four dot-separated groups of one to three digits. No range check.
fn is_dotted_quad(hostname: &str) -> bool {
    let groups: Vec<&str> = hostname.split('.').collect();
    groups.len() == 4
        && groups
            .iter()
            .all(|group| (1..=3).contains(&group.len()) && group.chars().all(|c| c.is_ascii_digit()))
}
