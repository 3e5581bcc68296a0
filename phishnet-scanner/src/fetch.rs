use crate::error::{Result, ScanError};
use reqwest::Client;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Desktop browser User-Agent sent with every page fetch. Some phishing kits
/// serve an empty page to anything that does not look like a browser.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub url: String,
    pub status_code: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Fails with [`ScanError::Status`] for anything outside 2xx.
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ScanError::Status(self.status_code))
        }
    }
}

/// The only network capability the pipeline needs: one GET with a deadline.
///
/// Both page content and registration data go through this trait, so the
/// fetch and resolve logic can be exercised against an in-memory fake.
pub trait FetchProvider: Send + Sync {
    fn fetch(
        &self,
        url: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<FetchResponse>> + Send;
}

impl<P: FetchProvider> FetchProvider for Arc<P> {
    fn fetch(
        &self,
        url: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<FetchResponse>> + Send {
        (**self).fetch(url, timeout)
    }
}

/// `reqwest`-backed provider used outside of tests.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        Self::with_user_agent(BROWSER_USER_AGENT)
    }

    pub fn with_user_agent(user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .pool_max_idle_per_host(50)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;

        Ok(Self { client })
    }
}

impl FetchProvider for HttpFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchResponse> {
        debug!("Fetching {}", url);

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(e, timeout))?;

        let status_code = response.status().as_u16();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = response.text().await.map_err(|e| classify(e, timeout))?;

        Ok(FetchResponse {
            url: url.to_string(),
            status_code,
            content_type,
            body,
        })
    }
}

fn classify(error: reqwest::Error, timeout: Duration) -> ScanError {
    if error.is_timeout() {
        ScanError::Timeout(timeout)
    } else if error.is_builder() {
        ScanError::InvalidUrl(error.to_string())
    } else {
        ScanError::HttpError(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{header, method, path},
    };

    #[tokio::test]
    async fn test_http_fetcher_sends_browser_user_agent() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/login"))
            .and(header("user-agent", BROWSER_USER_AGENT))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string("<html><title>ok</title></html>"),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let fetcher = HttpFetcher::new().unwrap();
        let url = format!("{}/login", mock_server.uri());
        let response = fetcher.fetch(&url, Duration::from_secs(5)).await.unwrap();

        assert_eq!(response.status_code, 200);
        assert_eq!(response.content_type.as_deref(), Some("text/html"));
        assert!(response.body.contains("<title>ok</title>"));
    }

    #[tokio::test]
    async fn test_http_fetcher_reports_non_success_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let fetcher = HttpFetcher::new().unwrap();
        let url = format!("{}/gone", mock_server.uri());
        let response = fetcher.fetch(&url, Duration::from_secs(5)).await.unwrap();

        assert!(!response.is_success());
        assert!(matches!(
            response.error_for_status(),
            Err(ScanError::Status(404))
        ));
    }

    #[tokio::test]
    async fn test_http_fetcher_times_out() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&mock_server)
            .await;

        let fetcher = HttpFetcher::new().unwrap();
        let url = format!("{}/slow", mock_server.uri());
        let result = fetcher.fetch(&url, Duration::from_millis(100)).await;

        assert!(matches!(result, Err(ScanError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_http_fetcher_rejects_malformed_url() {
        let fetcher = HttpFetcher::new().unwrap();
        let result = fetcher.fetch("not a url", Duration::from_secs(1)).await;
        assert!(result.is_err());
    }
}
