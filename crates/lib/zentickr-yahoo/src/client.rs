use std::time::Duration;

use reqwest::Url;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::YahooError;
use crate::parse;

pub const DEFAULT_BASE_URL: &str = "https://query2.finance.yahoo.com";
pub const DEFAULT_COOKIE_URL: &str = "https://fc.yahoo.com";
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Longest response excerpt kept in a status error.
const ERROR_BODY_LIMIT: usize = 256;

/// Connection settings for the Yahoo Finance endpoints.
#[derive(Debug, Clone)]
pub struct YahooConfig {
    pub base_url: String,
    pub cookie_url: String,
    pub user_agent: String,
    pub request_timeout: Duration,
}

impl YahooConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            cookie_url: DEFAULT_COOKIE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout: Duration::from_secs(20),
        }
    }

    #[must_use]
    pub fn with_cookie_url(mut self, cookie_url: impl Into<String>) -> Self {
        self.cookie_url = cookie_url.into();
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub const fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}

impl Default for YahooConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

/// HTTP client for Yahoo Finance sharing one cookie session and crumb.
///
/// The crumb is cached after the first successful fetch and dropped again
/// when Yahoo rejects it, so a long-running process survives session expiry.
pub struct YahooProvider {
    http: reqwest::Client,
    config: YahooConfig,
    crumb: RwLock<Option<String>>,
}

impl YahooProvider {
    /// Builds the HTTP client.
    ///
    /// # Errors
    /// Returns `YahooError::Transport` if the client cannot be constructed.
    pub fn new(config: YahooConfig) -> Result<Self, YahooError> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .cookie_store(true)
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http,
            config,
            crumb: RwLock::new(None),
        })
    }

    #[must_use]
    pub const fn config(&self) -> &YahooConfig {
        &self.config
    }

    /// Acquires the session cookie and crumb ahead of the first request.
    ///
    /// # Errors
    /// Returns `YahooError` if Yahoo cannot be reached or refuses a crumb.
    pub async fn warm_up(&self) -> Result<(), YahooError> {
        self.crumb().await.map(|_| ())
    }

    /// Resolves a fixed endpoint path against the base URL.
    pub(crate) fn url(&self, path: &str) -> Result<Url, YahooError> {
        let mut url = Url::parse(&self.config.base_url)
            .map_err(|err| YahooError::InvalidUrl(format!("{}: {err}", self.config.base_url)))?;
        url.path_segments_mut()
            .map_err(|()| YahooError::InvalidUrl(self.config.base_url.clone()))?
            .pop_if_empty()
            .extend(path.split('/').filter(|segment| !segment.is_empty()));
        Ok(url)
    }

    /// Resolves `path` and appends `symbol` as one percent-encoded segment.
    pub(crate) fn symbol_url(&self, path: &str, symbol: &str) -> Result<Url, YahooError> {
        // Dot segments would be dropped and address a different endpoint.
        if symbol.is_empty() || symbol == "." || symbol == ".." {
            return Err(YahooError::InvalidUrl(format!(
                "symbol {symbol:?} is not a valid path segment"
            )));
        }
        let mut url = self.url(path)?;
        url.path_segments_mut()
            .map_err(|()| YahooError::InvalidUrl(self.config.base_url.clone()))?
            .push(symbol);
        Ok(url)
    }

    /// Returns the cached crumb, fetching a new one when none is held.
    async fn crumb(&self) -> Result<String, YahooError> {
        let cached = self.crumb.read().await.clone();
        if let Some(crumb) = cached {
            return Ok(crumb);
        }
        let mut slot = self.crumb.write().await;
        // Another caller may have refreshed it while this one waited.
        if let Some(crumb) = slot.as_ref() {
            return Ok(crumb.clone());
        }
        Ok(slot.insert(self.fetch_crumb().await?).clone())
    }

    /// Forgets `stale` unless a newer crumb already replaced it.
    async fn invalidate_crumb(&self, stale: &str) {
        let mut slot = self.crumb.write().await;
        if slot.as_deref() == Some(stale) {
            *slot = None;
        }
    }

    async fn fetch_crumb(&self) -> Result<String, YahooError> {
        // Yahoo answers this with an error status but still sets the session cookie.
        if let Err(err) = self.http.get(&self.config.cookie_url).send().await {
            debug!(error = %err, "cookie request failed");
        }
        let crumb = self
            .http
            .get(self.url("/v1/test/getcrumb")?)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let crumb = crumb.trim();
        if crumb.is_empty() || crumb.contains('<') {
            return Err(YahooError::Session("no crumb in response".to_string()));
        }
        debug!("acquired yahoo session crumb");
        Ok(crumb.to_string())
    }

    /// Issues a GET and decodes the JSON body, surfacing vendor errors.
    pub(crate) async fn get_json(
        &self,
        url: Url,
        query: &[(&str, String)],
    ) -> Result<Value, YahooError> {
        debug!(%url, "yahoo request");
        let response = self.http.get(url).query(query).send().await?;
        let status = response.status();
        let text = response.text().await?;
        let body = serde_json::from_str::<Value>(&text);
        let vendor_error = body.as_ref().ok().and_then(parse::api_error);

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(YahooError::Unauthorized(
                vendor_error.unwrap_or_else(|| status.to_string()),
            ));
        }
        if !status.is_success() {
            if let Some(message) = vendor_error {
                return Err(YahooError::Api(message));
            }
            return Err(YahooError::Status {
                status: status.as_u16(),
                body: text.chars().take(ERROR_BODY_LIMIT).collect(),
            });
        }

        let body = body?;
        if let Some(message) = vendor_error {
            return Err(YahooError::Api(message));
        }
        Ok(body)
    }

    /// Same as [`Self::get_json`] with the session crumb attached.
    ///
    /// A rejected crumb is discarded and the request retried once with a
    /// freshly acquired one.
    pub(crate) async fn get_json_with_crumb(
        &self,
        url: Url,
        query: &[(&str, String)],
    ) -> Result<Value, YahooError> {
        let crumb = self.crumb().await?;
        match self.get_json(url.clone(), &with_crumb(query, &crumb)).await {
            Err(err) if err.is_rejected_session() => {
                debug!(error = %err, "yahoo rejected the crumb; refreshing session");
                self.invalidate_crumb(&crumb).await;
                let crumb = self.crumb().await?;
                self.get_json(url, &with_crumb(query, &crumb)).await
            }
            result => result,
        }
    }
}

fn with_crumb<'a>(query: &[(&'a str, String)], crumb: &str) -> Vec<(&'a str, String)> {
    let mut query = query.to_vec();
    query.push(("crumb", crumb.to_string()));
    query
}

#[cfg(test)]
mod tests {
    use super::*;

    impl YahooProvider {
        fn default_for_tests() -> Self {
            Self::new(YahooConfig::new("http://127.0.0.1:9000")).expect("client should build")
        }
    }

    #[test]
    fn config_trims_trailing_slash() {
        let config = YahooConfig::new("http://127.0.0.1:9000/");
        assert_eq!(config.base_url, "http://127.0.0.1:9000");
        let provider = YahooProvider::new(config).expect("client should build");
        assert_eq!(
            provider.url("/v1/finance/search").expect("valid url").as_str(),
            "http://127.0.0.1:9000/v1/finance/search"
        );
    }

    #[test]
    fn base_path_prefix_is_kept() {
        let provider = YahooProvider::new(YahooConfig::new("http://127.0.0.1:9000/proxy/"))
            .expect("client should build");
        assert_eq!(
            provider.url("/v8/finance/chart").expect("valid url").as_str(),
            "http://127.0.0.1:9000/proxy/v8/finance/chart"
        );
    }

    #[test]
    fn symbols_are_escaped_as_a_single_segment() {
        let provider = YahooProvider::default_for_tests();
        let url = provider
            .symbol_url("/v8/finance/chart", "BRK/B?INTERVAL=1M#")
            .expect("valid url");
        assert_eq!(url.path(), "/v8/finance/chart/BRK%2FB%3FINTERVAL=1M%23");
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);

        let plain = provider.symbol_url("/v8/finance/chart", "BRK-B").expect("valid url");
        assert_eq!(plain.path(), "/v8/finance/chart/BRK-B");
    }

    #[test]
    fn dot_segments_are_not_symbols() {
        let provider = YahooProvider::default_for_tests();
        for symbol in [".", "..", ""] {
            let err = provider
                .symbol_url("/v8/finance/chart", symbol)
                .expect_err("dot segments would change the endpoint");
            assert!(matches!(err, YahooError::InvalidUrl(_)));
        }
    }

    #[test]
    fn rejected_sessions_are_recognized() {
        assert!(YahooError::Unauthorized("Invalid Crumb".to_string()).is_rejected_session());
        assert!(YahooError::Api("Invalid Crumb".to_string()).is_rejected_session());
        assert!(!YahooError::Api("No fundamentals data found".to_string()).is_rejected_session());
    }

    #[tokio::test]
    async fn unreachable_host_is_transport_error() {
        let config = YahooConfig::new("http://127.0.0.1:9")
            .with_request_timeout(Duration::from_millis(500));
        let provider = YahooProvider::new(config).expect("client should build");
        let err = provider
            .get_json(
                provider.url("/v1/finance/search").expect("valid url"),
                &[("q", "aapl".to_string())],
            )
            .await
            .expect_err("nothing listens on the discard port");
        assert!(matches!(err, YahooError::Transport(_)));
    }
}
