//! Rate-limited HTTP client for the Deezer APIs and CDN.
//!
//! Wraps `reqwest::Client` with:
//! * A shared request quota of 50 calls per 5 seconds for API endpoints
//! * Optional cookie storage for the gateway session
//! * Keepalive, read timeout and `Accept-Language` defaults
//!
//! CDN payloads are streamed through the [`Fetcher`] implementation,
//! which bypasses the quota.
//!
//! # Example
//!
//! ```rust
//! use deezload::http::Client;
//!
//! let client = Client::without_cookies(&config)?;
//! let request = client.get(url, "");
//! let response = client.execute_checked(request).await?;
//!
//! let download = client.open(&media_url).await?;
//! ```

use std::{future::Future, num::NonZeroU32, sync::Arc, time::Duration};

use async_trait::async_trait;
use futures_util::{FutureExt, StreamExt, TryFutureExt};
use governor::{DefaultDirectRateLimiter, Quota};
use reqwest::{
    cookie::CookieStore,
    header::{HeaderValue, ACCEPT_LANGUAGE},
    Body, Method, Url,
};

use crate::{
    config::Config,
    error::{Error, Result},
    fetch::{Download, Fetcher},
};

/// HTTP client with built-in rate limiting and cookie support.
pub struct Client {
    /// Client without rate limiting, used for CDN downloads.
    pub unlimited: reqwest::Client,

    rate_limiter: DefaultDirectRateLimiter,

    /// Cookie storage, present for gateway sessions.
    pub cookie_jar: Option<Arc<dyn CookieStore>>,
}

impl Client {
    /// Rolling window of the API quota.
    const RATE_LIMIT_INTERVAL: Duration = Duration::from_secs(5);

    /// Calls allowed per window.
    const RATE_LIMIT_CALLS_PER_INTERVAL: u8 = 50;

    const KEEPALIVE_TIMEOUT: Duration = Duration::from_secs(60);

    /// A stalled read fails the download instead of hanging it.
    const READ_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates a new client with optional cookie storage.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the HTTP client cannot be built.
    pub fn new<C>(config: &Config, cookie_jar: Option<C>) -> Result<Self>
    where
        C: CookieStore + 'static,
    {
        // Not having `Accept-Language` set is non-fatal.
        let mut headers = reqwest::header::HeaderMap::new();
        if let Ok(lang) = HeaderValue::from_str(&config.app_lang) {
            headers.insert(ACCEPT_LANGUAGE, lang);
        }

        let cookie_jar = cookie_jar.map(Arc::new);

        let mut http_client = reqwest::Client::builder()
            .tcp_keepalive(Self::KEEPALIVE_TIMEOUT)
            .read_timeout(Self::READ_TIMEOUT)
            .default_headers(headers)
            .user_agent(&config.user_agent);

        if let Some(ref jar) = cookie_jar {
            http_client = http_client.cookie_provider(Arc::clone(jar));
        }

        let replenish_interval =
            Self::RATE_LIMIT_INTERVAL / u32::from(Self::RATE_LIMIT_CALLS_PER_INTERVAL);
        let quota = Quota::with_period(replenish_interval)
            .ok_or_else(|| Error::internal("quota time interval is zero"))?
            .allow_burst(
                NonZeroU32::new(Self::RATE_LIMIT_CALLS_PER_INTERVAL.into())
                    .ok_or_else(|| Error::internal("calls per interval is zero"))?,
            );

        Ok(Self {
            unlimited: http_client.build()?,
            rate_limiter: governor::RateLimiter::direct(quota),
            cookie_jar: cookie_jar.map(|jar| jar as _),
        })
    }

    /// Creates a client that keeps the session cookies in `cookie_jar`.
    ///
    /// # Errors
    ///
    /// Returns error if client creation fails.
    pub fn with_cookies<C>(config: &Config, cookie_jar: C) -> Result<Self>
    where
        C: CookieStore + 'static,
    {
        Self::new(config, Some(cookie_jar))
    }

    /// Creates a client for the public API and the CDN.
    ///
    /// # Errors
    ///
    /// Returns error if client creation fails.
    pub fn without_cookies(config: &Config) -> Result<Self> {
        Self::new(config, None::<reqwest::cookie::Jar>)
    }

    /// Builds a request that can be executed with [`execute`](Self::execute).
    pub fn request<U, T>(&self, method: Method, url: U, body: T) -> reqwest::Request
    where
        U: Into<Url>,
        T: Into<Body>,
    {
        let mut request = reqwest::Request::new(method, url.into());
        *request.body_mut() = Some(body.into());
        request
    }

    pub fn post<U, T>(&self, url: U, body: T) -> reqwest::Request
    where
        U: Into<Url>,
        T: Into<Body>,
    {
        self.request(Method::POST, url, body)
    }

    pub fn get<U, T>(&self, url: U, body: T) -> reqwest::Request
    where
        U: Into<Url>,
        T: Into<Body>,
    {
        self.request(Method::GET, url, body)
    }

    /// Executes a request once the rate limiter allows it.
    ///
    /// # Errors
    ///
    /// Returns error if the request cannot be sent.
    pub fn execute(
        &self,
        request: reqwest::Request,
    ) -> impl Future<Output = Result<reqwest::Response>> + '_ {
        // No need to await with jitter because the level of concurrency is low.
        let throttle = self.rate_limiter.until_ready();
        throttle.then(|()| self.unlimited.execute(request).map_err(Into::into))
    }

    /// Executes a request and fails on non-success status codes.
    ///
    /// # Errors
    ///
    /// * `NotFound` for HTTP 404
    /// * `RightsDenied` for HTTP 401 and 403
    /// * `NetworkFailure` for other statuses and transport errors
    pub async fn execute_checked(&self, request: reqwest::Request) -> Result<reqwest::Response> {
        let response = self.execute(request).await?;
        Ok(response.error_for_status()?)
    }
}

#[async_trait]
impl Fetcher for Client {
    async fn open(&self, url: &Url) -> Result<Download> {
        let response = self
            .unlimited
            .get(url.clone())
            .send()
            .await?
            .error_for_status()?;

        let content_length = response.content_length();
        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(Error::from));

        Ok(Download {
            content_length,
            stream: Box::pin(stream),
        })
    }
}
