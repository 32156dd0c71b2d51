//! Verb-oriented entry points with automatic retry
//!
//! Every verb returns a [`RetryRequest`] builder. Calling
//! [`auto_retry`](RetryRequest::auto_retry) alone is the short form and uses
//! the client's default interval; adding
//! [`retry_interval`](RetryRequest::retry_interval) is the full form.
//!
//! ```rust,no_run
//! use autoretry_http::RetryingClient;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = RetryingClient::with_default_client()?;
//! let response = client
//!     .get("https://example.com/status")
//!     .param("verbose", 1)
//!     .auto_retry(3)
//!     .retry_interval(Duration::from_secs(2))
//!     .send()?
//!     .await?;
//! println!("{}", response.text());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use autoretry_core::retry::{
    RequestControl, RequestHandle, RetryController, RetryError, RetryOptions, RetryPredicate,
    TaskTracker,
};
use autoretry_core::types::{RetryConfig, RuntimeConfig};

use crate::client::{HttpClient, ReqwestClient};
use crate::error::HttpError;
use crate::request::{HttpRequest, HttpResponse, Method, MultipartForm, Parameters};

/// Retry settings used when a request does not give its own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryDefaults {
    /// Used when `auto_retry` is not called
    pub retries: u32,
    /// Used when `retry_interval` is not called
    pub interval: Duration,
}

impl From<&RetryConfig> for RetryDefaults {
    fn from(config: &RetryConfig) -> Self {
        Self {
            retries: config.default_retries,
            interval: config.default_interval(),
        }
    }
}

/// HTTP client whose requests retry automatically
pub struct RetryingClient<C = ReqwestClient> {
    http: Arc<C>,
    controller: RetryController,
    defaults: RetryDefaults,
    predicate: Option<Arc<dyn RetryPredicate<HttpError>>>,
}

impl<C> Clone for RetryingClient<C> {
    fn clone(&self) -> Self {
        Self {
            http: self.http.clone(),
            controller: self.controller.clone(),
            defaults: self.defaults,
            predicate: self.predicate.clone(),
        }
    }
}

impl RetryingClient<ReqwestClient> {
    /// Client and controller wired from runtime configuration
    pub fn from_config(config: &RuntimeConfig) -> Result<Self, HttpError> {
        let http = ReqwestClient::from_config(&config.network)?;
        Ok(
            Self::with_controller(http, RetryController::from_config(&config.retry))
                .with_defaults(RetryDefaults::from(&config.retry)),
        )
    }

    /// Default network settings and a default controller
    pub fn with_default_client() -> Result<Self, HttpError> {
        Ok(Self::new(ReqwestClient::new()?))
    }
}

impl<C: HttpClient + 'static> RetryingClient<C> {
    /// Wrap `http` with a default controller
    pub fn new(http: C) -> Self {
        Self::with_controller(http, RetryController::new())
    }

    /// Wrap `http`, sharing an existing controller
    pub fn with_controller(http: C, controller: RetryController) -> Self {
        Self {
            http: Arc::new(http),
            controller,
            defaults: RetryDefaults::default(),
            predicate: None,
        }
    }

    /// Replace the fallback retry count and interval
    pub fn with_defaults(mut self, defaults: RetryDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Only retry errors accepted by `predicate`, unless a request overrides it
    pub fn with_predicate<P>(mut self, predicate: P) -> Self
    where
        P: RetryPredicate<HttpError> + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    /// Retry count and interval used when a request sets neither
    pub fn defaults(&self) -> RetryDefaults {
        self.defaults
    }

    /// The controller driving every request
    pub fn controller(&self) -> &RetryController {
        &self.controller
    }

    /// Tracker of every in-flight request sent through this client
    pub fn tracker(&self) -> &Arc<TaskTracker> {
        self.controller.tracker()
    }

    /// The wrapped single-attempt client
    pub fn http(&self) -> &C {
        &self.http
    }

    /// GET, with parameters encoded into the query string
    pub fn get(&self, url: impl Into<String>) -> RetryRequest<'_, C> {
        self.request(Method::Get, url)
    }

    /// HEAD, with parameters encoded into the query string
    pub fn head(&self, url: impl Into<String>) -> RetryRequest<'_, C> {
        self.request(Method::Head, url)
    }

    /// POST, with parameters sent as a form-encoded body
    pub fn post(&self, url: impl Into<String>) -> RetryRequest<'_, C> {
        self.request(Method::Post, url)
    }

    /// POST with a multipart body
    ///
    /// `builder` is invoked on every attempt to fill a fresh form, after
    /// the request parameters have been added as text fields.
    pub fn post_multipart<F>(&self, url: impl Into<String>, builder: F) -> RetryRequest<'_, C>
    where
        F: Fn(&mut MultipartForm) + Send + Sync + 'static,
    {
        let mut request = self.request(Method::Post, url);
        request.request.form = Some(Arc::new(builder));
        request
    }

    /// PUT, with parameters sent as a form-encoded body
    pub fn put(&self, url: impl Into<String>) -> RetryRequest<'_, C> {
        self.request(Method::Put, url)
    }

    /// PATCH, with parameters sent as a form-encoded body
    pub fn patch(&self, url: impl Into<String>) -> RetryRequest<'_, C> {
        self.request(Method::Patch, url)
    }

    /// DELETE, with parameters encoded into the query string
    pub fn delete(&self, url: impl Into<String>) -> RetryRequest<'_, C> {
        self.request(Method::Delete, url)
    }

    /// Builder for an arbitrary verb
    pub fn request(&self, method: Method, url: impl Into<String>) -> RetryRequest<'_, C> {
        RetryRequest {
            client: self,
            request: HttpRequest::new(method, url),
            retries: None,
            interval: None,
            key: None,
            predicate: None,
        }
    }
}

/// A request under construction
#[must_use = "a request does nothing until `send` is called"]
pub struct RetryRequest<'a, C> {
    client: &'a RetryingClient<C>,
    request: HttpRequest,
    retries: Option<u32>,
    interval: Option<Duration>,
    key: Option<String>,
    predicate: Option<Arc<dyn RetryPredicate<HttpError>>>,
}

impl<C: HttpClient + 'static> RetryRequest<'_, C> {
    /// Add one parameter
    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.request.params.insert(name, value);
        self
    }

    /// Add several parameters
    pub fn params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        self.request.params.extend(params);
        self
    }

    /// Replace all parameters
    pub fn with_params(mut self, params: Parameters) -> Self {
        self.request.params = params;
        self
    }

    /// Retries after the first attempt
    pub fn auto_retry(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    /// Interval between attempts
    pub fn retry_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Track the request under a caller-chosen key
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Only retry errors accepted by `predicate`
    pub fn retry_if<P>(mut self, predicate: P) -> Self
    where
        P: RetryPredicate<HttpError> + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    /// The request as it will be sent on every attempt
    pub fn http_request(&self) -> &HttpRequest {
        &self.request
    }

    /// Issue the first attempt and return its handle
    ///
    /// Awaiting the handle yields the response of the first successful
    /// attempt, or the last attempt's error once retries are exhausted.
    pub fn send(self) -> autoretry_core::Result<RequestHandle<HttpResponse, HttpError>> {
        let defaults = self.client.defaults;
        let mut options = RetryOptions::new(self.retries.unwrap_or(defaults.retries))
            .with_interval(self.interval.unwrap_or(defaults.interval));
        if let Some(key) = self.key {
            options = options.with_key(key);
        }
        if let Some(predicate) = self.predicate.or_else(|| self.client.predicate.clone()) {
            options = options.with_shared_predicate(predicate);
        }

        tracing::debug!(
            method = %self.request.method,
            url = %self.request.url,
            retries = options.retries(),
            "sending request"
        );

        let http = self.client.http.clone();
        let request = self.request;
        self.client.controller.execute(options, move || {
            let http = http.clone();
            let request = request.clone();
            async move { http.execute(request).await }
        })
    }

    /// Issue the request and deliver its outcome through callbacks
    ///
    /// Exactly one of the callbacks runs, once.
    pub fn send_with<S, F>(
        self,
        on_success: S,
        on_failure: F,
    ) -> autoretry_core::Result<RequestControl>
    where
        S: FnOnce(HttpResponse) + Send + 'static,
        F: FnOnce(RetryError<HttpError>) + Send + 'static,
    {
        Ok(self.send()?.on_complete(on_success, on_failure))
    }
}
