//! HTTP client collaborator
//!
//! The facade only needs one operation from a client: send one request,
//! once, and report success or failure. [`ReqwestClient`] is the production
//! implementation; tests substitute their own.

use std::sync::Arc;

use async_trait::async_trait;
use autoretry_core::types::NetworkConfig;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart;

use crate::error::HttpError;
use crate::request::{FormPart, HttpRequest, HttpResponse, Method, MultipartForm};

/// Issues exactly one attempt per call
///
/// Implementations report any non-2xx status as a failure.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Send `request` once
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

#[async_trait]
impl<T: HttpClient + ?Sized> HttpClient for Arc<T> {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        (**self).execute(request).await
    }
}

/// `HttpClient` backed by `reqwest`
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Client with default network settings
    pub fn new() -> Result<Self, HttpError> {
        Self::from_config(&NetworkConfig::default())
    }

    /// Client using the configured timeouts and user agent
    pub fn from_config(config: &NetworkConfig) -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.http_timeout())
            .connect_timeout(config.connect_timeout())
            .build()?;
        Ok(Self { client })
    }

    /// Wrap an existing `reqwest::Client`
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// The underlying `reqwest::Client`
    pub fn inner(&self) -> &reqwest::Client {
        &self.client
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let url = request.target_url()?;
        let target = url.to_string();

        let mut builder = self.client.request(to_reqwest_method(request.method), url);
        if let Some(form) = request.multipart() {
            builder = builder.multipart(to_reqwest_form(form)?);
        } else if let Some(body) = request.form_body() {
            builder = builder
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(body);
        }

        tracing::trace!(method = %request.method, url = %target, "sending attempt");
        let response = builder
            .send()
            .await
            .map_err(|e| HttpError::from_reqwest(e, &target))?;

        let status = response.status();
        let final_url = response.url().to_string();
        if !status.is_success() {
            return Err(HttpError::Status {
                status: status.as_u16(),
                url: final_url,
            });
        }

        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| HttpError::from_reqwest(e, &final_url))?
            .to_vec();

        Ok(HttpResponse {
            status: status.as_u16(),
            url: final_url,
            headers,
            body,
        })
    }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Head => reqwest::Method::HEAD,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

fn to_reqwest_form(form: MultipartForm) -> Result<multipart::Form, HttpError> {
    let mut out = multipart::Form::new();
    for part in form.into_parts() {
        out = match part {
            FormPart::Text { name, value } => out.text(name, value),
            FormPart::File {
                name,
                data,
                file_name,
                mime,
            } => {
                let mut file = multipart::Part::bytes(data);
                if let Some(file_name) = file_name {
                    file = file.file_name(file_name);
                }
                if let Some(mime) = mime {
                    file = file.mime_str(&mime)?;
                }
                out.part(name, file)
            }
        };
    }
    Ok(out)
}
