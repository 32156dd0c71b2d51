//! Request and response model handed to an [`HttpClient`](crate::HttpClient)
//!
//! An [`HttpRequest`] is built once per logical request and cloned for every
//! attempt, so each retry sends exactly what the first attempt sent.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use url::{form_urlencoded, Url};

use crate::error::HttpError;

/// HTTP verbs supported by the facade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    /// Canonical upper-case name
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    /// Whether parameters travel in the query string rather than the body
    pub fn params_in_query(&self) -> bool {
        matches!(self, Method::Get | Method::Head | Method::Delete)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "HEAD" => Ok(Method::Head),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            other => Err(format!("unsupported HTTP method '{}'", other)),
        }
    }
}

/// Ordered string parameters
///
/// Duplicate names are kept; their order is preserved on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameters(Vec<(String, String)>);

impl Parameters {
    /// Empty parameter list
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parameter
    pub fn insert(&mut self, name: impl Into<String>, value: impl ToString) {
        self.0.push((name.into(), value.to_string()));
    }

    /// Value of the first parameter called `name`
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `application/x-www-form-urlencoded` rendering
    pub fn encode(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.iter())
            .finish()
    }
}

impl<K, V> FromIterator<(K, V)> for Parameters
where
    K: Into<String>,
    V: ToString,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Parameters::new();
        params.extend(iter);
        params
    }
}

impl<K, V> Extend<(K, V)> for Parameters
where
    K: Into<String>,
    V: ToString,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (name, value) in iter {
            self.insert(name, value);
        }
    }
}

/// One part of a multipart body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        data: Vec<u8>,
        file_name: Option<String>,
        mime: Option<String>,
    },
}

impl FormPart {
    /// Field name of the part
    pub fn name(&self) -> &str {
        match self {
            FormPart::Text { name, .. } | FormPart::File { name, .. } => name,
        }
    }
}

/// Transport-neutral multipart body
///
/// Filled by a [`FormBuilder`] once per attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartForm {
    parts: Vec<FormPart>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a text field
    pub fn text(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.parts.push(FormPart::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Add a binary part
    pub fn bytes(&mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) -> &mut Self {
        self.parts.push(FormPart::File {
            name: name.into(),
            data: data.into(),
            file_name: None,
            mime: None,
        });
        self
    }

    /// Add a file part with file name and content type
    pub fn file(
        &mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        mime: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> &mut Self {
        self.parts.push(FormPart::File {
            name: name.into(),
            data: data.into(),
            file_name: Some(file_name.into()),
            mime: Some(mime.into()),
        });
        self
    }

    pub fn parts(&self) -> &[FormPart] {
        &self.parts
    }

    pub fn into_parts(self) -> Vec<FormPart> {
        self.parts
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

/// Caller callback that appends parts to a multipart body
pub type FormBuilder = Arc<dyn Fn(&mut MultipartForm) + Send + Sync>;

/// One HTTP request, re-sent verbatim on every attempt
#[derive(Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub params: Parameters,
    pub form: Option<FormBuilder>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            params: Parameters::new(),
            form: None,
        }
    }

    /// Replace the parameters
    pub fn with_params(mut self, params: Parameters) -> Self {
        self.params = params;
        self
    }

    /// Send a multipart body built by `builder`
    pub fn with_form(mut self, builder: FormBuilder) -> Self {
        self.form = Some(builder);
        self
    }

    /// URL to send to, with parameters in the query for query verbs
    pub fn target_url(&self) -> Result<Url, HttpError> {
        let mut url = Url::parse(&self.url).map_err(|source| HttpError::InvalidUrl {
            url: self.url.clone(),
            source,
        })?;
        if self.method.params_in_query() && !self.params.is_empty() {
            url.query_pairs_mut().extend_pairs(self.params.iter());
        }
        Ok(url)
    }

    /// Url-encoded body for body verbs without a multipart form
    pub fn form_body(&self) -> Option<String> {
        if self.method.params_in_query() || self.form.is_some() || self.params.is_empty() {
            return None;
        }
        Some(self.params.encode())
    }

    /// Multipart body: parameters as text fields, then the builder's parts
    pub fn multipart(&self) -> Option<MultipartForm> {
        let builder = self.form.as_ref()?;
        let mut form = MultipartForm::new();
        for (name, value) in self.params.iter() {
            form.text(name, value);
        }
        builder(&mut form);
        Some(form)
    }
}

impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("params", &self.params)
            .field("multipart", &self.form.is_some())
            .finish()
    }
}

/// Successful (2xx) response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// First header called `name`, compared case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Body as text, replacing invalid UTF-8
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> Parameters {
        [("q", "rust lang"), ("page", "2")].into_iter().collect()
    }

    #[test]
    fn test_method_parse_and_display() {
        assert_eq!("get".parse::<Method>().unwrap(), Method::Get);
        assert_eq!("PATCH".parse::<Method>().unwrap(), Method::Patch);
        assert!("TRACE".parse::<Method>().is_err());
        assert_eq!(Method::Delete.to_string(), "DELETE");
    }

    #[test]
    fn test_query_verbs_encode_params_into_url() {
        for method in [Method::Get, Method::Head, Method::Delete] {
            let request = HttpRequest::new(method, "http://example.com/search?x=1")
                .with_params(params());
            let url = request.target_url().unwrap();
            assert_eq!(url.query(), Some("x=1&q=rust+lang&page=2"));
            assert!(request.form_body().is_none());
        }
    }

    #[test]
    fn test_body_verbs_encode_params_into_body() {
        for method in [Method::Post, Method::Put, Method::Patch] {
            let request = HttpRequest::new(method, "http://example.com/items").with_params(params());
            assert_eq!(request.target_url().unwrap().query(), None);
            assert_eq!(request.form_body().as_deref(), Some("q=rust+lang&page=2"));
        }
    }

    #[test]
    fn test_empty_params_send_no_body() {
        let request = HttpRequest::new(Method::Post, "http://example.com/items");
        assert!(request.form_body().is_none());
        assert!(request.multipart().is_none());
    }

    #[test]
    fn test_invalid_url() {
        let request = HttpRequest::new(Method::Get, "not a url");
        assert!(matches!(
            request.target_url(),
            Err(HttpError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_multipart_includes_params_then_builder_parts() {
        let builder: FormBuilder = Arc::new(|form: &mut MultipartForm| {
            form.file("upload", "a.txt", "text/plain", b"hello".to_vec());
        });
        let request = HttpRequest::new(Method::Post, "http://example.com/upload")
            .with_params(params())
            .with_form(builder);

        assert!(request.form_body().is_none());
        let form = request.multipart().unwrap();
        let names: Vec<&str> = form.parts().iter().map(FormPart::name).collect();
        assert_eq!(names, vec!["q", "page", "upload"]);
    }

    #[test]
    fn test_parameters_keep_duplicates_in_order() {
        let mut params = Parameters::new();
        params.insert("tag", "a");
        params.insert("tag", "b");
        params.insert("limit", 10);
        assert_eq!(params.get("tag"), Some("a"));
        assert_eq!(params.encode(), "tag=a&tag=b&limit=10");
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_response_header_lookup_is_case_insensitive() {
        let response = HttpResponse {
            status: 200,
            url: "http://example.com".into(),
            headers: vec![("content-type".into(), "text/plain".into())],
            body: b"ok".to_vec(),
        };
        assert_eq!(response.header("Content-Type"), Some("text/plain"));
        assert_eq!(response.text(), "ok");
    }
}
