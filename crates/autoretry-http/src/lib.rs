//! # autoretry-http
//!
//! HTTP facade over the autoretry controller:
//! - `HttpClient` contract and a `reqwest`-backed implementation
//! - Request model (verbs, parameters, multipart forms)
//! - `RetryingClient` with GET/HEAD/POST/PUT/PATCH/DELETE entry points

pub mod client;
pub mod error;
pub mod facade;
pub mod request;

pub use client::{HttpClient, ReqwestClient};
pub use error::HttpError;
pub use facade::{RetryDefaults, RetryRequest, RetryingClient};
pub use request::{FormBuilder, FormPart, HttpRequest, HttpResponse, Method, MultipartForm, Parameters};
