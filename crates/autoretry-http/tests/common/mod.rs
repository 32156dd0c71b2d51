//! Common test infrastructure for autoretry-http tests
//!
//! Wiremock helpers plus constructors for clients pointed at a mock server.

#![allow(dead_code)]

use autoretry_core::types::NetworkConfig;
use autoretry_http::{ReqwestClient, RetryingClient};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const BODY_OK: &str = "ok";

/// Retrying client over a real reqwest client
pub fn retrying_client() -> RetryingClient {
    RetryingClient::new(ReqwestClient::new().expect("reqwest client"))
}

/// Retrying client whose attempts time out after `secs`
pub fn retrying_client_with_timeout(secs: u64) -> RetryingClient {
    let config = NetworkConfig {
        http_timeout_secs: secs,
        connect_timeout_secs: secs,
        ..NetworkConfig::default()
    };
    RetryingClient::new(ReqwestClient::from_config(&config).expect("reqwest client"))
}

/// Endpoint that answers `fail_status` `fail_count` times, then 200
pub async fn mock_flaky(
    server: &MockServer,
    verb: &str,
    route: &str,
    fail_count: u64,
    fail_status: u16,
) {
    // First N requests fail
    Mock::given(method(verb))
        .and(path(route))
        .respond_with(ResponseTemplate::new(fail_status))
        .up_to_n_times(fail_count)
        .mount(server)
        .await;

    // Subsequent requests succeed
    Mock::given(method(verb))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(BODY_OK))
        .mount(server)
        .await;
}

/// Endpoint that always answers `status`
pub async fn mock_status(server: &MockServer, verb: &str, route: &str, status: u16) {
    Mock::given(method(verb))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Number of requests the server has received
pub async fn request_count(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .map(|requests| requests.len())
        .unwrap_or(0)
}
