//! Request commands: one verb, many attempts

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use autoretry_core::retry::{HttpStatusPredicate, RetryError};
use autoretry_core::types::RuntimeConfig;
use autoretry_http::{
    HttpError, HttpResponse, Method, ReqwestClient, RetryRequest, RetryingClient,
};
use camino::Utf8Path;
use tracing::debug;

use crate::cli::{RequestArgs, UploadArgs};
use crate::output;

pub async fn run(
    method: Method,
    args: RequestArgs,
    explicit: Option<&Utf8Path>,
    quiet: bool,
) -> Result<()> {
    let client = client_for(&args, explicit)?;
    let request = apply_args(client.request(method, &args.url), &args);
    send(request, &args, quiet).await
}

pub async fn upload(args: UploadArgs, explicit: Option<&Utf8Path>, quiet: bool) -> Result<()> {
    // Files are read once; every attempt sends the same bytes
    let mut parts = Vec::with_capacity(args.files.len());
    for (name, path) in &args.files {
        let data = std::fs::read(path).with_context(|| format!("Failed to read {}", path))?;
        let file_name = path.file_name().unwrap_or(path.as_str()).to_string();
        parts.push((name.clone(), file_name, data));
    }
    let parts = Arc::new(parts);

    let client = client_for(&args.request, explicit)?;
    let request = client.post_multipart(&args.request.url, move |form| {
        for (name, file_name, data) in parts.iter() {
            form.file(
                name.as_str(),
                file_name.as_str(),
                "application/octet-stream",
                data.clone(),
            );
        }
    });
    let request = apply_args(request, &args.request);
    send(request, &args.request, quiet).await
}

fn client_for(args: &RequestArgs, explicit: Option<&Utf8Path>) -> Result<RetryingClient> {
    let config = runtime_config(args, explicit)?;
    let client = RetryingClient::from_config(&config).context("Failed to create HTTP client")?;
    Ok(if args.status_aware {
        client.with_predicate(HttpStatusPredicate::default_http())
    } else {
        client
    })
}

/// Runtime config with command line overrides applied last
fn runtime_config(args: &RequestArgs, explicit: Option<&Utf8Path>) -> Result<RuntimeConfig> {
    let mut config = super::load_runtime_config(explicit)?;
    if let Some(strategy) = args.strategy {
        config.retry.backoff.strategy = strategy;
    }
    config.retry.log_attempts = true;
    debug!(
        retries = config.retry.default_retries,
        interval_secs = config.retry.default_interval_secs,
        strategy = ?config.retry.backoff.strategy,
        "runtime configuration loaded"
    );
    Ok(config)
}

fn apply_args<'a>(
    mut request: RetryRequest<'a, ReqwestClient>,
    args: &RequestArgs,
) -> RetryRequest<'a, ReqwestClient> {
    request = request.params(args.params.iter().cloned());
    if let Some(retries) = args.retries {
        request = request.auto_retry(retries);
    }
    if let Some(interval) = args.interval {
        request = request.retry_interval(Duration::from_secs(interval));
    }
    if let Some(key) = &args.key {
        request = request.key(key.clone());
    }
    request
}

async fn send(
    request: RetryRequest<'_, ReqwestClient>,
    args: &RequestArgs,
    quiet: bool,
) -> Result<()> {
    let label = format!(
        "{} {}",
        request.http_request().method,
        request.http_request().url
    );
    let mut handle = request.send().context("Failed to start request")?;
    let control = handle.control().clone();
    debug!(request = %control.key(), "request started");

    let spinner = (!quiet).then(|| output::spinner(&label));
    let finished = tokio::select! {
        result = &mut handle => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };
    let result = match finished {
        Some(result) => result,
        None => {
            // Ctrl-C cancels the logical request, including pending retries
            control.cancel();
            handle.await
        }
    };
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    match result {
        Ok(response) => {
            if !quiet {
                output::success(&format!(
                    "{} -> {} after {} attempt(s)",
                    label,
                    response.status,
                    control.attempts()
                ));
            }
            print_response(&response, args.include)
        }
        Err(err) => Err(describe_failure(&label, err)),
    }
}

fn print_response(response: &HttpResponse, include: bool) -> Result<()> {
    if include {
        output::info(&format!("HTTP {} {}", response.status, response.url));
        for (name, value) in &response.headers {
            output::kv(name, value);
        }
    }
    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(&response.body)
        .and_then(|_| stdout.flush())
        .context("Failed to write response body")
}

fn describe_failure(label: &str, err: RetryError<HttpError>) -> anyhow::Error {
    match err {
        RetryError::Exhausted {
            attempts,
            source,
            total_duration,
        } => anyhow!(
            "{} failed after {} attempts over {:.1}s: {}",
            label,
            attempts,
            total_duration.as_secs_f64(),
            source
        ),
        RetryError::NonRetryable { attempts, source } => anyhow!(
            "{} failed on attempt {} (not retryable): {}",
            label,
            attempts,
            source
        ),
        RetryError::Cancelled { attempts, .. } => {
            anyhow!("{} cancelled after {} attempt(s)", label, attempts)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_failure_mentions_attempts() {
        let err = RetryError::exhausted(
            3,
            HttpError::Status {
                status: 503,
                url: "http://example.com".into(),
            },
            Duration::from_millis(2500),
        );
        let msg = describe_failure("GET http://example.com", err).to_string();
        assert_eq!(
            msg,
            "GET http://example.com failed after 3 attempts over 2.5s: HTTP 503 from http://example.com"
        );

        let err = RetryError::<HttpError>::cancelled(1, None);
        let msg = describe_failure("HEAD http://example.com", err).to_string();
        assert_eq!(msg, "HEAD http://example.com cancelled after 1 attempt(s)");
    }
}
