//! JSON-over-HTTP transport shared by the venue adapters.

use super::ExchangeError;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::RequestBuilder;
use std::time::Duration;

/// Upper bound on time spent retrying one call.
const MAX_RETRY_ELAPSED: Duration = Duration::from_secs(30);

/// Send a request built by `make_request` and decode the JSON body.
///
/// Network errors, 429 and 5xx are retried with exponential backoff; other statuses and
/// undecodable bodies fail immediately.
pub(crate) async fn fetch_json<F>(make_request: F) -> Result<serde_json::Value, ExchangeError>
where
    F: Fn() -> RequestBuilder,
{
    let backoff = ExponentialBackoff {
        max_elapsed_time: Some(MAX_RETRY_ELAPSED),
        ..Default::default()
    };

    retry(backoff, || async {
        let response = make_request().send().await.map_err(|e| {
            backoff::Error::transient(ExchangeError::NetworkError(e.to_string()))
        })?;

        let status = response.status();
        if status == 429 {
            return Err(backoff::Error::transient(ExchangeError::RateLimited));
        }
        if status.is_server_error() {
            return Err(backoff::Error::transient(ExchangeError::HttpError {
                status: status.as_u16(),
                message: "Server error".to_string(),
            }));
        }
        if !status.is_success() {
            return Err(backoff::Error::permanent(ExchangeError::HttpError {
                status: status.as_u16(),
                message: "Client error".to_string(),
            }));
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| backoff::Error::permanent(ExchangeError::ParseError(e.to_string())))
    })
    .await
}

/// Read a string or number field as text.
pub(crate) fn field_text(row: &serde_json::Value, name: &str) -> Result<String, ExchangeError> {
    match row.get(name) {
        Some(serde_json::Value::String(s)) => Ok(s.clone()),
        Some(serde_json::Value::Number(n)) => Ok(n.to_string()),
        _ => Err(ExchangeError::ParseError(format!("Missing {} field", name))),
    }
}

/// Read a string field.
pub(crate) fn field_str<'a>(
    row: &'a serde_json::Value,
    name: &str,
) -> Result<&'a str, ExchangeError> {
    row.get(name)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ExchangeError::ParseError(format!("Missing {} field", name)))
}

/// Read an array field.
pub(crate) fn field_array<'a>(
    row: &'a serde_json::Value,
    name: &str,
) -> Result<&'a Vec<serde_json::Value>, ExchangeError> {
    row.get(name)
        .and_then(|v| v.as_array())
        .ok_or_else(|| ExchangeError::ParseError(format!("Missing {} array", name)))
}
