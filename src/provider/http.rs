//! HTTP plumbing shared by the OpenAI and Gemini providers.

use std::time::Duration;

use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use reqwest::{Client as ReqwestClient, RequestBuilder, Response};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::observability::{PROVIDER_REQUEST_ERRORS, PROVIDER_REQUESTS};

/// Builds the HTTP client used by a provider.
///
/// The timeout is the only deadline enforced on a turn.
pub(crate) fn build_client(timeout: Duration) -> Result<ReqwestClient> {
    ReqwestClient::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| {
            Error::http_client(
                format!("Failed to build HTTP client: {e}"),
                Some(Box::new(e)),
            )
        })
}

/// Sends `request` and converts non-success statuses into errors.
///
/// `model` is attached to 404 errors so the user can tell which name was
/// rejected.
pub(crate) async fn send(
    request: RequestBuilder,
    timeout: Duration,
    model: Option<&str>,
) -> Result<Response> {
    PROVIDER_REQUESTS.click();
    let response = request.send().await.map_err(|e| {
        PROVIDER_REQUEST_ERRORS.click();
        if e.is_timeout() {
            Error::timeout(
                format!("Request timed out: {e}"),
                Some(timeout.as_secs_f64()),
            )
        } else if e.is_connect() {
            Error::connection(format!("Connection error: {e}"), Some(Box::new(e)))
        } else {
            Error::http_client(format!("Request failed: {e}"), Some(Box::new(e)))
        }
    })?;

    if !response.status().is_success() {
        PROVIDER_REQUEST_ERRORS.click();
        return Err(process_error_response(response, model).await);
    }
    Ok(response)
}

/// Turns a response body into a byte stream carrying our error type.
pub(crate) fn byte_stream(response: Response) -> impl Stream<Item = Result<Bytes>> + Send + Unpin {
    response.bytes_stream().map(|result| {
        result.map_err(|e| Error::streaming(format!("Error in HTTP stream: {e}"), Some(Box::new(e))))
    })
}

/// Process API response errors and convert to our Error type.
async fn process_error_response(response: Response, model: Option<&str>) -> Error {
    let status_code = response.status().as_u16();

    let retry_after = response
        .headers()
        .get("retry-after")
        .and_then(|val| val.to_str().ok())
        .and_then(|val| val.parse::<u64>().ok());

    let error_body = match response.text().await {
        Ok(body) => body,
        Err(e) => {
            return Error::http_client(
                format!("Failed to read error response: {e}"),
                Some(Box::new(e)),
            );
        }
    };

    classify_error(status_code, &error_body, retry_after, model)
}

/// Maps a status code and error body to an [`Error`].
pub(crate) fn classify_error(
    status_code: u16,
    error_body: &str,
    retry_after: Option<u64>,
    model: Option<&str>,
) -> Error {
    let detail = ErrorBody::parse(error_body);
    let message = detail
        .as_ref()
        .and_then(|d| d.message.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("{error_body:?}"));
    let api_key_invalid = detail.as_ref().is_some_and(|d| d.api_key_invalid);

    match status_code {
        _ if api_key_invalid => Error::authentication(message),
        400 => Error::bad_request(message),
        401 | 403 => Error::authentication(message),
        404 => Error::model_not_found(message, model.map(String::from)),
        408 => Error::timeout(message, None),
        429 => Error::rate_limit(message, retry_after),
        500..=599 => Error::server_error(status_code, message),
        _ => Error::api(status_code, message),
    }
}

/// The parts of a provider error body we care about.
///
/// OpenAI sends `{"error": {"message": ..}}`; Gemini sends the same shape,
/// sometimes wrapped in a JSON array, with `details[].reason`.
struct ErrorBody {
    message: Option<String>,
    api_key_invalid: bool,
}

impl ErrorBody {
    fn parse(body: &str) -> Option<Self> {
        #[derive(Deserialize)]
        struct Envelope {
            error: Option<Detail>,
        }

        #[derive(Deserialize)]
        struct Detail {
            message: Option<String>,
            #[serde(default)]
            details: Vec<serde_json::Value>,
        }

        let envelope = serde_json::from_str::<Envelope>(body)
            .ok()
            .or_else(|| {
                serde_json::from_str::<Vec<Envelope>>(body)
                    .ok()
                    .and_then(|list| list.into_iter().next())
            })?;
        let detail = envelope.error?;
        let api_key_invalid = detail
            .details
            .iter()
            .any(|d| d.get("reason").and_then(|r| r.as_str()) == Some("API_KEY_INVALID"));
        Some(Self {
            message: detail.message,
            api_key_invalid,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_carries_model() {
        let err = classify_error(404, "{}", None, Some("gemini-9"));
        assert!(err.is_model_not_found());
        assert!(err.to_string().contains("gemini-9"));
    }

    #[test]
    fn openai_message_is_extracted() {
        let body = r#"{"error": {"message": "Incorrect API key provided", "code": "invalid_api_key"}}"#;
        let err = classify_error(401, body, None, None);
        assert!(err.is_authentication());
        assert_eq!(
            err.to_string(),
            "Authentication error: Incorrect API key provided"
        );
    }

    #[test]
    fn gemini_api_key_invalid_is_authentication() {
        let body = r#"[{
  "error": {
    "code": 400,
    "message": "API key not valid. Please pass a valid API key.",
    "status": "INVALID_ARGUMENT",
    "details": [
      {
        "@type": "type.googleapis.com/google.rpc.ErrorInfo",
        "reason": "API_KEY_INVALID",
        "domain": "googleapis.com"
      }
    ]
  }
}]"#;
        let err = classify_error(400, body, None, None);
        assert!(err.is_authentication());
    }

    #[test]
    fn plain_bad_request_is_not_authentication() {
        let body = r#"{"error": {"code": 400, "message": "bad field", "details": []}}"#;
        let err = classify_error(400, body, None, None);
        assert!(matches!(err, Error::BadRequest { .. }));
    }

    #[test]
    fn unparseable_body_is_quoted() {
        let err = classify_error(502, "upstream down", Some(3), None);
        assert_eq!(err.status_code(), Some(502));
        assert!(err.to_string().contains("\"upstream down\""));
    }

    #[test]
    fn rate_limit_keeps_retry_after() {
        let err = classify_error(429, "{}", Some(7), None);
        assert!(matches!(
            err,
            Error::RateLimit {
                retry_after: Some(7),
                ..
            }
        ));
    }
}
