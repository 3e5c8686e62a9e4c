//! Errors returned by the data API client.

use std::fmt;

use ingestion::SubmitError;
use serde::Deserialize;
use thiserror::Error;

/// Error type reported by the API for a malformed METAR in a feed request.
pub const INVALID_METAR_FORMAT: &str = "data.metars.invalidFormat";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {0}")]
    Api(ApiErrorResponse),

    #[error("HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("an API key with unlimited quota is required (quota: {0})")]
    LimitedQuota(i64),

    #[error("an API key with no rate limit is required (rate limit: {0})")]
    RateLimited(i64),

    #[error("METAR feeding is disabled")]
    FeedingDisabled,
}

pub type Result<T> = std::result::Result<T, ApiError>;

/// Error document returned with every non-2xx response.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ApiErrorResponse {
    pub status: u16,
    #[serde(default)]
    pub errors: Vec<ApiErrorDetail>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ApiErrorDetail {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    #[serde(default)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

impl ApiErrorResponse {
    /// Index of the first METAR the API flagged as malformed, with the
    /// accompanying message.
    pub fn invalid_format(&self) -> Option<(usize, &str)> {
        self.errors
            .iter()
            .filter(|error| error.kind == INVALID_METAR_FORMAT)
            .find_map(|error| {
                let index = error.details.get("index").and_then(json_index)?;
                Some((index, error.message.as_str()))
            })
    }
}

impl fmt::Display for ApiErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.errors.iter().map(|e| e.message.as_str()).collect();
        write!(f, "{}", messages.join(", "))
    }
}

/// Accepts both `2` and `2.0`, as JSON encoders disagree on integers.
fn json_index(value: &serde_json::Value) -> Option<usize> {
    if let Some(index) = value.as_u64() {
        return usize::try_from(index).ok();
    }
    value
        .as_f64()
        .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= usize::MAX as f64)
        .map(|f| f as usize)
}

impl From<ApiError> for SubmitError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Api(response) => match response.invalid_format() {
                Some((index, message)) => SubmitError::InvalidFormat {
                    index,
                    message: message.to_string(),
                },
                None => SubmitError::Rejected {
                    status: response.status,
                    message: response.to_string(),
                },
            },
            ApiError::Status { status, body } => SubmitError::Rejected {
                status,
                message: body,
            },
            other => SubmitError::Transport(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> ApiErrorResponse {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn test_invalid_format_maps_to_index() {
        let response = parse(
            r#"{"status":400,"errors":[{"type":"data.metars.invalidFormat","message":"invalid METAR format","details":{"index":2,"metar":"GARBAGE"}}]}"#,
        );
        assert_eq!(
            SubmitError::from(ApiError::Api(response)),
            SubmitError::InvalidFormat {
                index: 2,
                message: "invalid METAR format".to_string()
            }
        );
    }

    #[test]
    fn test_float_index_is_accepted() {
        let response = parse(
            r#"{"status":400,"errors":[{"type":"data.metars.invalidFormat","message":"bad","details":{"index":4.0}}]}"#,
        );
        assert_eq!(response.invalid_format(), Some((4, "bad")));
    }

    #[test]
    fn test_first_usable_invalid_format_wins() {
        let response = parse(
            r#"{"status":400,"errors":[
                {"type":"data.metars.invalidFormat","message":"no index","details":{}},
                {"type":"data.metars.invalidFormat","message":"second","details":{"index":1}},
                {"type":"data.metars.invalidFormat","message":"third","details":{"index":0}}
            ]}"#,
        );
        assert_eq!(response.invalid_format(), Some((1, "second")));
    }

    #[test]
    fn test_unusable_index_is_rejection() {
        for details in [r#"{"index":-1}"#, r#"{"index":1.5}"#, r#"{"index":"2"}"#] {
            let body = format!(
                r#"{{"status":400,"errors":[{{"type":"data.metars.invalidFormat","message":"bad","details":{}}}]}}"#,
                details
            );
            let err = SubmitError::from(ApiError::Api(parse(&body)));
            assert!(matches!(err, SubmitError::Rejected { status: 400, .. }), "{}", details);
        }
    }

    #[test]
    fn test_other_errors_are_rejections() {
        let response = parse(
            r#"{"status":401,"errors":[{"type":"auth.invalidKey","message":"invalid key"},{"type":"x","message":"other"}]}"#,
        );
        assert_eq!(
            SubmitError::from(ApiError::Api(response)),
            SubmitError::Rejected {
                status: 401,
                message: "invalid key, other".to_string()
            }
        );
        assert_eq!(
            SubmitError::from(ApiError::Status {
                status: 502,
                body: "bad gateway".to_string()
            }),
            SubmitError::Rejected {
                status: 502,
                message: "bad gateway".to_string()
            }
        );
    }

    #[test]
    fn test_decode_failure_is_transport() {
        let err = serde_json::from_str::<ApiErrorResponse>("nope").unwrap_err();
        assert!(matches!(
            SubmitError::from(ApiError::Decode(err)),
            SubmitError::Transport(_)
        ));
    }
}
