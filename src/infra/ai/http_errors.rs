// Turning HTTP failures from AI backends into `ProviderError`.
//
// The fallback chain only needs to know "rate limited" vs "anything else".
// Backends signal quota exhaustion in different ways: a plain 429, Gemini's
// RESOURCE_EXHAUSTED status, or an error body that mentions quotas.

use crate::core::ai::ProviderError;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::StatusCode;

/// Gemini puts the retry hint in the body: `"retryDelay": "39s"`.
static RETRY_DELAY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""retryDelay"\s*:\s*"(\d+(?:\.\d+)?)s""#).expect("valid regex"));

/// Groq and OpenAI style bodies: "Please try again in 7.66s".
static TRY_AGAIN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)try again in (\d+(?:\.\d+)?)s").expect("valid regex"));

const QUOTA_MARKERS: &[&str] = &["resource_exhausted", "quota", "rate limit", "rate_limit"];

/// Classify a non-success response.
///
/// `retry_after` is the raw `Retry-After` header when present. Only the
/// delta-seconds form is understood.
pub fn classify_failure(
    backend: &str,
    status: StatusCode,
    retry_after: Option<&str>,
    body: &str,
) -> ProviderError {
    let lowered = body.to_lowercase();
    let looks_like_quota = QUOTA_MARKERS.iter().any(|marker| lowered.contains(marker));

    if status == StatusCode::TOO_MANY_REQUESTS || looks_like_quota {
        let retry_after_secs = retry_after
            .and_then(parse_seconds)
            .or_else(|| capture_seconds(&RETRY_DELAY_PATTERN, body))
            .or_else(|| capture_seconds(&TRY_AGAIN_PATTERN, body));

        return ProviderError::RateLimited {
            retry_after_secs,
            message: format!("{} returned {}", backend, status),
        };
    }

    ProviderError::Failed(format!("{} API error: {} - {}", backend, status, truncate(body, 300)))
}

/// Errors raised before a status code exists (connect, timeout, decode).
pub fn transport_failure(backend: &str, err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Failed(format!("{} request timed out", backend))
    } else {
        ProviderError::Failed(format!("{} request failed: {}", backend, err))
    }
}

/// Whole seconds, rounded up.
fn parse_seconds(raw: &str) -> Option<u64> {
    let secs: f64 = raw.trim().parse().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Some(secs.ceil() as u64)
}

fn capture_seconds(pattern: &Regex, body: &str) -> Option<u64> {
    pattern
        .captures(body)
        .and_then(|caps| caps.get(1))
        .and_then(|m| parse_seconds(m.as_str()))
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_429_is_rate_limited() {
        let err = classify_failure("Groq", StatusCode::TOO_MANY_REQUESTS, None, "{}");
        assert_eq!(
            err,
            ProviderError::RateLimited {
                retry_after_secs: None,
                message: "Groq returned 429 Too Many Requests".to_string(),
            }
        );
    }

    #[test]
    fn retry_after_header_is_used() {
        let err = classify_failure("Groq", StatusCode::TOO_MANY_REQUESTS, Some("12"), "");
        assert!(matches!(
            err,
            ProviderError::RateLimited {
                retry_after_secs: Some(12),
                ..
            }
        ));
    }

    #[test]
    fn gemini_resource_exhausted_body_is_rate_limited() {
        let body = r#"{
          "error": {
            "code": 400,
            "message": "Quota exceeded for metric generate_content_free_tier_requests",
            "status": "RESOURCE_EXHAUSTED",
            "details": [{ "@type": "type.googleapis.com/google.rpc.RetryInfo", "retryDelay": "39s" }]
          }
        }"#;

        let err = classify_failure("Gemini", StatusCode::BAD_REQUEST, None, body);
        assert!(matches!(
            err,
            ProviderError::RateLimited {
                retry_after_secs: Some(39),
                ..
            }
        ));
    }

    #[test]
    fn try_again_hint_rounds_up() {
        let body = r#"{"error":{"message":"Rate limit reached for model. Please try again in 7.66s."}}"#;
        let err = classify_failure("Groq", StatusCode::TOO_MANY_REQUESTS, None, body);
        assert!(matches!(
            err,
            ProviderError::RateLimited {
                retry_after_secs: Some(8),
                ..
            }
        ));
    }

    #[test]
    fn http_date_retry_after_is_ignored() {
        let err = classify_failure(
            "Grok",
            StatusCode::TOO_MANY_REQUESTS,
            Some("Wed, 21 Oct 2015 07:28:00 GMT"),
            "",
        );
        assert!(matches!(
            err,
            ProviderError::RateLimited {
                retry_after_secs: None,
                ..
            }
        ));
    }

    #[test]
    fn server_errors_are_plain_failures() {
        let err = classify_failure("DeepSeek", StatusCode::INTERNAL_SERVER_ERROR, None, "boom");
        assert_eq!(
            err,
            ProviderError::Failed("DeepSeek API error: 500 Internal Server Error - boom".to_string())
        );
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(1_000);
        match classify_failure("Grok", StatusCode::BAD_GATEWAY, None, &body) {
            ProviderError::Failed(message) => assert!(message.len() < 400),
            other => panic!("unexpected {:?}", other),
        }
    }
}
