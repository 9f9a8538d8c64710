//! Upstream error sanitization. Keeps provider account ids, organisation
//! names and internal URLs out of caller-visible messages.
//!
//! Pattern: log the raw error server-side, return only an opaque message
//! with the HTTP status code to the client.

/// Opaque caller-safe message for an upstream failure.
pub fn sanitize_upstream_error(status_code: u16, raw_text: &str) -> String {
    match classify_error(status_code, raw_text) {
        ErrorCategory::RateLimited => format!("Rate limited (HTTP {})", status_code),
        ErrorCategory::QuotaExhausted => format!("Quota exhausted (HTTP {})", status_code),
        ErrorCategory::Unauthorized => format!("Authentication failed (HTTP {})", status_code),
        ErrorCategory::ModelNotFound => format!("Model not available (HTTP {})", status_code),
        ErrorCategory::PromptTooLong => format!("Prompt too long (HTTP {})", status_code),
        ErrorCategory::Overloaded => format!("Upstream overloaded (HTTP {})", status_code),
        ErrorCategory::ServerError => format!("Upstream server error (HTTP {})", status_code),
        ErrorCategory::Unknown => format!("Upstream error (HTTP {})", status_code),
    }
}

/// Bound raw upstream text before it goes into a log line.
pub fn truncate_for_log(raw_text: &str, max_chars: usize) -> String {
    if raw_text.chars().count() <= max_chars {
        return raw_text.to_string();
    }
    let head: String = raw_text.chars().take(max_chars).collect();
    format!("{}…", head)
}

enum ErrorCategory {
    RateLimited,
    QuotaExhausted,
    Unauthorized,
    ModelNotFound,
    PromptTooLong,
    Overloaded,
    ServerError,
    Unknown,
}

fn classify_error(status_code: u16, raw_text: &str) -> ErrorCategory {
    match status_code {
        429 => {
            if raw_text.contains("insufficient_quota") || raw_text.contains("RESOURCE_EXHAUSTED") {
                ErrorCategory::QuotaExhausted
            } else {
                ErrorCategory::RateLimited
            }
        },
        529 => ErrorCategory::Overloaded,
        401 | 403 => ErrorCategory::Unauthorized,
        404 => ErrorCategory::ModelNotFound,
        400 => {
            if raw_text.contains("API_KEY_INVALID") || raw_text.contains("invalid_api_key") {
                ErrorCategory::Unauthorized
            } else if raw_text.contains("prompt is too long")
                || raw_text.contains("maximum context length")
                || raw_text.contains("token limit")
            {
                ErrorCategory::PromptTooLong
            } else {
                ErrorCategory::Unknown
            }
        },
        500..=599 => {
            if raw_text.contains("overloaded") {
                ErrorCategory::Overloaded
            } else {
                ErrorCategory::ServerError
            }
        },
        _ => ErrorCategory::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_org_from_rate_limit() {
        let raw = r#"{"error":{"message":"Rate limit reached for org-AbC123 on requests per min","type":"requests"}}"#;
        let result = sanitize_upstream_error(429, raw);
        assert_eq!(result, "Rate limited (HTTP 429)");
        assert!(!result.contains("org-"));
    }

    #[test]
    fn sanitize_quota_exhausted() {
        let raw = r#"{"error":{"code":"insufficient_quota"}}"#;
        assert_eq!(sanitize_upstream_error(429, raw), "Quota exhausted (HTTP 429)");
    }

    #[test]
    fn sanitize_anthropic_overloaded() {
        let raw = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        assert_eq!(sanitize_upstream_error(529, raw), "Upstream overloaded (HTTP 529)");
        assert_eq!(sanitize_upstream_error(503, "overloaded"), "Upstream overloaded (HTTP 503)");
    }

    #[test]
    fn sanitize_gemini_bad_key_is_auth_error() {
        let raw = r#"{"error":{"code":400,"status":"INVALID_ARGUMENT","details":[{"reason":"API_KEY_INVALID"}]}}"#;
        assert_eq!(sanitize_upstream_error(400, raw), "Authentication failed (HTTP 400)");
    }

    #[test]
    fn sanitize_prompt_too_long() {
        assert_eq!(
            sanitize_upstream_error(400, "This model's maximum context length is 8192 tokens"),
            "Prompt too long (HTTP 400)"
        );
    }

    #[test]
    fn sanitize_server_errors() {
        assert_eq!(sanitize_upstream_error(500, "internal"), "Upstream server error (HTTP 500)");
        assert_eq!(sanitize_upstream_error(502, "bad gw"), "Upstream server error (HTTP 502)");
    }

    #[test]
    fn sanitize_unknown_status() {
        assert_eq!(sanitize_upstream_error(418, "teapot"), "Upstream error (HTTP 418)");
    }

    #[test]
    fn truncate_keeps_short_text() {
        assert_eq!(truncate_for_log("short", 10), "short");
        assert_eq!(truncate_for_log("abcdefghij", 4), "abcd…");
    }

    #[test]
    fn no_secrets_in_any_output() {
        let dangerous_inputs = [
            (401, "Incorrect API key provided: sk-proj-****abcd"),
            (403, "user@example.com is not allowed"),
            (500, "Internal error at https://internal.example.net/v1/projects/my-project"),
        ];
        for (code, raw) in dangerous_inputs {
            let result = sanitize_upstream_error(code, raw);
            assert!(!result.contains("sk-"), "Leaked key in: {}", result);
            assert!(!result.contains('@'), "Leaked email in: {}", result);
            assert!(!result.contains("my-project"), "Leaked project in: {}", result);
        }
    }
}
