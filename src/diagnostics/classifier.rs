//! Failure classification.
//!
//! # Responsibilities
//! - Map a normalized `(message, status)` pair to an [`ErrorKind`]
//! - Normalize `reqwest` errors into that pair at the transport boundary
//! - Attach timestamp, URL and remediation hint for presentation
//!
//! # Rules (first match wins)
//! 1. message mentions "refused" → Connection
//! 2. message mentions "timeout" / "timed out" → Timeout
//! 3. message mentions "not found" / DNS resolution failure → Connection
//! 4. message mentions "unauthorized" / "forbidden" → Authentication
//! 5. status >= 500 → Server
//! 6. 400 <= status < 500 → Authentication
//! 7. message mentions "json" / "parse" → Server
//! 8. otherwise → Unknown

use std::error::Error as StdError;

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::kind::ErrorKind;

/// Optional request context available when a failure is observed.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    pub url: Option<String>,
    pub status_code: Option<u16>,
}

impl ErrorContext {
    pub fn for_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            status_code: None,
        }
    }

    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }
}

/// A failure annotated with its category and remediation hint.
#[derive(Debug, Clone, Error)]
#[error("{kind} error: {message}")]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    /// The original failure message.
    pub message: String,
    pub status_code: Option<u16>,
    pub timestamp: DateTime<Utc>,
    pub url: Option<String>,
    pub suggestion: Option<String>,
}

impl ClassifiedError {
    /// Build an error whose kind is already known.
    pub fn new(kind: ErrorKind, message: impl Into<String>, context: &ErrorContext) -> Self {
        Self {
            kind,
            message: message.into(),
            status_code: context.status_code,
            timestamp: Utc::now(),
            url: context.url.clone(),
            suggestion: Some(kind.suggestion().to_string()),
        }
    }

    /// Local setup problem that never reached the network.
    pub fn configuration(message: impl Into<String>, context: &ErrorContext) -> Self {
        Self::new(ErrorKind::Configuration, message, context)
    }

    /// Classify a `reqwest` failure.
    ///
    /// The whole source chain is folded into the message, since the useful
    /// part ("Connection refused", "operation timed out") usually sits a few
    /// levels below the top-level "error sending request".
    pub fn from_reqwest(err: &reqwest::Error, url: &str) -> Self {
        let mut context = ErrorContext::for_url(url);
        if let Some(status) = err.status() {
            context.status_code = Some(status.as_u16());
        }

        if err.is_builder() {
            return Self::configuration(error_chain(err), &context);
        }

        let mut message = error_chain(err);
        let lowered = message.to_lowercase();
        if err.is_timeout() && !lowered.contains("timeout") && !lowered.contains("timed out") {
            message.push_str(" (timeout)");
        }

        classify(&message, &context)
    }

    /// Multi-line diagnostic suitable for a terminal or a log file.
    pub fn diagnostic_report(&self) -> String {
        let mut report = String::new();
        report.push_str(&format!("Error type:  {}\n", self.kind));
        report.push_str(&format!("Occurred at: {}\n", self.timestamp.to_rfc3339()));
        if let Some(status) = self.status_code {
            report.push_str(&format!("HTTP status: {status}\n"));
        }
        if let Some(url) = &self.url {
            report.push_str(&format!("Request URL: {url}\n"));
        }
        report.push_str(&format!("\nMessage:\n  {}\n", self.message));
        report.push_str(&format!("\nLikely cause:\n  {}\n", self.kind.explanation()));
        if let Some(suggestion) = &self.suggestion {
            report.push_str(&format!("\nSuggestion:\n  {suggestion}\n"));
        }
        report
    }
}

/// Classify a failure message with optional request context.
pub fn classify(message: &str, context: &ErrorContext) -> ClassifiedError {
    let kind = classify_kind(message, context.status_code);
    ClassifiedError::new(kind, message, context)
}

/// Pure mapping from a normalized failure to its kind.
pub fn classify_kind(message: &str, status_code: Option<u16>) -> ErrorKind {
    let message = message.to_lowercase();

    if message.contains("refused") {
        ErrorKind::Connection
    } else if message.contains("timeout") || message.contains("timed out") {
        ErrorKind::Timeout
    } else if message.contains("not found")
        || message.contains("enotfound")
        || message.contains("dns error")
        || message.contains("failed to lookup address")
    {
        ErrorKind::Connection
    } else if message.contains("unauthorized") || message.contains("forbidden") {
        ErrorKind::Authentication
    } else {
        match status_code {
            Some(status) if status >= 500 => ErrorKind::Server,
            Some(status) if status >= 400 => ErrorKind::Authentication,
            _ if message.contains("json") || message.contains("parse") => ErrorKind::Server,
            _ => ErrorKind::Unknown,
        }
    }
}

fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refused_is_connection() {
        let err = classify("connect ECONNREFUSED 127.0.0.1:8443", &ErrorContext::default());
        assert_eq!(err.kind, ErrorKind::Connection);
        assert!(err.suggestion.is_some());
    }

    #[test]
    fn test_timeout_is_timeout() {
        assert_eq!(classify_kind("timeout", None), ErrorKind::Timeout);
        assert_eq!(classify_kind("operation timed out", None), ErrorKind::Timeout);
    }

    #[test]
    fn test_dns_failure_is_connection() {
        assert_eq!(classify_kind("getaddrinfo ENOTFOUND llm.internal", None), ErrorKind::Connection);
        assert_eq!(classify_kind("dns error: failed to lookup address information", None), ErrorKind::Connection);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(classify_kind("HTTP error", Some(401)), ErrorKind::Authentication);
        assert_eq!(classify_kind("HTTP error", Some(503)), ErrorKind::Server);
        assert_eq!(classify_kind("HTTP error", Some(302)), ErrorKind::Unknown);
    }

    #[test]
    fn test_rule_priority() {
        // Message rules beat status rules.
        assert_eq!(classify_kind("connection refused", Some(503)), ErrorKind::Connection);
        assert_eq!(classify_kind("Forbidden", Some(500)), ErrorKind::Authentication);
        // Status rules beat the json/parse rule.
        assert_eq!(classify_kind("json parse failure", Some(404)), ErrorKind::Authentication);
        assert_eq!(classify_kind("invalid JSON body", None), ErrorKind::Server);
    }

    #[test]
    fn test_unknown() {
        let err = classify("something odd happened", &ErrorContext::default());
        assert_eq!(err.kind, ErrorKind::Unknown);
    }

    #[test]
    fn test_context_is_carried() {
        let ctx = ErrorContext::for_url("http://localhost:8080/v1").with_status(401);
        let err = classify("HTTP 401", &ctx);
        assert_eq!(err.kind, ErrorKind::Authentication);
        assert_eq!(err.status_code, Some(401));
        assert_eq!(err.url.as_deref(), Some("http://localhost:8080/v1"));
    }

    #[test]
    fn test_diagnostic_report_mentions_everything() {
        let ctx = ErrorContext::for_url("http://localhost:8080/v1").with_status(503);
        let report = classify("HTTP 503: overloaded", &ctx).diagnostic_report();
        assert!(report.contains("server"));
        assert!(report.contains("503"));
        assert!(report.contains("http://localhost:8080/v1"));
        assert!(report.contains("overloaded"));
    }
}
