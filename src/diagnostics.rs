//! Structured log records for chat exchanges
//!
//! Each failure branch of the proxy emits exactly one record through
//! [`log_failure`], carrying the failure kind, the upstream status when there
//! is one, and a whitespace-normalized, truncated copy of the body.

use std::fmt;

/// Failure branches of an exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Request body over the size limit
    RequestTooLarge,
    /// No upstream credential configured
    Configuration,
    /// Upstream unreachable or the connection failed mid-response
    UpstreamTransport,
    /// Upstream answered with a non-success status
    UpstreamStatus,
    /// Upstream payload lacks `choices[0].message.content`
    UpstreamShape,
    /// Upstream succeeded but generated no text
    EmptyContent,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::RequestTooLarge => "request_too_large",
            FailureKind::Configuration => "configuration",
            FailureKind::UpstreamTransport => "upstream_transport",
            FailureKind::UpstreamStatus => "upstream_status",
            FailureKind::UpstreamShape => "upstream_shape",
            FailureKind::EmptyContent => "empty_content",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Emit the single log record for a failure branch
pub fn log_failure(kind: FailureKind, status: Option<u16>, body: &str) {
    let body = preview(body);
    match kind {
        FailureKind::EmptyContent | FailureKind::RequestTooLarge => {
            tracing::warn!(kind = %kind, status = ?status, body = %body, "Chat exchange degraded");
        }
        _ => {
            tracing::error!(kind = %kind, status = ?status, body = %body, "Chat exchange failed");
        }
    }
}

/// Format the one-line summary logged for each forwarded message
pub fn format_exchange_log(message: &str) -> String {
    format!("→ chars={} \"{}\"", message.chars().count(), preview(message))
}

/// Normalize whitespace and truncate for logging
pub fn preview(s: &str) -> String {
    truncate_message(&normalize_whitespace(s))
}

/// Convert newlines and tabs to single spaces, collapse multiple spaces
fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate on character boundaries:
/// - If <= 100 chars: show all
/// - If > 100 chars: first 25 + " ... " + last 75
fn truncate_message(s: &str) -> String {
    const MAX_TOTAL: usize = 100;
    const PREFIX_LEN: usize = 25;
    const SUFFIX_LEN: usize = 75;
    const ELLIPSIS: &str = " ... ";

    let total = s.chars().count();
    if total <= MAX_TOTAL {
        return s.to_string();
    }

    let prefix: String = s.chars().take(PREFIX_LEN).collect();
    let suffix: String = s.chars().skip(total - SUFFIX_LEN).collect();

    format!("{}{}{}", prefix, ELLIPSIS, suffix)
}
