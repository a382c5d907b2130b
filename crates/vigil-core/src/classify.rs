//! Maps raw gateway failures to operator-facing guidance.
//!
//! The match order matters: error texts routinely satisfy several
//! predicates at once (a gateway close frame can mention "403"), so the
//! table below is checked top to bottom and the first hit wins.

use serde::{Deserialize, Serialize};

use crate::gateway::{GatewayError, GatewayErrorCode};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Authentication,
    RateLimit,
    Network,
    Permission,
    Gateway,
    Unknown,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::RateLimit => write!(f, "rate_limit"),
            Self::Network => write!(f, "network"),
            Self::Permission => write!(f, "permission"),
            Self::Gateway => write!(f, "gateway"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// A classified failure: fixed message and suggestion per kind, except
/// `Unknown` which carries the raw text verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub message: String,
    pub suggestion: String,
}

/// Classify a raw gateway error. Pure and total; never fails.
pub fn classify(error: &GatewayError) -> ClassifiedError {
    let text = error.message.as_str();

    if text.contains("401") || text.contains("Unauthorized") {
        return fixed(
            ErrorKind::Authentication,
            "Invalid or expired Discord token",
            "Please verify your token is correct and hasn't expired",
        );
    }

    if text.contains("429") || text.contains("rate limit") {
        return fixed(
            ErrorKind::RateLimit,
            "Rate limited by Discord",
            "Too many connection attempts. Please wait before retrying",
        );
    }

    if matches!(
        error.code,
        Some(GatewayErrorCode::ResolutionFailure)
            | Some(GatewayErrorCode::ConnectionRefused)
            | Some(GatewayErrorCode::Timeout)
    ) {
        return fixed(
            ErrorKind::Network,
            "Network connection failed",
            "Check your internet connection and firewall settings",
        );
    }

    if text.contains("403") || text.contains("Forbidden") {
        return fixed(
            ErrorKind::Permission,
            "Account suspended or restricted",
            "Your Discord account may be suspended or require verification",
        );
    }

    if text.contains("gateway") || text.contains("websocket") {
        return fixed(
            ErrorKind::Gateway,
            "Discord gateway connection failed",
            "Discord servers may be experiencing issues",
        );
    }

    ClassifiedError {
        kind: ErrorKind::Unknown,
        message: text.to_string(),
        suggestion: "Check server logs for more details".to_string(),
    }
}

fn fixed(kind: ErrorKind, message: &str, suggestion: &str) -> ClassifiedError {
    ClassifiedError {
        kind,
        message: message.to_string(),
        suggestion: suggestion.to_string(),
    }
}
