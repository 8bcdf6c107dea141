//! Field rules shared by subscription and notification writes.

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

static TOPIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-_A-Za-z0-9]{1,64}$").expect("valid topic regex"));
static BASE_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://[^\s/?#]+(/[^\s?#]*)?$").expect("valid base url regex")
});

/// Rejected field values for store writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    InvalidBaseUrl(String),
    InvalidTopic(String),
    InvalidNotificationId(String),
    NegativeTimestamp(i64),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidBaseUrl(value) => {
                write!(f, "base url must be an absolute http(s) url, got `{value}`")
            }
            Self::InvalidTopic(value) => write!(
                f,
                "topic must be 1-64 characters of [-_A-Za-z0-9], got `{value}`"
            ),
            Self::InvalidNotificationId(value) => write!(
                f,
                "notification id must be non-empty without whitespace, got `{value}`"
            ),
            Self::NegativeTimestamp(value) => {
                write!(f, "notification timestamp must be >= 0, got {value}")
            }
        }
    }
}

impl Error for ValidationError {}

/// Trims whitespace and trailing slashes so `https://ntfy.sh/` and
/// `https://ntfy.sh` address the same server.
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}

pub(crate) fn check_base_url(base_url: &str) -> Result<(), ValidationError> {
    if BASE_URL_RE.is_match(base_url) {
        Ok(())
    } else {
        Err(ValidationError::InvalidBaseUrl(base_url.to_string()))
    }
}

pub(crate) fn check_topic(topic: &str) -> Result<(), ValidationError> {
    if TOPIC_RE.is_match(topic) {
        Ok(())
    } else {
        Err(ValidationError::InvalidTopic(topic.to_string()))
    }
}

pub(crate) fn check_notification_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() || id.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidNotificationId(id.to_string()));
    }
    Ok(())
}

pub(crate) fn check_timestamp(timestamp: i64) -> Result<(), ValidationError> {
    if timestamp < 0 {
        return Err(ValidationError::NegativeTimestamp(timestamp));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_base_url_strips_whitespace_and_trailing_slashes() {
        assert_eq!(normalize_base_url(" https://ntfy.sh// "), "https://ntfy.sh");
        assert_eq!(
            normalize_base_url("http://10.0.0.2:8080/ntfy/"),
            "http://10.0.0.2:8080/ntfy"
        );
    }

    #[test]
    fn base_url_requires_http_scheme_and_host() {
        assert!(check_base_url("https://ntfy.sh").is_ok());
        assert!(check_base_url("http://localhost:2586").is_ok());
        assert!(check_base_url("ntfy.sh").is_err());
        assert!(check_base_url("ftp://ntfy.sh").is_err());
        assert!(check_base_url("https://").is_err());
    }

    #[test]
    fn topic_rules_match_server_limits() {
        assert!(check_topic("alerts").is_ok());
        assert!(check_topic("backup_job-01").is_ok());
        assert!(check_topic("").is_err());
        assert!(check_topic("has space").is_err());
        assert!(check_topic(&"x".repeat(65)).is_err());
    }

    #[test]
    fn notification_id_and_timestamp_rules() {
        assert!(check_notification_id("n1").is_ok());
        assert!(check_notification_id("").is_err());
        assert!(check_notification_id("a b").is_err());
        assert!(check_timestamp(0).is_ok());
        assert_eq!(
            check_timestamp(-1),
            Err(ValidationError::NegativeTimestamp(-1))
        );
    }
}
