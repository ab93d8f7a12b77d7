//! Failure taxonomy and classifier.
//!
//! Maps a fault raised while driving the UI flow to one of a closed set of
//! category labels. Classification runs a priority-ordered rule table,
//! first match wins, against the fault's declared kind and its lowercased
//! message text.
//!
//! Matching on driver message substrings is a fragile coupling to the
//! driver's diagnostic wording. The ordered table is the portable contract;
//! the substrings are adapted per driver (here, to [`HttpFlowDriver`]'s
//! vocabulary) and must be re-adapted when the driver changes.
//!
//! [`HttpFlowDriver`]: crate::driver::HttpFlowDriver

use serde::{Deserialize, Serialize};

use crate::driver::DriverError;

/// Closed set of failure categories. Never freeform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// An operation exceeded its deadline.
    Timeout,
    /// A deadline expired during a click action.
    ClickTimeout,
    /// A postcondition check failed.
    Assertion,
    /// A locator resolved to more than one element.
    StrictMode,
    /// Target element exists but is not visible.
    NotVisible,
    /// Target element exists but is not enabled.
    NotEnabled,
    /// Another element received the pointer event.
    ClickIntercepted,
    /// Low-level connection failure.
    Network,
    /// Fallback for anything unmatched.
    Other,
}

impl ErrorCategory {
    /// Wire name, as stored in trial records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::ClickTimeout => "click_timeout",
            Self::Assertion => "assertion",
            Self::StrictMode => "strict_mode",
            Self::NotVisible => "not_visible",
            Self::NotEnabled => "not_enabled",
            Self::ClickIntercepted => "click_intercepted",
            Self::Network => "network",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classification rule: a swappable predicate over the fault's kind and
/// lowercased message, and the category it assigns.
pub struct Rule {
    pub category: ErrorCategory,
    pub applies: fn(&DriverError, &str) -> bool,
}

/// The taxonomy, in priority order. Earliest rule wins.
pub static RULES: &[Rule] = &[
    Rule {
        category: ErrorCategory::ClickTimeout,
        applies: |err, msg| matches!(err, DriverError::Timeout { .. }) && msg.contains("click"),
    },
    Rule {
        category: ErrorCategory::Timeout,
        applies: |err, _| matches!(err, DriverError::Timeout { .. }),
    },
    Rule {
        category: ErrorCategory::Assertion,
        applies: |err, msg| {
            matches!(err, DriverError::Assertion { .. }) || msg.contains("assertion failed")
        },
    },
    Rule {
        category: ErrorCategory::StrictMode,
        applies: |err, msg| {
            matches!(err, DriverError::StrictMode { .. }) || msg.contains("strict mode violation")
        },
    },
    Rule {
        category: ErrorCategory::NotVisible,
        applies: |err, msg| {
            matches!(err, DriverError::NotVisible { .. }) || msg.contains("is not visible")
        },
    },
    Rule {
        category: ErrorCategory::NotEnabled,
        applies: |err, msg| {
            matches!(err, DriverError::NotEnabled { .. }) || msg.contains("is not enabled")
        },
    },
    Rule {
        category: ErrorCategory::ClickIntercepted,
        applies: |err, msg| {
            matches!(err, DriverError::ClickIntercepted { .. })
                || msg.contains("intercept")
                || msg.contains("other element would receive the click")
                || msg.contains("pointer events")
        },
    },
    Rule {
        category: ErrorCategory::Network,
        applies: |err, msg| {
            matches!(err, DriverError::Network { .. })
                || msg.contains("net::")
                || msg.contains("connection refused")
        },
    },
    Rule {
        category: ErrorCategory::Other,
        applies: |_, _| true,
    },
];

/// Classifies a fault. Pure; never fails.
pub fn classify(err: &DriverError) -> ErrorCategory {
    let msg = err.to_string().to_lowercase();
    RULES
        .iter()
        .find(|rule| (rule.applies)(err, &msg))
        .map(|rule| rule.category)
        .unwrap_or(ErrorCategory::Other)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn timeout(message: &str) -> DriverError {
        DriverError::Timeout {
            timeout_ms: 500,
            message: message.to_string(),
        }
    }

    #[test]
    fn click_timeout_beats_generic_timeout() {
        assert_eq!(
            classify(&timeout("click action on \"button#approve\" did not complete")),
            ErrorCategory::ClickTimeout
        );
        assert_eq!(
            classify(&timeout("waiting for selector \"#status\" to contain \"Approved\"")),
            ErrorCategory::Timeout
        );
    }

    #[test]
    fn earliest_rule_wins_on_multi_matching_messages() {
        // Contains both click and pointer-interception vocabulary; the
        // timeout rules sit above the interception rule.
        let err = timeout(
            "click action on \"button#approve\": <div id=\"flake-overlay\"> \
             intercepts pointer events",
        );
        assert_eq!(classify(&err), ErrorCategory::ClickTimeout);
    }

    #[test]
    fn kind_based_rules() {
        assert_eq!(
            classify(&DriverError::Assertion {
                message: "expected \"#status\" to contain \"Approved\", got \"Error\"".into()
            }),
            ErrorCategory::Assertion
        );
        assert_eq!(
            classify(&DriverError::StrictMode {
                message: "locator \"#list a\" resolved to 5 elements".into()
            }),
            ErrorCategory::StrictMode
        );
        assert_eq!(
            classify(&DriverError::NotVisible {
                selector: "button#approve".into()
            }),
            ErrorCategory::NotVisible
        );
        assert_eq!(
            classify(&DriverError::NotEnabled {
                selector: "button#approve".into()
            }),
            ErrorCategory::NotEnabled
        );
        assert_eq!(
            classify(&DriverError::ClickIntercepted {
                message: "another element would receive the click".into()
            }),
            ErrorCategory::ClickIntercepted
        );
        assert_eq!(
            classify(&DriverError::Network {
                message: "connection refused: tcp connect error".into()
            }),
            ErrorCategory::Network
        );
    }

    #[test]
    fn substring_rules_cover_foreign_driver_messages() {
        // A driver that only exposes an opaque error type still classifies
        // through the message text.
        assert_eq!(
            classify(&DriverError::Other {
                message: "strict mode violation: locator matched 3 nodes".into()
            }),
            ErrorCategory::StrictMode
        );
        assert_eq!(
            classify(&DriverError::Other {
                message: "net::ERR_CONNECTION_REFUSED at http://127.0.0.1:8004/".into()
            }),
            ErrorCategory::Network
        );
    }

    #[test]
    fn unmatched_falls_back_to_other() {
        assert_eq!(
            classify(&DriverError::Other {
                message: "something weird happened".into()
            }),
            ErrorCategory::Other
        );
    }

    #[test]
    fn category_wire_names_are_snake_case() {
        assert_eq!(ErrorCategory::ClickTimeout.as_str(), "click_timeout");
        assert_eq!(
            serde_json::to_string(&ErrorCategory::StrictMode).unwrap(),
            "\"strict_mode\""
        );
    }
}
