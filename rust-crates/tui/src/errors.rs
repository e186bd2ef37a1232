use color_eyre::eyre::Report;
use std::fmt;

const MAX_FALLBACK_CHARS: usize = 200;
const REVERT_PREFIX: &str = "execution reverted: ";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    WalletRejected,
    InsufficientFunds,
    ContractRule,
    Network,
    Reverted,
    Unrecognized,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FriendlyError {
    pub kind: ErrorKind,
    pub message: String,
}

impl FriendlyError {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for FriendlyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

struct Rule {
    matches: fn(&str) -> bool,
    kind: ErrorKind,
    message: &'static str,
}

fn any_of(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

// Order matters: the first matching rule wins, so narrower phrases come before
// the generic words they contain.
const RULES: &[Rule] = &[
    Rule {
        matches: |m| any_of(m, &["usdc transfer failed", "transfer failed"]),
        kind: ErrorKind::InsufficientFunds,
        message: "❌ USDC transfer failed. Make sure you have enough balance and approved the transaction.",
    },
    Rule {
        matches: |m| any_of(m, &["transfer amount exceeds allowance", "exceeds allowance"]),
        kind: ErrorKind::InsufficientFunds,
        message: "❌ Insufficient allowance. Please approve USDC again.",
    },
    Rule {
        matches: |m| any_of(m, &["insufficient funds", "insufficient balance"]),
        kind: ErrorKind::InsufficientFunds,
        message: "❌ Insufficient funds. Make sure you have enough USDC and ETH for gas fees.",
    },
    Rule {
        matches: |m| any_of(m, &["allowance", "insufficient"]),
        kind: ErrorKind::InsufficientFunds,
        message: "❌ Insufficient allowance. Please approve USDC first.",
    },
    Rule {
        matches: |m| m.contains("already joined"),
        kind: ErrorKind::ContractRule,
        message: "❌ You have already joined this lottery!",
    },
    Rule {
        matches: |m| m.contains("first user must use owner"),
        kind: ErrorKind::ContractRule,
        message: "❌ First user must use the contract owner as referrer.",
    },
    Rule {
        matches: |m| m.contains("valid participant referrer required"),
        kind: ErrorKind::ContractRule,
        message: "❌ Invalid referrer address. The referrer must be a participant who already joined.",
    },
    Rule {
        matches: |m| m.contains("valid referrer"),
        kind: ErrorKind::ContractRule,
        message: "❌ Please provide a valid referrer address.",
    },
    Rule {
        matches: |m| m.contains("max") && m.contains("per") && m.contains("day"),
        kind: ErrorKind::ContractRule,
        message: "⚠️ This referrer has reached the daily referral limit (20/day).",
    },
    Rule {
        matches: |m| any_of(m, &["user rejected", "user denied"]),
        kind: ErrorKind::WalletRejected,
        message: "❌ Transaction rejected. Please approve to join the lottery.",
    },
    Rule {
        matches: |m| any_of(m, &["network", "connection"]),
        kind: ErrorKind::Network,
        message: "❌ Network error. Check your connection and try again.",
    },
    Rule {
        matches: |m| m.contains("replacement underpriced"),
        kind: ErrorKind::Network,
        message: "❌ Gas price too low. Please try again.",
    },
];

pub fn friendly_error(raw: &str) -> FriendlyError {
    if raw.trim().is_empty() {
        return FriendlyError::new(ErrorKind::Unrecognized, "Unknown error occurred");
    }
    let lowered = raw.to_lowercase();
    if let Some(rule) = RULES.iter().find(|rule| (rule.matches)(&lowered)) {
        return FriendlyError::new(rule.kind, rule.message);
    }

    // ASCII lowering keeps byte offsets aligned with `raw`.
    if let Some(start) = raw.to_ascii_lowercase().find(REVERT_PREFIX) {
        let reason = revert_reason(&raw[start + REVERT_PREFIX.len()..]);
        if !reason.is_empty() {
            return FriendlyError::new(ErrorKind::Reverted, format!("❌ {reason}"));
        }
    }
    if lowered.contains("execution reverted") {
        return FriendlyError::new(
            ErrorKind::Reverted,
            "❌ Transaction reverted. Check the error message for details.",
        );
    }

    let clipped: String = raw.chars().take(MAX_FALLBACK_CHARS).collect();
    FriendlyError::new(ErrorKind::Unrecognized, format!("❌ {clipped}"))
}

pub fn report_text(err: &Report) -> String {
    err.chain()
        .map(|cause| cause.to_string())
        .collect::<Vec<_>>()
        .join(": ")
}

fn revert_reason(tail: &str) -> &str {
    tail.lines().next().unwrap_or_default().trim()
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn friendly_error__empty_message__is_unknown() {
        let err = friendly_error("   ");
        assert_eq!(err.kind, ErrorKind::Unrecognized);
        assert_eq!(err.message, "Unknown error occurred");
    }

    #[test]
    fn friendly_error__matching_is_case_insensitive() {
        let err = friendly_error("Error: ALREADY JOINED");
        assert_eq!(err.kind, ErrorKind::ContractRule);
        assert_eq!(err.message, "❌ You have already joined this lottery!");
    }

    #[test]
    fn friendly_error__exceeds_allowance__asks_to_approve_again() {
        let err = friendly_error("ERC20: transfer amount exceeds allowance");
        assert_eq!(err.message, "❌ Insufficient allowance. Please approve USDC again.");
    }

    #[test]
    fn friendly_error__insufficient_funds__mentions_gas() {
        let err = friendly_error("insufficient funds for gas * price + value");
        assert_eq!(err.kind, ErrorKind::InsufficientFunds);
        assert!(err.message.contains("ETH for gas fees"));
    }

    #[test]
    fn friendly_error__participant_referrer__wins_over_generic_referrer_rule() {
        let err = friendly_error("execution reverted: Valid participant referrer required");
        assert_eq!(
            err.message,
            "❌ Invalid referrer address. The referrer must be a participant who already joined."
        );
    }

    #[test]
    fn friendly_error__daily_cap__is_a_warning() {
        let err = friendly_error("execution reverted: Max 20 referrals per day");
        assert_eq!(err.kind, ErrorKind::ContractRule);
        assert!(err.message.starts_with("⚠️"));
    }

    #[test]
    fn friendly_error__wallet_rejection() {
        let err = friendly_error("User rejected the request.");
        assert_eq!(err.kind, ErrorKind::WalletRejected);
    }

    #[test]
    fn friendly_error__unknown_revert_reason__is_echoed() {
        let err = friendly_error("server returned an error: execution reverted: Lottery closed");
        assert_eq!(err.kind, ErrorKind::Reverted);
        assert_eq!(err.message, "❌ Lottery closed");
    }

    #[test]
    fn friendly_error__bare_revert__is_generic() {
        let err = friendly_error("execution reverted");
        assert_eq!(
            err.message,
            "❌ Transaction reverted. Check the error message for details."
        );
    }

    #[test]
    fn friendly_error__unmatched__is_truncated_to_200_chars() {
        let raw = "x".repeat(500);
        let err = friendly_error(&raw);
        assert_eq!(err.kind, ErrorKind::Unrecognized);
        assert_eq!(err.message.chars().count(), 2 + 200);
    }
}
