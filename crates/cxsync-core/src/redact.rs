//! PII redaction for free-text AI feedback before persistence.

use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\w.-]+@[\w.-]+\.\w+").expect("email pattern"));
static CARD_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{13,19}\b").expect("card pattern"));
static LONG_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{6,}\b").expect("long number pattern"));
static PHONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\+?\d[\d\-\s()]{6,}\d").expect("phone pattern"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("ws pattern"));

/// Redact emails, card-like numbers, long ids and phone numbers, then
/// collapse whitespace. Order matters: card numbers before generic long
/// numbers so the more specific placeholder is never shadowed.
pub fn anonymize_text(text: &str) -> String {
    let s = EMAIL.replace_all(text, "[REDACTED_EMAIL]");
    let s = CARD_NUMBER.replace_all(&s, "[REDACTED_NUMBER]");
    let s = LONG_NUMBER.replace_all(&s, "[REDACTED_NUMBER]");
    let s = PHONE.replace_all(&s, "[REDACTED_PHONE]");
    WHITESPACE.replace_all(&s, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_redacted() {
        assert_eq!(
            anonymize_text("contact me at jane.doe@example.com please"),
            "contact me at [REDACTED_EMAIL] please"
        );
    }

    #[test]
    fn long_numbers_are_redacted() {
        assert_eq!(
            anonymize_text("order 123456789 failed"),
            "order [REDACTED_NUMBER] failed"
        );
    }

    #[test]
    fn phone_numbers_are_redacted() {
        assert_eq!(
            anonymize_text("call +40 721-555-123 now"),
            "call [REDACTED_PHONE] now"
        );
    }

    #[test]
    fn whitespace_is_collapsed() {
        assert_eq!(anonymize_text("  agent   was\n\nhelpful "), "agent was helpful");
    }

    #[test]
    fn clean_text_is_untouched() {
        assert_eq!(anonymize_text("resolved quickly"), "resolved quickly");
    }
}
