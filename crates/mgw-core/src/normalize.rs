//! # Contact-Field Normalization
//!
//! Free-function helpers shared by the identifier newtypes and the API
//! layer: phone canonicalization and the inline-photo payload heuristic.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Normalize a phone number to canonical form.
///
/// Strips spaces, dashes, dots, and parentheses. A single leading `+` is
/// preserved; everything after it must be 7–15 decimal digits. Returns
/// `None` when the input cannot be normalized.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let (plus, rest) = match trimmed.strip_prefix('+') {
        Some(rest) => ("+", rest),
        None => ("", trimmed),
    };

    let mut digits = String::with_capacity(rest.len());
    for c in rest.chars() {
        match c {
            '0'..='9' => digits.push(c),
            ' ' | '-' | '.' | '(' | ')' => {}
            _ => return None,
        }
    }

    if digits.len() < 7 || digits.len() > 15 {
        return None;
    }

    Some(format!("{plus}{digits}"))
}

/// Heuristic check for inline Base64 payloads.
///
/// Customer profile photos arrive in a single free-text field that carries
/// either a URL or raw Base64 image data. The field is classified as Base64
/// when it is at least 16 characters, a multiple of 4, drawn from the
/// standard alphabet (with up to two trailing `=` pads), and decodes
/// cleanly. URLs fail the alphabet check on `:` and `/` in practice, but
/// the decode step is kept as the final arbiter.
pub fn looks_like_base64(value: &str) -> bool {
    let s = value.trim();
    if s.len() < 16 || s.len() % 4 != 0 {
        return false;
    }

    let pad = s.chars().rev().take_while(|c| *c == '=').count();
    if pad > 2 {
        return false;
    }
    let body = &s[..s.len() - pad];
    if !body
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/')
    {
        return false;
    }

    STANDARD.decode(s).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn normalize_phone_strips_formatting() {
        assert_eq!(
            normalize_phone("+852 9123-4567").as_deref(),
            Some("+85291234567")
        );
        assert_eq!(
            normalize_phone("(02) 1234.5678").as_deref(),
            Some("0212345678")
        );
    }

    #[test]
    fn normalize_phone_rejects_bad_input() {
        assert!(normalize_phone("").is_none());
        assert!(normalize_phone("12345").is_none()); // too short
        assert!(normalize_phone("1234567890123456").is_none()); // too long
        assert!(normalize_phone("9123x4567").is_none()); // letter
        assert!(normalize_phone("9123+4567").is_none()); // inner plus
    }

    #[test]
    fn base64_detects_encoded_payload() {
        // "profile photo bytes!" encoded — 28 chars, valid padding.
        assert!(looks_like_base64("cHJvZmlsZSBwaG90byBieXRlcyE="));
    }

    #[test]
    fn base64_rejects_urls_and_short_values() {
        assert!(!looks_like_base64("https://cdn.example.com/p/1.jpg"));
        assert!(!looks_like_base64("QUJD")); // multiple of 4 but too short
        assert!(!looks_like_base64(""));
        assert!(!looks_like_base64("cHJvZmlsZSBwaG90byBieXRlcyE===")); // over-padded
    }

    proptest! {
        /// Normalization is idempotent: normalizing a canonical phone
        /// returns it unchanged.
        #[test]
        fn normalize_phone_idempotent(digits in "[0-9]{7,15}", plus in proptest::bool::ANY) {
            let input = if plus { format!("+{digits}") } else { digits.clone() };
            let once = normalize_phone(&input).unwrap();
            let twice = normalize_phone(&once).unwrap();
            prop_assert_eq!(once, twice);
        }

        /// The canonical form never contains formatting characters.
        #[test]
        fn normalized_phone_is_digits(raw in "[0-9 ().-]{7,20}") {
            if let Some(canonical) = normalize_phone(&raw) {
                prop_assert!(canonical.chars().all(|c| c.is_ascii_digit()));
            }
        }
    }
}
