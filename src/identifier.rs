//! Identifier validation.
//!
//! Every name that crosses into the script environment (namespace keys,
//! member names, parameter labels, dictionary keys, module ids) must match
//! `^[\p{L}_$][\p{L}0-9_$]*$`. Comparison is exact code-point equality.

use regex::Regex;
use thiserror::Error;

lazy_static! {
    static ref PATTERN: Regex = Regex::new(r"^[\p{L}_$][\p{L}0-9_$]*$").unwrap();
}

/// Raised when a string does not match the identifier pattern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{0}' is not a valid identifier")]
pub struct InvalidIdentifier(pub String);

pub fn is_valid(name: &str) -> bool {
    PATTERN.is_match(name)
}

pub fn validate(name: &str) -> Result<(), InvalidIdentifier> {
    if is_valid(name) {
        Ok(())
    } else {
        Err(InvalidIdentifier(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_letters_underscore_and_dollar_starts() {
        for name in &["x", "_", "$", "player", "Player2", "_tmp", "$root", "straße", "名前", "a_b$c9"] {
            assert!(is_valid(name), "{} should be valid", name);
        }
    }

    #[test]
    fn rejects_everything_else() {
        for name in &["", "9lives", "a-b", "a b", "a.b", "mod:x", "x!", "٣x", "a\n"] {
            assert!(!is_valid(name), "{:?} should be invalid", name);
        }
    }

    #[test]
    fn only_ascii_digits_count_as_digits() {
        // Arabic-Indic digit three is not in [0-9] and not a letter.
        assert!(!is_valid("x٣"));
        assert!(is_valid("x3"));
    }

    #[test]
    fn validate_reports_the_offending_name() {
        let err = validate("1abc").unwrap_err();
        assert_eq!(err.to_string(), "'1abc' is not a valid identifier");
    }
}
