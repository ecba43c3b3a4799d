//! CanaryGuard: the last check before anything leaves the machine. Scans
//! the fully-sanitized outbound payload for SSN/EIN-shaped residue that
//! the detector should have already caught, and aborts rather than send
//! if it finds any.

use crate::error::GatewayError;
use regex::Regex;
use std::sync::LazyLock;

static SSN_SHAPE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d{3}[-\s]\d{2}[-\s]\d{4}\b").unwrap());
static EIN_SHAPE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d{2}-\d{7}\b").unwrap());

/// Returns `Err(GatewayError::CanaryTripped)` if `payload` still contains
/// an SSN- or EIN-shaped run of digits. The error never carries the
/// offending substring — callers must not log it either.
pub fn assert_no_leaked_pii(payload: &str) -> Result<(), GatewayError> {
    if SSN_SHAPE_RE.is_match(payload) || EIN_SHAPE_RE.is_match(payload) {
        return Err(GatewayError::CanaryTripped);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_clean_payload() {
        assert!(assert_no_leaked_pii(r#"{"content":"contact [person_1] about [ssn_1]"}"#).is_ok());
    }

    #[test]
    fn trips_on_residual_ssn_shape() {
        let err = assert_no_leaked_pii("leftover 123-45-6789 somehow").unwrap_err();
        assert!(matches!(err, GatewayError::CanaryTripped));
    }

    #[test]
    fn trips_on_residual_ssn_shape_with_spaces() {
        assert!(assert_no_leaked_pii("123 45 6789").is_err());
    }

    #[test]
    fn trips_on_residual_ein_shape() {
        assert!(assert_no_leaked_pii("EIN 12-3456789 leaked").is_err());
    }

    #[test]
    fn error_display_never_includes_the_matched_text() {
        let err = assert_no_leaked_pii("123-45-6789").unwrap_err();
        assert!(!err.to_string().contains("123-45-6789"));
    }
}
