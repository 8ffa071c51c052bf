//! Typed confirmation for destructive operations.

use crate::error::AppError;

/// Require the user to have typed `expected` exactly.
///
/// Used before deleting repositories and organization robots. The match is
/// exact: no trimming, no case folding.
pub fn confirm_destructive(expected: &str, typed: &str) -> Result<(), AppError> {
    if expected.is_empty() {
        return Err(AppError::invalid_input_field(
            "Nothing to confirm",
            "confirmation",
        ));
    }

    if typed != expected {
        log::debug!("[confirm] Rejected confirmation for '{}'", expected);
        return Err(AppError::invalid_input_field(
            format!("Type '{}' to confirm", expected),
            "confirmation",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match_passes() {
        assert!(confirm_destructive("acme/web", "acme/web").is_ok());
    }

    #[test]
    fn test_near_misses_rejected() {
        for typed in ["", "acme/Web", " acme/web", "acme/web ", "acme"] {
            let err = confirm_destructive("acme/web", typed).unwrap_err();
            match err {
                AppError::InvalidInput { field, .. } => {
                    assert_eq!(field.as_deref(), Some("confirmation"))
                }
                other => panic!("unexpected error: {:?}", other),
            }
        }
    }

    #[test]
    fn test_empty_expected_never_confirms() {
        assert!(confirm_destructive("", "").is_err());
    }
}
