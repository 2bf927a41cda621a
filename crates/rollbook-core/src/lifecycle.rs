use crate::CoreError;
use rollbook_store::EnrollmentStatus;

/// Validate a status transition for one enrollment row.
///
/// `active` is the sole non-terminal state; every terminal status is
/// absorbing, so the only legal moves are out of `active`.
pub fn validate_transition(
    from: EnrollmentStatus,
    to: EnrollmentStatus,
) -> Result<(), CoreError> {
    let valid = matches!(
        (from, to),
        (
            EnrollmentStatus::Active,
            EnrollmentStatus::Promoted
                | EnrollmentStatus::Retained
                | EnrollmentStatus::Transferred
                | EnrollmentStatus::Graduated
                | EnrollmentStatus::Dropped
        )
    );

    if valid {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_transitions() {
        assert!(validate_transition(EnrollmentStatus::Active, EnrollmentStatus::Promoted).is_ok());
        assert!(validate_transition(EnrollmentStatus::Active, EnrollmentStatus::Retained).is_ok());
        assert!(
            validate_transition(EnrollmentStatus::Active, EnrollmentStatus::Transferred).is_ok()
        );
        assert!(validate_transition(EnrollmentStatus::Active, EnrollmentStatus::Graduated).is_ok());
        assert!(validate_transition(EnrollmentStatus::Active, EnrollmentStatus::Dropped).is_ok());
    }

    #[test]
    fn terminal_states_are_absorbing() {
        assert!(
            validate_transition(EnrollmentStatus::Promoted, EnrollmentStatus::Active).is_err()
        );
        assert!(
            validate_transition(EnrollmentStatus::Promoted, EnrollmentStatus::Retained).is_err()
        );
        assert!(
            validate_transition(EnrollmentStatus::Graduated, EnrollmentStatus::Dropped).is_err()
        );
        assert!(
            validate_transition(EnrollmentStatus::Transferred, EnrollmentStatus::Promoted)
                .is_err()
        );
        assert!(validate_transition(EnrollmentStatus::Dropped, EnrollmentStatus::Active).is_err());
    }

    #[test]
    fn active_to_active_is_invalid() {
        assert!(validate_transition(EnrollmentStatus::Active, EnrollmentStatus::Active).is_err());
    }

    #[test]
    fn error_names_both_states() {
        let err = validate_transition(EnrollmentStatus::Retained, EnrollmentStatus::Promoted)
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("retained"));
        assert!(msg.contains("promoted"));
    }
}
