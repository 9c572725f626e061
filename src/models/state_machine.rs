// Phase status state machine with validation

use super::{Phase, PhaseRecord, PhaseStatus, Phases, STALE_PROCESSING_MINUTES};
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateTransitionError {
    #[error("Invalid phase transition from {from:?} to {to:?}")]
    InvalidTransition { from: PhaseStatus, to: PhaseStatus },

    #[error("Phase {phase} cannot be started. Previous phase not completed.")]
    PreviousPhaseIncomplete { phase: u8 },
}

/// Error message recorded when a stale processing phase is force-failed
pub const INTERRUPTED_ERROR: &str = "Process was interrupted or timed out";

/// Validates if a phase can transition from one status to another
pub fn can_transition(from: PhaseStatus, to: PhaseStatus) -> bool {
    match (from, to) {
        // From Pending
        (PhaseStatus::Pending, PhaseStatus::Processing) => true,
        (PhaseStatus::Pending, PhaseStatus::Failed) => true, // Can fail during validation

        // From Processing
        (PhaseStatus::Processing, PhaseStatus::Completed) => true,
        (PhaseStatus::Processing, PhaseStatus::Failed) => true,

        // Completed and Failed both permit a retry back into Processing
        (PhaseStatus::Completed, PhaseStatus::Processing) => true,
        (PhaseStatus::Failed, PhaseStatus::Processing) => true,
        (PhaseStatus::Failed, PhaseStatus::Pending) => true, // Destructive reset
        (PhaseStatus::Completed, PhaseStatus::Pending) => true, // Destructive reset

        // Same state is always allowed (no-op)
        (a, b) if a == b => true,

        // All other transitions are invalid
        _ => false,
    }
}

/// Validates and performs a status transition
pub fn transition_state(
    current: PhaseStatus,
    target: PhaseStatus,
) -> Result<PhaseStatus, StateTransitionError> {
    if !can_transition(current, target) {
        return Err(StateTransitionError::InvalidTransition {
            from: current,
            to: target,
        });
    }

    Ok(target)
}

/// Check whether a phase record is stuck: still processing, with a
/// `started_at` older than the staleness threshold.
pub fn is_stale(record: &PhaseRecord, now: DateTime<Utc>) -> bool {
    if record.status != PhaseStatus::Processing {
        return false;
    }
    match record.started_at {
        Some(started) => now - started > Duration::minutes(STALE_PROCESSING_MINUTES),
        // Processing without a start time is malformed; treat as stale
        None => true,
    }
}

/// Force-fail a stale processing record before a retry re-enters processing.
/// Returns true if the record was corrected.
pub fn fail_if_stale(record: &mut PhaseRecord, now: DateTime<Utc>) -> bool {
    if !is_stale(record, now) {
        return false;
    }
    record.fail(INTERRUPTED_ERROR);
    true
}

/// Check the ordering precondition for entering `processing`: phase 1 is
/// always eligible, later phases require a completed predecessor. Explicit
/// retries go through the same check, so a phase can never be (re)run ahead
/// of an incomplete predecessor.
pub fn check_start_precondition(phases: &Phases, phase: Phase) -> Result<(), StateTransitionError> {
    let Some(previous) = phase.previous() else {
        return Ok(());
    };
    if phases.record(previous).status == PhaseStatus::Completed {
        return Ok(());
    }
    Err(StateTransitionError::PreviousPhaseIncomplete {
        phase: phase.number(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_to_processing() {
        assert!(can_transition(PhaseStatus::Pending, PhaseStatus::Processing));
        let result = transition_state(PhaseStatus::Pending, PhaseStatus::Processing);
        assert!(result.is_ok());
        assert_eq!(result.unwrap(), PhaseStatus::Processing);
    }

    #[test]
    fn test_processing_resolution() {
        assert!(can_transition(
            PhaseStatus::Processing,
            PhaseStatus::Completed
        ));
        assert!(can_transition(PhaseStatus::Processing, PhaseStatus::Failed));
    }

    #[test]
    fn test_invalid_pending_to_completed() {
        assert!(!can_transition(PhaseStatus::Pending, PhaseStatus::Completed));
        let result = transition_state(PhaseStatus::Pending, PhaseStatus::Completed);
        assert!(result.is_err());
    }

    #[test]
    fn test_retry_from_terminal_states() {
        assert!(can_transition(PhaseStatus::Failed, PhaseStatus::Processing));
        assert!(can_transition(
            PhaseStatus::Completed,
            PhaseStatus::Processing
        ));
    }

    #[test]
    fn test_staleness_threshold() {
        let now = Utc::now();

        let mut record = PhaseRecord::default();
        record.status = PhaseStatus::Processing;

        // 25 minutes old: stale
        record.started_at = Some(now - Duration::minutes(25));
        assert!(is_stale(&record, now));

        // 10 minutes old: not stale
        record.started_at = Some(now - Duration::minutes(10));
        assert!(!is_stale(&record, now));

        // Completed records are never stale
        record.status = PhaseStatus::Completed;
        record.started_at = Some(now - Duration::minutes(60));
        assert!(!is_stale(&record, now));
    }

    #[test]
    fn test_fail_if_stale_sets_interrupted_error() {
        let now = Utc::now();
        let mut record = PhaseRecord::default();
        record.status = PhaseStatus::Processing;
        record.started_at = Some(now - Duration::minutes(30));

        assert!(fail_if_stale(&mut record, now));
        assert_eq!(record.status, PhaseStatus::Failed);
        assert_eq!(record.error.as_deref(), Some(INTERRUPTED_ERROR));

        // Already failed, nothing to correct
        assert!(!fail_if_stale(&mut record, now));
    }

    #[test]
    fn test_start_precondition() {
        let mut phases = Phases::default();

        // Phase 1 needs no predecessor
        assert!(check_start_precondition(&phases, Phase::Enhance).is_ok());

        // Phase 2 blocked until phase 1 completes
        assert!(check_start_precondition(&phases, Phase::Search).is_err());

        phases.phase1.begin();
        phases.phase1.complete(None);
        assert!(check_start_precondition(&phases, Phase::Search).is_ok());

        // Phase 3 still blocked behind phase 2
        assert!(check_start_precondition(&phases, Phase::PdfAnalysis).is_err());
    }
}
