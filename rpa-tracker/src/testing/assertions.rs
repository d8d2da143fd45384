//! Assertions on tracker records.

use crate::core::{StageRecord, State, TransactionRecord};

/// Asserts the state and attempt count of a stage instance.
pub fn assert_stage(stage: &StageRecord, state: State, attempt_count: u32) {
    assert_eq!(
        (stage.state, stage.attempt_count),
        (state, attempt_count),
        "Expected stage {}/{} to be {} after {} attempts, got {} after {}",
        stage.platform_code,
        stage.stage_name,
        state,
        attempt_count,
        stage.state,
        stage.attempt_count
    );
}

/// Asserts the state of a transaction.
pub fn assert_transaction_state(transaction: &TransactionRecord, expected: State) {
    assert_eq!(
        transaction.state, expected,
        "Expected transaction {} to be {}, got {}",
        transaction.id, expected, transaction.state
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{StageKey, TransactionId};
    use crate::utils::now_utc;

    #[test]
    fn test_assert_stage_passes() {
        let key = StageKey::new(TransactionId::generate(), "A", "default");
        assert_stage(&StageRecord::pending(&key, now_utc()), State::Pending, 0);
    }

    #[test]
    #[should_panic(expected = "Expected transaction")]
    fn test_assert_transaction_state_fails() {
        let record = TransactionRecord::pending(TransactionId::generate(), "P", now_utc());
        assert_transaction_state(&record, State::Completed);
    }
}
