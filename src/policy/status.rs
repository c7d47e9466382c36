//! Outcome → status conditions.

use crate::model::{Condition, ConditionType, Reason};
use super::PolicyError;

/// The `Accepted` and `Enforced` conditions for one policy outcome.
///
/// Always exactly two conditions, `Accepted` first. A rejected policy is
/// never enforced and carries the rejection reason on both.
pub fn conditions(kind: &str, outcome: &Result<(), PolicyError>) -> [Condition; 2] {
    match outcome {
        Ok(()) => [
            Condition::new(ConditionType::Accepted, true, Reason::Accepted, format!("{kind} has been accepted")),
            Condition::new(
                ConditionType::Enforced,
                true,
                Reason::Enforced,
                format!("{kind} has been successfully enforced"),
            ),
        ],
        Err(err) if err.rejects() => {
            let message = err.to_string();
            [
                Condition::new(ConditionType::Accepted, false, err.reason(), message.clone()),
                Condition::new(ConditionType::Enforced, false, err.reason(), message),
            ]
        }
        Err(err) => [
            Condition::new(ConditionType::Accepted, true, Reason::Accepted, format!("{kind} has been accepted")),
            Condition::new(ConditionType::Enforced, false, err.reason(), err.to_string()),
        ],
    }
}
