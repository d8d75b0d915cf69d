use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// An unordered pair of participants, normalised so `low < high`.
///
/// Two users map to the same pair regardless of argument order, which is
/// what lets the store enforce one thread per pair with a plain unique index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParticipantPair {
    low: Uuid,
    high: Uuid,
}

impl ParticipantPair {
    pub fn new(a: Uuid, b: Uuid) -> Result<Self, AppError> {
        if a == b {
            return Err(AppError::BadRequest(
                "a thread needs two distinct participants".into(),
            ));
        }
        let (low, high) = if a < b { (a, b) } else { (b, a) };
        Ok(Self { low, high })
    }

    pub fn low(&self) -> Uuid {
        self.low
    }

    pub fn high(&self) -> Uuid {
        self.high
    }

    pub fn contains(&self, user_id: Uuid) -> bool {
        self.low == user_id || self.high == user_id
    }

    /// The participant that is not `user_id`, if `user_id` is in the pair.
    pub fn other(&self, user_id: Uuid) -> Option<Uuid> {
        if user_id == self.low {
            Some(self.high)
        } else if user_id == self.high {
            Some(self.low)
        } else {
            None
        }
    }
}

/// Denormalised copy of a thread's most recent message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastMessage {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    pub id: Uuid,
    pub participant_low: Uuid,
    pub participant_high: Uuid,
    pub last_message: Option<LastMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Thread {
    pub fn pair(&self) -> ParticipantPair {
        ParticipantPair {
            low: self.participant_low,
            high: self.participant_high,
        }
    }

    pub fn participants(&self) -> [Uuid; 2] {
        [self.participant_low, self.participant_high]
    }

    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.pair().contains(user_id)
    }

    pub fn counterpart(&self, user_id: Uuid) -> Option<Uuid> {
        self.pair().other(user_id)
    }
}

/// Row of the "my conversations" list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadSummary {
    pub thread_id: Uuid,
    pub contact_id: Uuid,
    pub last_message: Option<LastMessage>,
    pub unread_count: i64,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_is_order_independent() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(
            ParticipantPair::new(a, b).unwrap(),
            ParticipantPair::new(b, a).unwrap()
        );
    }

    #[test]
    fn pair_rejects_self_thread() {
        let a = Uuid::new_v4();
        assert!(matches!(
            ParticipantPair::new(a, a),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn other_returns_counterpart() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let pair = ParticipantPair::new(a, b).unwrap();
        assert_eq!(pair.other(a), Some(b));
        assert_eq!(pair.other(b), Some(a));
        assert_eq!(pair.other(Uuid::new_v4()), None);
        assert!(pair.low() < pair.high());
    }
}
