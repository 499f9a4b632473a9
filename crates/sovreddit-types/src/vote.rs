use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

use crate::error::TypesError;

/// Value of a single (user, post) vote relation.
///
/// Serialized as the bare integer the processor expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i64")]
pub enum VoteValue {
    Down,
    #[default]
    Neutral,
    Up,
}

impl VoteValue {
    pub fn as_i8(self) -> i8 {
        match self {
            VoteValue::Down => -1,
            VoteValue::Neutral => 0,
            VoteValue::Up => 1,
        }
    }

    /// Score change caused by replacing `previous` with `self`
    pub fn score_delta_from(self, previous: VoteValue) -> i64 {
        i64::from(self.as_i8()) - i64::from(previous.as_i8())
    }
}

impl From<VoteValue> for i8 {
    fn from(value: VoteValue) -> Self {
        value.as_i8()
    }
}

impl TryFrom<i64> for VoteValue {
    type Error = TypesError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(VoteValue::Down),
            0 => Ok(VoteValue::Neutral),
            1 => Ok(VoteValue::Up),
            other => Err(TypesError::InvalidVote(other)),
        }
    }
}

impl Display for VoteValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_i8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vote_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&VoteValue::Down).unwrap(), "-1");
        assert_eq!(serde_json::to_string(&VoteValue::Up).unwrap(), "1");
        assert_eq!(serde_json::from_str::<VoteValue>("0").unwrap(), VoteValue::Neutral);
    }

    #[test]
    fn test_out_of_range_vote_is_rejected() {
        assert!(serde_json::from_str::<VoteValue>("2").is_err());
        assert_eq!(VoteValue::try_from(-5), Err(TypesError::InvalidVote(-5)));
    }

    #[test]
    fn test_score_delta() {
        assert_eq!(VoteValue::Up.score_delta_from(VoteValue::Neutral), 1);
        assert_eq!(VoteValue::Up.score_delta_from(VoteValue::Down), 2);
        assert_eq!(VoteValue::Neutral.score_delta_from(VoteValue::Up), -1);
        assert_eq!(VoteValue::Down.score_delta_from(VoteValue::Down), 0);
    }
}
