//! Per (user, post) vote toggling.
//!
//! The displayed state is a [`VoteValue`]; `Neutral` is the "no vote" state.
//! Each press yields the absolute value to cast next, never a delta, so a
//! resubmitted vote is a last-value-wins assignment.

use serde::{Deserialize, Serialize};

use sovreddit_types::VoteValue;

/// Which vote control was pressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotePress {
    Up,
    Down,
}

impl VotePress {
    /// Next vote value after pressing this control in state `current`
    pub fn apply(self, current: VoteValue) -> VoteValue {
        match (self, current) {
            (VotePress::Up, VoteValue::Up) => VoteValue::Neutral,
            (VotePress::Up, _) => VoteValue::Up,
            (VotePress::Down, VoteValue::Down) => VoteValue::Neutral,
            (VotePress::Down, _) => VoteValue::Down,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upvote_transitions() {
        assert_eq!(VotePress::Up.apply(VoteValue::Neutral), VoteValue::Up);
        assert_eq!(VotePress::Up.apply(VoteValue::Up), VoteValue::Neutral);
        assert_eq!(VotePress::Up.apply(VoteValue::Down), VoteValue::Up);
    }

    #[test]
    fn test_downvote_transitions() {
        assert_eq!(VotePress::Down.apply(VoteValue::Neutral), VoteValue::Down);
        assert_eq!(VotePress::Down.apply(VoteValue::Down), VoteValue::Neutral);
        assert_eq!(VotePress::Down.apply(VoteValue::Up), VoteValue::Down);
    }

    #[test]
    fn test_double_press_returns_to_neutral() {
        let state = VotePress::Up.apply(VoteValue::Neutral);
        assert_eq!(VotePress::Up.apply(state), VoteValue::Neutral);
    }
}
