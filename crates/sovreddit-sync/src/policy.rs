use backoff::backoff::Backoff;
use std::time::Duration;

use sovreddit_types::CommandKind;

/// How long, and how often, to look for the effect of an accepted command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    pub attempts: u32,
    pub initial_wait: Duration,
    pub wait_increment: Duration,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(5), Duration::from_secs(5))
    }
}

impl ConfirmationPolicy {
    pub const fn new(attempts: u32, initial_wait: Duration, wait_increment: Duration) -> Self {
        Self {
            attempts,
            initial_wait,
            wait_increment,
        }
    }

    /// Per-command policy. Account creation waits longest, votes the least.
    pub fn for_command(kind: CommandKind) -> Self {
        let step = match kind {
            CommandKind::CreateUser => 5,
            CommandKind::CreateSubreddit => 4,
            CommandKind::CreatePost => 3,
            CommandKind::AddComment => 2,
            CommandKind::CastVote => 1,
            CommandKind::ToggleMembership => 2,
        };
        Self::new(3, Duration::from_secs(step), Duration::from_secs(step))
    }

    /// Fresh schedule of waits for one confirmation
    pub fn backoff(&self) -> LinearBackoff {
        LinearBackoff::new(self)
    }
}

/// Wait schedule growing by a fixed step: `initial + n * increment` for each
/// of the `attempts` lookups, then exhausted.
#[derive(Debug, Clone)]
pub struct LinearBackoff {
    initial: Duration,
    increment: Duration,
    attempts: u32,
    issued: u32,
}

impl LinearBackoff {
    pub fn new(policy: &ConfirmationPolicy) -> Self {
        Self {
            initial: policy.initial_wait,
            increment: policy.wait_increment,
            attempts: policy.attempts,
            issued: 0,
        }
    }

    /// Number of waits handed out so far
    pub fn issued(&self) -> u32 {
        self.issued
    }
}

impl Backoff for LinearBackoff {
    fn reset(&mut self) {
        self.issued = 0;
    }

    fn next_backoff(&mut self) -> Option<Duration> {
        if self.issued >= self.attempts {
            return None;
        }
        let wait = self.initial + self.increment * self.issued;
        self.issued += 1;
        Some(wait)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule() {
        let mut schedule = ConfirmationPolicy::default().backoff();
        assert_eq!(schedule.next_backoff(), Some(Duration::from_secs(5)));
        assert_eq!(schedule.next_backoff(), Some(Duration::from_secs(10)));
        assert_eq!(schedule.next_backoff(), Some(Duration::from_secs(15)));
        assert_eq!(schedule.next_backoff(), None);
        assert_eq!(schedule.issued(), 3);
    }

    #[test]
    fn test_reset_restarts_schedule() {
        let mut schedule = ConfirmationPolicy::for_command(CommandKind::CastVote).backoff();
        schedule.next_backoff();
        schedule.next_backoff();
        schedule.reset();
        assert_eq!(schedule.next_backoff(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_registration_waits_longer_than_vote() {
        let user = ConfirmationPolicy::for_command(CommandKind::CreateUser);
        let vote = ConfirmationPolicy::for_command(CommandKind::CastVote);
        assert_eq!(user, ConfirmationPolicy::default());
        assert!(user.initial_wait > vote.initial_wait);
        assert_eq!(vote.attempts, 3);
    }

    #[test]
    fn test_zero_attempts_never_waits() {
        let policy = ConfirmationPolicy::new(0, Duration::from_secs(1), Duration::ZERO);
        assert_eq!(policy.backoff().next_backoff(), None);
    }
}
