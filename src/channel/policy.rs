/// Reconnection policies
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// Attempt `n` (1-indexed) waits `base_delay * n`; gives up after `max_attempts`
    Linear {
        base_delay: Duration,
        max_attempts: u32,
    },

    /// Every attempt waits `delay`, forever
    Fixed { delay: Duration },
}

impl ReconnectPolicy {
    pub fn linear(base_delay: Duration, max_attempts: u32) -> Self {
        ReconnectPolicy::Linear {
            base_delay,
            max_attempts,
        }
    }

    pub fn fixed(delay: Duration) -> Self {
        ReconnectPolicy::Fixed { delay }
    }

    /// Delay before reconnect attempt `attempt`, or `None` once the budget is spent
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        match *self {
            ReconnectPolicy::Linear {
                base_delay,
                max_attempts,
            } => {
                if attempt == 0 || attempt > max_attempts {
                    None
                } else {
                    Some(base_delay.saturating_mul(attempt))
                }
            }
            ReconnectPolicy::Fixed { delay } => Some(delay),
        }
    }

    pub fn is_bounded(&self) -> bool {
        matches!(self, ReconnectPolicy::Linear { .. })
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy::linear(Duration::from_millis(2000), 5)
    }
}
