//! Suspension strategies for coroutines

/// What a coroutine is waiting for before it resumes.
///
/// Each variant carries its own countdown and is asked
/// [`still_waiting`](Self::still_waiting) exactly once per scheduler tick,
/// starting with the tick that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WaitCondition {
    /// Resume on the following tick
    NextFrame {
        /// Set by the first evaluation
        seen: bool,
    },
    /// Resume once this many evaluations have passed
    Frames(u32),
    /// Resume once this much time (in seconds) has been reported
    Seconds(f32),
    /// Never resume; the coroutine only ends when stopped
    Forever,
}

impl WaitCondition {
    /// Wait for one tick
    pub fn next_frame() -> Self {
        Self::NextFrame { seen: false }
    }

    /// Wait for `frames` ticks, counting the one that yields
    pub fn frames(frames: u32) -> Self {
        Self::Frames(frames)
    }

    /// Wait until `seconds` of frame time have elapsed
    pub fn seconds(seconds: f32) -> Self {
        Self::Seconds(seconds)
    }

    /// Suspend indefinitely
    pub fn forever() -> Self {
        Self::Forever
    }

    /// Advance the countdown by one evaluation and report whether the
    /// coroutine must stay suspended
    pub fn still_waiting(&mut self, delta_time: f32) -> bool {
        match self {
            Self::NextFrame { seen } => !std::mem::replace(seen, true),
            Self::Frames(remaining) => {
                *remaining = remaining.saturating_sub(1);
                *remaining > 0
            }
            Self::Seconds(remaining) => {
                *remaining -= delta_time;
                *remaining > 0.0
            }
            Self::Forever => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluations_until_done(mut wait: WaitCondition, delta_time: f32) -> usize {
        (1..=100).find(|_| !wait.still_waiting(delta_time)).unwrap_or(usize::MAX)
    }

    #[test]
    fn test_next_frame_waits_once() {
        assert_eq!(evaluations_until_done(WaitCondition::next_frame(), 0.0), 2);
    }

    #[test]
    fn test_frames_counts_each_evaluation() {
        assert_eq!(evaluations_until_done(WaitCondition::frames(3), 0.0), 3);
        assert_eq!(evaluations_until_done(WaitCondition::frames(1), 0.0), 1);
        assert_eq!(evaluations_until_done(WaitCondition::frames(0), 0.0), 1);
    }

    #[test]
    fn test_seconds_consume_delta_time() {
        assert_eq!(evaluations_until_done(WaitCondition::seconds(0.5), 0.25), 2);
        assert_eq!(evaluations_until_done(WaitCondition::seconds(0.5), 0.2), 3);
        assert_eq!(evaluations_until_done(WaitCondition::seconds(0.0), 0.0), 1);
    }

    #[test]
    fn test_forever_never_finishes() {
        assert_eq!(evaluations_until_done(WaitCondition::forever(), 10.0), usize::MAX);
    }
}
