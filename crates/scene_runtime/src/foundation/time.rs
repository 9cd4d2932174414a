//! Time management utilities
//!
//! The scene never owns the clock. A host loop produces one [`FrameTime`] per
//! frame (usually from a [`Timer`]) and hands it to the scene, which only reads it.

use std::time::Instant;

/// Read-only timing input for a single frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameTime {
    /// Seconds elapsed since the previous frame
    pub delta_seconds: f32,

    /// Index of this frame, starting at zero
    pub frame: u64,
}

impl FrameTime {
    /// Create a frame time with the given delta
    pub fn new(delta_seconds: f32, frame: u64) -> Self {
        Self {
            delta_seconds: delta_seconds.max(0.0),
            frame,
        }
    }
}

/// Wall-clock frame source for host loops.
///
/// Deltas longer than `max_delta` (a debugger pause, a window drag) are
/// clamped so one hitch does not arrive at the scene as a huge step.
pub struct Timer {
    started: Instant,
    last_tick: Instant,
    max_delta: f32,
    frames: u64,
    simulated: f32,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    /// Create a timer that clamps deltas to a quarter second
    pub fn new() -> Self {
        Self::with_max_delta(0.25)
    }

    /// Create a timer with a custom delta clamp
    pub fn with_max_delta(max_delta: f32) -> Self {
        let now = Instant::now();
        Self {
            started: now,
            last_tick: now,
            max_delta: max_delta.max(0.0),
            frames: 0,
            simulated: 0.0,
        }
    }

    /// Sample the clock and produce the next frame.
    ///
    /// Call once per frame.
    pub fn tick(&mut self) -> FrameTime {
        let now = Instant::now();
        let delta = now.duration_since(self.last_tick).as_secs_f32().min(self.max_delta);
        self.last_tick = now;
        self.simulated += delta;

        let frame = FrameTime::new(delta, self.frames);
        self.frames += 1;
        frame
    }

    /// Frames produced so far
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Sum of all (clamped) deltas handed out
    pub fn simulated_time(&self) -> f32 {
        self.simulated
    }

    /// Wall-clock seconds since the timer was created
    pub fn elapsed(&self) -> f32 {
        self.started.elapsed().as_secs_f32()
    }

    /// Average frames per second of wall-clock time
    pub fn average_fps(&self) -> f32 {
        let elapsed = self.elapsed();
        if elapsed > 0.0 {
            self.frames as f32 / elapsed
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_time_clamps_negative_delta() {
        let time = FrameTime::new(-0.5, 3);
        assert_eq!(time.delta_seconds, 0.0);
        assert_eq!(time.frame, 3);
    }

    #[test]
    fn test_timer_counts_frames() {
        let mut timer = Timer::new();
        let first = timer.tick();
        let second = timer.tick();

        assert_eq!(first.frame, 0);
        assert_eq!(second.frame, 1);
        assert_eq!(timer.frame_count(), 2);
        assert!(timer.simulated_time() <= timer.elapsed() + f32::EPSILON);
    }

    #[test]
    fn test_timer_clamps_long_frames() {
        let mut timer = Timer::with_max_delta(0.0);
        std::thread::sleep(std::time::Duration::from_millis(2));

        assert_eq!(timer.tick().delta_seconds, 0.0);
    }
}
