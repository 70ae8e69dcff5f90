//! Time management utilities

use std::time::{Duration, Instant};

/// Measures whole-millisecond deltas between loop iterations
pub struct FrameClock {
    last_frame: Instant,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock {
    /// Create a clock starting now
    pub fn new() -> Self {
        Self {
            last_frame: Instant::now(),
        }
    }

    /// Milliseconds since the previous tick (or creation)
    pub fn tick(&mut self) -> u64 {
        self.tick_at(Instant::now())
    }

    /// Milliseconds between the previous tick and `now`
    pub fn tick_at(&mut self, now: Instant) -> u64 {
        let delta = now.saturating_duration_since(self.last_frame);
        self.last_frame = now;
        duration_to_ms(delta)
    }
}

/// Whole milliseconds in a duration, saturating
pub fn duration_to_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Tics fired by one [`TicScheduler::advance`] call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tics {
    /// Game update tic with the milliseconds accumulated since the last one
    pub game: Option<u64>,
    /// Render tic with the milliseconds accumulated since the last one
    pub render: Option<u64>,
}

/// Fixed-rate game and render tic accumulator
#[derive(Debug, Clone)]
pub struct TicScheduler {
    update_tic_ms: u64,
    render_tic_ms: u64,
    game_accum: u64,
    render_accum: u64,
}

impl TicScheduler {
    /// Create a scheduler firing game tics every `update_tic_ms` and render tics every `render_tic_ms`
    pub fn new(update_tic_ms: u64, render_tic_ms: u64) -> Self {
        Self {
            update_tic_ms,
            render_tic_ms,
            game_accum: 0,
            render_accum: 0,
        }
    }

    /// Change both tic rates; accumulated time is kept
    pub fn set_tic_rate(&mut self, update_tic_ms: u64, render_tic_ms: u64) {
        self.update_tic_ms = update_tic_ms;
        self.render_tic_ms = render_tic_ms;
    }

    /// Game tic interval in ms
    pub fn update_tic_ms(&self) -> u64 {
        self.update_tic_ms
    }

    /// Render tic interval in ms
    pub fn render_tic_ms(&self) -> u64 {
        self.render_tic_ms
    }

    /// Account for `delta_ms` of wall time.
    ///
    /// Every call counts as at least one millisecond. A tic fires once its
    /// accumulator exceeds the interval, and the accumulator restarts at zero.
    pub fn advance(&mut self, delta_ms: u64) -> Tics {
        let step = delta_ms.max(1);
        self.game_accum = self.game_accum.saturating_add(step);
        self.render_accum = self.render_accum.saturating_add(step);

        let mut tics = Tics::default();
        if self.game_accum > self.update_tic_ms {
            tics.game = Some(self.game_accum);
            self.game_accum = 0;
        }
        if self.render_accum > self.render_tic_ms {
            tics.render = Some(self.render_accum);
            self.render_accum = 0;
        }
        tics
    }

    /// Whether a frame this short should be followed by a nap
    pub fn should_idle(delta_ms: u64, idle_threshold_ms: u64) -> bool {
        delta_ms < idle_threshold_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tic_fires_after_interval_exceeded() {
        let mut sched = TicScheduler::new(33, 33);
        assert_eq!(sched.advance(20), Tics::default());
        // 33 is not past the interval yet
        assert_eq!(sched.advance(13), Tics::default());
        let tics = sched.advance(1);
        assert_eq!(tics.game, Some(34));
        assert_eq!(tics.render, Some(34));
    }

    #[test]
    fn test_zero_delta_counts_as_one() {
        let mut sched = TicScheduler::new(2, 100);
        assert_eq!(sched.advance(0).game, None);
        assert_eq!(sched.advance(0).game, None);
        assert_eq!(sched.advance(0).game, Some(3));
    }

    #[test]
    fn test_independent_rates() {
        let mut sched = TicScheduler::new(10, 50);
        let mut game = 0;
        let mut render = 0;
        for _ in 0..20 {
            let tics = sched.advance(6);
            game += u32::from(tics.game.is_some());
            render += u32::from(tics.render.is_some());
        }
        // game every 2 steps (12ms), render every 9 steps (54ms)
        assert_eq!(game, 10);
        assert_eq!(render, 2);
    }

    #[test]
    fn test_set_tic_rate_keeps_accumulators() {
        let mut sched = TicScheduler::new(100, 100);
        sched.advance(40);
        sched.set_tic_rate(30, 30);
        assert_eq!(sched.advance(1).game, Some(41));
        assert_eq!(sched.update_tic_ms(), 30);
    }

    #[test]
    fn test_should_idle() {
        assert!(TicScheduler::should_idle(2, 5));
        assert!(!TicScheduler::should_idle(5, 5));
    }

    #[test]
    fn test_frame_clock_delta() {
        let start = Instant::now();
        let mut clock = FrameClock { last_frame: start };
        assert_eq!(clock.tick_at(start + Duration::from_millis(17)), 17);
        assert_eq!(clock.tick_at(start + Duration::from_millis(20)), 3);
    }
}
