//! Fixed-timestep accumulator driving the 60Hz simulation tick (§4.F, §5).

use std::time::{Duration, Instant};

/// Fixed-timestep tick loop controller: accumulates real elapsed time and
/// lets the caller step the simulation once per whole `tick_duration`
/// accumulated, decoupling it from wall-clock jitter.
pub struct TickLoop {
    /// Target tick duration.
    tick_duration: Duration,
    /// Time of last tick.
    last_tick: Instant,
    /// Accumulated time since last tick.
    accumulator: Duration,
    /// Total ticks executed.
    tick_count: u64,
}

impl TickLoop {
    /// Creates a new tick loop at `tick_rate` ticks per second.
    #[must_use]
    pub fn new(tick_rate: u32) -> Self {
        Self {
            tick_duration: Duration::from_micros(1_000_000 / u64::from(tick_rate)),
            last_tick: Instant::now(),
            accumulator: Duration::ZERO,
            tick_count: 0,
        }
    }

    /// True once enough real time has accumulated for another tick.
    ///
    /// Call this in a loop until it returns false.
    #[must_use]
    pub fn should_tick(&mut self) -> bool {
        let now = Instant::now();
        self.accumulator += now.duration_since(self.last_tick);
        self.last_tick = now;

        self.accumulator >= self.tick_duration
    }

    /// Marks the start of a tick, consuming one `tick_duration` from the
    /// accumulator. Returns the start time for duration measurement.
    #[must_use]
    pub fn begin_tick(&mut self) -> Instant {
        self.accumulator = self.accumulator.saturating_sub(self.tick_duration);
        self.tick_count += 1;
        Instant::now()
    }

    /// Marks the end of a tick. No-op beyond the measurement point;
    /// `start` is accepted for symmetry with [`Self::begin_tick`].
    pub fn end_tick(&mut self, _start: Instant) {}

    /// Waits until the next tick is due: sleeps for most of the remaining
    /// time, then spin-waits the last ~500us for precision.
    pub fn wait_for_next_tick(&self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_tick);

        if elapsed < self.tick_duration {
            let remaining = self.tick_duration - elapsed;

            if remaining > Duration::from_micros(1000) {
                std::thread::sleep(remaining - Duration::from_micros(500));
            }

            while Instant::now().duration_since(self.last_tick) < self.tick_duration {
                std::hint::spin_loop();
            }
        }
    }

    /// The current tick count.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick_count
    }
}

impl Default for TickLoop {
    fn default() -> Self {
        Self::new(60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_fresh_tick_loop_has_not_ticked_yet() {
        let tick_loop = TickLoop::new(60);
        assert_eq!(tick_loop.tick_count(), 0);
    }

    #[test]
    fn should_tick_becomes_true_once_the_interval_elapses() {
        let mut tick_loop = TickLoop::new(1000); // 1000Hz for a fast test
        std::thread::sleep(Duration::from_millis(5));
        assert!(tick_loop.should_tick());

        let start = tick_loop.begin_tick();
        tick_loop.end_tick(start);
        assert_eq!(tick_loop.tick_count(), 1);
    }

    #[test]
    fn tick_count_advances_once_per_begin_tick() {
        let mut tick_loop = TickLoop::new(1000);
        for _ in 0..10 {
            std::thread::sleep(Duration::from_micros(1100));
            while tick_loop.should_tick() {
                let start = tick_loop.begin_tick();
                tick_loop.end_tick(start);
            }
        }
        assert!(tick_loop.tick_count() > 0);
    }
}
