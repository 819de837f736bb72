use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{interval, Interval, MissedTickBehavior};

/// Source of per-frame ticks, the analogue of a display refresh callback.
#[async_trait]
pub trait FrameClock: Send {
    /// Waits for the next frame. Returns `false` when the clock has ended.
    async fn tick(&mut self) -> bool;
}

pub type ClockFactory = Box<dyn Fn() -> Box<dyn FrameClock> + Send + Sync>;

/// Ticks at a fixed refresh rate, skipping frames the loop was too slow for.
pub struct IntervalClock {
    interval: Interval,
}

impl IntervalClock {
    pub fn new(refresh_hz: u32) -> Self {
        let period = Duration::from_secs_f64(1.0 / refresh_hz.max(1) as f64);
        let mut interval = interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { interval }
    }

    pub fn factory(refresh_hz: u32) -> ClockFactory {
        Box::new(move || Box::new(IntervalClock::new(refresh_hz)))
    }
}

#[async_trait]
impl FrameClock for IntervalClock {
    async fn tick(&mut self) -> bool {
        self.interval.tick().await;
        true
    }
}
