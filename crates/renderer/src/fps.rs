use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Number of recent frames averaged by [`FpsCounter`].
pub const FPS_WINDOW: usize = 60;

/// Sliding-window frame rate estimate.
#[derive(Debug, Clone)]
pub struct FpsCounter {
    last_tick: Instant,
    frame_times: VecDeque<Duration>,
}

impl FpsCounter {
    pub fn new(now: Instant) -> Self {
        Self {
            last_tick: now,
            frame_times: VecDeque::with_capacity(FPS_WINDOW),
        }
    }

    /// Records the time since the previous tick.
    pub fn tick(&mut self, now: Instant) {
        let dt = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;
        if self.frame_times.len() == FPS_WINDOW {
            self.frame_times.pop_front();
        }
        self.frame_times.push_back(dt);
    }

    /// Frames per second over the window, or 0 before any time has elapsed.
    pub fn fps(&self) -> f32 {
        let total: Duration = self.frame_times.iter().sum();
        let seconds = total.as_secs_f32();
        if seconds > 0.0 {
            self.frame_times.len() as f32 / seconds
        } else {
            0.0
        }
    }

    pub fn samples(&self) -> usize {
        self.frame_times.len()
    }
}

/// Fires at most once per interval; used to refresh the window title.
#[derive(Debug, Clone)]
pub struct TitleTicker {
    last_report: Instant,
    interval: Duration,
}

impl TitleTicker {
    pub fn new(now: Instant) -> Self {
        Self::with_interval(now, Duration::from_secs(1))
    }

    pub fn with_interval(now: Instant, interval: Duration) -> Self {
        Self {
            last_report: now,
            interval,
        }
    }

    pub fn poll(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last_report) >= self.interval {
            self.last_report = now;
            true
        } else {
            false
        }
    }
}

/// Title text shown by the demos, e.g. `FPS:  60`.
pub fn fps_title(fps: f32) -> String {
    format!("FPS: {fps:3.0}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_counter_reports_zero() {
        let counter = FpsCounter::new(Instant::now());
        assert_eq!(counter.fps(), 0.0);
        assert_eq!(counter.samples(), 0);
    }

    #[test]
    fn steady_frames_average_out() {
        let start = Instant::now();
        let mut counter = FpsCounter::new(start);
        for frame in 1..=30 {
            counter.tick(start + Duration::from_millis(20 * frame));
        }
        assert_eq!(counter.samples(), 30);
        assert!((counter.fps() - 50.0).abs() < 0.01);
    }

    #[test]
    fn window_keeps_only_recent_frames() {
        let start = Instant::now();
        let mut counter = FpsCounter::new(start);
        let mut now = start;
        for _ in 0..FPS_WINDOW {
            now += Duration::from_millis(100);
            counter.tick(now);
        }
        for _ in 0..FPS_WINDOW {
            now += Duration::from_millis(10);
            counter.tick(now);
        }
        assert_eq!(counter.samples(), FPS_WINDOW);
        assert!((counter.fps() - 100.0).abs() < 0.01);
    }

    #[test]
    fn zero_length_frames_do_not_divide_by_zero() {
        let start = Instant::now();
        let mut counter = FpsCounter::new(start);
        counter.tick(start);
        counter.tick(start);
        assert_eq!(counter.fps(), 0.0);
    }

    #[test]
    fn ticker_fires_once_per_interval() {
        let start = Instant::now();
        let mut ticker = TitleTicker::new(start);
        assert!(!ticker.poll(start + Duration::from_millis(999)));
        assert!(ticker.poll(start + Duration::from_millis(1000)));
        assert!(!ticker.poll(start + Duration::from_millis(1500)));
        assert!(ticker.poll(start + Duration::from_millis(2100)));
    }

    #[test]
    fn title_pads_to_three_columns() {
        assert_eq!(fps_title(59.6), "FPS:  60");
        assert_eq!(fps_title(0.0), "FPS:   0");
        assert_eq!(fps_title(144.2), "FPS: 144");
    }
}
