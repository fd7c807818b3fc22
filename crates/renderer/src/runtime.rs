use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

/// Optional frames-per-second cap. Zero or negative values mean unlimited,
/// which is how `--fps -1` is spelled on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameRateCap(Option<f32>);

impl FrameRateCap {
    pub const UNLIMITED: Self = Self(None);
    /// Slowest cap accepted: one frame every 1000 seconds.
    pub const MIN_FPS: f32 = 0.001;

    /// Positive caps below [`Self::MIN_FPS`] are raised to it.
    pub fn new(fps: f32) -> Self {
        if fps.is_finite() && fps > 0.0 {
            Self(Some(fps.max(Self::MIN_FPS)))
        } else {
            Self(None)
        }
    }

    /// The cap in frames per second; `None` when unlimited.
    pub fn fps(&self) -> Option<f32> {
        self.0
    }

    pub fn is_unlimited(&self) -> bool {
        self.0.is_none()
    }

    /// Time between frames under this cap.
    pub fn interval(&self) -> Option<Duration> {
        self.0.map(|fps| Duration::from_secs_f64(1.0 / f64::from(fps)))
    }
}

impl FromStr for FrameRateCap {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let fps: f32 = value
            .trim()
            .parse()
            .map_err(|_| format!("invalid frame rate '{value}'"))?;
        if !fps.is_finite() {
            return Err(format!("frame rate must be finite, got '{value}'"));
        }
        if fps > 0.0 && fps < Self::MIN_FPS {
            return Err(format!(
                "frame rate '{value}' is below the minimum of {}",
                Self::MIN_FPS
            ));
        }
        Ok(Self::new(fps))
    }
}

impl fmt::Display for FrameRateCap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(fps) => write!(f, "{fps}"),
            None => f.write_str("unlimited"),
        }
    }
}

/// Timing handed to a demo for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTime {
    /// Seconds since the clock started.
    pub seconds: f32,
    /// Milliseconds since the previous frame; zero on the first frame.
    pub delta_ms: f32,
    /// Zero-based index of this frame.
    pub frame: u64,
}

#[derive(Debug, Clone)]
pub struct FrameClock {
    start: Instant,
    last_frame: Option<Instant>,
    frame: u64,
}

impl FrameClock {
    pub fn new(start: Instant) -> Self {
        Self {
            start,
            last_frame: None,
            frame: 0,
        }
    }

    pub fn advance(&mut self, now: Instant) -> FrameTime {
        let delta = self
            .last_frame
            .map(|last| now.saturating_duration_since(last))
            .unwrap_or_default();
        self.last_frame = Some(now);
        let sample = FrameTime {
            seconds: now.saturating_duration_since(self.start).as_secs_f32(),
            delta_ms: delta.as_secs_f32() * 1000.0,
            frame: self.frame,
        };
        self.frame = self.frame.saturating_add(1);
        sample
    }
}

/// Decides when the next redraw is due under a [`FrameRateCap`].
#[derive(Debug, Clone)]
pub struct FrameScheduler {
    interval: Option<Duration>,
    next_deadline: Option<Instant>,
}

impl FrameScheduler {
    pub fn new(cap: FrameRateCap) -> Self {
        Self {
            interval: cap.interval(),
            next_deadline: None,
        }
    }

    pub fn ready_for_frame(&self, now: Instant) -> bool {
        match self.next_deadline {
            Some(deadline) => now >= deadline,
            None => true,
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.next_deadline
    }

    /// Schedules the following frame one interval after the previous deadline
    /// so the cadence holds; if that is already past, restarts from `now`.
    pub fn mark_rendered(&mut self, now: Instant) {
        let Some(interval) = self.interval else {
            return;
        };
        let base = self.next_deadline.unwrap_or(now);
        let mut next = base + interval;
        if next <= now {
            next = now + interval;
        }
        self.next_deadline = Some(next);
    }
}
