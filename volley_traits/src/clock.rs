use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Clock abstraction shared by calibration, scheduling and dispatch.
///
/// - now(): monotonic Instant, used for round-trip measurement
/// - wall(): absolute wall-clock instant (UTC), used for scheduling
/// - sleep(): cooperative suspension (implementations may simulate)
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    fn wall(&self) -> DateTime<Utc>;
    async fn sleep(&self, d: Duration);

    /// Fractional milliseconds elapsed since `epoch`, saturating at 0.
    fn ms_since(&self, epoch: Instant) -> f64 {
        self.now().saturating_duration_since(epoch).as_secs_f64() * 1000.0
    }
}

/// Real-time clock: std monotonic time, system wall time, tokio timers.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl SystemClock {
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }

    #[inline]
    fn wall(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, d: Duration) {
        if d.is_zero() {
            return;
        }
        tokio::time::sleep(d).await;
    }
}

/// Deterministic clock whose time only moves when told to.
///
/// now() = origin + offset, wall() = wall_origin + offset.
/// sleep(d) advances internal time by d (or by the fixed step set with
/// `with_sleep_step`) without actually sleeping.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    wall_origin: DateTime<Utc>,
    offset: Arc<Mutex<Duration>>,
    sleep_step: Option<Duration>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self::starting_at(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Manual clock whose wall time starts at `wall_origin`.
    pub fn starting_at(wall_origin: DateTime<Utc>) -> Self {
        Self {
            origin: Instant::now(),
            wall_origin,
            offset: Arc::new(Mutex::new(Duration::ZERO)),
            sleep_step: None,
        }
    }

    /// Make every sleep advance time by `step`, whatever was requested.
    pub fn with_sleep_step(mut self, step: Duration) -> Self {
        self.sleep_step = Some(step);
        self
    }

    /// Advance the clock by the given duration.
    pub fn advance(&self, d: Duration) {
        if let Ok(mut off) = self.offset.lock() {
            *off = off.saturating_add(d);
        }
    }

    /// Total time advanced since construction.
    pub fn elapsed(&self) -> Duration {
        self.offset.lock().map(|g| *g).unwrap_or(Duration::ZERO)
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn wall(&self) -> DateTime<Utc> {
        let off = chrono::TimeDelta::from_std(self.elapsed()).unwrap_or(chrono::TimeDelta::MAX);
        self.wall_origin + off
    }

    async fn sleep(&self, d: Duration) {
        self.advance(self.sleep_step.unwrap_or(d));
        tokio::task::yield_now().await;
    }
}
