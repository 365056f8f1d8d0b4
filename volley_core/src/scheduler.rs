//! Wave scheduling: center the wave on the target instant and poll until the
//! adjusted start arrives.
//!
//! ```text
//! wave_duration = (count - 1) * stagger
//! adjusted_start = target - (latency + floor(wave_duration / 2))
//! ```
//!
//! The wait re-reads the wall clock on every iteration and sleeps `poll`
//! between checks, so clock adjustments while armed are picked up.

use chrono::{DateTime, FixedOffset, NaiveTime, TimeDelta, Utc};
use std::time::Duration;
use tracing::{info, warn};
use volley_traits::{Clock, Connector};

use crate::calibrator::LatencyEstimate;
use crate::dispatcher::{WaveDispatcher, WaveReport};
use crate::error::{BuildError, Result};
use crate::signal::AbortSignal;
use crate::util::{in_local, in_utc, in_zone, millis_to_delta, wave_duration_ms};

/// Wave sizes above this log a rate-limit warning.
pub const SOFT_MAX_REQUESTS: u32 = 100;
/// Upper bound for the spacing between two sends.
pub const MAX_STAGGER: Duration = Duration::from_secs(60);
/// Upper bound for a latency estimate, in ms.
pub const MAX_LATENCY_MS: f64 = 60_000.0;

/// Immutable inputs of one scheduled wave.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleConfig {
    pub target: DateTime<FixedOffset>,
    pub latency: LatencyEstimate,
    pub count: u32,
    pub stagger: Duration,
    pub poll: Duration,
}

impl ScheduleConfig {
    pub fn builder() -> ScheduleBuilder {
        ScheduleBuilder::default()
    }

    /// Span from the first to the last scheduled send, in whole ms.
    pub fn wave_duration_ms(&self) -> u64 {
        wave_duration_ms(self.count, self.stagger)
    }

    /// Latency plus half the wave; `None` if it does not fit a `TimeDelta`.
    fn lead(&self) -> Option<TimeDelta> {
        let half = i64::try_from(self.wave_duration_ms() / 2).ok()?;
        millis_to_delta(self.latency.ms).checked_add(&TimeDelta::try_milliseconds(half)?)
    }

    fn checked_start(&self) -> Option<DateTime<Utc>> {
        self.target
            .with_timezone(&Utc)
            .checked_sub_signed(self.lead()?)
    }

    /// Instant at which dispatch must begin so the wave midpoint lands on target.
    ///
    /// Configs from [`ScheduleBuilder::build`] always have a representable
    /// start; a hand-built config that overflows starts immediately.
    pub fn adjusted_start(&self) -> DateTime<Utc> {
        self.checked_start().unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// Validating builder for [`ScheduleConfig`].
#[derive(Debug, Clone)]
pub struct ScheduleBuilder {
    target: Option<DateTime<FixedOffset>>,
    latency: LatencyEstimate,
    count: u32,
    stagger: Duration,
    poll: Duration,
}

impl Default for ScheduleBuilder {
    fn default() -> Self {
        Self {
            target: None,
            latency: LatencyEstimate::default(),
            count: 100,
            stagger: Duration::from_millis(15),
            poll: Duration::from_millis(5),
        }
    }
}

impl ScheduleBuilder {
    pub fn target(mut self, target: DateTime<FixedOffset>) -> Self {
        self.target = Some(target);
        self
    }

    pub fn latency(mut self, latency: LatencyEstimate) -> Self {
        self.latency = latency;
        self
    }

    pub fn requests(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    pub fn stagger(mut self, stagger: Duration) -> Self {
        self.stagger = stagger;
        self
    }

    pub fn poll(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }

    pub fn build(self) -> std::result::Result<ScheduleConfig, BuildError> {
        let target = self.target.ok_or(BuildError::MissingTarget)?;
        if self.count == 0 {
            return Err(BuildError::InvalidConfig("requests must be >= 1"));
        }
        if self.stagger.is_zero() {
            return Err(BuildError::InvalidConfig("stagger must be >= 1ms"));
        }
        if self.stagger > MAX_STAGGER {
            return Err(BuildError::InvalidConfig("stagger must be <= 60s"));
        }
        if self.poll.is_zero() {
            return Err(BuildError::InvalidConfig("poll interval must be >= 1ms"));
        }
        if !self.latency.ms.is_finite() || self.latency.ms < 0.0 {
            return Err(BuildError::InvalidConfig("latency must be finite and >= 0"));
        }
        if self.latency.ms > MAX_LATENCY_MS {
            return Err(BuildError::InvalidConfig("latency must be <= 60000ms"));
        }
        if self.count > SOFT_MAX_REQUESTS {
            warn!(
                requests = self.count,
                "request count is high and may trigger rate limits"
            );
        }
        let config = ScheduleConfig {
            target,
            latency: self.latency,
            count: self.count,
            stagger: self.stagger,
            poll: self.poll,
        };
        if config.checked_start().is_none() {
            return Err(BuildError::InvalidConfig("adjusted start is out of range"));
        }
        Ok(config)
    }
}

/// Next civil midnight in `zone` at or after `now`.
pub fn next_midnight(now: DateTime<Utc>, zone: FixedOffset) -> DateTime<FixedOffset> {
    let local = now.with_timezone(&zone).naive_local();
    let today = local.date().and_time(NaiveTime::MIN);
    let midnight = if today < local {
        today + TimeDelta::days(1)
    } else {
        today
    };
    let utc = midnight - TimeDelta::seconds(i64::from(zone.local_minus_utc()));
    DateTime::from_naive_utc_and_offset(utc, zone)
}

/// Log the target and adjusted start in the scheduling zone, UTC and local time.
pub fn log_plan(config: &ScheduleConfig) {
    let zone = *config.target.offset();
    let target = config.target.with_timezone(&Utc);
    let start = config.adjusted_start();
    info!(
        latency_ms = %format_args!("{:.2}", config.latency.ms),
        requests = config.count,
        stagger_ms = config.stagger.as_millis() as u64,
        wave_duration_ms = config.wave_duration_ms(),
        "schedule computed"
    );
    info!(zoned = %in_zone(target, zone), utc = %in_utc(target), local = %in_local(target), "target time");
    info!(zoned = %in_zone(start, zone), utc = %in_utc(start), local = %in_local(start), "adjusted send time");
}

/// Arms one wave against a dispatcher; the scheduler uses the dispatcher's clock.
pub struct WaveScheduler<'a, K, C> {
    dispatcher: &'a WaveDispatcher<K, C>,
}

impl<'a, K: Connector, C: Clock> WaveScheduler<'a, K, C> {
    pub fn new(dispatcher: &'a WaveDispatcher<K, C>) -> Self {
        Self { dispatcher }
    }

    /// Wait until the adjusted start, then send exactly one wave.
    ///
    /// There is no timeout on the wait; an unreachable target waits forever.
    pub async fn run(&self, config: &ScheduleConfig) -> Result<WaveReport> {
        log_plan(config);
        let start = config.adjusted_start();
        let clock = self.dispatcher.clock();

        let now = clock.wall();
        if now > start {
            warn!(
                late_ms = (now - start).num_milliseconds(),
                "adjusted send time already passed; sending immediately"
            );
        }
        while clock.wall() < start {
            clock.sleep(config.poll).await;
        }

        info!(now = %in_utc(clock.wall()), "sending request wave");
        let abort = AbortSignal::new();
        self.dispatcher
            .send_wave(config.count, config.stagger, &abort)
            .await
    }
}
