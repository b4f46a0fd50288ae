//! Fixed-rate tick scheduler for posync.
//!
//! The server broadcasts every participant's position once per tick. The
//! tick interval is the only backpressure knob the protocol has: a shorter
//! interval means fresher positions and more bandwidth, a longer one the
//! opposite. The default is 20 Hz (one tick every 50 ms).
//!
//! Ticks are driven by the monotonic clock, not by message arrival: a tick
//! fires whether or not any position report came in since the last one.
//!
//! Two ways to drive it:
//!
//! - **Cooperative loop**: call [`TickScheduler::poll_tick`] once per loop
//!   iteration with the current instant; it returns `Some` when a tick is
//!   due and never blocks.
//! - **Async loop**: await [`TickScheduler::wait_for_tick`] inside a
//!   `tokio::select!` next to the transport's event stream.
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(event) = transport.next_event() => { /* handle event */ }
//!         _ = scheduler.wait_for_tick() => {
//!             broadcast_positions();
//!             scheduler.record_tick_end();
//!         }
//!     }
//! }
//! ```

use std::time::{Duration, Instant};

use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the tick scheduler.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Ticks per second. 0 disables ticking entirely.
    pub tick_rate_hz: u32,
    /// Fraction of the interval (0.0–1.0) a tick's work may take before a
    /// warning is logged. Default: 0.80.
    pub budget_warn_threshold: f64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: Self::DEFAULT_TICK_RATE_HZ,
            budget_warn_threshold: 0.80,
        }
    }
}

impl TickConfig {
    /// 20 Hz, one position broadcast every 50 ms.
    pub const DEFAULT_TICK_RATE_HZ: u32 = 20;

    /// Maximum supported tick rate.
    pub const MAX_TICK_RATE_HZ: u32 = 128;

    /// A config for a specific tick rate with default thresholds.
    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self {
            tick_rate_hz,
            ..Default::default()
        }
    }

    /// Clamps out-of-range values. Called by [`TickScheduler::new`].
    pub fn validated(mut self) -> Self {
        if self.tick_rate_hz > Self::MAX_TICK_RATE_HZ {
            warn!(
                rate = self.tick_rate_hz,
                max = Self::MAX_TICK_RATE_HZ,
                "tick_rate_hz exceeds maximum, clamping"
            );
            self.tick_rate_hz = Self::MAX_TICK_RATE_HZ;
        }
        self.budget_warn_threshold = self.budget_warn_threshold.clamp(0.0, 1.0);
        self
    }

    /// Length of one tick, or `None` when ticking is disabled.
    pub fn tick_duration(&self) -> Option<Duration> {
        if self.tick_rate_hz == 0 {
            None
        } else {
            Some(Duration::from_secs_f64(1.0 / self.tick_rate_hz as f64))
        }
    }
}

// ---------------------------------------------------------------------------
// Tick info
// ---------------------------------------------------------------------------

/// What the scheduler reports for a fired tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickInfo {
    /// Monotonically increasing tick number, starting at 1.
    pub tick: u64,
    /// The configured interval.
    pub interval: Duration,
    /// How far past its deadline the tick fired.
    pub late_by: Duration,
    /// Whole intervals that passed without a tick (0 in normal operation).
    /// Missed ticks are never replayed: the next broadcast carries the
    /// current state anyway.
    pub ticks_skipped: u64,
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Runtime counters. Timing values refer to the per-tick work reported
/// through [`TickScheduler::record_tick_end`].
#[derive(Debug, Clone, Default)]
pub struct TickMetrics {
    pub total_ticks: u64,
    pub total_skipped: u64,
    /// Exponential moving average of tick work time (α = 0.1).
    pub avg_tick_time: Duration,
    pub max_tick_time: Duration,
    /// Last tick's work time over the interval. >1.0 means overrun.
    pub budget_utilization: f64,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Fixed-rate tick scheduler.
pub struct TickScheduler {
    config: TickConfig,
    tick_duration: Option<Duration>,
    tick_count: u64,
    /// Deadline of the next tick. `None` when ticking is disabled.
    next_tick: Option<TokioInstant>,
    /// Set when a tick fires, consumed by `record_tick_end`.
    tick_start: Option<Instant>,
    paused: bool,
    metrics: TickMetrics,
}

impl TickScheduler {
    /// Creates a scheduler whose first tick is one interval from now.
    pub fn new(config: TickConfig) -> Self {
        Self::starting_at(config, TokioInstant::now())
    }

    /// Creates a scheduler whose first tick is one interval after `start`.
    pub fn starting_at(config: TickConfig, start: TokioInstant) -> Self {
        let config = config.validated();
        let tick_duration = config.tick_duration();

        match tick_duration {
            Some(interval) => debug!(
                rate_hz = config.tick_rate_hz,
                interval_ms = interval.as_secs_f64() * 1000.0,
                "tick scheduler created"
            ),
            None => debug!("tick scheduler created with ticking disabled"),
        }

        Self {
            next_tick: tick_duration.map(|d| start + d),
            config,
            tick_duration,
            tick_count: 0,
            tick_start: None,
            paused: false,
            metrics: TickMetrics::default(),
        }
    }

    /// Creates a scheduler for a specific tick rate with default settings.
    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self::new(TickConfig::with_rate(tick_rate_hz))
    }

    /// Fires a tick if one is due at `now`. Never blocks.
    ///
    /// Returns `None` when the deadline hasn't been reached, the scheduler
    /// is paused, or ticking is disabled.
    pub fn poll_tick(&mut self, now: TokioInstant) -> Option<TickInfo> {
        let (deadline, interval) = self.armed()?;
        if now < deadline {
            return None;
        }
        Some(self.fire(now, deadline, interval))
    }

    /// Waits until the next tick is due and fires it.
    ///
    /// Pends forever while paused or when ticking is disabled, which is
    /// what a `tokio::select!` branch wants.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let Some((deadline, interval)) = self.armed() else {
            return std::future::pending().await;
        };
        time::sleep_until(deadline).await;
        self.fire(TokioInstant::now(), deadline, interval)
    }

    /// Next deadline and interval, if ticking is live.
    fn armed(&self) -> Option<(TokioInstant, Duration)> {
        if self.paused {
            return None;
        }
        Some((self.next_tick?, self.tick_duration?))
    }

    fn fire(
        &mut self,
        now: TokioInstant,
        deadline: TokioInstant,
        interval: Duration,
    ) -> TickInfo {
        self.tick_count += 1;
        self.tick_start = Some(Instant::now());

        let late_by = now.saturating_duration_since(deadline);
        let ticks_skipped = (late_by.as_nanos() / interval.as_nanos()) as u64;

        // Keep cadence while on time; after a stall, restart from now
        // instead of firing a burst of stale ticks.
        self.next_tick = Some(if ticks_skipped == 0 {
            deadline + interval
        } else {
            warn!(
                tick = self.tick_count,
                skipped = ticks_skipped,
                late_ms = late_by.as_secs_f64() * 1000.0,
                "tick overrun, skipping ahead"
            );
            now + interval
        });

        self.metrics.total_ticks += 1;
        self.metrics.total_skipped += ticks_skipped;
        trace!(tick = self.tick_count, "tick fired");

        TickInfo {
            tick: self.tick_count,
            interval,
            late_by,
            ticks_skipped,
        }
    }

    /// Records that the work for the current tick has finished.
    ///
    /// Feeds the budget warning and the timing metrics. A call without a
    /// preceding tick is ignored.
    pub fn record_tick_end(&mut self) {
        let Some(start) = self.tick_start.take() else {
            return;
        };
        let elapsed = start.elapsed();

        if let Some(budget) = self.tick_duration {
            let utilization = elapsed.as_secs_f64() / budget.as_secs_f64();
            self.metrics.budget_utilization = utilization;
            if utilization >= self.config.budget_warn_threshold {
                warn!(
                    tick = self.tick_count,
                    elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                    budget_ms = budget.as_secs_f64() * 1000.0,
                    "tick work approaching interval"
                );
            }
        }

        if elapsed > self.metrics.max_tick_time {
            self.metrics.max_tick_time = elapsed;
        }
        let alpha = 0.1;
        let prev = self.metrics.avg_tick_time.as_secs_f64();
        self.metrics.avg_tick_time =
            Duration::from_secs_f64(prev * (1.0 - alpha) + elapsed.as_secs_f64() * alpha);
    }

    /// Stops ticking until [`resume`](Self::resume). Idempotent.
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            debug!(tick = self.tick_count, "tick scheduler paused");
        }
    }

    /// Resumes ticking; the next tick is one interval from now, so time
    /// spent paused doesn't count as an overrun.
    pub fn resume(&mut self) {
        self.resume_at(TokioInstant::now());
    }

    /// [`resume`](Self::resume) with an explicit clock reading.
    pub fn resume_at(&mut self, now: TokioInstant) {
        if self.paused {
            self.paused = false;
            self.next_tick = self.tick_duration.map(|d| now + d);
            debug!(tick = self.tick_count, "tick scheduler resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Whether ticking is disabled (`tick_rate_hz == 0`).
    pub fn is_disabled(&self) -> bool {
        self.tick_duration.is_none()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn metrics(&self) -> &TickMetrics {
        &self.metrics
    }

    pub fn tick_rate_hz(&self) -> u32 {
        self.config.tick_rate_hz
    }

    pub fn tick_duration(&self) -> Option<Duration> {
        self.tick_duration
    }

    /// When the next tick is due, if ticking is live.
    pub fn next_deadline(&self) -> Option<TokioInstant> {
        self.armed().map(|(deadline, _)| deadline)
    }
}
