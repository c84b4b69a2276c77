//! core::schedule
//!
//! Commit timestamp scheduling.
//!
//! # Algorithm
//!
//! The window `[start, end]` is divided into `count + 1` equal intervals of
//! `width` seconds. Point `i` (1-based) lands at `start + i * width` plus a
//! uniform jitter in `[-width, width]`, clamped into the window. Interior
//! anchors keep the points away from the window edges while the jitter keeps
//! the spacing irregular.
//!
//! The points are then sorted and spread so that neighbours are at least
//! `width / 4` seconds apart. Commits are created in schedule order, so
//! sorted timestamps keep author dates monotonic along the new history.
//!
//! # Determinism
//!
//! The random source is injected. Tests pass a seeded `StdRng`.
//!
//! # Example
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use commit_mirage::core::schedule::{schedule, TimeWindow};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let window = TimeWindow::new(
//!     Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
//!     Utc.with_ymd_and_hms(2024, 1, 8, 0, 0, 0).unwrap(),
//! ).unwrap();
//!
//! let mut rng = StdRng::seed_from_u64(7);
//! let times = schedule(&window, 5, &mut rng).unwrap();
//! assert_eq!(times.len(), 5);
//! assert!(times.iter().all(|t| window.contains(*t)));
//! ```

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use thiserror::Error;

/// Errors from scheduling.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    /// The window ends before it starts.
    #[error("invalid window: end {end} is before start {start}")]
    EndBeforeStart {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// Fewer than one timestamp was requested.
    #[error("invalid window: at least one timestamp is required")]
    ZeroCount,
}

/// A closed time interval `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    /// Create a window, rejecting `end < start`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, ScheduleError> {
        if end < start {
            return Err(ScheduleError::EndBeforeStart { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Window length in whole seconds.
    pub fn seconds(&self) -> i64 {
        (self.end - self.start).num_seconds()
    }

    /// Whether `t` lies inside the window (inclusive).
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t <= self.end
    }

    /// Width in seconds of one of the `count + 1` scheduling intervals.
    pub fn interval_width(&self, count: usize) -> i64 {
        self.seconds() / (count as i64 + 1)
    }

    /// Minimum distance kept between neighbouring timestamps.
    pub fn minimum_spacing(&self, count: usize) -> i64 {
        self.interval_width(count) / 4
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} .. {}", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

/// Produce `count` timestamps inside `window`.
///
/// # Errors
///
/// - [`ScheduleError::ZeroCount`] when `count` is zero
pub fn schedule<R: Rng + ?Sized>(
    window: &TimeWindow,
    count: usize,
    rng: &mut R,
) -> Result<Vec<DateTime<Utc>>, ScheduleError> {
    if count == 0 {
        return Err(ScheduleError::ZeroCount);
    }

    let span = window.seconds();
    let width = window.interval_width(count);
    let spacing = window.minimum_spacing(count);

    let mut offsets: Vec<i64> = (1..=count as i64)
        .map(|i| {
            let jitter = if width > 0 {
                rng.random_range(-width..=width)
            } else {
                0
            };
            (i * width + jitter).clamp(0, span)
        })
        .collect();
    offsets.sort_unstable();

    spread(&mut offsets, spacing, span);

    Ok(offsets
        .into_iter()
        .map(|offset| window.start + Duration::seconds(offset))
        .collect())
}

/// Enforce `spacing` between sorted offsets without leaving `[0, span]`.
///
/// The forward pass may push the tail past `span`; the backward pass pulls
/// it back. `(len - 1) * spacing <= span` always holds for the spacing the
/// scheduler picks, so both bounds survive.
fn spread(offsets: &mut [i64], spacing: i64, span: i64) {
    if spacing == 0 {
        return;
    }
    for i in 1..offsets.len() {
        offsets[i] = offsets[i].max(offsets[i - 1] + spacing);
    }
    if let Some(last) = offsets.last_mut() {
        *last = (*last).min(span);
    }
    for i in (0..offsets.len().saturating_sub(1)).rev() {
        offsets[i] = offsets[i].min(offsets[i + 1] - spacing);
    }
}
