//! Per-minute trip bucketing and windowed time filtering.
//!
//! Trips are binned once per dataset load into 1440 minute-of-day buckets,
//! one set keyed by departure time and one by arrival time. A window query
//! then collects every trip within ±60 minutes of a center minute, wrapping
//! across midnight, so a slider sweep costs at most 121 bucket lookups.

use chrono::{NaiveDateTime, Timelike};

use crate::loader::Trip;

/// Number of minute buckets in a day.
pub const MINUTES_PER_DAY: usize = 1440;

/// Half-width of the filter window, in minutes, on each side of the center.
pub const WINDOW_HALF_WIDTH: u16 = 60;

/// Time-of-day filter pushed in from the slider control.
///
/// The raw control value is `-1` for "no filter" or a minute-of-day in
/// `[0, 1439]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeFilter {
    /// No filter: the full trip set is used and no window query runs.
    All,
    /// Restrict to trips within ±60 minutes of this minute-of-day.
    Minute(u16),
}

impl TimeFilter {
    /// Converts the raw `-1 | [0,1439]` control value.
    pub fn from_raw(raw: i32) -> anyhow::Result<Self> {
        match raw {
            -1 => Ok(TimeFilter::All),
            m if (0..MINUTES_PER_DAY as i32).contains(&m) => Ok(TimeFilter::Minute(m as u16)),
            other => anyhow::bail!("time filter out of range: {} (expected -1 or 0..=1439)", other),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, TimeFilter::Minute(_))
    }
}

/// Minute of the local day for a timestamp, in `[0, 1439]`.
pub fn minute_of_day(ts: NaiveDateTime) -> u16 {
    (ts.hour() * 60 + ts.minute()) as u16
}

/// Departure and arrival minute buckets over a canonical trip slice.
///
/// Buckets hold indices into the trip slice the index was built from, so
/// the index stays cheap to build and the trips themselves are never
/// copied. Built once per loaded dataset; read-only afterwards.
#[derive(Debug)]
pub struct TripIndex {
    departures_by_minute: Vec<Vec<usize>>,
    arrivals_by_minute: Vec<Vec<usize>>,
}

impl TripIndex {
    /// Bins every trip by its departure and arrival minute-of-day.
    ///
    /// Each trip lands in exactly one departure bucket and exactly one
    /// arrival bucket. Timestamps are taken as parsed; validating them is
    /// the loader's job.
    pub fn build(trips: &[Trip]) -> Self {
        let mut departures_by_minute = vec![Vec::new(); MINUTES_PER_DAY];
        let mut arrivals_by_minute = vec![Vec::new(); MINUTES_PER_DAY];

        for (i, trip) in trips.iter().enumerate() {
            departures_by_minute[minute_of_day(trip.started_at) as usize].push(i);
            arrivals_by_minute[minute_of_day(trip.ended_at) as usize].push(i);
        }

        TripIndex {
            departures_by_minute,
            arrivals_by_minute,
        }
    }

    /// Trip indices departing within the window around `minute`.
    pub fn departures_near(&self, minute: u16) -> Vec<usize> {
        window_query(&self.departures_by_minute, minute)
    }

    /// Trip indices arriving within the window around `minute`.
    pub fn arrivals_near(&self, minute: u16) -> Vec<usize> {
        window_query(&self.arrivals_by_minute, minute)
    }
}

/// Flattens all buckets within ±60 minutes of `minute`, wrapping at
/// midnight.
///
/// The window is `[low, high)` in mod-1440 arithmetic with
/// `low = minute - 60` and `high = minute + 61`, so it always covers
/// exactly 121 buckets. When the window crosses midnight it is taken as
/// two slices, `[low, 1440)` then `[0, high)`. Output order is ascending
/// bucket order, insertion order within a bucket.
fn window_query(buckets: &[Vec<usize>], minute: u16) -> Vec<usize> {
    let n = MINUTES_PER_DAY as u16;
    let low = (minute + n - WINDOW_HALF_WIDTH) % n;
    let high = (minute + WINDOW_HALF_WIDTH + 1) % n;

    let mut out = Vec::new();
    if low < high {
        for bucket in &buckets[low as usize..high as usize] {
            out.extend_from_slice(bucket);
        }
    } else {
        for bucket in &buckets[low as usize..] {
            out.extend_from_slice(bucket);
        }
        for bucket in &buckets[..high as usize] {
            out.extend_from_slice(bucket);
        }
    }
    out
}
