//! Merges aggregated trip counts onto the station list.
//!
//! The baseline projection annotates the canonical station list from the
//! full trip set. Filtered projections always build a fresh list from the
//! window-query subsets, so moving the slider never disturbs the baseline
//! counts.

use serde::Serialize;
use std::collections::HashMap;

use crate::loader::{Station, Trip};
use crate::traffic::{TimeFilter, TripIndex};

/// A station annotated with traffic counts for the active trip set.
#[derive(Debug, Clone, Serialize)]
pub struct StationTraffic {
    pub short_name: String,
    pub lon: f64,
    pub lat: f64,
    pub arrivals: usize,
    pub departures: usize,
    pub total_traffic: usize,
}

impl StationTraffic {
    fn new(station: &Station) -> Self {
        StationTraffic {
            short_name: station.short_name.clone(),
            lon: station.lon,
            lat: station.lat,
            arrivals: 0,
            departures: 0,
            total_traffic: 0,
        }
    }

    /// Share of traffic that is departures, in `[0.0, 1.0]`.
    ///
    /// A station with no traffic reads as balanced (0.5) rather than
    /// failing or skewing to one end.
    pub fn departure_ratio(&self) -> f64 {
        if self.total_traffic == 0 {
            0.5
        } else {
            self.departures as f64 / self.total_traffic as f64
        }
    }
}

/// Radius scale domain and output range for the circle markers, selected
/// per filter state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RadiusScale {
    pub max_total_traffic: usize,
    pub range_low: f64,
    pub range_high: f64,
}

/// Projects station traffic for a filter state.
///
/// The `TimeFilter::All` sentinel short-circuits the aggregator: the full
/// trip set is counted directly and no window query runs, so the result is
/// exactly the baseline projection. An active filter counts only the
/// window-query subsets.
pub fn project(
    stations: &[Station],
    trips: &[Trip],
    index: &TripIndex,
    filter: TimeFilter,
) -> Vec<StationTraffic> {
    match filter {
        TimeFilter::All => project_baseline(stations, trips),
        TimeFilter::Minute(m) => project_filtered(
            stations,
            trips,
            &index.departures_near(m),
            &index.arrivals_near(m),
        ),
    }
}

/// Annotates the station list with counts from the full trip set.
///
/// Departures count trips whose `start_station_id` matches the station's
/// `short_name`, arrivals match on `end_station_id`. Trips referencing an
/// unknown station are dropped at the join.
pub fn project_baseline(stations: &[Station], trips: &[Trip]) -> Vec<StationTraffic> {
    tally(
        stations,
        trips.iter().map(|t| t.start_station_id.as_str()),
        trips.iter().map(|t| t.end_station_id.as_str()),
    )
}

/// Builds a fresh annotated list from window-query subsets.
///
/// `departures` and `arrivals` are indices into `trips` as returned by the
/// aggregator's window queries. Counts are recomputed from the subsets
/// only; stations outside the window get zero counts, never omitted. The
/// caller's baseline list is untouched.
pub fn project_filtered(
    stations: &[Station],
    trips: &[Trip],
    departures: &[usize],
    arrivals: &[usize],
) -> Vec<StationTraffic> {
    tally(
        stations,
        departures.iter().map(|&i| trips[i].start_station_id.as_str()),
        arrivals.iter().map(|&i| trips[i].end_station_id.as_str()),
    )
}

fn tally<'a>(
    stations: &[Station],
    departure_ids: impl Iterator<Item = &'a str>,
    arrival_ids: impl Iterator<Item = &'a str>,
) -> Vec<StationTraffic> {
    let mut annotated: Vec<StationTraffic> = stations.iter().map(StationTraffic::new).collect();

    let by_short_name: HashMap<&str, usize> = stations
        .iter()
        .enumerate()
        .map(|(i, s)| (s.short_name.as_str(), i))
        .collect();

    for id in departure_ids {
        if let Some(&i) = by_short_name.get(id) {
            annotated[i].departures += 1;
        }
    }
    for id in arrival_ids {
        if let Some(&i) = by_short_name.get(id) {
            annotated[i].arrivals += 1;
        }
    }

    for station in &mut annotated {
        station.total_traffic = station.arrivals + station.departures;
    }

    annotated
}

/// Selects the radius scale for the current projection.
///
/// The domain runs from zero to the busiest station's total. Filtered
/// windows carry systematically smaller per-station totals, so the output
/// range widens from `[3, 25]` to `[3, 50]` when a filter is active.
pub fn radius_scale(stations: &[StationTraffic], filter: TimeFilter) -> RadiusScale {
    let max_total_traffic = stations.iter().map(|s| s.total_traffic).max().unwrap_or(0);
    let (range_low, range_high) = if filter.is_active() {
        (3.0, 50.0)
    } else {
        (3.0, 25.0)
    };

    RadiusScale {
        max_total_traffic,
        range_low,
        range_high,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traffic::TripIndex;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn station(short_name: &str) -> Station {
        Station {
            short_name: short_name.to_string(),
            lon: -71.09,
            lat: 42.36,
        }
    }

    fn sample_trips() -> Vec<Trip> {
        vec![
            Trip {
                started_at: at(0, 10),
                ended_at: at(0, 40),
                start_station_id: "A".to_string(),
                end_station_id: "B".to_string(),
            },
            Trip {
                started_at: at(23, 50),
                ended_at: at(0, 5),
                start_station_id: "B".to_string(),
                end_station_id: "A".to_string(),
            },
        ]
    }

    #[test]
    fn test_baseline_counts() {
        let stations = vec![station("A"), station("B")];
        let projected = project_baseline(&stations, &sample_trips());

        assert_eq!(projected[0].departures, 1);
        assert_eq!(projected[0].arrivals, 1);
        assert_eq!(projected[0].total_traffic, 2);
        assert_eq!(projected[1].departures, 1);
        assert_eq!(projected[1].arrivals, 1);
        assert_eq!(projected[1].total_traffic, 2);
    }

    #[test]
    fn test_sentinel_projection_equals_baseline_exactly() {
        let stations = vec![station("A"), station("B")];
        let trips = sample_trips();
        let index = TripIndex::build(&trips);

        let baseline = project_baseline(&stations, &trips);
        let sentinel = project(&stations, &trips, &index, TimeFilter::All);

        assert_eq!(sentinel.len(), baseline.len());
        for (s, b) in sentinel.iter().zip(&baseline) {
            assert_eq!(s.short_name, b.short_name);
            assert_eq!(
                (s.arrivals, s.departures, s.total_traffic),
                (b.arrivals, b.departures, b.total_traffic)
            );
        }
    }

    #[test]
    fn test_project_dispatches_active_filter_to_window() {
        let stations = vec![station("A"), station("B")];
        let trips = sample_trips();
        let index = TripIndex::build(&trips);

        let windowed = project(&stations, &trips, &index, TimeFilter::Minute(700));
        for s in &windowed {
            assert_eq!(s.total_traffic, 0);
        }

        let midnight = project(&stations, &trips, &index, TimeFilter::Minute(0));
        assert_eq!(midnight[0].total_traffic, 2);
        assert_eq!(midnight[1].total_traffic, 2);
    }

    #[test]
    fn test_conservation_holds_for_both_projections() {
        let stations = vec![station("A"), station("B")];
        let trips = sample_trips();
        let index = TripIndex::build(&trips);

        for projected in [
            project_baseline(&stations, &trips),
            project_filtered(
                &stations,
                &trips,
                &index.departures_near(0),
                &index.arrivals_near(0),
            ),
        ] {
            for s in &projected {
                assert_eq!(s.total_traffic, s.arrivals + s.departures);
            }
        }
    }

    #[test]
    fn test_midnight_window_matches_baseline_counts() {
        // Both trips fall inside the M=0 window, so the filtered counts
        // equal the baseline ones.
        let stations = vec![station("A"), station("B")];
        let trips = sample_trips();
        let index = TripIndex::build(&trips);

        let filtered = project_filtered(
            &stations,
            &trips,
            &index.departures_near(0),
            &index.arrivals_near(0),
        );

        assert_eq!(filtered[0].departures, 1);
        assert_eq!(filtered[0].arrivals, 1);
        assert_eq!(filtered[1].departures, 1);
        assert_eq!(filtered[1].arrivals, 1);
    }

    #[test]
    fn test_empty_window_zeroes_every_station() {
        let stations = vec![station("A"), station("B")];
        let trips = sample_trips();
        let index = TripIndex::build(&trips);

        // M=700 is far from both trips' times.
        let filtered = project_filtered(
            &stations,
            &trips,
            &index.departures_near(700),
            &index.arrivals_near(700),
        );

        assert_eq!(filtered.len(), 2);
        for s in &filtered {
            assert_eq!(s.arrivals, 0);
            assert_eq!(s.departures, 0);
            assert_eq!(s.total_traffic, 0);
        }
    }

    #[test]
    fn test_filtered_projection_leaves_baseline_untouched() {
        let stations = vec![station("A"), station("B")];
        let trips = sample_trips();
        let baseline = project_baseline(&stations, &trips);
        let before: Vec<(usize, usize, usize)> = baseline
            .iter()
            .map(|s| (s.arrivals, s.departures, s.total_traffic))
            .collect();

        let index = TripIndex::build(&trips);
        let _ = project_filtered(
            &stations,
            &trips,
            &index.departures_near(700),
            &index.arrivals_near(700),
        );

        let after: Vec<(usize, usize, usize)> = baseline
            .iter()
            .map(|s| (s.arrivals, s.departures, s.total_traffic))
            .collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_unknown_station_ids_are_dropped_at_the_join() {
        let stations = vec![station("A")];
        let mut trips = sample_trips();
        trips.push(Trip {
            started_at: at(12, 0),
            ended_at: at(12, 30),
            start_station_id: "GHOST".to_string(),
            end_station_id: "GHOST".to_string(),
        });

        let projected = project_baseline(&stations, &trips);
        assert_eq!(projected.len(), 1);
        assert_eq!(projected[0].departures, 1);
        assert_eq!(projected[0].arrivals, 1);
    }

    #[test]
    fn test_departure_ratio_neutral_at_zero() {
        let s = StationTraffic {
            short_name: "A".to_string(),
            lon: 0.0,
            lat: 0.0,
            arrivals: 0,
            departures: 0,
            total_traffic: 0,
        };
        assert_eq!(s.departure_ratio(), 0.5);

        let busy = StationTraffic {
            departures: 3,
            arrivals: 1,
            total_traffic: 4,
            ..s
        };
        assert_eq!(busy.departure_ratio(), 0.75);
    }

    #[test]
    fn test_radius_scale_switches_range_on_filter_state() {
        let stations = vec![station("A"), station("B")];
        let trips = sample_trips();
        let projected = project_baseline(&stations, &trips);

        let unfiltered = radius_scale(&projected, TimeFilter::All);
        assert_eq!(unfiltered.max_total_traffic, 2);
        assert_eq!((unfiltered.range_low, unfiltered.range_high), (3.0, 25.0));

        let filtered = radius_scale(&projected, TimeFilter::Minute(0));
        assert_eq!((filtered.range_low, filtered.range_high), (3.0, 50.0));
    }

    #[test]
    fn test_radius_scale_empty_station_list() {
        let scale = radius_scale(&[], TimeFilter::All);
        assert_eq!(scale.max_total_traffic, 0);
    }
}
