//! Parsers for the two bike-share datasets: GBFS station information JSON
//! and trip history CSV exports.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use flate2::read::GzDecoder;
use serde::Deserialize;
use std::io::Read;
use tracing::debug;

/// A physical dock location, joined to trips by `short_name`.
#[derive(Debug, Clone, Deserialize)]
pub struct Station {
    pub short_name: String,
    pub lon: f64,
    pub lat: f64,
}

/// One rental event. Immutable once loaded; a new dataset load replaces
/// the whole set.
#[derive(Debug, Clone, Deserialize)]
pub struct Trip {
    #[serde(deserialize_with = "deserialize_local_timestamp")]
    pub started_at: NaiveDateTime,
    #[serde(deserialize_with = "deserialize_local_timestamp")]
    pub ended_at: NaiveDateTime,
    pub start_station_id: String,
    pub end_station_id: String,
}

#[derive(Deserialize)]
struct StationFeed {
    data: StationFeedData,
}

#[derive(Deserialize)]
struct StationFeedData {
    stations: Vec<Station>,
}

/// Parses a GBFS `station_information` document:
/// `{"data": {"stations": [{"short_name", "lon", "lat", ...}, ...]}}`.
/// Unknown fields are ignored.
pub fn parse_stations(bytes: &[u8]) -> Result<Vec<Station>> {
    let feed: StationFeed =
        serde_json::from_slice(bytes).context("invalid station information JSON")?;
    debug!(station_count = feed.data.stations.len(), "Stations parsed");
    Ok(feed.data.stations)
}

/// Parses a trip history CSV. Only the four columns the pipeline needs are
/// read; system exports carry many more and they are ignored. Gzipped
/// exports are decompressed transparently.
pub fn parse_trips(bytes: &[u8]) -> Result<Vec<Trip>> {
    let bytes = maybe_gunzip(bytes)?;
    let mut rdr = csv::Reader::from_reader(bytes.as_slice());

    let mut trips = Vec::new();
    for result in rdr.deserialize() {
        let trip: Trip = result.context("invalid trip record")?;
        trips.push(trip);
    }

    debug!(trip_count = trips.len(), "Trips parsed");
    Ok(trips)
}

/// Decompresses gzip-compressed input, passing plain input through.
fn maybe_gunzip(bytes: &[u8]) -> Result<Vec<u8>> {
    if bytes.starts_with(&[0x1f, 0x8b]) {
        let mut out = Vec::new();
        GzDecoder::new(bytes)
            .read_to_end(&mut out)
            .context("failed to decompress gzipped trip data")?;
        Ok(out)
    } else {
        Ok(bytes.to_vec())
    }
}

/// Timestamp formats seen across system exports: space or `T` separated,
/// with or without fractional seconds.
const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

fn deserialize_local_timestamp<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&raw, fmt).ok())
        .ok_or_else(|| serde::de::Error::custom(format!("unparsable timestamp: {:?}", raw)))
}
