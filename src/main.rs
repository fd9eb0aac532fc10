//! CLI entry point for the bikeshare traffic tool.
//!
//! Provides subcommands for emitting an annotated station snapshot at a
//! given time filter and for sweeping the windowed totals across all 1440
//! minutes of the day.

use anyhow::Result;
use bikeshare_traffic::{
    fetch::load_source,
    loader::{parse_stations, parse_trips},
    output::{Snapshot, SweepRecord, append_record, write_snapshot},
    projector::{project, project_filtered, radius_scale},
    traffic::{MINUTES_PER_DAY, TimeFilter, TripIndex},
};
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::Path;
use tracing::{debug, info};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "bikeshare_traffic")]
#[command(about = "A tool to aggregate bike-share station traffic", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Annotate stations with traffic counts at a time filter
    Snapshot {
        /// Path or URL of the station information JSON
        #[arg(long)]
        stations: String,

        /// Path or URL of the trip history CSV (optionally gzipped)
        #[arg(long)]
        trips: String,

        /// Minute of day to filter around (-1 = no filter)
        #[arg(short, long, default_value_t = -1)]
        minute: i32,

        /// JSON file to write the snapshot to (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Emit windowed totals for every minute of the day as CSV rows
    Sweep {
        /// Path or URL of the station information JSON
        #[arg(long)]
        stations: String,

        /// Path or URL of the trip history CSV (optionally gzipped)
        #[arg(long)]
        trips: String,

        /// CSV file to append sweep rows to
        #[arg(short, long, default_value = "sweep.csv")]
        output: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/bikeshare_traffic.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("bikeshare_traffic.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Snapshot {
            stations,
            trips,
            minute,
            output,
        } => {
            let filter = TimeFilter::from_raw(minute)?;
            let (stations, trips) = load_datasets(&stations, &trips).await?;

            let index = TripIndex::build(&trips);
            let annotated = project(&stations, &trips, &index, filter);
            let scale = radius_scale(&annotated, filter);

            write_snapshot(
                output.as_deref(),
                &Snapshot {
                    time_filter: minute,
                    scale,
                    stations: annotated,
                },
            )?;
        }
        Commands::Sweep {
            stations,
            trips,
            output,
        } => {
            sweep(&stations, &trips, &output).await?;
        }
    }

    Ok(())
}

/// Fetches and parses both datasets, joining before aggregation starts.
///
/// The two fetches run concurrently; the barrier guarantees the minute
/// index is built exactly once, only after both datasets have arrived.
#[tracing::instrument(fields(stations = %station_source, trips = %trip_source))]
async fn load_datasets(
    station_source: &str,
    trip_source: &str,
) -> Result<(
    Vec<bikeshare_traffic::loader::Station>,
    Vec<bikeshare_traffic::loader::Trip>,
)> {
    let (station_bytes, trip_bytes) =
        tokio::try_join!(load_source(station_source), load_source(trip_source))?;

    let stations = parse_stations(&station_bytes)?;
    let trips = parse_trips(&trip_bytes)?;

    info!(
        station_count = stations.len(),
        trip_count = trips.len(),
        "Datasets loaded"
    );
    Ok((stations, trips))
}

/// Runs a window query and filtered projection at every minute of the day,
/// appending one CSV row per minute.
#[tracing::instrument(skip(station_source, trip_source), fields(output))]
async fn sweep(station_source: &str, trip_source: &str, output: &str) -> Result<()> {
    let (stations, trips) = load_datasets(station_source, trip_source).await?;
    let index = TripIndex::build(&trips);

    for minute in 0..MINUTES_PER_DAY as u16 {
        let departures = index.departures_near(minute);
        let arrivals = index.arrivals_near(minute);
        let filtered = project_filtered(&stations, &trips, &departures, &arrivals);

        let busiest = filtered
            .iter()
            .max_by_key(|s| s.total_traffic)
            .filter(|s| s.total_traffic > 0);

        let record = SweepRecord {
            minute,
            window_departures: departures.len(),
            window_arrivals: arrivals.len(),
            busiest_station: busiest.map(|s| s.short_name.clone()),
            busiest_total: busiest.map(|s| s.total_traffic).unwrap_or(0),
        };

        if minute % 60 == 0 {
            debug!(minute, window_departures = record.window_departures, "Sweep progress");
        }
        append_record(output, &record)?;
    }

    info!(output, "Sweep complete");
    Ok(())
}
