use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use geotrust_core::geofence::{checked_point, Geofence};
use geotrust_core::Coordinate;

mod replay;
mod script;
mod settings;

#[derive(Parser, Debug)]
#[command(
    name = "geotrust",
    author,
    version,
    about = "Replay position streams and trip scripts through the location trust engine",
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,

    /// JSON engine configuration; built-in defaults when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// One-shot geofence check of a single point
    Check {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        #[arg(long, allow_hyphen_values = true)]
        fence_lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        fence_lon: f64,
        /// Fence radius in meters; attendance radius from the configuration when omitted
        #[arg(long)]
        radius: Option<f64>,
    },

    /// Feed a JSON array of position samples through the attendance guard
    Replay {
        samples: PathBuf,
        #[arg(long, allow_hyphen_values = true)]
        fence_lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        fence_lon: f64,
        #[arg(long)]
        radius: Option<f64>,
        /// Block on suspicious trust regardless of the configuration
        #[arg(long)]
        enforce_trust: bool,
    },

    /// Run a scripted trip through the trip service
    Trip { script: PathBuf },
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.verbose.log_level_filter())
        .format_timestamp_millis()
        .init();

    run(cli).map_err(|e| miette::miette!("{:#}", e))
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = settings::load_config(cli.config.as_deref())?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Command::Check {
            lat,
            lon,
            fence_lat,
            fence_lon,
            radius,
        } => {
            let point = Coordinate::new(lat, lon).context("invalid --lat/--lon")?;
            let center =
                Coordinate::new(fence_lat, fence_lon).context("invalid --fence-lat/--fence-lon")?;
            let fence = Geofence::new(
                "cli",
                center,
                radius.unwrap_or(config.attendance.radius_meters),
            );
            let check = checked_point(point, &fence)?;
            log::debug!("{} -> {}: {:?}", point, fence.center, check);
            serde_json::to_writer(&mut out, &check)?;
            writeln!(out)?;
        }
        Command::Replay {
            samples,
            fence_lat,
            fence_lon,
            radius,
            enforce_trust,
        } => {
            let samples = replay::read_samples(&samples)?;
            let center =
                Coordinate::new(fence_lat, fence_lon).context("invalid --fence-lat/--fence-lon")?;
            let fence = Geofence::new(
                "replay",
                center,
                radius.unwrap_or(config.attendance.radius_meters),
            );
            let mut attendance = config.attendance.clone();
            attendance.enforce_trust |= enforce_trust;
            replay::replay(&samples, &fence, &attendance, &config.analyzer, &mut out)?;
        }
        Command::Trip { script } => {
            let script = script::read_script(&script)?;
            script::run_script(&script, &config.trip, &mut out)?;
        }
    }

    out.flush()?;
    Ok(())
}
