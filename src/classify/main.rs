//! Batch geocoder and ASGS classifier.
//!
//! Reads location names, geocodes them through Nominatim under a shared
//! rate limit, classifies the points against ABS boundary layers and writes
//! one CSV row per name.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use asgs_geoclass::config::Settings;
use asgs_geoclass::pip::{ClassificationSummary, Classifier, GeocodeCheck, DEFAULT_MIN_SUCCESS_RATE};
use asgs_geoclass::pipeline::{load_layers, HealthStatus, Pipeline};
use asgs_geoclass::resume::{load_cache, ResumePlan};
use asgs_geoclass::ClassificationRecord;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "geoclassify")]
#[command(about = "Geocode location names and classify them into ASGS regions")]
struct Args {
    /// File with one location name per line
    #[arg(short, long)]
    input: PathBuf,

    /// CSV output path (stdout if omitted); an existing file is reused as a cache
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Ignore any existing output and process every location
    #[arg(long)]
    rebuild: bool,

    /// Geocode only, without loading boundary layers
    #[arg(long)]
    skip_classification: bool,

    /// TOML settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the geocoder search endpoint
    #[arg(long)]
    endpoint: Option<String>,

    /// Directory holding ABS boundary files under their published names
    #[arg(long)]
    asgs_dir: Option<PathBuf>,

    /// Check the geocoder and layers, then exit
    #[arg(long)]
    health: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) -> Result<()> {
    if std::env::var_os("RUST_LOG").is_some() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(io::stderr)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let level = if verbose { Level::DEBUG } else { Level::INFO };
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_writer(io::stderr)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(())
}

/// Names one per line; blank lines and `#` comments are skipped
fn read_names(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut names = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.context("Failed to read input")?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        names.push(trimmed.to_string());
    }
    Ok(names)
}

fn write_csv<W: Write>(writer: W, records: &[ClassificationRecord]) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(ClassificationRecord::csv_header())?;
    for record in records {
        csv.write_record(record.csv_row())?;
    }
    csv.flush()?;
    Ok(())
}

fn log_summary(summary: &ClassificationSummary) {
    info!(
        "Geocoded {}/{} locations ({:.1}%), {} with invalid coordinates",
        summary.geocoded,
        summary.total_locations,
        summary.geocoding_rate() * 100.0,
        summary.invalid_coordinates
    );
    for (layer, tally) in &summary.layers {
        info!(
            "  {}: {}/{} matched ({:.1}%), {} multi-match",
            layer,
            tally.matched,
            tally.total,
            tally.rate() * 100.0,
            tally.multi_match
        );
    }
    for (state, count) in &summary.states {
        info!("  {}: {}", state, count);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose)?;

    let mut settings = match &args.config {
        Some(path) => Settings::load_from_file(path)?,
        None => Settings::default(),
    };
    if let Some(endpoint) = &args.endpoint {
        settings.geocoder.endpoint = endpoint.clone();
    }
    if let Some(dir) = &args.asgs_dir {
        settings.layers.asgs_dir = Some(dir.clone());
    }
    settings.validate()?;

    info!("ASGS geoclassify");
    info!("Geocoder endpoint: {}", settings.geocoder.endpoint);

    let classifier = if args.skip_classification {
        info!("ABS classification skipped as requested");
        Classifier::default()
    } else {
        let (layers, failed) = tokio::task::block_in_place(|| load_layers(&settings.layers));
        for (key, e) in &failed {
            error!("{} layer omitted: {}", key, e);
        }
        let classifier = Classifier::new(layers);
        if !classifier.has_layers() {
            warn!("No boundary layers loaded; records will carry coordinates only");
        }
        classifier
    };

    let client = settings
        .geocoder
        .client()
        .context("Failed to build geocoder client")?;
    let pipeline = Pipeline::new(client, classifier);

    if args.health {
        let report = pipeline.health().await;
        println!("{}", serde_json::to_string_pretty(&report)?);
        if report.status == HealthStatus::Degraded {
            anyhow::bail!("Service is degraded");
        }
        return Ok(());
    }

    let names = read_names(&args.input)?;
    info!("Loaded {} location names from {}", names.len(), args.input.display());

    let cache = match &args.output {
        Some(path) if !args.rebuild => load_cache(path),
        _ => Default::default(),
    };
    let plan = ResumePlan::new(&names, cache, args.rebuild);
    let to_geocode = plan.to_geocode();
    info!(
        "Cache analyzed: {} complete, {} classification needed, {} full processing needed",
        plan.complete(),
        plan.classify_only(),
        to_geocode.len()
    );

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, finishing current location");
                cancel.store(true, Ordering::Relaxed);
            }
        });
    }

    let pb = ProgressBar::new(to_geocode.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
            )?
            .progress_chars("#>-"),
    );

    let mut geocoded = plan.cached_geocodes();
    geocoded.extend(
        pipeline
            .geocode_all(&to_geocode, &cancel, |result| {
                pb.set_message(result.name.clone());
                pb.inc(1);
            })
            .await,
    );
    pb.finish_with_message("geocoding done");

    let fresh = tokio::task::block_in_place(|| pipeline.classify(&geocoded));
    if !fresh.is_empty() {
        let check = GeocodeCheck::run(&fresh, DEFAULT_MIN_SUCCESS_RATE);
        check.log();
        if !check.passed() {
            warn!("Geocoding validation failed");
        }
    }
    let records = plan.assemble(fresh);

    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            write_csv(file, &records)?;
            info!("Wrote {} records to {}", records.len(), path.display());
        }
        None => write_csv(io::stdout().lock(), &records)?,
    }

    log_summary(&pipeline.summarize(&records));
    Ok(())
}
