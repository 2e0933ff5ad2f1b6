//! Map generation pipeline.
//!
//! Reads the address sheet, geocodes it through the CSV cache,
//! joins points to district polygons and writes the HTML map.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use districtmap::config::Config;
use districtmap::geocode::{GeocodeCache, Geocoder};
use districtmap::models::GeoPoint;
use districtmap::pip::{load_districts, points_centroid, DistrictIndex, PipService};
use districtmap::render::MapPage;
use districtmap::sheet::read_records;

#[derive(Parser, Debug)]
#[command(name = "districtmap")]
#[command(about = "Geocode addresses and map them onto district boundaries")]
struct Args {
    /// Address sheet (.xlsx, .xls, .ods or .csv)
    sheet: PathBuf,

    /// District boundaries (GeoJSON)
    districts: PathBuf,

    /// Output HTML file
    #[arg(long, default_value = "mapa.html")]
    out: PathBuf,

    /// Geocoding cache (CSV)
    #[arg(long, default_value = "geocode_cache.csv")]
    cache: PathBuf,

    /// GeoJSON property holding the district name
    #[arg(long, default_value = "name")]
    name_col: String,

    /// Optional TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Suffix appended to every geocoding query
    #[arg(long)]
    city_hint: Option<String>,

    /// Minimum seconds between calls to one provider
    #[arg(long)]
    min_delay: Option<f64>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { "debug" } else { "info" };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = match &args.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::default(),
    };
    config
        .geocoding
        .apply_overrides(args.city_hint.as_deref(), args.min_delay);

    info!("Districtmap");
    info!("Sheet: {}", args.sheet.display());

    let mut sheet = read_records(&args.sheet, &config.input)?;

    let needs_geocoding = sheet
        .needs_geocoding(&config.input)
        .with_context(|| format!("Cannot place rows of {}", args.sheet.display()))?;

    if !needs_geocoding {
        info!("Sheet already has coordinates, skipping geocoding");
    } else {
        let mut cache = GeocodeCache::load(&args.cache).context("Failed to load geocode cache")?;
        let mut geocoder = Geocoder::from_config(&config.geocoding)?;

        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "Geocoding {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})",
                )?
                .progress_chars("#>-"),
        );

        let stats = geocoder
            .geocode_records(&mut sheet.records, &mut cache, &pb)
            .await?;
        if stats.failed > 0 {
            warn!(
                "{} addresses could not be geocoded and will be left off the map",
                stats.failed
            );
        }
    }

    let districts = load_districts(&args.districts, &args.name_col)?;
    if districts.is_empty() {
        warn!(
            "No districts with property '{}' in {}",
            args.name_col,
            args.districts.display()
        );
    }
    let pip_service = PipService::new(DistrictIndex::build(districts));

    let points = pip_service.join(sheet.records);

    let [lat, lon] = config.map.default_center;
    let center = points_centroid(&points).unwrap_or(GeoPoint::new(lat, lon));

    MapPage::new(
        &points,
        pip_service.index().districts().map(|d| d.as_ref()),
        center,
        &config.map,
        &config.labels,
    )
    .write(&args.out)?;

    println!("✔ Map saved → {}", args.out.display());
    Ok(())
}
