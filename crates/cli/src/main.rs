//! s2composite CLI - Sentinel-2 composites and spectral index exports

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use s2composite_core::io::read_geotiff;
use s2composite_core::{Region, TimeWindow};
use s2composite_pipeline::{Pipeline, PipelineConfig, RunRequest};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "s2composite")]
#[command(
    author,
    version,
    about = "Sentinel-2 median composites and spectral indices",
    long_about = None
)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the composite and export NDVI, NDMI, NDWI and RGB products
    Export {
        #[command(flatten)]
        query: QueryArgs,
        /// Existing directory for the GeoTIFFs and PNG previews
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
        /// GeoTIFF cell size in metres
        #[arg(long)]
        scale: Option<f64>,
        /// Longer side of the PNG previews (at most 2048)
        #[arg(long)]
        preview_dim: Option<u32>,
        /// Artifacts written concurrently
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// List the scenes a composite would use
    Search {
        #[command(flatten)]
        query: QueryArgs,
    },
    /// Show information about an exported GeoTIFF
    Info {
        /// Input raster file
        input: PathBuf,
    },
}

#[derive(Args)]
struct QueryArgs {
    /// GeoJSON boundary (FeatureCollection, Feature or geometry)
    #[arg(short, long)]
    region: PathBuf,
    /// First acquisition date, YYYY-MM-DD
    #[arg(short, long)]
    start: NaiveDate,
    /// End date (exclusive), YYYY-MM-DD
    #[arg(short, long)]
    end: NaiveDate,
    /// JSON pipeline configuration
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// `earth-search`, `planetary-computer`, or a STAC API URL
    #[arg(long)]
    catalog: Option<String>,
    /// STAC collection id
    #[arg(long)]
    collection: Option<String>,
}

impl QueryArgs {
    fn config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => PipelineConfig::default(),
        };
        if let Some(catalog) = &self.catalog {
            config.catalog = catalog.clone();
        }
        if let Some(collection) = &self.collection {
            config.collection = collection.clone();
        }
        Ok(config)
    }

    fn check_dates(&self) -> Result<()> {
        if self.end < self.start {
            anyhow::bail!("End date {} is before start date {}", self.end, self.start);
        }
        let today = Local::now().date_naive();
        if self.start > today {
            anyhow::bail!("Start date {} is in the future", self.start);
        }
        Ok(())
    }

    fn boundary(&self) -> Result<serde_json::Value> {
        let text = std::fs::read_to_string(&self.region)
            .with_context(|| format!("Failed to read region {}", self.region.display()))?;
        serde_json::from_str(&text).context("Region is not valid JSON")
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// One line per saved artifact, then the run's processing time.
fn export_summary(artifacts: &BTreeMap<String, PathBuf>, elapsed: std::time::Duration) -> String {
    let mut out = String::new();
    for (name, path) in artifacts {
        out.push_str(&format!("{} saved to: {}\n", name, path.display()));
    }
    out.push_str(&format!("  Processing time: {:.2?}", elapsed));
    out
}

// ─── Commands ───────────────────────────────────────────────────────────

async fn export(
    query: QueryArgs,
    output: PathBuf,
    scale: Option<f64>,
    preview_dim: Option<u32>,
    concurrency: Option<usize>,
) -> Result<()> {
    query.check_dates()?;
    let mut config = query.config()?;
    if let Some(scale) = scale {
        config.scale = scale;
    }
    if let Some(dim) = preview_dim {
        config.preview_max_dimension = dim;
    }
    if let Some(n) = concurrency {
        config.max_concurrent_exports = n;
    }

    let archive = config.stac_archive().context("Failed to set up the catalog client")?;
    let pipeline = Pipeline::new(archive, config).context("Invalid configuration")?;
    let request = RunRequest {
        boundary: query.boundary()?,
        start: query.start,
        end: query.end,
        output_dir: output,
    };

    let start = Instant::now();
    let pb = spinner("Compositing Sentinel-2 imagery...");
    let result = pipeline.run(&request).await;
    pb.finish_and_clear();
    let report = result.context("Export failed")?;

    eprintln!("{}", export_summary(&report.artifacts, start.elapsed()));
    println!("{}", serde_json::to_string_pretty(&report.artifacts)?);
    Ok(())
}

async fn search(query: QueryArgs) -> Result<()> {
    query.check_dates()?;
    let config = query.config()?;
    let region = Region::from_geojson_value(query.boundary()?).context("Invalid region")?;
    let window = TimeWindow::new(query.start, query.end)?;

    let archive = config.stac_archive().context("Failed to set up the catalog client")?;
    let pipeline = Pipeline::new(archive, config).context("Invalid configuration")?;

    let pb = spinner("Searching catalog...");
    let result = pipeline.composite_builder().search(&region, &window).await;
    pb.finish_and_clear();
    let scenes = result.context("Search failed")?;

    info!("{} scenes in {}", scenes.len(), window);
    println!("{}", serde_json::to_string_pretty(&scenes)?);
    Ok(())
}

fn show_info(input: &Path) -> Result<()> {
    let tiff = read_geotiff(input).context("Failed to read raster")?;
    let first = tiff.bands.first().context("Raster has no bands")?;
    let (rows, cols) = first.shape();
    let bounds = first.bounds();

    println!("File: {}", input.display());
    println!("Dimensions: {} x {} ({} cells)", cols, rows, first.len());
    println!("Bands: {}", tiff.band_count());
    println!("Cell size: {}", first.transform().cell_size());
    println!(
        "Bounds: ({:.3}, {:.3}) - ({:.3}, {:.3})",
        bounds.0, bounds.1, bounds.2, bounds.3
    );
    if let Some(crs) = first.crs() {
        println!("CRS: {}", crs);
    }
    if let Some(nodata) = first.nodata() {
        println!("NoData: {}", nodata);
    }
    for (i, band) in tiff.bands.iter().enumerate() {
        let stats = band.statistics();
        println!("\nBand {}:", i + 1);
        if let Some(min) = stats.min {
            println!("  Min: {:.4}", min);
        }
        if let Some(max) = stats.max {
            println!("  Max: {:.4}", max);
        }
        if let Some(mean) = stats.mean {
            println!("  Mean: {:.4}", mean);
        }
        println!(
            "  Valid cells: {} ({:.1}%)",
            stats.valid_count,
            100.0 * stats.valid_count as f64 / band.len() as f64
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Export {
            query,
            output,
            scale,
            preview_dim,
            concurrency,
        } => export(query, output, scale, preview_dim, concurrency).await,
        Commands::Search { query } => search(query).await,
        Commands::Info { input } => show_info(&input),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn summary_reports_time_once() {
        let artifacts: BTreeMap<String, PathBuf> = ["ndvi_tif", "ndvi_png", "rgb_tif"]
            .into_iter()
            .map(|k| (k.to_string(), PathBuf::from(format!("/out/{k}"))))
            .collect();
        let summary = export_summary(&artifacts, Duration::from_millis(1500));

        assert_eq!(summary.matches("Processing time").count(), 1);
        assert_eq!(summary.matches("saved to:").count(), 3);
        assert!(summary.ends_with("Processing time: 1.50s"));
        assert!(summary.starts_with("ndvi_png saved to: /out/ndvi_png\n"));
    }
}
