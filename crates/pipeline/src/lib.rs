//! # s2composite pipeline
//!
//! Turns a GeoJSON region and a date range into cloud-masked median
//! composites of Sentinel-2 imagery, derives NDVI, NDMI, NDWI and true
//! color from them, and exports each product as a georeferenced GeoTIFF
//! and a PNG preview.
//!
//! ```no_run
//! use s2composite_pipeline::{Pipeline, PipelineConfig, RunRequest};
//!
//! # async fn example() -> s2composite_pipeline::Result<()> {
//! let config = PipelineConfig::default();
//! let pipeline = Pipeline::new(config.stac_archive()?, config)?;
//! let report = pipeline
//!     .run(&RunRequest {
//!         boundary: serde_json::from_str(r#"{"type":"Polygon","coordinates":[[[-70.6,-33.5],[-70.5,-33.5],[-70.5,-33.4],[-70.6,-33.5]]]}"#).unwrap(),
//!         start: "2024-01-01".parse().unwrap(),
//!         end: "2024-02-01".parse().unwrap(),
//!         output_dir: "out".into(),
//!     })
//!     .await?;
//! println!("{}", serde_json::to_string_pretty(&report.artifacts).unwrap());
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod config;
pub mod error;
pub mod exporter;
pub mod planner;
pub mod products;
pub mod run;

pub use builder::{CompositeBuilder, CompositeOutcome, DEFAULT_MAX_STACK_CELLS, MAX_CLOUD_COVER};
pub use config::{PipelineConfig, PREVIEW_DIMENSION_CAP};
pub use error::{Error, Result};
pub use exporter::{RasterExporter, WRITE_CHUNK_SIZE};
pub use planner::{
    new_run_id, output_directory, preview_size, ArtifactFormat, ExportPlan, PlannedArtifact,
    TIMESTAMP_FORMAT,
};
pub use products::{Product, Products};
pub use run::{Pipeline, RunReport, RunRequest, RunState};
