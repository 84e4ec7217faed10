//! One pipeline run: region to exported artifacts.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate};
use geo::BoundingRect;
use s2composite_cloud::ImageArchive;
use s2composite_core::{GridLayout, Region, TimeWindow, CRS};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::builder::{CompositeBuilder, CompositeOutcome};
use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::exporter::RasterExporter;
use crate::planner::{new_run_id, output_directory, ExportPlan};
use crate::products::Products;

/// Progress of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    Idle,
    RegionLoaded,
    CompositeBuilt,
    IndicesComputed,
    Exporting,
    Done,
    Aborted,
}

impl RunState {
    pub fn can_transition_to(self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Idle, RegionLoaded)
                | (RegionLoaded, CompositeBuilt)
                | (CompositeBuilt, IndicesComputed)
                | (CompositeBuilt, Aborted)
                | (IndicesComputed, Exporting)
                | (Exporting, Done)
                | (Exporting, Aborted)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Done | RunState::Aborted)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug)]
struct Progress {
    state: RunState,
}

impl Progress {
    fn advance(&mut self, next: RunState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(Error::Pipeline(format!(
                "illegal run transition {} -> {next}",
                self.state
            )));
        }
        debug!(from = %self.state, to = %next, "run state");
        self.state = next;
        Ok(())
    }
}

/// Inputs of one run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// GeoJSON boundary: FeatureCollection, Feature, Polygon or MultiPolygon
    pub boundary: serde_json::Value,
    pub start: NaiveDate,
    /// Exclusive
    pub end: NaiveDate,
    /// Existing directory the artifacts are written to
    pub output_dir: PathBuf,
}

/// Outcome of a run that did not fail.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    /// `Done`, or `Aborted` when no imagery was found
    pub state: RunState,
    pub scene_count: usize,
    /// Logical key (`ndvi_tif`, ...) to absolute path; empty when aborted
    pub artifacts: BTreeMap<String, PathBuf>,
}

impl RunReport {
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// The artifact mapping, or [`Error::EmptyCollection`] when the run
    /// found no imagery.
    pub fn into_artifacts_strict(self) -> Result<BTreeMap<String, PathBuf>> {
        if self.state == RunState::Aborted {
            Err(Error::EmptyCollection)
        } else {
            Ok(self.artifacts)
        }
    }
}

/// The compositing and export pipeline over an [`ImageArchive`].
pub struct Pipeline<A> {
    archive: A,
    config: PipelineConfig,
}

impl<A: ImageArchive> Pipeline<A> {
    pub fn new(archive: A, config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { archive, config })
    }

    pub fn archive(&self) -> &A {
        &self.archive
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Working grid for `region`: the UTM zone of its bbox centre at the
    /// configured scale, covering the projected region.
    pub fn working_layout(&self, region: &Region) -> Result<GridLayout> {
        let (lon, lat) = region.center()?;
        let crs = CRS::utm_for_lon_lat(lon, lat)?;
        let rect = region
            .projected(&crs)?
            .bounding_rect()
            .ok_or_else(|| Error::InvalidGeometry("region has no extent".into()))?;
        let layout = GridLayout::covering(
            (rect.min().x, rect.min().y, rect.max().x, rect.max().y),
            crs,
            self.config.scale,
        )?;

        if layout.len() > self.config.max_grid_pixels {
            return Err(Error::InvalidParameter {
                name: "region",
                value: format!("{} x {} cells", layout.cols, layout.rows),
                reason: format!(
                    "working grid exceeds {} cells at {} m",
                    self.config.max_grid_pixels, self.config.scale
                ),
            });
        }
        Ok(layout)
    }

    pub fn composite_builder(&self) -> CompositeBuilder<'_, A> {
        CompositeBuilder::new(
            &self.archive,
            &self.config.collection,
            self.config.scene_timeout(),
        )
        .with_stack_limit(self.config.max_stack_cells)
    }

    /// Run with a fresh run id and the current local time.
    pub async fn run(&self, request: &RunRequest) -> Result<RunReport> {
        self.run_at(request, Local::now(), new_run_id()).await
    }

    /// Run with an explicit generation time and run id for the output names.
    pub async fn run_at(
        &self,
        request: &RunRequest,
        generated_at: DateTime<Local>,
        run_id: String,
    ) -> Result<RunReport> {
        let mut progress = Progress {
            state: RunState::Idle,
        };

        // Everything that can be rejected locally is checked before the
        // archive is queried.
        let region = Region::from_geojson_value(request.boundary.clone())?;
        let window = TimeWindow::new(request.start, request.end)?;
        let output_dir = output_directory(&request.output_dir)?;
        let layout = self.working_layout(&region)?;
        progress.advance(RunState::RegionLoaded)?;
        info!(
            run_id = %run_id,
            window = %window,
            crs = %layout.crs,
            rows = layout.rows,
            cols = layout.cols,
            "region loaded"
        );

        let outcome = self
            .composite_builder()
            .build(&region, &window, &layout)
            .await?;
        progress.advance(RunState::CompositeBuilt)?;
        let composite = match outcome {
            CompositeOutcome::Built(composite) => composite,
            CompositeOutcome::Empty => {
                progress.advance(RunState::Aborted)?;
                warn!(
                    "No Sentinel-2 imagery found for the selected region between {} and {}",
                    window.start(),
                    window.end()
                );
                return Ok(RunReport {
                    run_id,
                    state: progress.state,
                    scene_count: 0,
                    artifacts: BTreeMap::new(),
                });
            }
        };
        let scene_count = composite.scene_count();

        let products = Products::compute(&composite, &region.projected(&layout.crs)?)?;
        drop(composite);
        progress.advance(RunState::IndicesComputed)?;

        let plan = ExportPlan::new(
            &output_dir,
            &layout,
            self.config.preview_max_dimension,
            generated_at,
            &run_id,
        )?;
        let (width, height) = plan.preview_size;
        info!(
            "Median composite of {scene_count} scenes; scale={} m for GeoTIFF, \
             dimensions={width}x{height} for PNG",
            plan.scale
        );

        progress.advance(RunState::Exporting)?;
        let exporter = RasterExporter::new(self.config.max_concurrent_exports);
        match exporter.export_all(&plan, Arc::new(products)).await {
            Ok(artifacts) => {
                progress.advance(RunState::Done)?;
                for (key, path) in &artifacts {
                    info!("{key}: {}", path.display());
                }
                Ok(RunReport {
                    run_id,
                    state: progress.state,
                    scene_count,
                    artifacts,
                })
            }
            Err(e) => {
                progress.advance(RunState::Aborted)?;
                error!(run_id = %run_id, "export failed: {e}");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [RunState; 7] = [
        RunState::Idle,
        RunState::RegionLoaded,
        RunState::CompositeBuilt,
        RunState::IndicesComputed,
        RunState::Exporting,
        RunState::Done,
        RunState::Aborted,
    ];

    #[test]
    fn happy_path_transitions() {
        let mut p = Progress {
            state: RunState::Idle,
        };
        for next in [
            RunState::RegionLoaded,
            RunState::CompositeBuilt,
            RunState::IndicesComputed,
            RunState::Exporting,
            RunState::Done,
        ] {
            p.advance(next).unwrap();
        }
        assert!(p.state.is_terminal());
    }

    #[test]
    fn aborted_only_from_composite_or_export() {
        for from in ALL {
            let allowed = matches!(from, RunState::CompositeBuilt | RunState::Exporting);
            assert_eq!(from.can_transition_to(RunState::Aborted), allowed, "{from}");
        }
    }

    #[test]
    fn terminal_states_are_final() {
        for from in [RunState::Done, RunState::Aborted] {
            for to in ALL {
                assert!(!from.can_transition_to(to));
            }
        }
    }

    #[test]
    fn skipping_a_stage_is_an_error() {
        let mut p = Progress {
            state: RunState::RegionLoaded,
        };
        assert!(matches!(p.advance(RunState::Exporting), Err(Error::Pipeline(_))));
        assert_eq!(p.state, RunState::RegionLoaded);
    }

    #[test]
    fn strict_artifacts() {
        let aborted = RunReport {
            run_id: "00000000".into(),
            state: RunState::Aborted,
            scene_count: 0,
            artifacts: BTreeMap::new(),
        };
        assert!(aborted.is_empty());
        assert!(matches!(aborted.into_artifacts_strict(), Err(Error::EmptyCollection)));
    }
}
