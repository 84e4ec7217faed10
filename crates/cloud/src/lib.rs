//! # s2composite cloud
//!
//! Sentinel-2 scene access over the network.
//!
//! - STAC item search against Earth Search, Planetary Computer or a custom
//!   endpoint, with pagination and Planetary Computer href signing
//! - Cloud Optimized GeoTIFF reads over HTTP Range requests, fetching only
//!   the blocks that cover the working grid
//! - Nearest-neighbour resampling of every band onto that grid
//!
//! The [`ImageArchive`] trait is the seam the pipeline searches and loads
//! through; [`StacArchive`] is the network implementation.

pub mod archive;
pub mod auth;
pub mod cog_reader;
pub mod decompress;
pub mod error;
pub mod http;
pub mod ifd;
pub mod resample;
pub mod stac_client;
pub mod stac_models;
pub mod tile_index;

pub use archive::{
    remove_boa_offset, scl_to_qa60, select_scenes, ArchiveQuery, BandMapping, ImageArchive,
    QaKind, SceneRef, StacArchive,
};
pub use auth::{CloudAuth, NoAuth};
pub use cog_reader::{CogMetadata, CogReader, CogReaderOptions};
pub use error::{CloudError, Result};
pub use http::HttpClient;
pub use resample::resample_nearest;
pub use stac_client::{StacCatalog, StacClient, StacClientOptions};
pub use stac_models::{StacItem, StacItemCollection, StacSearchParams, BOA_ADD_OFFSET};
pub use tile_index::BBox;
