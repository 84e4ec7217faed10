//! Native GeoTIFF reading/writing on top of the `tiff` crate.
//!
//! Output is Float32, DEFLATE compressed, pixel-interleaved, with one band
//! (indices) or three bands (true color). Georeferencing is carried by
//! ModelPixelScale + ModelTiepoint, the CRS by an EPSG geokey, and no-data
//! by the GDAL_NODATA ASCII tag set to `nan`.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster};
use std::fs::File;
use std::io::{BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::{ColorType, Gray32Float, RGB32Float};
use tiff::encoder::compression::Deflate;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

const MODEL_PIXEL_SCALE: Tag = Tag::ModelPixelScaleTag;
const MODEL_TIEPOINT: Tag = Tag::ModelTiepointTag;
const GEO_KEY_DIRECTORY: Tag = Tag::GeoKeyDirectoryTag;
const GDAL_NODATA: Tag = Tag::GdalNodata;

const GT_MODEL_TYPE: u16 = 1024;
const GT_RASTER_TYPE: u16 = 1025;
const GEOGRAPHIC_TYPE: u16 = 2048;
const PROJECTED_CS_TYPE: u16 = 3072;

/// Decoded GeoTIFF: every band on the same grid
#[derive(Debug, Clone)]
pub struct GeoTiff {
    pub bands: Vec<Raster<f64>>,
}

impl GeoTiff {
    pub fn band_count(&self) -> usize {
        self.bands.len()
    }
}

/// Write one or three co-registered bands to `path`
pub fn write_geotiff<P: AsRef<Path>>(bands: &[&Raster<f64>], path: P) -> Result<()> {
    let mut file = BufWriter::new(File::create(path.as_ref())?);
    encode_geotiff(bands, &mut file)?;
    file.flush()?;
    Ok(())
}

/// Encode one or three co-registered bands into an in-memory GeoTIFF
pub fn write_geotiff_to_buffer(bands: &[&Raster<f64>]) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    encode_geotiff(bands, &mut buf)?;
    Ok(buf.into_inner())
}

fn encode_geotiff<W: Write + Seek>(bands: &[&Raster<f64>], writer: W) -> Result<()> {
    let Some(first) = bands.first() else {
        return Err(Error::InvalidParameter {
            name: "bands",
            value: "0".into(),
            reason: "at least one band is required".into(),
        });
    };
    let (rows, cols) = first.shape();
    for band in &bands[1..] {
        if band.shape() != (rows, cols) {
            let (ar, ac) = band.shape();
            return Err(Error::SizeMismatch {
                er: rows,
                ec: cols,
                ar,
                ac,
            });
        }
    }

    let mut samples = Vec::with_capacity(rows * cols * bands.len());
    for (row, col) in (0..rows).flat_map(|r| (0..cols).map(move |c| (r, c))) {
        for band in bands {
            samples.push(band.data()[(row, col)] as f32);
        }
    }

    let geo = GeoTags::new(first.transform(), first.crs());
    let mut encoder = TiffEncoder::new(writer)?;
    match bands.len() {
        1 => write_image::<Gray32Float, _>(&mut encoder, &geo, cols, rows, &samples),
        3 => write_image::<RGB32Float, _>(&mut encoder, &geo, cols, rows, &samples),
        n => Err(Error::InvalidParameter {
            name: "bands",
            value: n.to_string(),
            reason: "GeoTIFF output supports 1 or 3 bands".into(),
        }),
    }
}

struct GeoTags {
    scale: [f64; 3],
    tiepoint: [f64; 6],
    geokeys: Vec<u16>,
}

impl GeoTags {
    fn new(gt: &GeoTransform, crs: Option<&CRS>) -> Self {
        // Version 1.1.0 header, key count patched below
        let mut geokeys: Vec<u16> = vec![1, 1, 0, 0];
        match crs {
            Some(crs) if crs.is_wgs84() => {
                geokeys.extend([GT_MODEL_TYPE, 0, 1, 2]);
                geokeys.extend([GT_RASTER_TYPE, 0, 1, 1]);
                geokeys.extend([GEOGRAPHIC_TYPE, 0, 1, crs.epsg() as u16]);
            }
            Some(crs) => {
                geokeys.extend([GT_MODEL_TYPE, 0, 1, 1]);
                geokeys.extend([GT_RASTER_TYPE, 0, 1, 1]);
                geokeys.extend([PROJECTED_CS_TYPE, 0, 1, crs.epsg() as u16]);
            }
            None => {
                geokeys.extend([GT_MODEL_TYPE, 0, 1, 1]);
                geokeys.extend([GT_RASTER_TYPE, 0, 1, 1]);
            }
        }
        geokeys[3] = ((geokeys.len() - 4) / 4) as u16;

        Self {
            scale: [gt.pixel_width, gt.pixel_height.abs(), 0.0],
            tiepoint: [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0],
            geokeys,
        }
    }
}

fn write_image<C, W>(
    encoder: &mut TiffEncoder<W>,
    geo: &GeoTags,
    cols: usize,
    rows: usize,
    samples: &[f32],
) -> Result<()>
where
    C: ColorType<Inner = f32>,
    W: Write + Seek,
{
    let mut image = encoder.new_image_with_compression::<C, _>(
        cols as u32,
        rows as u32,
        Deflate::default(),
    )?;
    let dir = image.encoder();
    dir.write_tag(MODEL_PIXEL_SCALE, &geo.scale[..])?;
    dir.write_tag(MODEL_TIEPOINT, &geo.tiepoint[..])?;
    dir.write_tag(GEO_KEY_DIRECTORY, geo.geokeys.as_slice())?;
    dir.write_tag(GDAL_NODATA, "nan")?;
    image.write_data(samples)?;
    Ok(())
}

/// Read every band of a GeoTIFF file
pub fn read_geotiff<P: AsRef<Path>>(path: P) -> Result<GeoTiff> {
    decode_geotiff(File::open(path.as_ref())?)
}

/// Read every band of an in-memory GeoTIFF
pub fn read_geotiff_from_buffer(data: &[u8]) -> Result<GeoTiff> {
    decode_geotiff(Cursor::new(data))
}

fn decode_geotiff<R: Read + Seek>(reader: R) -> Result<GeoTiff> {
    let mut decoder = Decoder::new(reader)?;
    let (width, height) = decoder.dimensions()?;
    let (rows, cols) = (height as usize, width as usize);

    let values: Vec<f64> = match decoder.read_image()? {
        DecodingResult::F32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::F64(buf) => buf,
        DecodingResult::U8(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U16(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I16(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I32(buf) => buf.into_iter().map(f64::from).collect(),
        _ => return Err(Error::Tiff("unsupported pixel format".into())),
    };
    let cells = rows * cols;
    if cells == 0 || values.len() % cells != 0 {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }
    let samples = values.len() / cells;

    let transform = read_transform(&mut decoder).unwrap_or_default();
    let crs = read_epsg(&mut decoder).map(CRS::from_epsg);
    let nodata = decoder
        .get_tag_ascii_string(GDAL_NODATA)
        .ok()
        .and_then(|s| s.trim_matches(char::from(0)).trim().parse::<f64>().ok());

    let mut bands = Vec::with_capacity(samples);
    for s in 0..samples {
        let data: Vec<f64> = values.iter().skip(s).step_by(samples).copied().collect();
        let mut raster = Raster::from_vec(data, rows, cols)?;
        raster.set_transform(transform);
        raster.set_crs(crs);
        raster.set_nodata(nodata);
        bands.push(raster);
    }
    Ok(GeoTiff { bands })
}

fn read_transform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(MODEL_PIXEL_SCALE).ok()?;
    let tiepoint = decoder.get_tag_f64_vec(MODEL_TIEPOINT).ok()?;
    GeoTransform::from_tiepoint(&scale, &tiepoint)
}

fn read_epsg<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<u32> {
    let keys = decoder.get_tag_u32_vec(GEO_KEY_DIRECTORY).ok()?;
    keys.get(4..)?
        .chunks_exact(4)
        .find(|k| k[0] == PROJECTED_CS_TYPE as u32 || k[0] == GEOGRAPHIC_TYPE as u32)
        .map(|k| k[3])
}
