//! Tile decompression and sample decoding.

use std::io::Read;

use flate2::read::{DeflateDecoder, ZlibDecoder};

use crate::error::{CloudError, Result};
use crate::ifd::Endian;

pub const COMPRESSION_NONE: u16 = 1;
pub const COMPRESSION_LZW: u16 = 5;
pub const COMPRESSION_DEFLATE: u16 = 8;
pub const COMPRESSION_ADOBE_DEFLATE: u16 = 32946;

pub const PREDICTOR_NONE: u16 = 1;
pub const PREDICTOR_HORIZONTAL: u16 = 2;

pub const SAMPLE_UINT: u16 = 1;
pub const SAMPLE_INT: u16 = 2;
pub const SAMPLE_FLOAT: u16 = 3;

/// Decompress one tile or strip.
pub fn decompress(data: &[u8], compression: u16, expected_len: usize) -> Result<Vec<u8>> {
    match compression {
        COMPRESSION_NONE => Ok(data.to_vec()),
        COMPRESSION_DEFLATE | COMPRESSION_ADOBE_DEFLATE => inflate(data, expected_len),
        COMPRESSION_LZW => weezl::decode::Decoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8)
            .decode(data)
            .map_err(|e| CloudError::Decompress(format!("LZW: {e}"))),
        other => Err(CloudError::UnsupportedCompression(other)),
    }
}

fn inflate(data: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(expected_len);
    if ZlibDecoder::new(data).read_to_end(&mut out).is_ok() {
        return Ok(out);
    }
    // Some writers emit raw deflate streams without the zlib wrapper
    out.clear();
    DeflateDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| CloudError::Decompress(format!("DEFLATE: {e}")))?;
    Ok(out)
}

/// Undo horizontal differencing in place. `row_samples` is the number of
/// samples per row of the block.
pub fn undo_horizontal_predictor(
    buf: &mut [u8],
    endian: Endian,
    bits_per_sample: u16,
    row_samples: usize,
) -> Result<()> {
    let bytes = (bits_per_sample / 8) as usize;
    if bytes == 0 || row_samples == 0 {
        return Ok(());
    }
    let row_bytes = row_samples * bytes;
    for row in buf.chunks_exact_mut(row_bytes) {
        match bits_per_sample {
            8 => {
                for i in 1..row_samples {
                    row[i] = row[i].wrapping_add(row[i - 1]);
                }
            }
            16 => {
                let mut prev = endian.u16(&row[0..2]);
                for i in 1..row_samples {
                    let at = i * 2;
                    let value = endian.u16(&row[at..at + 2]).wrapping_add(prev);
                    write_u16(endian, &mut row[at..at + 2], value);
                    prev = value;
                }
            }
            32 => {
                let mut prev = endian.u32(&row[0..4]);
                for i in 1..row_samples {
                    let at = i * 4;
                    let value = endian.u32(&row[at..at + 4]).wrapping_add(prev);
                    write_u32(endian, &mut row[at..at + 4], value);
                    prev = value;
                }
            }
            other => {
                return Err(CloudError::UnsupportedLayout(format!(
                    "horizontal predictor with {other}-bit samples"
                )))
            }
        }
    }
    Ok(())
}

fn write_u16(endian: Endian, b: &mut [u8], v: u16) {
    b.copy_from_slice(&match endian {
        Endian::Little => v.to_le_bytes(),
        Endian::Big => v.to_be_bytes(),
    });
}

fn write_u32(endian: Endian, b: &mut [u8], v: u32) {
    b.copy_from_slice(&match endian {
        Endian::Little => v.to_le_bytes(),
        Endian::Big => v.to_be_bytes(),
    });
}

/// Decode raw sample bytes into `f64` values.
pub fn decode_samples(
    raw: &[u8],
    endian: Endian,
    bits_per_sample: u16,
    sample_format: u16,
) -> Result<Vec<f64>> {
    let unsupported = || CloudError::UnsupportedDataType {
        bps: bits_per_sample,
        sf: sample_format,
    };
    let width = (bits_per_sample / 8) as usize;
    if width == 0 || bits_per_sample % 8 != 0 {
        return Err(unsupported());
    }

    let decode: fn(Endian, &[u8]) -> f64 = match (sample_format, bits_per_sample) {
        (SAMPLE_UINT, 8) => |_, b| b[0] as f64,
        (SAMPLE_UINT, 16) => |e, b| e.u16(b) as f64,
        (SAMPLE_UINT, 32) => |e, b| e.u32(b) as f64,
        (SAMPLE_INT, 8) => |_, b| b[0] as i8 as f64,
        (SAMPLE_INT, 16) => |e, b| e.u16(b) as i16 as f64,
        (SAMPLE_INT, 32) => |e, b| e.u32(b) as i32 as f64,
        (SAMPLE_FLOAT, 32) => |e, b| e.f32(b) as f64,
        (SAMPLE_FLOAT, 64) => |e, b| e.f64(b),
        _ => return Err(unsupported()),
    };

    Ok(raw.chunks_exact(width).map(|b| decode(endian, b)).collect())
}
