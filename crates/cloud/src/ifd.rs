//! Classic TIFF header and IFD parsing from byte buffers.
//!
//! COG metadata sits at the start of the file, so the header, the first IFD
//! and most out-of-line tag values arrive in the first range request.
//! Values outside that buffer are fetched separately by the reader.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::{CloudError, Result};

/// Byte order of a TIFF file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    pub fn u16(self, b: &[u8]) -> u16 {
        match self {
            Endian::Little => LittleEndian::read_u16(b),
            Endian::Big => BigEndian::read_u16(b),
        }
    }

    pub fn u32(self, b: &[u8]) -> u32 {
        match self {
            Endian::Little => LittleEndian::read_u32(b),
            Endian::Big => BigEndian::read_u32(b),
        }
    }

    pub fn u64(self, b: &[u8]) -> u64 {
        match self {
            Endian::Little => LittleEndian::read_u64(b),
            Endian::Big => BigEndian::read_u64(b),
        }
    }

    pub fn f32(self, b: &[u8]) -> f32 {
        match self {
            Endian::Little => LittleEndian::read_f32(b),
            Endian::Big => BigEndian::read_f32(b),
        }
    }

    pub fn f64(self, b: &[u8]) -> f64 {
        match self {
            Endian::Little => LittleEndian::read_f64(b),
            Endian::Big => BigEndian::read_f64(b),
        }
    }
}

/// Tag ids read by the COG reader.
pub mod tags {
    pub const IMAGE_WIDTH: u16 = 256;
    pub const IMAGE_LENGTH: u16 = 257;
    pub const BITS_PER_SAMPLE: u16 = 258;
    pub const COMPRESSION: u16 = 259;
    pub const STRIP_OFFSETS: u16 = 273;
    pub const SAMPLES_PER_PIXEL: u16 = 277;
    pub const ROWS_PER_STRIP: u16 = 278;
    pub const STRIP_BYTE_COUNTS: u16 = 279;
    pub const PLANAR_CONFIG: u16 = 284;
    pub const PREDICTOR: u16 = 317;
    pub const TILE_WIDTH: u16 = 322;
    pub const TILE_LENGTH: u16 = 323;
    pub const TILE_OFFSETS: u16 = 324;
    pub const TILE_BYTE_COUNTS: u16 = 325;
    pub const SAMPLE_FORMAT: u16 = 339;
    pub const MODEL_PIXEL_SCALE: u16 = 33550;
    pub const MODEL_TIEPOINT: u16 = 33922;
    pub const MODEL_TRANSFORMATION: u16 = 34264;
    pub const GEO_KEY_DIRECTORY: u16 = 34735;
    pub const GDAL_NODATA: u16 = 42113;
}

/// One 12-byte IFD entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub tag: u16,
    pub field_type: u16,
    pub count: u32,
    /// The raw 4-byte value field: the value itself when it fits, else an offset
    pub value_field: [u8; 4],
}

impl Entry {
    /// Total size of the value in bytes
    pub fn value_len(&self) -> u64 {
        field_size(self.field_type) as u64 * self.count as u64
    }

    pub fn is_inline(&self) -> bool {
        self.value_len() <= 4
    }

    /// File offset of an out-of-line value
    pub fn value_offset(&self, endian: Endian) -> u64 {
        endian.u32(&self.value_field) as u64
    }
}

/// A parsed image file directory.
#[derive(Debug, Clone)]
pub struct Directory {
    pub endian: Endian,
    pub entries: Vec<Entry>,
    pub next_offset: u32,
}

impl Directory {
    pub fn get(&self, tag: u16) -> Option<&Entry> {
        self.entries.iter().find(|e| e.tag == tag)
    }
}

fn field_size(field_type: u16) -> usize {
    match field_type {
        1 | 2 | 6 | 7 => 1, // BYTE, ASCII, SBYTE, UNDEFINED
        3 | 8 => 2,         // SHORT, SSHORT
        4 | 9 | 11 => 4,    // LONG, SLONG, FLOAT
        5 | 10 | 12 => 8,   // RATIONAL, SRATIONAL, DOUBLE
        16 | 17 => 8,       // LONG8, SLONG8
        _ => 1,
    }
}

/// Parse the 8-byte header: byte order and first IFD offset.
pub fn parse_header(data: &[u8]) -> Result<(Endian, u32)> {
    let invalid = |reason: &str| CloudError::InvalidTiff {
        reason: reason.to_string(),
    };
    if data.len() < 8 {
        return Err(invalid("header too short"));
    }
    let endian = match &data[0..2] {
        b"II" => Endian::Little,
        b"MM" => Endian::Big,
        _ => return Err(invalid("invalid byte order marker")),
    };
    match endian.u16(&data[2..4]) {
        42 => Ok((endian, endian.u32(&data[4..8]))),
        43 => Err(CloudError::UnsupportedLayout("BigTIFF".into())),
        magic => Err(invalid(&format!("expected magic 42, got {magic}"))),
    }
}

/// Number of bytes an IFD with `entry_count` entries occupies.
pub fn directory_len(entry_count: u16) -> usize {
    2 + entry_count as usize * 12 + 4
}

/// Parse one IFD. `data` starts at the IFD offset.
pub fn parse_directory(endian: Endian, data: &[u8]) -> Result<Directory> {
    if data.len() < 2 {
        return Err(CloudError::InvalidTiff {
            reason: "IFD too short".into(),
        });
    }
    let count = endian.u16(&data[0..2]);
    let needed = directory_len(count);
    if data.len() < needed {
        return Err(CloudError::InvalidTiff {
            reason: format!("IFD needs {needed} bytes, {} available", data.len()),
        });
    }

    let entries = data[2..2 + count as usize * 12]
        .chunks_exact(12)
        .map(|e| Entry {
            tag: endian.u16(&e[0..2]),
            field_type: endian.u16(&e[2..4]),
            count: endian.u32(&e[4..8]),
            value_field: [e[8], e[9], e[10], e[11]],
        })
        .collect();
    let next_offset = endian.u32(&data[needed - 4..needed]);

    Ok(Directory {
        endian,
        entries,
        next_offset,
    })
}

/// Integer values of an entry, from `bytes` (the inline field or the
/// out-of-line value).
pub fn decode_unsigned(endian: Endian, entry: &Entry, bytes: &[u8]) -> Vec<u64> {
    let size = field_size(entry.field_type);
    bytes
        .chunks_exact(size)
        .take(entry.count as usize)
        .filter_map(|b| match entry.field_type {
            1 | 7 => Some(b[0] as u64),
            3 => Some(endian.u16(b) as u64),
            4 => Some(endian.u32(b) as u64),
            16 => Some(endian.u64(b)),
            _ => None,
        })
        .collect()
}

/// Floating point values of an entry.
pub fn decode_float(endian: Endian, entry: &Entry, bytes: &[u8]) -> Vec<f64> {
    let size = field_size(entry.field_type);
    bytes
        .chunks_exact(size)
        .take(entry.count as usize)
        .filter_map(|b| match entry.field_type {
            11 => Some(endian.f32(b) as f64),
            12 => Some(endian.f64(b)),
            3 => Some(endian.u16(b) as f64),
            4 => Some(endian.u32(b) as f64),
            _ => None,
        })
        .collect()
}

/// NUL-terminated ASCII value of an entry.
pub fn decode_ascii(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).trim().to_string()
}
