// Minimal single-band GeoTIFF support: uncompressed, little-endian, 32-bit
// samples, with the ModelPixelScale / ModelTiepoint / GDAL_NODATA tags needed
// to carry a georeferenced grid. This covers the basic grids (DEM, DDM, FAM)
// and the timestamped state rasters; it is not a general TIFF implementation.

use crate::error::{LimnoError, Result};
use crate::grid::{Extent, FloatGrid, Grid, LongGrid};
use std::fs;
use std::path::Path;

const TIFF_MAGIC: u16 = 42;

//Tag ids
const TAG_IMAGE_WIDTH: u16 = 256;
const TAG_IMAGE_LENGTH: u16 = 257;
const TAG_BITS_PER_SAMPLE: u16 = 258;
const TAG_COMPRESSION: u16 = 259;
const TAG_PHOTOMETRIC: u16 = 262;
const TAG_STRIP_OFFSETS: u16 = 273;
const TAG_SAMPLES_PER_PIXEL: u16 = 277;
const TAG_ROWS_PER_STRIP: u16 = 278;
const TAG_STRIP_BYTE_COUNTS: u16 = 279;
const TAG_SAMPLE_FORMAT: u16 = 339;
const TAG_MODEL_PIXEL_SCALE: u16 = 33550;
const TAG_MODEL_TIEPOINT: u16 = 33922;
const TAG_GDAL_NODATA: u16 = 42113;

//Field types
const TYPE_ASCII: u16 = 2;
const TYPE_SHORT: u16 = 3;
const TYPE_LONG: u16 = 4;
const TYPE_DOUBLE: u16 = 12;

const SAMPLE_FORMAT_INT: u16 = 2;
const SAMPLE_FORMAT_FLOAT: u16 = 3;

pub fn read_float_tif_grid(file: &str) -> Result<FloatGrid> {
    let raw = RawTif::read(file, SAMPLE_FORMAT_FLOAT)?;
    let no_data = raw
        .no_data
        .map(|v| v as f32)
        .unwrap_or(-9999.0);
    let mut grid = Grid::new(raw.rows, raw.cols, raw.cell_size, raw.left, raw.top,
                             no_data, no_data);
    for (i, chunk) in raw.samples.chunks_exact(4).enumerate() {
        grid.data[i] = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    Ok(grid)
}

pub fn write_float_tif_grid(file: &str, grid: &FloatGrid) -> Result<()> {
    let mut samples = Vec::with_capacity(grid.data.len() * 4);
    for v in &grid.data {
        samples.extend_from_slice(&v.to_le_bytes());
    }
    write_tif(file, grid.rows, grid.cols, grid.cell_size, &grid.extent,
              grid.no_data as f64, SAMPLE_FORMAT_FLOAT, &samples)
}

pub fn read_long_tif_grid(file: &str) -> Result<LongGrid> {
    let raw = RawTif::read(file, SAMPLE_FORMAT_INT)?;
    let no_data = raw.no_data.map(|v| v as i64).unwrap_or(-9999);
    let mut grid = Grid::new(raw.rows, raw.cols, raw.cell_size, raw.left, raw.top,
                             no_data, no_data);
    for (i, chunk) in raw.samples.chunks_exact(4).enumerate() {
        grid.data[i] =
            i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as i64;
    }
    Ok(grid)
}

pub fn write_long_tif_grid(file: &str, grid: &LongGrid) -> Result<()> {
    let mut samples = Vec::with_capacity(grid.data.len() * 4);
    for v in &grid.data {
        samples.extend_from_slice(&(*v as i32).to_le_bytes());
    }
    write_tif(file, grid.rows, grid.cols, grid.cell_size, &grid.extent,
              grid.no_data as f64, SAMPLE_FORMAT_INT, &samples)
}

struct RawTif {
    rows: usize,
    cols: usize,
    cell_size: f64,
    left: f64,
    top: f64,
    no_data: Option<f64>,
    samples: Vec<u8>,
}

struct IfdEntry {
    field_type: u16,
    count: u32,
    value: [u8; 4],
}

impl RawTif {
    fn read(file: &str, expected_format: u16) -> Result<RawTif> {
        let bytes = fs::read(Path::new(file))?;
        if bytes.len() < 8 || &bytes[0..2] != b"II" || read_u16(&bytes, 2)? != TIFF_MAGIC {
            return Err(LimnoError::Raster(format!(
                "{} is not a little-endian TIFF", file)));
        }

        let ifd_offset = read_u32(&bytes, 4)? as usize;
        let entry_count = read_u16(&bytes, ifd_offset)? as usize;
        let mut entries: Vec<(u16, IfdEntry)> = Vec::with_capacity(entry_count);
        for i in 0..entry_count {
            let base = ifd_offset + 2 + i * 12;
            let tag = read_u16(&bytes, base)?;
            let field_type = read_u16(&bytes, base + 2)?;
            let count = read_u32(&bytes, base + 4)?;
            let mut value = [0u8; 4];
            value.copy_from_slice(&bytes[base + 8..base + 12]);
            entries.push((tag, IfdEntry { field_type, count, value }));
        }
        let find = |tag: u16| entries.iter().find(|(t, _)| *t == tag).map(|(_, e)| e);

        let cols = scalar(find(TAG_IMAGE_WIDTH), file, "ImageWidth")? as usize;
        let rows = scalar(find(TAG_IMAGE_LENGTH), file, "ImageLength")? as usize;
        let bits = scalar(find(TAG_BITS_PER_SAMPLE), file, "BitsPerSample")?;
        let compression = find(TAG_COMPRESSION).map(|e| scalar(Some(e), file, "Compression"))
            .transpose()?.unwrap_or(1);
        let samples_per_pixel = find(TAG_SAMPLES_PER_PIXEL)
            .map(|e| scalar(Some(e), file, "SamplesPerPixel")).transpose()?.unwrap_or(1);
        let sample_format = find(TAG_SAMPLE_FORMAT)
            .map(|e| scalar(Some(e), file, "SampleFormat")).transpose()?.unwrap_or(1);

        if bits != 32 || samples_per_pixel != 1 || sample_format != expected_format as u32 {
            return Err(LimnoError::Raster(format!(
                "{} is not a supported single-band 32-bit grid", file)));
        }
        if compression != 1 {
            return Err(LimnoError::Raster(format!(
                "{} uses compression; only uncompressed grids are supported", file)));
        }

        let offsets = long_array(&bytes, find(TAG_STRIP_OFFSETS), file, "StripOffsets")?;
        let counts = long_array(&bytes, find(TAG_STRIP_BYTE_COUNTS), file, "StripByteCounts")?;
        if offsets.len() != counts.len() {
            return Err(LimnoError::Raster(format!("{} has a malformed strip layout", file)));
        }

        let mut samples = Vec::with_capacity(rows * cols * 4);
        for (offset, count) in offsets.iter().zip(counts.iter()) {
            let start = *offset as usize;
            let end = start + (*count as usize);
            if end > bytes.len() {
                return Err(LimnoError::Raster(format!("{} is truncated", file)));
            }
            samples.extend_from_slice(&bytes[start..end]);
        }
        if samples.len() != rows * cols * 4 {
            return Err(LimnoError::Raster(format!(
                "{} strip data does not match the declared dimensions", file)));
        }

        let pixscale = double_array(&bytes, find(TAG_MODEL_PIXEL_SCALE), file, "ModelPixelScale")?;
        let tiepoint = double_array(&bytes, find(TAG_MODEL_TIEPOINT), file, "ModelTiepoint")?;
        if pixscale.len() < 2 || tiepoint.len() < 6 {
            return Err(LimnoError::Raster(format!("{} is missing georeferencing tags", file)));
        }

        let no_data = match find(TAG_GDAL_NODATA) {
            Some(e) => ascii_value(&bytes, e)?.trim_end_matches('\0').trim().parse::<f64>().ok(),
            None => None,
        };

        Ok(RawTif {
            rows,
            cols,
            cell_size: pixscale[0],
            left: tiepoint[3],
            top: tiepoint[4],
            no_data,
            samples,
        })
    }
}

fn write_tif(file: &str, rows: usize, cols: usize, cell_size: f64, extent: &Extent,
             no_data: f64, sample_format: u16, samples: &[u8]) -> Result<()> {
    let mut nodata_str = format!("{}", no_data);
    nodata_str.push('\0');
    if nodata_str.len() % 2 != 0 {
        nodata_str.push('\0');
    }

    //Fixed layout: header, one IFD with 13 entries, then the external values
    //(pixel scale, tiepoint, nodata string), then a single strip of samples.
    let entry_count: usize = 13;
    let ifd_offset: u32 = 8;
    let ifd_len = 2 + entry_count * 12 + 4;
    let pixscale_offset = ifd_offset as usize + ifd_len;
    let tiepoint_offset = pixscale_offset + 3 * 8;
    let nodata_offset = tiepoint_offset + 6 * 8;
    let data_offset = nodata_offset + nodata_str.len();

    let mut out: Vec<u8> = Vec::with_capacity(data_offset + samples.len());
    out.extend_from_slice(b"II");
    out.extend_from_slice(&TIFF_MAGIC.to_le_bytes());
    out.extend_from_slice(&ifd_offset.to_le_bytes());

    out.extend_from_slice(&(entry_count as u16).to_le_bytes());
    push_entry_long(&mut out, TAG_IMAGE_WIDTH, cols as u32);
    push_entry_long(&mut out, TAG_IMAGE_LENGTH, rows as u32);
    push_entry_short(&mut out, TAG_BITS_PER_SAMPLE, 32);
    push_entry_short(&mut out, TAG_COMPRESSION, 1);
    push_entry_short(&mut out, TAG_PHOTOMETRIC, 1);
    push_entry_long(&mut out, TAG_STRIP_OFFSETS, data_offset as u32);
    push_entry_short(&mut out, TAG_SAMPLES_PER_PIXEL, 1);
    push_entry_long(&mut out, TAG_ROWS_PER_STRIP, rows as u32);
    push_entry_long(&mut out, TAG_STRIP_BYTE_COUNTS, samples.len() as u32);
    push_entry_short(&mut out, TAG_SAMPLE_FORMAT, sample_format);
    push_entry_offset(&mut out, TAG_MODEL_PIXEL_SCALE, TYPE_DOUBLE, 3, pixscale_offset as u32);
    push_entry_offset(&mut out, TAG_MODEL_TIEPOINT, TYPE_DOUBLE, 6, tiepoint_offset as u32);
    push_entry_offset(&mut out, TAG_GDAL_NODATA, TYPE_ASCII, nodata_str.len() as u32,
                      nodata_offset as u32);
    out.extend_from_slice(&0u32.to_le_bytes()); //no next IFD

    for v in [cell_size, cell_size, 0.0] {
        out.extend_from_slice(&v.to_le_bytes());
    }
    for v in [0.0, 0.0, 0.0, extent.left, extent.top, 0.0] {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out.extend_from_slice(nodata_str.as_bytes());
    out.extend_from_slice(samples);

    fs::write(Path::new(file), out)?;
    Ok(())
}

fn push_entry_short(out: &mut Vec<u8>, tag: u16, value: u16) {
    out.extend_from_slice(&tag.to_le_bytes());
    out.extend_from_slice(&TYPE_SHORT.to_le_bytes());
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&value.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
}

fn push_entry_long(out: &mut Vec<u8>, tag: u16, value: u32) {
    out.extend_from_slice(&tag.to_le_bytes());
    out.extend_from_slice(&TYPE_LONG.to_le_bytes());
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&value.to_le_bytes());
}

fn push_entry_offset(out: &mut Vec<u8>, tag: u16, field_type: u16, count: u32, offset: u32) {
    out.extend_from_slice(&tag.to_le_bytes());
    out.extend_from_slice(&field_type.to_le_bytes());
    out.extend_from_slice(&count.to_le_bytes());
    out.extend_from_slice(&offset.to_le_bytes());
}

fn read_u16(bytes: &[u8], pos: usize) -> Result<u16> {
    if pos + 2 > bytes.len() {
        return Err(LimnoError::Raster("unexpected end of file".to_string()));
    }
    Ok(u16::from_le_bytes([bytes[pos], bytes[pos + 1]]))
}

fn read_u32(bytes: &[u8], pos: usize) -> Result<u32> {
    if pos + 4 > bytes.len() {
        return Err(LimnoError::Raster("unexpected end of file".to_string()));
    }
    Ok(u32::from_le_bytes([bytes[pos], bytes[pos + 1], bytes[pos + 2], bytes[pos + 3]]))
}

fn read_f64(bytes: &[u8], pos: usize) -> Result<f64> {
    if pos + 8 > bytes.len() {
        return Err(LimnoError::Raster("unexpected end of file".to_string()));
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[pos..pos + 8]);
    Ok(f64::from_le_bytes(buf))
}

/*
Scalar SHORT/LONG entry value (inline in the IFD).
 */
fn scalar(entry: Option<&IfdEntry>, file: &str, name: &str) -> Result<u32> {
    let entry = entry.ok_or_else(|| {
        LimnoError::Raster(format!("{} is missing the {} tag", file, name))
    })?;
    match entry.field_type {
        TYPE_SHORT => Ok(u16::from_le_bytes([entry.value[0], entry.value[1]]) as u32),
        TYPE_LONG => Ok(u32::from_le_bytes(entry.value)),
        _ => Err(LimnoError::Raster(format!(
            "{} has an unsupported field type for {}", file, name))),
    }
}

/*
SHORT/LONG entry as an array; inline when it fits in the 4 value bytes,
otherwise read from the pointed-to location.
 */
fn long_array(bytes: &[u8], entry: Option<&IfdEntry>, file: &str, name: &str) -> Result<Vec<u32>> {
    let entry = entry.ok_or_else(|| {
        LimnoError::Raster(format!("{} is missing the {} tag", file, name))
    })?;
    let count = entry.count as usize;
    let elem_size = match entry.field_type {
        TYPE_SHORT => 2,
        TYPE_LONG => 4,
        _ => {
            return Err(LimnoError::Raster(format!(
                "{} has an unsupported field type for {}", file, name)));
        }
    };
    let mut values = Vec::with_capacity(count);
    let base = if count * elem_size <= 4 {
        None
    } else {
        Some(u32::from_le_bytes(entry.value) as usize)
    };
    for i in 0..count {
        let pos = i * elem_size;
        let v = match base {
            None => {
                if elem_size == 2 {
                    u16::from_le_bytes([entry.value[pos], entry.value[pos + 1]]) as u32
                } else {
                    u32::from_le_bytes(entry.value)
                }
            }
            Some(b) => {
                if elem_size == 2 {
                    read_u16(bytes, b + pos)? as u32
                } else {
                    read_u32(bytes, b + pos)?
                }
            }
        };
        values.push(v);
    }
    Ok(values)
}

fn double_array(bytes: &[u8], entry: Option<&IfdEntry>, file: &str, name: &str) -> Result<Vec<f64>> {
    let entry = entry.ok_or_else(|| {
        LimnoError::Raster(format!("{} is missing the {} tag", file, name))
    })?;
    if entry.field_type != TYPE_DOUBLE {
        return Err(LimnoError::Raster(format!(
            "{} has an unsupported field type for {}", file, name)));
    }
    let base = u32::from_le_bytes(entry.value) as usize;
    let mut values = Vec::with_capacity(entry.count as usize);
    for i in 0..entry.count as usize {
        values.push(read_f64(bytes, base + i * 8)?);
    }
    Ok(values)
}

fn ascii_value(bytes: &[u8], entry: &IfdEntry) -> Result<String> {
    let count = entry.count as usize;
    let raw = if count <= 4 {
        entry.value[..count].to_vec()
    } else {
        let base = u32::from_le_bytes(entry.value) as usize;
        if base + count > bytes.len() {
            return Err(LimnoError::Raster("unexpected end of file".to_string()));
        }
        bytes[base..base + count].to_vec()
    };
    Ok(String::from_utf8_lossy(&raw).to_string())
}
