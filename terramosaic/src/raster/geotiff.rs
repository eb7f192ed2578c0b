//! GeoTIFF reading and writing
//!
//! Pure-Rust GeoTIFF I/O over the `tiff` crate. Outputs carry the grid's
//! affine transform and EPSG code via the ModelPixelScale, ModelTiepoint,
//! and GeoKeyDirectory tags and are Deflate-compressed (lossless). Only
//! north-up grids are representable, which is all this system produces.

use std::fs::File;
use std::io::{BufReader, BufWriter, Seek, Write};
use std::path::Path;

use ndarray::Array3;
use thiserror::Error;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::{Gray16, Gray8, RGB16, RGB8};
use tiff::encoder::{Compression, DeflateLevel, DirectoryEncoder, TiffEncoder, TiffKind};
use tiff::tags::Tag;

use super::{GeoTransform, Raster, RasterGrid};

// GeoTIFF tag IDs (not in the standard tiff crate)
const TAG_MODEL_PIXEL_SCALE: u16 = 33550;
const TAG_MODEL_TIEPOINT: u16 = 33922;
const TAG_GEO_KEY_DIRECTORY: u16 = 34735;

// GeoKey IDs
const KEY_GT_MODEL_TYPE: u16 = 1024;
const KEY_GT_RASTER_TYPE: u16 = 1025;
const KEY_GEOGRAPHIC_TYPE: u16 = 2048;
const KEY_PROJECTED_CS_TYPE: u16 = 3072;

// GeoKey values
const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;

/// Errors raised by GeoTIFF I/O.
#[derive(Debug, Error)]
pub enum GeoTiffError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TIFF error: {0}")]
    Tiff(String),

    #[error("Unsupported GeoTIFF layout: {0}")]
    Unsupported(String),

    /// The file lacks the georeferencing tags this system requires.
    #[error("Missing GeoTIFF georeferencing tags")]
    MissingGeoTags,
}

impl From<tiff::TiffError> for GeoTiffError {
    fn from(e: tiff::TiffError) -> Self {
        Self::Tiff(e.to_string())
    }
}

/// Geographic (angular) coordinate systems this crate recognizes; anything
/// else is written as a projected CRS key.
fn is_geographic(epsg: u32) -> bool {
    matches!(epsg, 4326 | 4269 | 4267 | 4258)
}

fn write_geo_tags<W: Write + Seek, K: TiffKind>(
    dir: &mut DirectoryEncoder<W, K>,
    grid: &RasterGrid,
) -> Result<(), GeoTiffError> {
    let (x_res, y_res) = grid.resolution();
    let pixel_scale = [x_res, y_res, 0.0];
    dir.write_tag(Tag::Unknown(TAG_MODEL_PIXEL_SCALE), pixel_scale.as_slice())?;

    // Tie pixel (0, 0) to the grid's west/north corner.
    let tiepoint = [0.0, 0.0, 0.0, grid.transform.c, grid.transform.f, 0.0];
    dir.write_tag(Tag::Unknown(TAG_MODEL_TIEPOINT), tiepoint.as_slice())?;

    let (model_type, crs_key) = if is_geographic(grid.epsg) {
        (MODEL_TYPE_GEOGRAPHIC, KEY_GEOGRAPHIC_TYPE)
    } else {
        (MODEL_TYPE_PROJECTED, KEY_PROJECTED_CS_TYPE)
    };

    // [version, revision, minor, key count, then 4 u16 per key]
    let geokeys: Vec<u16> = vec![
        1,
        1,
        0,
        3,
        KEY_GT_MODEL_TYPE,
        0,
        1,
        model_type,
        KEY_GT_RASTER_TYPE,
        0,
        1,
        RASTER_PIXEL_IS_AREA,
        crs_key,
        0,
        1,
        grid.epsg as u16,
    ];
    dir.write_tag(Tag::Unknown(TAG_GEO_KEY_DIRECTORY), geokeys.as_slice())?;

    Ok(())
}

/// Interleaves `[bands, h, w]` planar data into the chunky pixel order TIFF
/// strips use.
fn interleave<T: Copy>(data: &Array3<T>) -> Vec<T> {
    let (bands, height, width) = data.dim();
    let mut out = Vec::with_capacity(bands * height * width);
    for row in 0..height {
        for col in 0..width {
            for band in 0..bands {
                out.push(data[[band, row, col]]);
            }
        }
    }
    out
}

macro_rules! write_impl {
    ($name:ident, $sample:ty, $gray:ty, $rgb:ty) => {
        /// Writes the raster as a Deflate-compressed GeoTIFF. Supports one-
        /// and three-band rasters, matching this system's outputs.
        pub fn $name<P: AsRef<Path>>(path: P, raster: &Raster<$sample>) -> Result<(), GeoTiffError> {
            let file = File::create(path)?;
            let writer = BufWriter::new(file);
            let mut encoder = TiffEncoder::new(writer)?
                .with_compression(Compression::Deflate(DeflateLevel::Fast));

            let width = raster.grid.width as u32;
            let height = raster.grid.height as u32;
            let pixels = interleave(&raster.data);

            match raster.bands() {
                1 => {
                    let mut image = encoder.new_image::<$gray>(width, height)?;
                    write_geo_tags(image.encoder(), &raster.grid)?;
                    image.write_data(&pixels)?;
                }
                3 => {
                    let mut image = encoder.new_image::<$rgb>(width, height)?;
                    write_geo_tags(image.encoder(), &raster.grid)?;
                    image.write_data(&pixels)?;
                }
                n => {
                    return Err(GeoTiffError::Unsupported(format!(
                        "cannot write {n}-band GeoTIFF"
                    )))
                }
            }
            Ok(())
        }
    };
}

write_impl!(write_geotiff, u8, Gray8, RGB8);
write_impl!(write_geotiff_u16, u16, Gray16, RGB16);

fn grid_from_decoder<R: std::io::Read + Seek>(
    decoder: &mut Decoder<R>,
    width: usize,
    height: usize,
) -> Result<RasterGrid, GeoTiffError> {
    let scale = decoder
        .find_tag(Tag::Unknown(TAG_MODEL_PIXEL_SCALE))?
        .ok_or(GeoTiffError::MissingGeoTags)?
        .into_f64_vec()?;
    let tiepoint = decoder
        .find_tag(Tag::Unknown(TAG_MODEL_TIEPOINT))?
        .ok_or(GeoTiffError::MissingGeoTags)?
        .into_f64_vec()?;
    if scale.len() < 2 || tiepoint.len() < 6 {
        return Err(GeoTiffError::MissingGeoTags);
    }

    let geokeys: Vec<u16> = decoder
        .find_tag(Tag::Unknown(TAG_GEO_KEY_DIRECTORY))?
        .ok_or(GeoTiffError::MissingGeoTags)?
        .into_u64_vec()?
        .into_iter()
        .map(|v| v as u16)
        .collect();

    let mut epsg: Option<u32> = None;
    for record in geokeys[4.min(geokeys.len())..].chunks_exact(4) {
        match record[0] {
            KEY_PROJECTED_CS_TYPE => epsg = Some(record[3] as u32),
            KEY_GEOGRAPHIC_TYPE if epsg.is_none() => epsg = Some(record[3] as u32),
            _ => {}
        }
    }
    let epsg = epsg.ok_or(GeoTiffError::MissingGeoTags)?;

    let transform = GeoTransform::from_origin(tiepoint[3], tiepoint[4], scale[0], scale[1]);
    Ok(RasterGrid::new(width, height, transform, epsg))
}

/// Reads only the grid (dimensions, transform, CRS) of a GeoTIFF.
pub fn read_grid<P: AsRef<Path>>(path: P) -> Result<RasterGrid, GeoTiffError> {
    let file = File::open(path)?;
    let mut decoder = Decoder::new(BufReader::new(file))?;
    let (width, height) = decoder.dimensions()?;
    grid_from_decoder(&mut decoder, width as usize, height as usize)
}

/// Reads a GeoTIFF into a raster, widening 8-bit samples to u16.
pub fn read_geotiff<P: AsRef<Path>>(path: P) -> Result<Raster<u16>, GeoTiffError> {
    let file = File::open(path)?;
    let mut decoder = Decoder::new(BufReader::new(file))?;
    let (width, height) = decoder.dimensions()?;
    let grid = grid_from_decoder(&mut decoder, width as usize, height as usize)?;

    let chunky: Vec<u16> = match decoder.read_image()? {
        DecodingResult::U8(data) => data.into_iter().map(u16::from).collect(),
        DecodingResult::U16(data) => data,
        _ => {
            return Err(GeoTiffError::Unsupported(
                "only u8 and u16 samples are supported".to_string(),
            ))
        }
    };

    let pixels = grid.width * grid.height;
    if chunky.len() % pixels != 0 {
        return Err(GeoTiffError::Unsupported(
            "sample count does not divide into whole bands".to_string(),
        ));
    }
    let bands = chunky.len() / pixels;

    let mut data = Array3::<u16>::zeros((bands, grid.height, grid.width));
    for row in 0..grid.height {
        for col in 0..grid.width {
            let base = (row * grid.width + col) * bands;
            for band in 0..bands {
                data[[band, row, col]] = chunky[base + band];
            }
        }
    }

    Ok(Raster::new(grid, data))
}
