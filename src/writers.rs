use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tiff::encoder::{TiffEncoder, TiffValue, colortype};
use tiff::tags::Tag;

use crate::readers::geotiff::{GEO_KEY_DIRECTORY, MODEL_PIXEL_SCALE, MODEL_TIEPOINT};
use crate::retrieval::PigmentGrid;

// GeoKeyDirectory: version 1.1.0 with 3 keys. Model type geographic,
// raster pixel is area, geographic CRS EPSG:4326 (WGS 84).
#[rustfmt::skip]
const WGS84_GEO_KEYS: [u16; 16] = [
    1, 1, 0, 3,
    1024, 0, 1, 2,
    1025, 0, 1, 1,
    2048, 0, 1, 4326,
];

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TIFF encoding failed: {0}")]
    Tiff(#[from] tiff::TiffError),
    #[error("{found} values for a {width}x{height} raster")]
    Dimensions {
        width: usize,
        height: usize,
        found: usize,
    },
}

pub fn write_f32_tiff(
    path: &Path,
    width: usize,
    height: usize,
    values: &[f32],
    geotransform: Option<[f64; 6]>,
) -> Result<(), WriteError> {
    write_tiff::<colortype::Gray32Float>(path, width, height, values, geotransform)
}

pub fn write_u8_tiff(
    path: &Path,
    width: usize,
    height: usize,
    values: &[u8],
    geotransform: Option<[f64; 6]>,
) -> Result<(), WriteError> {
    write_tiff::<colortype::Gray8>(path, width, height, values, geotransform)
}

fn write_tiff<C>(
    path: &Path,
    width: usize,
    height: usize,
    values: &[C::Inner],
    geotransform: Option<[f64; 6]>,
) -> Result<(), WriteError>
where
    C: colortype::ColorType,
    [C::Inner]: TiffValue,
{
    check_len(width, height, values.len())?;
    let mut encoder = TiffEncoder::new(BufWriter::new(File::create(path)?))?;
    let mut image = encoder.new_image::<C>(width as u32, height as u32)?;

    if let Some(gt) = geotransform {
        let scale = [gt[1], -gt[5], 0.0];
        let tiepoint = [0.0, 0.0, 0.0, gt[0], gt[3], 0.0];
        image
            .encoder()
            .write_tag(Tag::Unknown(MODEL_PIXEL_SCALE), &scale[..])?;
        image
            .encoder()
            .write_tag(Tag::Unknown(MODEL_TIEPOINT), &tiepoint[..])?;
        image
            .encoder()
            .write_tag(Tag::Unknown(GEO_KEY_DIRECTORY), &WGS84_GEO_KEYS[..])?;
    }

    image.write_data(values)?;
    Ok(())
}

fn check_len(width: usize, height: usize, found: usize) -> Result<(), WriteError> {
    if width * height != found {
        return Err(WriteError::Dimensions {
            width,
            height,
            found,
        });
    }
    Ok(())
}

/// Writes `<prefix>_<pigment>.tif` per pigment (f32, NaN where missing) plus
/// `<prefix>_flags.tif` and `<prefix>_status.tif` (u8).
pub fn write_pigment_grid(
    grid: &PigmentGrid,
    directory: &Path,
    prefix: &str,
) -> Result<Vec<PathBuf>, WriteError> {
    fs::create_dir_all(directory)?;
    let (width, height) = (grid.width(), grid.height());
    let geotransform = grid.geotransform();
    let mut written = Vec::new();

    for (pigment, layer) in grid.layers() {
        let path = directory.join(format!("{prefix}_{pigment}.tif"));
        let values: Vec<f32> = layer.iter().map(|&v| v as f32).collect();
        write_f32_tiff(&path, width, height, &values, geotransform)?;
        log::info!("Saved {} to: {}", pigment, path.display());
        written.push(path);
    }

    let flags_path = directory.join(format!("{prefix}_flags.tif"));
    write_u8_tiff(&flags_path, width, height, grid.flags(), geotransform)?;
    written.push(flags_path);

    let status_path = directory.join(format!("{prefix}_status.tif"));
    write_u8_tiff(
        &status_path,
        width,
        height,
        &grid.status_codes(),
        geotransform,
    )?;
    written.push(status_path);

    Ok(written)
}
