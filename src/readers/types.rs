use std::fmt;

use thiserror::Error;

use crate::retrieval::GridError;

pub trait DataReader {
    fn read_data(&self) -> Result<Data, ReadError>;
}

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("GeoTIFF: {0}")]
    GeoTiff(String),
    #[error("no file matching '{pattern}' for {wavelength} nm under {directory}")]
    MissingBand {
        wavelength: f64,
        pattern: String,
        directory: String,
    },
    #[error("no file named '{filename}' under {directory}")]
    MissingFile { filename: String, directory: String },
    #[error("{file} is {found:?} pixels, expected {expected:?}")]
    Dimensions {
        file: String,
        expected: (u32, u32),
        found: (u32, u32),
    },
    #[error(transparent)]
    UnknownFileType(#[from] FileError),
    #[error(transparent)]
    Grid(#[from] GridError),
}

#[derive(Debug, Error)]
pub enum FileError {
    #[error("unknown raster file type")]
    UnknownFileType,
}

#[derive(Debug)]
pub struct Data {
    pub width: u32,
    pub height: u32,
    pub buffer: Vec<f32>,
    /// GDAL no-data value, when the file declares one
    pub nodata: Option<f32>,
    /// [top_left_x, pixel_width, 0, top_left_y, 0, -pixel_height]
    pub geotransform: Option<[f64; 6]>,
}

impl Data {
    /// Values as f64 with no-data and non-finite samples turned into NaN.
    pub fn to_missing_as_nan(&self) -> Vec<f64> {
        self.buffer
            .iter()
            .map(|&v| {
                if !v.is_finite() || self.nodata.is_some_and(|nd| v == nd) {
                    f64::NAN
                } else {
                    v as f64
                }
            })
            .collect()
    }
}

pub enum FileType {
    GeoTiff,
}

impl fmt::Display for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let valid = || self.buffer.iter().copied().filter(|x| !x.is_nan());
        let min_value = valid().fold(f32::NAN, f32::min);
        let max_value = valid().fold(f32::NAN, f32::max);

        write!(
            f,
            "Width: {}\nHeight: {}\nBuffer Length: {}\nMin value: {}\nMax value: {}",
            self.width,
            self.height,
            self.buffer.len(),
            min_value,
            max_value,
        )
    }
}
