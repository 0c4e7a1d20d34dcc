use thiserror::Error;

use crate::bbox::Bbox;
use crate::error::RetrievalError;
use crate::flags::QualityFlags;
use crate::iop::WaterConditions;
use crate::spectrum::{Spectrum, is_strictly_increasing};

use super::pixel::{PixelInput, PixelState, Stage};

#[derive(Debug, Error, PartialEq)]
pub enum GridError {
    #[error("{layer} has {found} values, expected {expected}")]
    Dimensions {
        layer: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("wavelengths must be finite and strictly increasing")]
    Wavelengths,
    #[error("{0} layers for {1} wavelengths")]
    BandCount(usize, usize),
    #[error("longitude/latitude layers are required to crop to a bounding box")]
    NoCoordinates,
    #[error("no pixel lies inside the bounding box")]
    EmptyCrop,
}

/// Reflectance cube, pixel-interleaved: band `b` of pixel `p` sits at
/// `p * n_bands + b`, pixels in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct ReflectanceGrid {
    width: usize,
    height: usize,
    wavelengths: Vec<f64>,
    values: Vec<f64>,
    uncertainty: Option<Vec<f64>>,
    temperature: Option<Vec<f64>>,
    salinity: Option<Vec<f64>>,
    lon: Option<Vec<f64>>,
    lat: Option<Vec<f64>>,
    geotransform: Option<[f64; 6]>,
    // Column and row of the first pixel in the source raster
    origin: (usize, usize),
}

impl ReflectanceGrid {
    pub fn new(
        width: usize,
        height: usize,
        wavelengths: Vec<f64>,
        values: Vec<f64>,
    ) -> Result<Self, GridError> {
        if wavelengths.is_empty()
            || wavelengths.iter().any(|wl| !wl.is_finite())
            || !is_strictly_increasing(&wavelengths)
        {
            return Err(GridError::Wavelengths);
        }
        check_len("reflectance", width * height * wavelengths.len(), &values)?;

        Ok(Self {
            width,
            height,
            wavelengths,
            values,
            uncertainty: None,
            temperature: None,
            salinity: None,
            lon: None,
            lat: None,
            geotransform: None,
            origin: (0, 0),
        })
    }

    /// Builds the cube from one row-major raster per wavelength, the layout
    /// the band files come in.
    pub fn from_band_layers(
        width: usize,
        height: usize,
        wavelengths: Vec<f64>,
        layers: &[Vec<f64>],
    ) -> Result<Self, GridError> {
        let values = interleave(width * height, wavelengths.len(), layers, "band layer")?;
        Self::new(width, height, wavelengths, values)
    }

    /// Pixel-interleaved Rrs uncertainty, same layout as the values.
    pub fn with_uncertainty(mut self, uncertainty: Vec<f64>) -> Result<Self, GridError> {
        check_len("uncertainty", self.values.len(), &uncertainty)?;
        self.uncertainty = Some(uncertainty);
        Ok(self)
    }

    pub fn with_uncertainty_layers(self, layers: &[Vec<f64>]) -> Result<Self, GridError> {
        let uncertainty = interleave(self.len(), self.n_bands(), layers, "uncertainty layer")?;
        self.with_uncertainty(uncertainty)
    }

    /// Per-pixel temperature [°C] and salinity [PSU].
    pub fn with_water_conditions(
        mut self,
        temperature: Vec<f64>,
        salinity: Vec<f64>,
    ) -> Result<Self, GridError> {
        check_len("temperature", self.len(), &temperature)?;
        check_len("salinity", self.len(), &salinity)?;
        self.temperature = Some(temperature);
        self.salinity = Some(salinity);
        Ok(self)
    }

    /// Per-pixel longitude and latitude [decimal degrees].
    pub fn with_coordinates(mut self, lon: Vec<f64>, lat: Vec<f64>) -> Result<Self, GridError> {
        check_len("longitude", self.len(), &lon)?;
        check_len("latitude", self.len(), &lat)?;
        self.lon = Some(lon);
        self.lat = Some(lat);
        Ok(self)
    }

    /// Georeferences the grid with a geotransform
    /// `[top_left_x, pixel_width, 0, top_left_y, 0, -pixel_height]` and
    /// derives pixel-centre coordinates from it.
    pub fn with_geotransform(self, geotransform: [f64; 6]) -> Result<Self, GridError> {
        let (width, height) = (self.width, self.height);
        let lon = (0..width * height)
            .map(|i| geotransform[0] + ((i % width) as f64 + 0.5) * geotransform[1])
            .collect();
        let lat = (0..width * height)
            .map(|i| geotransform[3] + ((i / width) as f64 + 0.5) * geotransform[5])
            .collect();

        let mut grid = self.with_coordinates(lon, lat)?;
        grid.geotransform = Some(geotransform);
        Ok(grid)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn geotransform(&self) -> Option<[f64; 6]> {
        self.geotransform
    }

    /// Number of pixels.
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn n_bands(&self) -> usize {
        self.wavelengths.len()
    }

    pub fn wavelengths(&self) -> &[f64] {
        &self.wavelengths
    }

    pub fn origin(&self) -> (usize, usize) {
        self.origin
    }

    /// Spectrum and water conditions of pixel `index` (row-major).
    pub fn pixel(&self, index: usize) -> Result<PixelInput, RetrievalError> {
        if index >= self.len() {
            return Err(RetrievalError::invalid(format!(
                "pixel {index} outside a grid of {} pixels",
                self.len()
            )));
        }

        let n = self.n_bands();
        let range = index * n..(index + 1) * n;
        let mut reflectance =
            Spectrum::new(self.wavelengths.clone(), self.values[range.clone()].to_vec())?;
        if let Some(uncertainty) = &self.uncertainty {
            reflectance = reflectance.with_uncertainty(uncertainty[range].to_vec())?;
        }

        let conditions = match (&self.temperature, &self.salinity) {
            (Some(t), Some(s)) => Some(WaterConditions {
                temperature: t[index],
                salinity: s[index],
            }),
            _ => None,
        };

        Ok(PixelInput {
            reflectance,
            conditions,
        })
    }

    /// Smallest row/column window holding every pixel inside `bbox`. Pixels
    /// of the window that fall outside the box are set to missing.
    pub fn crop_to_bbox(&self, bbox: &Bbox) -> Result<ReflectanceGrid, GridError> {
        let (Some(lon), Some(lat)) = (&self.lon, &self.lat) else {
            return Err(GridError::NoCoordinates);
        };

        let inside = |i: usize| bbox.contains(lon[i], lat[i]);

        let mut window: Option<(usize, usize, usize, usize)> = None;
        for row in 0..self.height {
            for col in 0..self.width {
                if inside(row * self.width + col) {
                    window = Some(match window {
                        None => (col, col, row, row),
                        Some((c0, c1, r0, r1)) => {
                            (c0.min(col), c1.max(col), r0.min(row), r1.max(row))
                        }
                    });
                }
            }
        }
        let Some((col_min, col_max, row_min, row_max)) = window else {
            return Err(GridError::EmptyCrop);
        };

        let width = col_max - col_min + 1;
        let height = row_max - row_min + 1;
        let n = self.n_bands();

        let source: Vec<usize> = (row_min..=row_max)
            .flat_map(|row| (col_min..=col_max).map(move |col| row * self.width + col))
            .collect();

        let pick_layer = |layer: &Vec<f64>| source.iter().map(|&i| layer[i]).collect::<Vec<_>>();
        let pick_cube = |cube: &Vec<f64>| {
            source
                .iter()
                .flat_map(move |&i| {
                    let keep = inside(i);
                    cube[i * n..(i + 1) * n]
                        .iter()
                        .map(move |&v| if keep { v } else { f64::NAN })
                })
                .collect::<Vec<_>>()
        };

        log::info!(
            "Cropped {}x{} grid to {}x{} window at column {}, row {}",
            self.width,
            self.height,
            width,
            height,
            col_min,
            row_min
        );

        Ok(ReflectanceGrid {
            width,
            height,
            wavelengths: self.wavelengths.clone(),
            values: pick_cube(&self.values),
            uncertainty: self.uncertainty.as_ref().map(&pick_cube),
            temperature: self.temperature.as_ref().map(&pick_layer),
            salinity: self.salinity.as_ref().map(&pick_layer),
            lon: Some(pick_layer(lon)),
            lat: Some(pick_layer(lat)),
            geotransform: self.geotransform.map(|mut gt| {
                gt[0] += col_min as f64 * gt[1];
                gt[3] += row_min as f64 * gt[5];
                gt
            }),
            origin: (self.origin.0 + col_min, self.origin.1 + row_min),
        })
    }
}

fn check_len(layer: &'static str, expected: usize, values: &[f64]) -> Result<(), GridError> {
    if values.len() != expected {
        return Err(GridError::Dimensions {
            layer,
            expected,
            found: values.len(),
        });
    }
    Ok(())
}

fn interleave(
    n_pixels: usize,
    n_bands: usize,
    layers: &[Vec<f64>],
    name: &'static str,
) -> Result<Vec<f64>, GridError> {
    if layers.len() != n_bands {
        return Err(GridError::BandCount(layers.len(), n_bands));
    }
    for layer in layers {
        check_len(name, n_pixels, layer)?;
    }
    Ok((0..n_pixels)
        .flat_map(|p| layers.iter().map(move |layer| layer[p]))
        .collect())
}

/// Outcome of one pixel as recorded in the status layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelStatus {
    Pending,
    Done,
    Failed { stage: Stage, code: u8 },
}

impl PixelStatus {
    pub const PENDING_CODE: u8 = 255;

    /// 0 for done, the error reason code for failures, 255 for pending.
    pub fn code(&self) -> u8 {
        match self {
            PixelStatus::Pending => Self::PENDING_CODE,
            PixelStatus::Done => 0,
            PixelStatus::Failed { code, .. } => *code,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GridSummary {
    pub done: usize,
    /// Done but rejected by the acceptance policy
    pub invalid: usize,
    pub failed: usize,
    pub pending: usize,
}

/// Gridded retrieval output: one layer per pigment (NaN where failed or
/// invalid), plus flag and status layers.
#[derive(Debug, Clone, PartialEq)]
pub struct PigmentGrid {
    width: usize,
    height: usize,
    origin: (usize, usize),
    geotransform: Option<[f64; 6]>,
    pigments: Vec<String>,
    layers: Vec<Vec<f64>>,
    flags: Vec<u8>,
    status: Vec<PixelStatus>,
}

impl PigmentGrid {
    pub fn from_states(
        grid: &ReflectanceGrid,
        pigments: Vec<String>,
        states: &[PixelState],
    ) -> Result<Self, GridError> {
        if states.len() != grid.len() {
            return Err(GridError::Dimensions {
                layer: "pixel states",
                expected: grid.len(),
                found: states.len(),
            });
        }

        let mut layers = vec![vec![f64::NAN; states.len()]; pigments.len()];
        let mut flags = Vec::with_capacity(states.len());
        let mut status = Vec::with_capacity(states.len());

        for (i, state) in states.iter().enumerate() {
            flags.push(state.flags().bits());
            status.push(match state {
                PixelState::Done(retrieval) => {
                    if retrieval.concentration.is_valid() {
                        for (layer, pigment) in layers.iter_mut().zip(&pigments) {
                            layer[i] = retrieval.concentration.get(pigment).unwrap_or(f64::NAN);
                        }
                    }
                    PixelStatus::Done
                }
                PixelState::Failed { stage, error } => PixelStatus::Failed {
                    stage: *stage,
                    code: error.code(),
                },
                _ => PixelStatus::Pending,
            });
        }

        Ok(Self {
            width: grid.width(),
            height: grid.height(),
            origin: grid.origin(),
            geotransform: grid.geotransform(),
            pigments,
            layers,
            flags,
            status,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn origin(&self) -> (usize, usize) {
        self.origin
    }

    pub fn geotransform(&self) -> Option<[f64; 6]> {
        self.geotransform
    }

    pub fn pigments(&self) -> &[String] {
        &self.pigments
    }

    pub fn layer(&self, pigment: &str) -> Option<&[f64]> {
        self.pigments
            .iter()
            .position(|p| p == pigment)
            .map(|i| self.layers[i].as_slice())
    }

    /// (pigment, layer) pairs in output order.
    pub fn layers(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.pigments
            .iter()
            .map(String::as_str)
            .zip(self.layers.iter().map(Vec::as_slice))
    }

    pub fn flags(&self) -> &[u8] {
        &self.flags
    }

    pub fn status(&self) -> &[PixelStatus] {
        &self.status
    }

    pub fn status_codes(&self) -> Vec<u8> {
        self.status.iter().map(PixelStatus::code).collect()
    }

    pub fn summary(&self) -> GridSummary {
        let mut summary = GridSummary::default();
        for (status, &flags) in self.status.iter().zip(&self.flags) {
            match status {
                PixelStatus::Done => {
                    summary.done += 1;
                    if flags & QualityFlags::INVALID != 0 {
                        summary.invalid += 1;
                    }
                }
                PixelStatus::Failed { .. } => summary.failed += 1,
                PixelStatus::Pending => summary.pending += 1,
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRID: [f64; 3] = [443.0, 555.0, 670.0];

    fn layers() -> Vec<Vec<f64>> {
        // 3x2 raster, value = band * 10 + pixel
        (0..3)
            .map(|b| (0..6).map(|p| (b * 10 + p) as f64).collect())
            .collect()
    }

    #[test]
    fn test_band_layers_are_interleaved() {
        let grid = ReflectanceGrid::from_band_layers(3, 2, GRID.to_vec(), &layers()).unwrap();

        assert_eq!(grid.len(), 6);
        let pixel = grid.pixel(4).unwrap();
        assert_eq!(pixel.reflectance.values(), &[4.0, 14.0, 24.0]);
        assert_eq!(pixel.reflectance.wavelengths(), &GRID);
        assert!(pixel.conditions.is_none());
        assert!(grid.pixel(6).is_err());
    }

    #[test]
    fn test_dimension_mismatch() {
        let err = ReflectanceGrid::new(3, 2, GRID.to_vec(), vec![0.0; 17]).unwrap_err();
        assert_eq!(
            err,
            GridError::Dimensions {
                layer: "reflectance",
                expected: 18,
                found: 17
            }
        );

        let mut short = layers();
        short.pop();
        assert_eq!(
            ReflectanceGrid::from_band_layers(3, 2, GRID.to_vec(), &short).unwrap_err(),
            GridError::BandCount(2, 3)
        );

        let grid = ReflectanceGrid::new(3, 2, GRID.to_vec(), vec![0.0; 18]).unwrap();
        assert!(grid.with_water_conditions(vec![20.0; 6], vec![30.0; 5]).is_err());
    }

    #[test]
    fn test_rejects_unsorted_wavelengths() {
        let err = ReflectanceGrid::new(1, 1, vec![555.0, 443.0], vec![0.0; 2]).unwrap_err();
        assert_eq!(err, GridError::Wavelengths);
    }

    #[test]
    fn test_pixel_carries_water_conditions_and_uncertainty() {
        let grid = ReflectanceGrid::from_band_layers(3, 2, GRID.to_vec(), &layers())
            .unwrap()
            .with_uncertainty(vec![0.1; 18])
            .unwrap()
            .with_water_conditions((0..6).map(|i| i as f64).collect(), vec![35.0; 6])
            .unwrap();

        let pixel = grid.pixel(2).unwrap();
        assert_eq!(pixel.reflectance.uncertainty(), Some(&[0.1, 0.1, 0.1][..]));
        assert_eq!(
            pixel.conditions,
            Some(WaterConditions {
                temperature: 2.0,
                salinity: 35.0
            })
        );
    }

    #[test]
    fn test_crop_to_bbox() {
        // 4x3 raster, lon = column, lat = row
        let lon: Vec<f64> = (0..12).map(|i| (i % 4) as f64).collect();
        let lat: Vec<f64> = (0..12).map(|i| (i / 4) as f64).collect();
        let band: Vec<f64> = (0..12).map(|i| i as f64).collect();
        let grid = ReflectanceGrid::from_band_layers(4, 3, vec![443.0], &[band])
            .unwrap()
            .with_coordinates(lon.clone(), lat)
            .unwrap();

        // Strictly inside: columns 1-2, rows 1-2
        let bbox = Bbox::new(0.5, 2.5, 0.5, 2.5).unwrap();
        let cropped = grid.crop_to_bbox(&bbox).unwrap();

        assert_eq!((cropped.width(), cropped.height()), (2, 2));
        assert_eq!(cropped.origin(), (1, 1));
        assert_eq!(cropped.pixel(0).unwrap().reflectance.values(), &[5.0]);
        assert_eq!(cropped.pixel(3).unwrap().reflectance.values(), &[10.0]);

        // A diagonal box leaves off-box window pixels missing
        let skewed = ReflectanceGrid::from_band_layers(
            2,
            2,
            vec![443.0],
            &[vec![1.0, 2.0, 3.0, 4.0]],
        )
        .unwrap()
        .with_coordinates(vec![0.0, 5.0, 5.0, 1.0], vec![0.0, 5.0, 5.0, 1.0])
        .unwrap()
        .crop_to_bbox(&Bbox::new(-0.5, 1.5, -0.5, 1.5).unwrap())
        .unwrap();
        assert_eq!((skewed.width(), skewed.height()), (2, 2));
        assert!(skewed.pixel(1).unwrap().reflectance.values()[0].is_nan());
        assert_eq!(skewed.pixel(3).unwrap().reflectance.values(), &[4.0]);

        let outside = Bbox::new(10.0, 20.0, 10.0, 20.0).unwrap();
        assert_eq!(grid.crop_to_bbox(&outside).unwrap_err(), GridError::EmptyCrop);

        let no_coordinates = ReflectanceGrid::new(1, 1, vec![443.0], vec![0.0]).unwrap();
        assert_eq!(
            no_coordinates.crop_to_bbox(&bbox).unwrap_err(),
            GridError::NoCoordinates
        );
    }

    #[test]
    fn test_geotransform_crop() {
        // 0.5 degree pixels from (-70, 46) going south-east
        let grid = ReflectanceGrid::new(4, 4, vec![443.0], (0..16).map(f64::from).collect())
            .unwrap()
            .with_geotransform([-70.0, 0.5, 0.0, 46.0, 0.0, -0.5])
            .unwrap();

        let bbox = Bbox::new(-69.0, -68.0, 44.0, 45.0).unwrap();
        let cropped = grid.crop_to_bbox(&bbox).unwrap();

        // Centres -68.75 and -68.25 / 44.75 and 44.25
        assert_eq!((cropped.width(), cropped.height()), (2, 2));
        assert_eq!(cropped.origin(), (2, 2));
        assert_eq!(
            cropped.geotransform(),
            Some([-69.0, 0.5, 0.0, 45.0, 0.0, -0.5])
        );
        assert_eq!(cropped.pixel(0).unwrap().reflectance.values(), &[10.0]);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(PixelStatus::Done.code(), 0);
        assert_eq!(PixelStatus::Pending.code(), 255);
        assert_eq!(
            PixelStatus::Failed {
                stage: Stage::Fit,
                code: 3
            }
            .code(),
            3
        );
    }
}
