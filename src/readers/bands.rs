use std::path::Path;

use walkdir::WalkDir;

use crate::config::RasterInputs;
use crate::retrieval::ReflectanceGrid;

use super::{ReadError, create_reader};

/// Filename of one band: `{}` in the pattern becomes the integer wavelength.
pub fn band_filename(pattern: &str, wavelength: f64) -> String {
    pattern.replace("{}", &format!("{}", wavelength.round() as i64))
}

pub fn find_band_file(directory: &str, pattern: &str, wavelength: f64) -> Option<String> {
    find_file(directory, &band_filename(pattern, wavelength))
}

/// Looks for `filename` directly under `directory`, then anywhere below it.
pub fn find_file(directory: &str, filename: &str) -> Option<String> {
    let direct_path = Path::new(directory).join(filename);
    if direct_path.is_file() {
        return Some(direct_path.to_string_lossy().to_string());
    }

    search_file_recursively(directory, filename)
}

fn search_file_recursively(base_dir: &str, filename: &str) -> Option<String> {
    if !Path::new(base_dir).exists() {
        return None;
    }

    // Sorted so the same file wins on every run
    for entry in WalkDir::new(base_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if entry.file_type().is_file()
            && let Some(file_name) = entry.path().file_name()
            && file_name.to_string_lossy() == filename
        {
            return Some(entry.path().to_string_lossy().to_string());
        }
    }

    None
}

/// Reads one raster per wavelength and stacks them into a reflectance grid.
/// All rasters must share the dimensions of the first one, whose
/// georeferencing (if any) is attached to the grid.
pub fn load_reflectance_grid(
    inputs: &RasterInputs,
    wavelengths: &[f64],
) -> Result<ReflectanceGrid, ReadError> {
    let bands = read_layers(&inputs.directory, &inputs.filename_pattern, wavelengths)?;
    let (width, height) = bands.dimensions;
    let mut grid = ReflectanceGrid::from_band_layers(
        width as usize,
        height as usize,
        wavelengths.to_vec(),
        &bands.layers,
    )?;

    if let Some(geotransform) = bands.geotransform {
        grid = grid.with_geotransform(geotransform)?;
    }

    if let Some(pattern) = &inputs.uncertainty_pattern {
        let uncertainty = read_layers(&inputs.directory, pattern, wavelengths)?;
        if uncertainty.dimensions != bands.dimensions {
            return Err(ReadError::Dimensions {
                file: band_filename(pattern, wavelengths[0]),
                expected: bands.dimensions,
                found: uncertainty.dimensions,
            });
        }
        grid = grid.with_uncertainty_layers(&uncertainty.layers)?;
    }

    if let (Some(temperature), Some(salinity)) = (&inputs.temperature_file, &inputs.salinity_file)
    {
        let temperature = read_single(&inputs.directory, temperature, bands.dimensions)?;
        let salinity = read_single(&inputs.directory, salinity, bands.dimensions)?;
        grid = grid.with_water_conditions(temperature, salinity)?;
    }

    Ok(grid)
}

fn read_single(
    directory: &str,
    filename: &str,
    expected: (u32, u32),
) -> Result<Vec<f64>, ReadError> {
    let path = find_file(directory, filename).ok_or_else(|| ReadError::MissingFile {
        filename: filename.to_string(),
        directory: directory.to_string(),
    })?;

    let data = create_reader(path.clone())?.read_data()?;
    let found = (data.width, data.height);
    if found != expected {
        return Err(ReadError::Dimensions {
            file: path,
            expected,
            found,
        });
    }
    Ok(data.to_missing_as_nan())
}

struct BandStack {
    dimensions: (u32, u32),
    geotransform: Option<[f64; 6]>,
    layers: Vec<Vec<f64>>,
}

fn read_layers(
    directory: &str,
    pattern: &str,
    wavelengths: &[f64],
) -> Result<BandStack, ReadError> {
    let mut dimensions = None;
    let mut geotransform = None;
    let mut layers = Vec::with_capacity(wavelengths.len());

    for &wavelength in wavelengths {
        let path = find_band_file(directory, pattern, wavelength).ok_or_else(|| {
            ReadError::MissingBand {
                wavelength,
                pattern: pattern.to_string(),
                directory: directory.to_string(),
            }
        })?;
        log::debug!("Band {wavelength} nm: {path}");

        let data = create_reader(path.clone())?.read_data()?;
        let found = (data.width, data.height);
        match dimensions {
            None => {
                dimensions = Some(found);
                geotransform = data.geotransform;
            }
            Some(expected) if expected != found => {
                return Err(ReadError::Dimensions {
                    file: path,
                    expected,
                    found,
                });
            }
            Some(_) => {}
        }
        layers.push(data.to_missing_as_nan());
    }

    log::info!("Read {} band rasters matching '{}'", layers.len(), pattern);
    Ok(BandStack {
        dimensions: dimensions.unwrap_or((0, 0)),
        geotransform,
        layers,
    })
}
