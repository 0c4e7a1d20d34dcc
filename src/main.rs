use std::path::Path;
use std::time::Instant;

use gpig::readers::load_reflectance_grid;
use gpig::utils::log_grid_statistics;
use gpig::writers::write_pigment_grid;
use gpig::{BatchRunner, InversionModel, RetrievalConfig};

const DEFAULT_CONFIG: &str = "./data/config/gpig_config.json";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    log::info!("Starting pigment retrieval with {config_path}");

    let config = RetrievalConfig::from_file(&config_path)?;
    let model = InversionModel::new(&config)?;

    let inputs = config
        .inputs()
        .ok_or("No input rasters configured (inputs.directory, inputs.filename_pattern)")?;
    if config.water_correction().is_some()
        && (inputs.temperature_file.is_none() || inputs.salinity_file.is_none())
    {
        log::warn!("Water correction without temperature/salinity rasters: all pixels will fail");
    }
    let mut grid = load_reflectance_grid(inputs, config.wavelengths())?;

    if let Some(bbox) = config.bbox() {
        grid = grid.crop_to_bbox(bbox)?;
    }

    let start = Instant::now();
    let output = BatchRunner::new(&model)
        .with_threads(config.threads())
        .with_states(false)
        .process(&grid)?;
    log::info!("Processed {} pixels in {:.2?}", grid.len(), start.elapsed());

    log_grid_statistics(&output.grid);

    let output_dir = config
        .output_directory()
        .ok_or("Output directory not configured")?;
    let written = write_pigment_grid(&output.grid, Path::new(output_dir), "gpig")?;
    log::info!("Wrote {} rasters to {}", written.len(), output_dir);

    Ok(())
}
