use serde::Deserialize;
use std::fmt::Display;

/// Sensors whose Rrs band set can be used directly as the model grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensor {
    SeaWiFS,
    Modis,
    /// PACE OCI hyperspectral Rrs
    Pace,
}

/// OCI visible range on its nominal 2.5 nm sampling [nm]
const PACE_FIRST: f64 = 400.0;
const PACE_LAST: f64 = 700.0;
const PACE_STEP: f64 = 2.5;

#[derive(Debug)]
pub struct SatBands {
    sensor: Sensor,
    wavelengths: Vec<f64>,
}

impl SatBands {
    pub fn new(sensor: Sensor) -> Self {
        let wavelengths = match sensor {
            // Bands 1 to 6
            Sensor::SeaWiFS => vec![412.0, 443.0, 490.0, 510.0, 555.0, 670.0],
            // Ocean bands 8 to 14, Rrs product set
            Sensor::Modis => vec![
                412.0, 443.0, 469.0, 488.0, 531.0, 547.0, 555.0, 645.0, 667.0, 678.0,
            ],
            Sensor::Pace => {
                let n = ((PACE_LAST - PACE_FIRST) / PACE_STEP).round() as usize;
                (0..=n).map(|i| PACE_FIRST + PACE_STEP * i as f64).collect()
            }
        };
        Self {
            sensor,
            wavelengths,
        }
    }

    pub fn wavelengths(&self) -> &[f64] {
        &self.wavelengths
    }

    pub fn closest_band(&self, target: f64) -> f64 {
        // Band tables are never empty
        closest_band(&self.wavelengths, target).map_or(target, |(_, wl)| wl)
    }
}

/// Index and wavelength of the grid band nearest to `target`.
/// Ties go to the shorter wavelength.
pub fn closest_band(wavelengths: &[f64], target: f64) -> Option<(usize, f64)> {
    wavelengths
        .iter()
        .copied()
        .enumerate()
        .min_by(|(_, a), (_, b)| (a - target).abs().total_cmp(&(b - target).abs()))
}

impl Display for Sensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sensor::SeaWiFS => write!(f, "SeaWiFS"),
            Sensor::Modis => write!(f, "MODIS"),
            Sensor::Pace => write!(f, "PACE OCI"),
        }
    }
}

impl Display for SatBands {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Satellite: {}, Wavelengths: {:?}",
            self.sensor, self.wavelengths
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closest_band() {
        let modis = SatBands::new(Sensor::Modis);
        assert_eq!(modis.closest_band(490.0), 488.0);
        assert_eq!(modis.closest_band(670.0), 667.0);

        let seawifs = SatBands::new(Sensor::SeaWiFS);
        assert_eq!(seawifs.closest_band(555.0), 555.0);
        assert_eq!(closest_band(seawifs.wavelengths(), 500.0), Some((2, 490.0)));
        assert_eq!(closest_band(&[], 500.0), None);
    }

    #[test]
    fn test_sensor_deserializes_lowercase() {
        let sensor: Sensor = serde_json::from_str("\"seawifs\"").unwrap();
        assert_eq!(sensor, Sensor::SeaWiFS);
        assert_eq!(sensor.to_string(), "SeaWiFS");

        let sensor: Sensor = serde_json::from_str("\"pace\"").unwrap();
        assert_eq!(sensor, Sensor::Pace);
    }

    #[test]
    fn test_pace_grid() {
        let pace = SatBands::new(Sensor::Pace);
        let wavelengths = pace.wavelengths();

        assert_eq!(wavelengths.len(), 121);
        assert_eq!(wavelengths[0], 400.0);
        assert_eq!(wavelengths[72], 580.0);
        assert_eq!(wavelengths[120], 700.0);
        assert!(wavelengths.windows(2).all(|w| (w[1] - w[0] - 2.5).abs() < 1e-12));

        assert_eq!(pace.closest_band(443.0), 442.5);
        assert_eq!(pace.closest_band(555.0), 555.0);
    }
}
