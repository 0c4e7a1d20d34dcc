use crate::flags::QualityFlags;
use crate::retrieval::PigmentGrid;

/// Summary of the finite values in one output layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerStatistics {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub valid: usize,
    pub total: usize,
}

impl LayerStatistics {
    pub fn from_values(values: &[f64]) -> Self {
        let valid_values: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();

        Self {
            min: valid_values.iter().copied().fold(f64::NAN, f64::min),
            max: valid_values.iter().copied().fold(f64::NAN, f64::max),
            mean: if valid_values.is_empty() {
                f64::NAN
            } else {
                valid_values.iter().sum::<f64>() / valid_values.len() as f64
            },
            valid: valid_values.len(),
            total: values.len(),
        }
    }

    pub fn valid_percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        100.0 * self.valid as f64 / self.total as f64
    }
}

/// Logs per-pigment statistics and how often each quality flag was raised.
pub fn log_grid_statistics(grid: &PigmentGrid) {
    let summary = grid.summary();
    log::info!(
        "Pigment grid {}x{}: {} done, {} invalid, {} failed, {} pending",
        grid.width(),
        grid.height(),
        summary.done,
        summary.invalid,
        summary.failed,
        summary.pending
    );

    for (pigment, layer) in grid.layers() {
        let stats = LayerStatistics::from_values(layer);
        log::info!(
            "  {}: min {:.4}, max {:.4}, mean {:.4} mg m^-3, valid pixels {} / {} ({:.1}%)",
            pigment,
            stats.min,
            stats.max,
            stats.mean,
            stats.valid,
            stats.total,
            stats.valid_percent()
        );
    }

    for (flag, count) in flag_counts(grid.flags()) {
        let message = QualityFlags::empty().with(flag).get_messages().join(", ");
        log::info!("  flag 0x{flag:02x} ({message}): {count} pixels");
    }
}

/// Number of pixels carrying each flag bit, for the bits that occur.
pub fn flag_counts(flags: &[u8]) -> Vec<(u8, usize)> {
    (0..8)
        .map(|bit| 1u8 << bit)
        .map(|flag| (flag, flags.iter().filter(|&&f| f & flag != 0).count()))
        .filter(|(_, count)| *count > 0)
        .collect()
}
