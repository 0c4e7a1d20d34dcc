use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use rayon::prelude::*;
use thiserror::Error;

use super::grid::{GridError, PigmentGrid, ReflectanceGrid};
use super::model::InversionModel;
use super::pixel::{PixelState, Stage};

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error(transparent)]
    Grid(#[from] GridError),
}

/// Gridded output plus, unless dropped, the state of every pixel.
#[derive(Debug, Clone)]
pub struct BatchOutput {
    pub states: Option<Vec<PixelState>>,
    pub grid: PigmentGrid,
}

/// Applies one model to every pixel of a grid. Pixels never depend on each
/// other, so results are identical whatever the thread count.
#[derive(Debug)]
pub struct BatchRunner<'a> {
    model: &'a InversionModel,
    threads: Option<usize>,
    cancel: Option<&'a AtomicBool>,
    keep_states: bool,
}

impl<'a> BatchRunner<'a> {
    pub fn new(model: &'a InversionModel) -> Self {
        Self {
            model,
            threads: None,
            cancel: None,
            keep_states: true,
        }
    }

    /// Dedicated pool size; 1 runs on the calling thread.
    pub fn with_threads(mut self, threads: Option<usize>) -> Self {
        self.threads = threads;
        self
    }

    /// Checked before each pixel. Once set, remaining pixels stay `Pending`.
    pub fn with_cancel(mut self, cancel: &'a AtomicBool) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Whether [`BatchOutput::states`] is returned. Each state holds the fit
    /// and the per-pigment values, so large swaths usually drop them once the
    /// grid is built.
    pub fn with_states(mut self, keep: bool) -> Self {
        self.keep_states = keep;
        self
    }

    pub fn process(&self, grid: &ReflectanceGrid) -> Result<BatchOutput, BatchError> {
        let n_pixels = grid.len();
        log::info!(
            "Retrieving {} pigments for {} pixels ({}x{}, {} bands)",
            self.model.pigments().len(),
            n_pixels,
            grid.width(),
            grid.height(),
            grid.n_bands()
        );

        let mut states = vec![PixelState::Pending; n_pixels];
        let progress = Progress::new(n_pixels);

        let run_pixel = |(index, slot): (usize, &mut PixelState)| {
            if self.cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
                return;
            }
            *slot = match grid.pixel(index) {
                Ok(input) => self.model.retrieve(&input),
                Err(error) => PixelState::Failed {
                    stage: Stage::Preprocess,
                    error,
                },
            };
            progress.tick();
        };

        match self.threads {
            Some(1) => states.iter_mut().enumerate().for_each(run_pixel),
            Some(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()?;
                pool.install(|| states.par_iter_mut().enumerate().for_each(run_pixel));
            }
            None => states.par_iter_mut().enumerate().for_each(run_pixel),
        }

        let grid = PigmentGrid::from_states(grid, self.model.pigments(), &states)?;

        let summary = grid.summary();
        log::info!(
            "Batch finished: {} done ({} invalid), {} failed, {} pending",
            summary.done,
            summary.invalid,
            summary.failed,
            summary.pending
        );

        Ok(BatchOutput {
            states: self.keep_states.then_some(states),
            grid,
        })
    }
}

// Logs every time another tenth of the pixels completes.
struct Progress {
    total: usize,
    done: AtomicUsize,
}

impl Progress {
    fn new(total: usize) -> Self {
        Self {
            total,
            done: AtomicUsize::new(0),
        }
    }

    fn tick(&self) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        let decile = done * 10 / self.total;
        if decile > (done - 1) * 10 / self.total {
            log::info!("Progress: {}% ({}/{} pixels)", decile * 10, done, self.total);
        }
    }
}
