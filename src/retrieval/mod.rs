//! Per-pixel pipeline and its application to whole grids.

pub mod batch;
pub mod grid;
pub mod model;
pub mod pixel;

pub use batch::{BatchError, BatchOutput, BatchRunner};
pub use grid::{GridError, GridSummary, PigmentGrid, PixelStatus, ReflectanceGrid};
pub use model::InversionModel;
pub use pixel::{PixelInput, PixelRetrieval, PixelState, Stage};
