use std::fmt::Display;

use crate::error::RetrievalError;
use crate::flags::QualityFlags;
use crate::gaussian::FitResult;
use crate::iop::WaterConditions;
use crate::pigments::PigmentConcentration;
use crate::spectrum::Spectrum;

use super::model::InversionModel;

/// Everything the retrieval needs from one pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelInput {
    pub reflectance: Spectrum,
    pub conditions: Option<WaterConditions>,
}

impl PixelInput {
    pub fn new(reflectance: Spectrum) -> Self {
        Self {
            reflectance,
            conditions: None,
        }
    }

    pub fn with_conditions(mut self, temperature: f64, salinity: f64) -> Self {
        self.conditions = Some(WaterConditions {
            temperature,
            salinity,
        });
        self
    }
}

/// Step a pixel failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Preprocess,
    Absorption,
    Fit,
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Preprocess => write!(f, "preprocess"),
            Stage::Absorption => write!(f, "absorption"),
            Stage::Fit => write!(f, "fit"),
        }
    }
}

/// Final product of a pixel that went through every stage.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelRetrieval {
    pub concentration: PigmentConcentration,
    pub fit: FitResult,
    pub flags: QualityFlags,
}

/// Where a pixel is in the pipeline. Each stage consumes the previous state
/// and produces the next one; `Done` and `Failed` are terminal.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelState {
    Pending,
    Preprocessed {
        reflectance: Spectrum,
        flags: QualityFlags,
    },
    AbsorptionEstimated {
        absorption: Spectrum,
        flags: QualityFlags,
    },
    Fitted {
        fit: FitResult,
        flags: QualityFlags,
    },
    Mapped {
        fit: FitResult,
        concentration: PigmentConcentration,
        flags: QualityFlags,
    },
    Done(PixelRetrieval),
    Failed {
        stage: Stage,
        error: RetrievalError,
    },
}

impl PixelState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PixelState::Done(_) | PixelState::Failed { .. })
    }

    /// Runs the next stage. Terminal states are returned unchanged.
    pub fn advance(self, model: &InversionModel, input: &PixelInput) -> PixelState {
        match self {
            PixelState::Pending => match model.preprocess(&input.reflectance) {
                Ok(pre) => PixelState::Preprocessed {
                    reflectance: pre.reflectance,
                    flags: pre.flags,
                },
                Err(error) => failed(Stage::Preprocess, error),
            },
            PixelState::Preprocessed { reflectance, flags } => {
                match model.estimate_absorption(&reflectance, input.conditions.as_ref()) {
                    Ok((absorption, qaa_flags)) => PixelState::AbsorptionEstimated {
                        absorption,
                        flags: flags.with(qaa_flags.bits()),
                    },
                    Err(error) => failed(Stage::Absorption, error),
                }
            }
            PixelState::AbsorptionEstimated { absorption, flags } => {
                match model.fit(&absorption) {
                    Ok(fit) => {
                        let mut flags = flags;
                        if fit.rank_deficient {
                            flags.set(QualityFlags::RANK_DEFICIENT);
                        }
                        PixelState::Fitted { fit, flags }
                    }
                    Err(error) => failed(Stage::Fit, error),
                }
            }
            PixelState::Fitted { fit, flags } => {
                let concentration = model.map(&fit);
                let flags = flags.with(concentration.flags().bits());
                PixelState::Mapped {
                    fit,
                    concentration,
                    flags,
                }
            }
            PixelState::Mapped {
                fit,
                concentration,
                flags,
            } => PixelState::Done(PixelRetrieval {
                concentration,
                fit,
                flags,
            }),
            terminal => terminal,
        }
    }

    /// Flags accumulated so far; a failed pixel only carries FAILED.
    pub fn flags(&self) -> QualityFlags {
        match self {
            PixelState::Pending => QualityFlags::empty(),
            PixelState::Preprocessed { flags, .. }
            | PixelState::AbsorptionEstimated { flags, .. }
            | PixelState::Fitted { flags, .. }
            | PixelState::Mapped { flags, .. } => *flags,
            PixelState::Done(retrieval) => retrieval.flags,
            PixelState::Failed { .. } => QualityFlags::empty().with(QualityFlags::FAILED),
        }
    }

    pub fn retrieval(&self) -> Option<&PixelRetrieval> {
        match self {
            PixelState::Done(retrieval) => Some(retrieval),
            _ => None,
        }
    }

    pub fn into_result(self) -> Result<PixelRetrieval, RetrievalError> {
        match self {
            PixelState::Done(retrieval) => Ok(retrieval),
            PixelState::Failed { error, .. } => Err(error),
            _ => Err(RetrievalError::invalid("pixel was not processed")),
        }
    }
}

fn failed(stage: Stage, error: RetrievalError) -> PixelState {
    log::debug!("Pixel failed at {stage}: {error}");
    PixelState::Failed { stage, error }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::model::tests::{RRS, fixture_model};

    fn input() -> PixelInput {
        PixelInput::new(
            Spectrum::new(vec![412.0, 443.0, 490.0, 555.0, 670.0], RRS.to_vec()).unwrap(),
        )
    }

    #[test]
    fn test_walks_every_stage_in_order() {
        let model = fixture_model();
        let input = input();

        let mut state = PixelState::Pending;
        let mut visited = Vec::new();
        while !state.is_terminal() {
            state = state.advance(&model, &input);
            visited.push(match &state {
                PixelState::Pending => "pending",
                PixelState::Preprocessed { .. } => "preprocessed",
                PixelState::AbsorptionEstimated { .. } => "absorption",
                PixelState::Fitted { .. } => "fitted",
                PixelState::Mapped { .. } => "mapped",
                PixelState::Done(_) => "done",
                PixelState::Failed { .. } => "failed",
            });
        }

        assert_eq!(
            visited,
            vec!["preprocessed", "absorption", "fitted", "mapped", "done"]
        );
        // Terminal states stay put
        assert_eq!(state.clone().advance(&model, &input), state);
    }

    #[test]
    fn test_failure_records_stage() {
        let model = fixture_model();
        let input = PixelInput::new(
            Spectrum::new(
                vec![412.0, 443.0, 490.0, 555.0, 670.0],
                vec![f64::NAN, f64::NAN, f64::NAN, 0.0028, 0.0012],
            )
            .unwrap(),
        );

        let state = model.retrieve(&input);
        match &state {
            PixelState::Failed { stage, error } => {
                assert_eq!(*stage, Stage::Preprocess);
                assert_eq!(error.code(), 1);
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(state.flags().contains(QualityFlags::FAILED));
        assert!(state.into_result().is_err());
    }

    #[test]
    fn test_pending_has_no_result() {
        let state = PixelState::Pending;
        assert!(!state.is_terminal());
        assert!(state.retrieval().is_none());
        assert!(state.into_result().is_err());
    }
}
