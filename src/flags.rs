use std::fmt;

/// Per-pixel quality flags [bitfield], written as the flag layer of the output grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct QualityFlags(u8);

impl QualityFlags {
    pub const RESAMPLED: u8 = 0x01;
    pub const WATER_CORRECTED: u8 = 0x02;
    pub const NOT_CONVERGED: u8 = 0x04;
    pub const RANK_DEFICIENT: u8 = 0x08;
    pub const CONCENTRATION_CLAMPED: u8 = 0x10;
    pub const INVALID: u8 = 0x20;
    pub const FAILED: u8 = 0x80;

    pub fn empty() -> Self {
        Self(0)
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn contains(&self, flag: u8) -> bool {
        self.0 & flag != 0
    }

    pub fn set(&mut self, flag: u8) {
        self.0 |= flag;
    }

    pub fn with(mut self, flag: u8) -> Self {
        self.set(flag);
        self
    }

    pub fn get_messages(&self) -> Vec<String> {
        FlagMessage::ALL
            .iter()
            .filter(|message| self.contains(message.bit()))
            .map(|message| message.as_str().to_string())
            .collect()
    }
}

enum FlagMessage {
    Resampled,
    WaterCorrected,
    NotConverged,
    RankDeficient,
    ConcentrationClamped,
    Invalid,
    Failed,
}

impl FlagMessage {
    const ALL: [FlagMessage; 7] = [
        FlagMessage::Resampled,
        FlagMessage::WaterCorrected,
        FlagMessage::NotConverged,
        FlagMessage::RankDeficient,
        FlagMessage::ConcentrationClamped,
        FlagMessage::Invalid,
        FlagMessage::Failed,
    ];

    fn bit(&self) -> u8 {
        match self {
            FlagMessage::Resampled => QualityFlags::RESAMPLED,
            FlagMessage::WaterCorrected => QualityFlags::WATER_CORRECTED,
            FlagMessage::NotConverged => QualityFlags::NOT_CONVERGED,
            FlagMessage::RankDeficient => QualityFlags::RANK_DEFICIENT,
            FlagMessage::ConcentrationClamped => QualityFlags::CONCENTRATION_CLAMPED,
            FlagMessage::Invalid => QualityFlags::INVALID,
            FlagMessage::Failed => QualityFlags::FAILED,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            FlagMessage::Resampled => "Reflectance interpolated onto the model grid",
            FlagMessage::WaterCorrected => {
                "Water absorption corrected for temperature and salinity"
            }
            FlagMessage::NotConverged => "Gaussian fit reached the iteration limit",
            FlagMessage::RankDeficient => "Design matrix rank deficient (minimum-norm solution)",
            FlagMessage::ConcentrationClamped => "Concentration below epsilon set to zero",
            FlagMessage::Invalid => "Concentrations invalid (convergence required)",
            FlagMessage::Failed => "Pixel retrieval failed",
        }
    }
}

impl fmt::Display for QualityFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02x}", self.0)
    }
}
