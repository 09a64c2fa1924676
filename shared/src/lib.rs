use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, FromRepr};

/// Quality grade, ordered from best to worst. The discriminant is the
/// quality grader's class index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumIter, FromRepr)]
#[repr(usize)]
pub enum QualityLabel {
    Excellent = 0,
    Good = 1,
    Fair = 2,
    Poor = 3,
    Scrap = 4,
}

/// Defect detector verdict. Class index 0 means defects are present,
/// index 1 means the item is clean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, FromRepr)]
#[repr(usize)]
pub enum DefectVerdict {
    #[strum(serialize = "yes")]
    DefectsPresent = 0,
    #[strum(serialize = "no")]
    NoDefects = 1,
}

impl DefectVerdict {
    pub fn has_defects(&self) -> bool {
        matches!(self, DefectVerdict::DefectsPresent)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum HueBucket {
    Red,
    Orange,
    Yellow,
    Green,
    Cyan,
    Blue,
    Undefined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum BrightnessBucket {
    Dark,
    Medium,
    Light,
    Undefined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum SaturationBucket {
    Desaturated,
    #[strum(serialize = "Moderately saturated")]
    Moderate,
    Saturated,
    Undefined,
}

/// Wire shape of an assessment. Field order is part of the contract.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AssessmentResponse {
    pub class_name: String,
    pub defects: String,
    #[serde(rename = "type")]
    pub file_type: String,
    pub size: String,
    pub hue: String,
    pub color: String,
    pub additional_info: AdditionalInfo,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AdditionalInfo {
    pub brightness: f64,
    pub brightness_category: String,
    pub saturation: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub models_loaded: bool,
}
