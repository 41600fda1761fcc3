//! Diagnostic class labels

use serde::{Deserialize, Serialize};

/// Number of classes the model distinguishes
pub const CLASS_COUNT: usize = 3;

/// Histopathology class, in model output order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassLabel {
    /// Lung adenocarcinoma (LUAD)
    Adenocarcinoma,
    /// Benign lung tissue
    Benign,
    /// Lung squamous cell carcinoma (LUSC)
    SquamousCellCarcinoma,
}

impl ClassLabel {
    /// All labels in model output order
    pub const ALL: [ClassLabel; CLASS_COUNT] = [
        ClassLabel::Adenocarcinoma,
        ClassLabel::Benign,
        ClassLabel::SquamousCellCarcinoma,
    ];

    /// Map a model output index to a label
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Position in the model output vector
    pub fn index(&self) -> usize {
        match self {
            ClassLabel::Adenocarcinoma => 0,
            ClassLabel::Benign => 1,
            ClassLabel::SquamousCellCarcinoma => 2,
        }
    }

    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassLabel::Adenocarcinoma => "adenocarcinoma",
            ClassLabel::Benign => "benign",
            ClassLabel::SquamousCellCarcinoma => "squamous_cell_carcinoma",
        }
    }

    /// Short clinical code
    pub fn code(&self) -> &'static str {
        match self {
            ClassLabel::Adenocarcinoma => "LUAD",
            ClassLabel::Benign => "BENIGN",
            ClassLabel::SquamousCellCarcinoma => "LUSC",
        }
    }

    /// English display name
    pub fn display_name(&self) -> &'static str {
        match self {
            ClassLabel::Adenocarcinoma => "Adenocarcinoma",
            ClassLabel::Benign => "Benign",
            ClassLabel::SquamousCellCarcinoma => "Squamous Cell Carcinoma",
        }
    }

    /// Indonesian display name
    pub fn localized_name(&self) -> &'static str {
        match self {
            ClassLabel::Adenocarcinoma => "Adenokarsinoma",
            ClassLabel::Benign => "Jinak",
            ClassLabel::SquamousCellCarcinoma => "Karsinoma Sel Skuamosa",
        }
    }

    /// Highlight colour used when rendering the result
    pub fn color(&self) -> &'static str {
        match self {
            ClassLabel::Benign => "#2ecc71",
            ClassLabel::Adenocarcinoma | ClassLabel::SquamousCellCarcinoma => "#f7dc6f",
        }
    }

    pub fn is_malignant(&self) -> bool {
        !matches!(self, ClassLabel::Benign)
    }
}
