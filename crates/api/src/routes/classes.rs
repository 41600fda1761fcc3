//! Class metadata route

use axum::Json;
use inference_engine::ClassLabel;
use serde::Serialize;

/// Label metadata for renderers
#[derive(Debug, Serialize)]
pub struct ClassInfo {
    pub index: usize,
    pub label: ClassLabel,
    pub code: &'static str,
    pub display_name: &'static str,
    pub localized_name: &'static str,
    pub color: &'static str,
    pub malignant: bool,
}

impl From<ClassLabel> for ClassInfo {
    fn from(label: ClassLabel) -> Self {
        Self {
            index: label.index(),
            label,
            code: label.code(),
            display_name: label.display_name(),
            localized_name: label.localized_name(),
            color: label.color(),
            malignant: label.is_malignant(),
        }
    }
}

/// List classes in model output order
pub async fn list_classes() -> Json<Vec<ClassInfo>> {
    Json(ClassLabel::ALL.into_iter().map(ClassInfo::from).collect())
}
