use serde::{Deserialize, Serialize};
use validator::Validate;

/// A distillery; owns many whiskies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Distillery {
    pub id: i64,

    /// Unique, stored title-cased
    pub name: String,

    /// Region (Islay, Speyside, ...)
    pub location: Option<String>,

    pub owner: Option<String>,

    /// Year founded, 0 when unknown
    pub founded: i64,
}

/// A bottling produced by a distillery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Whisky {
    pub id: i64,

    /// Name or age statement, unique per distillery
    pub name: String,

    pub about: Option<String>,

    pub distillery_id: i64,

    /// Distillery name, joined for display
    pub distillery: String,
}

impl Whisky {
    /// "Lagavulin 16" style display name
    pub fn full_name(&self) -> String {
        format!("{} {}", self.distillery, self.name)
    }
}

/// Input for creating or editing a distillery
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DistilleryInput {
    #[validate(length(min = 1, max = 64))]
    pub name: String,

    #[validate(length(max = 64))]
    pub location: Option<String>,

    #[validate(length(max = 64))]
    pub owner: Option<String>,

    #[serde(default)]
    pub founded: i64,
}

/// Input for creating or editing a whisky
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct WhiskyInput {
    #[validate(length(min = 1, max = 128))]
    pub name: String,

    #[validate(length(max = 255))]
    pub about: Option<String>,
}
