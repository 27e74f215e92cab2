use serde::{Deserialize, Serialize};

/// Numeric identifier of a model or background record.
pub type RecordId = i64;

/// An uploaded 3D model, as persisted in `models.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    pub id: RecordId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Server-relative URI of the model asset, e.g. `/models/modelFile-..glb`.
    pub path: String,
    /// File extension of the asset, case as uploaded.
    pub format: String,
    /// Server-relative URI of the thumbnail image.
    pub thumbnail: String,
    pub order: i64,
    /// Background shown behind this model. Not checked against the
    /// backgrounds collection.
    #[serde(default)]
    pub background_id: Option<RecordId>,
}

impl Model {
    /// Case-insensitive format match, as used by batch deletion.
    pub fn has_format(&self, format: &str) -> bool {
        self.format.eq_ignore_ascii_case(format.trim())
    }
}

/// An uploaded background image, as persisted in `backgrounds.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Background {
    pub id: RecordId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub path: String,
    pub order: i64,
}
