//! What a loader hands back to the viewer.

use glam::Vec3;
use serde::Serialize;

use vitrine_shared::{LoaderKind, Model, ModelFormat, RecordId};

use crate::error::LoadError;

/// Which asset to load and how it was asked for.
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub model_id: RecordId,
    /// Server-relative asset URI, e.g. `/models/modelFile-..glb`.
    pub path: String,
    pub format: ModelFormat,
    /// Display name, also searched for orientation hints.
    pub name: String,
}

impl LoadRequest {
    /// Request for a stored model; fails on formats no loader knows.
    pub fn for_model(model: &Model) -> Result<Self, LoadError> {
        Ok(Self {
            model_id: model.id,
            path: model.path.clone(),
            format: ModelFormat::from_extension(&model.format)?,
            name: model.name.clone(),
        })
    }

    /// Text searched for "inverted"/"flipped" hints: name plus asset path.
    pub fn hint_text(&self) -> String {
        format!("{} {}", self.name, self.path).to_lowercase()
    }
}

/// Decoded geometry, reduced to what framing needs.
#[derive(Debug, Clone)]
pub struct Renderable {
    pub kind: LoaderKind,
    pub format: ModelFormat,
    /// Vertex or splat-centre positions in model space.
    pub positions: Vec<Vec3>,
    /// Scale applied before framing (FBX files are authored in centimetres).
    pub base_scale: f32,
    /// The container was not decoded; `positions` is empty and the engine
    /// reads the bytes itself.
    pub opaque: bool,
    pub byte_len: usize,
}

impl Renderable {
    pub fn new(format: ModelFormat, positions: Vec<Vec3>, byte_len: usize) -> Self {
        Self {
            kind: format.loader_kind(),
            format,
            positions,
            base_scale: 1.0,
            opaque: false,
            byte_len,
        }
    }

    pub fn opaque(format: ModelFormat, byte_len: usize) -> Self {
        Self {
            opaque: true,
            ..Self::new(format, Vec::new(), byte_len)
        }
    }

    pub fn with_base_scale(mut self, scale: f32) -> Self {
        self.base_scale = scale;
        self
    }
}

/// A finished load, tagged with the model it belongs to.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedModel {
    pub kind: LoaderKind,
    pub model_id: RecordId,
    pub format: ModelFormat,
    #[serde(skip)]
    pub renderable: Renderable,
}
