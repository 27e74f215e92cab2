//! Supported model file formats and how each one is loaded.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SharedError;

/// A model file format, identified by its (lowercase) file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFormat {
    Glb,
    Gltf,
    Obj,
    Stl,
    Fbx,
    Sog,
    Ply,
    Splat,
    Ksplat,
    Spz,
}

/// The loader path a format goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoaderKind {
    /// Triangle meshes added straight into the shared scene graph.
    Mesh,
    /// Gaussian-splat PLY, shown in a dedicated splat viewer.
    PlySplat,
    /// Other gaussian-splat containers.
    Splat,
}

impl ModelFormat {
    pub const ALL: [ModelFormat; 10] = [
        ModelFormat::Glb,
        ModelFormat::Gltf,
        ModelFormat::Obj,
        ModelFormat::Stl,
        ModelFormat::Fbx,
        ModelFormat::Sog,
        ModelFormat::Ply,
        ModelFormat::Splat,
        ModelFormat::Ksplat,
        ModelFormat::Spz,
    ];

    /// Parse an extension, case-insensitively, with or without a leading dot.
    pub fn from_extension(ext: &str) -> Result<Self, SharedError> {
        let trimmed = ext.trim().trim_start_matches('.');
        match trimmed.to_ascii_lowercase().as_str() {
            "glb" => Ok(Self::Glb),
            "gltf" => Ok(Self::Gltf),
            "obj" => Ok(Self::Obj),
            "stl" => Ok(Self::Stl),
            "fbx" => Ok(Self::Fbx),
            "sog" => Ok(Self::Sog),
            "ply" => Ok(Self::Ply),
            "splat" => Ok(Self::Splat),
            "ksplat" => Ok(Self::Ksplat),
            "spz" => Ok(Self::Spz),
            _ => Err(SharedError::UnsupportedFormat(trimmed.to_string())),
        }
    }

    /// Derive the format from a file name or URI path.
    pub fn from_file_name(name: &str) -> Result<Self, SharedError> {
        let ext = extension_of(name)
            .ok_or_else(|| SharedError::MissingExtension(name.to_string()))?;
        Self::from_extension(ext)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Glb => "glb",
            Self::Gltf => "gltf",
            Self::Obj => "obj",
            Self::Stl => "stl",
            Self::Fbx => "fbx",
            Self::Sog => "sog",
            Self::Ply => "ply",
            Self::Splat => "splat",
            Self::Ksplat => "ksplat",
            Self::Spz => "spz",
        }
    }

    pub fn loader_kind(&self) -> LoaderKind {
        match self {
            Self::Ply => LoaderKind::PlySplat,
            Self::Splat | Self::Ksplat | Self::Spz => LoaderKind::Splat,
            Self::Glb | Self::Gltf | Self::Obj | Self::Stl | Self::Fbx | Self::Sog => {
                LoaderKind::Mesh
            }
        }
    }
}

impl fmt::Display for ModelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelFormat {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s)
    }
}

/// Extension of the last path segment, without the dot.
pub fn extension_of(name: &str) -> Option<&str> {
    let file = name.rsplit(['/', '\\']).next().unwrap_or(name);
    match file.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
        _ => None,
    }
}

/// `Content-Type` override for 3D asset extensions served statically.
pub fn content_type_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "gltf" => Some("model/gltf+json"),
        "glb" => Some("model/gltf-binary"),
        "obj" => Some("model/obj"),
        "stl" => Some("model/stl"),
        "ply" => Some("model/ply"),
        "fbx" => Some("model/fbx"),
        "sog" => Some("application/json"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_extension_is_case_insensitive() {
        assert_eq!(ModelFormat::from_extension("GLB").unwrap(), ModelFormat::Glb);
        assert_eq!(ModelFormat::from_extension(".Ply").unwrap(), ModelFormat::Ply);
        assert!(ModelFormat::from_extension("dae").is_err());
    }

    #[test]
    fn test_from_file_name() {
        assert_eq!(
            ModelFormat::from_file_name("/models/modelFile-1-2.KSPLAT").unwrap(),
            ModelFormat::Ksplat
        );
        assert_eq!(
            ModelFormat::from_file_name("no_extension"),
            Err(SharedError::MissingExtension("no_extension".into()))
        );
        assert!(ModelFormat::from_file_name(".hidden").is_err());
    }

    #[test]
    fn test_loader_kinds() {
        assert_eq!(ModelFormat::Ply.loader_kind(), LoaderKind::PlySplat);
        for f in [ModelFormat::Splat, ModelFormat::Ksplat, ModelFormat::Spz] {
            assert_eq!(f.loader_kind(), LoaderKind::Splat);
        }
        for f in [
            ModelFormat::Glb,
            ModelFormat::Gltf,
            ModelFormat::Obj,
            ModelFormat::Stl,
            ModelFormat::Fbx,
            ModelFormat::Sog,
        ] {
            assert_eq!(f.loader_kind(), LoaderKind::Mesh);
        }
    }

    #[test]
    fn test_content_type_overrides() {
        assert_eq!(content_type_for_extension("GLTF"), Some("model/gltf+json"));
        assert_eq!(content_type_for_extension("sog"), Some("application/json"));
        assert_eq!(content_type_for_extension("png"), None);
    }
}
