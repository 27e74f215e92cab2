//! Gaussian-splat containers other than PLY.
//!
//! `.splat` is a flat array of fixed-size records and is decoded here.
//! `.ksplat` and `.spz` are compressed containers handed to the engine as-is.

use async_trait::async_trait;
use bytes::Bytes;
use glam::Vec3;

use vitrine_shared::{LoaderKind, ModelFormat};

use super::{decode_blocking, ModelLoader};
use crate::error::LoadError;
use crate::renderable::{LoadRequest, Renderable};

/// position (3 x f32), scale (3 x f32), colour (4 x u8), rotation (4 x u8)
pub const SPLAT_RECORD_SIZE: usize = 32;

pub struct SplatLoader;

#[async_trait]
impl ModelLoader for SplatLoader {
    fn kind(&self) -> LoaderKind {
        LoaderKind::Splat
    }

    fn formats(&self) -> &'static [ModelFormat] {
        &[ModelFormat::Splat, ModelFormat::Ksplat, ModelFormat::Spz]
    }

    async fn load(&self, request: &LoadRequest, bytes: Bytes) -> Result<Renderable, LoadError> {
        match request.format {
            ModelFormat::Splat => {
                decode_blocking(move || {
                    let positions = parse_splat(&bytes)?;
                    Ok(Renderable::new(ModelFormat::Splat, positions, bytes.len()))
                })
                .await
            }
            ModelFormat::Ksplat | ModelFormat::Spz => {
                Ok(Renderable::opaque(request.format, bytes.len()))
            }
            other => Err(LoadError::Unsupported(other.to_string())),
        }
    }
}

pub fn parse_splat(data: &[u8]) -> Result<Vec<Vec3>, LoadError> {
    if data.len() % SPLAT_RECORD_SIZE != 0 {
        return Err(LoadError::parse(
            "splat",
            format!("{} bytes is not a whole number of records", data.len()),
        ));
    }

    Ok(data
        .chunks_exact(SPLAT_RECORD_SIZE)
        .map(|r| {
            let f = |o: usize| f32::from_le_bytes([r[o], r[o + 1], r[o + 2], r[o + 3]]);
            Vec3::new(f(0), f(4), f(8))
        })
        .collect())
}
