//! Triangle-mesh formats: glTF/GLB, OBJ, STL, FBX and SOG.
//!
//! Decoding stops at vertex positions; materials, normals and indices are
//! the rendering engine's business.

use std::collections::HashMap;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use glam::{EulerRot, Mat4, Quat, Vec3};
use serde::Deserialize;

use vitrine_shared::{LoaderKind, ModelFormat};

use super::{decode_blocking, ModelLoader};
use crate::error::LoadError;
use crate::renderable::{LoadRequest, Renderable};

/// FBX files are authored in centimetres.
pub const FBX_BASE_SCALE: f32 = 0.01;

const GLB_MAGIC: &[u8; 4] = b"glTF";
const GLB_CHUNK_JSON: u32 = 0x4E4F_534A;
const GLB_CHUNK_BIN: u32 = 0x004E_4942;
const FBX_BINARY_MAGIC: &[u8] = b"Kaydara FBX Binary";
const GL_FLOAT: u32 = 5126;

pub struct MeshLoader;

#[async_trait]
impl ModelLoader for MeshLoader {
    fn kind(&self) -> LoaderKind {
        LoaderKind::Mesh
    }

    fn formats(&self) -> &'static [ModelFormat] {
        &[
            ModelFormat::Glb,
            ModelFormat::Gltf,
            ModelFormat::Obj,
            ModelFormat::Stl,
            ModelFormat::Fbx,
            ModelFormat::Sog,
        ]
    }

    async fn load(&self, request: &LoadRequest, bytes: Bytes) -> Result<Renderable, LoadError> {
        let format = request.format;
        decode_blocking(move || decode_mesh(format, &bytes)).await
    }
}

pub fn decode_mesh(format: ModelFormat, data: &[u8]) -> Result<Renderable, LoadError> {
    let positions = match format {
        ModelFormat::Gltf => parse_gltf(data, None)?,
        ModelFormat::Glb => parse_glb(data)?,
        ModelFormat::Obj => parse_obj(data)?,
        ModelFormat::Stl => parse_stl(data)?,
        ModelFormat::Sog => parse_sog(data)?,
        ModelFormat::Fbx => {
            return Ok(match parse_fbx(data)? {
                Some(positions) => Renderable::new(format, positions, data.len()),
                None => Renderable::opaque(format, data.len()),
            }
            .with_base_scale(FBX_BASE_SCALE));
        }
        other => return Err(LoadError::Unsupported(other.to_string())),
    };
    Ok(Renderable::new(format, positions, data.len()))
}

// ---------------------------------------------------------------------------
// glTF / GLB
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GltfDocument {
    #[serde(default)]
    meshes: Vec<GltfMesh>,
    #[serde(default)]
    accessors: Vec<GltfAccessor>,
    #[serde(default)]
    buffer_views: Vec<GltfBufferView>,
    #[serde(default)]
    buffers: Vec<GltfBuffer>,
}

#[derive(Deserialize)]
struct GltfMesh {
    #[serde(default)]
    primitives: Vec<GltfPrimitive>,
}

#[derive(Deserialize)]
struct GltfPrimitive {
    #[serde(default)]
    attributes: HashMap<String, usize>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GltfAccessor {
    buffer_view: Option<usize>,
    #[serde(default)]
    byte_offset: usize,
    component_type: u32,
    count: usize,
    #[serde(rename = "type")]
    kind: String,
    min: Option<Vec<f32>>,
    max: Option<Vec<f32>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GltfBufferView {
    buffer: usize,
    #[serde(default)]
    byte_offset: usize,
    byte_length: usize,
    byte_stride: Option<usize>,
}

#[derive(Deserialize)]
struct GltfBuffer {
    uri: Option<String>,
}

/// Positions of every mesh primitive. Buffers that are embedded (GLB BIN
/// chunk or base64 data URI) are decoded; external buffers fall back to the
/// accessor's `min`/`max` corners.
fn parse_gltf(json: &[u8], bin: Option<&[u8]>) -> Result<Vec<Vec3>, LoadError> {
    let doc: GltfDocument =
        serde_json::from_slice(json).map_err(|e| LoadError::parse("gltf", e))?;

    let mut decoded_buffers: HashMap<usize, Option<Vec<u8>>> = HashMap::new();
    let mut positions = Vec::new();

    for primitive in doc.meshes.iter().flat_map(|m| m.primitives.iter()) {
        let Some(&index) = primitive.attributes.get("POSITION") else {
            continue;
        };
        let accessor = doc
            .accessors
            .get(index)
            .ok_or_else(|| LoadError::parse("gltf", format!("missing accessor {index}")))?;

        let decoded = accessor
            .buffer_view
            .and_then(|v| doc.buffer_views.get(v))
            .filter(|_| accessor.component_type == GL_FLOAT && accessor.kind == "VEC3")
            .and_then(|view| {
                let data = decoded_buffers
                    .entry(view.buffer)
                    .or_insert_with(|| buffer_bytes(&doc, view.buffer, bin))
                    .as_deref()?;
                read_vec3s(data, view, accessor)
            });

        match decoded {
            Some(points) => positions.extend(points),
            None => positions.extend(accessor_corners(accessor)),
        }
    }

    Ok(positions)
}

fn buffer_bytes(doc: &GltfDocument, index: usize, bin: Option<&[u8]>) -> Option<Vec<u8>> {
    let buffer = doc.buffers.get(index)?;
    match &buffer.uri {
        None if index == 0 => bin.map(<[u8]>::to_vec),
        None => None,
        Some(uri) => {
            let (_, encoded) = uri
                .strip_prefix("data:")?
                .split_once(";base64,")?;
            STANDARD.decode(encoded).ok()
        }
    }
}

fn read_vec3s(data: &[u8], view: &GltfBufferView, accessor: &GltfAccessor) -> Option<Vec<Vec3>> {
    let stride = view.byte_stride.unwrap_or(12).max(12);
    let start = view.byte_offset.checked_add(accessor.byte_offset)?;
    let end = view.byte_offset.saturating_add(view.byte_length).min(data.len());

    // The last element must fit before anything is allocated.
    if accessor.count > 0 {
        let last = (accessor.count - 1)
            .checked_mul(stride)?
            .checked_add(start)?
            .checked_add(12)?;
        if last > end {
            return None;
        }
    }

    let points = (0..accessor.count)
        .map(|i| {
            let offset = start + i * stride;
            Vec3::new(
                f32_le(&data[offset..]),
                f32_le(&data[offset + 4..]),
                f32_le(&data[offset + 8..]),
            )
        })
        .collect();
    Some(points)
}

fn accessor_corners(accessor: &GltfAccessor) -> Vec<Vec3> {
    match (&accessor.min, &accessor.max) {
        (Some(min), Some(max)) if min.len() >= 3 && max.len() >= 3 => vec![
            Vec3::new(min[0], min[1], min[2]),
            Vec3::new(max[0], max[1], max[2]),
        ],
        _ => Vec::new(),
    }
}

fn parse_glb(data: &[u8]) -> Result<Vec<Vec3>, LoadError> {
    if data.len() < 20 || &data[0..4] != GLB_MAGIC {
        return Err(LoadError::parse("glb", "missing glTF header"));
    }

    let declared = u32_le(&data[8..]) as usize;
    let end = declared.min(data.len());

    let mut json = None;
    let mut bin = None;
    let mut offset = 12;
    while offset + 8 <= end {
        let length = u32_le(&data[offset..]) as usize;
        let kind = u32_le(&data[offset + 4..]);
        let body_start = offset + 8;
        let body_end = body_start
            .checked_add(length)
            .filter(|e| *e <= end)
            .ok_or_else(|| LoadError::parse("glb", "chunk runs past end of file"))?;
        let body = &data[body_start..body_end];

        match kind {
            GLB_CHUNK_JSON if json.is_none() => json = Some(body),
            GLB_CHUNK_BIN if bin.is_none() => bin = Some(body),
            _ => {}
        }
        offset = body_end;
    }

    let json = json.ok_or_else(|| LoadError::parse("glb", "no JSON chunk"))?;
    parse_gltf(json, bin)
}

// ---------------------------------------------------------------------------
// OBJ / STL
// ---------------------------------------------------------------------------

fn parse_obj(data: &[u8]) -> Result<Vec<Vec3>, LoadError> {
    let text = String::from_utf8_lossy(data);
    let positions: Vec<Vec3> = text
        .lines()
        .filter_map(|line| line.trim_start().strip_prefix("v "))
        .filter_map(parse_xyz)
        .collect();

    if positions.is_empty() {
        return Err(LoadError::parse("obj", "no vertices"));
    }
    Ok(positions)
}

fn parse_stl(data: &[u8]) -> Result<Vec<Vec3>, LoadError> {
    if data.len() >= 84 {
        let triangles = u32_le(&data[80..]) as usize;
        if triangles.checked_mul(50).and_then(|n| n.checked_add(84)) == Some(data.len()) {
            return Ok(parse_binary_stl(data, triangles));
        }
    }

    let text = String::from_utf8_lossy(data);
    if !text.trim_start().starts_with("solid") {
        return Err(LoadError::parse("stl", "neither binary nor ASCII STL"));
    }
    let positions: Vec<Vec3> = text
        .lines()
        .filter_map(|line| line.trim_start().strip_prefix("vertex"))
        .filter_map(parse_xyz)
        .collect();

    if positions.is_empty() {
        return Err(LoadError::parse("stl", "no facets"));
    }
    Ok(positions)
}

fn parse_binary_stl(data: &[u8], triangles: usize) -> Vec<Vec3> {
    let mut positions = Vec::with_capacity(triangles * 3);
    for t in 0..triangles {
        // 12 bytes of normal precede the three vertices.
        let base = 84 + t * 50 + 12;
        for v in 0..3 {
            let o = base + v * 12;
            positions.push(Vec3::new(
                f32_le(&data[o..]),
                f32_le(&data[o + 4..]),
                f32_le(&data[o + 8..]),
            ));
        }
    }
    positions
}

// ---------------------------------------------------------------------------
// FBX
// ---------------------------------------------------------------------------

/// `None` for binary FBX, which is left to the engine.
fn parse_fbx(data: &[u8]) -> Result<Option<Vec<Vec3>>, LoadError> {
    if data.starts_with(FBX_BINARY_MAGIC) {
        return Ok(None);
    }

    let text = String::from_utf8_lossy(data);
    let mut values: Vec<f32> = Vec::new();
    let mut rest = text.as_ref();

    while let Some(found) = rest.find("Vertices:") {
        let after = &rest[found + "Vertices:".len()..];
        let (array, remainder) = if after.trim_start().starts_with('*') {
            // FBX 7: `Vertices: *N { a: x,y,z,... }`
            let open = after
                .find("a:")
                .ok_or_else(|| LoadError::parse("fbx", "Vertices without array"))?;
            let close = after[open..]
                .find('}')
                .map(|c| open + c)
                .ok_or_else(|| LoadError::parse("fbx", "unterminated Vertices array"))?;
            (&after[open + 2..close], &after[close..])
        } else {
            // FBX 6: values continue over lines that start with a number.
            let mut len = 0;
            for (i, line) in after.split_inclusive('\n').enumerate() {
                let trimmed = line.trim_start();
                let numeric = trimmed
                    .chars()
                    .next()
                    .is_some_and(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | ','));
                if i > 0 && !numeric {
                    break;
                }
                len += line.len();
            }
            (&after[..len], &after[len..])
        };

        for value in array.split(',') {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            values.push(
                value
                    .parse()
                    .map_err(|_| LoadError::parse("fbx", format!("bad coordinate '{value}'")))?,
            );
        }
        rest = remainder;
    }

    if values.len() < 3 {
        return Err(LoadError::parse("fbx", "no vertices"));
    }
    Ok(Some(
        values
            .chunks_exact(3)
            .map(|c| Vec3::new(c[0], c[1], c[2]))
            .collect(),
    ))
}

// ---------------------------------------------------------------------------
// SOG
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct SogDocument {
    objects: Vec<SogObject>,
}

#[derive(Deserialize)]
struct SogObject {
    #[serde(rename = "type")]
    kind: Option<String>,
    geometry: Option<SogGeometry>,
    transform: Option<SogTransform>,
}

#[derive(Deserialize)]
struct SogGeometry {
    #[serde(default)]
    vertices: Vec<f32>,
}

#[derive(Deserialize)]
struct SogTransform {
    position: Option<[f32; 3]>,
    rotation: Option<[f32; 3]>,
    scale: Option<[f32; 3]>,
}

impl SogTransform {
    fn matrix(&self) -> Mat4 {
        let translation = self.position.map(Vec3::from_array).unwrap_or(Vec3::ZERO);
        let rotation = self
            .rotation
            .map(|[x, y, z]| Quat::from_euler(EulerRot::XYZ, x, y, z))
            .unwrap_or(Quat::IDENTITY);
        let scale = self.scale.map(Vec3::from_array).unwrap_or(Vec3::ONE);
        Mat4::from_scale_rotation_translation(scale, rotation, translation)
    }
}

fn parse_sog(data: &[u8]) -> Result<Vec<Vec3>, LoadError> {
    let doc: SogDocument = serde_json::from_slice(data).map_err(|e| LoadError::parse("sog", e))?;

    let mut positions = Vec::new();
    for object in &doc.objects {
        let (Some("mesh"), Some(geometry)) = (object.kind.as_deref(), &object.geometry) else {
            continue;
        };
        let transform = object
            .transform
            .as_ref()
            .map(SogTransform::matrix)
            .unwrap_or(Mat4::IDENTITY);
        positions.extend(
            geometry
                .vertices
                .chunks_exact(3)
                .map(|c| transform.transform_point3(Vec3::new(c[0], c[1], c[2]))),
        );
    }
    Ok(positions)
}

// ---------------------------------------------------------------------------
// helpers
// ---------------------------------------------------------------------------

fn parse_xyz(rest: &str) -> Option<Vec3> {
    let mut it = rest.split_whitespace().map(str::parse::<f32>);
    match (it.next(), it.next(), it.next()) {
        (Some(Ok(x)), Some(Ok(y)), Some(Ok(z))) => Some(Vec3::new(x, y, z)),
        _ => None,
    }
}

fn f32_le(b: &[u8]) -> f32 {
    f32::from_le_bytes([b[0], b[1], b[2], b[3]])
}

fn u32_le(b: &[u8]) -> u32 {
    u32::from_le_bytes([b[0], b[1], b[2], b[3]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn floats(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    fn embedded_gltf(points: &[f32]) -> serde_json::Value {
        let buffer = floats(points);
        json!({
            "asset": { "version": "2.0" },
            "meshes": [{ "primitives": [{ "attributes": { "POSITION": 0 } }] }],
            "accessors": [{
                "bufferView": 0, "componentType": 5126,
                "count": points.len() / 3, "type": "VEC3"
            }],
            "bufferViews": [{ "buffer": 0, "byteLength": buffer.len() }],
            "buffers": [{
                "byteLength": buffer.len(),
                "uri": format!("data:application/octet-stream;base64,{}", STANDARD.encode(&buffer))
            }]
        })
    }

    #[test]
    fn test_gltf_embedded_buffer() {
        let doc = embedded_gltf(&[0.0, 0.0, 0.0, 1.0, 2.0, 3.0]);
        let r = decode_mesh(ModelFormat::Gltf, doc.to_string().as_bytes()).unwrap();
        assert_eq!(r.positions, vec![Vec3::ZERO, Vec3::new(1.0, 2.0, 3.0)]);
        assert_eq!(r.kind, LoaderKind::Mesh);
    }

    #[test]
    fn test_gltf_external_buffer_uses_min_max() {
        let doc = json!({
            "meshes": [{ "primitives": [{ "attributes": { "POSITION": 0 } }] }],
            "accessors": [{
                "bufferView": 0, "componentType": 5126, "count": 100, "type": "VEC3",
                "min": [-1.0, 0.0, -2.0], "max": [1.0, 4.0, 2.0]
            }],
            "bufferViews": [{ "buffer": 0, "byteLength": 1200 }],
            "buffers": [{ "byteLength": 1200, "uri": "scene.bin" }]
        });
        let positions = parse_gltf(doc.to_string().as_bytes(), None).unwrap();
        assert_eq!(
            positions,
            vec![Vec3::new(-1.0, 0.0, -2.0), Vec3::new(1.0, 4.0, 2.0)]
        );
    }

    #[test]
    fn test_gltf_oversized_accessor_count_falls_back() {
        let mut doc = embedded_gltf(&[0.0, 0.0, 0.0, 1.0, 2.0, 3.0]);
        doc["accessors"][0]["count"] = json!(100_000_000_000_000u64);
        doc["accessors"][0]["min"] = json!([0.0, 0.0, 0.0]);
        doc["accessors"][0]["max"] = json!([1.0, 2.0, 3.0]);

        let positions = parse_gltf(doc.to_string().as_bytes(), None).unwrap();
        assert_eq!(positions, vec![Vec3::ZERO, Vec3::new(1.0, 2.0, 3.0)]);

        doc["accessors"][0]["count"] = json!(u64::MAX);
        let positions = parse_gltf(doc.to_string().as_bytes(), None).unwrap();
        assert_eq!(positions.len(), 2);
    }

    #[test]
    fn test_glb_chunks() {
        let bin = floats(&[5.0, 6.0, 7.0]);
        let json = json!({
            "meshes": [{ "primitives": [{ "attributes": { "POSITION": 0 } }] }],
            "accessors": [{ "bufferView": 0, "componentType": 5126, "count": 1, "type": "VEC3" }],
            "bufferViews": [{ "buffer": 0, "byteLength": 12 }],
            "buffers": [{ "byteLength": 12 }]
        })
        .to_string();
        let mut json = json.into_bytes();
        while json.len() % 4 != 0 {
            json.push(b' ');
        }

        let mut glb = Vec::new();
        glb.extend_from_slice(b"glTF");
        glb.extend_from_slice(&2u32.to_le_bytes());
        let total = 12 + 8 + json.len() + 8 + bin.len();
        glb.extend_from_slice(&(total as u32).to_le_bytes());
        glb.extend_from_slice(&(json.len() as u32).to_le_bytes());
        glb.extend_from_slice(&GLB_CHUNK_JSON.to_le_bytes());
        glb.extend_from_slice(&json);
        glb.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        glb.extend_from_slice(&GLB_CHUNK_BIN.to_le_bytes());
        glb.extend_from_slice(&bin);

        let r = decode_mesh(ModelFormat::Glb, &glb).unwrap();
        assert_eq!(r.positions, vec![Vec3::new(5.0, 6.0, 7.0)]);

        assert!(decode_mesh(ModelFormat::Glb, b"not a glb file at all").is_err());
    }

    #[test]
    fn test_obj_vertices() {
        let obj = b"# cube\nv 1 2 3\nvn 0 1 0\nvt 0 0\n  v -1.5 0 2\nf 1 2 3\n";
        let r = decode_mesh(ModelFormat::Obj, obj).unwrap();
        assert_eq!(
            r.positions,
            vec![Vec3::new(1.0, 2.0, 3.0), Vec3::new(-1.5, 0.0, 2.0)]
        );
        assert!(decode_mesh(ModelFormat::Obj, b"# nothing\n").is_err());
    }

    #[test]
    fn test_ascii_stl() {
        let stl = b"solid t\nfacet normal 0 0 1\nouter loop\nvertex 0 0 0\nvertex 1 0 0\nvertex 0 1 0\nendloop\nendfacet\nendsolid t\n";
        let r = decode_mesh(ModelFormat::Stl, stl).unwrap();
        assert_eq!(r.positions.len(), 3);
        assert_eq!(r.positions[1], Vec3::X);
    }

    #[test]
    fn test_binary_stl() {
        let mut stl = vec![0u8; 80];
        stl.extend_from_slice(&1u32.to_le_bytes());
        stl.extend(floats(&[0.0, 0.0, 1.0]));
        stl.extend(floats(&[0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 3.0, 0.0]));
        stl.extend_from_slice(&[0, 0]);

        let r = decode_mesh(ModelFormat::Stl, &stl).unwrap();
        assert_eq!(
            r.positions,
            vec![Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0), Vec3::new(0.0, 3.0, 0.0)]
        );
    }

    #[test]
    fn test_fbx_ascii_v7_and_binary() {
        let fbx = b"; FBX 7.4.0 project file\nGeometry: 1, \"Geometry::\", \"Mesh\" {\n  Vertices: *6 {\n    a: 0,0,0,100,200,300\n  }\n}\n";
        let r = decode_mesh(ModelFormat::Fbx, fbx).unwrap();
        assert_eq!(r.positions, vec![Vec3::ZERO, Vec3::new(100.0, 200.0, 300.0)]);
        assert_eq!(r.base_scale, FBX_BASE_SCALE);
        assert!(!r.opaque);

        let mut binary = b"Kaydara FBX Binary  \x00".to_vec();
        binary.extend_from_slice(&[0u8; 64]);
        let r = decode_mesh(ModelFormat::Fbx, &binary).unwrap();
        assert!(r.opaque);
        assert!(r.positions.is_empty());
        assert_eq!(r.base_scale, FBX_BASE_SCALE);
    }

    #[test]
    fn test_fbx_ascii_v6() {
        let fbx = b"; FBX 6.1.0\nModel: \"Model::Box\", \"Mesh\" {\n\t\tVertices: 1,2,3,\n4,5,6\n\t\tPolygonVertexIndex: 0,1,-3\n}\n";
        let r = decode_mesh(ModelFormat::Fbx, fbx).unwrap();
        assert_eq!(
            r.positions,
            vec![Vec3::new(1.0, 2.0, 3.0), Vec3::new(4.0, 5.0, 6.0)]
        );
    }

    #[test]
    fn test_sog_applies_transform() {
        let sog = json!({
            "objects": [
                {
                    "type": "mesh",
                    "geometry": { "vertices": [1.0, 1.0, 1.0], "indices": [0] },
                    "transform": { "position": [10.0, 0.0, 0.0], "scale": [2.0, 2.0, 2.0] }
                },
                { "type": "light" }
            ]
        });
        let r = decode_mesh(ModelFormat::Sog, sog.to_string().as_bytes()).unwrap();
        assert_eq!(r.positions, vec![Vec3::new(12.0, 2.0, 2.0)]);

        assert!(decode_mesh(ModelFormat::Sog, b"{\"meshes\": []}").is_err());
    }
}
