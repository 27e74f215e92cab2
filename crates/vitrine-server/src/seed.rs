//! Sample content written on first start so a fresh install has something
//! to show.

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::json;
use tokio::fs;
use tracing::info;

use vitrine_shared::constants::{IMAGES_DIR, IMAGES_URI_PREFIX, MODELS_DIR, MODELS_URI_PREFIX};
use vitrine_store::{ModelCatalog, NewModel};

const CUBE_FILE: &str = "cube.gltf";

/// (name, description, thumbnail colour)
const SAMPLES: [(&str, &str, &str); 4] = [
    ("Sample cube 1", "A unit cube to check the viewer works", "#e4572e"),
    ("Sample cube 2", "Same cube, second slot", "#17bebb"),
    ("Sample cube 3", "Same cube, third slot", "#ffc914"),
    ("Sample cube 4", "Same cube, fourth slot", "#76b041"),
];

/// Write the sample assets under `public_dir` and add one record per sample.
pub async fn seed_samples(models: &ModelCatalog, public_dir: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(public_dir.join(MODELS_DIR)).await?;
    fs::create_dir_all(public_dir.join(IMAGES_DIR)).await?;

    let cube = serde_json::to_vec_pretty(&cube_gltf())?;
    fs::write(public_dir.join(MODELS_DIR).join(CUBE_FILE), cube).await?;

    for (i, (name, description, colour)) in SAMPLES.iter().enumerate() {
        let thumb = format!("thumb{}.svg", i + 1);
        fs::write(
            public_dir.join(IMAGES_DIR).join(&thumb),
            thumbnail_svg(colour, i + 1),
        )
        .await?;

        models
            .add(NewModel {
                name: name.to_string(),
                description: Some(description.to_string()),
                path: format!("{MODELS_URI_PREFIX}{CUBE_FILE}"),
                format: "gltf".into(),
                thumbnail: format!("{IMAGES_URI_PREFIX}{thumb}"),
                order: None,
                background_id: None,
            })
            .await?;
    }

    info!(count = SAMPLES.len(), "Seeded sample models");
    Ok(())
}

fn thumbnail_svg(colour: &str, n: usize) -> String {
    format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="256" height="256" viewBox="0 0 256 256">
  <rect width="256" height="256" fill="#1b1b1f"/>
  <polygon points="128,40 208,84 208,172 128,216 48,172 48,84" fill="{colour}"/>
  <polyline points="48,84 128,128 208,84" fill="none" stroke="#1b1b1f" stroke-width="4"/>
  <line x1="128" y1="128" x2="128" y2="216" stroke="#1b1b1f" stroke-width="4"/>
  <text x="128" y="246" font-family="sans-serif" font-size="20" fill="#ffffff" text-anchor="middle">{n}</text>
</svg>
"##
    )
}

/// Unit cube centred on the origin, 8 shared vertices and 12 triangles,
/// with the buffer embedded as a base64 data URI.
fn cube_gltf() -> serde_json::Value {
    let mut positions: Vec<u8> = Vec::with_capacity(8 * 12);
    for i in 0..8u8 {
        for axis in 0..3 {
            let v: f32 = if (i >> axis) & 1 == 1 { 0.5 } else { -0.5 };
            positions.extend_from_slice(&v.to_le_bytes());
        }
    }

    #[rustfmt::skip]
    let indices: [u16; 36] = [
        0, 2, 3, 0, 3, 1, // -z
        4, 5, 7, 4, 7, 6, // +z
        0, 4, 6, 0, 6, 2, // -x
        1, 3, 7, 1, 7, 5, // +x
        0, 1, 5, 0, 5, 4, // -y
        2, 6, 7, 2, 7, 3, // +y
    ];
    let mut index_bytes: Vec<u8> = Vec::with_capacity(indices.len() * 2);
    for i in indices {
        index_bytes.extend_from_slice(&i.to_le_bytes());
    }

    let positions_len = positions.len();
    let indices_len = index_bytes.len();
    let mut buffer = positions;
    buffer.extend_from_slice(&index_bytes);

    json!({
        "asset": { "version": "2.0", "generator": "vitrine-server" },
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "mesh": 0, "name": "Cube" }],
        "meshes": [{
            "name": "Cube",
            "primitives": [{
                "attributes": { "POSITION": 0 },
                "indices": 1,
                "material": 0
            }]
        }],
        "materials": [{
            "name": "Default",
            "pbrMetallicRoughness": {
                "baseColorFactor": [0.8, 0.8, 0.8, 1.0],
                "metallicFactor": 0.1,
                "roughnessFactor": 0.7
            }
        }],
        "buffers": [{
            "byteLength": buffer.len(),
            "uri": format!("data:application/octet-stream;base64,{}", STANDARD.encode(&buffer))
        }],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": positions_len, "target": 34962 },
            { "buffer": 0, "byteOffset": positions_len, "byteLength": indices_len, "target": 34963 }
        ],
        "accessors": [
            {
                "bufferView": 0,
                "componentType": 5126,
                "count": 8,
                "type": "VEC3",
                "min": [-0.5, -0.5, -0.5],
                "max": [0.5, 0.5, 0.5]
            },
            {
                "bufferView": 1,
                "componentType": 5123,
                "count": 36,
                "type": "SCALAR"
            }
        ]
    })
}
