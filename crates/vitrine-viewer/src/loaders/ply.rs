//! PLY point clouds and gaussian-splat captures.

use async_trait::async_trait;
use bytes::Bytes;
use glam::Vec3;

use vitrine_shared::{LoaderKind, ModelFormat};

use super::{decode_blocking, ModelLoader};
use crate::error::LoadError;
use crate::renderable::{LoadRequest, Renderable};

pub struct PlySplatLoader;

#[async_trait]
impl ModelLoader for PlySplatLoader {
    fn kind(&self) -> LoaderKind {
        LoaderKind::PlySplat
    }

    fn formats(&self) -> &'static [ModelFormat] {
        &[ModelFormat::Ply]
    }

    async fn load(&self, _request: &LoadRequest, bytes: Bytes) -> Result<Renderable, LoadError> {
        decode_blocking(move || {
            let positions = parse_ply(&bytes)?;
            Ok(Renderable::new(ModelFormat::Ply, positions, bytes.len()))
        })
        .await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Ascii,
    BinaryLittleEndian,
    BinaryBigEndian,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scalar {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
    F64,
}

impl Scalar {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "char" | "int8" => Scalar::I8,
            "uchar" | "uint8" => Scalar::U8,
            "short" | "int16" => Scalar::I16,
            "ushort" | "uint16" => Scalar::U16,
            "int" | "int32" => Scalar::I32,
            "uint" | "uint32" => Scalar::U32,
            "float" | "float32" => Scalar::F32,
            "double" | "float64" => Scalar::F64,
            _ => return None,
        })
    }

    fn size(self) -> usize {
        match self {
            Scalar::I8 | Scalar::U8 => 1,
            Scalar::I16 | Scalar::U16 => 2,
            Scalar::I32 | Scalar::U32 | Scalar::F32 => 4,
            Scalar::F64 => 8,
        }
    }

    fn read(self, b: &[u8], little: bool) -> f64 {
        macro_rules! num {
            ($t:ty, $n:expr) => {{
                let mut raw = [0u8; $n];
                raw.copy_from_slice(&b[..$n]);
                if little {
                    <$t>::from_le_bytes(raw) as f64
                } else {
                    <$t>::from_be_bytes(raw) as f64
                }
            }};
        }
        match self {
            Scalar::I8 => b[0] as i8 as f64,
            Scalar::U8 => b[0] as f64,
            Scalar::I16 => num!(i16, 2),
            Scalar::U16 => num!(u16, 2),
            Scalar::I32 => num!(i32, 4),
            Scalar::U32 => num!(u32, 4),
            Scalar::F32 => num!(f32, 4),
            Scalar::F64 => num!(f64, 8),
        }
    }
}

#[derive(Debug)]
struct Element {
    name: String,
    count: usize,
    /// `None` marks a list property, which binary vertex rows cannot skip
    /// without reading the length prefix.
    properties: Vec<(String, Option<Scalar>)>,
}

struct Header {
    encoding: Encoding,
    elements: Vec<Element>,
    body_offset: usize,
}

fn parse_header(data: &[u8]) -> Result<Header, LoadError> {
    const END: &[u8] = b"end_header";
    let end = data
        .windows(END.len())
        .position(|w| w == END)
        .ok_or_else(|| LoadError::parse("ply", "no end_header"))?;
    let mut body_offset = end + END.len();
    if data.get(body_offset) == Some(&b'\r') {
        body_offset += 1;
    }
    if data.get(body_offset) == Some(&b'\n') {
        body_offset += 1;
    }

    let header = String::from_utf8_lossy(&data[..end]);
    let mut lines = header.lines();
    if lines.next().map(str::trim) != Some("ply") {
        return Err(LoadError::parse("ply", "missing 'ply' magic"));
    }

    let mut encoding = None;
    let mut elements: Vec<Element> = Vec::new();
    for line in lines {
        let words: Vec<&str> = line.split_whitespace().collect();
        match words.as_slice() {
            ["format", "ascii", ..] => encoding = Some(Encoding::Ascii),
            ["format", "binary_little_endian", ..] => encoding = Some(Encoding::BinaryLittleEndian),
            ["format", "binary_big_endian", ..] => encoding = Some(Encoding::BinaryBigEndian),
            ["element", name, count] => elements.push(Element {
                name: name.to_string(),
                count: count
                    .parse()
                    .map_err(|_| LoadError::parse("ply", format!("bad element count '{count}'")))?,
                properties: Vec::new(),
            }),
            ["property", "list", .., name] => {
                if let Some(element) = elements.last_mut() {
                    element.properties.push((name.to_string(), None));
                }
            }
            ["property", kind, name] => {
                let scalar = Scalar::parse(kind)
                    .ok_or_else(|| LoadError::parse("ply", format!("unknown type '{kind}'")))?;
                if let Some(element) = elements.last_mut() {
                    element.properties.push((name.to_string(), Some(scalar)));
                }
            }
            _ => {}
        }
    }

    Ok(Header {
        encoding: encoding.ok_or_else(|| LoadError::parse("ply", "missing format line"))?,
        elements,
        body_offset,
    })
}

/// Vertex (or splat-centre) positions of a PLY file. Elements before
/// `vertex` are skipped; those after it are ignored.
pub fn parse_ply(data: &[u8]) -> Result<Vec<Vec3>, LoadError> {
    let header = parse_header(data)?;
    let body = &data[header.body_offset..];

    let vertex_index = header
        .elements
        .iter()
        .position(|e| e.name == "vertex")
        .ok_or_else(|| LoadError::parse("ply", "no vertex element"))?;
    let vertex = &header.elements[vertex_index];
    if vertex.count == 0 {
        return Err(LoadError::parse("ply", "vertex element is empty"));
    }

    let axis = |name: &str| {
        vertex
            .properties
            .iter()
            .position(|(n, _)| n == name)
            .ok_or_else(|| LoadError::parse("ply", format!("vertex has no '{name}' property")))
    };
    let (ix, iy, iz) = (axis("x")?, axis("y")?, axis("z")?);

    match header.encoding {
        Encoding::Ascii => {
            let text = String::from_utf8_lossy(body);
            let mut lines = text.lines().filter(|l| !l.trim().is_empty());
            // Rows of earlier elements come first.
            for element in &header.elements[..vertex_index] {
                lines.by_ref().take(element.count).for_each(drop);
            }

            // A row is at least "0 0 0" plus a line break.
            let mut positions = Vec::with_capacity(vertex.count.min(body.len() / 6 + 1));
            for row in lines.take(vertex.count) {
                let values: Vec<&str> = row.split_whitespace().collect();
                let coord = |i: usize| -> Result<f32, LoadError> {
                    values
                        .get(i)
                        .and_then(|v| v.parse::<f32>().ok())
                        .ok_or_else(|| LoadError::parse("ply", format!("bad vertex row '{row}'")))
                };
                positions.push(Vec3::new(coord(ix)?, coord(iy)?, coord(iz)?));
            }
            if positions.len() < vertex.count {
                return Err(LoadError::parse("ply", "fewer vertex rows than declared"));
            }
            Ok(positions)
        }
        Encoding::BinaryLittleEndian | Encoding::BinaryBigEndian => {
            let little = header.encoding == Encoding::BinaryLittleEndian;

            let overflow = || LoadError::parse("ply", "declared element sizes overflow");

            let mut offset = 0usize;
            for element in &header.elements[..vertex_index] {
                offset = element
                    .count
                    .checked_mul(fixed_row_size(element)?)
                    .and_then(|size| offset.checked_add(size))
                    .ok_or_else(overflow)?;
            }

            let mut offsets = Vec::with_capacity(vertex.properties.len());
            let mut row_size = 0usize;
            for (_, scalar) in &vertex.properties {
                let scalar = scalar.ok_or_else(|| {
                    LoadError::parse("ply", "list properties on binary vertices are not supported")
                })?;
                offsets.push((row_size, scalar));
                row_size += scalar.size();
            }

            let needed = row_size
                .checked_mul(vertex.count)
                .and_then(|size| offset.checked_add(size))
                .ok_or_else(overflow)?;
            if body.len() < needed {
                return Err(LoadError::parse(
                    "ply",
                    format!("body holds {} bytes, header declares {needed}", body.len()),
                ));
            }

            let read = |row: &[u8], i: usize| {
                let (at, scalar) = offsets[i];
                scalar.read(&row[at..], little) as f32
            };
            Ok(body[offset..needed]
                .chunks_exact(row_size)
                .map(|row| Vec3::new(read(row, ix), read(row, iy), read(row, iz)))
                .collect())
        }
    }
}

fn fixed_row_size(element: &Element) -> Result<usize, LoadError> {
    element
        .properties
        .iter()
        .map(|(name, scalar)| {
            scalar.map(Scalar::size).ok_or_else(|| {
                LoadError::parse(
                    "ply",
                    format!("cannot skip list property '{name}' before vertices"),
                )
            })
        })
        .sum()
}
