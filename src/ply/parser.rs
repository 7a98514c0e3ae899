//! Parser für PLY-Punktwolken (ASCII und binary_little_endian).

use anyhow::{bail, Context, Result};
use glam::Vec3;
use std::io::{BufRead, Read};

use super::PlyFormat;

/// Skalartyp einer PLY-Property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScalarType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
    F64,
}

impl ScalarType {
    fn parse(name: &str) -> Result<Self> {
        Ok(match name {
            "char" | "int8" => Self::I8,
            "uchar" | "uint8" => Self::U8,
            "short" | "int16" => Self::I16,
            "ushort" | "uint16" => Self::U16,
            "int" | "int32" => Self::I32,
            "uint" | "uint32" => Self::U32,
            "float" | "float32" => Self::F32,
            "double" | "float64" => Self::F64,
            other => bail!("Unbekannter PLY-Datentyp: {}", other),
        })
    }

    fn size(self) -> usize {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::F64 => 8,
        }
    }

    fn is_integer(self) -> bool {
        !matches!(self, Self::F32 | Self::F64)
    }

    /// Liest einen Little-Endian-Wert.
    fn read_le(self, reader: &mut impl Read) -> Result<f64> {
        let mut buf = [0u8; 8];
        let bytes = &mut buf[..self.size()];
        reader
            .read_exact(bytes)
            .context("PLY-Daten vorzeitig zu Ende")?;
        Ok(match self {
            Self::I8 => i8::from_le_bytes([bytes[0]]) as f64,
            Self::U8 => bytes[0] as f64,
            Self::I16 => i16::from_le_bytes([bytes[0], bytes[1]]) as f64,
            Self::U16 => u16::from_le_bytes([bytes[0], bytes[1]]) as f64,
            Self::I32 => i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
            Self::U32 => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
            Self::F32 => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
            Self::F64 => f64::from_le_bytes([
                bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
            ]),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum PropertyKind {
    Scalar(ScalarType),
    List { count: ScalarType, item: ScalarType },
}

#[derive(Debug, Clone, PartialEq)]
struct Property {
    name: String,
    kind: PropertyKind,
}

#[derive(Debug, Clone, PartialEq)]
struct Element {
    name: String,
    count: usize,
    properties: Vec<Property>,
}

#[derive(Debug, Clone, PartialEq)]
struct Header {
    format: PlyFormat,
    elements: Vec<Element>,
}

/// Positionen und optionale Farben (RGB in 0..1) einer PLY-Datei.
#[derive(Debug, Clone, Default)]
pub struct PlyPoints {
    pub positions: Vec<Vec3>,
    pub colors: Option<Vec<Vec3>>,
}

/// Liest das `vertex`-Element einer PLY-Datei. Unbekannte Properties
/// und Elemente vor den Vertices werden übersprungen.
pub fn read_ply(mut reader: impl BufRead) -> Result<PlyPoints> {
    let header = read_header(&mut reader)?;
    let mut tokens = AsciiTokens::default();

    for element in &header.elements {
        if element.name != "vertex" {
            for _ in 0..element.count {
                skip_record(&mut reader, &header.format, element, &mut tokens)?;
            }
            continue;
        }
        return read_vertices(&mut reader, &header.format, element, &mut tokens);
    }

    bail!("PLY-Datei enthält kein vertex-Element")
}

fn read_header(reader: &mut impl BufRead) -> Result<Header> {
    let mut line = String::new();
    reader.read_line(&mut line)?;
    if line.trim() != "ply" {
        bail!("Keine PLY-Datei (Magic 'ply' fehlt)");
    }

    let mut format = None;
    let mut elements: Vec<Element> = Vec::new();

    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            bail!("PLY-Header ohne end_header");
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            ["end_header"] => break,
            ["comment", ..] | ["obj_info", ..] | [] => {}
            ["format", kind, _version] => {
                format = Some(match *kind {
                    "ascii" => PlyFormat::Ascii,
                    "binary_little_endian" => PlyFormat::BinaryLittleEndian,
                    other => bail!("PLY-Format nicht unterstützt: {}", other),
                });
            }
            ["element", name, count] => elements.push(Element {
                name: name.to_string(),
                count: count
                    .parse()
                    .with_context(|| format!("Ungültige Elementanzahl: {}", count))?,
                properties: Vec::new(),
            }),
            ["property", "list", count, item, name] => {
                let element = elements
                    .last_mut()
                    .context("property vor erstem element")?;
                element.properties.push(Property {
                    name: name.to_string(),
                    kind: PropertyKind::List {
                        count: ScalarType::parse(count)?,
                        item: ScalarType::parse(item)?,
                    },
                });
            }
            ["property", kind, name] => {
                let element = elements
                    .last_mut()
                    .context("property vor erstem element")?;
                element.properties.push(Property {
                    name: name.to_string(),
                    kind: PropertyKind::Scalar(ScalarType::parse(kind)?),
                });
            }
            other => bail!("Ungültige PLY-Headerzeile: {}", other.join(" ")),
        }
    }

    Ok(Header {
        format: format.context("PLY-Header ohne format-Zeile")?,
        elements,
    })
}

/// Zeilenweiser Token-Puffer für ASCII-Daten.
#[derive(Default)]
struct AsciiTokens {
    pending: std::collections::VecDeque<String>,
    line: String,
}

impl AsciiTokens {
    fn next_value(&mut self, reader: &mut impl BufRead) -> Result<f64> {
        while self.pending.is_empty() {
            self.line.clear();
            if reader.read_line(&mut self.line)? == 0 {
                bail!("PLY-Daten vorzeitig zu Ende");
            }
            self.pending
                .extend(self.line.split_whitespace().map(str::to_string));
        }
        let token = self.pending.pop_front().unwrap_or_default();
        token
            .parse::<f64>()
            .with_context(|| format!("Ungültiger PLY-Wert: {}", token))
    }
}

fn read_value(
    reader: &mut impl BufRead,
    format: &PlyFormat,
    kind: ScalarType,
    tokens: &mut AsciiTokens,
) -> Result<f64> {
    match format {
        PlyFormat::Ascii => tokens.next_value(reader),
        PlyFormat::BinaryLittleEndian => kind.read_le(reader),
    }
}

/// Liest einen Datensatz und liefert die Skalarwerte in Property-Reihenfolge
/// (Listen liefern `NaN` als Platzhalter).
fn read_record(
    reader: &mut impl BufRead,
    format: &PlyFormat,
    element: &Element,
    tokens: &mut AsciiTokens,
    values: &mut Vec<f64>,
) -> Result<()> {
    values.clear();
    for property in &element.properties {
        match property.kind {
            PropertyKind::Scalar(kind) => values.push(read_value(reader, format, kind, tokens)?),
            PropertyKind::List { count, item } => {
                let n = read_value(reader, format, count, tokens)?;
                for _ in 0..(n as usize) {
                    read_value(reader, format, item, tokens)?;
                }
                values.push(f64::NAN);
            }
        }
    }
    Ok(())
}

fn skip_record(
    reader: &mut impl BufRead,
    format: &PlyFormat,
    element: &Element,
    tokens: &mut AsciiTokens,
) -> Result<()> {
    let mut scratch = Vec::with_capacity(element.properties.len());
    read_record(reader, format, element, tokens, &mut scratch)
}

fn read_vertices(
    reader: &mut impl BufRead,
    format: &PlyFormat,
    element: &Element,
    tokens: &mut AsciiTokens,
) -> Result<PlyPoints> {
    let column = |name: &str| element.properties.iter().position(|p| p.name == name);
    let (Some(x), Some(y), Some(z)) = (column("x"), column("y"), column("z")) else {
        bail!("vertex-Element ohne x/y/z");
    };
    let rgb = match (column("red"), column("green"), column("blue")) {
        (Some(r), Some(g), Some(b)) => Some([r, g, b]),
        _ => None,
    };
    // Ganzzahlige Farbkanäle liegen in 0..255
    let color_scale = rgb
        .map(|[r, _, _]| match element.properties[r].kind {
            PropertyKind::Scalar(kind) if kind.is_integer() => 1.0 / 255.0,
            _ => 1.0,
        })
        .unwrap_or(1.0);

    let mut positions = Vec::with_capacity(element.count);
    let mut colors = rgb.map(|_| Vec::with_capacity(element.count));
    let mut values = Vec::with_capacity(element.properties.len());

    for _ in 0..element.count {
        read_record(reader, format, element, tokens, &mut values)?;
        positions.push(Vec3::new(values[x] as f32, values[y] as f32, values[z] as f32));
        if let (Some([r, g, b]), Some(colors)) = (rgb, colors.as_mut()) {
            colors.push(
                Vec3::new(values[r] as f32, values[g] as f32, values[b] as f32)
                    * color_scale as f32,
            );
        }
    }

    Ok(PlyPoints { positions, colors })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn parses_ascii_with_colors_and_extra_properties() {
        let text = "ply\nformat ascii 1.0\ncomment test\nelement vertex 2\n\
                    property float x\nproperty float y\nproperty float z\n\
                    property float nx\nproperty uchar red\nproperty uchar green\nproperty uchar blue\n\
                    element face 0\nproperty list uchar int vertex_indices\nend_header\n\
                    1 2 3 0.5 255 0 0\n4 5 6 0.5 0 255 51\n";

        let points = read_ply(text.as_bytes()).expect("PLY gültig");

        assert_eq!(points.positions, vec![Vec3::new(1.0, 2.0, 3.0), Vec3::new(4.0, 5.0, 6.0)]);
        let colors = points.colors.expect("Farben erwartet");
        assert_eq!(colors[0], Vec3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(colors[1].z, 0.2, epsilon = 1e-6);
    }

    #[test]
    fn skips_elements_before_vertices() {
        let text = "ply\nformat ascii 1.0\nelement camera 1\nproperty float fx\n\
                    property list uchar float dist\nelement vertex 1\n\
                    property double x\nproperty double y\nproperty double z\nend_header\n\
                    800 3 0.1 0.2 0.3\n7 8 9\n";

        let points = read_ply(text.as_bytes()).expect("PLY gültig");

        assert_eq!(points.positions, vec![Vec3::new(7.0, 8.0, 9.0)]);
        assert!(points.colors.is_none());
    }

    #[test]
    fn parses_binary_little_endian() {
        let mut data = b"ply\nformat binary_little_endian 1.0\nelement vertex 1\n\
                         property float x\nproperty float y\nproperty double z\n\
                         property uchar red\nproperty uchar green\nproperty uchar blue\nend_header\n"
            .to_vec();
        data.extend_from_slice(&1.5f32.to_le_bytes());
        data.extend_from_slice(&(-2.0f32).to_le_bytes());
        data.extend_from_slice(&0.25f64.to_le_bytes());
        data.extend_from_slice(&[0, 255, 0]);

        let points = read_ply(data.as_slice()).expect("PLY gültig");

        assert_eq!(points.positions, vec![Vec3::new(1.5, -2.0, 0.25)]);
        assert_eq!(points.colors.expect("Farben erwartet")[0], Vec3::Y);
    }

    #[test]
    fn rejects_missing_coordinates_and_truncation() {
        let no_z = "ply\nformat ascii 1.0\nelement vertex 1\nproperty float x\nproperty float y\nend_header\n1 2\n";
        assert!(read_ply(no_z.as_bytes()).is_err());

        let truncated = "ply\nformat ascii 1.0\nelement vertex 2\nproperty float x\nproperty float y\nproperty float z\nend_header\n1 2 3\n";
        assert!(read_ply(truncated.as_bytes()).is_err());

        assert!(read_ply("not a ply".as_bytes()).is_err());
    }
}
