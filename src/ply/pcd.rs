//! Parser für PCD-Punktwolken (`DATA ascii` und `DATA binary`).
//!
//! Farben werden aus einem gepackten `rgb`/`rgba`-Feld oder aus getrennten
//! `r g b`-Feldern gelesen. Punkte mit nicht-endlichen Koordinaten
//! (Lücken organisierter Wolken) werden übersprungen.

use anyhow::{bail, Context, Result};
use glam::Vec3;
use std::io::{BufRead, Read};

use super::parser::PlyPoints;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldType {
    Signed,
    Unsigned,
    Float,
}

#[derive(Debug, Clone, PartialEq)]
struct Field {
    name: String,
    size: usize,
    kind: FieldType,
    count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DataEncoding {
    Ascii,
    Binary,
}

#[derive(Debug, Clone)]
struct Header {
    fields: Vec<Field>,
    points: usize,
    data: DataEncoding,
}

/// Ein gelesener Wert; `bits` hält die unteren 32 Bit für gepacktes RGB.
#[derive(Debug, Clone, Copy, Default)]
struct Value {
    number: f64,
    bits: u32,
}

/// Liest Positionen und optionale Farben einer PCD-Datei.
pub fn read_pcd(mut reader: impl BufRead) -> Result<PlyPoints> {
    let header = read_header(&mut reader)?;

    // Startspalte jedes Feldes im flachen Datensatz
    let mut offsets = Vec::with_capacity(header.fields.len());
    let mut width = 0;
    for field in &header.fields {
        offsets.push(width);
        width += field.count;
    }
    let column = |name: &str| {
        header
            .fields
            .iter()
            .position(|f| f.name == name)
            .map(|i| (offsets[i], &header.fields[i]))
    };

    let (Some((x, _)), Some((y, _)), Some((z, _))) = (column("x"), column("y"), column("z"))
    else {
        bail!("PCD-Datei ohne x/y/z-Felder");
    };
    let color = match (column("rgb").or_else(|| column("rgba")), column("r"), column("g"), column("b")) {
        (Some((packed, _)), ..) => Some(ColorSource::Packed(packed)),
        (None, Some((r, field)), Some((g, _)), Some((b, _))) => Some(ColorSource::Channels {
            columns: [r, g, b],
            scale: if field.kind == FieldType::Float { 1.0 } else { 1.0 / 255.0 },
        }),
        _ => None,
    };

    let mut positions = Vec::with_capacity(header.points);
    let mut colors = color.map(|_| Vec::with_capacity(header.points));
    let mut record = vec![Value::default(); width];
    let mut line = String::new();
    let mut skipped = 0usize;

    for index in 0..header.points {
        match header.data {
            DataEncoding::Ascii => read_ascii_record(&mut reader, &header.fields, &mut line, &mut record)
                .with_context(|| format!("PCD-Punkt {} fehlerhaft", index))?,
            DataEncoding::Binary => read_binary_record(&mut reader, &header.fields, &mut record)
                .with_context(|| format!("PCD-Punkt {} fehlerhaft", index))?,
        }

        let position = Vec3::new(
            record[x].number as f32,
            record[y].number as f32,
            record[z].number as f32,
        );
        if !position.is_finite() {
            skipped += 1;
            continue;
        }
        positions.push(position);
        if let (Some(source), Some(colors)) = (color, colors.as_mut()) {
            colors.push(source.read(&record));
        }
    }

    if skipped > 0 {
        log::debug!("PCD: {} ungültige Punkte übersprungen", skipped);
    }
    Ok(PlyPoints { positions, colors })
}

#[derive(Debug, Clone, Copy)]
enum ColorSource {
    /// `0x00RRGGBB` in den Bits eines 4-Byte-Feldes
    Packed(usize),
    Channels { columns: [usize; 3], scale: f32 },
}

impl ColorSource {
    fn read(self, record: &[Value]) -> Vec3 {
        match self {
            ColorSource::Packed(column) => {
                let bits = record[column].bits;
                Vec3::new(
                    ((bits >> 16) & 0xff) as f32,
                    ((bits >> 8) & 0xff) as f32,
                    (bits & 0xff) as f32,
                ) / 255.0
            }
            ColorSource::Channels { columns, scale } => {
                Vec3::from_array(columns.map(|c| record[c].number as f32)) * scale
            }
        }
    }
}

fn read_header(reader: &mut impl BufRead) -> Result<Header> {
    let mut names: Vec<String> = Vec::new();
    let mut sizes: Vec<usize> = Vec::new();
    let mut types: Vec<FieldType> = Vec::new();
    let mut counts: Option<Vec<usize>> = None;
    let mut width = None;
    let mut height = 1usize;
    let mut points = None;
    let mut line = String::new();

    let data = loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            bail!("PCD-Header ohne DATA-Zeile");
        }
        let mut parts = line.split_whitespace();
        let Some(key) = parts.next() else { continue };
        let values: Vec<&str> = parts.collect();
        match key.to_ascii_uppercase().as_str() {
            k if k.starts_with('#') => {}
            "VERSION" | "VIEWPOINT" => {}
            "FIELDS" => names = values.iter().map(|v| v.to_string()).collect(),
            "SIZE" => sizes = parse_all(&values, "SIZE")?,
            "TYPE" => {
                types = values
                    .iter()
                    .map(|v| match *v {
                        "I" => Ok(FieldType::Signed),
                        "U" => Ok(FieldType::Unsigned),
                        "F" => Ok(FieldType::Float),
                        other => bail!("Unbekannter PCD-Typ: {}", other),
                    })
                    .collect::<Result<_>>()?
            }
            "COUNT" => counts = Some(parse_all(&values, "COUNT")?),
            "WIDTH" => width = Some(parse_one(&values, "WIDTH")?),
            "HEIGHT" => height = parse_one(&values, "HEIGHT")?,
            "POINTS" => points = Some(parse_one(&values, "POINTS")?),
            "DATA" => {
                break match values.first().copied() {
                    Some("ascii") => DataEncoding::Ascii,
                    Some("binary") => DataEncoding::Binary,
                    Some(other) => bail!("PCD-Kodierung nicht unterstützt: {}", other),
                    None => bail!("DATA-Zeile ohne Kodierung"),
                };
            }
            other => bail!("Ungültige PCD-Headerzeile: {}", other),
        }
    };

    let counts = counts.unwrap_or_else(|| vec![1; names.len()]);
    if names.is_empty() || sizes.len() != names.len() || types.len() != names.len() || counts.len() != names.len() {
        bail!("PCD-Header: FIELDS/SIZE/TYPE/COUNT passen nicht zusammen");
    }

    let fields = names
        .into_iter()
        .zip(sizes)
        .zip(types)
        .zip(counts)
        .map(|(((name, size), kind), count)| {
            let valid = match kind {
                FieldType::Float => matches!(size, 4 | 8),
                FieldType::Signed | FieldType::Unsigned => matches!(size, 1 | 2 | 4 | 8),
            };
            if !valid {
                bail!("PCD-Feld {} mit ungültiger Größe {}", name, size);
            }
            Ok(Field {
                name,
                size,
                kind,
                count,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let points = match (points, width) {
        (Some(points), _) => points,
        (None, Some(width)) => width * height,
        (None, None) => bail!("PCD-Header ohne POINTS/WIDTH"),
    };

    Ok(Header {
        fields,
        points,
        data,
    })
}

fn parse_all(values: &[&str], key: &str) -> Result<Vec<usize>> {
    values
        .iter()
        .map(|v| {
            v.parse::<usize>()
                .with_context(|| format!("Ungültiger {}-Wert: {}", key, v))
        })
        .collect()
}

fn parse_one(values: &[&str], key: &str) -> Result<usize> {
    let value = values
        .first()
        .with_context(|| format!("{}-Zeile ohne Wert", key))?;
    value
        .parse::<usize>()
        .with_context(|| format!("Ungültiger {}-Wert: {}", key, value))
}

fn read_ascii_record(
    reader: &mut impl BufRead,
    fields: &[Field],
    line: &mut String,
    record: &mut [Value],
) -> Result<()> {
    line.clear();
    if reader.read_line(line)? == 0 {
        bail!("PCD-Daten vorzeitig zu Ende");
    }
    let mut tokens = line.split_whitespace();
    let mut slot = 0;
    for field in fields {
        for _ in 0..field.count {
            let token = tokens.next().context("Zu wenige Werte in PCD-Zeile")?;
            record[slot] = parse_ascii_value(token, field.kind)?;
            slot += 1;
        }
    }
    Ok(())
}

fn parse_ascii_value(token: &str, kind: FieldType) -> Result<Value> {
    let invalid = || format!("Ungültiger PCD-Wert: {}", token);
    Ok(match kind {
        FieldType::Float => {
            let number = token.parse::<f64>().with_context(invalid)?;
            // direkt als f32 parsen, damit gepackte Farben bitgenau bleiben
            let single = token.parse::<f32>().with_context(invalid)?;
            Value {
                number,
                bits: single.to_bits(),
            }
        }
        FieldType::Unsigned => {
            let number = token.parse::<u64>().with_context(invalid)?;
            Value {
                number: number as f64,
                bits: number as u32,
            }
        }
        FieldType::Signed => {
            let number = token.parse::<i64>().with_context(invalid)?;
            Value {
                number: number as f64,
                bits: number as u32,
            }
        }
    })
}

fn read_binary_record(reader: &mut impl Read, fields: &[Field], record: &mut [Value]) -> Result<()> {
    let mut slot = 0;
    for field in fields {
        for _ in 0..field.count {
            let mut buf = [0u8; 8];
            reader
                .read_exact(&mut buf[..field.size])
                .context("PCD-Daten vorzeitig zu Ende")?;
            record[slot] = decode_binary(&buf, field);
            slot += 1;
        }
    }
    Ok(())
}

/// Dekodiert einen Little-Endian-Wert; `buf` ist hinter `field.size` mit Nullen gefüllt.
fn decode_binary(buf: &[u8; 8], field: &Field) -> Value {
    let bits = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
    let number = match (field.kind, field.size) {
        (FieldType::Float, 4) => f32::from_bits(bits) as f64,
        (FieldType::Float, _) => f64::from_le_bytes(*buf),
        (FieldType::Unsigned, _) => u64::from_le_bytes(*buf) as f64,
        (FieldType::Signed, size) => {
            // Vorzeichen auf 64 Bit erweitern
            let shift = 64 - 8 * size as u32;
            ((i64::from_le_bytes(*buf) << shift) >> shift) as f64
        }
    };
    Value { number, bits }
}
