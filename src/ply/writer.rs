//! Writer für PLY-Punktwolken.

use anyhow::Result;
use std::io::Write;

use super::PlyFormat;
use crate::core::PointCloud;

/// Schreibt eine Punktwolke als PLY (`float x y z`, optional `uchar red green blue`).
pub fn write_ply(mut writer: impl Write, cloud: &PointCloud, format: PlyFormat) -> Result<()> {
    let format_name = match format {
        PlyFormat::Ascii => "ascii",
        PlyFormat::BinaryLittleEndian => "binary_little_endian",
    };

    writeln!(writer, "ply")?;
    writeln!(writer, "format {} 1.0", format_name)?;
    writeln!(writer, "comment crash_site_scan {}", env!("CARGO_PKG_VERSION"))?;
    writeln!(writer, "element vertex {}", cloud.len())?;
    writeln!(writer, "property float x")?;
    writeln!(writer, "property float y")?;
    writeln!(writer, "property float z")?;
    if cloud.colors().is_some() {
        writeln!(writer, "property uchar red")?;
        writeln!(writer, "property uchar green")?;
        writeln!(writer, "property uchar blue")?;
    }
    writeln!(writer, "end_header")?;

    let colors = cloud.colors();
    for (i, p) in cloud.positions().iter().enumerate() {
        let rgb = colors.map(|c| c[i].to_array().map(to_channel));
        match format {
            PlyFormat::Ascii => {
                write!(writer, "{} {} {}", p.x, p.y, p.z)?;
                if let Some([r, g, b]) = rgb {
                    write!(writer, " {} {} {}", r, g, b)?;
                }
                writeln!(writer)?;
            }
            PlyFormat::BinaryLittleEndian => {
                for value in p.to_array() {
                    writer.write_all(&value.to_le_bytes())?;
                }
                if let Some(rgb) = rgb {
                    writer.write_all(&rgb)?;
                }
            }
        }
    }

    writer.flush()?;
    Ok(())
}

fn to_channel(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}
