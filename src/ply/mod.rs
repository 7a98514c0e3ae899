//! PLY Import/Export und der Codec-Vertrag für Punktwolken.
//!
//! Unterstützt werden `ascii` und `binary_little_endian` mit Positionen
//! und optionalen RGB-Farben; alle anderen Properties werden übersprungen.
//! Dateien mit Endung `.pcd` werden als PCD gelesen, geschrieben wird
//! immer PLY.

pub mod parser;
pub mod pcd;
pub mod writer;

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use crate::core::PointCloud;

pub use parser::{read_ply, PlyPoints};
pub use pcd::read_pcd;
pub use writer::write_ply;

/// Kodierung der PLY-Daten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlyFormat {
    Ascii,
    #[default]
    BinaryLittleEndian,
}

/// Ergebnis eines Ladevorgangs inklusive Punktzahlen vor und nach Dezimierung.
#[derive(Debug, Clone)]
pub struct LoadedCloud {
    pub cloud: PointCloud,
    pub original_count: usize,
    pub final_count: usize,
}

/// Vertrag eines Punktwolken-Codecs.
pub trait PointCloudCodec: Send + Sync {
    /// Lädt eine Punktwolke. Die Textur-Referenz hängt an der Wolke.
    fn load(&self, path: &Path) -> Result<LoadedCloud>;
    /// Schreibt eine Punktwolke.
    fn save(&self, path: &Path, cloud: &PointCloud, format: PlyFormat) -> Result<()>;
}

/// Dezimierung großer Vorschau-Wolken.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewDecimation {
    /// Punktzahl, ab der dezimiert wird
    pub point_limit: usize,
    /// Voxelgröße = Bounding-Box-Diagonale / Divisor
    pub voxel_divisor: f32,
}

/// PLY-Codec mit optionaler Vorschau-Dezimierung.
#[derive(Debug, Clone, Default)]
pub struct PlyCodec {
    decimation: Option<PreviewDecimation>,
}

impl PlyCodec {
    /// Codec ohne Dezimierung (Arbeitskopie, Rohdaten).
    pub fn new() -> Self {
        Self { decimation: None }
    }

    /// Codec für Vorschau-Wolken.
    pub fn preview(point_limit: usize, voxel_divisor: f32) -> Self {
        Self {
            decimation: Some(PreviewDecimation {
                point_limit,
                voxel_divisor,
            }),
        }
    }
}

impl PointCloudCodec for PlyCodec {
    fn load(&self, path: &Path) -> Result<LoadedCloud> {
        let file = File::open(path)
            .with_context(|| format!("Punktwolke nicht lesbar: {}", path.display()))?;
        let reader = BufReader::new(file);
        let points = if is_pcd(path) {
            read_pcd(reader)
                .with_context(|| format!("PCD-Datei fehlerhaft: {}", path.display()))?
        } else {
            read_ply(reader)
                .with_context(|| format!("PLY-Datei fehlerhaft: {}", path.display()))?
        };

        let original_count = points.positions.len();
        let mut cloud = PointCloud::from_parts(points.positions, points.colors)?
            .with_texture(find_texture(path));

        if let Some(decimation) = self.decimation {
            if original_count > decimation.point_limit {
                if let Some(bounds) = cloud.bounds() {
                    let voxel = bounds.diagonal() / decimation.voxel_divisor.max(1.0);
                    cloud = cloud.voxel_downsample(voxel);
                    log::info!(
                        "Vorschau dezimiert: {} → {} Punkte (Voxel {:.4})",
                        original_count,
                        cloud.len(),
                        voxel
                    );
                }
            }
        }

        let final_count = cloud.len();
        log::info!(
            "Punktwolke geladen: {} ({} Punkte)",
            path.display(),
            final_count
        );
        Ok(LoadedCloud {
            cloud,
            original_count,
            final_count,
        })
    }

    fn save(&self, path: &Path, cloud: &PointCloud, format: PlyFormat) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("PLY-Datei nicht schreibbar: {}", path.display()))?;
        write_ply(BufWriter::new(file), cloud, format)
            .with_context(|| format!("PLY schreiben fehlgeschlagen: {}", path.display()))?;
        log::info!("PLY gespeichert: {} ({} Punkte)", path.display(), cloud.len());
        Ok(())
    }
}

fn is_pcd(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pcd"))
}

/// Sucht eine gleichnamige Textur (`.png`, `.jpg`, `.jpeg`) neben der Datei.
pub fn find_texture(path: &Path) -> Option<PathBuf> {
    ["png", "jpg", "jpeg"]
        .iter()
        .map(|ext| path.with_extension(ext))
        .find(|candidate| candidate.is_file())
}

/// `<dir>/<stem><suffix>.ply` zur Quelldatei.
pub fn work_file_path(source: &Path, suffix: &str) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "scan".to_string());
    source.with_file_name(format!("{}{}.ply", stem, suffix))
}
