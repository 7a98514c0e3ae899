//! Punktwolke mit optionalen Farben und Textur-Referenz.
//!
//! Strukturelle Änderungen (Löschen, Zuschneiden, Maskieren, Transformieren)
//! erzeugen immer eine neue Wolke mit frischer Generation.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use glam::{Mat4, Vec3};
use indexmap::IndexMap;

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

fn next_generation() -> u64 {
    NEXT_GENERATION.fetch_add(1, Ordering::Relaxed)
}

/// Achsenparallele Bounding-Box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Mittelpunkt der Box.
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Kantenlängen je Achse.
    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    /// Länge der Raumdiagonale.
    pub fn diagonal(&self) -> f32 {
        self.extent().length()
    }

    /// Größere der beiden horizontalen Kantenlängen.
    pub fn max_xy_extent(&self) -> f32 {
        let extent = self.extent();
        extent.x.max(extent.y)
    }
}

/// Geordnete 3D-Punktmenge. Der Index ist innerhalb einer Generation stabil.
#[derive(Debug, Clone)]
pub struct PointCloud {
    positions: Vec<Vec3>,
    /// RGB in 0..1, gleiche Länge wie `positions`
    colors: Option<Vec<Vec3>>,
    texture: Option<PathBuf>,
    generation: u64,
}

impl PointCloud {
    /// Erstellt eine Wolke ohne Farben.
    pub fn new(positions: Vec<Vec3>) -> Self {
        Self {
            positions,
            colors: None,
            texture: None,
            generation: next_generation(),
        }
    }

    /// Erstellt eine Wolke aus Positionen und optionalen Farben.
    pub fn from_parts(positions: Vec<Vec3>, colors: Option<Vec<Vec3>>) -> anyhow::Result<Self> {
        if let Some(colors) = &colors {
            anyhow::ensure!(
                colors.len() == positions.len(),
                "Farbanzahl {} passt nicht zur Punktanzahl {}",
                colors.len(),
                positions.len()
            );
        }
        Ok(Self {
            positions,
            colors,
            texture: None,
            generation: next_generation(),
        })
    }

    /// Setzt die Textur-Referenz.
    pub fn with_texture(mut self, texture: Option<PathBuf>) -> Self {
        self.texture = texture;
        self
    }

    /// Vergibt eine frische Generation (z.B. nach Undo).
    pub fn renewed(mut self) -> Self {
        self.generation = next_generation();
        self
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn colors(&self) -> Option<&[Vec3]> {
        self.colors.as_deref()
    }

    pub fn texture(&self) -> Option<&Path> {
        self.texture.as_deref()
    }

    /// Generation dieser Wolke; jede strukturelle Ersetzung erhöht sie.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Achsenparallele Bounding-Box, `None` bei leerer Wolke.
    pub fn bounds(&self) -> Option<Aabb> {
        let first = *self.positions.first()?;
        let (min, max) = self
            .positions
            .iter()
            .fold((first, first), |(min, max), p| (min.min(*p), max.max(*p)));
        Some(Aabb { min, max })
    }

    /// Kleinste Z-Koordinate.
    pub fn min_z(&self) -> Option<f32> {
        self.positions.iter().map(|p| p.z).min_by(f32::total_cmp)
    }

    /// Wendet eine Matrix auf alle Punkte an (Farben und Textur bleiben).
    pub fn transformed(&self, matrix: &Mat4) -> Self {
        Self {
            positions: self
                .positions
                .iter()
                .map(|p| matrix.transform_point3(*p))
                .collect(),
            colors: self.colors.clone(),
            texture: self.texture.clone(),
            generation: next_generation(),
        }
    }

    /// Behält alle Punkte mit `mask[i] == true`.
    pub fn retain_mask(&self, mask: &[bool]) -> Self {
        let keep = |i: &usize| mask.get(*i).copied().unwrap_or(false);
        let positions = (0..self.len())
            .filter(keep)
            .map(|i| self.positions[i])
            .collect();
        let colors = self
            .colors
            .as_ref()
            .map(|colors| (0..self.len()).filter(keep).map(|i| colors[i]).collect());
        Self {
            positions,
            colors,
            texture: self.texture.clone(),
            generation: next_generation(),
        }
    }

    /// Entfernt die angegebenen Indizes (Duplikate und Out-of-Range werden ignoriert).
    pub fn without_indices(&self, indices: &[usize]) -> Self {
        let mut mask = vec![true; self.len()];
        for &index in indices {
            if let Some(slot) = mask.get_mut(index) {
                *slot = false;
            }
        }
        self.retain_mask(&mask)
    }

    /// Positionen der angegebenen Indizes.
    pub fn positions_at(&self, indices: &[usize]) -> Vec<Vec3> {
        indices
            .iter()
            .filter_map(|&i| self.positions.get(i).copied())
            .collect()
    }

    /// Voxel-Downsampling: ein gemittelter Punkt (und Farbe) pro belegtem Voxel,
    /// in der Reihenfolge des ersten Auftretens.
    pub fn voxel_downsample(&self, voxel_size: f32) -> Self {
        if voxel_size <= 0.0 || !voxel_size.is_finite() {
            return self.clone().renewed();
        }

        let mut voxels: IndexMap<[i64; 3], (Vec3, Vec3, u32)> = IndexMap::new();
        for (i, p) in self.positions.iter().enumerate() {
            let key = [
                (p.x / voxel_size).floor() as i64,
                (p.y / voxel_size).floor() as i64,
                (p.z / voxel_size).floor() as i64,
            ];
            let color = self
                .colors
                .as_ref()
                .map(|colors| colors[i])
                .unwrap_or(Vec3::ZERO);
            let entry = voxels.entry(key).or_insert((Vec3::ZERO, Vec3::ZERO, 0));
            entry.0 += *p;
            entry.1 += color;
            entry.2 += 1;
        }

        let positions = voxels
            .values()
            .map(|(sum, _, count)| *sum / *count as f32)
            .collect();
        let colors = self.colors.as_ref().map(|_| {
            voxels
                .values()
                .map(|(_, sum, count)| *sum / *count as f32)
                .collect()
        });

        Self {
            positions,
            colors,
            texture: self.texture.clone(),
            generation: next_generation(),
        }
    }
}
