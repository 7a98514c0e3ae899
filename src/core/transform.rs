//! Starre Transformation (Rotation + Translation) als 4×4-Matrix.

use glam::{Mat3, Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Homogene 4×4-Matrix ohne Skalierung/Scherung.
///
/// Serialisiert zeilenweise (`[[f32; 4]; 4]`), damit die JSON-Datei
/// der üblichen mathematischen Schreibweise entspricht.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "[[f32; 4]; 4]", try_from = "[[f32; 4]; 4]")]
pub struct RigidTransform(Mat4);

impl RigidTransform {
    pub const IDENTITY: Self = Self(Mat4::IDENTITY);

    /// Toleranz für die Starrheitsprüfung.
    const RIGID_EPSILON: f32 = 1e-3;

    /// Reine Rotation.
    pub fn from_rotation(rotation: Mat3) -> Self {
        Self(Mat4::from_mat3(rotation))
    }

    /// Reine Translation.
    pub fn from_translation(translation: Vec3) -> Self {
        Self(Mat4::from_translation(translation))
    }

    /// Rotation um die Z-Achse (Bogenmaß, gegen den Uhrzeigersinn).
    pub fn rotation_z(angle: f32) -> Self {
        Self(Mat4::from_rotation_z(angle))
    }

    /// Übernimmt eine Matrix, sofern sie starr ist.
    pub fn from_matrix(matrix: Mat4) -> anyhow::Result<Self> {
        let transform = Self(matrix);
        anyhow::ensure!(
            transform.is_rigid(),
            "Matrix ist keine starre Transformation (Rotation + Translation)"
        );
        Ok(transform)
    }

    pub fn matrix(&self) -> Mat4 {
        self.0
    }

    /// Verkettet `next` nach `self`: Ergebnis = `next · self`.
    pub fn then(&self, next: &RigidTransform) -> Self {
        Self(next.0 * self.0)
    }

    /// Transformiert einen Punkt.
    pub fn apply(&self, point: Vec3) -> Vec3 {
        self.0.transform_point3(point)
    }

    /// Prüft Orthonormalität der Rotation und die letzte Zeile `(0,0,0,1)`.
    pub fn is_rigid(&self) -> bool {
        let m = self.0;
        let rotation = Mat3::from_mat4(m);
        let orthonormal = (rotation.transpose() * rotation)
            .abs_diff_eq(Mat3::IDENTITY, Self::RIGID_EPSILON);
        let proper = (rotation.determinant() - 1.0).abs() < Self::RIGID_EPSILON;
        let last_row = m.row(3).abs_diff_eq(glam::Vec4::W, Self::RIGID_EPSILON);
        orthonormal && proper && last_row && m.is_finite()
    }

    /// Vergleicht elementweise mit Toleranz.
    pub fn abs_diff_eq(&self, other: &RigidTransform, max_abs_diff: f32) -> bool {
        self.0.abs_diff_eq(other.0, max_abs_diff)
    }

    /// Zeilenweise Darstellung.
    pub fn to_rows(&self) -> [[f32; 4]; 4] {
        let t = self.0.transpose();
        t.to_cols_array_2d()
    }

    /// Liest eine Transformation aus JSON (zeilenweise 4×4).
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Schreibt die Transformation als JSON (zeilenweise 4×4).
    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl From<RigidTransform> for [[f32; 4]; 4] {
    fn from(value: RigidTransform) -> Self {
        value.to_rows()
    }
}

impl TryFrom<[[f32; 4]; 4]> for RigidTransform {
    type Error = anyhow::Error;

    fn try_from(rows: [[f32; 4]; 4]) -> Result<Self, Self::Error> {
        Self::from_matrix(Mat4::from_cols_array_2d(&rows).transpose())
    }
}
