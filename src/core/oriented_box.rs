//! Orientierte Bounding-Box (PCA) als Zuschnittbereich.

use glam::{DMat3, DVec3, Vec3};

/// Box mit Mittelpunkt, orthonormalen Achsen und halben Kantenlängen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientedBox {
    pub center: Vec3,
    /// Rechtshändiges Achsensystem
    pub axes: [Vec3; 3],
    pub half_extents: Vec3,
}

impl OrientedBox {
    /// Toleranz für `contains` an den Flächen.
    const CONTAINS_EPSILON: f32 = 1e-5;

    /// PCA-orientierte Box um die Punkte; `None` bei leerer Eingabe.
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }

        let n = points.len() as f64;
        let mean = points
            .iter()
            .fold(DVec3::ZERO, |acc, p| acc + p.as_dvec3())
            / n;

        let mut cov = [[0.0f64; 3]; 3];
        for p in points {
            let d = p.as_dvec3() - mean;
            let d = d.to_array();
            for (r, row) in cov.iter_mut().enumerate() {
                for (c, value) in row.iter_mut().enumerate() {
                    *value += d[r] * d[c] / n;
                }
            }
        }

        let eigen = symmetric_eigenvectors(cov);
        let x = eigen.x_axis.normalize_or(DVec3::X);
        let y = (eigen.y_axis - x * eigen.y_axis.dot(x)).normalize_or(x.any_orthonormal_vector());
        let z = x.cross(y);
        let axes = [x, y, z];

        let mut min = DVec3::splat(f64::INFINITY);
        let mut max = DVec3::splat(f64::NEG_INFINITY);
        for p in points {
            let d = p.as_dvec3() - mean;
            let local = DVec3::new(d.dot(axes[0]), d.dot(axes[1]), d.dot(axes[2]));
            min = min.min(local);
            max = max.max(local);
        }

        let mid = (min + max) * 0.5;
        let center = mean + axes[0] * mid.x + axes[1] * mid.y + axes[2] * mid.z;

        Some(Self {
            center: center.as_vec3(),
            axes: axes.map(|a| a.as_vec3()),
            half_extents: ((max - min) * 0.5).as_vec3(),
        })
    }

    /// Box mit skalierten Kantenlängen (gleiches Zentrum, gleiche Achsen).
    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            half_extents: self.half_extents * factor,
            ..*self
        }
    }

    /// Prüft, ob `point` in der Box liegt (Flächen inklusive).
    pub fn contains(&self, point: Vec3) -> bool {
        let d = point - self.center;
        self.axes
            .iter()
            .zip(self.half_extents.to_array())
            .all(|(axis, half)| d.dot(*axis).abs() <= half + Self::CONTAINS_EPSILON)
    }

    /// Maske über alle Punkte.
    pub fn contains_mask(&self, points: &[Vec3]) -> Vec<bool> {
        points.iter().map(|p| self.contains(*p)).collect()
    }
}

/// Eigenvektoren einer symmetrischen 3×3-Matrix (zyklisches Jacobi-Verfahren),
/// als Spalten nach absteigendem Eigenwert sortiert.
fn symmetric_eigenvectors(matrix: [[f64; 3]; 3]) -> DMat3 {
    let mut a = matrix;
    let mut v = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

    for _ in 0..50 {
        let off = a[0][1].powi(2) + a[0][2].powi(2) + a[1][2].powi(2);
        if off < 1e-24 {
            break;
        }

        for (p, q) in [(0, 1), (0, 2), (1, 2)] {
            let apq = a[p][q];
            if apq.abs() < 1e-30 {
                continue;
            }
            let theta = (a[q][q] - a[p][p]) / (2.0 * apq);
            let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
            let c = 1.0 / (t * t + 1.0).sqrt();
            let s = t * c;

            a[p][p] -= t * apq;
            a[q][q] += t * apq;
            a[p][q] = 0.0;
            a[q][p] = 0.0;

            let r = 3 - p - q;
            let arp = a[r][p];
            let arq = a[r][q];
            a[r][p] = c * arp - s * arq;
            a[p][r] = a[r][p];
            a[r][q] = s * arp + c * arq;
            a[q][r] = a[r][q];

            for row in v.iter_mut() {
                let vp = row[p];
                let vq = row[q];
                row[p] = c * vp - s * vq;
                row[q] = s * vp + c * vq;
            }
        }
    }

    let mut order = [0usize, 1, 2];
    order.sort_by(|&i, &j| a[j][j].total_cmp(&a[i][i]));
    let column = |k: usize| DVec3::new(v[0][k], v[1][k], v[2][k]);

    DMat3::from_cols(column(order[0]), column(order[1]), column(order[2]))
}
