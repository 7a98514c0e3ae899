//! RANSAC-Ebenenfit für die automatische Bodenerkennung.

use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Fester Seed, damit wiederholte Läufe dieselbe Ebene liefern.
pub const DEFAULT_SEED: u64 = 0x5CA7_2024;

/// Gefundene Ebene `normal · p = offset` samt Inlier-Indizes.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaneFit {
    /// Einheitsnormale (Orientierung nicht festgelegt)
    pub normal: Vec3,
    pub offset: f32,
    /// Indizes der Punkte mit Abstand ≤ Schwellwert, aufsteigend
    pub inliers: Vec<usize>,
}

/// RANSAC mit festem Seed.
///
/// Liefert `None`, wenn weniger als drei Punkte vorliegen oder jede
/// Stichprobe degeneriert war.
pub fn fit_plane(points: &[Vec3], distance_threshold: f32, iterations: usize) -> Option<PlaneFit> {
    fit_plane_seeded(points, distance_threshold, iterations, DEFAULT_SEED)
}

/// RANSAC mit explizitem Seed.
pub fn fit_plane_seeded(
    points: &[Vec3],
    distance_threshold: f32,
    iterations: usize,
    seed: u64,
) -> Option<PlaneFit> {
    if points.len() < 3 {
        return None;
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut best: Option<(Vec3, f32, usize)> = None;

    for _ in 0..iterations.max(1) {
        let a = rng.random_range(0..points.len());
        let b = rng.random_range(0..points.len());
        let c = rng.random_range(0..points.len());
        if a == b || b == c || a == c {
            continue;
        }

        let Some(normal) = (points[b] - points[a])
            .cross(points[c] - points[a])
            .try_normalize()
        else {
            continue;
        };
        let offset = normal.dot(points[a]);

        let count = points
            .iter()
            .filter(|p| (normal.dot(**p) - offset).abs() <= distance_threshold)
            .count();

        if best.map_or(true, |(_, _, best_count)| count > best_count) {
            best = Some((normal, offset, count));
        }
    }

    let (normal, offset, _) = best?;
    let inliers = points
        .iter()
        .enumerate()
        .filter(|(_, p)| (normal.dot(**p) - offset).abs() <= distance_threshold)
        .map(|(i, _)| i)
        .collect();

    log::debug!("Ebenenfit: Normale {:?}, Offset {:.3}", normal, offset);

    Some(PlaneFit {
        normal,
        offset,
        inliers,
    })
}
