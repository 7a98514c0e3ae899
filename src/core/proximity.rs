//! Proximity-Maske: überträgt Vorschau-Edits auf die Rohdaten.
//!
//! Ein Rohpunkt bleibt erhalten, wenn sein nächster Nachbar in der
//! bearbeiteten Vorschau höchstens `threshold` entfernt ist (inklusiv).

use glam::Vec3;

use super::point_cloud::PointCloud;
use super::spatial::SpatialIndex;

/// Statische Maske über einer bearbeiteten Vorschau-Wolke.
#[derive(Debug, Clone)]
pub struct ProximityMask {
    index: SpatialIndex,
    threshold: f32,
}

impl ProximityMask {
    /// Baut den Index über den Vorschau-Punkten.
    pub fn new(preview: &[Vec3], threshold: f32) -> Self {
        Self {
            index: SpatialIndex::from_points(preview),
            threshold,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// `true`, wenn die Vorschau leer ist und daher nichts behalten würde.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Prüft einen einzelnen Rohpunkt.
    pub fn retains(&self, point: Vec3) -> bool {
        let threshold = self.threshold as f64;
        self.index
            .nearest_distance_squared(point)
            .is_some_and(|d2| d2 <= threshold * threshold)
    }

    /// Maske über alle Rohpunkte in Eingabereihenfolge.
    pub fn retain_mask(&self, raw: &[Vec3]) -> Vec<bool> {
        raw.iter().map(|p| self.retains(*p)).collect()
    }

    /// Neue Wolke mit allen behaltenen Rohpunkten.
    pub fn apply(&self, raw: &PointCloud) -> PointCloud {
        let mask = self.retain_mask(raw.positions());
        let kept = raw.retain_mask(&mask);
        log::info!(
            "Proximity-Maske: {} von {} Punkten behalten (Schwelle {})",
            kept.len(),
            raw.len(),
            self.threshold
        );
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_is_inclusive() {
        let mask = ProximityMask::new(&[Vec3::ZERO], 0.15);
        let eps = 1e-4;

        assert!(mask.retains(Vec3::new(0.15 - eps, 0.0, 0.0)));
        assert!(!mask.retains(Vec3::new(0.15 + eps, 0.0, 0.0)));
        assert!(mask.retains(Vec3::new(0.15, 0.0, 0.0)));
    }

    #[test]
    fn boundary_holds_off_axis() {
        let mask = ProximityMask::new(&[Vec3::new(1.0, 2.0, 3.0)], 0.5);
        assert!(mask.retains(Vec3::new(1.0, 2.5, 3.0)));
        assert!(mask.retains(Vec3::new(1.0, 2.0, 2.5)));
    }

    #[test]
    fn empty_preview_keeps_nothing() {
        let mask = ProximityMask::new(&[], 0.15);
        assert!(mask.is_empty());
        assert!(!mask.retains(Vec3::ZERO));
    }

    #[test]
    fn apply_filters_raw_cloud() {
        let preview = vec![Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0)];
        let raw = PointCloud::new(vec![
            Vec3::new(0.1, 0.0, 0.0),
            Vec3::new(5.0, 0.0, 0.0),
            Vec3::new(10.0, 0.05, 0.0),
        ]);

        let kept = ProximityMask::new(&preview, 0.15).apply(&raw);

        assert_eq!(
            kept.positions(),
            &[Vec3::new(0.1, 0.0, 0.0), Vec3::new(10.0, 0.05, 0.0)]
        );
    }

    #[test]
    fn repeated_preview_points_build_a_mask() {
        let preview = vec![Vec3::new(1.0, 2.0, 3.0); 64];
        let mask = ProximityMask::new(&preview, 0.15);

        assert!(!mask.is_empty());
        assert!(mask.retains(Vec3::new(1.1, 2.0, 3.0)));
        assert!(!mask.retains(Vec3::new(1.2, 2.0, 3.0)));
    }
}
