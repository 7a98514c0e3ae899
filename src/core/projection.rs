//! Projektion Welt ↔ Screen und Picking.
//!
//! Pixel-Koordinaten haben ihren Ursprung unten links, wie die
//! Eingabe-Events des Szenen-Managers.

use glam::{Mat4, Vec2, Vec3, Vec4};

/// Schutzwert gegen Division durch `w ≈ 0`.
pub const W_EPSILON: f32 = 1e-6;

/// Viewport-Größe in Pixeln.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Seitenverhältnis Breite / Höhe.
    pub fn aspect(&self) -> f32 {
        self.width / self.height.max(1.0)
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }
}

/// Projizierter Punkt: Pixelposition, NDC-Tiefe und Sichtbarkeit (`w > ε`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedPoint {
    pub screen: Vec2,
    pub depth: f32,
    pub valid: bool,
}

/// Herkunft eines Pick-Ergebnisses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickSource {
    /// Auf einen Quellpunkt eingerastet
    Snapped { index: usize },
    /// Kein Punkt in Toleranz: auf der Fokusebene rückprojiziert
    FocalPlane,
}

/// Ergebnis eines Picks. Picking gelingt immer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickResult {
    pub point: Vec3,
    pub source: PickSource,
}

/// Projektor für eine feste Kamera-Pose und Viewport-Größe.
#[derive(Debug, Clone, Copy)]
pub struct Projector {
    view_proj: Mat4,
    inverse: Mat4,
    viewport: Viewport,
}

impl Projector {
    pub fn new(view_proj: Mat4, viewport: Viewport) -> Self {
        Self {
            view_proj,
            inverse: view_proj.inverse(),
            viewport,
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Projiziert einen Weltpunkt in Pixel-Koordinaten.
    pub fn project_point(&self, point: Vec3) -> ProjectedPoint {
        let clip = self.view_proj * point.extend(1.0);
        let valid = clip.w > W_EPSILON;
        let w = if clip.w.abs() < W_EPSILON {
            W_EPSILON.copysign(clip.w)
        } else {
            clip.w
        };
        let ndc = clip.truncate() / w;

        ProjectedPoint {
            screen: self.ndc_to_screen(Vec2::new(ndc.x, ndc.y)),
            depth: ndc.z,
            valid,
        }
    }

    /// Projiziert alle Punkte in Eingabereihenfolge.
    pub fn project(&self, points: &[Vec3]) -> Vec<ProjectedPoint> {
        points.iter().map(|p| self.project_point(*p)).collect()
    }

    /// Rückprojektion einer Pixelposition bei gegebener NDC-Tiefe.
    pub fn unproject(&self, screen: Vec2, depth: f32) -> Option<Vec3> {
        let ndc = self.screen_to_ndc(screen);
        let world = self.inverse * Vec4::new(ndc.x, ndc.y, depth, 1.0);
        if world.w.abs() < W_EPSILON || !world.is_finite() {
            return None;
        }
        Some(world.truncate() / world.w)
    }

    /// Zweistufiges Picking: nächster projizierter Quellpunkt innerhalb
    /// `tolerance_px`, sonst Rückprojektion auf die Fokusebene durch `focal_point`.
    ///
    /// Bei gleichem Pixelabstand gewinnt der Punkt näher an der Kamera.
    pub fn pick(
        &self,
        screen: Vec2,
        tolerance_px: f32,
        points: &[Vec3],
        focal_point: Vec3,
    ) -> PickResult {
        let tolerance_sq = tolerance_px * tolerance_px;
        let mut best: Option<(usize, f32, f32)> = None;

        for (index, point) in points.iter().enumerate() {
            let projected = self.project_point(*point);
            if !projected.valid {
                continue;
            }
            let dist_sq = projected.screen.distance_squared(screen);
            if dist_sq > tolerance_sq {
                continue;
            }
            let better = match best {
                None => true,
                Some((_, best_dist, best_depth)) => {
                    dist_sq < best_dist || (dist_sq == best_dist && projected.depth < best_depth)
                }
            };
            if better {
                best = Some((index, dist_sq, projected.depth));
            }
        }

        if let Some((index, _, _)) = best {
            return PickResult {
                point: points[index],
                source: PickSource::Snapped { index },
            };
        }

        let focal_depth = self.project_point(focal_point).depth;
        let point = self.unproject(screen, focal_depth).unwrap_or(focal_point);
        PickResult {
            point,
            source: PickSource::FocalPlane,
        }
    }

    fn ndc_to_screen(&self, ndc: Vec2) -> Vec2 {
        (ndc + Vec2::ONE) * 0.5 * self.viewport.size()
    }

    fn screen_to_ndc(&self, screen: Vec2) -> Vec2 {
        screen / self.viewport.size().max(Vec2::ONE) * 2.0 - Vec2::ONE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::camera::{Camera3D, ProjectionMode};
    use approx::assert_relative_eq;

    fn projector_for(camera: &Camera3D) -> Projector {
        let viewport = Viewport::new(800.0, 600.0);
        Projector::new(camera.view_projection(viewport.aspect()), viewport)
    }

    #[test]
    fn target_lands_in_viewport_center() {
        let camera = Camera3D::default();
        let projected = projector_for(&camera).project_point(camera.target);

        assert!(projected.valid);
        assert_relative_eq!(projected.screen.x, 400.0, epsilon = 1e-3);
        assert_relative_eq!(projected.screen.y, 300.0, epsilon = 1e-3);
    }

    #[test]
    fn point_behind_camera_is_invalid() {
        let camera = Camera3D::default();
        let projected = projector_for(&camera).project_point(Vec3::new(0.0, 0.0, 20.0));
        assert!(!projected.valid);
    }

    #[test]
    fn unproject_inverts_project() {
        for mode in [ProjectionMode::Perspective, ProjectionMode::Orthographic] {
            let mut camera =
                Camera3D::looking_at(Vec3::new(3.0, -8.0, 6.0), Vec3::new(0.5, 0.2, 0.0), Vec3::Z);
            camera.projection = mode;
            let projector = projector_for(&camera);

            for point in [
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.5, -2.0, 0.7),
                Vec3::new(-3.0, 4.0, 1.2),
            ] {
                let projected = projector.project_point(point);
                assert!(projected.valid);
                let back = projector
                    .unproject(projected.screen, projected.depth)
                    .expect("Rückprojektion erwartet");
                assert_relative_eq!(back.x, point.x, epsilon = 5e-3);
                assert_relative_eq!(back.y, point.y, epsilon = 5e-3);
                assert_relative_eq!(back.z, point.z, epsilon = 5e-3);
            }
        }
    }

    #[test]
    fn pick_snaps_to_nearest_projected_point() {
        let camera = Camera3D::default();
        let projector = projector_for(&camera);
        let points = vec![Vec3::new(0.05, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0)];

        let result = projector.pick(Vec2::new(400.0, 300.0), 8.0, &points, camera.target);

        assert_eq!(result.source, PickSource::Snapped { index: 0 });
        assert_eq!(result.point, points[0]);
    }

    #[test]
    fn pick_prefers_point_nearer_to_camera_on_tie() {
        let camera = Camera3D::default();
        let projector = projector_for(&camera);
        // Beide Punkte liegen auf der Sichtachse
        let points = vec![Vec3::new(0.0, 0.0, -1.0), Vec3::new(0.0, 0.0, 2.0)];

        let result = projector.pick(Vec2::new(400.0, 300.0), 4.0, &points, camera.target);

        assert_eq!(result.source, PickSource::Snapped { index: 1 });
    }

    #[test]
    fn pick_falls_back_to_focal_plane() {
        let camera = Camera3D::default();
        let projector = projector_for(&camera);

        let result = projector.pick(Vec2::new(400.0, 300.0), 4.0, &[], camera.target);

        assert_eq!(result.source, PickSource::FocalPlane);
        assert_relative_eq!(result.point.x, 0.0, epsilon = 1e-3);
        assert_relative_eq!(result.point.y, 0.0, epsilon = 1e-3);
        assert_relative_eq!(result.point.z, 0.0, epsilon = 1e-3);
    }
}
