//! 3D-Orbitkamera mit Perspektive/Orthografie, Ansichts-Presets und Pan.

use glam::{Mat4, Vec2, Vec3};

use super::point_cloud::Aabb;

/// Projektionsart der Kamera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProjectionMode {
    #[default]
    Perspective,
    Orthographic,
}

/// Vordefinierte Blickrichtungen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewPreset {
    /// Von oben (+Z) auf die XY-Ebene
    Top,
    /// Von vorne (-Y)
    Front,
    /// Von der Seite (+X)
    Side,
}

/// 3D-Kamera. Der Fokuspunkt (`target`) definiert die Fokusebene für Picks.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera3D {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertikaler Öffnungswinkel in Grad
    pub fov_y_deg: f32,
    pub near: f32,
    pub far: f32,
    pub projection: ProjectionMode,
    /// Halbe sichtbare Höhe in Welteinheiten (nur orthografisch)
    pub parallel_scale: f32,
}

impl Camera3D {
    /// Standard-Öffnungswinkel.
    pub const DEFAULT_FOV_Y_DEG: f32 = 30.0;
    /// Pan-Skalierung: Welteinheiten pro Pixel = Abstand / PAN_DIVISOR.
    pub const PAN_DIVISOR: f32 = 800.0;
    /// Abstand beim Einpassen relativ zur Raumdiagonale.
    const FIT_DISTANCE_FACTOR: f32 = 2.0;

    /// Kamera, die aus `eye` auf `target` blickt.
    pub fn looking_at(eye: Vec3, target: Vec3, up: Vec3) -> Self {
        Self {
            eye,
            target,
            up,
            fov_y_deg: Self::DEFAULT_FOV_Y_DEG,
            near: 0.1,
            far: 5_000.0,
            projection: ProjectionMode::Perspective,
            parallel_scale: 10.0,
        }
    }

    /// Abstand zwischen Auge und Fokuspunkt.
    pub fn distance(&self) -> f32 {
        self.eye.distance(self.target)
    }

    /// Normierte Blickrichtung.
    pub fn forward(&self) -> Vec3 {
        (self.target - self.eye).normalize_or(-Vec3::Z)
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        let aspect = if aspect.is_finite() && aspect > 0.0 {
            aspect
        } else {
            1.0
        };
        match self.projection {
            ProjectionMode::Perspective => Mat4::perspective_rh_gl(
                self.fov_y_deg.to_radians(),
                aspect,
                self.near,
                self.far,
            ),
            ProjectionMode::Orthographic => {
                let h = self.parallel_scale;
                let w = h * aspect;
                Mat4::orthographic_rh_gl(-w, w, -h, h, self.near, self.far)
            }
        }
    }

    /// Zusammengesetzte View-Projection-Matrix.
    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        self.projection_matrix(aspect) * self.view_matrix()
    }

    /// Verschiebt Auge und Fokus in der Bildebene um `delta` Pixel.
    ///
    /// Ein Drag nach rechts schiebt die Szene nach rechts, die Kamera also nach links.
    pub fn pan_by_pixels(&mut self, delta: Vec2) {
        let forward = self.forward();
        let right = forward.cross(self.up).normalize_or(Vec3::X);
        let up = right.cross(forward);
        let scale = self.distance() / Self::PAN_DIVISOR;
        let offset = (-right * delta.x - up * delta.y) * scale;
        self.eye += offset;
        self.target += offset;
    }

    /// Setzt eine Preset-Blickrichtung unter Beibehaltung von Fokus und Abstand.
    pub fn apply_preset(&mut self, preset: ViewPreset) {
        let distance = self.distance().max(f32::EPSILON);
        let (direction, up) = match preset {
            ViewPreset::Top => (Vec3::Z, Vec3::Y),
            ViewPreset::Front => (-Vec3::Y, Vec3::Z),
            ViewPreset::Side => (Vec3::X, Vec3::Z),
        };
        self.eye = self.target + direction * distance;
        self.up = up;
    }

    /// Richtet die Kamera von oben auf die Bounding-Box aus.
    pub fn fit_bounds(&mut self, bounds: &Aabb) {
        let radius = (bounds.diagonal() * 0.5).max(1.0);
        self.target = bounds.center();
        self.parallel_scale = radius;
        self.eye = self.target + Vec3::Z * radius * Self::FIT_DISTANCE_FACTOR * 2.0;
        self.up = Vec3::Y;
        self.far = (radius * 20.0).max(self.far);
    }
}

impl Default for Camera3D {
    fn default() -> Self {
        Self::looking_at(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, Vec3::Y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_target_projects_to_center() {
        let camera = Camera3D::default();
        let clip = camera.view_projection(1.5) * camera.target.extend(1.0);

        assert_relative_eq!(clip.x / clip.w, 0.0, epsilon = 1e-6);
        assert_relative_eq!(clip.y / clip.w, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_pan_moves_eye_and_target_together() {
        let mut camera = Camera3D::default();
        camera.pan_by_pixels(Vec2::new(80.0, 0.0));

        // Abstand 10 → 10/800 Welteinheiten pro Pixel
        assert_relative_eq!(camera.target.x, -1.0, epsilon = 1e-5);
        assert_relative_eq!(camera.eye.x, -1.0, epsilon = 1e-5);
        assert_relative_eq!(camera.distance(), 10.0, epsilon = 1e-5);
    }

    #[test]
    fn test_presets_keep_distance() {
        let mut camera = Camera3D::default();
        camera.apply_preset(ViewPreset::Side);

        assert_relative_eq!(camera.eye.x, 10.0, epsilon = 1e-5);
        assert_eq!(camera.up, Vec3::Z);
    }

    #[test]
    fn test_fit_bounds_centers_on_box() {
        let mut camera = Camera3D::default();
        camera.fit_bounds(&Aabb {
            min: Vec3::new(-2.0, -2.0, 0.0),
            max: Vec3::new(2.0, 6.0, 1.0),
        });

        assert_eq!(camera.target, Vec3::new(0.0, 2.0, 0.5));
        assert!(camera.eye.z > camera.target.z);
    }
}
