//! Screen-Space-Polygon für Lasso-Tests (Rand ausgeschlossen).

use glam::Vec2;

/// Geschlossenes Polygon in Pixel-Koordinaten mit vorberechneter Bounding-Box.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenPolygon {
    vertices: Vec<Vec2>,
    min: Vec2,
    max: Vec2,
}

impl ScreenPolygon {
    /// Toleranz für die Randerkennung in Pixeln.
    const EDGE_EPSILON: f32 = 1e-4;

    pub fn new(vertices: Vec<Vec2>) -> Self {
        let (min, max) = vertices.iter().fold(
            (Vec2::splat(f32::INFINITY), Vec2::splat(f32::NEG_INFINITY)),
            |(min, max), v| (min.min(*v), max.max(*v)),
        );
        Self { vertices, min, max }
    }

    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices
    }

    /// Ein Polygon braucht mindestens drei Ecken, um Fläche einzuschließen.
    pub fn is_closed_area(&self) -> bool {
        self.vertices.len() >= 3
    }

    /// Prüft, ob `point` strikt im Inneren liegt. Punkte auf dem Rand zählen nicht.
    pub fn contains(&self, point: Vec2) -> bool {
        if !self.is_closed_area() {
            return false;
        }
        if point.x < self.min.x
            || point.x > self.max.x
            || point.y < self.min.y
            || point.y > self.max.y
        {
            return false;
        }

        let mut inside = false;
        let mut previous = self.vertices[self.vertices.len() - 1];

        for &current in &self.vertices {
            if point_on_segment(point, previous, current) {
                return false;
            }

            let crosses = (current.y > point.y) != (previous.y > point.y);
            if crosses {
                let x_at = (previous.x - current.x) * (point.y - current.y)
                    / (previous.y - current.y)
                    + current.x;
                if point.x < x_at {
                    inside = !inside;
                }
            }

            previous = current;
        }

        inside
    }
}

/// Prüft ob ein Punkt auf einem Liniensegment liegt.
fn point_on_segment(point: Vec2, a: Vec2, b: Vec2) -> bool {
    let ab = b - a;
    let ap = point - a;
    if ab.perp_dot(ap).abs() > ScreenPolygon::EDGE_EPSILON * ab.length().max(1.0) {
        return false;
    }

    let dot = ap.dot(ab);
    dot >= 0.0 && dot <= ab.length_squared()
}
