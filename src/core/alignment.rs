//! Reine Geometrie der Kalibrierung: Bodennormale, Ausrichtung auf +Z, Nordwinkel.

use glam::{Mat3, Quat, Vec3};

use crate::error::ScanError;

/// Mindestlänge für Kreuzprodukte und Richtungsvektoren.
pub const DEGENERATE_EPSILON: f32 = 1e-6;

/// Normale der Ebene durch drei Punkte, in die +Z-Hemisphäre orientiert.
pub fn ground_normal_from_points(p0: Vec3, p1: Vec3, p2: Vec3) -> Result<Vec3, ScanError> {
    let cross = (p1 - p0).cross(p2 - p0);
    if cross.length() < DEGENERATE_EPSILON {
        return Err(ScanError::input(
            "Die drei Bodenpunkte liegen auf einer Linie, bitte erneut wählen",
        ));
    }
    Ok(orient_up(cross.normalize()))
}

/// Dreht eine Normale in die obere Hemisphäre.
pub fn orient_up(normal: Vec3) -> Vec3 {
    if normal.z < 0.0 {
        -normal
    } else {
        normal
    }
}

/// Rotation, die `normal` auf +Z abbildet.
///
/// Bereits ausgerichtete Normalen liefern die Identität, antiparallele
/// eine 180°-Drehung um eine beliebige Senkrechte.
pub fn rotation_to_z(normal: Vec3) -> Result<Mat3, ScanError> {
    let n = normal.try_normalize().ok_or_else(|| {
        ScanError::input("Bodennormale ist degeneriert (Länge 0)")
    })?;

    let axis = n.cross(Vec3::Z);
    if axis.length() < DEGENERATE_EPSILON {
        if n.z > 0.0 {
            return Ok(Mat3::IDENTITY);
        }
        let flip_axis = n.any_orthonormal_vector();
        return Ok(Mat3::from_quat(Quat::from_axis_angle(
            flip_axis,
            std::f32::consts::PI,
        )));
    }

    let angle = n.dot(Vec3::Z).clamp(-1.0, 1.0).acos();
    Ok(Mat3::from_quat(Quat::from_axis_angle(axis.normalize(), angle)))
}

/// Vorzeichenbehafteter Winkel der XY-Projektion von `p1 → p2` zur +Y-Achse.
///
/// Eine Drehung um Z mit diesem Winkel legt die Richtung auf +Y.
pub fn north_angle(p1: Vec3, p2: Vec3) -> Result<f32, ScanError> {
    let direction = (p2 - p1).truncate();
    if direction.length() < DEGENERATE_EPSILON {
        return Err(ScanError::input(
            "Nordrichtung zu kurz, bitte zwei unterschiedliche Punkte wählen",
        ));
    }
    Ok(direction.x.atan2(direction.y))
}
