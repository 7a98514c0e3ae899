//! Spatial-Index (KD-Tree) für Nächster-Nachbar-Abfragen über 3D-Punkte.

use glam::Vec3;
use indexmap::IndexMap;
use kiddo::{KdTree, SquaredEuclidean};

/// Ergebnis einer Distanzabfrage gegen den Spatial-Index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialMatch {
    /// Index des Punktes in der indexierten Menge
    pub index: usize,
    /// Euklidische Distanz zum Suchpunkt
    pub distance: f64,
}

/// Read-only Spatial-Index über einer Punktmenge.
///
/// Distanzen werden in `f64` berechnet, damit Schwellwert-Vergleiche
/// am Rand nicht durch `f32`-Rundung kippen.
///
/// Identische Positionen landen nur einmal im Baum; kiddo kann einen Bucket
/// mit mehr als `B` gleichen Punkten nicht teilen.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    tree: KdTree<f64, 3>,
    /// Ursprungsindizes je Baumeintrag, der erste ist der Repräsentant
    members: Vec<Vec<usize>>,
    len: usize,
}

impl SpatialIndex {
    /// Erstellt einen leeren Spatial-Index.
    pub fn empty() -> Self {
        Self {
            tree: (&Vec::<[f64; 3]>::new()).into(),
            members: Vec::new(),
            len: 0,
        }
    }

    /// Baut einen neuen Index; Treffer liefern Indizes in `points`.
    pub fn from_points(points: &[Vec3]) -> Self {
        let mut unique: IndexMap<[u64; 3], Vec<usize>> = IndexMap::new();
        for (index, point) in points.iter().enumerate() {
            unique.entry(position_key(*point)).or_default().push(index);
        }

        let entries: Vec<[f64; 3]> = unique
            .values()
            .map(|members| to_query(points[members[0]]))
            .collect();
        let tree: KdTree<f64, 3> = (&entries).into();

        if entries.len() < points.len() {
            log::debug!(
                "Spatial-Index: {} Duplikate zusammengefasst ({} eindeutige Positionen)",
                points.len() - entries.len(),
                entries.len()
            );
        }

        Self {
            tree,
            members: unique.into_values().collect(),
            len: points.len(),
        }
    }

    /// Gibt die Anzahl indexierter Punkte zurück.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Gibt `true` zurück, wenn keine Punkte im Index liegen.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Findet den nächsten Punkt zur Query-Position.
    pub fn nearest(&self, query: Vec3) -> Option<SpatialMatch> {
        if self.is_empty() {
            return None;
        }

        let result = self.tree.nearest_one::<SquaredEuclidean>(&to_query(query));
        Some(SpatialMatch {
            index: self.members[result.item as usize][0],
            distance: result.distance.sqrt(),
        })
    }

    /// Quadrierte Distanz zum nächsten Punkt (`None` bei leerem Index).
    pub fn nearest_distance_squared(&self, query: Vec3) -> Option<f64> {
        if self.is_empty() {
            return None;
        }
        Some(
            self.tree
                .nearest_one::<SquaredEuclidean>(&to_query(query))
                .distance,
        )
    }

    /// Distanz zum nächsten Punkt (`None` bei leerem Index).
    pub fn nearest_distance(&self, query: Vec3) -> Option<f64> {
        self.nearest_distance_squared(query).map(f64::sqrt)
    }

    /// Findet alle Punkte innerhalb eines Radius, aufsteigend nach Distanz.
    pub fn within_radius(&self, query: Vec3, radius: f32) -> Vec<SpatialMatch> {
        if self.is_empty() || radius.is_sign_negative() {
            return Vec::new();
        }

        let radius = radius as f64;
        let mut results = self
            .tree
            .within::<SquaredEuclidean>(&to_query(query), radius * radius)
            .into_iter()
            .flat_map(|entry| {
                let distance = entry.distance.sqrt();
                self.members[entry.item as usize]
                    .iter()
                    .map(move |&index| SpatialMatch { index, distance })
            })
            .collect::<Vec<_>>();

        results.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        results
    }
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::empty()
    }
}

fn to_query(p: Vec3) -> [f64; 3] {
    [p.x as f64, p.y as f64, p.z as f64]
}

/// Bitmuster als Schlüssel; `+ 0.0` legt `-0.0` und `0.0` zusammen.
fn position_key(p: Vec3) -> [u64; 3] {
    to_query(p).map(|v| (v + 0.0).to_bits())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn jittered_grid(n: usize) -> Vec<Vec3> {
        (0..n * n)
            .map(|i| {
                let column = (i % n) as f32;
                let row = (i / n) as f32;
                Vec3::new(column + row * 0.001, row + column * 0.001, i as f32 * 1e-4)
            })
            .collect()
    }

    #[test]
    fn test_empty_index_returns_nothing() {
        let index = SpatialIndex::empty();
        assert!(index.nearest(Vec3::ZERO).is_none());
        assert!(index.nearest_distance(Vec3::ZERO).is_none());
        assert!(index.within_radius(Vec3::ZERO, 1.0).is_empty());
    }

    #[test]
    fn test_nearest_finds_closest_point() {
        let points = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(5.0, 0.0, 1.0),
            Vec3::new(0.0, 5.0, 2.0),
        ];
        let index = SpatialIndex::from_points(&points);

        let hit = index.nearest(Vec3::new(4.0, 0.0, 1.0)).expect("Treffer erwartet");
        assert_eq!(hit.index, 1);
        assert_relative_eq!(hit.distance, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_within_radius_is_sorted() {
        let points = jittered_grid(20);
        let index = SpatialIndex::from_points(&points);

        let hits = index.within_radius(Vec3::new(10.0, 10.0, 0.0), 1.5);
        assert!(!hits.is_empty());
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
        assert!(hits.iter().all(|m| m.distance <= 1.5));
    }

    #[test]
    fn test_identical_points_share_one_entry() {
        let mut points = vec![Vec3::new(1.0, 2.0, 3.0); 64];
        points.push(Vec3::new(4.0, 2.0, 3.0));
        let index = SpatialIndex::from_points(&points);

        assert_eq!(index.len(), 65);
        let hit = index
            .nearest(Vec3::new(1.1, 2.0, 3.0))
            .expect("Treffer erwartet");
        assert_eq!(hit.index, 0);
        assert_relative_eq!(hit.distance, 0.1, epsilon = 1e-6);

        let hits = index.within_radius(Vec3::new(1.0, 2.0, 3.0), 0.5);
        assert_eq!(hits.len(), 64);
        let mut indices: Vec<usize> = hits.iter().map(|m| m.index).collect();
        indices.sort_unstable();
        assert_eq!(indices, (0..64).collect::<Vec<_>>());
    }

    #[test]
    fn test_signed_zero_counts_as_same_position() {
        let index = SpatialIndex::from_points(&[Vec3::ZERO, Vec3::new(-0.0, 0.0, -0.0)]);
        assert_eq!(index.within_radius(Vec3::ZERO, 0.1).len(), 2);
    }
}
