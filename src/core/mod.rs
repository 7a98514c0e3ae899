//! Core-Geometrie: Punktwolke, Transformationen, Kamera, Projektion, Spatial-Index.

pub mod alignment;
pub mod camera;
pub mod oriented_box;
pub mod plane_fit;
pub mod point_cloud;
pub mod polygon;
pub mod projection;
pub mod proximity;
pub mod spatial;
pub mod transform;

pub use alignment::{ground_normal_from_points, north_angle, orient_up, rotation_to_z};
pub use camera::{Camera3D, ProjectionMode, ViewPreset};
pub use oriented_box::OrientedBox;
pub use plane_fit::{fit_plane, fit_plane_seeded, PlaneFit};
pub use point_cloud::{Aabb, PointCloud};
pub use polygon::ScreenPolygon;
pub use projection::{PickResult, PickSource, ProjectedPoint, Projector, Viewport};
pub use proximity::ProximityMask;
pub use spatial::{SpatialIndex, SpatialMatch};
pub use transform::RigidTransform;
