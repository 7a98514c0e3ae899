//! Vertrag zum 3D-Szenen-Manager und eine In-Memory-Implementierung.
//!
//! Die Werkbank rendert nicht selbst: Sie legt Primitive mit stabilen Handles
//! an, färbt sie um und entfernt sie wieder. Jedes Primitiv trägt eine
//! feste Rolle, nach der das Umfärben dispatcht wird.

use glam::{Mat4, Vec2, Vec3};
use indexmap::IndexMap;

use crate::core::{Camera3D, PointCloud, Projector, Viewport};

/// RGBA-Farbe in 0..1.
pub type Rgba = [f32; 4];

/// Stabiler Handle eines Szene-Primitivs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrimitiveHandle(u64);

impl PrimitiveHandle {
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Rolle eines Primitivs, bei der Erzeugung festgelegt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderRole {
    /// Endpunkte von Messungen und Picks (feste Farbe)
    EndpointMarker,
    /// Verbindende Geometrie (Linien, Pfeile)
    PathGeometry,
    /// Textbeschriftung
    Label,
    /// Hilfsgeometrie (Gitter, Nordpfeil, Lasso-Spur, Selektion)
    Guide,
}

/// Geometrie eines Szene-Primitivs.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Points { positions: Vec<Vec3>, size_px: f32 },
    Polyline { positions: Vec<Vec3>, dashed: bool },
    Arrow { start: Vec3, end: Vec3 },
    Label { position: Vec3, text: String },
    /// Quadratisches Gitter in der Ebene z = center.z
    Grid { center: Vec3, size: f32, resolution: u32 },
    /// Lasso-Spur in Pixel-Koordinaten (nicht transformierbar)
    ScreenTrace { vertices: Vec<Vec2> },
}

impl Primitive {
    /// Wendet eine Matrix auf alle Weltkoordinaten an.
    pub fn transform(&mut self, matrix: &Mat4) {
        match self {
            Primitive::Points { positions, .. } | Primitive::Polyline { positions, .. } => {
                for p in positions.iter_mut() {
                    *p = matrix.transform_point3(*p);
                }
            }
            Primitive::Arrow { start, end } => {
                *start = matrix.transform_point3(*start);
                *end = matrix.transform_point3(*end);
            }
            Primitive::Label { position, .. } => *position = matrix.transform_point3(*position),
            Primitive::Grid { center, .. } => *center = matrix.transform_point3(*center),
            Primitive::ScreenTrace { .. } => {}
        }
    }
}

/// Schnittstelle zum 3D-Szenen-Manager.
pub trait SceneManager {
    fn camera(&self) -> &Camera3D;
    fn set_camera(&mut self, camera: Camera3D);
    fn viewport(&self) -> Viewport;

    /// Zusammengesetzte View-Projection-Matrix der aktuellen Kamera.
    fn view_projection(&self) -> Mat4 {
        self.camera().view_projection(self.viewport().aspect())
    }

    /// Projektor für die aktuelle Kamera-Pose.
    fn projector(&self) -> Projector {
        Projector::new(self.view_projection(), self.viewport())
    }

    fn add_primitive(&mut self, primitive: Primitive, role: RenderRole, color: Rgba)
        -> PrimitiveHandle;
    fn remove_primitive(&mut self, handle: PrimitiveHandle);
    fn set_color(&mut self, handle: PrimitiveHandle, color: Rgba);
    /// Zeichnet ein Primitiv unabhängig vom Tiefentest über der Wolke.
    fn set_on_top(&mut self, handle: PrimitiveHandle, on_top: bool);
    fn transform_primitive(&mut self, handle: PrimitiveHandle, matrix: &Mat4);
    /// Ersetzt die dargestellte Punktwolke (`None` = leere Szene).
    fn show_cloud(&mut self, cloud: Option<&PointCloud>);
}

/// Eintrag der In-Memory-Szene.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneEntry {
    pub primitive: Primitive,
    pub role: RenderRole,
    pub color: Rgba,
    /// X-Ray: ohne Tiefentest gezeichnet
    pub on_top: bool,
}

/// Szenen-Manager ohne Rendering: hält Kamera, Viewport und Primitive im Speicher.
/// Genutzt von der CLI und den Tests.
#[derive(Debug, Clone)]
pub struct HeadlessScene {
    camera: Camera3D,
    viewport: Viewport,
    entries: IndexMap<PrimitiveHandle, SceneEntry>,
    next_handle: u64,
    cloud_generation: Option<u64>,
    cloud_len: usize,
}

impl HeadlessScene {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            camera: Camera3D::default(),
            viewport,
            entries: IndexMap::new(),
            next_handle: 1,
            cloud_generation: None,
            cloud_len: 0,
        }
    }

    pub fn entry(&self, handle: PrimitiveHandle) -> Option<&SceneEntry> {
        self.entries.get(&handle)
    }

    /// Alle Primitive in Erzeugungsreihenfolge.
    pub fn entries(&self) -> impl Iterator<Item = (PrimitiveHandle, &SceneEntry)> {
        self.entries.iter().map(|(h, e)| (*h, e))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Anzahl der Primitive einer Rolle.
    pub fn count_role(&self, role: RenderRole) -> usize {
        self.entries.values().filter(|e| e.role == role).count()
    }

    /// Anzahl der Primitive, die über der Wolke gezeichnet werden.
    pub fn count_on_top(&self) -> usize {
        self.entries.values().filter(|e| e.on_top).count()
    }

    /// Generation der dargestellten Wolke.
    pub fn displayed_generation(&self) -> Option<u64> {
        self.cloud_generation
    }

    pub fn displayed_len(&self) -> usize {
        self.cloud_len
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }
}

impl SceneManager for HeadlessScene {
    fn camera(&self) -> &Camera3D {
        &self.camera
    }

    fn set_camera(&mut self, camera: Camera3D) {
        self.camera = camera;
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn add_primitive(
        &mut self,
        primitive: Primitive,
        role: RenderRole,
        color: Rgba,
    ) -> PrimitiveHandle {
        let handle = PrimitiveHandle(self.next_handle);
        self.next_handle += 1;
        self.entries.insert(
            handle,
            SceneEntry {
                primitive,
                role,
                color,
                on_top: false,
            },
        );
        handle
    }

    fn remove_primitive(&mut self, handle: PrimitiveHandle) {
        self.entries.shift_remove(&handle);
    }

    fn set_color(&mut self, handle: PrimitiveHandle, color: Rgba) {
        if let Some(entry) = self.entries.get_mut(&handle) {
            entry.color = color;
        }
    }

    fn set_on_top(&mut self, handle: PrimitiveHandle, on_top: bool) {
        if let Some(entry) = self.entries.get_mut(&handle) {
            entry.on_top = on_top;
        }
    }

    fn transform_primitive(&mut self, handle: PrimitiveHandle, matrix: &Mat4) {
        if let Some(entry) = self.entries.get_mut(&handle) {
            entry.primitive.transform(matrix);
        }
    }

    fn show_cloud(&mut self, cloud: Option<&PointCloud>) {
        self.cloud_generation = cloud.map(PointCloud::generation);
        self.cloud_len = cloud.map_or(0, PointCloud::len);
    }
}
