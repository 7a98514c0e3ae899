//! Gemeinsame Gesten-Helfer aller Interaktionsmodi.

use glam::{Vec2, Vec3};

use crate::app::input::InputEvent;
use crate::app::scene::{Primitive, PrimitiveHandle, RenderRole, Rgba, SceneManager};

/// Punktgröße von Endpunkt-Markern in Pixeln.
pub const ENDPOINT_SIZE_PX: f32 = 8.0;

/// Kamera-Pan per Drag im Screen-Space.
#[derive(Debug, Clone, Default)]
pub struct PanDrag {
    last: Option<Vec2>,
}

impl PanDrag {
    /// Verarbeitet Press/Move/Release und verschiebt die Kamera.
    pub fn handle(&mut self, event: InputEvent, scene: &mut dyn SceneManager) {
        match event {
            InputEvent::Press { pos } => self.last = Some(pos),
            InputEvent::Move { pos } => {
                if let Some(last) = self.last {
                    let mut camera = scene.camera().clone();
                    camera.pan_by_pixels(pos - last);
                    scene.set_camera(camera);
                    self.last = Some(pos);
                }
            }
            InputEvent::Release { .. } => self.last = None,
        }
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// Unterscheidet Klicks von Kamera-Drags über den Press/Release-Abstand.
#[derive(Debug, Clone, Default)]
pub struct ClickGesture {
    press: Option<Vec2>,
}

impl ClickGesture {
    pub fn press(&mut self, pos: Vec2) {
        self.press = Some(pos);
    }

    /// `true`, wenn Press und Release näher als `tolerance_px` beieinander liegen.
    pub fn release(&mut self, pos: Vec2, tolerance_px: f32) -> bool {
        self.press
            .take()
            .is_some_and(|press| press.distance(pos) < tolerance_px)
    }

    pub fn reset(&mut self) {
        self.press = None;
    }
}

/// Legt einen Endpunkt-Marker an.
pub fn add_endpoint(scene: &mut dyn SceneManager, position: Vec3, color: Rgba) -> PrimitiveHandle {
    scene.add_primitive(
        Primitive::Points {
            positions: vec![position],
            size_px: ENDPOINT_SIZE_PX,
        },
        RenderRole::EndpointMarker,
        color,
    )
}

/// Legt eine Beschriftung an.
pub fn add_label(
    scene: &mut dyn SceneManager,
    position: Vec3,
    text: impl Into<String>,
    color: Rgba,
) -> PrimitiveHandle {
    scene.add_primitive(
        Primitive::Label {
            position,
            text: text.into(),
        },
        RenderRole::Label,
        color,
    )
}

/// Setzt das X-Ray-Flag auf allen Handles.
pub fn set_on_top(
    scene: &mut dyn SceneManager,
    handles: impl IntoIterator<Item = PrimitiveHandle>,
    on_top: bool,
) {
    for handle in handles {
        scene.set_on_top(handle, on_top);
    }
}

/// Entfernt alle Handles und leert die Liste.
pub fn remove_all(scene: &mut dyn SceneManager, handles: &mut Vec<PrimitiveHandle>) {
    for handle in handles.drain(..) {
        scene.remove_primitive(handle);
    }
}
