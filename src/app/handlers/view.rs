//! Handler für Kamera und Ansicht.

use crate::app::scene::SceneManager;
use crate::app::AppState;
use crate::core::{ProjectionMode, ViewPreset};

/// Setzt eine vordefinierte Blickrichtung.
pub fn set_view_preset(scene: &mut dyn SceneManager, preset: ViewPreset) {
    let mut camera = scene.camera().clone();
    camera.apply_preset(preset);
    scene.set_camera(camera);
    log::debug!("Ansicht {:?}", preset);
}

/// Wechselt zwischen perspektivischer und orthografischer Projektion.
pub fn set_projection_mode(scene: &mut dyn SceneManager, mode: ProjectionMode) {
    let mut camera = scene.camera().clone();
    camera.projection = mode;
    scene.set_camera(camera);
    log::debug!("Projektion {:?}", mode);
}

/// Passt die Kamera an die Bounding-Box der Wolke an.
pub fn fit_view(state: &AppState, scene: &mut dyn SceneManager) {
    let Some(bounds) = state.cloud.as_ref().and_then(|cloud| cloud.bounds()) else {
        log::debug!("Einpassen ohne Wolke ignoriert");
        return;
    };
    let mut camera = scene.camera().clone();
    camera.fit_bounds(&bounds);
    scene.set_camera(camera);
}
