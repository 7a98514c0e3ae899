//! Handler für Laufzeit-Optionen.

use std::path::PathBuf;

use crate::app::scene::SceneManager;
use crate::app::AppState;
use crate::shared::EditorOptions;

use super::annotation;

/// Übernimmt neue Optionen; die Undo-Tiefe folgt der aktuellen Stufe.
pub fn apply_options(state: &mut AppState, scene: &mut dyn SceneManager, options: EditorOptions) {
    let capacity = state.stage.history_capacity(&options);
    let xray_changed = state.options.xray_overlays != options.xray_overlays;
    state.options = options;
    state.history.set_capacity(capacity);
    if xray_changed {
        annotation::apply_xray(state, scene);
    }
    log::info!("Optionen übernommen (Undo-Tiefe {})", capacity);
}

/// Setzt Optionen auf Standardwerte zurück.
pub fn reset_options(state: &mut AppState, scene: &mut dyn SceneManager) {
    apply_options(state, scene, EditorOptions::default());
}

/// Persistiert die Optionen. `None` schreibt neben die Binary.
pub fn save_options(state: &AppState, path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = path.unwrap_or_else(EditorOptions::config_path);
    state.options.save_to_file(&path)
}
