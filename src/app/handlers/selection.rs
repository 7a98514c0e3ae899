//! Handler für Selektions-Operationen.

use crate::app::scene::SceneManager;
use crate::app::AppState;

/// Löscht die selektierten Punkte (mit History-Eintrag).
pub fn delete_selected(state: &mut AppState, scene: &mut dyn SceneManager) {
    let (tools, _, mut ctx) = state.split(scene);
    tools.selection.delete_selected(&mut ctx);
}

/// Invertiert die Selektion.
pub fn invert(state: &mut AppState, scene: &mut dyn SceneManager) {
    let (tools, _, mut ctx) = state.split(scene);
    tools.selection.invert(&mut ctx);
}

/// Hebt die Selektion auf.
pub fn clear(state: &mut AppState, scene: &mut dyn SceneManager) {
    let (tools, _, mut ctx) = state.split(scene);
    tools.selection.clear(&mut ctx);
}
