//! Handler für Boden- und Nordkalibrierung.
//!
//! Jeder Einstieg aktiviert den Kalibriermodus, damit die Picks geroutet werden.

use crate::app::scene::SceneManager;
use crate::app::tools::InteractionMode;
use crate::app::AppState;
use crate::error::ScanError;

use super::interaction;

/// `false` (und Debug-Log), wenn keine Wolke geladen ist.
fn require_cloud(state: &AppState, action: &str) -> bool {
    if state.cloud.is_none() {
        log::debug!("{} ohne geladene Wolke ignoriert", action);
        return false;
    }
    true
}

fn enter(state: &mut AppState, scene: &mut dyn SceneManager, action: &str) -> bool {
    if !require_cloud(state, action) {
        return false;
    }
    interaction::ensure_active(state, scene, InteractionMode::Calibration);
    true
}

/// Blendet das Referenzgitter ein.
pub fn start_ground_preview(state: &mut AppState, scene: &mut dyn SceneManager) {
    if enter(state, scene, "Bodenvorschau") {
        let (tools, _, mut ctx) = state.split(scene);
        tools.calibration.start_ground_preview(&mut ctx);
    }
}

/// Automatische Bodenausrichtung per Ebenenfit.
pub fn auto_ground(state: &mut AppState, scene: &mut dyn SceneManager) -> Result<(), ScanError> {
    if !enter(state, scene, "Automatische Bodenerkennung") {
        return Ok(());
    }
    let (tools, _, mut ctx) = state.split(scene);
    tools.calibration.auto_ground(&mut ctx)
}

/// Startet die Bodenwahl über drei Klicks.
pub fn start_manual_ground(state: &mut AppState, scene: &mut dyn SceneManager) {
    if enter(state, scene, "Manuelle Bodenwahl") {
        let (tools, _, mut ctx) = state.split(scene);
        tools.calibration.start_manual_ground(&mut ctx);
    }
}

pub fn confirm_ground(state: &mut AppState, scene: &mut dyn SceneManager) {
    let (tools, _, mut ctx) = state.split(scene);
    tools.calibration.confirm_ground(&mut ctx);
}

/// Startet die Nordausrichtung über zwei Klicks.
pub fn start_north_alignment(state: &mut AppState, scene: &mut dyn SceneManager) {
    if enter(state, scene, "Nordausrichtung") {
        let (tools, _, mut ctx) = state.split(scene);
        tools.calibration.start_north_alignment(&mut ctx);
    }
}

pub fn confirm_north(state: &mut AppState, scene: &mut dyn SceneManager) {
    let (tools, _, mut ctx) = state.split(scene);
    tools.calibration.confirm_north(&mut ctx);
}

/// Feinjustage um einen festen Winkel.
pub fn rotate_north(state: &mut AppState, scene: &mut dyn SceneManager, degrees: f32) {
    let (tools, _, mut ctx) = state.split(scene);
    tools.calibration.rotate_north(degrees, &mut ctx);
}
