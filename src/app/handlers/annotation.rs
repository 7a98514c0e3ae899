//! Handler für Messungen, Referenzen und Marker.

use crate::app::scene::SceneManager;
use crate::app::tools::{MarkerId, MeasureMode, MeasurementId, ReferenceId, ReferenceKind};
use crate::app::AppState;

// ── Messungen ────────────────────────────────────────────────────

pub fn set_measure_mode(state: &mut AppState, scene: &mut dyn SceneManager, mode: MeasureMode) {
    let (tools, _, mut ctx) = state.split(scene);
    tools.measurement.set_mode(mode, &mut ctx);
}

/// Schließt die offene Polylinie ab. Weniger als zwei Punkte = stiller Abbruch.
pub fn finish_polyline(state: &mut AppState, scene: &mut dyn SceneManager) {
    let (tools, _, mut ctx) = state.split(scene);
    if tools.measurement.finish_polyline(&mut ctx).is_none() {
        log::debug!("Polylinie ohne Messung beendet");
    }
}

pub fn highlight_measurement(
    state: &mut AppState,
    scene: &mut dyn SceneManager,
    id: MeasurementId,
) {
    let (tools, _, mut ctx) = state.split(scene);
    if tools.measurement.get(id).is_none() {
        log::debug!("Messung {:?} existiert nicht", id);
        return;
    }
    tools.measurement.highlight(Some(id), &mut ctx);
}

pub fn delete_measurement(state: &mut AppState, scene: &mut dyn SceneManager, id: MeasurementId) {
    let (tools, _, mut ctx) = state.split(scene);
    if tools.measurement.delete(id, &mut ctx) {
        log::info!("Messung {:?} gelöscht", id);
    }
}

pub fn clear_measurements(state: &mut AppState, scene: &mut dyn SceneManager) {
    let (tools, _, mut ctx) = state.split(scene);
    tools.measurement.clear_all(&mut ctx);
    ctx.status("Alle Messungen entfernt");
}

// ── Referenzen ───────────────────────────────────────────────────

pub fn set_reference_kind(state: &mut AppState, scene: &mut dyn SceneManager, kind: ReferenceKind) {
    let (tools, _, mut ctx) = state.split(scene);
    tools.reference.set_kind(kind, &mut ctx);
}

/// Setzt eine bestehende Referenz als aktive Basis ihrer Art.
pub fn activate_reference(state: &mut AppState, id: ReferenceId) {
    let tools = &mut state.tools;
    let Some(entity) = tools.reference.get(id).map(|reference| reference.entity) else {
        log::debug!("Referenz {:?} existiert nicht", id);
        return;
    };
    tools.measurement.set_active_reference(id, entity);
    log::info!("Referenz {:?} aktiv", id);
}

/// Löscht eine Referenz; abhängige Messmodi verlieren ihre Basis.
pub fn delete_reference(state: &mut AppState, scene: &mut dyn SceneManager, id: ReferenceId) {
    let (tools, _, mut ctx) = state.split(scene);
    if let Some(reference) = tools.reference.delete(id, &mut ctx) {
        tools.measurement.forget_reference(id);
        ctx.status(format!("{} gelöscht", reference.label));
    }
}

// ── X-Ray ────────────────────────────────────────────────────────

pub fn set_xray(state: &mut AppState, scene: &mut dyn SceneManager, enabled: bool) {
    state.options.xray_overlays = enabled;
    apply_xray(state, scene);
    log::info!("X-Ray {}", if enabled { "an" } else { "aus" });
}

/// Überträgt das X-Ray-Flag der Optionen auf alle Messungen und Referenzen.
pub fn apply_xray(state: &mut AppState, scene: &mut dyn SceneManager) {
    let (tools, _, mut ctx) = state.split(scene);
    tools.measurement.apply_xray(&mut ctx);
    tools.reference.apply_xray(&mut ctx);
}

// ── Marker ───────────────────────────────────────────────────────

pub fn set_marker_prefix(state: &mut AppState, prefix: String) {
    state.tools.marker.set_prefix(prefix);
}

pub fn delete_marker(state: &mut AppState, scene: &mut dyn SceneManager, id: MarkerId) {
    let (tools, _, mut ctx) = state.split(scene);
    if tools.marker.delete(id, &mut ctx) {
        log::info!("Marker {:?} gelöscht", id);
    }
}
