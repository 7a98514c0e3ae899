//! Handler für History-Operationen.

use std::sync::Arc;

use crate::app::events::AppEvent;
use crate::app::scene::SceneManager;
use crate::app::AppState;

/// Legt einen Snapshot des aktuellen Zustands ab.
pub fn push(state: &mut AppState, scene: &mut dyn SceneManager) {
    let (_, _, mut ctx) = state.split(scene);
    ctx.push_history();
    log::debug!("History-Eintrag abgelegt ({})", ctx.history.len());
}

/// Stellt den letzten Snapshot wieder her (Wolke und akkumulierte Transformation).
pub fn undo(state: &mut AppState, scene: &mut dyn SceneManager) {
    let Some(snapshot) = state.history.undo() else {
        log::debug!("Undo: nichts zu tun");
        state.pending_events.push(AppEvent::StatusMessage {
            text: "Nichts zum Rückgängigmachen".into(),
        });
        return;
    };

    // Neue Generation: Selektionen der verworfenen Wolke werden ungültig
    let cloud = Arc::unwrap_or_clone(snapshot.cloud).renewed();
    let (tools, _, mut ctx) = state.split(scene);
    ctx.replace_cloud(cloud);
    *ctx.accumulated = snapshot.accumulated;
    tools.calibration.cancel(&mut ctx);
    tools.selection.sync_with_cloud(&mut ctx);
    ctx.emit(AppEvent::TransformUpdated {
        transform: snapshot.accumulated,
    });
    ctx.status("Undo ausgeführt");
}
