//! Handler für Moduswechsel, Untermodus und Viewport-Eingaben.

use crate::app::input::InputEvent;
use crate::app::scene::SceneManager;
use crate::app::tools::{InteractionMode, Submode};
use crate::app::AppState;
use crate::error::ScanError;

/// Aktiviert `mode`. Der vorherige Modus wird vollständig abgebaut,
/// bevor sich der neue registriert.
pub fn activate(state: &mut AppState, scene: &mut dyn SceneManager, mode: InteractionMode) {
    deactivate(state, scene);

    let (tools, router, mut ctx) = state.split(scene);
    let token = router.register(mode, tools.tool(mode).input_kinds());
    tools.set_active(Some(mode));
    tools.tool_mut(mode).activate(&mut ctx);
    log::info!("Modus {:?} aktiviert (Registrierung {})", mode, token);
}

/// Baut den aktiven Modus samt Registrierung ab.
pub fn deactivate(state: &mut AppState, scene: &mut dyn SceneManager) {
    let (tools, router, mut ctx) = state.split(scene);
    let Some(mode) = tools.active_mode() else {
        log::debug!("Deaktivieren ohne aktiven Modus ignoriert");
        return;
    };

    tools.tool_mut(mode).deactivate(&mut ctx);
    if let Some(registration) = router.release() {
        log::debug!(
            "Registrierung {} von {:?} entfernt",
            registration.token,
            registration.mode
        );
    }
    tools.set_active(None);
    log::info!("Modus {:?} deaktiviert", mode);
}

/// Aktiviert `mode` nur, wenn er nicht bereits aktiv ist.
pub fn ensure_active(state: &mut AppState, scene: &mut dyn SceneManager, mode: InteractionMode) {
    if state.active_mode() != Some(mode) {
        activate(state, scene, mode);
    }
}

/// Setzt den Untermodus des aktiven Modus.
pub fn set_submode(state: &mut AppState, scene: &mut dyn SceneManager, submode: Submode) {
    let (tools, _, mut ctx) = state.split(scene);
    let Some(tool) = tools.active_tool_mut() else {
        log::debug!("Untermodus {:?} ohne aktiven Modus ignoriert", submode);
        return;
    };
    tool.set_submode(submode, &mut ctx);
}

/// Leitet ein Eingabe-Event an den registrierten Modus weiter.
pub fn input(
    state: &mut AppState,
    scene: &mut dyn SceneManager,
    event: InputEvent,
) -> Result<(), ScanError> {
    let Some(mode) = state.router.route(&event) else {
        return Ok(());
    };
    let (tools, _, mut ctx) = state.split(scene);
    tools.tool_mut(mode).on_input(event, &mut ctx)
}

/// Registriert den aktiven Modus neu, wenn sich seine Eingabearten geändert haben.
pub fn refresh_registration(state: &mut AppState) {
    let Some(mode) = state.tools.active_mode() else {
        return;
    };
    let kinds = state.tools.tool(mode).input_kinds();
    let changed = state
        .router
        .current()
        .map_or(true, |registration| registration.kinds.as_slice() != kinds);
    if changed {
        let token = state.router.register(mode, kinds);
        log::debug!("{:?} neu registriert für {:?} ({})", mode, kinds, token);
    }
}
