//! Application Controller für zentrale Command- und Event-Verarbeitung.

use super::command_log::CommandOutcome;
use super::events::AppEvent;
use super::scene::SceneManager;
use super::{AppCommand, AppState};
use crate::core::ScreenPolygon;
use crate::error::ScanError;

/// Orchestriert Commands auf den AppState und verdrahtet Tool-Events.
#[derive(Debug, Default)]
pub struct AppController;

impl AppController {
    /// Erstellt einen neuen Controller.
    pub fn new() -> Self {
        Self
    }

    /// Führt einen Command aus.
    ///
    /// Eingabefehler (degenerierte Geometrie) werden zusätzlich als
    /// Statusmeldung ausgegeben; der Zustand bleibt in jedem Fehlerfall unverändert.
    pub fn handle_command(
        &mut self,
        state: &mut AppState,
        scene: &mut dyn SceneManager,
        command: AppCommand,
    ) -> anyhow::Result<()> {
        let logged = command.clone();
        let result = self.dispatch(state, scene, command);
        state
            .command_log
            .record(&logged, CommandOutcome::from_result(&result));
        if let Err(err) = &result {
            match err.downcast_ref::<ScanError>() {
                Some(ScanError::Input(message)) => {
                    log::info!("Eingabe abgelehnt: {}", message);
                    state.pending_events.push(AppEvent::StatusMessage {
                        text: message.clone(),
                    });
                }
                _ => log::warn!("Command fehlgeschlagen: {:#}", err),
            }
        }

        self.process_events(state, scene);
        super::handlers::interaction::refresh_registration(state);
        result
    }

    fn dispatch(
        &mut self,
        state: &mut AppState,
        scene: &mut dyn SceneManager,
        command: AppCommand,
    ) -> anyhow::Result<()> {
        use super::handlers;

        match command {
            // === Datei & Workflow ===
            AppCommand::LoadPreview { path } => handlers::file_io::load_preview(state, scene, path)?,
            AppCommand::LoadWorkFile { path } => {
                handlers::file_io::load_work_file(state, scene, path)?
            }
            AppCommand::StartReprocess => handlers::file_io::start_reprocess(state)?,
            AppCommand::PollReprocess => handlers::file_io::poll_reprocess(state, scene)?,
            AppCommand::CancelReprocess => handlers::file_io::cancel_reprocess(state),
            AppCommand::ApplyOptions { options } => {
                handlers::options::apply_options(state, scene, *options)
            }
            AppCommand::ResetOptions => handlers::options::reset_options(state, scene),
            AppCommand::SaveOptions { path } => handlers::options::save_options(state, path)?,

            // === Interaktionsmodus ===
            AppCommand::Activate { mode } => handlers::interaction::activate(state, scene, mode),
            AppCommand::Deactivate => handlers::interaction::deactivate(state, scene),
            AppCommand::SetSubmode { submode } => {
                handlers::interaction::set_submode(state, scene, submode)
            }
            AppCommand::Input { event } => handlers::interaction::input(state, scene, event)?,

            // === History ===
            AppCommand::PushHistory => handlers::history::push(state, scene),
            AppCommand::Undo => handlers::history::undo(state, scene),

            // === Selektion ===
            AppCommand::DeleteSelection => handlers::selection::delete_selected(state, scene),
            AppCommand::InvertSelection => handlers::selection::invert(state, scene),
            AppCommand::ClearSelection => handlers::selection::clear(state, scene),

            // === Kalibrierung ===
            AppCommand::StartGroundPreview => {
                handlers::calibration::start_ground_preview(state, scene)
            }
            AppCommand::AutoGround => handlers::calibration::auto_ground(state, scene)?,
            AppCommand::StartManualGround => {
                handlers::calibration::start_manual_ground(state, scene)
            }
            AppCommand::ConfirmGround => handlers::calibration::confirm_ground(state, scene),
            AppCommand::StartNorthAlignment => {
                handlers::calibration::start_north_alignment(state, scene)
            }
            AppCommand::ConfirmNorth => handlers::calibration::confirm_north(state, scene),
            AppCommand::RotateNorth { degrees } => {
                handlers::calibration::rotate_north(state, scene, degrees)
            }

            // === Messung ===
            AppCommand::SetMeasureMode { mode } => {
                handlers::annotation::set_measure_mode(state, scene, mode)
            }
            AppCommand::FinishPolyline => handlers::annotation::finish_polyline(state, scene),
            AppCommand::HighlightMeasurement { id } => {
                handlers::annotation::highlight_measurement(state, scene, id)
            }
            AppCommand::DeleteMeasurement { id } => {
                handlers::annotation::delete_measurement(state, scene, id)
            }
            AppCommand::ClearMeasurements => handlers::annotation::clear_measurements(state, scene),

            // === Referenzen & Marker ===
            AppCommand::SetReferenceKind { kind } => {
                handlers::annotation::set_reference_kind(state, scene, kind)
            }
            AppCommand::ActivateReference { id } => {
                handlers::annotation::activate_reference(state, id)
            }
            AppCommand::DeleteReference { id } => {
                handlers::annotation::delete_reference(state, scene, id)
            }
            AppCommand::SetMarkerPrefix { prefix } => {
                handlers::annotation::set_marker_prefix(state, prefix)
            }
            AppCommand::DeleteMarker { id } => handlers::annotation::delete_marker(state, scene, id),
            AppCommand::SetXray { enabled } => handlers::annotation::set_xray(state, scene, enabled),

            // === Ansicht ===
            AppCommand::SetViewPreset { preset } => handlers::view::set_view_preset(scene, preset),
            AppCommand::SetProjectionMode { mode } => {
                handlers::view::set_projection_mode(scene, mode)
            }
            AppCommand::FitView => handlers::view::fit_view(state, scene),
        }

        Ok(())
    }

    /// Verdrahtet Tool-Events untereinander und reicht sie an die UI weiter.
    ///
    /// Folge-Events (z. B. Statusmeldungen aus Bereichslöschungen) werden
    /// in derselben Runde verarbeitet.
    fn process_events(&mut self, state: &mut AppState, scene: &mut dyn SceneManager) {
        while !state.pending_events.is_empty() {
            let events = std::mem::take(&mut state.pending_events);
            for event in events {
                match &event {
                    AppEvent::ReferenceAdded { id, .. } => {
                        super::handlers::annotation::activate_reference(state, *id);
                    }
                    AppEvent::RegionDeleted { polygon, inverted } => {
                        let polygon = ScreenPolygon::new(polygon.clone());
                        let (tools, _, mut ctx) = state.split(&mut *scene);
                        tools
                            .measurement
                            .delete_within_polygon(&polygon, *inverted, &mut ctx);
                    }
                    _ => {}
                }
                state.publish(event);
            }
        }
    }
}
