//! Handler für Laden, Arbeitsstufen und die Neuverarbeitung im Hintergrund.

use std::path::PathBuf;
use std::sync::Arc;

use crate::app::events::AppEvent;
use crate::app::reprocess::{ReprocessJob, ReprocessRequest, ReprocessSettings, ReprocessUpdate};
use crate::app::scene::SceneManager;
use crate::app::state::WorkflowStage;
use crate::app::tools::InteractionMode;
use crate::app::AppState;
use crate::core::{PointCloud, RigidTransform};
use crate::error::ScanError;
use crate::ply::{PlyCodec, PointCloudCodec};

use super::interaction;

/// Lädt Rohdaten als dezimierte Vorschau und startet die Vorbereitungsstufe.
pub fn load_preview(
    state: &mut AppState,
    scene: &mut dyn SceneManager,
    path: PathBuf,
) -> anyhow::Result<()> {
    let codec = PlyCodec::preview(
        state.options.preview_point_limit,
        state.options.preview_voxel_divisor,
    );
    let loaded = codec.load(&path).map_err(|err| ScanError::io(&path, &err))?;

    start_session(state, scene, loaded.cloud, WorkflowStage::Prepare);
    state.source_path = Some(path);
    interaction::activate(state, scene, InteractionMode::Selection);
    status(
        state,
        format!(
            "Vorschau geladen: {} von {} Punkten",
            loaded.final_count, loaded.original_count
        ),
    );
    Ok(())
}

/// Lädt die Arbeitskopie und startet die Editor-Stufe.
pub fn load_work_file(
    state: &mut AppState,
    scene: &mut dyn SceneManager,
    path: PathBuf,
) -> anyhow::Result<()> {
    let loaded = state
        .codec
        .load(&path)
        .map_err(|err| ScanError::io(&path, &err))?;

    start_session(state, scene, loaded.cloud, WorkflowStage::Editor);
    interaction::activate(state, scene, InteractionMode::Measurement);
    status(
        state,
        format!("Arbeitskopie geladen: {} Punkte", loaded.final_count),
    );
    Ok(())
}

/// Setzt alle Tools zurück und übernimmt `cloud` als neue Sitzung.
fn start_session(
    state: &mut AppState,
    scene: &mut dyn SceneManager,
    cloud: PointCloud,
    stage: WorkflowStage,
) {
    interaction::deactivate(state, scene);
    {
        let (tools, _, mut ctx) = state.split(&mut *scene);
        tools.measurement.reset(&mut ctx);
        tools.reference.clear_all(&mut ctx);
        tools.marker.clear_all(&mut ctx);
        tools.selection.clear(&mut ctx);
        tools.calibration.cancel(&mut ctx);
    }

    state.history.clear();
    state.history.set_capacity(stage.history_capacity(&state.options));
    state.accumulated = RigidTransform::IDENTITY;
    state.stage = stage;

    scene.show_cloud(Some(&cloud));
    if let Some(bounds) = cloud.bounds() {
        let mut camera = scene.camera().clone();
        camera.fit_bounds(&bounds);
        scene.set_camera(camera);
    }
    state.cloud = Some(Arc::new(cloud));
    state.pending_events.push(AppEvent::StageChanged { stage });
}

fn status(state: &mut AppState, text: String) {
    log::info!("{}", text);
    state.pending_events.push(AppEvent::StatusMessage { text });
}

// ── Neuverarbeitung ──────────────────────────────────────────────

/// Startet die vollauflösende Neuverarbeitung auf einem Snapshot.
pub fn start_reprocess(state: &mut AppState) -> anyhow::Result<()> {
    if state.reprocess.is_some() {
        log::debug!("Neuverarbeitung läuft bereits");
        return Ok(());
    }
    let (Some(raw_path), Some(cloud)) = (state.source_path.clone(), state.cloud.clone()) else {
        log::debug!("Neuverarbeitung ohne geladene Rohdaten ignoriert");
        return Ok(());
    };

    let request = ReprocessRequest {
        raw_path,
        crop: state.crop_region(),
        transform: Some(state.accumulated),
        preview_points: cloud.positions().to_vec(),
        settings: ReprocessSettings::from(&state.options),
    };
    state.reprocess = Some(ReprocessJob::spawn(request, Arc::clone(&state.codec))?);
    status(state, "Neuverarbeitung gestartet".into());
    Ok(())
}

/// Holt Fortschritt ab; nach Abschluss wird die Arbeitskopie geladen.
///
/// Jede Abschlussmeldung (auch Fehler, Abbruch oder ein abgestürzter
/// Thread) gibt den Job frei, sodass neu gestartet werden kann.
pub fn poll_reprocess(state: &mut AppState, scene: &mut dyn SceneManager) -> anyhow::Result<()> {
    let Some(job) = state.reprocess.as_mut() else {
        return Ok(());
    };

    let mut finished_output = None;
    let mut terminal = false;
    for update in job.try_updates() {
        state.command_log.record_reprocess(&update);
        match update {
            ReprocessUpdate::Progress { stage, percent } => {
                log::info!("{} ({}%)", stage.message(), percent);
                state
                    .pending_events
                    .push(AppEvent::ReprocessProgress { stage, percent });
            }
            ReprocessUpdate::Finished {
                output,
                point_count,
            } => {
                log::info!(
                    "Neuverarbeitung abgeschlossen: {} ({} Punkte)",
                    output.display(),
                    point_count
                );
                state.pending_events.push(AppEvent::ReprocessFinished {
                    output: output.clone(),
                });
                finished_output = Some(output);
                terminal = true;
            }
            ReprocessUpdate::Failed { message } => {
                log::warn!("Neuverarbeitung fehlgeschlagen: {}", message);
                status(state, format!("Neuverarbeitung fehlgeschlagen: {}", message));
                terminal = true;
            }
            ReprocessUpdate::Cancelled => {
                status(state, "Neuverarbeitung abgebrochen".into());
                terminal = true;
            }
        }
    }

    if terminal {
        if let Some(job) = state.reprocess.take() {
            job.wait();
        }
    }
    match finished_output {
        Some(output) => load_work_file(state, scene, output),
        None => Ok(()),
    }
}

/// Fordert den Abbruch des laufenden Jobs an.
pub fn cancel_reprocess(state: &mut AppState) {
    match state.reprocess.as_ref() {
        Some(job) => {
            job.cancel();
            log::info!("Abbruch der Neuverarbeitung angefordert");
        }
        None => log::debug!("Kein laufender Job zum Abbrechen"),
    }
}
