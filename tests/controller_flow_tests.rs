use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use approx::assert_relative_eq;
use crash_site_scan::app::input::{InputKind, ALL_INPUT, NO_INPUT};
use crash_site_scan::app::tools::{MeasureMode, ReferenceKind};
use crash_site_scan::app::{InputEvent, LogEntry, RenderRole, ReprocessUpdate};
use crash_site_scan::core::Viewport;
use crash_site_scan::ply::LoadedCloud;
use crash_site_scan::{
    AppCommand, AppController, AppEvent, AppState, HeadlessScene, InteractionMode, PlyCodec,
    PlyFormat, PointCloud, PointCloudCodec, RigidTransform, ScanError, SceneManager, Submode,
    WorkflowStage,
};
use glam::{Vec2, Vec3};

// ── Hilfen ───────────────────────────────────────────────────────

struct Session {
    controller: AppController,
    state: AppState,
    scene: HeadlessScene,
}

impl Session {
    fn new() -> Self {
        Self {
            controller: AppController::new(),
            state: AppState::new(),
            scene: HeadlessScene::new(Viewport::new(800.0, 600.0)),
        }
    }

    fn run(&mut self, command: AppCommand) -> anyhow::Result<()> {
        self.controller
            .handle_command(&mut self.state, &mut self.scene, command)
    }

    fn ok(&mut self, command: AppCommand) {
        let label = format!("{command:?}");
        self.run(command)
            .unwrap_or_else(|err| panic!("{label} sollte gelingen: {err:#}"));
    }

    fn screen_of(&self, point: Vec3) -> Vec2 {
        self.scene.projector().project_point(point).screen
    }

    fn click(&mut self, point: Vec3) -> anyhow::Result<()> {
        let pos = self.screen_of(point);
        self.run(AppCommand::Input {
            event: InputEvent::Press { pos },
        })?;
        self.run(AppCommand::Input {
            event: InputEvent::Release { pos },
        })
    }

    /// Quadratisches Lasso in 5-px-Schritten um einen Weltpunkt.
    fn lasso_around(&mut self, point: Vec3, half: f32) {
        let center = self.screen_of(point);
        let corners = [
            center + Vec2::new(-half, -half),
            center + Vec2::new(half, -half),
            center + Vec2::new(half, half),
            center + Vec2::new(-half, half),
            center + Vec2::new(-half, -half),
        ];
        self.ok(AppCommand::Input {
            event: InputEvent::Press { pos: corners[0] },
        });
        for pair in corners.windows(2) {
            let steps = (pair[0].distance(pair[1]) / 5.0).ceil() as usize;
            for step in 0..steps {
                let pos = pair[0].lerp(pair[1], step as f32 / steps as f32);
                self.ok(AppCommand::Input {
                    event: InputEvent::Move { pos },
                });
            }
        }
        self.ok(AppCommand::Input {
            event: InputEvent::Release { pos: corners[0] },
        });
    }

    /// Pollt den Hintergrund-Job, bis `found` ein Ereignis erkennt.
    fn poll_until<T>(&mut self, mut found: impl FnMut(&AppEvent) -> Option<T>) -> Option<T> {
        for _ in 0..500 {
            self.ok(AppCommand::PollReprocess);
            if let Some(hit) = self.state.take_events().iter().find_map(&mut found) {
                return Some(hit);
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        None
    }

    fn poll_finished(&mut self) -> Option<PathBuf> {
        self.poll_until(|event| match event {
            AppEvent::ReprocessFinished { output } => Some(output.clone()),
            _ => None,
        })
    }

    /// Pollt bis zu einer Statusmeldung, die `needle` enthält.
    fn poll_status(&mut self, needle: &str) -> Option<String> {
        self.poll_until(|event| match event {
            AppEvent::StatusMessage { text } if text.contains(needle) => Some(text.clone()),
            _ => None,
        })
    }

    fn positions(&self) -> Vec<Vec3> {
        self.state
            .cloud
            .as_ref()
            .map(|cloud| cloud.positions().to_vec())
            .unwrap_or_default()
    }
}

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("css_flow_{}_{}", name, std::process::id()));
    std::fs::create_dir_all(&dir).expect("Temp-Verzeichnis");
    dir
}

fn write_cloud(dir: &Path, name: &str, points: Vec<Vec3>) -> PathBuf {
    let path = dir.join(name);
    PlyCodec::new()
        .save(&path, &PointCloud::new(points), PlyFormat::Ascii)
        .expect("PLY schreiben");
    path
}

/// Ebenes 11×11-Gitter (1 m Raster) mit leichtem Versatz.
fn grid_points() -> Vec<Vec3> {
    let mut points = Vec::new();
    for row in 0..11 {
        for column in 0..11 {
            points.push(Vec3::new(
                column as f32 + row as f32 * 0.001,
                row as f32,
                0.0,
            ));
        }
    }
    points
}

/// Gitter mit Höhenrauschen für Abläufe über den KD-Baum.
fn jittered_grid() -> Vec<Vec3> {
    grid_points()
        .into_iter()
        .enumerate()
        .map(|(i, p)| p + Vec3::Z * ((i * 7) % 11) as f32 * 0.001)
        .collect()
}

/// Codec, der erst nach einer Freigabe über den Kanal liest.
struct GatedCodec {
    gate: Mutex<mpsc::Receiver<()>>,
    inner: PlyCodec,
}

impl GatedCodec {
    fn new() -> (Self, mpsc::Sender<()>) {
        let (sender, receiver) = mpsc::channel();
        let codec = Self {
            gate: Mutex::new(receiver),
            inner: PlyCodec::new(),
        };
        (codec, sender)
    }
}

impl PointCloudCodec for GatedCodec {
    fn load(&self, path: &Path) -> anyhow::Result<LoadedCloud> {
        let gate = self
            .gate
            .lock()
            .map_err(|_| anyhow::anyhow!("Gate vergiftet"))?;
        gate.recv()?;
        self.inner.load(path)
    }

    fn save(&self, path: &Path, cloud: &PointCloud, format: PlyFormat) -> anyhow::Result<()> {
        self.inner.save(path, cloud, format)
    }
}

/// Codec, dessen Lesen den Hintergrund-Thread abstürzen lässt.
struct PanickingCodec;

impl PointCloudCodec for PanickingCodec {
    fn load(&self, _path: &Path) -> anyhow::Result<LoadedCloud> {
        panic!("Decoder abgestürzt");
    }

    fn save(&self, _path: &Path, _cloud: &PointCloud, _format: PlyFormat) -> anyhow::Result<()> {
        Ok(())
    }
}

fn loaded_session(name: &str, points: Vec<Vec3>) -> (Session, PathBuf) {
    let dir = temp_dir(name);
    let path = write_cloud(&dir, "scan.ply", points);
    let mut session = Session::new();
    session.ok(AppCommand::LoadPreview { path });
    session.state.take_events();
    (session, dir)
}

// ── Laden ────────────────────────────────────────────────────────

#[test]
fn test_load_preview_starts_prepare_stage_with_selection_mode() {
    let (mut session, dir) = loaded_session("load", grid_points());

    assert_eq!(session.state.point_count(), 121);
    assert_eq!(session.state.stage, WorkflowStage::Prepare);
    assert_eq!(session.state.history.capacity(), 1);
    assert_eq!(session.state.active_mode(), Some(InteractionMode::Selection));
    let registration = session
        .state
        .router
        .current()
        .expect("Registrierung erwartet");
    assert_eq!(registration.kinds.as_slice(), ALL_INPUT);
    assert_eq!(session.scene.displayed_len(), 121);
    assert!(session.state.take_events().is_empty());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_load_missing_file_is_io_error_and_keeps_state() {
    let mut session = Session::new();
    let err = session
        .run(AppCommand::LoadPreview {
            path: PathBuf::from("/nicht/vorhanden.ply"),
        })
        .expect_err("Fehler erwartet");

    assert!(matches!(
        err.downcast_ref::<ScanError>(),
        Some(ScanError::Io { .. })
    ));
    assert!(session.state.cloud.is_none());
    assert!(session.state.active_mode().is_none());
}

// ── Selektion & History ──────────────────────────────────────────

#[test]
fn test_lasso_delete_and_undo_roundtrip() {
    let (mut session, dir) = loaded_session("delete", grid_points());

    session.lasso_around(Vec3::new(5.0, 5.0, 0.0), 30.0);
    let selected = session
        .state
        .take_events()
        .iter()
        .find_map(|event| match event {
            AppEvent::SelectionChanged { count } => Some(*count),
            _ => None,
        })
        .expect("SelectionChanged erwartet");
    assert!(selected > 0);
    assert!(session.state.history.is_empty());

    session.ok(AppCommand::DeleteSelection);
    assert_eq!(session.state.point_count(), 121 - selected);
    assert_eq!(session.state.history.len(), 1);
    let events = session.state.take_events();
    assert!(events
        .iter()
        .any(|event| matches!(event, AppEvent::RegionDeleted { inverted: false, .. })));

    session.ok(AppCommand::Undo);
    assert_eq!(session.state.point_count(), 121);
    assert!(session.state.history.is_empty());

    session.ok(AppCommand::Undo);
    assert!(session.state.take_events().contains(&AppEvent::StatusMessage {
        text: "Nichts zum Rückgängigmachen".into()
    }));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_mode_switch_clears_selection_and_replaces_registration() {
    let (mut session, dir) = loaded_session("switch", grid_points());
    session.lasso_around(Vec3::new(5.0, 5.0, 0.0), 30.0);
    assert!(session.state.tools.selection.selected_count() > 0);
    session.state.take_events();

    session.ok(AppCommand::Activate {
        mode: InteractionMode::Measurement,
    });

    assert_eq!(session.state.tools.selection.selected_count(), 0);
    assert_eq!(session.scene.count_role(RenderRole::Guide), 0);
    let registration = session
        .state
        .router
        .current()
        .expect("Registrierung erwartet");
    assert_eq!(registration.mode, InteractionMode::Measurement);
    assert_eq!(
        registration.kinds.as_slice(),
        &[InputKind::Press, InputKind::Release]
    );
    assert!(session
        .state
        .take_events()
        .contains(&AppEvent::SelectionChanged { count: 0 }));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_view_submode_unsubscribes_input() {
    let (mut session, dir) = loaded_session("submode", grid_points());

    session.ok(AppCommand::SetSubmode {
        submode: Submode::View,
    });
    let registration = session
        .state
        .router
        .current()
        .expect("Registrierung erwartet");
    assert_eq!(registration.kinds.as_slice(), NO_INPUT);

    session.lasso_around(Vec3::new(5.0, 5.0, 0.0), 30.0);
    assert_eq!(session.state.tools.selection.selected_count(), 0);
    let _ = std::fs::remove_dir_all(&dir);
}

// ── Kalibrierung ─────────────────────────────────────────────────

#[test]
fn test_auto_ground_levels_cloud_and_undo_restores_transform() {
    // Um 10° um X gekippte Ebene, 3 m über Null
    let tilt = glam::Mat3::from_rotation_x(10f32.to_radians());
    let points: Vec<Vec3> = grid_points()
        .into_iter()
        .map(|p| tilt * p + Vec3::Z * 3.0)
        .collect();
    let (mut session, dir) = loaded_session("ground", points.clone());

    session.ok(AppCommand::AutoGround);

    assert_eq!(session.state.active_mode(), Some(InteractionMode::Calibration));
    for p in session.positions() {
        assert!(p.z.abs() < 1e-3, "Punkt nicht am Boden: {p:?}");
    }
    let accumulated = session.state.accumulated_transform();
    assert!(!accumulated.abs_diff_eq(&RigidTransform::IDENTITY, 1e-4));
    assert!(session
        .state
        .take_events()
        .iter()
        .any(|event| matches!(event, AppEvent::TransformUpdated { .. })));

    session.ok(AppCommand::Undo);
    assert!(session
        .state
        .accumulated_transform()
        .abs_diff_eq(&RigidTransform::IDENTITY, 1e-6));
    for (restored, original) in session.positions().iter().zip(&points) {
        assert_relative_eq!(restored.z, original.z, epsilon = 1e-4);
    }
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_collinear_manual_ground_reports_status_and_keeps_transform() {
    let (mut session, dir) = loaded_session("collinear", grid_points());

    session.ok(AppCommand::StartManualGround);
    session.ok(AppCommand::SetViewPreset {
        preset: crash_site_scan::core::ViewPreset::Top,
    });
    session.click(Vec3::new(0.0, 0.0, 0.0)).expect("Pick 1");
    session.click(Vec3::new(1.0, 0.0, 0.0)).expect("Pick 2");
    let err = session
        .click(Vec3::new(2.0, 0.0, 0.0))
        .expect_err("Kollineare Punkte erwartet Fehler");

    assert!(matches!(
        err.downcast_ref::<ScanError>(),
        Some(ScanError::Input(_))
    ));
    assert!(session
        .state
        .accumulated_transform()
        .abs_diff_eq(&RigidTransform::IDENTITY, 1e-6));
    assert!(session.state.history.is_empty());
    assert!(session
        .state
        .take_events()
        .iter()
        .any(|event| matches!(event, AppEvent::StatusMessage { .. })));
    let _ = std::fs::remove_dir_all(&dir);
}

// ── Referenzen & Messungen ───────────────────────────────────────

#[test]
fn test_reference_line_drives_perpendicular_measurement() {
    let (mut session, dir) = loaded_session("perpendicular", grid_points());

    session.ok(AppCommand::Activate {
        mode: InteractionMode::Reference,
    });
    session.ok(AppCommand::SetReferenceKind {
        kind: ReferenceKind::Line,
    });
    session.click(Vec3::new(0.0, 0.0, 0.0)).expect("Linie 1");
    session.click(Vec3::new(10.0, 0.0, 0.0)).expect("Linie 2");
    let reference = session
        .state
        .take_events()
        .iter()
        .find_map(|event| match event {
            AppEvent::ReferenceAdded { id, kind, .. } => Some((*id, *kind)),
            _ => None,
        })
        .expect("ReferenceAdded erwartet");
    assert_eq!(reference.1, ReferenceKind::Line);

    session.ok(AppCommand::Activate {
        mode: InteractionMode::Measurement,
    });
    session.ok(AppCommand::SetMeasureMode {
        mode: MeasureMode::Perpendicular,
    });
    session.click(Vec3::new(5.0, 3.0, 0.0)).expect("Messpunkt");

    assert!(session
        .state
        .take_events()
        .iter()
        .any(|event| matches!(
            event,
            AppEvent::MeasurementAdded { text, .. } if text == "Lotabstand: 3.00m"
        )));

    // Ohne Basislinie wird der Lotabstand abgelehnt
    session.ok(AppCommand::DeleteReference { id: reference.0 });
    let err = session
        .click(Vec3::new(5.0, 4.0, 0.0))
        .expect_err("Fehlende Referenz erwartet Fehler");
    assert!(matches!(
        err.downcast_ref::<ScanError>(),
        Some(ScanError::Input(_))
    ));
    assert_eq!(session.state.tools.measurement.len(), 1);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_deleted_region_removes_dependent_measurements() {
    let (mut session, dir) = loaded_session("region", grid_points());

    session.ok(AppCommand::Activate {
        mode: InteractionMode::Measurement,
    });
    session.click(Vec3::new(2.0, 2.0, 0.0)).expect("Punkt 1");
    session.click(Vec3::new(8.0, 8.0, 0.0)).expect("Punkt 2");
    session.ok(AppCommand::FinishPolyline);
    assert_eq!(session.state.tools.measurement.len(), 1);

    session.ok(AppCommand::Activate {
        mode: InteractionMode::Selection,
    });
    session.lasso_around(Vec3::new(2.0, 2.0, 0.0), 15.0);
    session.ok(AppCommand::DeleteSelection);

    assert!(session.state.tools.measurement.is_empty());
    assert_eq!(session.scene.count_role(RenderRole::PathGeometry), 0);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_marker_click_places_evidence_label() {
    let (mut session, dir) = loaded_session("marker", grid_points());

    session.ok(AppCommand::Activate {
        mode: InteractionMode::Marker,
    });
    session.click(Vec3::new(3.0, 4.0, 0.0)).expect("Marker");

    assert!(session
        .state
        .take_events()
        .iter()
        .any(|event| matches!(event, AppEvent::MarkerAdded { label, .. } if label == "Evidence-1")));
    let _ = std::fs::remove_dir_all(&dir);
}

// ── Neuverarbeitung ──────────────────────────────────────────────

#[test]
fn test_reprocess_writes_work_file_and_enters_editor_stage() {
    let (mut session, dir) = loaded_session("reprocess", jittered_grid());

    session.ok(AppCommand::StartReprocess);
    let output = session.poll_finished().expect("Job sollte abschließen");
    assert_eq!(output, dir.join("scan_work.ply"));
    assert!(output.is_file());
    assert!(session.state.reprocess.is_none());
    assert_eq!(session.state.stage, WorkflowStage::Editor);
    assert_eq!(session.state.history.capacity(), 5);
    assert_eq!(session.state.active_mode(), Some(InteractionMode::Measurement));
    assert_eq!(session.state.point_count(), 121);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_reprocess_io_failure_releases_job_for_restart() {
    let (mut session, dir) = loaded_session("reprocess_io", jittered_grid());
    let raw = dir.join("scan.ply");
    std::fs::remove_file(&raw).expect("Rohdaten entfernen");

    session.ok(AppCommand::StartReprocess);
    let status = session
        .poll_status("fehlgeschlagen")
        .expect("Fehlermeldung erwartet");

    assert!(status.contains("scan.ply"), "{status}");
    assert!(session.state.reprocess.is_none());
    assert_eq!(session.state.stage, WorkflowStage::Prepare);
    assert_eq!(session.state.point_count(), 121);
    assert!(matches!(
        session.state.command_log.last(),
        Some(LogEntry::Reprocess(ReprocessUpdate::Failed { .. }))
    ));

    write_cloud(&dir, "scan.ply", jittered_grid());
    session.ok(AppCommand::StartReprocess);
    let output = session.poll_finished().expect("Zweiter Lauf sollte abschließen");
    assert_eq!(output, dir.join("scan_work.ply"));
    assert_eq!(session.state.stage, WorkflowStage::Editor);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_cancel_reprocess_keeps_stage_and_allows_restart() {
    let (mut session, dir) = loaded_session("reprocess_cancel", jittered_grid());
    let (codec, gate) = GatedCodec::new();
    session.state.codec = Arc::new(codec);

    session.ok(AppCommand::StartReprocess);
    assert!(session.state.reprocess.is_some());
    // Ein zweiter Start während des Laufs wird ignoriert
    session.ok(AppCommand::StartReprocess);
    session.ok(AppCommand::CancelReprocess);
    gate.send(()).expect("Freigabe");

    session
        .poll_status("Neuverarbeitung abgebrochen")
        .expect("Abbruchmeldung erwartet");
    assert!(session.state.reprocess.is_none());
    assert_eq!(session.state.stage, WorkflowStage::Prepare);
    assert!(!dir.join("scan_work.ply").exists());
    assert!(session
        .state
        .command_log
        .entries()
        .any(|entry| matches!(entry, LogEntry::Reprocess(ReprocessUpdate::Cancelled))));

    session.ok(AppCommand::StartReprocess);
    gate.send(()).expect("Freigabe");
    session.poll_finished().expect("Neustart sollte abschließen");
    assert!(session.state.reprocess.is_none());
    assert_eq!(session.state.stage, WorkflowStage::Editor);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_crashed_reprocess_thread_reports_failure_and_recovers() {
    let (mut session, dir) = loaded_session("reprocess_crash", jittered_grid());
    session.state.codec = Arc::new(PanickingCodec);

    session.ok(AppCommand::StartReprocess);
    session
        .poll_status("unerwartet beendet")
        .expect("Fehlermeldung erwartet");
    assert!(session.state.reprocess.is_none());
    assert_eq!(session.state.stage, WorkflowStage::Prepare);

    session.state.codec = Arc::new(PlyCodec::new());
    session.ok(AppCommand::StartReprocess);
    session.poll_finished().expect("Neustart sollte abschließen");
    assert_eq!(session.state.stage, WorkflowStage::Editor);
    let _ = std::fs::remove_dir_all(&dir);
}

// ── X-Ray ────────────────────────────────────────────────────────

#[test]
fn test_xray_toggle_moves_overlays_on_and_off_top() {
    let (mut session, dir) = loaded_session("xray", grid_points());
    assert!(session.state.options.xray_overlays);

    session.ok(AppCommand::Activate {
        mode: InteractionMode::Reference,
    });
    session.ok(AppCommand::SetReferenceKind {
        kind: ReferenceKind::Line,
    });
    session.click(Vec3::new(0.0, 0.0, 0.0)).expect("Linie 1");
    session.click(Vec3::new(10.0, 0.0, 0.0)).expect("Linie 2");
    session.ok(AppCommand::Activate {
        mode: InteractionMode::Measurement,
    });
    session.click(Vec3::new(2.0, 2.0, 0.0)).expect("Punkt 1");
    session.click(Vec3::new(8.0, 8.0, 0.0)).expect("Punkt 2");
    session.ok(AppCommand::FinishPolyline);

    let overlays = session.scene.count_on_top();
    assert!(overlays > 0);

    session.ok(AppCommand::SetXray { enabled: false });
    assert_eq!(session.scene.count_on_top(), 0);
    assert!(!session.state.options.xray_overlays);

    // Neue Messungen übernehmen den aktuellen Zustand
    session.click(Vec3::new(1.0, 5.0, 0.0)).expect("Punkt 3");
    session.click(Vec3::new(6.0, 5.0, 0.0)).expect("Punkt 4");
    session.ok(AppCommand::FinishPolyline);
    assert_eq!(session.scene.count_on_top(), 0);

    session.ok(AppCommand::SetXray { enabled: true });
    assert!(session.scene.count_on_top() > overlays);
    let _ = std::fs::remove_dir_all(&dir);
}
