//! Vollauflösende Nachverarbeitung im Hintergrund.
//!
//! Der Job erhält einen Snapshot (Pfad der Rohdaten, Vorschau-Punkte,
//! Crop-Box, Transformation) und liest nie den interaktiven Zustand.
//! Fortschritt und Ergebnis laufen über einen `mpsc`-Kanal; Abbruch
//! wird an jedem Checkpoint kooperativ geprüft.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::Context;
use glam::Vec3;

use crate::core::{
    fit_plane, orient_up, rotation_to_z, OrientedBox, PointCloud, ProximityMask, RigidTransform,
};
use crate::error::ScanError;
use crate::ply::{work_file_path, PlyFormat, PointCloudCodec};
use crate::shared::EditorOptions;

/// Checkpoints der Pipeline in Ausführungsreihenfolge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReprocessStage {
    Read,
    Transform,
    Crop,
    Mask,
    Downsample,
    Save,
}

impl ReprocessStage {
    /// Fortschritt beim Erreichen des Checkpoints.
    pub fn percent(self) -> u8 {
        match self {
            ReprocessStage::Read => 10,
            ReprocessStage::Transform => 20,
            ReprocessStage::Crop => 40,
            ReprocessStage::Mask => 60,
            ReprocessStage::Downsample => 80,
            ReprocessStage::Save => 90,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            ReprocessStage::Read => "Rohdaten lesen",
            ReprocessStage::Transform => "Transformation anwenden",
            ReprocessStage::Crop => "Zuschneiden",
            ReprocessStage::Mask => "Proximity-Maske anwenden",
            ReprocessStage::Downsample => "Ausdünnen",
            ReprocessStage::Save => "Speichern",
        }
    }
}

/// Parameter der Pipeline, aus den Optionen übernommen.
#[derive(Debug, Clone, PartialEq)]
pub struct ReprocessSettings {
    pub ground_fit_distance: f32,
    pub ground_fit_iterations: usize,
    pub proximity_threshold: f32,
    /// 0 = nicht ausdünnen
    pub voxel_size: f32,
    pub work_file_suffix: String,
}

impl From<&EditorOptions> for ReprocessSettings {
    fn from(options: &EditorOptions) -> Self {
        Self {
            ground_fit_distance: options.ground_fit_distance,
            ground_fit_iterations: options.ground_fit_iterations,
            proximity_threshold: options.proximity_threshold,
            voxel_size: options.work_voxel_size,
            work_file_suffix: options.work_file_suffix.clone(),
        }
    }
}

impl Default for ReprocessSettings {
    fn default() -> Self {
        Self::from(&EditorOptions::default())
    }
}

/// Eingabe-Snapshot eines Jobs.
#[derive(Debug, Clone)]
pub struct ReprocessRequest {
    pub raw_path: PathBuf,
    /// Zuschnitt im transformierten Koordinatensystem
    pub crop: Option<OrientedBox>,
    /// `None` = Rohdaten selbst per Ebenenfit nivellieren
    pub transform: Option<RigidTransform>,
    /// Bearbeitete Vorschau (leer = keine Maske)
    pub preview_points: Vec<Vec3>,
    pub settings: ReprocessSettings,
}

/// Ergebnis eines erfolgreichen Laufs.
#[derive(Debug, Clone, PartialEq)]
pub struct ReprocessOutput {
    pub path: PathBuf,
    pub point_count: usize,
}

/// Meldungen des Hintergrund-Jobs.
#[derive(Debug, Clone, PartialEq)]
pub enum ReprocessUpdate {
    Progress { stage: ReprocessStage, percent: u8 },
    Finished { output: PathBuf, point_count: usize },
    Failed { message: String },
    Cancelled,
}

/// Kooperatives Abbruch-Flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), ScanError> {
        if self.is_cancelled() {
            Err(ScanError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Führt die Pipeline synchron aus.
///
/// Das Artefakt wird erst als `<stem>_work.ply.tmp` geschrieben und dann
/// umbenannt; bei Fehler oder Abbruch bleibt keine Datei zurück.
pub fn run_pipeline(
    request: &ReprocessRequest,
    codec: &dyn PointCloudCodec,
    cancel: &CancelToken,
    progress: &mut dyn FnMut(ReprocessStage),
) -> Result<ReprocessOutput, ScanError> {
    let settings = &request.settings;

    // ── Lesen ────────────────────────────────────────────────────
    cancel.check()?;
    progress(ReprocessStage::Read);
    let loaded = codec
        .load(&request.raw_path)
        .map_err(|err| ScanError::io(&request.raw_path, &err))?;
    let mut cloud = loaded.cloud;

    // ── Transformation ───────────────────────────────────────────
    cancel.check()?;
    progress(ReprocessStage::Transform);
    let transform = match request.transform {
        Some(transform) => transform,
        None => level_transform(&cloud, settings),
    };
    cloud = cloud.transformed(&transform.matrix());

    // ── Zuschnitt ────────────────────────────────────────────────
    cancel.check()?;
    progress(ReprocessStage::Crop);
    if let Some(crop) = &request.crop {
        let before = cloud.len();
        cloud = cloud.retain_mask(&crop.contains_mask(cloud.positions()));
        log::info!("Zuschnitt: {} von {} Punkten", cloud.len(), before);
    }

    // ── Proximity-Maske ──────────────────────────────────────────
    cancel.check()?;
    progress(ReprocessStage::Mask);
    if request.preview_points.is_empty() {
        log::info!("Leere Vorschau, Proximity-Maske übersprungen");
    } else {
        let mask = ProximityMask::new(&request.preview_points, settings.proximity_threshold);
        cloud = mask.apply(&cloud);
    }

    // ── Ausdünnen ────────────────────────────────────────────────
    cancel.check()?;
    progress(ReprocessStage::Downsample);
    if settings.voxel_size > 0.0 {
        let before = cloud.len();
        cloud = cloud.voxel_downsample(settings.voxel_size);
        log::info!("Ausgedünnt: {} → {} Punkte", before, cloud.len());
    }

    // ── Speichern ────────────────────────────────────────────────
    cancel.check()?;
    progress(ReprocessStage::Save);
    let output = work_file_path(&request.raw_path, &settings.work_file_suffix);
    let temp = output.with_extension("ply.tmp");
    let written = codec
        .save(&temp, &cloud, PlyFormat::BinaryLittleEndian)
        .and_then(|()| {
            cancel.check()?;
            std::fs::rename(&temp, &output)
                .with_context(|| format!("Umbenennen nach {} fehlgeschlagen", output.display()))
        });

    if let Err(err) = written {
        remove_temp(&temp);
        return Err(match err.downcast::<ScanError>() {
            Ok(scan_error) => scan_error,
            Err(err) => ScanError::io(&output, &err),
        });
    }

    log::info!("Arbeitskopie geschrieben: {} ({} Punkte)", output.display(), cloud.len());
    Ok(ReprocessOutput {
        path: output,
        point_count: cloud.len(),
    })
}

/// Nivelliert per Ebenenfit und setzt den tiefsten Punkt auf z = 0.
fn level_transform(cloud: &PointCloud, settings: &ReprocessSettings) -> RigidTransform {
    let Some(fit) = fit_plane(
        cloud.positions(),
        settings.ground_fit_distance,
        settings.ground_fit_iterations,
    ) else {
        log::warn!("Keine Bodenebene gefunden, Rohdaten bleiben unverändert");
        return RigidTransform::IDENTITY;
    };
    let rotation = match rotation_to_z(orient_up(fit.normal)) {
        Ok(rotation) => RigidTransform::from_rotation(rotation),
        Err(err) => {
            log::warn!("Nivellierung übersprungen: {}", err);
            return RigidTransform::IDENTITY;
        }
    };

    let min_z = cloud
        .positions()
        .iter()
        .map(|p| rotation.apply(*p).z)
        .fold(f32::INFINITY, f32::min);
    if min_z.is_finite() {
        rotation.then(&RigidTransform::from_translation(Vec3::new(0.0, 0.0, -min_z)))
    } else {
        rotation
    }
}

fn remove_temp(path: &Path) {
    if path.exists() {
        if let Err(err) = std::fs::remove_file(path) {
            log::warn!("Temporäre Datei {} nicht entfernt: {}", path.display(), err);
        }
    }
}

// ── Hintergrund-Job ──────────────────────────────────────────────

/// Laufender Hintergrund-Job.
pub struct ReprocessJob {
    cancel: CancelToken,
    receiver: Receiver<ReprocessUpdate>,
    handle: Option<JoinHandle<()>>,
    /// Abschlussmeldung bereits ausgeliefert
    terminated: bool,
}

impl ReprocessJob {
    /// Startet die Pipeline auf einem eigenen Thread.
    pub fn spawn(request: ReprocessRequest, codec: Arc<dyn PointCloudCodec>) -> anyhow::Result<Self> {
        let (sender, receiver) = mpsc::channel();
        let cancel = CancelToken::new();
        let token = cancel.clone();

        let handle = std::thread::Builder::new()
            .name("reprocess".into())
            .spawn(move || {
                let progress_sender = sender.clone();
                let mut progress = |stage: ReprocessStage| {
                    // Empfänger kann bereits verworfen sein
                    let _ = progress_sender.send(ReprocessUpdate::Progress {
                        stage,
                        percent: stage.percent(),
                    });
                };
                let update = match run_pipeline(&request, codec.as_ref(), &token, &mut progress) {
                    Ok(output) => ReprocessUpdate::Finished {
                        output: output.path,
                        point_count: output.point_count,
                    },
                    Err(ScanError::Cancelled) => ReprocessUpdate::Cancelled,
                    Err(err) => ReprocessUpdate::Failed {
                        message: err.to_string(),
                    },
                };
                let _ = sender.send(update);
            })
            .context("Hintergrund-Thread konnte nicht gestartet werden")?;

        Ok(Self {
            cancel,
            receiver,
            handle: Some(handle),
            terminated: false,
        })
    }

    /// Fordert den Abbruch am nächsten Checkpoint an.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Alle bisher eingetroffenen Meldungen, ohne zu blockieren.
    ///
    /// Endet der Thread ohne Abschlussmeldung (Panic), wird ein `Failed`
    /// nachgereicht, damit der Job nie hängen bleibt.
    pub fn try_updates(&mut self) -> Vec<ReprocessUpdate> {
        let mut updates = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(update) => {
                    self.terminated |= is_terminal(&update);
                    updates.push(update);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.terminated {
                        log::error!("Hintergrund-Thread ohne Abschlussmeldung beendet");
                        self.terminated = true;
                        updates.push(ReprocessUpdate::Failed {
                            message: "Hintergrund-Thread unerwartet beendet".into(),
                        });
                    }
                    break;
                }
            }
        }
        updates
    }

    /// Wartet auf das Ende des Jobs und liefert alle restlichen Meldungen,
    /// immer mit genau einer Abschlussmeldung.
    pub fn wait(mut self) -> Vec<ReprocessUpdate> {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Hintergrund-Thread ist abgestürzt");
            }
        }
        self.try_updates()
    }
}

impl std::fmt::Debug for ReprocessJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReprocessJob")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("terminated", &self.terminated)
            .finish()
    }
}

/// `true` für Meldungen, die den Job beenden.
pub fn is_terminal(update: &ReprocessUpdate) -> bool {
    !matches!(update, ReprocessUpdate::Progress { .. })
}
