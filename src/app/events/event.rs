use glam::{Vec2, Vec3};

use crate::app::reprocess::ReprocessStage;
use crate::app::state::WorkflowStage;
use crate::app::tools::{MarkerId, MeasurementId, ReferenceId, ReferenceKind};
use crate::core::RigidTransform;

/// Ausgehende Events an UI-Kollaborateure (Statusleiste, Listen, Dialoge).
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// Neue Selektionsgröße (0 = leer)
    SelectionChanged { count: usize },
    /// Messung angelegt, `text` ist die Listenbeschriftung
    MeasurementAdded { text: String, id: MeasurementId },
    /// Referenz angelegt und aktiv gesetzt
    ReferenceAdded {
        kind: ReferenceKind,
        id: ReferenceId,
        p1: Vec3,
        p2: Option<Vec3>,
    },
    MarkerAdded { label: String, id: MarkerId },
    /// Benutzerhinweis für die Statusleiste
    StatusMessage { text: String },
    /// Gelöschter Bereich als Screen-Polygon; `inverted` = außerhalb gelöscht
    RegionDeleted { polygon: Vec<Vec2>, inverted: bool },
    /// Akkumulierte Kalibrier-Transformation nach jeder Anwendung
    TransformUpdated { transform: RigidTransform },
    /// Nord-Feinjustage aktiv (UI zeigt Bestätigungsdialog)
    NorthTuningStarted,
    StageChanged { stage: WorkflowStage },
    ReprocessProgress { stage: ReprocessStage, percent: u8 },
    ReprocessFinished { output: std::path::PathBuf },
}
