//! Trait-basiertes Interaktionssystem: genau ein Modus ist aktiv.
//!
//! Jeder Modus implementiert `InteractionTool` und wird im `ToolSet` gehalten.
//! Modi besitzen keine eigene Kopie der Punktwolke: der Zustand wird pro
//! Event über den `ToolContext` ausgeliehen.

/// Kalibrier-Engine (Boden- und Nordausrichtung).
pub mod calibration;
/// Gemeinsame Gesten-Helfer (Pan, Klick-Erkennung, Marker).
pub mod common;
/// InteractionTool-Trait: Schnittstelle für alle Modi.
mod interaction_tool;
/// Beweis-Marker.
pub mod marker;
/// Messungen (Polylinie, Lotabstand, Direktabstand).
pub mod measure;
/// Referenzlinien und -punkte.
pub mod reference;
/// Lasso-Selektion.
pub mod selection;

pub use calibration::{CalibrationEngine, CalibrationPhase};
pub use interaction_tool::InteractionTool;
pub use marker::{Marker, MarkerId, MarkerTool};
pub use measure::{MeasureMode, Measurement, MeasurementEngine, MeasurementId, MeasurementSegment};
pub use reference::{ReferenceEntity, ReferenceId, ReferenceKind, ReferenceTool};
pub use selection::{SelectionEngine, SelectionPhase, SelectionSet};

use std::sync::Arc;

use glam::Vec2;

use crate::app::events::AppEvent;
use crate::app::history::{HistoryManager, SessionSnapshot};
use crate::app::scene::SceneManager;
use crate::core::{PickResult, PointCloud, RigidTransform};
use crate::shared::EditorOptions;

// ── Typen ────────────────────────────────────────────────────────

/// Interaktionsmodus der Werkbank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InteractionMode {
    Selection,
    Calibration,
    Measurement,
    Reference,
    Marker,
}

/// Untermodus eines Interaktionsmodus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Submode {
    /// Kamera gehört dem Szenen-Manager, Eingaben werden ignoriert
    View,
    /// Press/Move/Release verschieben die Kamera
    Pan,
    /// Modus-spezifisches Zeichnen/Picken
    #[default]
    Draw,
}

// ── ToolContext ──────────────────────────────────────────────────

/// Pro Event ausgeliehener Sitzungszustand.
pub struct ToolContext<'a> {
    pub cloud: &'a mut Option<Arc<PointCloud>>,
    pub history: &'a mut HistoryManager<SessionSnapshot>,
    /// Akkumulierte Kalibrier-Transformation der Sitzung
    pub accumulated: &'a mut RigidTransform,
    pub scene: &'a mut dyn SceneManager,
    pub events: &'a mut Vec<AppEvent>,
    pub options: &'a EditorOptions,
}

impl ToolContext<'_> {
    /// Reiht ein ausgehendes Event ein.
    pub fn emit(&mut self, event: AppEvent) {
        self.events.push(event);
    }

    /// Statusmeldung für die UI, zusätzlich geloggt.
    pub fn status(&mut self, text: impl Into<String>) {
        let text = text.into();
        log::info!("{}", text);
        self.events.push(AppEvent::StatusMessage { text });
    }

    /// Aktuelle Wolke (leer wenn nichts geladen).
    pub fn cloud(&self) -> Option<&PointCloud> {
        self.cloud.as_deref()
    }

    /// Positionen der aktuellen Wolke.
    pub fn positions(&self) -> &[glam::Vec3] {
        self.cloud.as_deref().map(PointCloud::positions).unwrap_or(&[])
    }

    /// Legt einen Snapshot von Wolke und akkumulierter Transformation ab.
    /// Ohne geladene Wolke gibt es nichts zu sichern.
    pub fn push_history(&mut self) {
        if let Some(cloud) = self.cloud.as_ref() {
            self.history.push(SessionSnapshot {
                cloud: Arc::clone(cloud),
                accumulated: *self.accumulated,
            });
        }
    }

    /// Ersetzt die Wolke (neue Generation) und aktualisiert die Szene.
    pub fn replace_cloud(&mut self, cloud: PointCloud) {
        self.scene.show_cloud(Some(&cloud));
        *self.cloud = Some(Arc::new(cloud));
    }

    /// Zweistufiger Pick an einer Pixelposition. Fokusebene = Kamera-Ziel.
    pub fn pick(&self, screen: Vec2) -> PickResult {
        let projector = self.scene.projector();
        let focal_point = self.scene.camera().target;
        projector.pick(
            screen,
            self.options.pick_tolerance_px,
            self.positions(),
            focal_point,
        )
    }
}

// ── ToolSet ──────────────────────────────────────────────────────

/// Hält alle Modi und den aktiven Modus.
#[derive(Debug, Default)]
pub struct ToolSet {
    pub selection: SelectionEngine,
    pub calibration: CalibrationEngine,
    pub measurement: MeasurementEngine,
    pub reference: ReferenceTool,
    pub marker: MarkerTool,
    active: Option<InteractionMode>,
}

impl ToolSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gibt den aktiven Modus zurück.
    pub fn active_mode(&self) -> Option<InteractionMode> {
        self.active
    }

    pub fn set_active(&mut self, mode: Option<InteractionMode>) {
        self.active = mode;
    }

    pub fn tool(&self, mode: InteractionMode) -> &dyn InteractionTool {
        match mode {
            InteractionMode::Selection => &self.selection,
            InteractionMode::Calibration => &self.calibration,
            InteractionMode::Measurement => &self.measurement,
            InteractionMode::Reference => &self.reference,
            InteractionMode::Marker => &self.marker,
        }
    }

    pub fn tool_mut(&mut self, mode: InteractionMode) -> &mut dyn InteractionTool {
        match mode {
            InteractionMode::Selection => &mut self.selection,
            InteractionMode::Calibration => &mut self.calibration,
            InteractionMode::Measurement => &mut self.measurement,
            InteractionMode::Reference => &mut self.reference,
            InteractionMode::Marker => &mut self.marker,
        }
    }

    /// Gibt eine mutable Referenz auf das aktive Tool zurück.
    pub fn active_tool_mut(&mut self) -> Option<&mut dyn InteractionTool> {
        let mode = self.active?;
        Some(self.tool_mut(mode))
    }
}
