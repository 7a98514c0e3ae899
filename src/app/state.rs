//! Application State: zentrale Datenhaltung einer Sitzung.

use std::path::PathBuf;
use std::sync::Arc;

use super::events::AppEvent;
use super::history::{HistoryManager, SessionSnapshot};
use super::input::InputRouter;
use super::reprocess::ReprocessJob;
use super::scene::SceneManager;
use super::tools::{InteractionMode, ToolContext, ToolSet};
use super::CommandLog;
use crate::core::{OrientedBox, PointCloud, RigidTransform};
use crate::ply::{PlyCodec, PointCloudCodec};
use crate::shared::EditorOptions;

/// Arbeitsstufe der Werkbank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkflowStage {
    /// Grobe Vorbereitung auf der dezimierten Vorschau
    #[default]
    Prepare,
    /// Feinarbeit auf der Arbeitskopie
    Editor,
}

impl WorkflowStage {
    /// Undo-Tiefe der Stufe.
    pub fn history_capacity(self, options: &EditorOptions) -> usize {
        match self {
            WorkflowStage::Prepare => options.history_capacity_prepare,
            WorkflowStage::Editor => options.history_capacity_editor,
        }
    }
}

/// Hauptzustand der Anwendung.
pub struct AppState {
    /// Aktuelle Punktwolke (wird nie in-place verändert)
    pub cloud: Option<Arc<PointCloud>>,
    /// Undo-Stack
    pub history: HistoryManager<SessionSnapshot>,
    /// Akkumulierte Kalibrier-Transformation seit dem Laden
    pub accumulated: RigidTransform,
    pub stage: WorkflowStage,
    /// Alle Interaktionsmodi und der aktive Modus
    pub tools: ToolSet,
    /// Eingabe-Registrierung des aktiven Modus
    pub router: InputRouter,
    /// Laufzeit-Optionen
    pub options: EditorOptions,
    /// Command-Log
    pub command_log: CommandLog,
    /// Pfad der geladenen Rohdaten (Quelle für die Neuverarbeitung)
    pub source_path: Option<PathBuf>,
    /// Laufender Hintergrund-Job
    pub reprocess: Option<ReprocessJob>,
    /// Codec für Arbeitskopie und Neuverarbeitung
    pub codec: Arc<dyn PointCloudCodec>,
    /// Von Tools erzeugte, noch nicht verarbeitete Events
    pub(crate) pending_events: Vec<AppEvent>,
    /// Verarbeitete Events für die UI
    outbox: Vec<AppEvent>,
}

impl AppState {
    /// Erstellt einen neuen, leeren App-State.
    pub fn new() -> Self {
        Self::with_options(EditorOptions::default())
    }

    pub fn with_options(options: EditorOptions) -> Self {
        let stage = WorkflowStage::default();
        Self {
            cloud: None,
            history: HistoryManager::new_with_capacity(stage.history_capacity(&options)),
            accumulated: RigidTransform::IDENTITY,
            stage,
            tools: ToolSet::new(),
            router: InputRouter::new(),
            options,
            command_log: CommandLog::new(),
            source_path: None,
            reprocess: None,
            codec: Arc::new(PlyCodec::new()),
            pending_events: Vec::new(),
            outbox: Vec::new(),
        }
    }

    /// Gibt die Anzahl der Punkte zurück.
    pub fn point_count(&self) -> usize {
        self.cloud.as_ref().map_or(0, |cloud| cloud.len())
    }

    pub fn active_mode(&self) -> Option<InteractionMode> {
        self.tools.active_mode()
    }

    /// Summe aller Kalibrier-Schritte seit dem Laden.
    pub fn accumulated_transform(&self) -> RigidTransform {
        self.accumulated
    }

    /// Zuschnittbereich: PCA-Box der Selektion, sonst der ganzen Wolke, skaliert.
    pub fn crop_region(&self) -> Option<OrientedBox> {
        let cloud = self.cloud.as_deref()?;
        let scale = self.options.crop_scale;
        self.tools
            .selection
            .crop_region(cloud, scale)
            .or_else(|| OrientedBox::from_points(cloud.positions()).map(|b| b.scaled(scale)))
    }

    /// Entnimmt alle Events seit dem letzten Aufruf.
    pub fn take_events(&mut self) -> Vec<AppEvent> {
        std::mem::take(&mut self.outbox)
    }

    pub(crate) fn publish(&mut self, event: AppEvent) {
        self.outbox.push(event);
    }

    /// Teilt den State in Tools, Router und den per Event ausgeliehenen Kontext.
    pub(crate) fn split<'a>(
        &'a mut self,
        scene: &'a mut dyn SceneManager,
    ) -> (&'a mut ToolSet, &'a mut InputRouter, ToolContext<'a>) {
        let ctx = ToolContext {
            cloud: &mut self.cloud,
            history: &mut self.history,
            accumulated: &mut self.accumulated,
            scene,
            events: &mut self.pending_events,
            options: &self.options,
        };
        (&mut self.tools, &mut self.router, ctx)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
