use std::path::PathBuf;

use crate::app::input::InputEvent;
use crate::app::tools::{
    InteractionMode, MarkerId, MeasureMode, MeasurementId, ReferenceId, ReferenceKind, Submode,
};
use crate::core::{ProjectionMode, ViewPreset};
use crate::shared::EditorOptions;

/// Commands sind mutierende Schritte, die zentral ausgeführt werden.
#[derive(Debug, Clone)]
pub enum AppCommand {
    // ── Datei & Workflow ────────────────────────────────────────
    /// Rohscan als dezimierte Vorschau laden (Stufe 1)
    LoadPreview { path: PathBuf },
    /// Arbeitskopie laden (Stufe 2)
    LoadWorkFile { path: PathBuf },
    /// Hochauflösende Neuverarbeitung im Hintergrund starten
    StartReprocess,
    /// Fortschritt des Hintergrund-Jobs abholen
    PollReprocess,
    /// Hintergrund-Job abbrechen
    CancelReprocess,
    /// Optionen ersetzen
    ApplyOptions { options: Box<EditorOptions> },
    /// Optionen auf Standardwerte zurücksetzen
    ResetOptions,
    /// Optionen als TOML speichern (`None` = neben der Binary)
    SaveOptions { path: Option<PathBuf> },

    // ── Interaktionsmodus ───────────────────────────────────────
    /// Modus aktivieren (der vorherige wird vollständig abgebaut)
    Activate { mode: InteractionMode },
    /// Aktiven Modus abbauen
    Deactivate,
    /// Untermodus des aktiven Modus setzen
    SetSubmode { submode: Submode },
    /// Eingabe-Event aus dem Viewport
    Input { event: InputEvent },

    // ── History ─────────────────────────────────────────────────
    PushHistory,
    Undo,

    // ── Selektion ───────────────────────────────────────────────
    DeleteSelection,
    InvertSelection,
    ClearSelection,

    // ── Kalibrierung ────────────────────────────────────────────
    /// Referenzgitter einblenden (Seitenansicht)
    StartGroundPreview,
    /// Boden per RANSAC erkennen und ausrichten
    AutoGround,
    /// Boden über drei Klicks bestimmen
    StartManualGround,
    ConfirmGround,
    /// Nordausrichtung über zwei Klicks starten
    StartNorthAlignment,
    ConfirmNorth,
    /// Feinjustage um einen festen Winkel (Grad), ohne History
    RotateNorth { degrees: f32 },

    // ── Messung ─────────────────────────────────────────────────
    SetMeasureMode { mode: MeasureMode },
    FinishPolyline,
    HighlightMeasurement { id: MeasurementId },
    DeleteMeasurement { id: MeasurementId },
    ClearMeasurements,

    // ── Referenzen & Marker ─────────────────────────────────────
    SetReferenceKind { kind: ReferenceKind },
    ActivateReference { id: ReferenceId },
    DeleteReference { id: ReferenceId },
    SetMarkerPrefix { prefix: String },
    DeleteMarker { id: MarkerId },
    /// Mess- und Referenzgeometrie vor der Wolke zeichnen
    SetXray { enabled: bool },

    // ── Ansicht ─────────────────────────────────────────────────
    SetViewPreset { preset: ViewPreset },
    SetProjectionMode { mode: ProjectionMode },
    FitView,
}
