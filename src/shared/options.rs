//! Zentrale Konfiguration der Scan-Werkbank.
//!
//! `EditorOptions` enthält alle zur Laufzeit änderbaren Werte.
//! Die `const`-Werte bleiben als Fallback/Default erhalten.

use serde::{Deserialize, Serialize};

// ── Interaktion ─────────────────────────────────────────────────────

/// Snap-Toleranz beim Picken in Screen-Pixeln.
pub const PICK_TOLERANCE_PX: f32 = 8.0;
/// Press/Release-Abstand, unter dem ein Drag als Klick gilt.
pub const CLICK_TOLERANCE_PX: f32 = 10.0;

// ── Lasso ───────────────────────────────────────────────────────────

/// Mindestanzahl Lasso-Ecken, darunter gilt die Geste als versehentlicher Tap.
pub const LASSO_MIN_VERTICES: usize = 10;
/// Pixel-Lücke, ab der zwischen zwei Lasso-Ecken interpoliert wird.
pub const LASSO_GAP_PX: f32 = 10.0;
/// Schrittweite der Interpolation in Pixeln.
pub const LASSO_STEP_PX: f32 = 5.0;

// ── Kalibrierung ────────────────────────────────────────────────────

/// Abstandsschwelle des RANSAC-Bodenfits.
pub const GROUND_FIT_DISTANCE: f32 = 0.1;
/// Iterationen des RANSAC-Bodenfits.
pub const GROUND_FIT_ITERATIONS: usize = 1000;
/// Nord-Feinjustage: Grad pro Pixel horizontaler Mausbewegung.
pub const NORTH_TUNING_DEG_PER_PX: f32 = 0.2;
/// Kantenlänge des Referenzgitters relativ zur größten XY-Ausdehnung.
pub const GRID_SCALE: f32 = 2.5;
/// Zellen pro Gitterseite.
pub const GRID_RESOLUTION: u32 = 100;
/// Länge des Nordpfeils relativ zur größten XY-Ausdehnung.
pub const NORTH_ARROW_SCALE: f32 = 0.4;

// ── Workflow ────────────────────────────────────────────────────────

/// Undo-Tiefe in der Vorbereitungsstufe.
pub const HISTORY_CAPACITY_PREPARE: usize = 1;
/// Undo-Tiefe in der Editor-Stufe.
pub const HISTORY_CAPACITY_EDITOR: usize = 5;
/// Skalierung der Zuschnitt-Box.
pub const CROP_SCALE: f32 = 1.05;
/// Proximity-Schwelle zwischen Vorschau und Rohdaten (Welteinheiten).
pub const PROXIMITY_THRESHOLD: f32 = 0.15;
/// Voxelgröße der Arbeitskopie.
pub const WORK_VOXEL_SIZE: f32 = 0.02;
/// Punktzahl, ab der die Vorschau dezimiert wird.
pub const PREVIEW_POINT_LIMIT: usize = 3_000_000;
/// Vorschau-Voxelgröße = Bounding-Box-Diagonale / Divisor.
pub const PREVIEW_VOXEL_DIVISOR: f32 = 500.0;
/// Dateinamen-Suffix der Arbeitskopie.
pub const WORK_FILE_SUFFIX: &str = "_work";

// ── Referenzen & Marker ─────────────────────────────────────────────

/// Sichtbare Verlängerung einer Basislinie in beide Richtungen.
pub const REFERENCE_LINE_EXTENSION: f32 = 500.0;
/// Standard-Präfix der Marker-Beschriftung.
pub const MARKER_LABEL_PREFIX: &str = "Evidence";
/// Messungen und Referenzen werden vor der Wolke gezeichnet (X-Ray).
pub const XRAY_OVERLAYS: bool = true;

// ── Farben ──────────────────────────────────────────────────────────

/// Endpunkt-Marker (RGBA: Rot).
pub const COLOR_ENDPOINT: [f32; 4] = [1.0, 0.0, 0.0, 1.0];
/// Polylinien-Messung (RGBA: Gelb).
pub const COLOR_POLYLINE: [f32; 4] = [1.0, 1.0, 0.0, 1.0];
/// Lotabstand (RGBA: Cyan).
pub const COLOR_PERPENDICULAR: [f32; 4] = [0.0, 1.0, 1.0, 1.0];
/// Direktabstand (RGBA: Grün).
pub const COLOR_DIRECT: [f32; 4] = [0.0, 1.0, 0.0, 1.0];
/// Hervorgehobene Messung (RGBA: Magenta).
pub const COLOR_HIGHLIGHT: [f32; 4] = [1.0, 0.0, 1.0, 1.0];
/// Referenzgeometrie und Beschriftungen (RGBA: Weiß).
pub const COLOR_REFERENCE: [f32; 4] = [1.0, 1.0, 1.0, 1.0];
/// Beweis-Marker (RGBA: Blau).
pub const COLOR_MARKER: [f32; 4] = [0.0, 0.0, 1.0, 1.0];
/// Selektions-Highlight (RGBA: Rot).
pub const COLOR_SELECTION: [f32; 4] = [1.0, 0.0, 0.0, 1.0];
/// Lasso-Spur (RGBA: Magenta).
pub const COLOR_LASSO_TRACE: [f32; 4] = [1.0, 0.0, 1.0, 1.0];
/// Gepickte Bodenpunkte (RGBA: Cyan).
pub const COLOR_GROUND_PICK: [f32; 4] = [0.0, 1.0, 1.0, 1.0];
/// Gepickte Nordpunkte (RGBA: Orange).
pub const COLOR_NORTH_PICK: [f32; 4] = [1.0, 0.5, 0.0, 1.0];
/// Nordpfeil (RGBA: Gelb).
pub const COLOR_NORTH_ARROW: [f32; 4] = [1.0, 1.0, 0.0, 1.0];
/// Referenzgitter (RGBA: Weiß, halbtransparent).
pub const COLOR_GRID: [f32; 4] = [1.0, 1.0, 1.0, 0.3];

/// Farbzuordnung der Szene-Primitive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ColorPalette {
    pub endpoint: [f32; 4],
    pub polyline: [f32; 4],
    pub perpendicular: [f32; 4],
    pub direct: [f32; 4],
    pub highlight: [f32; 4],
    pub reference: [f32; 4],
    pub marker: [f32; 4],
    pub selection: [f32; 4],
    pub lasso_trace: [f32; 4],
    pub ground_pick: [f32; 4],
    pub north_pick: [f32; 4],
    pub north_arrow: [f32; 4],
    pub grid: [f32; 4],
}

impl Default for ColorPalette {
    fn default() -> Self {
        Self {
            endpoint: COLOR_ENDPOINT,
            polyline: COLOR_POLYLINE,
            perpendicular: COLOR_PERPENDICULAR,
            direct: COLOR_DIRECT,
            highlight: COLOR_HIGHLIGHT,
            reference: COLOR_REFERENCE,
            marker: COLOR_MARKER,
            selection: COLOR_SELECTION,
            lasso_trace: COLOR_LASSO_TRACE,
            ground_pick: COLOR_GROUND_PICK,
            north_pick: COLOR_NORTH_PICK,
            north_arrow: COLOR_NORTH_ARROW,
            grid: COLOR_GRID,
        }
    }
}

// ── Laufzeit-Optionen (serialisierbar) ─────────────────────────────

/// Alle zur Laufzeit änderbaren Optionen.
/// Wird als `crash_site_scan.toml` neben der Binary gespeichert.
/// Fehlende Felder fallen auf die Konstanten zurück.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EditorOptions {
    // ── Interaktion ─────────────────────────────────────────────
    /// Snap-Toleranz beim Picken in Screen-Pixeln
    pub pick_tolerance_px: f32,
    /// Maximaler Press/Release-Abstand für Klicks
    pub click_tolerance_px: f32,

    // ── Lasso ───────────────────────────────────────────────────
    pub lasso_min_vertices: usize,
    pub lasso_gap_px: f32,
    pub lasso_step_px: f32,

    // ── Kalibrierung ────────────────────────────────────────────
    pub ground_fit_distance: f32,
    pub ground_fit_iterations: usize,
    /// Grad pro Pixel bei der Nord-Feinjustage
    pub north_tuning_deg_per_px: f32,
    pub grid_scale: f32,
    pub grid_resolution: u32,
    pub north_arrow_scale: f32,

    // ── Workflow ────────────────────────────────────────────────
    pub history_capacity_prepare: usize,
    pub history_capacity_editor: usize,
    pub crop_scale: f32,
    /// Inklusive Distanzschwelle der Proximity-Maske
    pub proximity_threshold: f32,
    pub work_voxel_size: f32,
    pub preview_point_limit: usize,
    pub preview_voxel_divisor: f32,
    pub work_file_suffix: String,

    // ── Referenzen & Marker ─────────────────────────────────────
    pub reference_line_extension: f32,
    pub marker_label_prefix: String,
    /// Mess- und Referenzgeometrie unabhängig von der Tiefe zeichnen
    pub xray_overlays: bool,

    // ── Farben ──────────────────────────────────────────────────
    pub colors: ColorPalette,
}

impl Default for EditorOptions {
    fn default() -> Self {
        Self {
            pick_tolerance_px: PICK_TOLERANCE_PX,
            click_tolerance_px: CLICK_TOLERANCE_PX,

            lasso_min_vertices: LASSO_MIN_VERTICES,
            lasso_gap_px: LASSO_GAP_PX,
            lasso_step_px: LASSO_STEP_PX,

            ground_fit_distance: GROUND_FIT_DISTANCE,
            ground_fit_iterations: GROUND_FIT_ITERATIONS,
            north_tuning_deg_per_px: NORTH_TUNING_DEG_PER_PX,
            grid_scale: GRID_SCALE,
            grid_resolution: GRID_RESOLUTION,
            north_arrow_scale: NORTH_ARROW_SCALE,

            history_capacity_prepare: HISTORY_CAPACITY_PREPARE,
            history_capacity_editor: HISTORY_CAPACITY_EDITOR,
            crop_scale: CROP_SCALE,
            proximity_threshold: PROXIMITY_THRESHOLD,
            work_voxel_size: WORK_VOXEL_SIZE,
            preview_point_limit: PREVIEW_POINT_LIMIT,
            preview_voxel_divisor: PREVIEW_VOXEL_DIVISOR,
            work_file_suffix: WORK_FILE_SUFFIX.to_string(),

            reference_line_extension: REFERENCE_LINE_EXTENSION,
            marker_label_prefix: MARKER_LABEL_PREFIX.to_string(),
            xray_overlays: XRAY_OVERLAYS,

            colors: ColorPalette::default(),
        }
    }
}

impl EditorOptions {
    /// Lädt Optionen aus einer TOML-Datei. Bei Fehler: Standardwerte.
    pub fn load_from_file(path: &std::path::Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(opts) => {
                    log::info!("Optionen geladen aus: {}", path.display());
                    opts
                }
                Err(e) => {
                    log::warn!("Optionen-Datei fehlerhaft, verwende Standardwerte: {}", e);
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("Keine Optionen-Datei gefunden, verwende Standardwerte");
                Self::default()
            }
        }
    }

    /// Speichert Optionen als TOML-Datei.
    pub fn save_to_file(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        log::info!("Optionen gespeichert nach: {}", path.display());
        Ok(())
    }

    /// Ermittelt den Pfad zur Optionen-Datei neben der Binary.
    pub fn config_path() -> std::path::PathBuf {
        std::env::current_exe()
            .unwrap_or_else(|_| std::path::PathBuf::from("crash_site_scan"))
            .parent()
            .unwrap_or_else(|| std::path::Path::new("."))
            .join("crash_site_scan.toml")
    }

    /// Nord-Feinjustage in Bogenmaß pro Pixel.
    pub fn north_tuning_rad_per_px(&self) -> f32 {
        self.north_tuning_deg_per_px.to_radians()
    }
}
