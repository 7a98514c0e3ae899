//! Lasso-Selektion: Zustandsautomat `Idle → Drawing → Settled`.
//!
//! Die Selektion hält Indizes in die Wolke einer bestimmten Generation.
//! Ändert sich die Generation oder der Modus, wird sie verworfen.

use glam::Vec2;

use crate::app::events::AppEvent;
use crate::app::input::{InputEvent, InputKind, ALL_INPUT};
use crate::app::scene::{Primitive, PrimitiveHandle, RenderRole};
use crate::core::{OrientedBox, PointCloud, Projector, ScreenPolygon};
use crate::error::ScanError;

use super::common::PanDrag;
use super::{InteractionMode, InteractionTool, Submode, ToolContext};

/// Punktgröße der Selektions-Hervorhebung.
const SELECTION_POINT_SIZE_PX: f32 = 3.0;
/// Mindestanzahl selektierter Punkte für eine eigene Crop-Box.
const MIN_CROP_POINTS: usize = 4;

/// Phase der Lasso-Geste.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionPhase {
    #[default]
    Idle,
    Drawing,
    Settled,
}

/// Ergebnis einer Lasso-Selektion.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionSet {
    /// Aufsteigend sortierte Punkt-Indizes
    pub indices: Vec<usize>,
    /// Erzeugendes Screen-Polygon
    pub polygon: ScreenPolygon,
    /// Generation der Wolke, auf die sich `indices` beziehen
    pub generation: u64,
    /// `true` nach ungerader Anzahl Invertierungen
    pub inverted: bool,
}

/// Selektiert alle gültig projizierten Punkte strikt innerhalb des Polygons.
pub fn select_in_polygon(
    projector: &Projector,
    points: &[glam::Vec3],
    polygon: &ScreenPolygon,
) -> Vec<usize> {
    points
        .iter()
        .enumerate()
        .filter_map(|(index, point)| {
            let projected = projector.project_point(*point);
            (projected.valid && polygon.contains(projected.screen)).then_some(index)
        })
        .collect()
}

/// Komplement einer sortierten Indexmenge über `[0, len)`.
pub fn invert_indices(indices: &[usize], len: usize) -> Vec<usize> {
    let mut selected = vec![false; len];
    for &index in indices {
        if index < len {
            selected[index] = true;
        }
    }
    selected
        .iter()
        .enumerate()
        .filter_map(|(index, &hit)| (!hit).then_some(index))
        .collect()
}

/// Lasso-Selektionsmodus.
#[derive(Debug, Default)]
pub struct SelectionEngine {
    submode: Submode,
    phase: SelectionPhase,
    vertices: Vec<Vec2>,
    trace: Option<PrimitiveHandle>,
    highlight: Option<PrimitiveHandle>,
    selection: Option<SelectionSet>,
    pan: PanDrag,
}

impl SelectionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> SelectionPhase {
        self.phase
    }

    pub fn selection(&self) -> Option<&SelectionSet> {
        self.selection.as_ref()
    }

    /// Anzahl selektierter Punkte.
    pub fn selected_count(&self) -> usize {
        self.selection.as_ref().map_or(0, |s| s.indices.len())
    }

    /// Vertices der laufenden oder letzten Geste.
    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices
    }

    /// Invertiert die Selektion über die gesamte Wolke.
    pub fn invert(&mut self, ctx: &mut ToolContext<'_>) {
        self.sync_with_cloud(ctx);
        let Some(len) = ctx.cloud().map(PointCloud::len) else {
            log::debug!("Invertieren ohne Wolke ignoriert");
            return;
        };
        let Some(selection) = self.selection.as_mut() else {
            log::debug!("Invertieren ohne Selektion ignoriert");
            return;
        };

        selection.indices = invert_indices(&selection.indices, len);
        selection.inverted = !selection.inverted;
        let count = selection.indices.len();
        self.refresh_highlight(ctx);
        ctx.emit(AppEvent::SelectionChanged { count });
    }

    /// Löscht die selektierten Punkte. Immer mit vorherigem History-Eintrag.
    pub fn delete_selected(&mut self, ctx: &mut ToolContext<'_>) {
        self.sync_with_cloud(ctx);
        let Some(selection) = self.selection.take() else {
            log::debug!("Löschen ohne Selektion ignoriert");
            return;
        };
        let Some(cloud) = ctx.cloud.clone() else {
            return;
        };
        if selection.indices.is_empty() {
            log::debug!("Leere Selektion, nichts zu löschen");
            self.selection = Some(selection);
            return;
        }

        ctx.push_history();
        let remaining = cloud.without_indices(&selection.indices);
        let removed = cloud.len() - remaining.len();
        ctx.replace_cloud(remaining);

        if selection.polygon.is_closed_area() {
            ctx.emit(AppEvent::RegionDeleted {
                polygon: selection.polygon.vertices().to_vec(),
                inverted: selection.inverted,
            });
        }
        self.clear_visuals(ctx);
        self.phase = SelectionPhase::Idle;
        ctx.emit(AppEvent::SelectionChanged { count: 0 });
        ctx.status(format!("{} Punkte gelöscht", removed));
    }

    /// Verwirft die Selektion samt Hervorhebung.
    pub fn clear(&mut self, ctx: &mut ToolContext<'_>) {
        let had_selection = self.selection.take().is_some();
        self.clear_visuals(ctx);
        self.vertices.clear();
        self.phase = SelectionPhase::Idle;
        if had_selection {
            ctx.emit(AppEvent::SelectionChanged { count: 0 });
        }
    }

    /// Verwirft die Selektion, wenn sie zu einer älteren Wolken-Generation gehört.
    pub fn sync_with_cloud(&mut self, ctx: &mut ToolContext<'_>) {
        let current = ctx.cloud().map(PointCloud::generation);
        let stale = self
            .selection
            .as_ref()
            .is_some_and(|s| Some(s.generation) != current);
        if stale {
            log::debug!("Selektion nach Generationswechsel verworfen");
            self.clear(ctx);
        }
    }

    /// PCA-Box der Selektion, skaliert; `None` bei weniger als vier Punkten.
    pub fn crop_region(&self, cloud: &PointCloud, scale: f32) -> Option<OrientedBox> {
        let selection = self
            .selection
            .as_ref()
            .filter(|s| s.generation == cloud.generation())?;
        if selection.indices.len() < MIN_CROP_POINTS {
            return None;
        }
        OrientedBox::from_points(&cloud.positions_at(&selection.indices)).map(|b| b.scaled(scale))
    }

    // ── Geste ────────────────────────────────────────────────────

    fn begin_lasso(&mut self, ctx: &mut ToolContext<'_>) {
        self.remove_trace(ctx);
        self.vertices.clear();
        self.phase = SelectionPhase::Drawing;
    }

    fn extend_lasso(&mut self, pos: Vec2, ctx: &mut ToolContext<'_>) {
        if self.phase != SelectionPhase::Drawing {
            return;
        }

        if let Some(&previous) = self.vertices.last() {
            let gap = previous.distance(pos);
            if gap > ctx.options.lasso_gap_px {
                let steps = (gap / ctx.options.lasso_step_px).ceil() as usize;
                for step in 1..steps {
                    self.vertices
                        .push(previous.lerp(pos, step as f32 / steps as f32));
                }
            }
        }
        self.vertices.push(pos);
        self.redraw_trace(ctx);
    }

    fn finish_lasso(&mut self, ctx: &mut ToolContext<'_>) {
        if self.phase != SelectionPhase::Drawing {
            return;
        }
        self.remove_trace(ctx);

        if self.vertices.len() < ctx.options.lasso_min_vertices {
            log::debug!(
                "Lasso mit {} Vertices als Tippen verworfen",
                self.vertices.len()
            );
            self.vertices.clear();
            self.phase = if self.selection.is_some() {
                SelectionPhase::Settled
            } else {
                SelectionPhase::Idle
            };
            return;
        }

        let Some(cloud) = ctx.cloud.clone() else {
            self.phase = SelectionPhase::Idle;
            return;
        };
        let polygon = ScreenPolygon::new(self.vertices.clone());
        let indices = select_in_polygon(&ctx.scene.projector(), cloud.positions(), &polygon);
        let count = indices.len();

        self.selection = Some(SelectionSet {
            indices,
            polygon,
            generation: cloud.generation(),
            inverted: false,
        });
        self.phase = SelectionPhase::Settled;
        self.refresh_highlight(ctx);
        ctx.emit(AppEvent::SelectionChanged { count });
        log::info!("Lasso-Selektion: {} Punkte", count);
    }

    // ── Visuals ──────────────────────────────────────────────────

    fn redraw_trace(&mut self, ctx: &mut ToolContext<'_>) {
        self.remove_trace(ctx);
        self.trace = Some(ctx.scene.add_primitive(
            Primitive::ScreenTrace {
                vertices: self.vertices.clone(),
            },
            RenderRole::Guide,
            ctx.options.colors.lasso_trace,
        ));
    }

    fn remove_trace(&mut self, ctx: &mut ToolContext<'_>) {
        if let Some(handle) = self.trace.take() {
            ctx.scene.remove_primitive(handle);
        }
    }

    fn refresh_highlight(&mut self, ctx: &mut ToolContext<'_>) {
        if let Some(handle) = self.highlight.take() {
            ctx.scene.remove_primitive(handle);
        }
        let positions = match (self.selection.as_ref(), ctx.cloud()) {
            (Some(selection), Some(cloud)) if !selection.indices.is_empty() => {
                cloud.positions_at(&selection.indices)
            }
            _ => return,
        };
        self.highlight = Some(ctx.scene.add_primitive(
            Primitive::Points {
                positions,
                size_px: SELECTION_POINT_SIZE_PX,
            },
            RenderRole::Guide,
            ctx.options.colors.selection,
        ));
    }

    fn clear_visuals(&mut self, ctx: &mut ToolContext<'_>) {
        self.remove_trace(ctx);
        if let Some(handle) = self.highlight.take() {
            ctx.scene.remove_primitive(handle);
        }
    }
}

impl InteractionTool for SelectionEngine {
    fn mode(&self) -> InteractionMode {
        InteractionMode::Selection
    }

    fn submode(&self) -> Submode {
        self.submode
    }

    fn set_submode(&mut self, submode: Submode, ctx: &mut ToolContext<'_>) {
        // Laufende Geste verwerfen, Selektion bleibt erhalten
        if self.phase == SelectionPhase::Drawing {
            self.remove_trace(ctx);
            self.vertices.clear();
            self.phase = if self.selection.is_some() {
                SelectionPhase::Settled
            } else {
                SelectionPhase::Idle
            };
        }
        self.pan.reset();
        self.submode = submode;
    }

    fn draw_input(&self) -> &'static [InputKind] {
        ALL_INPUT
    }

    fn deactivate(&mut self, ctx: &mut ToolContext<'_>) {
        self.pan.reset();
        self.clear(ctx);
    }

    fn on_input(&mut self, event: InputEvent, ctx: &mut ToolContext<'_>) -> Result<(), ScanError> {
        match self.submode {
            Submode::View => {}
            Submode::Pan => self.pan.handle(event, ctx.scene),
            Submode::Draw => match event {
                InputEvent::Press { .. } => self.begin_lasso(ctx),
                InputEvent::Move { pos } => self.extend_lasso(pos, ctx),
                InputEvent::Release { .. } => self.finish_lasso(ctx),
            },
        }
        Ok(())
    }
}
