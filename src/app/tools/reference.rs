//! Referenzlinien (zwei Picks) und Referenzpunkte (ein Pick).
//!
//! Jede neue Referenz wird per `ReferenceAdded` gemeldet; der Controller
//! setzt sie als aktive Referenz der Messungen.

use glam::{Vec2, Vec3};
use indexmap::IndexMap;

use crate::app::events::AppEvent;
use crate::app::input::{InputEvent, InputKind};
use crate::app::scene::{Primitive, PrimitiveHandle, RenderRole};
use crate::error::ScanError;

use super::common::{add_endpoint, add_label, remove_all, set_on_top, ClickGesture, PanDrag};
use super::{InteractionMode, InteractionTool, Submode, ToolContext};

/// Mindestlänge einer Referenzlinie.
const MIN_LINE_LENGTH: f32 = 1e-3;
/// Höhe der Punkt-Beschriftung über dem Referenzpunkt.
const POINT_LABEL_OFFSET: f32 = 0.5;

const CLICK_INPUT: &[InputKind] = &[InputKind::Press, InputKind::Release];

/// Stabile ID einer Referenz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReferenceId(pub u32);

/// Art einer Referenz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReferenceKind {
    #[default]
    Line,
    Point,
}

/// Geometrie einer Referenz.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReferenceEntity {
    Line { p1: Vec3, p2: Vec3 },
    Point { p: Vec3 },
}

impl ReferenceEntity {
    pub fn kind(&self) -> ReferenceKind {
        match self {
            ReferenceEntity::Line { .. } => ReferenceKind::Line,
            ReferenceEntity::Point { .. } => ReferenceKind::Point,
        }
    }
}

/// Persistierte Referenz samt Szene-Handles.
#[derive(Debug, Clone)]
pub struct Reference {
    pub id: ReferenceId,
    pub label: String,
    pub entity: ReferenceEntity,
    visuals: Vec<PrimitiveHandle>,
}

/// Referenz-Modus.
#[derive(Debug, Default)]
pub struct ReferenceTool {
    submode: Submode,
    kind: ReferenceKind,
    /// Erster Pick einer Linie samt Marker
    pending: Option<(Vec3, PrimitiveHandle)>,
    references: IndexMap<ReferenceId, Reference>,
    next_id: u32,
    line_count: u32,
    point_count: u32,
    click: ClickGesture,
    pan: PanDrag,
}

impl ReferenceTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(&self) -> ReferenceKind {
        self.kind
    }

    /// Wechselt die Art; ein halb gesetzter Linienpick wird verworfen.
    pub fn set_kind(&mut self, kind: ReferenceKind, ctx: &mut ToolContext<'_>) {
        self.discard_pending(ctx);
        self.kind = kind;
    }

    pub fn get(&self, id: ReferenceId) -> Option<&Reference> {
        self.references.get(&id)
    }

    /// Alle Referenzen in Erzeugungsreihenfolge.
    pub fn references(&self) -> impl Iterator<Item = &Reference> {
        self.references.values()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Wendet das X-Ray-Flag der Optionen auf alle Referenz-Visuals an.
    pub fn apply_xray(&self, ctx: &mut ToolContext<'_>) {
        let handles = self
            .references
            .values()
            .flat_map(|r| r.visuals.iter().copied())
            .chain(self.pending.map(|(_, marker)| marker));
        set_on_top(ctx.scene, handles, ctx.options.xray_overlays);
    }

    /// Entfernt eine Referenz samt Visuals.
    pub fn delete(&mut self, id: ReferenceId, ctx: &mut ToolContext<'_>) -> Option<Reference> {
        let mut reference = self.references.shift_remove(&id)?;
        remove_all(ctx.scene, &mut reference.visuals);
        ctx.status(format!("{} gelöscht", reference.label));
        Some(reference)
    }

    /// Entfernt alle Referenzen (z.B. beim Laden einer neuen Datei).
    pub fn clear_all(&mut self, ctx: &mut ToolContext<'_>) {
        self.discard_pending(ctx);
        for (_, mut reference) in self.references.drain(..) {
            remove_all(ctx.scene, &mut reference.visuals);
        }
        self.line_count = 0;
        self.point_count = 0;
    }

    fn handle_click(&mut self, screen: Vec2, ctx: &mut ToolContext<'_>) -> Result<(), ScanError> {
        let point = ctx.pick(screen).point;
        match (self.kind, self.pending) {
            (ReferenceKind::Point, _) => {
                self.add_reference(ReferenceEntity::Point { p: point }, ctx);
                Ok(())
            }
            (ReferenceKind::Line, None) => {
                let marker = add_endpoint(ctx.scene, point, ctx.options.colors.endpoint);
                ctx.scene.set_on_top(marker, ctx.options.xray_overlays);
                self.pending = Some((point, marker));
                ctx.status("Zweiten Punkt der Basislinie wählen");
                Ok(())
            }
            (ReferenceKind::Line, Some((p1, marker))) => {
                if p1.distance(point) < MIN_LINE_LENGTH {
                    return Err(ScanError::input(
                        "Basislinie zu kurz, bitte einen anderen Endpunkt wählen",
                    ));
                }
                ctx.scene.remove_primitive(marker);
                self.pending = None;
                self.add_reference(ReferenceEntity::Line { p1, p2: point }, ctx);
                Ok(())
            }
        }
    }

    fn add_reference(&mut self, entity: ReferenceEntity, ctx: &mut ToolContext<'_>) {
        self.next_id += 1;
        let id = ReferenceId(self.next_id);
        let color = ctx.options.colors.reference;
        let mut visuals = Vec::new();

        let (label, p1, p2) = match entity {
            ReferenceEntity::Line { p1, p2 } => {
                self.line_count += 1;
                let label = format!("Basislinie-{}", self.line_count);
                let direction = (p2 - p1).normalize_or_zero();
                let extension = ctx.options.reference_line_extension;
                visuals.push(ctx.scene.add_primitive(
                    Primitive::Polyline {
                        positions: vec![p1 - direction * extension, p2 + direction * extension],
                        dashed: false,
                    },
                    RenderRole::PathGeometry,
                    color,
                ));
                visuals.push(add_endpoint(ctx.scene, p1, ctx.options.colors.endpoint));
                visuals.push(add_endpoint(ctx.scene, p2, ctx.options.colors.endpoint));
                visuals.push(add_label(ctx.scene, p1, label.clone(), color));
                (label, p1, Some(p2))
            }
            ReferenceEntity::Point { p } => {
                self.point_count += 1;
                let label = format!("Basispunkt-{}", self.point_count);
                visuals.push(add_endpoint(ctx.scene, p, ctx.options.colors.endpoint));
                visuals.push(add_label(
                    ctx.scene,
                    p + Vec3::Z * POINT_LABEL_OFFSET,
                    label.clone(),
                    color,
                ));
                (label, p, None)
            }
        };

        set_on_top(ctx.scene, visuals.iter().copied(), ctx.options.xray_overlays);
        ctx.status(format!("{} angelegt", label));
        self.references.insert(
            id,
            Reference {
                id,
                label,
                entity,
                visuals,
            },
        );
        ctx.emit(AppEvent::ReferenceAdded {
            kind: entity.kind(),
            id,
            p1,
            p2,
        });
    }

    fn discard_pending(&mut self, ctx: &mut ToolContext<'_>) {
        if let Some((_, marker)) = self.pending.take() {
            ctx.scene.remove_primitive(marker);
        }
    }
}

impl InteractionTool for ReferenceTool {
    fn mode(&self) -> InteractionMode {
        InteractionMode::Reference
    }

    fn submode(&self) -> Submode {
        self.submode
    }

    fn set_submode(&mut self, submode: Submode, _ctx: &mut ToolContext<'_>) {
        self.click.reset();
        self.pan.reset();
        self.submode = submode;
    }

    fn draw_input(&self) -> &'static [InputKind] {
        CLICK_INPUT
    }

    fn deactivate(&mut self, ctx: &mut ToolContext<'_>) {
        self.discard_pending(ctx);
        self.click.reset();
        self.pan.reset();
    }

    fn on_input(&mut self, event: InputEvent, ctx: &mut ToolContext<'_>) -> Result<(), ScanError> {
        match self.submode {
            Submode::View => Ok(()),
            Submode::Pan => {
                self.pan.handle(event, ctx.scene);
                Ok(())
            }
            Submode::Draw => match event {
                InputEvent::Press { pos } => {
                    self.click.press(pos);
                    Ok(())
                }
                InputEvent::Release { pos } => {
                    if self.click.release(pos, ctx.options.click_tolerance_px) {
                        self.handle_click(pos, ctx)
                    } else {
                        Ok(())
                    }
                }
                InputEvent::Move { .. } => Ok(()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tools::test_support::Fixture;
    use crate::core::PointCloud;

    fn click(tool: &mut ReferenceTool, fx: &mut Fixture, point: Vec3) -> Result<(), ScanError> {
        let pos = fx.screen_of(point);
        tool.on_input(InputEvent::Press { pos }, &mut fx.ctx())?;
        tool.on_input(InputEvent::Release { pos }, &mut fx.ctx())
    }

    fn cloud() -> PointCloud {
        PointCloud::new(vec![
            Vec3::new(-2.0, 0.0, 0.0),
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(0.0, 1.5, 0.0),
        ])
    }

    #[test]
    fn line_needs_two_clicks_and_emits_event() {
        let mut fx = Fixture::with_cloud(cloud());
        let mut tool = ReferenceTool::new();

        click(&mut tool, &mut fx, Vec3::new(-2.0, 0.0, 0.0)).expect("erster Pick");
        assert!(tool.has_pending());
        click(&mut tool, &mut fx, Vec3::new(2.0, 0.0, 0.0)).expect("zweiter Pick");

        assert!(!tool.has_pending());
        assert!(fx.events.contains(&AppEvent::ReferenceAdded {
            kind: ReferenceKind::Line,
            id: ReferenceId(1),
            p1: Vec3::new(-2.0, 0.0, 0.0),
            p2: Some(Vec3::new(2.0, 0.0, 0.0)),
        }));
        let reference = tool.get(ReferenceId(1)).expect("Referenz erwartet");
        assert_eq!(reference.label, "Basislinie-1");
        assert_eq!(fx.scene.count_role(RenderRole::PathGeometry), 1);
        assert_eq!(fx.scene.count_role(RenderRole::EndpointMarker), 2);
    }

    #[test]
    fn zero_length_line_is_rejected_and_keeps_first_pick() {
        let mut fx = Fixture::with_cloud(cloud());
        let mut tool = ReferenceTool::new();

        click(&mut tool, &mut fx, Vec3::new(-2.0, 0.0, 0.0)).expect("erster Pick");
        let result = click(&mut tool, &mut fx, Vec3::new(-2.0, 0.0, 0.0));

        assert!(matches!(result, Err(ScanError::Input(_))));
        assert!(tool.has_pending());
        assert_eq!(tool.references().count(), 0);
    }

    #[test]
    fn point_reference_gets_label_above() {
        let mut fx = Fixture::with_cloud(cloud());
        let mut tool = ReferenceTool::new();
        tool.set_kind(ReferenceKind::Point, &mut fx.ctx());

        click(&mut tool, &mut fx, Vec3::new(0.0, 1.5, 0.0)).expect("Pick");

        let reference = tool.get(ReferenceId(1)).expect("Referenz erwartet");
        assert_eq!(reference.label, "Basispunkt-1");
        assert_eq!(
            reference.entity,
            ReferenceEntity::Point {
                p: Vec3::new(0.0, 1.5, 0.0)
            }
        );
        let label_at = fx.scene.entries().find_map(|(_, e)| match &e.primitive {
            Primitive::Label { position, .. } => Some(*position),
            _ => None,
        });
        assert_eq!(label_at, Some(Vec3::new(0.0, 1.5, 0.5)));
    }

    #[test]
    fn delete_removes_all_visuals() {
        let mut fx = Fixture::with_cloud(cloud());
        let mut tool = ReferenceTool::new();
        click(&mut tool, &mut fx, Vec3::new(-2.0, 0.0, 0.0)).expect("erster Pick");
        click(&mut tool, &mut fx, Vec3::new(2.0, 0.0, 0.0)).expect("zweiter Pick");

        assert!(tool.delete(ReferenceId(1), &mut fx.ctx()).is_some());

        assert!(fx.scene.is_empty());
        assert!(tool.get(ReferenceId(1)).is_none());
    }
}
