//! Messungen: Polylinie, Lotabstand zur Basislinie, Direktabstand zum Basispunkt.
//!
//! Persistierte Messungen sind unveränderlich und werden nur als Ganzes
//! gelöscht. Umfärben dispatcht über die bei der Erzeugung vergebene
//! `RenderRole`: Endpunkt-Marker behalten immer ihre feste Farbe.

use glam::{Vec2, Vec3};
use indexmap::IndexMap;

use crate::app::events::AppEvent;
use crate::app::input::{InputEvent, InputKind};
use crate::app::scene::{Primitive, PrimitiveHandle, RenderRole, Rgba};
use crate::core::ScreenPolygon;
use crate::error::ScanError;
use crate::shared::options::ColorPalette;

use super::common::{add_endpoint, add_label, set_on_top, ClickGesture, PanDrag};
use super::reference::{ReferenceEntity, ReferenceId};
use super::{InteractionMode, InteractionTool, Submode, ToolContext};

/// Mindestlänge einer Basislinie für den Lotabstand.
const MIN_REFERENCE_LENGTH: f32 = 1e-6;

const CLICK_INPUT: &[InputKind] = &[InputKind::Press, InputKind::Release];

/// Stabile ID einer Messung.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeasurementId(pub u32);

/// Aktive Messart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MeasureMode {
    #[default]
    Polyline,
    Perpendicular,
    Direct,
}

/// Geometrie einer Messung.
#[derive(Debug, Clone, PartialEq)]
pub enum MeasurementSegment {
    Polyline { points: Vec<Vec3>, total_distance: f32 },
    Perpendicular { point: Vec3, foot: Vec3, distance: f32 },
    Direct { p1: Vec3, p2: Vec3, distance: f32 },
}

impl MeasurementSegment {
    pub fn distance(&self) -> f32 {
        match self {
            MeasurementSegment::Polyline { total_distance, .. } => *total_distance,
            MeasurementSegment::Perpendicular { distance, .. }
            | MeasurementSegment::Direct { distance, .. } => *distance,
        }
    }

    /// Punkte, die die Messung festlegen (für Bereichslöschungen).
    pub fn defining_points(&self) -> Vec<Vec3> {
        match self {
            MeasurementSegment::Polyline { points, .. } => points.clone(),
            MeasurementSegment::Perpendicular { point, foot, .. } => vec![*point, *foot],
            MeasurementSegment::Direct { p1, p2, .. } => vec![*p1, *p2],
        }
    }

    pub fn mode(&self) -> MeasureMode {
        match self {
            MeasurementSegment::Polyline { .. } => MeasureMode::Polyline,
            MeasurementSegment::Perpendicular { .. } => MeasureMode::Perpendicular,
            MeasurementSegment::Direct { .. } => MeasureMode::Direct,
        }
    }

    /// Grundfarbe der verbindenden Geometrie.
    pub fn base_color(&self, colors: &ColorPalette) -> Rgba {
        match self {
            MeasurementSegment::Polyline { .. } => colors.polyline,
            MeasurementSegment::Perpendicular { .. } => colors.perpendicular,
            MeasurementSegment::Direct { .. } => colors.direct,
        }
    }
}

/// Persistierte Messung samt Szene-Handles und deren Rollen.
#[derive(Debug, Clone)]
pub struct Measurement {
    pub id: MeasurementId,
    pub label: String,
    pub segment: MeasurementSegment,
    visuals: Vec<(PrimitiveHandle, RenderRole)>,
}

impl Measurement {
    pub fn visuals(&self) -> &[(PrimitiveHandle, RenderRole)] {
        &self.visuals
    }
}

/// Lotfußpunkt von `point` auf der Geraden durch `p1`, `p2` und der Abstand dazu.
pub fn perpendicular_foot(p1: Vec3, p2: Vec3, point: Vec3) -> Result<(Vec3, f32), ScanError> {
    let direction = p2 - p1;
    let length_sq = direction.length_squared();
    if length_sq < MIN_REFERENCE_LENGTH * MIN_REFERENCE_LENGTH {
        return Err(ScanError::input("Basislinie hat keine Länge"));
    }
    let t = (point - p1).dot(direction) / length_sq;
    let foot = p1 + direction * t;
    Ok((foot, point.distance(foot)))
}

/// Summe der Segmentlängen einer Punktfolge.
pub fn polyline_length(points: &[Vec3]) -> f32 {
    points.windows(2).map(|pair| pair[0].distance(pair[1])).sum()
}

/// Messmodus.
#[derive(Debug, Default)]
pub struct MeasurementEngine {
    submode: Submode,
    mode: MeasureMode,
    active_line: Option<(ReferenceId, Vec3, Vec3)>,
    active_point: Option<(ReferenceId, Vec3)>,
    pending: Vec<Vec3>,
    pending_visuals: Vec<(PrimitiveHandle, RenderRole)>,
    measurements: IndexMap<MeasurementId, Measurement>,
    highlighted: Option<MeasurementId>,
    next_id: u32,
    polyline_count: u32,
    click: ClickGesture,
    pan: PanDrag,
}

impl MeasurementEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> MeasureMode {
        self.mode
    }

    /// Wechselt die Messart; eine offene Polylinie wird verworfen.
    pub fn set_mode(&mut self, mode: MeasureMode, ctx: &mut ToolContext<'_>) {
        self.discard_pending(ctx);
        self.mode = mode;
    }

    pub fn get(&self, id: MeasurementId) -> Option<&Measurement> {
        self.measurements.get(&id)
    }

    /// Alle Messungen in Erzeugungsreihenfolge.
    pub fn measurements(&self) -> impl Iterator<Item = &Measurement> {
        self.measurements.values()
    }

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    pub fn highlighted(&self) -> Option<MeasurementId> {
        self.highlighted
    }

    /// Gesammelte Punkte der offenen Polylinie.
    pub fn pending_points(&self) -> &[Vec3] {
        &self.pending
    }

    // ── Referenzen ───────────────────────────────────────────────

    /// Setzt die aktive Referenz ihrer Art.
    pub fn set_active_reference(&mut self, id: ReferenceId, entity: ReferenceEntity) {
        match entity {
            ReferenceEntity::Line { p1, p2 } => self.active_line = Some((id, p1, p2)),
            ReferenceEntity::Point { p } => self.active_point = Some((id, p)),
        }
    }

    /// Vergisst eine gelöschte Referenz, falls sie aktiv war.
    pub fn forget_reference(&mut self, id: ReferenceId) {
        if self.active_line.is_some_and(|(active, _, _)| active == id) {
            self.active_line = None;
        }
        if self.active_point.is_some_and(|(active, _)| active == id) {
            self.active_point = None;
        }
    }

    pub fn active_line(&self) -> Option<(Vec3, Vec3)> {
        self.active_line.map(|(_, p1, p2)| (p1, p2))
    }

    pub fn active_point(&self) -> Option<Vec3> {
        self.active_point.map(|(_, p)| p)
    }

    // ── Messungen ────────────────────────────────────────────────

    /// Lotabstand von `point` zur aktiven Basislinie.
    pub fn measure_perpendicular(
        &mut self,
        point: Vec3,
        ctx: &mut ToolContext<'_>,
    ) -> Result<MeasurementId, ScanError> {
        let (_, p1, p2) = self
            .active_line
            .ok_or_else(|| ScanError::input("Keine aktive Basislinie gewählt"))?;
        let (foot, distance) = perpendicular_foot(p1, p2, point)?;

        let segment = MeasurementSegment::Perpendicular {
            point,
            foot,
            distance,
        };
        let label = format!("Lotabstand: {:.2}m", distance);
        let color = segment.base_color(&ctx.options.colors);
        let mut visuals = vec![
            endpoint(ctx, point),
            endpoint(ctx, foot),
            path(ctx, vec![point, foot], color),
        ];
        visuals.push(label_at(ctx, (point + foot) * 0.5, &label, &segment));
        Ok(self.persist(label, segment, visuals, ctx))
    }

    /// Direktabstand von `point` zum aktiven Basispunkt.
    pub fn measure_direct(
        &mut self,
        point: Vec3,
        ctx: &mut ToolContext<'_>,
    ) -> Result<MeasurementId, ScanError> {
        let (_, origin) = self
            .active_point
            .ok_or_else(|| ScanError::input("Kein aktiver Basispunkt gewählt"))?;
        let distance = origin.distance(point);

        let segment = MeasurementSegment::Direct {
            p1: origin,
            p2: point,
            distance,
        };
        let label = format!("Direktabstand: {:.2}m", distance);
        let color = segment.base_color(&ctx.options.colors);
        let mut visuals = vec![
            endpoint(ctx, point),
            path(ctx, vec![origin, point], color),
        ];
        visuals.push(label_at(ctx, (origin + point) * 0.5, &label, &segment));
        Ok(self.persist(label, segment, visuals, ctx))
    }

    /// Hängt einen Punkt an die offene Polylinie an.
    pub fn add_polyline_point(&mut self, point: Vec3, ctx: &mut ToolContext<'_>) {
        let first_new = self.pending_visuals.len();
        self.pending_visuals.push(endpoint(ctx, point));
        if let Some(&previous) = self.pending.last() {
            let color = ctx.options.colors.polyline;
            self.pending_visuals
                .push(path(ctx, vec![previous, point], color));
        }
        set_on_top(
            ctx.scene,
            self.pending_visuals[first_new..].iter().map(|(h, _)| *h),
            ctx.options.xray_overlays,
        );
        self.pending.push(point);
        if self.pending.len() >= 2 {
            ctx.status(format!(
                "Polylinie: {:.2}m",
                polyline_length(&self.pending)
            ));
        }
    }

    /// Schließt die offene Polylinie ab. Mit weniger als zwei Punkten
    /// wird sie stillschweigend verworfen.
    pub fn finish_polyline(&mut self, ctx: &mut ToolContext<'_>) -> Option<MeasurementId> {
        if self.pending.len() < 2 {
            log::debug!(
                "Polylinie mit {} Punkten verworfen",
                self.pending.len()
            );
            self.discard_pending(ctx);
            return None;
        }

        let points = std::mem::take(&mut self.pending);
        let mut visuals = std::mem::take(&mut self.pending_visuals);
        let total_distance = polyline_length(&points);
        self.polyline_count += 1;
        let label = format!("Messung-{}: {:.2}m", self.polyline_count, total_distance);
        let anchor = points[points.len() - 1];

        let segment = MeasurementSegment::Polyline {
            points,
            total_distance,
        };
        visuals.push(label_at(ctx, anchor, &label, &segment));
        Some(self.persist(label, segment, visuals, ctx))
    }

    /// Hebt eine Messung hervor; alle anderen erhalten ihre Grundfarbe.
    /// Endpunkt-Marker und Beschriftungen bleiben unverändert.
    pub fn highlight(&mut self, id: Option<MeasurementId>, ctx: &mut ToolContext<'_>) {
        if let Some(wanted) = id {
            if !self.measurements.contains_key(&wanted) {
                log::debug!("Messung {:?} existiert nicht", wanted);
                return;
            }
        }
        self.highlighted = id;

        let options = ctx.options;
        let colors = &options.colors;
        for measurement in self.measurements.values() {
            let color = if Some(measurement.id) == id {
                colors.highlight
            } else {
                measurement.segment.base_color(colors)
            };
            for (handle, role) in &measurement.visuals {
                if *role == RenderRole::PathGeometry {
                    ctx.scene.set_color(*handle, color);
                }
            }
        }
    }

    /// Löscht eine Messung atomar samt aller Visuals.
    pub fn delete(&mut self, id: MeasurementId, ctx: &mut ToolContext<'_>) -> bool {
        let Some(measurement) = self.measurements.shift_remove(&id) else {
            log::debug!("Messung {:?} existiert nicht", id);
            return false;
        };
        for (handle, _) in &measurement.visuals {
            ctx.scene.remove_primitive(*handle);
        }
        if self.highlighted == Some(id) {
            self.highlighted = None;
        }
        log::info!("{} gelöscht", measurement.label);
        true
    }

    /// Wendet das X-Ray-Flag der Optionen auf alle Mess-Visuals an,
    /// auch auf die der offenen Polylinie.
    pub fn apply_xray(&self, ctx: &mut ToolContext<'_>) {
        let on_top = ctx.options.xray_overlays;
        let handles = self
            .measurements
            .values()
            .flat_map(|m| m.visuals.iter())
            .chain(self.pending_visuals.iter())
            .map(|(handle, _)| *handle);
        set_on_top(ctx.scene, handles, on_top);
    }

    /// Löscht jede Messung mit mindestens einem Punkt im gelöschten Bereich.
    ///
    /// Bei `inverted` wurde alles außerhalb des Polygons gelöscht; dann fällt
    /// jede Messung mit einem Punkt außerhalb weg.
    pub fn delete_within_polygon(
        &mut self,
        polygon: &ScreenPolygon,
        inverted: bool,
        ctx: &mut ToolContext<'_>,
    ) -> usize {
        let projector = ctx.scene.projector();
        let doomed: Vec<MeasurementId> = self
            .measurements
            .values()
            .filter(|measurement| {
                measurement.segment.defining_points().iter().any(|p| {
                    let projected = projector.project_point(*p);
                    let inside = projected.valid && polygon.contains(projected.screen);
                    inside != inverted
                })
            })
            .map(|measurement| measurement.id)
            .collect();

        for id in &doomed {
            self.delete(*id, ctx);
        }
        if !doomed.is_empty() {
            ctx.status(format!("{} Messungen im gelöschten Bereich entfernt", doomed.len()));
        }
        doomed.len()
    }

    /// Entfernt alle Messungen und die offene Polylinie.
    pub fn clear_all(&mut self, ctx: &mut ToolContext<'_>) {
        self.discard_pending(ctx);
        for (_, measurement) in self.measurements.drain(..) {
            for (handle, _) in &measurement.visuals {
                ctx.scene.remove_primitive(*handle);
            }
        }
        self.highlighted = None;
        self.polyline_count = 0;
    }

    /// Vergisst zusätzlich die aktiven Referenzen (neue Datei).
    pub fn reset(&mut self, ctx: &mut ToolContext<'_>) {
        self.clear_all(ctx);
        self.active_line = None;
        self.active_point = None;
    }

    fn handle_click(&mut self, screen: Vec2, ctx: &mut ToolContext<'_>) -> Result<(), ScanError> {
        let point = ctx.pick(screen).point;
        match self.mode {
            MeasureMode::Polyline => {
                self.add_polyline_point(point, ctx);
                Ok(())
            }
            MeasureMode::Perpendicular => self.measure_perpendicular(point, ctx).map(|_| ()),
            MeasureMode::Direct => self.measure_direct(point, ctx).map(|_| ()),
        }
    }

    fn persist(
        &mut self,
        label: String,
        segment: MeasurementSegment,
        visuals: Vec<(PrimitiveHandle, RenderRole)>,
        ctx: &mut ToolContext<'_>,
    ) -> MeasurementId {
        self.next_id += 1;
        let id = MeasurementId(self.next_id);
        set_on_top(
            ctx.scene,
            visuals.iter().map(|(handle, _)| *handle),
            ctx.options.xray_overlays,
        );
        ctx.emit(AppEvent::MeasurementAdded {
            text: label.clone(),
            id,
        });
        log::info!("{}", label);
        self.measurements.insert(
            id,
            Measurement {
                id,
                label,
                segment,
                visuals,
            },
        );
        id
    }

    fn discard_pending(&mut self, ctx: &mut ToolContext<'_>) {
        self.pending.clear();
        for (handle, _) in self.pending_visuals.drain(..) {
            ctx.scene.remove_primitive(handle);
        }
    }
}

fn endpoint(ctx: &mut ToolContext<'_>, position: Vec3) -> (PrimitiveHandle, RenderRole) {
    let color = ctx.options.colors.endpoint;
    (add_endpoint(ctx.scene, position, color), RenderRole::EndpointMarker)
}

fn path(ctx: &mut ToolContext<'_>, positions: Vec<Vec3>, color: Rgba) -> (PrimitiveHandle, RenderRole) {
    let handle = ctx.scene.add_primitive(
        Primitive::Polyline {
            positions,
            dashed: false,
        },
        RenderRole::PathGeometry,
        color,
    );
    (handle, RenderRole::PathGeometry)
}

fn label_at(
    ctx: &mut ToolContext<'_>,
    position: Vec3,
    text: &str,
    segment: &MeasurementSegment,
) -> (PrimitiveHandle, RenderRole) {
    let color = segment.base_color(&ctx.options.colors);
    (add_label(ctx.scene, position, text, color), RenderRole::Label)
}

impl InteractionTool for MeasurementEngine {
    fn mode(&self) -> InteractionMode {
        InteractionMode::Measurement
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
