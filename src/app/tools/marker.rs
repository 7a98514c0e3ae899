//! Beweis-Marker: beschriftete Punkte unabhängig von Messungen.

use glam::{Vec2, Vec3};
use indexmap::IndexMap;

use crate::app::events::AppEvent;
use crate::app::input::{InputEvent, InputKind};
use crate::app::scene::PrimitiveHandle;
use crate::error::ScanError;

use super::common::{add_endpoint, add_label, remove_all, ClickGesture, PanDrag};
use super::{InteractionMode, InteractionTool, Submode, ToolContext};

/// Höhe der Beschriftung über dem Marker.
const LABEL_OFFSET: f32 = 0.2;

const CLICK_INPUT: &[InputKind] = &[InputKind::Press, InputKind::Release];

/// Stabile ID eines Markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkerId(pub u32);

/// Gesetzter Marker.
#[derive(Debug, Clone)]
pub struct Marker {
    pub id: MarkerId,
    pub label: String,
    pub position: Vec3,
    visuals: Vec<PrimitiveHandle>,
}

/// Marker-Modus.
#[derive(Debug, Default)]
pub struct MarkerTool {
    submode: Submode,
    /// Präfix überschreibt `EditorOptions::marker_label_prefix`
    prefix: Option<String>,
    markers: IndexMap<MarkerId, Marker>,
    next_id: u32,
    click: ClickGesture,
    pan: PanDrag,
}

impl MarkerTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_prefix(&mut self, prefix: impl Into<String>) {
        self.prefix = Some(prefix.into());
    }

    pub fn get(&self, id: MarkerId) -> Option<&Marker> {
        self.markers.get(&id)
    }

    pub fn markers(&self) -> impl Iterator<Item = &Marker> {
        self.markers.values()
    }

    /// Setzt einen Marker an `position`.
    pub fn place(&mut self, position: Vec3, ctx: &mut ToolContext<'_>) -> MarkerId {
        self.next_id += 1;
        let id = MarkerId(self.next_id);
        let prefix = self
            .prefix
            .as_deref()
            .unwrap_or(ctx.options.marker_label_prefix.as_str());
        let label = format!("{}-{}", prefix, self.next_id);

        let color = ctx.options.colors.marker;
        let visuals = vec![
            add_endpoint(ctx.scene, position, color),
            add_label(ctx.scene, position + Vec3::Z * LABEL_OFFSET, label.clone(), color),
        ];

        ctx.emit(AppEvent::MarkerAdded {
            label: label.clone(),
            id,
        });
        log::info!("Marker {} gesetzt bei {:?}", label, position);
        self.markers.insert(
            id,
            Marker {
                id,
                label,
                position,
                visuals,
            },
        );
        id
    }

    /// Entfernt einen Marker atomar.
    pub fn delete(&mut self, id: MarkerId, ctx: &mut ToolContext<'_>) -> bool {
        let Some(mut marker) = self.markers.shift_remove(&id) else {
            log::debug!("Marker {:?} existiert nicht", id);
            return false;
        };
        remove_all(ctx.scene, &mut marker.visuals);
        true
    }

    pub fn clear_all(&mut self, ctx: &mut ToolContext<'_>) {
        for (_, mut marker) in self.markers.drain(..) {
            remove_all(ctx.scene, &mut marker.visuals);
        }
        self.next_id = 0;
    }

    fn handle_click(&mut self, screen: Vec2, ctx: &mut ToolContext<'_>) {
        let point = ctx.pick(screen).point;
        self.place(point, ctx);
    }
}

impl InteractionTool for MarkerTool {
    fn mode(&self) -> InteractionMode {
        InteractionMode::Marker
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

    fn deactivate(&mut self, _ctx: &mut ToolContext<'_>) {
        self.click.reset();
        self.pan.reset();
    }

    fn on_input(&mut self, event: InputEvent, ctx: &mut ToolContext<'_>) -> Result<(), ScanError> {
        match (self.submode, event) {
            (Submode::Pan, _) => self.pan.handle(event, ctx.scene),
            (Submode::Draw, InputEvent::Press { pos }) => self.click.press(pos),
            (Submode::Draw, InputEvent::Release { pos }) => {
                if self.click.release(pos, ctx.options.click_tolerance_px) {
                    self.handle_click(pos, ctx);
                }
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::scene::{Primitive, RenderRole};
    use crate::app::tools::test_support::Fixture;
    use crate::core::PointCloud;

    #[test]
    fn click_places_numbered_marker_with_prefix() {
        let mut fx = Fixture::with_cloud(PointCloud::new(vec![Vec3::new(0.5, 0.5, 0.0)]));
        let mut tool = MarkerTool::new();
        let pos = fx.screen_of(Vec3::new(0.5, 0.5, 0.0));

        tool.on_input(InputEvent::Press { pos }, &mut fx.ctx()).expect("Press");
        tool.on_input(InputEvent::Release { pos }, &mut fx.ctx()).expect("Release");
        tool.set_prefix("Spur");
        let second = tool.place(Vec3::ZERO, &mut fx.ctx());

        let first = tool.get(MarkerId(1)).expect("Marker erwartet");
        assert_eq!(first.label, "Evidence-1");
        assert_eq!(first.position, Vec3::new(0.5, 0.5, 0.0));
        assert_eq!(tool.get(second).map(|m| m.label.as_str()), Some("Spur-2"));
        assert!(fx.events.contains(&AppEvent::MarkerAdded {
            label: "Evidence-1".into(),
            id: MarkerId(1),
        }));
        let label = fx.scene.entries().find_map(|(_, e)| match &e.primitive {
            Primitive::Label { position, text } if text == "Evidence-1" => Some(*position),
            _ => None,
        });
        assert_eq!(label, Some(Vec3::new(0.5, 0.5, 0.2)));
        assert_eq!(fx.scene.count_role(RenderRole::EndpointMarker), 2);
    }

    #[test]
    fn delete_is_atomic() {
        let mut fx = Fixture::with_cloud(PointCloud::new(vec![Vec3::ZERO]));
        let mut tool = MarkerTool::new();
        let id = tool.place(Vec3::ZERO, &mut fx.ctx());

        assert!(tool.delete(id, &mut fx.ctx()));
        assert!(!tool.delete(id, &mut fx.ctx()));
        assert!(fx.scene.is_empty());
    }
}
