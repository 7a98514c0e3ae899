//! Kalibrierung: Bodenebene auf +Z legen, Nordrichtung auf +Y drehen.
//!
//! Jede angewandte Transformation wird links an die akkumulierte Matrix
//! multipliziert und auf Wolke und Pick-Overlays gleichzeitig angewandt.
//! Degenerierte Eingaben liefern `ScanError::Input` und lassen Phase,
//! Wolke und Matrix unverändert.

use glam::{Vec2, Vec3};

use crate::app::events::AppEvent;
use crate::app::input::{InputEvent, InputKind, ALL_INPUT, PRESS_ONLY};
use crate::app::scene::{Primitive, PrimitiveHandle, RenderRole};
use crate::core::{
    fit_plane, ground_normal_from_points, north_angle, orient_up, rotation_to_z, PointCloud,
    RigidTransform, ViewPreset,
};
use crate::error::ScanError;

use super::common::{add_endpoint, add_label, remove_all, PanDrag};
use super::{InteractionMode, InteractionTool, Submode, ToolContext};

/// Phase des Kalibrier-Ablaufs.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CalibrationPhase {
    #[default]
    Idle,
    /// Referenzgitter sichtbar, Seitenansicht
    GroundPreview,
    /// Manuelle Bodenwahl, bis zu drei Picks
    ManualGround { picks: Vec<Vec3> },
    NorthFirst,
    NorthSecond { first: Vec3 },
    /// Live-Feinjustage per horizontalem Drag
    NorthTuning,
}

/// Kalibrier-Modus.
#[derive(Debug, Default)]
pub struct CalibrationEngine {
    submode: Submode,
    phase: CalibrationPhase,
    /// Pick-Marker, die mit der Wolke mittransformiert werden
    overlays: Vec<PrimitiveHandle>,
    /// Gitter, Nordpfeil und Beschriftung (bleiben in Weltlage)
    guides: Vec<PrimitiveHandle>,
    tune_anchor: Option<Vec2>,
    pan: PanDrag,
}

impl CalibrationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> &CalibrationPhase {
        &self.phase
    }

    /// Handles der mittransformierten Pick-Marker.
    pub fn overlays(&self) -> &[PrimitiveHandle] {
        &self.overlays
    }

    // ── Boden ────────────────────────────────────────────────────

    /// Zeigt das Referenzgitter bei z = 0 und wechselt in die Seitenansicht.
    pub fn start_ground_preview(&mut self, ctx: &mut ToolContext<'_>) {
        if ctx.cloud().is_none() {
            log::debug!("Bodenvorschau ohne Wolke ignoriert");
            return;
        }
        self.clear_visuals(ctx);
        self.show_grid(ctx);
        set_view(ctx, ViewPreset::Side);
        self.phase = CalibrationPhase::GroundPreview;
        ctx.status("Bodenvorschau: Gitter liegt bei z = 0");
    }

    /// Automatische Bodenerkennung per RANSAC.
    pub fn auto_ground(&mut self, ctx: &mut ToolContext<'_>) -> Result<(), ScanError> {
        let Some(cloud) = ctx.cloud.clone() else {
            log::debug!("Automatische Bodenerkennung ohne Wolke ignoriert");
            return Ok(());
        };
        let fit = fit_plane(
            cloud.positions(),
            ctx.options.ground_fit_distance,
            ctx.options.ground_fit_iterations,
        )
        .ok_or_else(|| ScanError::input("Keine Bodenebene gefunden"))?;

        log::info!(
            "Bodenebene erkannt: {} von {} Punkten",
            fit.inliers.len(),
            cloud.len()
        );
        self.apply_ground_alignment(fit.normal, ctx)
    }

    /// Startet die manuelle Bodenwahl über drei Picks.
    pub fn start_manual_ground(&mut self, ctx: &mut ToolContext<'_>) {
        remove_all(ctx.scene, &mut self.overlays);
        self.phase = CalibrationPhase::ManualGround { picks: Vec::new() };
        ctx.status("Drei Punkte auf dem Boden wählen");
    }

    /// Dreht `normal` auf +Z und setzt den tiefsten Punkt auf z = 0.
    ///
    /// Die Rotation erzeugt genau einen History-Eintrag, die Höhenverschiebung
    /// keinen weiteren. Beide landen in der akkumulierten Matrix.
    pub fn apply_ground_alignment(
        &mut self,
        normal: Vec3,
        ctx: &mut ToolContext<'_>,
    ) -> Result<(), ScanError> {
        let rotation = rotation_to_z(orient_up(normal))?;
        if ctx.cloud().is_none() {
            log::debug!("Bodenausrichtung ohne Wolke ignoriert");
            return Ok(());
        }

        ctx.push_history();
        self.apply_transform(RigidTransform::from_rotation(rotation), ctx);

        if let Some(min_z) = ctx.cloud().and_then(PointCloud::min_z) {
            if min_z != 0.0 {
                self.apply_transform(RigidTransform::from_translation(Vec3::new(0.0, 0.0, -min_z)), ctx);
            }
        }

        self.remove_guides(ctx);
        self.show_grid(ctx);
        self.phase = CalibrationPhase::GroundPreview;
        ctx.status("Bodenebene ausgerichtet");
        Ok(())
    }

    /// Schließt die Bodenkalibrierung ab.
    pub fn confirm_ground(&mut self, ctx: &mut ToolContext<'_>) {
        self.clear_visuals(ctx);
        self.phase = CalibrationPhase::Idle;
        ctx.status("Bodenkalibrierung übernommen");
    }

    fn pick_ground(&mut self, screen: Vec2, ctx: &mut ToolContext<'_>) -> Result<(), ScanError> {
        let CalibrationPhase::ManualGround { picks } = &self.phase else {
            return Ok(());
        };
        let point = ctx.pick(screen).point;
        let mut picks = picks.clone();
        picks.push(point);

        if picks.len() < 3 {
            let marker = add_endpoint(ctx.scene, point, ctx.options.colors.ground_pick);
            self.overlays.push(marker);
            ctx.status(format!("Bodenpunkt {} von 3 gewählt", picks.len()));
            self.phase = CalibrationPhase::ManualGround { picks };
            return Ok(());
        }

        // Dritter Pick: bei kollinearen Punkten bleiben die ersten beiden erhalten
        let normal = ground_normal_from_points(picks[0], picks[1], picks[2])?;
        let marker = add_endpoint(ctx.scene, point, ctx.options.colors.ground_pick);
        self.overlays.push(marker);
        self.apply_ground_alignment(normal, ctx)
    }

    // ── Norden ───────────────────────────────────────────────────

    /// Zeigt den statischen Nordpfeil und wartet auf zwei Picks.
    pub fn start_north_alignment(&mut self, ctx: &mut ToolContext<'_>) {
        let Some(bounds) = ctx.cloud().and_then(PointCloud::bounds) else {
            log::debug!("Nordausrichtung ohne Wolke ignoriert");
            return;
        };
        self.clear_visuals(ctx);

        let start = bounds.center().truncate().extend(0.0);
        let length = bounds.max_xy_extent() * ctx.options.north_arrow_scale;
        let tip = start + Vec3::Y * length;
        let color = ctx.options.colors.north_arrow;
        let arrow = ctx.scene.add_primitive(
            Primitive::Arrow { start, end: tip },
            RenderRole::Guide,
            color,
        );
        let label = add_label(ctx.scene, tip, "N", color);
        self.guides.extend([arrow, label]);

        set_view(ctx, ViewPreset::Top);
        self.phase = CalibrationPhase::NorthFirst;
        ctx.status("Ersten Punkt der Nordrichtung wählen");
    }

    /// Schließt die Nordausrichtung ab und beendet die Feinjustage.
    pub fn confirm_north(&mut self, ctx: &mut ToolContext<'_>) {
        self.clear_visuals(ctx);
        self.tune_anchor = None;
        self.phase = CalibrationPhase::Idle;
        ctx.status("Nordausrichtung übernommen");
    }

    /// Dreht während der Feinjustage um `degrees` um die Z-Achse (ohne History).
    pub fn rotate_north(&mut self, degrees: f32, ctx: &mut ToolContext<'_>) {
        if self.phase != CalibrationPhase::NorthTuning {
            log::debug!("Nord-Rotation außerhalb der Feinjustage ignoriert");
            return;
        }
        self.apply_transform(RigidTransform::rotation_z(degrees.to_radians()), ctx);
    }

    fn pick_north(&mut self, screen: Vec2, ctx: &mut ToolContext<'_>) -> Result<(), ScanError> {
        match self.phase.clone() {
            CalibrationPhase::NorthFirst => {
                let point = ctx.pick(screen).point;
                let marker = add_endpoint(ctx.scene, point, ctx.options.colors.north_pick);
                self.overlays.push(marker);
                self.phase = CalibrationPhase::NorthSecond { first: point };
                ctx.status("Zweiten Punkt der Nordrichtung wählen");
                Ok(())
            }
            CalibrationPhase::NorthSecond { first } => {
                let second = ctx.pick(screen).point;
                let angle = north_angle(first, second)?;

                let marker = add_endpoint(ctx.scene, second, ctx.options.colors.north_pick);
                self.overlays.push(marker);
                ctx.push_history();
                self.apply_transform(RigidTransform::rotation_z(angle), ctx);

                self.phase = CalibrationPhase::NorthTuning;
                ctx.emit(AppEvent::NorthTuningStarted);
                ctx.status(format!(
                    "Nach Norden gedreht ({:.1}°), Feinjustage per Drag",
                    angle.to_degrees()
                ));
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn tune(&mut self, event: InputEvent, ctx: &mut ToolContext<'_>) {
        match event {
            InputEvent::Press { pos } => self.tune_anchor = Some(pos),
            InputEvent::Move { pos } => {
                let Some(anchor) = self.tune_anchor else {
                    return;
                };
                let dx = pos.x - anchor.x;
                if dx != 0.0 {
                    let angle = dx * ctx.options.north_tuning_rad_per_px();
                    self.apply_transform(RigidTransform::rotation_z(angle), ctx);
                }
                self.tune_anchor = Some(pos);
            }
            InputEvent::Release { .. } => self.tune_anchor = None,
        }
    }

    // ── Transformation ───────────────────────────────────────────

    /// Wendet `transform` auf Wolke und Overlays an und akkumuliert ihn.
    fn apply_transform(&mut self, transform: RigidTransform, ctx: &mut ToolContext<'_>) {
        let Some(cloud) = ctx.cloud.clone() else {
            return;
        };
        let matrix = transform.matrix();
        ctx.replace_cloud(cloud.transformed(&matrix));
        for handle in &self.overlays {
            ctx.scene.transform_primitive(*handle, &matrix);
        }

        *ctx.accumulated = ctx.accumulated.then(&transform);
        ctx.emit(AppEvent::TransformUpdated {
            transform: *ctx.accumulated,
        });
    }

    // ── Visuals ──────────────────────────────────────────────────

    fn show_grid(&mut self, ctx: &mut ToolContext<'_>) {
        let Some(bounds) = ctx.cloud().and_then(PointCloud::bounds) else {
            return;
        };
        let grid = ctx.scene.add_primitive(
            Primitive::Grid {
                center: bounds.center().truncate().extend(0.0),
                size: bounds.max_xy_extent() * ctx.options.grid_scale,
                resolution: ctx.options.grid_resolution,
            },
            RenderRole::Guide,
            ctx.options.colors.grid,
        );
        self.guides.push(grid);
    }

    fn remove_guides(&mut self, ctx: &mut ToolContext<'_>) {
        remove_all(ctx.scene, &mut self.guides);
    }

    fn clear_visuals(&mut self, ctx: &mut ToolContext<'_>) {
        remove_all(ctx.scene, &mut self.overlays);
        self.remove_guides(ctx);
    }

    /// Bricht jeden laufenden Ablauf ab und entfernt alle Visuals.
    pub fn cancel(&mut self, ctx: &mut ToolContext<'_>) {
        self.clear_visuals(ctx);
        self.tune_anchor = None;
        self.pan.reset();
        self.phase = CalibrationPhase::Idle;
    }
}

fn set_view(ctx: &mut ToolContext<'_>, preset: ViewPreset) {
    let mut camera = ctx.scene.camera().clone();
    camera.apply_preset(preset);
    ctx.scene.set_camera(camera);
}

impl InteractionTool for CalibrationEngine {
    fn mode(&self) -> InteractionMode {
        InteractionMode::Calibration
    }

    fn submode(&self) -> Submode {
        self.submode
    }

    fn set_submode(&mut self, submode: Submode, _ctx: &mut ToolContext<'_>) {
        self.tune_anchor = None;
        self.pan.reset();
        self.submode = submode;
    }

    fn draw_input(&self) -> &'static [InputKind] {
        if self.phase == CalibrationPhase::NorthTuning {
            ALL_INPUT
        } else {
            PRESS_ONLY
        }
    }

    fn deactivate(&mut self, ctx: &mut ToolContext<'_>) {
        self.cancel(ctx);
    }

    fn on_input(&mut self, event: InputEvent, ctx: &mut ToolContext<'_>) -> Result<(), ScanError> {
        match self.submode {
            Submode::View => Ok(()),
            Submode::Pan => {
                self.pan.handle(event, ctx.scene);
                Ok(())
            }
            Submode::Draw => match (&self.phase, event) {
                (CalibrationPhase::NorthTuning, _) => {
                    self.tune(event, ctx);
                    Ok(())
                }
                (CalibrationPhase::ManualGround { .. }, InputEvent::Press { pos }) => {
                    self.pick_ground(pos, ctx)
                }
                (
                    CalibrationPhase::NorthFirst | CalibrationPhase::NorthSecond { .. },
                    InputEvent::Press { pos },
                ) => self.pick_north(pos, ctx),
                _ => Ok(()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::scene::SceneManager;
    use crate::app::tools::test_support::Fixture;
    use approx::assert_relative_eq;

    /// Schiefe Ebene z = 1 + 0.1·x mit einem Punkt darüber.
    fn tilted_cloud() -> PointCloud {
        PointCloud::new(vec![
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 1.1),
            Vec3::new(0.0, 1.0, 1.0),
            Vec3::new(1.0, 1.0, 1.1),
            Vec3::new(0.5, 0.5, 2.0),
        ])
    }

    fn press(engine: &mut CalibrationEngine, fx: &mut Fixture, point: Vec3) -> Result<(), ScanError> {
        let pos = fx.screen_of(point);
        engine.on_input(InputEvent::Press { pos }, &mut fx.ctx())
    }

    #[test]
    fn collinear_ground_picks_keep_state() {
        let cloud = PointCloud::new(vec![
            Vec3::new(-1.0, -1.0, 0.0),
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
        ]);
        let points = cloud.positions().to_vec();
        let mut fx = Fixture::with_cloud(cloud);
        let mut engine = CalibrationEngine::new();
        engine.start_manual_ground(&mut fx.ctx());

        press(&mut engine, &mut fx, points[0]).expect("erster Pick");
        press(&mut engine, &mut fx, points[1]).expect("zweiter Pick");
        let result = press(&mut engine, &mut fx, points[2]);

        assert!(matches!(result, Err(ScanError::Input(_))));
        assert_eq!(fx.accumulated, RigidTransform::IDENTITY);
        assert!(fx.history.is_empty());
        assert!(matches!(
            engine.phase(),
            CalibrationPhase::ManualGround { picks } if picks.len() == 2
        ));
    }

    #[test]
    fn manual_ground_levels_plane_and_accumulates_snap() {
        let original = tilted_cloud();
        let before = original.positions().to_vec();
        let mut fx = Fixture::with_cloud(original);
        let mut engine = CalibrationEngine::new();
        engine.start_manual_ground(&mut fx.ctx());

        for point in &before[..3] {
            press(&mut engine, &mut fx, *point).expect("Pick erwartet");
        }

        let after = fx.cloud.clone().expect("Wolke erwartet");
        for point in &after.positions()[..4] {
            assert_relative_eq!(point.z, 0.0, epsilon = 1e-4);
        }
        // Die Höhenverschiebung steckt in der akkumulierten Matrix
        for (raw, moved) in before.iter().zip(after.positions()) {
            let mapped = fx.accumulated.apply(*raw);
            assert_relative_eq!(mapped.x, moved.x, epsilon = 1e-4);
            assert_relative_eq!(mapped.y, moved.y, epsilon = 1e-4);
            assert_relative_eq!(mapped.z, moved.z, epsilon = 1e-4);
        }
        assert_eq!(fx.history.len(), 1);
        assert_eq!(engine.phase(), &CalibrationPhase::GroundPreview);
    }

    #[test]
    fn overlays_follow_the_cloud() {
        let original = tilted_cloud();
        let before = original.positions().to_vec();
        let mut fx = Fixture::with_cloud(original);
        let mut engine = CalibrationEngine::new();
        engine.start_manual_ground(&mut fx.ctx());
        for point in &before[..3] {
            press(&mut engine, &mut fx, *point).expect("Pick erwartet");
        }

        let first = engine.overlays()[0];
        let expected = fx.accumulated.apply(before[0]);
        let Some(Primitive::Points { positions, .. }) =
            fx.scene.entry(first).map(|e| e.primitive.clone())
        else {
            panic!("Pick-Marker erwartet");
        };
        assert_relative_eq!(positions[0].z, expected.z, epsilon = 1e-4);
        assert_relative_eq!(positions[0].x, expected.x, epsilon = 1e-4);
    }

    #[test]
    fn auto_ground_levels_noisy_free_plane() {
        let mut points = Vec::new();
        for row in 0..10 {
            for column in 0..10 {
                let x = column as f32 + row as f32 * 0.001;
                let y = row as f32;
                points.push(Vec3::new(x, y, 0.5 + 0.2 * x));
            }
        }
        let mut fx = Fixture::with_cloud(PointCloud::new(points));
        let mut engine = CalibrationEngine::new();

        engine.auto_ground(&mut fx.ctx()).expect("Ebene erwartet");

        let after = fx.cloud.clone().expect("Wolke erwartet");
        assert!(after.positions().iter().all(|p| p.z.abs() < 1e-3));
        assert!(fx
            .events
            .iter()
            .any(|e| matches!(e, AppEvent::TransformUpdated { .. })));
    }

    #[test]
    fn north_alignment_rotates_direction_onto_y() {
        let cloud = PointCloud::new(vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(-1.0, 0.5, 0.0),
        ]);
        let mut fx = Fixture::with_cloud(cloud);
        let mut engine = CalibrationEngine::new();
        engine.start_north_alignment(&mut fx.ctx());

        press(&mut engine, &mut fx, Vec3::ZERO).expect("erster Pick");
        press(&mut engine, &mut fx, Vec3::new(1.0, 1.0, 0.0)).expect("zweiter Pick");

        let after = fx.cloud.clone().expect("Wolke erwartet");
        let direction = after.positions()[1] - after.positions()[0];
        assert_relative_eq!(direction.x, 0.0, epsilon = 1e-5);
        assert!(direction.y > 0.0);
        assert_eq!(engine.phase(), &CalibrationPhase::NorthTuning);
        assert_eq!(engine.input_kinds(), ALL_INPUT);
        assert_eq!(fx.history.len(), 1);
        assert!(fx.events.contains(&AppEvent::NorthTuningStarted));
    }

    #[test]
    fn tuning_rotates_without_history() {
        let cloud = PointCloud::new(vec![Vec3::ZERO, Vec3::new(0.0, 2.0, 0.0)]);
        let mut fx = Fixture::with_cloud(cloud);
        let mut engine = CalibrationEngine::new();
        engine.start_north_alignment(&mut fx.ctx());
        press(&mut engine, &mut fx, Vec3::ZERO).expect("erster Pick");
        press(&mut engine, &mut fx, Vec3::new(0.0, 2.0, 0.0)).expect("zweiter Pick");
        let before = fx.accumulated;

        for event in [
            InputEvent::Press { pos: Vec2::new(400.0, 300.0) },
            InputEvent::Move { pos: Vec2::new(410.0, 300.0) },
            InputEvent::Release { pos: Vec2::new(410.0, 300.0) },
        ] {
            engine.on_input(event, &mut fx.ctx()).expect("Feinjustage");
        }

        let expected = before.then(&RigidTransform::rotation_z(2.0f32.to_radians()));
        assert!(fx.accumulated.abs_diff_eq(&expected, 1e-5));
        assert_eq!(fx.history.len(), 1);
    }

    #[test]
    fn vertical_north_direction_is_rejected() {
        let cloud = PointCloud::new(vec![Vec3::ZERO, Vec3::new(0.0, 0.0, 1.0)]);
        let mut fx = Fixture::with_cloud(cloud);
        let mut engine = CalibrationEngine::new();
        engine.start_north_alignment(&mut fx.ctx());

        let center = fx.scene.projector().project_point(Vec3::ZERO).screen;
        engine
            .on_input(InputEvent::Press { pos: center }, &mut fx.ctx())
            .expect("erster Pick");
        let result = engine.on_input(InputEvent::Press { pos: center }, &mut fx.ctx());

        assert!(matches!(result, Err(ScanError::Input(_))));
        assert!(matches!(engine.phase(), CalibrationPhase::NorthSecond { .. }));
        assert_eq!(fx.accumulated, RigidTransform::IDENTITY);
    }

    #[test]
    fn confirm_removes_calibration_visuals() {
        let mut fx = Fixture::with_cloud(tilted_cloud());
        let mut engine = CalibrationEngine::new();
        engine.start_ground_preview(&mut fx.ctx());
        assert_eq!(fx.scene.count_role(RenderRole::Guide), 1);

        engine.confirm_ground(&mut fx.ctx());

        assert!(fx.scene.is_empty());
        assert_eq!(engine.phase(), &CalibrationPhase::Idle);
    }
}
