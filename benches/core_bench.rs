use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use crash_site_scan::app::tools::selection::select_in_polygon;
use crash_site_scan::core::{fit_plane, Camera3D, Projector, ScreenPolygon, Viewport};
use crash_site_scan::{PointCloud, ProximityMask};
use glam::{Vec2, Vec3};
use std::hint::black_box;

/// Verrauschtes Gitter, damit der KD-Baum auf jeder Achse teilen kann.
fn build_synthetic_cloud(point_count: usize) -> Vec<Vec3> {
    (0..point_count)
        .map(|index| {
            let column = (index % 1000) as f32;
            let row = (index / 1000) as f32;
            let x = column * 0.05 + row * 0.0001;
            let y = row * 0.05 + column * 0.0001;
            let z = ((index * 7919) % 97) as f32 * 0.001;
            Vec3::new(x, y, z)
        })
        .collect()
}

fn fitted_projector(points: &[Vec3]) -> Projector {
    let viewport = Viewport::new(1920.0, 1080.0);
    let mut camera = Camera3D::default();
    if let Some(bounds) = PointCloud::new(points.to_vec()).bounds() {
        camera.fit_bounds(&bounds);
    }
    Projector::new(camera.view_projection(viewport.aspect()), viewport)
}

fn lasso_polygon() -> ScreenPolygon {
    // Ellipse um die Bildmitte
    let center = Vec2::new(960.0, 540.0);
    let vertices = (0..64)
        .map(|i| {
            let angle = i as f32 / 64.0 * std::f32::consts::TAU;
            center + Vec2::new(angle.cos() * 400.0, angle.sin() * 300.0)
        })
        .collect();
    ScreenPolygon::new(vertices)
}

fn bench_lasso_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("lasso_selection");
    let polygon = lasso_polygon();

    for &point_count in &[100_000usize, 1_000_000usize] {
        let points = build_synthetic_cloud(point_count);
        let projector = fitted_projector(&points);

        group.bench_with_input(
            BenchmarkId::new("select_in_polygon", point_count),
            &points,
            |b, points| {
                b.iter(|| {
                    let indices = select_in_polygon(&projector, black_box(points), &polygon);
                    black_box(indices.len())
                })
            },
        );
    }

    group.finish();
}

fn bench_proximity_mask(c: &mut Criterion) {
    let mut group = c.benchmark_group("proximity_mask");

    for &point_count in &[10_000usize, 100_000usize] {
        let raw = build_synthetic_cloud(point_count);
        let preview: Vec<Vec3> = raw.iter().step_by(10).copied().collect();
        let mask = ProximityMask::new(&preview, 0.15);

        group.bench_with_input(
            BenchmarkId::new("retain_mask", point_count),
            &raw,
            |b, raw| {
                b.iter(|| {
                    let kept = mask.retain_mask(black_box(raw));
                    black_box(kept.iter().filter(|k| **k).count())
                })
            },
        );
    }

    group.finish();
}

fn bench_plane_fit(c: &mut Criterion) {
    let points = build_synthetic_cloud(100_000);

    c.bench_function("fit_plane_100k", |b| {
        b.iter(|| {
            let fit = fit_plane(black_box(&points), 0.1, 1000);
            black_box(fit.map(|f| f.inliers.len()))
        })
    });
}

criterion_group!(
    core_benches,
    bench_lasso_selection,
    bench_proximity_mask,
    bench_plane_fit
);
criterion_main!(core_benches);
