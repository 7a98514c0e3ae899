//! Crash-Site Scan Workbench (CLI).
//!
//! Verarbeitet einen Rohscan headless zur Arbeitskopie `<stem>_work.ply`:
//! Transformation, Zuschnitt auf die Vorschau, Proximity-Maske, Ausdünnen.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use crash_site_scan::app::{run_pipeline, CancelToken, ReprocessRequest, ReprocessSettings};
use crash_site_scan::{
    EditorOptions, OrientedBox, PlyCodec, PointCloudCodec, RigidTransform, ScanError,
};

#[derive(Parser, Debug)]
#[command(name = "crash-site-scan", version, about = "Rohscan zur Arbeitskopie verarbeiten")]
struct Cli {
    /// Rohscan (PLY)
    raw: PathBuf,
    /// Bearbeitete Vorschau (PLY, bereits transformiert) für Zuschnitt und Maske
    #[arg(long)]
    preview: Option<PathBuf>,
    /// Akkumulierte Transformation als JSON (4×4, zeilenweise)
    #[arg(long)]
    transform: Option<PathBuf>,
    /// Optionen (TOML); Standard: neben der Binary
    #[arg(long)]
    config: Option<PathBuf>,
    /// Voxelgröße der Ausdünnung (0 = aus), überschreibt die Optionen
    #[arg(long)]
    voxel: Option<f32>,
}

fn main() -> ExitCode {
    // Logger initialisieren
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!(
        "Crash-Site Scan Workbench v{} startet...",
        env!("CARGO_PKG_VERSION")
    );

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config.unwrap_or_else(EditorOptions::config_path);
    let options = EditorOptions::load_from_file(&config_path);

    let mut settings = ReprocessSettings::from(&options);
    if let Some(voxel) = cli.voxel {
        settings.voxel_size = voxel;
    }

    let transform = cli.transform.as_deref().map(read_transform).transpose()?;

    let codec = PlyCodec::new();
    let (preview_points, crop) = match cli.preview.as_deref() {
        Some(path) => {
            let preview = codec
                .load(path)
                .map_err(|err| ScanError::io(path, &err))?
                .cloud;
            let crop = OrientedBox::from_points(preview.positions())
                .map(|b| b.scaled(options.crop_scale));
            (preview.positions().to_vec(), crop)
        }
        None => (Vec::new(), None),
    };

    let request = ReprocessRequest {
        raw_path: cli.raw,
        crop,
        transform,
        preview_points,
        settings,
    };

    let output = run_pipeline(&request, &codec, &CancelToken::new(), &mut |stage| {
        log::info!("{} ({}%)", stage.message(), stage.percent());
    })?;

    log::info!(
        "Fertig: {} ({} Punkte)",
        output.path.display(),
        output.point_count
    );
    Ok(())
}

fn read_transform(path: &Path) -> anyhow::Result<RigidTransform> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Transformation nicht lesbar: {}", path.display()))?;
    RigidTransform::from_json(&text)
        .with_context(|| format!("Transformation ungültig: {}", path.display()))
}
