//! Crash-Site Scan Workbench.
//! Core-Funktionalität als Library exportiert für Tests, CLI und Wiederverwendung.

pub mod app;
pub mod core;
pub mod error;
pub mod ply;
pub mod shared;

pub use app::{
    AppCommand, AppController, AppEvent, AppState, HeadlessScene, InteractionMode,
    SceneManager, Submode, WorkflowStage,
};
pub use core::{
    Camera3D, OrientedBox, PointCloud, ProximityMask, RigidTransform, SpatialIndex, SpatialMatch,
};
pub use error::ScanError;
pub use ply::{PlyCodec, PlyFormat, PointCloudCodec};
pub use shared::EditorOptions;
