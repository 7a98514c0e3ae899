//! Application-Layer: Controller, State, Events, Interaktionsmodi und Hintergrund-Jobs.

pub mod command_log;
pub mod controller;
pub mod events;
pub mod handlers;
pub mod history;
pub mod input;
pub mod reprocess;
pub mod scene;
/// Application State
///
/// Dieses Modul verwaltet den Zustand einer Sitzung (Wolke, History, Tools).
pub mod state;
pub mod tools;

pub use command_log::{CommandLog, CommandOutcome, LogEntry};
pub use controller::AppController;
pub use events::{AppCommand, AppEvent};
pub use history::{HistoryManager, SessionSnapshot};
pub use input::{InputEvent, InputKind, InputRouter};
pub use reprocess::{
    run_pipeline, CancelToken, ReprocessJob, ReprocessRequest, ReprocessSettings, ReprocessStage,
    ReprocessUpdate,
};
pub use scene::{HeadlessScene, Primitive, PrimitiveHandle, RenderRole, SceneManager};
pub use state::{AppState, WorkflowStage};
pub use tools::{InteractionMode, Submode};
