//! AppCommand- und AppEvent-Enums für den Command/Event-Datenfluss.

mod command;
mod event;

pub use command::AppCommand;
pub use event::AppEvent;
