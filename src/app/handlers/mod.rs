//! Feature-Handler für AppCommand-Verarbeitung.
//!
//! Jeder Handler gruppiert die Command-Ausführung eines Feature-Bereichs.
//! Der Controller dispatcht an die passende Handler-Funktion.

pub mod annotation;
pub mod calibration;
pub mod file_io;
pub mod history;
pub mod interaction;
pub mod options;
pub mod selection;
pub mod view;
