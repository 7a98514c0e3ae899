//! Geteilte Typen für layer-übergreifende Verträge.
//!
//! Enthält die Laufzeit-Optionen, die `core`, `io` und `app` gemeinsam lesen.

pub mod options;

pub use options::{ColorPalette, EditorOptions};
