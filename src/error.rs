//! Fehler-Taxonomie der Kern-Operationen.
//!
//! Degenerierte Geometrie ist ein `Input`-Fehler, Codec-Probleme ein `Io`-Fehler.
//! Fehlende Vorbedingungen (StateError) werden nicht als Fehler gemeldet,
//! sondern von den Handlern geloggt und ignoriert.

use std::path::{Path, PathBuf};

/// Domänenfehler der Werkbank. Jede fehlschlagende Operation lässt den Zustand unverändert.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// Degenerierte Eingabe (kollineare Punkte, Null-Länge, fehlende Referenz)
    #[error("{0}")]
    Input(String),
    /// Lesen oder Schreiben einer Punktwolke fehlgeschlagen
    #[error("Datei {path} konnte nicht verarbeitet werden: {message}")]
    Io { path: PathBuf, message: String },
    /// Hintergrund-Job wurde abgebrochen
    #[error("Verarbeitung abgebrochen")]
    Cancelled,
}

impl ScanError {
    /// Erzeugt einen Eingabefehler mit Meldungstext.
    pub fn input(message: impl Into<String>) -> Self {
        Self::Input(message.into())
    }

    /// Verpackt einen Codec-Fehler samt Kontextkette.
    pub fn io(path: &Path, err: &anyhow::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            message: format!("{err:#}"),
        }
    }
}
