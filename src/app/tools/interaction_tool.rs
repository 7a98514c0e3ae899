//! InteractionTool-Trait: Schnittstelle für alle Interaktionsmodi.

use crate::app::input::{InputEvent, InputKind, ALL_INPUT, NO_INPUT};
use crate::error::ScanError;

use super::{InteractionMode, Submode, ToolContext};

/// Schnittstelle für alle Interaktionsmodi (Selektion, Kalibrierung, Messung, …).
///
/// Genau ein Modus ist aktiv. Ein Moduswechsel ruft `deactivate` des alten
/// Modus auf, bevor der neue Modus registriert und aktiviert wird.
pub trait InteractionTool {
    /// Modus-Kennung
    fn mode(&self) -> InteractionMode;

    fn submode(&self) -> Submode;

    /// Untermodus wechseln; laufende Gesten werden verworfen.
    fn set_submode(&mut self, submode: Submode, ctx: &mut ToolContext<'_>);

    /// Eingabearten im Zeichenmodus.
    fn draw_input(&self) -> &'static [InputKind];

    /// Eingabearten, die im aktuellen Zustand abonniert werden.
    fn input_kinds(&self) -> &'static [InputKind] {
        match self.submode() {
            Submode::View => NO_INPUT,
            Submode::Pan => ALL_INPUT,
            Submode::Draw => self.draw_input(),
        }
    }

    /// Wird nach der Registrierung aufgerufen.
    fn activate(&mut self, _ctx: &mut ToolContext<'_>) {}

    /// Baut alle transienten Zustände und Visuals des Modus ab.
    fn deactivate(&mut self, ctx: &mut ToolContext<'_>);

    /// Verarbeitet ein geroutetes Eingabe-Event.
    fn on_input(&mut self, event: InputEvent, ctx: &mut ToolContext<'_>) -> Result<(), ScanError>;
}
