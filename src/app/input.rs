//! Eingabe-Events und Registrierung des aktiven Modus.
//!
//! Der Router hält höchstens eine Registrierung. Jede neue Registrierung
//! baut die vorherige vollständig ab, bevor sie greift.

use glam::Vec2;

use super::tools::InteractionMode;

/// Screen-Space-Eingabe des Szenen-Managers (Pixel, Ursprung unten links).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    Press { pos: Vec2 },
    Move { pos: Vec2 },
    Release { pos: Vec2 },
}

impl InputEvent {
    pub fn kind(&self) -> InputKind {
        match self {
            InputEvent::Press { .. } => InputKind::Press,
            InputEvent::Move { .. } => InputKind::Move,
            InputEvent::Release { .. } => InputKind::Release,
        }
    }

    pub fn pos(&self) -> Vec2 {
        match *self {
            InputEvent::Press { pos } | InputEvent::Move { pos } | InputEvent::Release { pos } => {
                pos
            }
        }
    }
}

/// Art eines Eingabe-Events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputKind {
    Press,
    Move,
    Release,
}

/// Alle Eingabearten.
pub const ALL_INPUT: &[InputKind] = &[InputKind::Press, InputKind::Move, InputKind::Release];
/// Nur Klicks.
pub const PRESS_ONLY: &[InputKind] = &[InputKind::Press];
/// Keine Eingabe (Ansichtsmodus).
pub const NO_INPUT: &[InputKind] = &[];

/// Aktive Registrierung eines Modus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputRegistration {
    pub token: u64,
    pub mode: InteractionMode,
    pub kinds: Vec<InputKind>,
}

/// Leitet Events an den registrierten Modus weiter.
#[derive(Debug, Default)]
pub struct InputRouter {
    current: Option<InputRegistration>,
    next_token: u64,
}

impl InputRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registriert `mode` für `kinds`. Eine bestehende Registrierung wird zuerst entfernt.
    pub fn register(&mut self, mode: InteractionMode, kinds: &[InputKind]) -> u64 {
        if let Some(previous) = self.release() {
            log::debug!(
                "Registrierung {} ({:?}) vor Neuregistrierung entfernt",
                previous.token,
                previous.mode
            );
        }
        self.next_token += 1;
        self.current = Some(InputRegistration {
            token: self.next_token,
            mode,
            kinds: kinds.to_vec(),
        });
        self.next_token
    }

    /// Entfernt die aktuelle Registrierung.
    pub fn release(&mut self) -> Option<InputRegistration> {
        self.current.take()
    }

    pub fn current(&self) -> Option<&InputRegistration> {
        self.current.as_ref()
    }

    /// Ziel-Modus für ein Event, sofern der Modus diese Eingabeart abonniert hat.
    pub fn route(&self, event: &InputEvent) -> Option<InteractionMode> {
        self.current
            .as_ref()
            .filter(|registration| registration.kinds.contains(&event.kind()))
            .map(|registration| registration.mode)
    }
}
