//! Sitzungsprotokoll: ausgeführte Commands samt Ergebnis und Job-Abschlüsse.
//!
//! Dient der Nachvollziehbarkeit einer Rekonstruktion (welche Schritte in
//! welcher Reihenfolge, welche davon abgelehnt wurden).

use std::collections::VecDeque;

use super::reprocess::ReprocessUpdate;
use super::AppCommand;
use crate::error::ScanError;

/// Ergebnis eines Commands.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Applied,
    /// Degenerierte Eingabe, Zustand unverändert
    Rejected(String),
    Failed(String),
}

impl CommandOutcome {
    /// Ordnet ein Handler-Ergebnis ein.
    pub fn from_result(result: &anyhow::Result<()>) -> Self {
        match result {
            Ok(()) => CommandOutcome::Applied,
            Err(err) => match err.downcast_ref::<ScanError>() {
                Some(ScanError::Input(message)) => CommandOutcome::Rejected(message.clone()),
                _ => CommandOutcome::Failed(format!("{err:#}")),
            },
        }
    }
}

/// Eintrag im Protokoll.
#[derive(Debug, Clone)]
pub enum LogEntry {
    Command {
        command: AppCommand,
        outcome: CommandOutcome,
    },
    /// Abschlussmeldung eines Hintergrund-Jobs
    Reprocess(ReprocessUpdate),
}

/// Begrenztes Protokoll; bei Überlauf fällt die ältere Hälfte weg.
///
/// Viewport-Eingaben und Fortschritts-Polls werden nicht protokolliert.
#[derive(Debug, Default)]
pub struct CommandLog {
    entries: VecDeque<LogEntry>,
}

impl CommandLog {
    const MAX_ENTRIES: usize = 1000;

    pub fn new() -> Self {
        Self::default()
    }

    /// Protokolliert einen Command mit seinem Ergebnis.
    pub fn record(&mut self, command: &AppCommand, outcome: CommandOutcome) {
        if matches!(
            command,
            AppCommand::Input { .. } | AppCommand::PollReprocess
        ) {
            return;
        }
        self.push(LogEntry::Command {
            command: command.clone(),
            outcome,
        });
    }

    /// Protokolliert das Ende eines Hintergrund-Jobs; Fortschritt wird ignoriert.
    pub fn record_reprocess(&mut self, update: &ReprocessUpdate) {
        if matches!(update, ReprocessUpdate::Progress { .. }) {
            return;
        }
        self.push(LogEntry::Reprocess(update.clone()));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Einträge in Ausführungsreihenfolge.
    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.back()
    }

    /// Anzahl abgelehnter Eingaben (degenerierte Geometrie).
    pub fn rejected_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| {
                matches!(
                    entry,
                    LogEntry::Command {
                        outcome: CommandOutcome::Rejected(_),
                        ..
                    }
                )
            })
            .count()
    }

    fn push(&mut self, entry: LogEntry) {
        if self.entries.len() >= Self::MAX_ENTRIES {
            self.entries.drain(..Self::MAX_ENTRIES / 2);
        }
        self.entries.push_back(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::input::InputEvent;
    use glam::Vec2;
    use std::path::PathBuf;

    #[test]
    fn inputs_and_polls_are_not_recorded() {
        let mut log = CommandLog::new();
        log.record(
            &AppCommand::Input {
                event: InputEvent::Move { pos: Vec2::ONE },
            },
            CommandOutcome::Applied,
        );
        log.record(&AppCommand::PollReprocess, CommandOutcome::Applied);
        log.record(&AppCommand::Undo, CommandOutcome::Applied);

        assert_eq!(log.len(), 1);
        assert!(matches!(
            log.last(),
            Some(LogEntry::Command {
                command: AppCommand::Undo,
                ..
            })
        ));
    }

    #[test]
    fn input_errors_count_as_rejected() {
        let rejected: anyhow::Result<()> = Err(ScanError::input("kollinear").into());
        let failed: anyhow::Result<()> = Err(anyhow::anyhow!("Platte voll"));

        assert_eq!(
            CommandOutcome::from_result(&rejected),
            CommandOutcome::Rejected("kollinear".into())
        );
        assert!(matches!(
            CommandOutcome::from_result(&failed),
            CommandOutcome::Failed(_)
        ));

        let mut log = CommandLog::new();
        log.record(&AppCommand::ConfirmGround, CommandOutcome::from_result(&rejected));
        log.record(&AppCommand::AutoGround, CommandOutcome::Applied);
        assert_eq!(log.rejected_count(), 1);
    }

    #[test]
    fn only_terminal_job_updates_are_recorded() {
        let mut log = CommandLog::new();
        log.record_reprocess(&ReprocessUpdate::Progress {
            stage: crate::app::reprocess::ReprocessStage::Read,
            percent: 10,
        });
        log.record_reprocess(&ReprocessUpdate::Finished {
            output: PathBuf::from("scan_work.ply"),
            point_count: 42,
        });

        assert_eq!(log.len(), 1);
        assert!(matches!(
            log.last(),
            Some(LogEntry::Reprocess(ReprocessUpdate::Finished { point_count: 42, .. }))
        ));
    }

    #[test]
    fn overflow_drops_oldest_half() {
        let mut log = CommandLog::new();
        for _ in 0..CommandLog::MAX_ENTRIES {
            log.record(&AppCommand::PushHistory, CommandOutcome::Applied);
        }
        log.record(&AppCommand::Undo, CommandOutcome::Applied);

        assert_eq!(log.len(), CommandLog::MAX_ENTRIES / 2 + 1);
        assert!(matches!(
            log.last(),
            Some(LogEntry::Command {
                command: AppCommand::Undo,
                ..
            })
        ));
    }
}
