//! Begrenzter Undo-Stack mit vollständigen Snapshots.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::core::{PointCloud, RigidTransform};

/// Snapshot reduziert auf die für Undo relevanten Teile.
///
/// Die Wolke wird nie in-place verändert, daher genügt ein Arc-Klon:
/// der Snapshot bleibt unverändert, auch wenn der Zustand später ersetzt wird.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub cloud: Arc<PointCloud>,
    /// Akkumulierte Kalibrier-Transformation zum Zeitpunkt des Snapshots
    pub accumulated: RigidTransform,
}

/// FIFO-begrenzter Undo-Stack. Bei Überlauf wird der älteste Eintrag verworfen.
#[derive(Debug, Clone)]
pub struct HistoryManager<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T> HistoryManager<T> {
    /// Erstellt einen neuen History-Manager mit maximaler Tiefe.
    pub fn new_with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Legt einen Snapshot ab und verwirft bei Bedarf die ältesten.
    pub fn push(&mut self, snapshot: T) {
        self.entries.push_back(snapshot);
        self.evict_overflow();
    }

    /// Entnimmt den jüngsten Snapshot; `None` wenn nichts rückgängig zu machen ist.
    pub fn undo(&mut self) -> Option<T> {
        self.entries.pop_back()
    }

    /// Ändert die Kapazität und verwirft sofort überzählige alte Einträge.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        self.evict_overflow();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Prüft ob Undo möglich ist.
    pub fn can_undo(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Einträge vom ältesten zum jüngsten.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    fn evict_overflow(&mut self) {
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }
}

impl<T> Default for HistoryManager<T> {
    fn default() -> Self {
        Self::new_with_capacity(1)
    }
}
