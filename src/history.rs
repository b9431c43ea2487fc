use serde::{Deserialize, Serialize};

use crate::{
    error::HistoryError,
    rules::{Ply, Snapshot},
};

/// Which position is on display.
///
/// `At(i)` shows the position after ply `i`. Only `Live` accepts new moves.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(tag = "mode", content = "index", rename_all = "lowercase")]
pub enum ViewCursor {
    #[default]
    Live,
    At(usize),
}

/// Every ply played so far, plus the position at each ply boundary.
///
/// `snapshots[0]` is the starting position and `snapshots[i + 1]` is the result of
/// playing `plies[i]` on `snapshots[i]`, so there is always exactly one more snapshot
/// than there are plies.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct HistoryLedger {
    plies: Vec<Ply>,
    snapshots: Vec<Snapshot>,
    cursor: ViewCursor,
}

impl HistoryLedger {
    pub fn new(initial: Snapshot) -> Self {
        HistoryLedger {
            plies: Vec::new(),
            snapshots: vec![initial],
            cursor: ViewCursor::Live,
        }
    }

    /// Records a ply the rules engine has just played, and returns to the live view.
    pub fn append(&mut self, ply: Ply, resulting: Snapshot) {
        self.plies.push(ply);
        self.snapshots.push(resulting);
        self.cursor = ViewCursor::Live;
        debug_assert_eq!(self.snapshots.len(), self.plies.len() + 1);
    }

    /// The position after ply `index`.
    pub fn snapshot_at(&self, index: usize) -> Result<&Snapshot, HistoryError> {
        if index >= self.plies.len() {
            return Err(HistoryError::OutOfRange {
                index,
                len: self.plies.len(),
            });
        }
        Ok(&self.snapshots[index + 1])
    }

    /// Drops every ply, keeping only the starting position.
    pub fn reset(&mut self) {
        self.plies.clear();
        self.snapshots.truncate(1);
        self.cursor = ViewCursor::Live;
    }

    pub fn plies(&self) -> &[Ply] {
        &self.plies
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    pub fn len(&self) -> usize {
        self.plies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plies.is_empty()
    }

    pub fn cursor(&self) -> ViewCursor {
        self.cursor
    }

    pub fn is_live(&self) -> bool {
        self.cursor == ViewCursor::Live
    }

    pub fn initial(&self) -> &Snapshot {
        &self.snapshots[0]
    }

    pub fn live_snapshot(&self) -> &Snapshot {
        &self.snapshots[self.plies.len()]
    }

    /// The position the cursor points at.
    pub fn displayed_snapshot(&self) -> &Snapshot {
        match self.cursor {
            ViewCursor::Live => self.live_snapshot(),
            ViewCursor::At(index) => self
                .snapshot_at(index)
                .unwrap_or_else(|_| self.live_snapshot()),
        }
    }

    /// The ply that led to the displayed position.
    pub fn displayed_last_ply(&self) -> Option<&Ply> {
        match self.cursor {
            ViewCursor::Live => self.plies.last(),
            ViewCursor::At(index) => self.plies.get(index),
        }
    }

    /// One ply back. From the live view this shows the last ply; it never goes below
    /// ply 0, and with no plies there is nothing to browse.
    pub fn step_back(&mut self) -> ViewCursor {
        self.cursor = match self.cursor {
            _ if self.plies.is_empty() => ViewCursor::Live,
            ViewCursor::Live => ViewCursor::At(self.plies.len() - 1),
            ViewCursor::At(index) => ViewCursor::At(index.saturating_sub(1)),
        };
        self.cursor
    }

    /// One ply forward. Stepping past the last ply returns to the live view.
    pub fn step_forward(&mut self) -> ViewCursor {
        self.cursor = match self.cursor {
            ViewCursor::Live => ViewCursor::Live,
            ViewCursor::At(index) if index + 1 >= self.plies.len() => ViewCursor::Live,
            ViewCursor::At(index) => ViewCursor::At(index + 1),
        };
        self.cursor
    }

    /// Shows the position after ply `index`, clamped to the plies that exist.
    pub fn jump_to(&mut self, index: usize) -> ViewCursor {
        self.cursor = match self.plies.len() {
            0 => ViewCursor::Live,
            len => ViewCursor::At(index.min(len - 1)),
        };
        self.cursor
    }
}
