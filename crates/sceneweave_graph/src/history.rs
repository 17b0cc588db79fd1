// SPDX-License-Identifier: MIT OR Apache-2.0
//! Deferred command execution with a bounded undo/redo history.
//!
//! Commands raised during a frame are queued and executed together by
//! [`CommandQueue::flush`], once per frame after input handling and before
//! redraw. Reversible commands enter a linear history with a cursor:
//! everything before the cursor can be undone, everything after it redone.

use crate::command::GraphCommand;
use crate::registry::ConnectionRegistry;
use std::collections::VecDeque;
use std::fmt;
use thiserror::Error;

/// Maximum undo history depth
pub const MAX_HISTORY: usize = 100;

/// History errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HistoryError {
    /// Nothing to undo
    #[error("Nothing to undo")]
    NothingToUndo,

    /// Nothing to redo
    #[error("Nothing to redo")]
    NothingToRedo,
}

/// Result type for history operations
pub type Result<T> = std::result::Result<T, HistoryError>;

/// Outcome of one [`CommandQueue::flush`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Commands executed
    pub executed: usize,
    /// Commands that entered the history
    pub recorded: usize,
}

/// History statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryStats {
    /// Entries that can be undone
    pub undo_count: usize,
    /// Entries that can be redone
    pub redo_count: usize,
    /// Commands waiting for the next flush
    pub pending: usize,
    /// Maximum history depth
    pub max_depth: usize,
}

/// Queue of pending commands plus the undo/redo history
pub struct CommandQueue {
    /// Commands waiting for the next flush
    pending: VecDeque<Box<dyn GraphCommand>>,
    /// Executed reversible commands, oldest first
    history: VecDeque<Box<dyn GraphCommand>>,
    /// Number of history entries currently applied
    cursor: usize,
    /// Maximum history depth
    max_depth: usize,
}

impl CommandQueue {
    /// Create a queue with the default history depth
    pub fn new() -> Self {
        Self::with_max_depth(MAX_HISTORY)
    }

    /// Create with custom maximum depth
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            pending: VecDeque::new(),
            history: VecDeque::new(),
            cursor: 0,
            max_depth: max_depth.max(1),
        }
    }

    /// Defer a command to the next flush
    pub fn queue(&mut self, command: impl GraphCommand + 'static) {
        self.queue_boxed(Box::new(command));
    }

    /// Defer an already boxed command
    pub fn queue_boxed(&mut self, command: Box<dyn GraphCommand>) {
        self.pending.push_back(command);
    }

    /// Execute every pending command in the order it was queued
    pub fn flush(&mut self, registry: &mut ConnectionRegistry) -> FlushReport {
        let mut report = FlushReport::default();

        while let Some(mut command) = self.pending.pop_front() {
            command.apply(registry);
            report.executed += 1;

            if !command.is_reversible() {
                tracing::debug!("Executed {:?} (nothing to undo)", command.description());
                continue;
            }

            tracing::debug!("Executed {:?}", command.description());
            self.record(command);
            report.recorded += 1;
        }

        report
    }

    fn record(&mut self, command: Box<dyn GraphCommand>) {
        // A new edit discards the redo tail
        self.history.truncate(self.cursor);
        self.history.push_back(command);
        self.cursor = self.history.len();

        // Enforce history limit
        while self.history.len() > self.max_depth {
            self.history.pop_front();
            self.cursor -= 1;
        }
    }

    /// Reverse the entry before the cursor
    pub fn undo(&mut self, registry: &mut ConnectionRegistry) -> Result<()> {
        if self.cursor == 0 {
            return Err(HistoryError::NothingToUndo);
        }
        self.cursor -= 1;
        let command = &mut self.history[self.cursor];
        tracing::debug!("Undo {:?}", command.description());
        command.reverse(registry);
        Ok(())
    }

    /// Re-apply the entry at the cursor
    pub fn redo(&mut self, registry: &mut ConnectionRegistry) -> Result<()> {
        let Some(command) = self.history.get_mut(self.cursor) else {
            return Err(HistoryError::NothingToRedo);
        };
        tracing::debug!("Redo {:?}", command.description());
        command.apply(registry);
        self.cursor += 1;
        Ok(())
    }

    /// Check if undo is available
    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    /// Check if redo is available
    pub fn can_redo(&self) -> bool {
        self.cursor < self.history.len()
    }

    /// Get description of next undo operation
    pub fn undo_description(&self) -> Option<&str> {
        self.cursor
            .checked_sub(1)
            .and_then(|i| self.history.get(i))
            .map(|c| c.description())
    }

    /// Get description of next redo operation
    pub fn redo_description(&self) -> Option<&str> {
        self.history.get(self.cursor).map(|c| c.description())
    }

    /// Descriptions of every history entry, oldest first
    pub fn descriptions(&self) -> impl Iterator<Item = &str> + '_ {
        self.history.iter().map(|c| c.description())
    }

    /// Number of history entries
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// Whether the history is empty
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Number of commands waiting for the next flush
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Clear all history and drop pending commands
    pub fn clear(&mut self) {
        self.pending.clear();
        self.history.clear();
        self.cursor = 0;
    }

    /// Get history statistics
    pub fn stats(&self) -> HistoryStats {
        HistoryStats {
            undo_count: self.cursor,
            redo_count: self.history.len() - self.cursor,
            pending: self.pending.len(),
            max_depth: self.max_depth,
        }
    }
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CommandQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandQueue")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
