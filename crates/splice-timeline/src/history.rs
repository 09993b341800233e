//! Bounded undo/redo history of applied edit commands.

use std::fmt;

use smallvec::SmallVec;
use splice_core::limits::DEFAULT_HISTORY_DEPTH;
use splice_core::{Result, SpliceError};
use tracing::debug;

use crate::edit::{AffectedRanges, EditCommand};
use crate::timeline::Timeline;

/// Stable reference to one history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EditHandle(u64);

impl fmt::Display for EditHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Result of one history transition: the new timeline and what changed.
#[derive(Debug, Clone)]
pub struct HistoryStep {
    pub handle: EditHandle,
    pub label: String,
    pub affected: AffectedRanges,
    pub timeline: Timeline,
}

#[derive(Debug)]
struct Entry {
    handle: EditHandle,
    command: EditCommand,
}

/// Undo/redo stack.
///
/// The stack does not own the timeline; every call takes the current state
/// and returns the next one so the caller decides when to publish it.
#[derive(Debug)]
pub struct HistoryStack {
    /// Applied commands (most recent last).
    done: Vec<Entry>,
    /// Undone commands (most recent last).
    undone: Vec<Entry>,
    max_depth: usize,
    merge_trims: bool,
    next_handle: u64,
    /// Merging only continues an uninterrupted run of pushes.
    last_was_push: bool,
}

impl HistoryStack {
    pub fn new(max_depth: usize) -> Self {
        Self {
            done: Vec::new(),
            undone: Vec::new(),
            max_depth,
            merge_trims: true,
            next_handle: 1,
            last_was_push: false,
        }
    }

    /// Builder: enable or disable coalescing of repeated trims.
    pub fn with_merge_trims(mut self, merge: bool) -> Self {
        self.merge_trims = merge;
        self
    }

    /// Apply `command` to `current` and record it.
    ///
    /// Clears the redo branch. A rejected command is not recorded and the
    /// history is left as it was.
    pub fn push(&mut self, mut command: EditCommand, current: &Timeline) -> Result<HistoryStep> {
        let timeline = command.apply(current)?;
        let label = command.label().to_string();
        let affected: AffectedRanges = command.affected().iter().copied().collect();

        for mut entry in self.undone.drain(..) {
            entry.command.discard();
        }

        let merge = self.merge_trims
            && self.last_was_push
            && self
                .done
                .last()
                .is_some_and(|top| top.command.mergeable_with(&command));

        let handle = match self.done.pop() {
            Some(top) if merge => {
                let merged = top.command.merge(command)?;
                debug!(handle = %top.handle, label = %label, "merged into previous edit");
                self.done.push(Entry {
                    handle: top.handle,
                    command: merged,
                });
                top.handle
            }
            top => {
                self.done.extend(top);
                let handle = EditHandle(self.next_handle);
                self.next_handle += 1;
                self.done.push(Entry { handle, command });
                self.evict();
                handle
            }
        };
        self.last_was_push = true;
        debug!(handle = %handle, label = %label, depth = self.done.len(), "pushed");

        Ok(HistoryStep {
            handle,
            label,
            affected,
            timeline,
        })
    }

    fn evict(&mut self) {
        while self.done.len() > self.max_depth {
            let mut oldest = self.done.remove(0);
            oldest.command.discard();
            debug!(handle = %oldest.handle, "evicted from history");
        }
    }

    /// Revert the most recent applied command.
    pub fn undo(&mut self, current: &Timeline) -> Result<HistoryStep> {
        let Some(mut entry) = self.done.pop() else {
            return Err(SpliceError::NothingToUndo);
        };
        match entry.command.invert(current) {
            Ok(timeline) => {
                let step = HistoryStep {
                    handle: entry.handle,
                    label: entry.command.label().to_string(),
                    affected: entry.command.affected().iter().copied().collect(),
                    timeline,
                };
                debug!(handle = %entry.handle, label = %step.label, "undo");
                self.undone.push(entry);
                self.last_was_push = false;
                Ok(step)
            }
            Err(e) => {
                self.done.push(entry);
                Err(e)
            }
        }
    }

    /// Re-apply the most recently undone command.
    pub fn redo(&mut self, current: &Timeline) -> Result<HistoryStep> {
        let Some(mut entry) = self.undone.pop() else {
            return Err(SpliceError::NothingToRedo);
        };
        match entry.command.reapply(current) {
            Ok(timeline) => {
                let step = HistoryStep {
                    handle: entry.handle,
                    label: entry.command.label().to_string(),
                    affected: entry.command.affected().iter().copied().collect(),
                    timeline,
                };
                debug!(handle = %entry.handle, label = %step.label, "redo");
                self.done.push(entry);
                self.last_was_push = false;
                Ok(step)
            }
            Err(e) => {
                self.undone.push(entry);
                Err(e)
            }
        }
    }

    /// Undo every command down to and including `handle`.
    ///
    /// The returned step carries the label of `handle` and the union of all
    /// affected ranges.
    pub fn undo_to(&mut self, handle: EditHandle, current: &Timeline) -> Result<HistoryStep> {
        if !self.done.iter().any(|e| e.handle == handle) {
            return Err(SpliceError::NotFound(format!("history entry {handle}")));
        }
        let mut timeline = current.clone();
        let mut affected = SmallVec::new();
        loop {
            let step = self.undo(&timeline)?;
            affected.extend(step.affected);
            timeline = step.timeline;
            if step.handle == handle {
                return Ok(HistoryStep {
                    handle,
                    label: step.label,
                    affected,
                    timeline,
                });
            }
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.done.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.undone.is_empty()
    }

    pub fn undo_count(&self) -> usize {
        self.done.len()
    }

    pub fn redo_count(&self) -> usize {
        self.undone.len()
    }

    /// Label of the command `undo` would revert.
    pub fn undo_label(&self) -> Option<&str> {
        self.done.last().map(|e| e.command.label())
    }

    /// Label of the command `redo` would re-apply.
    pub fn redo_label(&self) -> Option<&str> {
        self.undone.last().map(|e| e.command.label())
    }

    /// Applied entries, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = (EditHandle, &str)> + '_ {
        self.done.iter().map(|e| (e.handle, e.command.label()))
    }

    /// Drop all history.
    pub fn clear(&mut self) {
        for mut entry in self.done.drain(..).chain(self.undone.drain(..)) {
            entry.command.discard();
        }
        self.last_was_push = false;
    }
}

impl Default for HistoryStack {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_DEPTH)
    }
}

// ── Tests ───────────────────────────────────────────────────────
