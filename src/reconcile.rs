//! Collapse a window of raw change events into one net operation per path.
//!
//! Every remote write carries the full current file content, so a path only
//! ever needs one operation per window: the last effective one.

use chrono::{DateTime, FixedOffset};
use std::collections::{HashMap, HashSet};

use crate::journal::{ChangeAction, ChangeEvent};

/// The single remote action computed for a path
#[derive(Debug, Clone, PartialEq)]
pub struct NetOp {
    pub action: ChangeAction,
    pub path: String,
    pub timestamp: DateTime<FixedOffset>,
    /// Source path for [`ChangeAction::Rename`]
    pub old_path: Option<String>,
}

impl From<&ChangeEvent> for NetOp {
    fn from(event: &ChangeEvent) -> Self {
        Self {
            action: event.action,
            path: event.path.clone(),
            timestamp: event.timestamp,
            old_path: event.old_path.clone(),
        }
    }
}

/// Path-keyed map that remembers first-insertion order
///
/// Removing a key frees its slot; inserting it again appends a new slot.
#[derive(Default)]
struct OrderedOps {
    slots: Vec<Option<NetOp>>,
    index: HashMap<String, usize>,
}

impl OrderedOps {
    fn get_mut(&mut self, path: &str) -> Option<&mut NetOp> {
        let slot = *self.index.get(path)?;
        self.slots[slot].as_mut()
    }

    fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    fn remove(&mut self, path: &str) {
        if let Some(slot) = self.index.remove(path) {
            self.slots[slot] = None;
        }
    }

    fn set(&mut self, op: NetOp) {
        match self.index.get(&op.path) {
            Some(&slot) => self.slots[slot] = Some(op),
            None => {
                self.index.insert(op.path.clone(), self.slots.len());
                self.slots.push(Some(op));
            }
        }
    }

    fn into_ops(self) -> Vec<NetOp> {
        self.slots.into_iter().flatten().collect()
    }
}

/// Reduce `events` (oldest first) to the minimal set of net operations
///
/// Single forward pass:
/// 1. a rename drops whatever was tracked under its old path;
/// 2. a delete of a tracked path cancels it;
/// 3. a modify of a tracked path upgrades the entry to a create;
/// 4. anything else replaces the entry.
///
/// A modify of a path that was renamed away earlier in the window, and not
/// recreated since, is stale and dropped. Boundary markers are ignored.
pub fn reconcile(events: &[ChangeEvent]) -> Vec<NetOp> {
    let mut ops = OrderedOps::default();
    let mut renamed_away: HashSet<&str> = HashSet::new();

    for event in events {
        if event.action.is_boundary() {
            continue;
        }

        if let Some(old_path) = &event.old_path {
            ops.remove(old_path);
            renamed_away.insert(old_path.as_str());
        }
        match event.action {
            ChangeAction::Create | ChangeAction::Rename => {
                renamed_away.remove(event.path.as_str());
            }
            ChangeAction::Modify
                if !ops.contains(&event.path) && renamed_away.contains(event.path.as_str()) =>
            {
                log::debug!("Dropping stale MODIFY of renamed path {}", event.path);
                continue;
            }
            _ => {}
        }

        if ops.contains(&event.path) {
            match event.action {
                ChangeAction::Delete => {
                    ops.remove(&event.path);
                    continue;
                }
                ChangeAction::Modify => {
                    if let Some(existing) = ops.get_mut(&event.path) {
                        existing.action = ChangeAction::Create;
                    }
                    continue;
                }
                _ => {}
            }
        }

        ops.set(NetOp::from(event));
    }

    ops.into_ops()
}
