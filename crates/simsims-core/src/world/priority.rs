//! Priority table: how urgently each activity kind's product is needed.

use std::collections::BTreeMap;

use crate::activity::ActivityKind;

/// Priority per activity kind, in registration order.
///
/// Priorities never go below zero. They rise when an activity finds the
/// kind's product missing and fall when an instance of the kind succeeds.
#[derive(Debug, Clone, Default)]
pub struct PriorityTable {
    entries: Vec<(ActivityKind, u32)>,
}

impl PriorityTable {
    /// Adds a kind at priority zero; a known kind keeps its priority.
    pub fn register(&mut self, kind: ActivityKind) {
        if self.get(kind).is_none() {
            self.entries.push((kind, 0));
        }
    }

    pub fn get(&self, kind: ActivityKind) -> Option<u32> {
        self.entries
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, p)| *p)
    }

    /// Raises a kind's priority by one and returns the new value.
    pub fn raise(&mut self, kind: ActivityKind) -> u32 {
        match self.entries.iter_mut().find(|(k, _)| *k == kind) {
            Some((_, p)) => {
                *p = p.saturating_add(1);
                *p
            }
            None => {
                self.entries.push((kind, 1));
                1
            }
        }
    }

    /// Lowers a kind's priority by one, stopping at zero.
    ///
    /// Kinds that produce nothing tracked are never boosted, so decay on
    /// them is a no-op.
    pub fn decay(&mut self, kind: ActivityKind) {
        if kind.produces().is_none() {
            return;
        }
        if let Some((_, p)) = self.entries.iter_mut().find(|(k, _)| *k == kind) {
            *p = p.saturating_sub(1);
        }
    }

    /// Kinds by descending priority; ties keep registration order.
    pub fn ranked(&self) -> Vec<ActivityKind> {
        let mut ranked = self.entries.clone();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.into_iter().map(|(k, _)| k).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Priorities keyed by kind label.
    pub fn labelled(&self) -> BTreeMap<String, u32> {
        self.entries
            .iter()
            .map(|(k, p)| (k.label().to_string(), *p))
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
