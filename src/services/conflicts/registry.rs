//! Conflict Registry
//!
//! Ordered list of unresolved preference conflicts. Duplicate keys may
//! coexist; entries are addressed by position.

use fidus_core::preference::PreferenceConflict;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConflictRegistry {
    conflicts: Vec<PreferenceConflict>,
}

impl ConflictRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append conflicts in the order given.
    pub fn append(&mut self, conflicts: impl IntoIterator<Item = PreferenceConflict>) {
        self.conflicts.extend(conflicts);
    }

    /// Remove exactly the conflict at `index`.
    pub fn remove_at(&mut self, index: usize) -> Option<PreferenceConflict> {
        if index < self.conflicts.len() {
            Some(self.conflicts.remove(index))
        } else {
            None
        }
    }

    /// Remove a conflict that was resolved from a snapshot.
    ///
    /// Other conflicts may have been removed while the resolution was in
    /// flight, so `index` is only a hint: the entry there is removed if it is
    /// still `conflict`, otherwise the first equal entry is.
    pub fn remove_matching(
        &mut self,
        index: usize,
        conflict: &PreferenceConflict,
    ) -> Option<PreferenceConflict> {
        if self.conflicts.get(index) == Some(conflict) {
            return self.remove_at(index);
        }
        let position = self.conflicts.iter().position(|c| c == conflict)?;
        self.remove_at(position)
    }

    pub fn get(&self, index: usize) -> Option<&PreferenceConflict> {
        self.conflicts.get(index)
    }

    pub fn len(&self) -> usize {
        self.conflicts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PreferenceConflict> {
        self.conflicts.iter()
    }

    pub fn snapshot(&self) -> Vec<PreferenceConflict> {
        self.conflicts.clone()
    }
}
