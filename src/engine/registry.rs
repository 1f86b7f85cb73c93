//! Instance Registry - Generational arena for live instances.
//!
//! Manages the lifecycle of instance slots:
//! - Stable [`InstanceId`] handles (index + generation)
//! - Free slot pool for O(1) reuse
//! - Stale handles are rejected after their slot is reused
//!
//! Parent links are stored as ids, never as references, so upward walks
//! (`find`, anchor resolution, notification bubbling) are plain lookups.

use std::fmt;

use crate::error::StructuralError;

// =============================================================================
// Instance Id
// =============================================================================

/// Stable handle to a live instance.
///
/// A handle stays valid until its instance is removed. Once the slot is reused
/// the old handle no longer resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId {
    index: u32,
    generation: u32,
}

impl InstanceId {
    /// Slot index inside the arena.
    pub fn index(self) -> usize {
        self.index as usize
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

// =============================================================================
// Registry
// =============================================================================

struct Entry<T> {
    generation: u32,
    value: Option<T>,
}

/// Arena of values addressed by [`InstanceId`].
pub(crate) struct Registry<T> {
    entries: Vec<Entry<T>>,
    /// Pool of freed slots for reuse.
    free: Vec<u32>,
    len: usize,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }
}

impl<T> Registry<T> {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Store a value, reusing a freed slot when one is available.
    ///
    /// Fails once every `u32` slot index is taken.
    pub(crate) fn allocate(&mut self, value: T) -> Result<InstanceId, StructuralError> {
        if let Some(index) = self.free.pop() {
            let entry = &mut self.entries[index as usize];
            entry.value = Some(value);
            self.len += 1;
            return Ok(InstanceId {
                index,
                generation: entry.generation,
            });
        }

        let index = slot_index(self.entries.len())?;
        self.entries.push(Entry {
            generation: 0,
            value: Some(value),
        });
        self.len += 1;
        Ok(InstanceId {
            index,
            generation: 0,
        })
    }

    /// Release a slot back to the pool, returning its value.
    ///
    /// The slot's generation is bumped so outstanding handles go stale.
    pub(crate) fn release(&mut self, id: InstanceId) -> Option<T> {
        let entry = self.entries.get_mut(id.index())?;
        if entry.generation != id.generation {
            return None;
        }
        let value = entry.value.take()?;
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(id.index);
        self.len -= 1;
        Some(value)
    }

    pub(crate) fn get(&self, id: InstanceId) -> Option<&T> {
        self.entries
            .get(id.index())
            .filter(|entry| entry.generation == id.generation)
            .and_then(|entry| entry.value.as_ref())
    }

    pub(crate) fn get_mut(&mut self, id: InstanceId) -> Option<&mut T> {
        self.entries
            .get_mut(id.index())
            .filter(|entry| entry.generation == id.generation)
            .and_then(|entry| entry.value.as_mut())
    }

    pub(crate) fn contains(&self, id: InstanceId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live values.
    pub(crate) fn len(&self) -> usize {
        self.len
    }
}

fn slot_index(position: usize) -> Result<u32, StructuralError> {
    u32::try_from(position).map_err(|_| StructuralError::RegistryFull)
}
