//! Value Allocation Pool
//!
//! Keys in TTL-heavy workloads are created and expired constantly. The pool
//! keeps a fixed number of value slots alive for the lifetime of the store and
//! hands them out through a free list, so the common case never touches the
//! allocator for the value record itself.
//!
//! ## Layout
//!
//! ```text
//! slots:  ┌────────┬────────┬────────┬────────┐
//!         │ gen 0  │ gen 3  │ gen 1  │ gen 0  │   fixed capacity
//!         │ Some(v)│ None   │ Some(v)│ None   │
//!         └────────┴────────┴────────┴────────┘
//! free:   [3, 1]                                  popped from the back
//! ```
//!
//! When the free list is empty, [`ValuePool::acquire`] falls back to a boxed
//! value outside the pool. The handle variant records which path was taken,
//! so releasing never has to guess where a value came from.
//!
//! Every release bumps the slot's generation. A [`SlotHandle`] copied before
//! the release no longer matches and is rejected with [`PoolError::StaleHandle`].

use crate::storage::value::{Value, ValueData};
use thiserror::Error;
use tracing::trace;

/// Errors reported when a handle does not refer to a live slot.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    /// The slot was released (and possibly reused) after this handle was issued
    #[error("stale slot handle (index {index}, generation {generation})")]
    StaleHandle { index: u32, generation: u32 },

    /// The handle points past the end of the pool
    #[error("slot index {0} out of range")]
    OutOfRange(u32),
}

/// Identifies one pool slot at one generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotHandle {
    index: u32,
    generation: u32,
}

impl SlotHandle {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// Owning handle for a value obtained from [`ValuePool::acquire`].
#[derive(Debug)]
pub enum ValueHandle {
    /// The value lives in a pool slot
    Pooled(SlotHandle),
    /// The pool was exhausted; the value was allocated on its own
    Overflow(Box<Value>),
}

impl ValueHandle {
    pub fn is_pooled(&self) -> bool {
        matches!(self, ValueHandle::Pooled(_))
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    value: Option<Value>,
}

/// Pool occupancy snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Number of slots in the pool
    pub capacity: usize,
    /// Slots currently holding a value
    pub in_use: usize,
    /// Live values allocated outside the pool
    pub overflow: usize,
}

/// Fixed-capacity slot arena with overflow fallback.
#[derive(Debug)]
pub struct ValuePool {
    slots: Vec<Slot>,
    free: Vec<u32>,
    overflow: usize,
}

impl ValuePool {
    /// Creates a pool with `capacity` empty slots.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.min(u32::MAX as usize);
        let slots = (0..capacity)
            .map(|_| Slot {
                generation: 0,
                value: None,
            })
            .collect();

        // Reversed so that slot 0 is handed out first
        let free = (0..capacity as u32).rev().collect();

        Self {
            slots,
            free,
            overflow: 0,
        }
    }

    /// Takes a slot off the free list and initializes it with `data`,
    /// or allocates an overflow value when no slot is free.
    ///
    /// The new value never expires. Exhaustion is not an error.
    pub fn acquire(&mut self, data: ValueData) -> ValueHandle {
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.value = Some(Value::new(data));
                ValueHandle::Pooled(SlotHandle {
                    index,
                    generation: slot.generation,
                })
            }
            None => {
                self.overflow += 1;
                trace!(overflow = self.overflow, "Value pool exhausted, allocating on heap");
                ValueHandle::Overflow(Box::new(Value::new(data)))
            }
        }
    }

    /// Releases a value. Pooled slots go back on the free list; overflow
    /// values are simply dropped. The payload is dropped in both cases.
    pub fn release(&mut self, handle: ValueHandle) -> Result<(), PoolError> {
        match handle {
            ValueHandle::Pooled(handle) => {
                let slot = self.slot_mut(handle)?;
                slot.value = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(handle.index);
                Ok(())
            }
            ValueHandle::Overflow(value) => {
                drop(value);
                self.overflow = self.overflow.saturating_sub(1);
                Ok(())
            }
        }
    }

    /// Borrows the value behind a handle.
    pub fn get<'a>(&'a self, handle: &'a ValueHandle) -> Result<&'a Value, PoolError> {
        match handle {
            ValueHandle::Pooled(handle) => {
                let slot = self
                    .slots
                    .get(handle.index as usize)
                    .ok_or(PoolError::OutOfRange(handle.index))?;
                match &slot.value {
                    Some(value) if slot.generation == handle.generation => Ok(value),
                    _ => Err(stale(*handle)),
                }
            }
            ValueHandle::Overflow(value) => Ok(&**value),
        }
    }

    /// Mutably borrows the value behind a handle.
    pub fn get_mut<'a>(
        &'a mut self,
        handle: &'a mut ValueHandle,
    ) -> Result<&'a mut Value, PoolError> {
        match handle {
            ValueHandle::Pooled(handle) => {
                let handle = *handle;
                self.slot_mut(handle)?
                    .value
                    .as_mut()
                    .ok_or(stale(handle))
            }
            ValueHandle::Overflow(value) => Ok(&mut **value),
        }
    }

    /// Returns a live slot or an error; never indexes with a foreign handle.
    fn slot_mut(&mut self, handle: SlotHandle) -> Result<&mut Slot, PoolError> {
        let slot = self
            .slots
            .get_mut(handle.index as usize)
            .ok_or(PoolError::OutOfRange(handle.index))?;
        if slot.generation != handle.generation || slot.value.is_none() {
            return Err(stale(handle));
        }
        Ok(slot)
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of free slots.
    pub fn available(&self) -> usize {
        self.free.len()
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            capacity: self.slots.len(),
            in_use: self.slots.len() - self.free.len(),
            overflow: self.overflow,
        }
    }
}

fn stale(handle: SlotHandle) -> PoolError {
    PoolError::StaleHandle {
        index: handle.index,
        generation: handle.generation,
    }
}
