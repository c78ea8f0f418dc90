use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Number of slider slots a script can address.
pub const MAX_PARAMETERS: usize = 64;

struct ParamSlot {
    bits: AtomicU64,
    dirty: AtomicBool,
}

impl ParamSlot {
    fn new(value: f64) -> Self {
        ParamSlot {
            bits: AtomicU64::new(value.to_bits()),
            dirty: AtomicBool::new(false),
        }
    }
}

/// Lock-free parameter hand-off between a control thread and the audio thread.
///
/// Each slot holds the most recently requested value and a dirty flag. The
/// control side calls [`set`](Self::set); the audio side collects changes with
/// [`take`](Self::take) or [`drain`](Self::drain) at block boundaries. Neither
/// side ever blocks. Clones share the same slots.
#[derive(Clone)]
pub struct ParameterBank {
    slots: Arc<[ParamSlot]>,
}

impl ParameterBank {
    pub fn new() -> Self {
        ParameterBank {
            slots: (0..MAX_PARAMETERS).map(|_| ParamSlot::new(0.0)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Request a new value. Returns false for an index outside the bank.
    pub fn set(&self, index: usize, value: f64) -> bool {
        let Some(slot) = self.slots.get(index) else {
            return false;
        };
        slot.bits.store(value.to_bits(), Ordering::Relaxed);
        slot.dirty.store(true, Ordering::Release);
        true
    }

    /// Last value stored in the slot, whether or not it has been applied.
    pub fn get(&self, index: usize) -> Option<f64> {
        self.slots
            .get(index)
            .map(|slot| f64::from_bits(slot.bits.load(Ordering::Relaxed)))
    }

    pub fn is_pending(&self, index: usize) -> bool {
        self.slots
            .get(index)
            .is_some_and(|slot| slot.dirty.load(Ordering::Acquire))
    }

    /// Consume a pending change, if any.
    pub fn take(&self, index: usize) -> Option<f64> {
        let slot = self.slots.get(index)?;
        if slot.dirty.swap(false, Ordering::Acquire) {
            Some(f64::from_bits(slot.bits.load(Ordering::Relaxed)))
        } else {
            None
        }
    }

    /// Hand every pending change to `apply`. Returns whether there were any.
    pub fn drain(&self, mut apply: impl FnMut(usize, f64)) -> bool {
        let mut changed = false;
        for index in 0..self.slots.len() {
            if let Some(value) = self.take(index) {
                apply(index, value);
                changed = true;
            }
        }
        changed
    }

    /// Overwrite all slots and clear pending flags. Used when a script is
    /// (re)loaded, before audio processing resumes.
    pub fn reset(&self, values: &[f64]) {
        for (index, slot) in self.slots.iter().enumerate() {
            let value = values.get(index).copied().unwrap_or(0.0);
            slot.bits.store(value.to_bits(), Ordering::Relaxed);
            slot.dirty.store(false, Ordering::Release);
        }
    }
}

impl Default for ParameterBank {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ParameterBank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pending = (0..self.len()).filter(|&i| self.is_pending(i)).count();
        f.debug_struct("ParameterBank")
            .field("slots", &self.len())
            .field("pending", &pending)
            .finish()
    }
}
