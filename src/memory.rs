use std::collections::HashMap;

/// Total number of addressable cells per script instance.
pub const MEMORY_SIZE: usize = 65536;

/// A declared array: `len` cells starting at `base`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayRegion {
    pub base: usize,
    pub len: usize,
}

/// Fixed-capacity scalar arena.
///
/// Named variables and arrays are bump-allocated from the same cursor, so
/// no two names share a cell. Nothing is reclaimed until [`reset`](Self::reset).
/// Addresses outside the arena resolve to a scratch cell: reads give 0.0 and
/// writes are thrown away.
pub struct Memory {
    cells: Box<[f64]>,
    dummy: f64,
    named: HashMap<String, usize>,
    arrays: HashMap<String, ArrayRegion>,
    next_free: usize,
}

impl Memory {
    pub fn new() -> Self {
        Memory {
            cells: vec![0.0; MEMORY_SIZE].into_boxed_slice(),
            dummy: 0.0,
            named: HashMap::new(),
            arrays: HashMap::new(),
            next_free: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    /// Cells not yet handed out.
    pub fn available(&self) -> usize {
        self.cells.len() - self.next_free
    }

    pub fn next_free(&self) -> usize {
        self.next_free
    }

    /// Address of `name`, binding the next free cell on first use.
    /// `None` once the arena is exhausted.
    pub fn bind(&mut self, name: &str) -> Option<usize> {
        if let Some(&address) = self.named.get(name) {
            return Some(address);
        }
        if self.next_free >= self.cells.len() {
            log::warn!("memory exhausted, '{name}' will not be stored");
            return None;
        }
        let address = self.next_free;
        self.next_free += 1;
        self.named.insert(name.to_string(), address);
        Some(address)
    }

    pub fn address_of(&self, name: &str) -> Option<usize> {
        self.named.get(name).copied()
    }

    /// Reserve `size` contiguous cells for `name`.
    ///
    /// Redeclaring an array with a size that fits its current region keeps
    /// the region; a larger size moves it to fresh cells. Returns the base
    /// address, or `None` if the arena cannot hold it.
    pub fn allocate_array(&mut self, name: &str, size: usize) -> Option<usize> {
        if let Some(region) = self.arrays.get(name) {
            if size <= region.len {
                return Some(region.base);
            }
        }
        let end = self.next_free.checked_add(size)?;
        if end > self.cells.len() {
            log::warn!(
                "cannot allocate array '{name}' of {size} cells ({} free)",
                self.available()
            );
            return None;
        }
        let base = self.next_free;
        self.next_free = end;
        self.arrays.insert(name.to_string(), ArrayRegion { base, len: size });
        log::debug!("array '{name}' at {base}..{end}");
        Some(base)
    }

    pub fn array(&self, name: &str) -> Option<ArrayRegion> {
        self.arrays.get(name).copied()
    }

    /// Resolve `base + index` to a cell address, if it lies inside the arena.
    /// Only the arena bound is checked, not the array's declared length.
    #[inline]
    pub fn element_address(&self, name: &str, index: f64) -> Option<usize> {
        let region = self.arrays.get(name)?;
        let address = (region.base as i64).saturating_add(index as i64);
        usize::try_from(address).ok().filter(|&a| a < self.cells.len())
    }

    #[inline]
    pub fn read(&self, address: usize) -> f64 {
        self.cells.get(address).copied().unwrap_or(0.0)
    }

    #[inline]
    pub fn write(&mut self, address: usize, value: f64) {
        *self.cell_mut(address) = value;
    }

    /// Cell at `address`, or the scratch cell for an invalid address.
    #[inline]
    pub fn cell_mut(&mut self, address: usize) -> &mut f64 {
        match self.cells.get_mut(address) {
            Some(cell) => cell,
            None => {
                self.dummy = 0.0;
                &mut self.dummy
            }
        }
    }

    /// Value of a named variable; unbound names read 0.0.
    pub fn get(&self, name: &str) -> f64 {
        self.address_of(name).map_or(0.0, |a| self.read(a))
    }

    pub fn set(&mut self, name: &str, value: f64) {
        if let Some(address) = self.bind(name) {
            self.write(address, value);
        }
    }

    /// Zero every cell. Bindings and arrays stay in place.
    pub fn clear(&mut self) {
        self.cells.fill(0.0);
        self.dummy = 0.0;
    }

    /// Forget every binding and array and zero the arena.
    pub fn reset(&mut self) {
        self.named.clear();
        self.arrays.clear();
        self.next_free = 0;
        self.clear();
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memory")
            .field("named", &self.named.len())
            .field("arrays", &self.arrays.len())
            .field("next_free", &self.next_free)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_use_binds_next_cell() {
        let mut mem = Memory::new();
        assert_eq!(mem.bind("a"), Some(0));
        assert_eq!(mem.bind("b"), Some(1));
        assert_eq!(mem.bind("a"), Some(0));
        assert_eq!(mem.next_free(), 2);
    }

    #[test]
    fn test_unbound_reads_zero() {
        let mem = Memory::new();
        assert_eq!(mem.get("nothing"), 0.0);
    }

    #[test]
    fn test_array_allocation_does_not_alias_variables() {
        for size in [0, 1, 100, MEMORY_SIZE - 3] {
            let mut mem = Memory::new();
            mem.set("x", 1.5);
            mem.set("y", -2.0);
            let base = mem.allocate_array("buf", size).unwrap();
            assert!(base >= 2);
            assert_eq!(mem.get("x"), 1.5);
            assert_eq!(mem.get("y"), -2.0);
            mem.set("z", 3.0);
            let z = mem.address_of("z").unwrap();
            assert!(z < base || z >= base + size);
        }
    }

    #[test]
    fn test_array_too_large() {
        let mut mem = Memory::new();
        mem.set("x", 1.0);
        assert_eq!(mem.allocate_array("big", MEMORY_SIZE), None);
        assert_eq!(mem.next_free(), 1);
        assert_eq!(mem.allocate_array("fits", MEMORY_SIZE - 1), Some(1));
        assert_eq!(mem.available(), 0);
        assert_eq!(mem.bind("late"), None);
    }

    #[test]
    fn test_redeclare_array() {
        let mut mem = Memory::new();
        let a = mem.allocate_array("buf", 8).unwrap();
        assert_eq!(mem.allocate_array("buf", 4), Some(a));
        let b = mem.allocate_array("buf", 16).unwrap();
        assert_eq!(b, a + 8);
        assert_eq!(mem.array("buf"), Some(ArrayRegion { base: b, len: 16 }));
    }

    #[test]
    fn test_element_address_checks_arena_only() {
        let mut mem = Memory::new();
        let base = mem.allocate_array("buf", 4).unwrap();
        assert_eq!(mem.element_address("buf", 2.9), Some(base + 2));
        // Past the declared length but inside the arena.
        assert_eq!(mem.element_address("buf", 10.0), Some(base + 10));
        assert_eq!(mem.element_address("buf", -1.0), None);
        assert_eq!(mem.element_address("buf", MEMORY_SIZE as f64), None);
        assert_eq!(mem.element_address("missing", 0.0), None);
    }

    #[test]
    fn test_invalid_address_goes_to_scratch() {
        let mut mem = Memory::new();
        mem.write(MEMORY_SIZE + 5, 42.0);
        assert_eq!(mem.read(MEMORY_SIZE + 5), 0.0);
        *mem.cell_mut(usize::MAX) += 1.0;
        assert_eq!(*mem.cell_mut(usize::MAX), 0.0);
    }

    #[test]
    fn test_clear_keeps_bindings_reset_drops_them() {
        let mut mem = Memory::new();
        mem.set("x", 4.0);
        mem.allocate_array("buf", 2);
        mem.clear();
        assert_eq!(mem.address_of("x"), Some(0));
        assert_eq!(mem.get("x"), 0.0);
        mem.reset();
        assert_eq!(mem.address_of("x"), None);
        assert_eq!(mem.array("buf"), None);
        assert_eq!(mem.next_free(), 0);
    }
}
