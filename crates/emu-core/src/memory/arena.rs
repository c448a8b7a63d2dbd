use super::MemoryUnit;

/// Handle to a unit stored in a [`BankArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BankId(usize);

impl BankId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Owner of every physical memory unit a machine has.
///
/// Address spaces hold [`BankId`]s into the arena, so any number of slots
/// can show the same bank and a mapper can re-point a slot without moving
/// memory around.
#[derive(Debug, Clone, Default)]
pub struct BankArena {
    units: Vec<MemoryUnit>,
}

impl BankArena {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, unit: MemoryUnit) -> BankId {
        self.units.push(unit);
        BankId(self.units.len() - 1)
    }

    /// Split `data` into consecutive ROM units of `bank_size` bytes.
    ///
    /// The caller must ensure `data.len()` is a multiple of `bank_size`.
    pub fn insert_rom_banks(&mut self, data: &[u8], bank_size: usize) -> Vec<BankId> {
        data.chunks_exact(bank_size)
            .map(|chunk| self.insert(MemoryUnit::rom(chunk.to_vec())))
            .collect()
    }

    /// Panics if `id` came from another arena and is out of range.
    #[must_use]
    pub fn get(&self, id: BankId) -> &MemoryUnit {
        &self.units[id.0]
    }

    pub fn get_mut(&mut self, id: BankId) -> &mut MemoryUnit {
        &mut self.units[id.0]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rom_banks_are_split_in_order() {
        let mut arena = BankArena::new();
        let data: Vec<u8> = (0..8).collect();
        let banks = arena.insert_rom_banks(&data, 2);
        assert_eq!(banks.len(), 4);
        assert_eq!(arena.get(banks[2]).get_byte(0), 4);
        assert_eq!(arena.get(banks[3]).get_byte(1), 7);
    }
}
