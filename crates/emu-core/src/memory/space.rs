use crate::MemoryError;

use super::{BankArena, BankId};

/// One entry in an [`AddressSpace`].
#[derive(Debug, Clone)]
pub enum Slot<P> {
    Bank(BankId),
    Nested(AddressSpace<P>),
}

/// Where an access lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<P> {
    /// A shadow range claimed the address. The address is relative to the
    /// space the shadow was registered on.
    Port(P, u16),
    /// A bank handles the access at the given offset.
    Bank(BankId, usize),
}

#[derive(Debug, Clone, Copy)]
struct Shadow<P> {
    first: u16,
    last: u16,
    port: P,
}

impl<P> Shadow<P> {
    fn contains(&self, addr: u16) -> bool {
        (self.first..=self.last).contains(&addr)
    }
}

/// A flat address range built by concatenating slots.
///
/// Shadow ranges are checked first, in registration order; getters and
/// setters are separate lists. Otherwise the slot whose cumulative extent
/// covers the address handles it. Slot sizes are fixed at construction:
/// [`replace_slot`](Self::replace_slot) is the only mutation and refuses a
/// bank of a different size.
#[derive(Debug, Clone)]
pub struct AddressSpace<P> {
    slots: Vec<Slot<P>>,
    sizes: Vec<usize>,
    size: usize,
    getters: Vec<Shadow<P>>,
    setters: Vec<Shadow<P>>,
}

impl<P: Copy> AddressSpace<P> {
    /// Build a space from slots. Bank sizes are read from `arena` once.
    #[must_use]
    pub fn new(slots: Vec<Slot<P>>, arena: &BankArena) -> Self {
        let sizes: Vec<usize> = slots
            .iter()
            .map(|slot| match slot {
                Slot::Bank(id) => arena.get(*id).size(),
                Slot::Nested(space) => space.size(),
            })
            .collect();
        let size = sizes.iter().sum();
        Self {
            slots,
            sizes,
            size,
            getters: Vec::new(),
            setters: Vec::new(),
        }
    }

    /// Total size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn slot(&self, index: usize) -> Option<&Slot<P>> {
        self.slots.get(index)
    }

    /// Mutable access to a nested space, for remapping inside it.
    pub fn nested_mut(&mut self, index: usize) -> Option<&mut AddressSpace<P>> {
        match self.slots.get_mut(index) {
            Some(Slot::Nested(space)) => Some(space),
            _ => None,
        }
    }

    /// Divert reads of `first..=last` to `port`.
    pub fn add_getter(&mut self, first: u16, last: u16, port: P) {
        debug_assert!(first <= last);
        self.getters.push(Shadow { first, last, port });
    }

    /// Divert writes of `first..=last` to `port`.
    pub fn add_setter(&mut self, first: u16, last: u16, port: P) {
        debug_assert!(first <= last);
        self.setters.push(Shadow { first, last, port });
    }

    /// Divert both reads and writes.
    pub fn add_shadow(&mut self, first: u16, last: u16, port: P) {
        self.add_getter(first, last, port);
        self.add_setter(first, last, port);
    }

    /// Point slot `index` at `bank`. The bank must be exactly the size of
    /// the slot.
    pub fn replace_slot(
        &mut self,
        index: usize,
        bank: BankId,
        arena: &BankArena,
    ) -> Result<(), MemoryError> {
        let expected = *self.sizes.get(index).ok_or(MemoryError::NoSuchSlot {
            slot: index,
            slots: self.slots.len(),
        })?;
        let actual = arena.get(bank).size();
        if actual != expected {
            return Err(MemoryError::SlotSizeMismatch {
                slot: index,
                expected,
                actual,
            });
        }
        if !matches!(self.slots[index], Slot::Bank(current) if current == bank) {
            log::trace!("slot {index} -> {bank:?}");
        }
        self.slots[index] = Slot::Bank(bank);
        Ok(())
    }

    pub fn route_read(&self, addr: u16) -> Result<Route<P>, MemoryError> {
        self.route(addr, false)
    }

    pub fn route_write(&self, addr: u16) -> Result<Route<P>, MemoryError> {
        self.route(addr, true)
    }

    fn route(&self, addr: u16, write: bool) -> Result<Route<P>, MemoryError> {
        let shadows = if write { &self.setters } else { &self.getters };
        if let Some(shadow) = shadows.iter().find(|s| s.contains(addr)) {
            return Ok(Route::Port(shadow.port, addr));
        }

        let mut base = 0usize;
        for (slot, &len) in self.slots.iter().zip(&self.sizes) {
            let offset = addr as usize - base;
            if (addr as usize) < base + len {
                return match slot {
                    Slot::Bank(id) => Ok(Route::Bank(*id, offset)),
                    Slot::Nested(space) => space.route(offset as u16, write),
                };
            }
            base += len;
        }
        log::debug!("${addr:04X} is outside a {:#X}-byte space", self.size);
        Err(MemoryError::OutOfBounds {
            addr,
            size: self.size,
        })
    }

    /// Read a byte from banked memory, bypassing ports. Returns `None` when
    /// a getter claims the address.
    pub fn peek(&self, arena: &BankArena, addr: u16) -> Result<Option<u8>, MemoryError> {
        Ok(match self.route_read(addr)? {
            Route::Bank(id, offset) => Some(arena.get(id).get_byte(offset)),
            Route::Port(..) => None,
        })
    }

    /// Write a byte to banked memory. Returns `false` when a setter claims
    /// the address and nothing was stored.
    pub fn poke(&self, arena: &mut BankArena, addr: u16, value: u8) -> Result<bool, MemoryError> {
        Ok(match self.route_write(addr)? {
            Route::Bank(id, offset) => {
                arena.get_mut(id).set_byte(offset, value);
                true
            }
            Route::Port(..) => false,
        })
    }
}
