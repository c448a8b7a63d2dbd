/// A fixed-size byte-addressable region.
///
/// Offsets must be below [`size`](Self::size); the address space that owns
/// the unit guarantees this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryUnit {
    /// Plain read/write memory.
    Ram(Vec<u8>),
    /// Read-only memory; writes are ignored.
    Rom(Vec<u8>),
    /// RAM with independent read and write enables (cartridge PRG-RAM).
    /// Disabled reads return 0, disabled writes are dropped.
    Protected {
        data: Vec<u8>,
        read_enabled: bool,
        write_enabled: bool,
    },
    /// A smaller unit mirrored across `size` bytes.
    Repeated { inner: Box<MemoryUnit>, size: usize },
}

impl MemoryUnit {
    #[must_use]
    pub fn ram(size: usize) -> Self {
        Self::Ram(vec![0; size])
    }

    #[must_use]
    pub fn rom(data: Vec<u8>) -> Self {
        Self::Rom(data)
    }

    /// Protected RAM, initially readable and writable.
    #[must_use]
    pub fn protected(size: usize) -> Self {
        Self::Protected {
            data: vec![0; size],
            read_enabled: true,
            write_enabled: true,
        }
    }

    /// Mirror `inner` across `size` bytes.
    #[must_use]
    pub fn repeated(inner: MemoryUnit, size: usize) -> Self {
        Self::Repeated {
            inner: Box::new(inner),
            size,
        }
    }

    #[must_use]
    pub fn size(&self) -> usize {
        match self {
            Self::Ram(data) | Self::Rom(data) | Self::Protected { data, .. } => data.len(),
            Self::Repeated { size, .. } => *size,
        }
    }

    #[must_use]
    pub fn get_byte(&self, offset: usize) -> u8 {
        match self {
            Self::Ram(data) | Self::Rom(data) => data[offset],
            Self::Protected {
                data, read_enabled, ..
            } => {
                if *read_enabled {
                    data[offset]
                } else {
                    0
                }
            }
            Self::Repeated { inner, .. } => inner.get_byte(offset % inner.size()),
        }
    }

    pub fn set_byte(&mut self, offset: usize, value: u8) {
        match self {
            Self::Ram(data) => data[offset] = value,
            Self::Rom(_) => {}
            Self::Protected {
                data,
                write_enabled,
                ..
            } => {
                if *write_enabled {
                    data[offset] = value;
                }
            }
            Self::Repeated { inner, .. } => {
                let size = inner.size();
                inner.set_byte(offset % size, value);
            }
        }
    }

    /// Update the enables of a protected unit (or the protected unit a
    /// repeated one wraps). Other variants ignore the call.
    pub fn set_access(&mut self, read: bool, write: bool) {
        match self {
            Self::Protected {
                read_enabled,
                write_enabled,
                ..
            } => {
                *read_enabled = read;
                *write_enabled = write;
            }
            Self::Repeated { inner, .. } => inner.set_access(read, write),
            Self::Ram(_) | Self::Rom(_) => {}
        }
    }
}
