use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CpuError {
    /// The opcode has no implementation (JAM/KIL or an unstable
    /// undocumented instruction). The CPU stays halted.
    #[error("unimplemented opcode ${opcode:02X} at ${pc:04X}")]
    UnimplementedOpcode { opcode: u8, pc: u16 },
}
