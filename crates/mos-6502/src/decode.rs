//! Opcode table.
//!
//! Each opcode maps to an addressing mode and an operation. The CPU runs a
//! shared cycle sequence per addressing-mode shape and calls the operation
//! at the point the hardware would apply it, so every opcode of a given
//! shape has identical bus timing.

use std::fmt;

use crate::Mos6502;
use crate::flags::{C, I, N, V, Z, D};

/// Operand addressing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Implied,
    Accumulator,
    Immediate,
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    IndirectX,
    IndirectY,
    Relative,
    Indirect,
}

impl Mode {
    /// Operand bytes following the opcode.
    #[must_use]
    pub fn operand_len(self) -> u16 {
        match self {
            Mode::Implied | Mode::Accumulator => 0,
            Mode::Immediate
            | Mode::ZeroPage
            | Mode::ZeroPageX
            | Mode::ZeroPageY
            | Mode::IndirectX
            | Mode::IndirectY
            | Mode::Relative => 1,
            Mode::Absolute | Mode::AbsoluteX | Mode::AbsoluteY | Mode::Indirect => 2,
        }
    }
}

/// What an instruction does once its operand is located.
#[derive(Clone, Copy)]
pub(crate) enum Op {
    /// Consume a byte read from the operand.
    Read(fn(&mut Mos6502, u8)),
    /// Produce the byte to store at the operand address.
    Write(fn(&Mos6502) -> u8),
    /// Read, dummy-write, then write back the transformed byte.
    Modify(fn(&mut Mos6502, u8) -> u8),
    /// Two-cycle register operation.
    Implied(fn(&mut Mos6502)),
    /// Branch when `flag` is in the given state.
    Branch(u8, bool),
    Push(fn(&Mos6502) -> u8),
    Pull(fn(&mut Mos6502, u8)),
    Brk,
    Jsr,
    Rts,
    Rti,
    Jmp,
}

impl fmt::Debug for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Op::Read(_) => "Read",
            Op::Write(_) => "Write",
            Op::Modify(_) => "Modify",
            Op::Implied(_) => "Implied",
            Op::Branch(..) => "Branch",
            Op::Push(_) => "Push",
            Op::Pull(_) => "Pull",
            Op::Brk => "Brk",
            Op::Jsr => "Jsr",
            Op::Rts => "Rts",
            Op::Rti => "Rti",
            Op::Jmp => "Jmp",
        };
        f.write_str(name)
    }
}

/// A decoded opcode.
#[derive(Clone, Copy)]
pub struct Instruction {
    pub mnemonic: &'static str,
    pub mode: Mode,
    /// True for undocumented opcodes.
    pub illegal: bool,
    pub(crate) op: Op,
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instruction")
            .field("mnemonic", &self.mnemonic)
            .field("mode", &self.mode)
            .field("illegal", &self.illegal)
            .finish_non_exhaustive()
    }
}

/// Look up an opcode. `None` means the opcode is a JAM or one of the
/// unstable undocumented instructions, which are not emulated.
#[must_use]
pub fn decode(opcode: u8) -> Option<Instruction> {
    use Mode::{
        Absolute as Abs, AbsoluteX as Abx, AbsoluteY as Aby, Accumulator as Acc,
        Immediate as Imm, Implied as Imp, Indirect as Ind, IndirectX as Izx, IndirectY as Izy,
        Relative as Rel, ZeroPage as Zp, ZeroPageX as Zpx, ZeroPageY as Zpy,
    };
    use Op::{Branch, Implied, Modify, Pull, Push, Read, Write};

    let (mnemonic, mode, op) = match opcode {
        // Loads and stores
        0xA9 => ("LDA", Imm, Read(Mos6502::lda)),
        0xA5 => ("LDA", Zp, Read(Mos6502::lda)),
        0xB5 => ("LDA", Zpx, Read(Mos6502::lda)),
        0xAD => ("LDA", Abs, Read(Mos6502::lda)),
        0xBD => ("LDA", Abx, Read(Mos6502::lda)),
        0xB9 => ("LDA", Aby, Read(Mos6502::lda)),
        0xA1 => ("LDA", Izx, Read(Mos6502::lda)),
        0xB1 => ("LDA", Izy, Read(Mos6502::lda)),
        0xA2 => ("LDX", Imm, Read(Mos6502::ldx)),
        0xA6 => ("LDX", Zp, Read(Mos6502::ldx)),
        0xB6 => ("LDX", Zpy, Read(Mos6502::ldx)),
        0xAE => ("LDX", Abs, Read(Mos6502::ldx)),
        0xBE => ("LDX", Aby, Read(Mos6502::ldx)),
        0xA0 => ("LDY", Imm, Read(Mos6502::ldy)),
        0xA4 => ("LDY", Zp, Read(Mos6502::ldy)),
        0xB4 => ("LDY", Zpx, Read(Mos6502::ldy)),
        0xAC => ("LDY", Abs, Read(Mos6502::ldy)),
        0xBC => ("LDY", Abx, Read(Mos6502::ldy)),
        0x85 => ("STA", Zp, Write(|cpu| cpu.regs.a)),
        0x95 => ("STA", Zpx, Write(|cpu| cpu.regs.a)),
        0x8D => ("STA", Abs, Write(|cpu| cpu.regs.a)),
        0x9D => ("STA", Abx, Write(|cpu| cpu.regs.a)),
        0x99 => ("STA", Aby, Write(|cpu| cpu.regs.a)),
        0x81 => ("STA", Izx, Write(|cpu| cpu.regs.a)),
        0x91 => ("STA", Izy, Write(|cpu| cpu.regs.a)),
        0x86 => ("STX", Zp, Write(|cpu| cpu.regs.x)),
        0x96 => ("STX", Zpy, Write(|cpu| cpu.regs.x)),
        0x8E => ("STX", Abs, Write(|cpu| cpu.regs.x)),
        0x84 => ("STY", Zp, Write(|cpu| cpu.regs.y)),
        0x94 => ("STY", Zpx, Write(|cpu| cpu.regs.y)),
        0x8C => ("STY", Abs, Write(|cpu| cpu.regs.y)),

        // ALU
        0x69 => ("ADC", Imm, Read(Mos6502::adc)),
        0x65 => ("ADC", Zp, Read(Mos6502::adc)),
        0x75 => ("ADC", Zpx, Read(Mos6502::adc)),
        0x6D => ("ADC", Abs, Read(Mos6502::adc)),
        0x7D => ("ADC", Abx, Read(Mos6502::adc)),
        0x79 => ("ADC", Aby, Read(Mos6502::adc)),
        0x61 => ("ADC", Izx, Read(Mos6502::adc)),
        0x71 => ("ADC", Izy, Read(Mos6502::adc)),
        0xE9 => ("SBC", Imm, Read(Mos6502::sbc)),
        0xE5 => ("SBC", Zp, Read(Mos6502::sbc)),
        0xF5 => ("SBC", Zpx, Read(Mos6502::sbc)),
        0xED => ("SBC", Abs, Read(Mos6502::sbc)),
        0xFD => ("SBC", Abx, Read(Mos6502::sbc)),
        0xF9 => ("SBC", Aby, Read(Mos6502::sbc)),
        0xE1 => ("SBC", Izx, Read(Mos6502::sbc)),
        0xF1 => ("SBC", Izy, Read(Mos6502::sbc)),
        0x29 => ("AND", Imm, Read(Mos6502::and)),
        0x25 => ("AND", Zp, Read(Mos6502::and)),
        0x35 => ("AND", Zpx, Read(Mos6502::and)),
        0x2D => ("AND", Abs, Read(Mos6502::and)),
        0x3D => ("AND", Abx, Read(Mos6502::and)),
        0x39 => ("AND", Aby, Read(Mos6502::and)),
        0x21 => ("AND", Izx, Read(Mos6502::and)),
        0x31 => ("AND", Izy, Read(Mos6502::and)),
        0x09 => ("ORA", Imm, Read(Mos6502::ora)),
        0x05 => ("ORA", Zp, Read(Mos6502::ora)),
        0x15 => ("ORA", Zpx, Read(Mos6502::ora)),
        0x0D => ("ORA", Abs, Read(Mos6502::ora)),
        0x1D => ("ORA", Abx, Read(Mos6502::ora)),
        0x19 => ("ORA", Aby, Read(Mos6502::ora)),
        0x01 => ("ORA", Izx, Read(Mos6502::ora)),
        0x11 => ("ORA", Izy, Read(Mos6502::ora)),
        0x49 => ("EOR", Imm, Read(Mos6502::eor)),
        0x45 => ("EOR", Zp, Read(Mos6502::eor)),
        0x55 => ("EOR", Zpx, Read(Mos6502::eor)),
        0x4D => ("EOR", Abs, Read(Mos6502::eor)),
        0x5D => ("EOR", Abx, Read(Mos6502::eor)),
        0x59 => ("EOR", Aby, Read(Mos6502::eor)),
        0x41 => ("EOR", Izx, Read(Mos6502::eor)),
        0x51 => ("EOR", Izy, Read(Mos6502::eor)),
        0xC9 => ("CMP", Imm, Read(Mos6502::cmp)),
        0xC5 => ("CMP", Zp, Read(Mos6502::cmp)),
        0xD5 => ("CMP", Zpx, Read(Mos6502::cmp)),
        0xCD => ("CMP", Abs, Read(Mos6502::cmp)),
        0xDD => ("CMP", Abx, Read(Mos6502::cmp)),
        0xD9 => ("CMP", Aby, Read(Mos6502::cmp)),
        0xC1 => ("CMP", Izx, Read(Mos6502::cmp)),
        0xD1 => ("CMP", Izy, Read(Mos6502::cmp)),
        0xE0 => ("CPX", Imm, Read(Mos6502::cpx)),
        0xE4 => ("CPX", Zp, Read(Mos6502::cpx)),
        0xEC => ("CPX", Abs, Read(Mos6502::cpx)),
        0xC0 => ("CPY", Imm, Read(Mos6502::cpy)),
        0xC4 => ("CPY", Zp, Read(Mos6502::cpy)),
        0xCC => ("CPY", Abs, Read(Mos6502::cpy)),
        0x24 => ("BIT", Zp, Read(Mos6502::bit)),
        0x2C => ("BIT", Abs, Read(Mos6502::bit)),

        // Shifts, rotates, increments
        0x0A => ("ASL", Acc, Modify(Mos6502::asl)),
        0x06 => ("ASL", Zp, Modify(Mos6502::asl)),
        0x16 => ("ASL", Zpx, Modify(Mos6502::asl)),
        0x0E => ("ASL", Abs, Modify(Mos6502::asl)),
        0x1E => ("ASL", Abx, Modify(Mos6502::asl)),
        0x4A => ("LSR", Acc, Modify(Mos6502::lsr)),
        0x46 => ("LSR", Zp, Modify(Mos6502::lsr)),
        0x56 => ("LSR", Zpx, Modify(Mos6502::lsr)),
        0x4E => ("LSR", Abs, Modify(Mos6502::lsr)),
        0x5E => ("LSR", Abx, Modify(Mos6502::lsr)),
        0x2A => ("ROL", Acc, Modify(Mos6502::rol)),
        0x26 => ("ROL", Zp, Modify(Mos6502::rol)),
        0x36 => ("ROL", Zpx, Modify(Mos6502::rol)),
        0x2E => ("ROL", Abs, Modify(Mos6502::rol)),
        0x3E => ("ROL", Abx, Modify(Mos6502::rol)),
        0x6A => ("ROR", Acc, Modify(Mos6502::ror)),
        0x66 => ("ROR", Zp, Modify(Mos6502::ror)),
        0x76 => ("ROR", Zpx, Modify(Mos6502::ror)),
        0x6E => ("ROR", Abs, Modify(Mos6502::ror)),
        0x7E => ("ROR", Abx, Modify(Mos6502::ror)),
        0xE6 => ("INC", Zp, Modify(Mos6502::inc)),
        0xF6 => ("INC", Zpx, Modify(Mos6502::inc)),
        0xEE => ("INC", Abs, Modify(Mos6502::inc)),
        0xFE => ("INC", Abx, Modify(Mos6502::inc)),
        0xC6 => ("DEC", Zp, Modify(Mos6502::dec)),
        0xD6 => ("DEC", Zpx, Modify(Mos6502::dec)),
        0xCE => ("DEC", Abs, Modify(Mos6502::dec)),
        0xDE => ("DEC", Abx, Modify(Mos6502::dec)),

        // Register transfers and counters
        0xAA => ("TAX", Imp, Implied(|cpu| cpu.regs.x = cpu.set_nz(cpu.regs.a))),
        0xA8 => ("TAY", Imp, Implied(|cpu| cpu.regs.y = cpu.set_nz(cpu.regs.a))),
        0x8A => ("TXA", Imp, Implied(|cpu| cpu.regs.a = cpu.set_nz(cpu.regs.x))),
        0x98 => ("TYA", Imp, Implied(|cpu| cpu.regs.a = cpu.set_nz(cpu.regs.y))),
        0xBA => ("TSX", Imp, Implied(|cpu| cpu.regs.x = cpu.set_nz(cpu.regs.s))),
        0x9A => ("TXS", Imp, Implied(|cpu| cpu.regs.s = cpu.regs.x)),
        0xE8 => ("INX", Imp, Implied(|cpu| cpu.regs.x = cpu.set_nz(cpu.regs.x.wrapping_add(1)))),
        0xC8 => ("INY", Imp, Implied(|cpu| cpu.regs.y = cpu.set_nz(cpu.regs.y.wrapping_add(1)))),
        0xCA => ("DEX", Imp, Implied(|cpu| cpu.regs.x = cpu.set_nz(cpu.regs.x.wrapping_sub(1)))),
        0x88 => ("DEY", Imp, Implied(|cpu| cpu.regs.y = cpu.set_nz(cpu.regs.y.wrapping_sub(1)))),

        // Flags
        0x18 => ("CLC", Imp, Implied(|cpu| cpu.regs.p.clear(C))),
        0x38 => ("SEC", Imp, Implied(|cpu| cpu.regs.p.set(C))),
        0x58 => ("CLI", Imp, Implied(|cpu| cpu.regs.p.clear(I))),
        0x78 => ("SEI", Imp, Implied(|cpu| cpu.regs.p.set(I))),
        0xB8 => ("CLV", Imp, Implied(|cpu| cpu.regs.p.clear(V))),
        0xD8 => ("CLD", Imp, Implied(|cpu| cpu.regs.p.clear(D))),
        0xF8 => ("SED", Imp, Implied(|cpu| cpu.regs.p.set(D))),
        0xEA => ("NOP", Imp, Implied(|_| {})),

        // Branches
        0x10 => ("BPL", Rel, Branch(N, false)),
        0x30 => ("BMI", Rel, Branch(N, true)),
        0x50 => ("BVC", Rel, Branch(V, false)),
        0x70 => ("BVS", Rel, Branch(V, true)),
        0x90 => ("BCC", Rel, Branch(C, false)),
        0xB0 => ("BCS", Rel, Branch(C, true)),
        0xD0 => ("BNE", Rel, Branch(Z, false)),
        0xF0 => ("BEQ", Rel, Branch(Z, true)),

        // Stack and control flow
        0x48 => ("PHA", Imp, Push(|cpu| cpu.regs.a)),
        0x08 => ("PHP", Imp, Push(|cpu| cpu.regs.p.to_pushed(true))),
        0x68 => ("PLA", Imp, Pull(|cpu, value| cpu.regs.a = cpu.set_nz(value))),
        0x28 => ("PLP", Imp, Pull(Mos6502::restore_status)),
        0x00 => ("BRK", Imp, Op::Brk),
        0x20 => ("JSR", Abs, Op::Jsr),
        0x60 => ("RTS", Imp, Op::Rts),
        0x40 => ("RTI", Imp, Op::Rti),
        0x4C => ("JMP", Abs, Op::Jmp),
        0x6C => ("JMP", Ind, Op::Jmp),

        // Undocumented: combined load/store
        0xA7 => ("LAX", Zp, Read(Mos6502::lax)),
        0xB7 => ("LAX", Zpy, Read(Mos6502::lax)),
        0xAF => ("LAX", Abs, Read(Mos6502::lax)),
        0xBF => ("LAX", Aby, Read(Mos6502::lax)),
        0xA3 => ("LAX", Izx, Read(Mos6502::lax)),
        0xB3 => ("LAX", Izy, Read(Mos6502::lax)),
        0x87 => ("SAX", Zp, Write(|cpu| cpu.regs.a & cpu.regs.x)),
        0x97 => ("SAX", Zpy, Write(|cpu| cpu.regs.a & cpu.regs.x)),
        0x8F => ("SAX", Abs, Write(|cpu| cpu.regs.a & cpu.regs.x)),
        0x83 => ("SAX", Izx, Write(|cpu| cpu.regs.a & cpu.regs.x)),

        // Undocumented: immediate ALU combinations
        0x0B | 0x2B => ("ANC", Imm, Read(Mos6502::anc)),
        0x4B => ("ALR", Imm, Read(Mos6502::alr)),
        0x6B => ("ARR", Imm, Read(Mos6502::arr)),
        0xCB => ("AXS", Imm, Read(Mos6502::axs)),
        0xEB => ("SBC", Imm, Read(Mos6502::sbc)),

        // Undocumented: read-modify-write fused with an ALU op
        0x07 => ("SLO", Zp, Modify(Mos6502::slo)),
        0x17 => ("SLO", Zpx, Modify(Mos6502::slo)),
        0x0F => ("SLO", Abs, Modify(Mos6502::slo)),
        0x1F => ("SLO", Abx, Modify(Mos6502::slo)),
        0x1B => ("SLO", Aby, Modify(Mos6502::slo)),
        0x03 => ("SLO", Izx, Modify(Mos6502::slo)),
        0x13 => ("SLO", Izy, Modify(Mos6502::slo)),
        0x27 => ("RLA", Zp, Modify(Mos6502::rla)),
        0x37 => ("RLA", Zpx, Modify(Mos6502::rla)),
        0x2F => ("RLA", Abs, Modify(Mos6502::rla)),
        0x3F => ("RLA", Abx, Modify(Mos6502::rla)),
        0x3B => ("RLA", Aby, Modify(Mos6502::rla)),
        0x23 => ("RLA", Izx, Modify(Mos6502::rla)),
        0x33 => ("RLA", Izy, Modify(Mos6502::rla)),
        0x47 => ("SRE", Zp, Modify(Mos6502::sre)),
        0x57 => ("SRE", Zpx, Modify(Mos6502::sre)),
        0x4F => ("SRE", Abs, Modify(Mos6502::sre)),
        0x5F => ("SRE", Abx, Modify(Mos6502::sre)),
        0x5B => ("SRE", Aby, Modify(Mos6502::sre)),
        0x43 => ("SRE", Izx, Modify(Mos6502::sre)),
        0x53 => ("SRE", Izy, Modify(Mos6502::sre)),
        0x67 => ("RRA", Zp, Modify(Mos6502::rra)),
        0x77 => ("RRA", Zpx, Modify(Mos6502::rra)),
        0x6F => ("RRA", Abs, Modify(Mos6502::rra)),
        0x7F => ("RRA", Abx, Modify(Mos6502::rra)),
        0x7B => ("RRA", Aby, Modify(Mos6502::rra)),
        0x63 => ("RRA", Izx, Modify(Mos6502::rra)),
        0x73 => ("RRA", Izy, Modify(Mos6502::rra)),
        0xC7 => ("DCP", Zp, Modify(Mos6502::dcp)),
        0xD7 => ("DCP", Zpx, Modify(Mos6502::dcp)),
        0xCF => ("DCP", Abs, Modify(Mos6502::dcp)),
        0xDF => ("DCP", Abx, Modify(Mos6502::dcp)),
        0xDB => ("DCP", Aby, Modify(Mos6502::dcp)),
        0xC3 => ("DCP", Izx, Modify(Mos6502::dcp)),
        0xD3 => ("DCP", Izy, Modify(Mos6502::dcp)),
        0xE7 => ("ISC", Zp, Modify(Mos6502::isc)),
        0xF7 => ("ISC", Zpx, Modify(Mos6502::isc)),
        0xEF => ("ISC", Abs, Modify(Mos6502::isc)),
        0xFF => ("ISC", Abx, Modify(Mos6502::isc)),
        0xFB => ("ISC", Aby, Modify(Mos6502::isc)),
        0xE3 => ("ISC", Izx, Modify(Mos6502::isc)),
        0xF3 => ("ISC", Izy, Modify(Mos6502::isc)),

        // Undocumented NOPs: same bus activity as a read of that width
        0x1A | 0x3A | 0x5A | 0x7A | 0xDA | 0xFA => ("NOP", Imp, Implied(|_| {})),
        0x80 | 0x82 | 0x89 | 0xC2 | 0xE2 => ("NOP", Imm, Read(|_, _| {})),
        0x04 | 0x44 | 0x64 => ("NOP", Zp, Read(|_, _| {})),
        0x14 | 0x34 | 0x54 | 0x74 | 0xD4 | 0xF4 => ("NOP", Zpx, Read(|_, _| {})),
        0x0C => ("NOP", Abs, Read(|_, _| {})),
        0x1C | 0x3C | 0x5C | 0x7C | 0xDC | 0xFC => ("NOP", Abx, Read(|_, _| {})),

        _ => return None,
    };

    Some(Instruction {
        mnemonic,
        mode,
        illegal: is_illegal(opcode),
        op,
    })
}

fn is_illegal(opcode: u8) -> bool {
    // Every documented opcode has low bits 00, 01 or 10 and sits in the
    // regular grid; the holes in that grid are listed explicitly.
    match opcode & 0x03 {
        0x03 => true,
        _ => matches!(
            opcode,
            0x80 | 0x82 | 0x89 | 0xC2 | 0xE2
                | 0x04 | 0x44 | 0x64 | 0x0C
                | 0x14 | 0x34 | 0x54 | 0x74 | 0xD4 | 0xF4
                | 0x1A | 0x3A | 0x5A | 0x7A | 0xDA | 0xFA
                | 0x1C | 0x3C | 0x5C | 0x7C | 0xDC | 0xFC
                | 0x0B | 0x2B | 0x4B | 0x6B | 0xCB | 0xEB
        ),
    }
}
