//! 6502 CPU core.
//!
//! Each `tick()` is exactly one bus cycle. An instruction runs as a
//! sequence of micro-steps counted by `cycle`: step 0 fetches the opcode,
//! later steps walk the addressing-mode shape and apply the operation from
//! the opcode table. `cycle` returns to 0 when the instruction completes.

use emu_core::{Bus, InterruptLine, InterruptSource, Observable, Value};

use crate::decode::{Mode, Op, decode};
use crate::flags::{C, D, I, N, V, Z};
use crate::{CpuError, Registers};

const NMI_VECTOR: u16 = 0xFFFA;
const RESET_VECTOR: u16 = 0xFFFC;
const IRQ_VECTOR: u16 = 0xFFFE;

/// The seven-cycle sequences that push state and load a vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    Reset,
    Nmi,
    Irq,
    Brk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Next tick fetches an opcode, or starts a pending interrupt.
    Fetch,
    Execute,
    Interrupt(Interrupt),
    Halted(CpuError),
}

/// When an indexed address pays its page-fixup cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fixup {
    /// Only if the index carried into the high byte (reads).
    OnCross,
    /// Always (writes and read-modify-write).
    Always,
}

/// Progress of operand address resolution after one cycle.
enum Resolve {
    /// This cycle's bus access belonged to address resolution.
    Pending,
    /// Address is final; the operation starts next cycle.
    Ready,
    /// Address is final and this cycle is still free (immediate mode).
    ReadyNow,
}

/// Ricoh 2A03 CPU core: an NMOS 6502 without decimal mode.
#[derive(Debug)]
pub struct Mos6502 {
    pub regs: Registers,
    state: State,

    opcode: u8,
    mode: Mode,
    op: Op,
    /// Micro-step within the current instruction (0 = opcode fetch).
    cycle: u8,
    /// Set once the operand address is final.
    resolved: bool,
    /// Micro-step within the post-address part of the instruction.
    tail: u8,

    addr: u16,
    data: u8,
    pointer: u8,
    crossed: bool,
    vector: u16,

    irq: InterruptLine,
    nmi: InterruptLine,
    /// NMI line level seen at the last sample.
    nmi_level: bool,
    /// Latched NMI edge, cleared when the NMI sequence starts.
    nmi_edge: bool,
    /// Interrupt to run instead of the next opcode fetch.
    pending: Option<Interrupt>,
    /// I flag as the IRQ poll sees it. Latched at opcode fetch, so CLI,
    /// SEI and PLP only take effect after the following instruction.
    irq_mask: bool,

    total_cycles: u64,
}

impl Default for Mos6502 {
    fn default() -> Self {
        Self::new()
    }
}

impl Mos6502 {
    /// A CPU ready to fetch at `regs.pc`. Call [`reset`](Self::reset) to
    /// run the reset sequence instead.
    #[must_use]
    pub fn new() -> Self {
        Self {
            regs: Registers::new(),
            state: State::Fetch,
            opcode: 0,
            mode: Mode::Implied,
            op: Op::Implied(|_| {}),
            cycle: 0,
            resolved: false,
            tail: 0,
            addr: 0,
            data: 0,
            pointer: 0,
            crossed: false,
            vector: 0,
            irq: InterruptLine::new(),
            nmi: InterruptLine::new(),
            nmi_level: false,
            nmi_edge: false,
            pending: None,
            irq_mask: true,
            total_cycles: 0,
        }
    }

    /// Abandon the current instruction and run the reset sequence on the
    /// next tick. Clears a halt.
    pub fn reset(&mut self) {
        self.state = State::Fetch;
        self.cycle = 0;
        self.resolved = false;
        self.tail = 0;
        self.nmi_edge = false;
        self.pending = Some(Interrupt::Reset);
    }

    /// A new producer on the IRQ line.
    #[must_use]
    pub fn irq_source(&self) -> InterruptSource {
        self.irq.source()
    }

    /// A new producer on the NMI line.
    #[must_use]
    pub fn nmi_source(&self) -> InterruptSource {
        self.nmi.source()
    }

    /// Run one bus cycle.
    pub fn tick<B: Bus>(&mut self, bus: &mut B) -> Result<(), CpuError> {
        if let State::Halted(err) = self.state {
            return Err(err);
        }
        self.sample_nmi();
        self.total_cycles += 1;

        match self.state {
            State::Fetch => self.fetch(bus)?,
            State::Execute => self.execute(bus),
            State::Interrupt(kind) => self.interrupt_sequence(bus, kind),
            State::Halted(_) => unreachable!(),
        }
        Ok(())
    }

    /// Sample the NMI line. Returns `true` when a new assertion edge was
    /// latched.
    pub fn sample_nmi(&mut self) -> bool {
        let level = self.nmi.is_asserted();
        let edge = level && !self.nmi_level;
        self.nmi_level = level;
        if edge {
            self.nmi_edge = true;
        }
        edge
    }

    /// Decide which interrupt, if any, runs at the next instruction
    /// boundary. The CPU does this itself as each instruction completes; a
    /// scheduler may also call it between cycles.
    pub fn detect_interrupts(&mut self) {
        if self.pending == Some(Interrupt::Reset) {
            return;
        }
        self.pending = if self.nmi_edge {
            Some(Interrupt::Nmi)
        } else if self.irq.is_asserted() && !self.irq_mask {
            Some(Interrupt::Irq)
        } else {
            None
        };
    }

    /// Program counter.
    #[must_use]
    pub fn pc(&self) -> u16 {
        self.regs.pc
    }

    /// Micro-step counter; 0 between instructions.
    #[must_use]
    pub fn cycle(&self) -> u8 {
        self.cycle
    }

    /// Cycles executed since creation.
    #[must_use]
    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    /// True between instructions.
    #[must_use]
    pub fn is_instruction_complete(&self) -> bool {
        self.state == State::Fetch
    }

    #[must_use]
    pub fn is_halted(&self) -> bool {
        matches!(self.state, State::Halted(_))
    }

    #[must_use]
    pub fn pending_interrupt(&self) -> Option<Interrupt> {
        self.pending
    }

    /// Opcode of the instruction in flight (or last executed).
    #[must_use]
    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    fn fetch<B: Bus>(&mut self, bus: &mut B) -> Result<(), CpuError> {
        if let Some(kind) = self.pending.take() {
            // Opcode fetch is replaced by a dummy read; PC does not advance.
            let _ = bus.read(self.regs.pc);
            if kind == Interrupt::Nmi {
                self.nmi_edge = false;
            }
            self.state = State::Interrupt(kind);
            self.cycle = 1;
            return Ok(());
        }

        let pc = self.regs.pc;
        self.opcode = bus.read(pc);
        self.regs.pc = pc.wrapping_add(1);

        let Some(instr) = decode(self.opcode) else {
            let err = CpuError::UnimplementedOpcode {
                opcode: self.opcode,
                pc,
            };
            log::error!("{err}; CPU halted");
            self.state = State::Halted(err);
            return Err(err);
        };

        if log::log_enabled!(log::Level::Trace) {
            log::trace!(
                "{pc:04X}  {:02X}  {:<4} A:{:02X} X:{:02X} Y:{:02X} P:{:02X} SP:{:02X} CYC:{}",
                self.opcode,
                instr.mnemonic,
                self.regs.a,
                self.regs.x,
                self.regs.y,
                self.regs.p.bits(),
                self.regs.s,
                self.total_cycles - 1,
            );
        }

        self.irq_mask = self.regs.p.is_set(I);
        self.mode = instr.mode;
        self.op = instr.op;
        self.cycle = 1;
        self.resolved = false;
        self.tail = 0;
        self.crossed = false;
        self.state = State::Execute;
        Ok(())
    }

    fn execute<B: Bus>(&mut self, bus: &mut B) {
        match self.op {
            Op::Read(op) => self.read_operand(bus, op),
            Op::Write(value) => self.write_operand(bus, value),
            Op::Modify(op) if self.mode == Mode::Accumulator => {
                let _ = bus.read(self.regs.pc);
                self.regs.a = op(self, self.regs.a);
                self.finish();
            }
            Op::Modify(op) => self.modify_operand(bus, op),
            Op::Implied(op) => {
                let _ = bus.read(self.regs.pc);
                op(self);
                self.finish();
            }
            Op::Branch(flag, state) => {
                let taken = self.regs.p.is_set(flag) == state;
                self.branch(bus, taken);
            }
            Op::Push(value) => self.push(bus, value),
            Op::Pull(op) => self.pull(bus, op),
            Op::Brk => self.interrupt_sequence(bus, Interrupt::Brk),
            Op::Jsr => self.jsr(bus),
            Op::Rts => self.rts(bus),
            Op::Rti => self.rti(bus),
            Op::Jmp => self.jmp(bus),
        }
    }

    /// Return to opcode fetch and poll for interrupts.
    fn finish(&mut self) {
        self.state = State::Fetch;
        self.cycle = 0;
        self.resolved = false;
        self.tail = 0;
        self.detect_interrupts();
    }

    fn advance(&mut self) {
        self.cycle += 1;
    }

    fn fetch_operand<B: Bus>(&mut self, bus: &mut B) -> u8 {
        let value = bus.read(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        value
    }

    // ========================================================================
    // Addressing-mode shapes
    // ========================================================================

    /// One cycle of effective-address calculation for `self.mode`.
    fn resolve<B: Bus>(&mut self, bus: &mut B, fixup: Fixup) -> Resolve {
        let index = match self.mode {
            Mode::ZeroPageY | Mode::AbsoluteY | Mode::IndirectY => self.regs.y,
            _ => self.regs.x,
        };

        match (self.mode, self.cycle) {
            (Mode::Immediate, 1) => {
                self.addr = self.regs.pc;
                self.regs.pc = self.regs.pc.wrapping_add(1);
                Resolve::ReadyNow
            }
            (Mode::ZeroPage, 1) => {
                self.addr = u16::from(self.fetch_operand(bus));
                Resolve::Ready
            }
            (Mode::ZeroPageX | Mode::ZeroPageY | Mode::IndirectX | Mode::IndirectY, 1) => {
                self.pointer = self.fetch_operand(bus);
                Resolve::Pending
            }
            (Mode::ZeroPageX | Mode::ZeroPageY, 2) => {
                // Dummy read while the index is added; wraps in page zero.
                let _ = bus.read(u16::from(self.pointer));
                self.addr = u16::from(self.pointer.wrapping_add(index));
                Resolve::Ready
            }
            (Mode::Absolute | Mode::AbsoluteX | Mode::AbsoluteY, 1) => {
                self.addr = u16::from(self.fetch_operand(bus));
                Resolve::Pending
            }
            (Mode::Absolute, 2) => {
                self.addr |= u16::from(self.fetch_operand(bus)) << 8;
                Resolve::Ready
            }
            (Mode::AbsoluteX | Mode::AbsoluteY, 2) => {
                let high = self.fetch_operand(bus);
                self.add_index(high, index, fixup)
            }
            (Mode::IndirectX, 2) => {
                let _ = bus.read(u16::from(self.pointer));
                self.pointer = self.pointer.wrapping_add(index);
                Resolve::Pending
            }
            (Mode::IndirectX, 3) | (Mode::IndirectY, 2) => {
                self.addr = u16::from(bus.read(u16::from(self.pointer)));
                Resolve::Pending
            }
            (Mode::IndirectX, 4) => {
                let high = bus.read(u16::from(self.pointer.wrapping_add(1)));
                self.addr |= u16::from(high) << 8;
                Resolve::Ready
            }
            (Mode::IndirectY, 3) => {
                let high = bus.read(u16::from(self.pointer.wrapping_add(1)));
                self.add_index(high, index, fixup)
            }
            (Mode::AbsoluteX | Mode::AbsoluteY, 3) | (Mode::IndirectY, 4) => {
                // Read from the address before the carry reached the high byte.
                let _ = bus.read(self.addr);
                if self.crossed {
                    self.addr = self.addr.wrapping_add(0x100);
                }
                Resolve::Ready
            }
            (mode, cycle) => unreachable!("{mode:?} has no address cycle {cycle}"),
        }
    }

    /// Add an index to the low byte held in `addr`, leaving the high byte
    /// uncorrected until the fixup cycle.
    fn add_index(&mut self, high: u8, index: u8, fixup: Fixup) -> Resolve {
        let low = self.addr + u16::from(index);
        self.crossed = low > 0xFF;
        self.addr = (u16::from(high) << 8) | (low & 0xFF);
        if self.crossed || fixup == Fixup::Always {
            Resolve::Pending
        } else {
            Resolve::Ready
        }
    }

    /// Run one address cycle if the address is not yet known. Returns
    /// `true` when this cycle is free for the operation.
    fn address_cycle<B: Bus>(&mut self, bus: &mut B, fixup: Fixup) -> bool {
        if self.resolved {
            return true;
        }
        match self.resolve(bus, fixup) {
            Resolve::Pending => {
                self.advance();
                false
            }
            Resolve::Ready => {
                self.resolved = true;
                self.advance();
                false
            }
            Resolve::ReadyNow => {
                self.resolved = true;
                true
            }
        }
    }

    fn read_operand<B: Bus>(&mut self, bus: &mut B, op: fn(&mut Self, u8)) {
        if self.address_cycle(bus, Fixup::OnCross) {
            self.data = bus.read(self.addr);
            op(self, self.data);
            self.finish();
        }
    }

    fn write_operand<B: Bus>(&mut self, bus: &mut B, value: fn(&Self) -> u8) {
        if self.address_cycle(bus, Fixup::Always) {
            bus.write(self.addr, value(self));
            self.finish();
        }
    }

    fn modify_operand<B: Bus>(&mut self, bus: &mut B, op: fn(&mut Self, u8) -> u8) {
        if !self.address_cycle(bus, Fixup::Always) {
            return;
        }
        match self.tail {
            0 => self.data = bus.read(self.addr),
            1 => {
                // The unmodified value goes back out first.
                bus.write(self.addr, self.data);
                self.data = op(self, self.data);
            }
            _ => {
                bus.write(self.addr, self.data);
                self.finish();
                return;
            }
        }
        self.tail += 1;
        self.advance();
    }

    // ========================================================================
    // Control flow
    // ========================================================================

    fn branch<B: Bus>(&mut self, bus: &mut B, taken: bool) {
        match self.cycle {
            1 => {
                self.data = self.fetch_operand(bus);
                if taken {
                    self.advance();
                } else {
                    self.finish();
                }
            }
            2 => {
                let _ = bus.read(self.regs.pc);
                let target = self.regs.pc.wrapping_add_signed(i16::from(self.data as i8));
                if (target ^ self.regs.pc) & 0xFF00 == 0 {
                    self.regs.pc = target;
                    self.finish();
                } else {
                    self.addr = target;
                    self.advance();
                }
            }
            3 => {
                let _ = bus.read((self.regs.pc & 0xFF00) | (self.addr & 0x00FF));
                self.regs.pc = self.addr;
                self.finish();
            }
            _ => unreachable!(),
        }
    }

    fn jmp<B: Bus>(&mut self, bus: &mut B) {
        match self.cycle {
            1 => {
                self.addr = u16::from(self.fetch_operand(bus));
                self.advance();
            }
            2 => {
                self.addr |= u16::from(self.fetch_operand(bus)) << 8;
                if self.mode == Mode::Absolute {
                    self.regs.pc = self.addr;
                    self.finish();
                } else {
                    self.advance();
                }
            }
            3 => {
                self.data = bus.read(self.addr);
                self.advance();
            }
            4 => {
                // The pointer's high byte is fetched without carrying into
                // the page: JMP ($10FF) reads $10FF and $1000.
                let high_addr = (self.addr & 0xFF00) | (self.addr.wrapping_add(1) & 0x00FF);
                let high = bus.read(high_addr);
                self.regs.pc = u16::from(self.data) | (u16::from(high) << 8);
                self.finish();
            }
            _ => unreachable!(),
        }
    }

    fn jsr<B: Bus>(&mut self, bus: &mut B) {
        match self.cycle {
            1 => {
                self.data = self.fetch_operand(bus);
                self.advance();
            }
            2 => {
                let _ = bus.read(self.regs.stack_addr());
                self.advance();
            }
            3 => {
                let addr = self.regs.push();
                bus.write(addr, (self.regs.pc >> 8) as u8);
                self.advance();
            }
            4 => {
                let addr = self.regs.push();
                bus.write(addr, self.regs.pc as u8);
                self.advance();
            }
            5 => {
                let high = bus.read(self.regs.pc);
                self.regs.pc = u16::from(self.data) | (u16::from(high) << 8);
                self.finish();
            }
            _ => unreachable!(),
        }
    }

    fn rts<B: Bus>(&mut self, bus: &mut B) {
        match self.cycle {
            1 => {
                let _ = bus.read(self.regs.pc);
                self.advance();
            }
            2 => {
                let _ = bus.read(self.regs.stack_addr());
                self.advance();
            }
            3 => {
                let addr = self.regs.pop();
                self.regs.pc = u16::from(bus.read(addr));
                self.advance();
            }
            4 => {
                let addr = self.regs.pop();
                self.regs.pc |= u16::from(bus.read(addr)) << 8;
                self.advance();
            }
            5 => {
                let _ = bus.read(self.regs.pc);
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.finish();
            }
            _ => unreachable!(),
        }
    }

    fn rti<B: Bus>(&mut self, bus: &mut B) {
        match self.cycle {
            1 => {
                let _ = bus.read(self.regs.pc);
                self.advance();
            }
            2 => {
                let _ = bus.read(self.regs.stack_addr());
                self.advance();
            }
            3 => {
                let addr = self.regs.pop();
                let status = bus.read(addr);
                self.restore_status(status);
                // RTI's flags apply to the poll at its own end.
                self.irq_mask = self.regs.p.is_set(I);
                self.advance();
            }
            4 => {
                let addr = self.regs.pop();
                self.regs.pc = u16::from(bus.read(addr));
                self.advance();
            }
            5 => {
                let addr = self.regs.pop();
                self.regs.pc |= u16::from(bus.read(addr)) << 8;
                self.finish();
            }
            _ => unreachable!(),
        }
    }

    fn push<B: Bus>(&mut self, bus: &mut B, value: fn(&Self) -> u8) {
        match self.cycle {
            1 => {
                let _ = bus.read(self.regs.pc);
                self.advance();
            }
            2 => {
                let addr = self.regs.push();
                bus.write(addr, value(self));
                self.finish();
            }
            _ => unreachable!(),
        }
    }

    fn pull<B: Bus>(&mut self, bus: &mut B, op: fn(&mut Self, u8)) {
        match self.cycle {
            1 => {
                let _ = bus.read(self.regs.pc);
                self.advance();
            }
            2 => {
                let _ = bus.read(self.regs.stack_addr());
                self.advance();
            }
            3 => {
                let addr = self.regs.pop();
                let value = bus.read(addr);
                op(self, value);
                self.finish();
            }
            _ => unreachable!(),
        }
    }

    /// BRK, IRQ, NMI and reset share one shape. Step 0 was the opcode fetch
    /// (BRK) or a dummy read in its place.
    fn interrupt_sequence<B: Bus>(&mut self, bus: &mut B, kind: Interrupt) {
        match self.cycle {
            1 => {
                let _ = bus.read(self.regs.pc);
                if kind == Interrupt::Brk {
                    // BRK skips its padding byte.
                    self.regs.pc = self.regs.pc.wrapping_add(1);
                }
                self.advance();
            }
            2 => {
                self.push_or_skip(bus, kind, (self.regs.pc >> 8) as u8);
                self.advance();
            }
            3 => {
                self.push_or_skip(bus, kind, self.regs.pc as u8);
                self.advance();
            }
            4 => {
                let status = self.regs.p.to_pushed(kind == Interrupt::Brk);
                self.push_or_skip(bus, kind, status);
                self.vector = match kind {
                    Interrupt::Reset => RESET_VECTOR,
                    Interrupt::Nmi => NMI_VECTOR,
                    Interrupt::Irq | Interrupt::Brk if self.nmi_edge => {
                        // An NMI arriving before the vector fetch takes over.
                        self.nmi_edge = false;
                        NMI_VECTOR
                    }
                    Interrupt::Irq | Interrupt::Brk => IRQ_VECTOR,
                };
                self.advance();
            }
            5 => {
                self.data = bus.read(self.vector);
                self.regs.p.set(I);
                self.irq_mask = true;
                self.advance();
            }
            6 => {
                let high = bus.read(self.vector.wrapping_add(1));
                self.regs.pc = u16::from(self.data) | (u16::from(high) << 8);
                self.finish();
            }
            _ => unreachable!(),
        }
    }

    /// Stack push for BRK/IRQ/NMI; reset reads instead of writing.
    fn push_or_skip<B: Bus>(&mut self, bus: &mut B, kind: Interrupt, value: u8) {
        let addr = self.regs.push();
        if kind == Interrupt::Reset {
            let _ = bus.read(addr);
        } else {
            bus.write(addr, value);
        }
    }
}

impl Observable for Mos6502 {
    fn query(&self, path: &str) -> Option<Value> {
        let value = match path {
            "pc" => self.regs.pc.into(),
            "a" => self.regs.a.into(),
            "x" => self.regs.x.into(),
            "y" => self.regs.y.into(),
            "s" => self.regs.s.into(),
            "p" => self.regs.p.bits().into(),
            "flags.c" => self.regs.p.is_set(C).into(),
            "flags.z" => self.regs.p.is_set(Z).into(),
            "flags.i" => self.regs.p.is_set(I).into(),
            "flags.d" => self.regs.p.is_set(D).into(),
            "flags.v" => self.regs.p.is_set(V).into(),
            "flags.n" => self.regs.p.is_set(N).into(),
            "opcode" => self.opcode.into(),
            "cycle" => self.cycle.into(),
            "total_cycles" => self.total_cycles.into(),
            "irq_line" => self.irq.level().into(),
            "nmi_line" => self.nmi.level().into(),
            "halted" => self.is_halted().into(),
            _ => return None,
        };
        Some(value)
    }

    fn query_paths(&self) -> Vec<String> {
        [
            "pc", "a", "x", "y", "s", "p", "flags.c", "flags.z", "flags.i", "flags.d", "flags.v",
            "flags.n", "opcode", "cycle", "total_cycles", "irq_line", "nmi_line", "halted",
        ]
        .iter()
        .map(ToString::to_string)
        .collect()
    }
}
