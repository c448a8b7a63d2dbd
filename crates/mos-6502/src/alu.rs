//! Operations applied once an operand has been fetched.
//!
//! These are plain functions of CPU state so the opcode table can refer to
//! them by pointer. Bus timing is handled entirely by the addressing-mode
//! sequences in `cpu.rs`.

use crate::flags::{C, N, V, Z};
use crate::{Mos6502, Status};

impl Mos6502 {
    /// Update N/Z from `value` and pass it through.
    pub(crate) fn set_nz(&mut self, value: u8) -> u8 {
        self.regs.p.update_nz(value);
        value
    }

    pub(crate) fn restore_status(&mut self, value: u8) {
        self.regs.p = Status::from_pulled(value);
    }

    pub(crate) fn lda(&mut self, value: u8) {
        self.regs.a = self.set_nz(value);
    }

    pub(crate) fn ldx(&mut self, value: u8) {
        self.regs.x = self.set_nz(value);
    }

    pub(crate) fn ldy(&mut self, value: u8) {
        self.regs.y = self.set_nz(value);
    }

    pub(crate) fn lax(&mut self, value: u8) {
        self.regs.a = value;
        self.regs.x = self.set_nz(value);
    }

    pub(crate) fn and(&mut self, value: u8) {
        self.regs.a = self.set_nz(self.regs.a & value);
    }

    pub(crate) fn ora(&mut self, value: u8) {
        self.regs.a = self.set_nz(self.regs.a | value);
    }

    pub(crate) fn eor(&mut self, value: u8) {
        self.regs.a = self.set_nz(self.regs.a ^ value);
    }

    /// Binary add with carry. The 2A03 ignores D.
    pub(crate) fn adc(&mut self, value: u8) {
        let a = self.regs.a;
        let sum = u16::from(a) + u16::from(value) + u16::from(self.regs.p.is_set(C));
        let result = sum as u8;
        self.regs.p.set_if(C, sum > 0xFF);
        // Operands share a sign that the result does not.
        self.regs.p.set_if(V, (a ^ result) & (value ^ result) & 0x80 != 0);
        self.regs.a = self.set_nz(result);
    }

    pub(crate) fn sbc(&mut self, value: u8) {
        self.adc(!value);
    }

    fn compare(&mut self, register: u8, value: u8) {
        self.regs.p.set_if(C, register >= value);
        self.set_nz(register.wrapping_sub(value));
    }

    pub(crate) fn cmp(&mut self, value: u8) {
        self.compare(self.regs.a, value);
    }

    pub(crate) fn cpx(&mut self, value: u8) {
        self.compare(self.regs.x, value);
    }

    pub(crate) fn cpy(&mut self, value: u8) {
        self.compare(self.regs.y, value);
    }

    pub(crate) fn bit(&mut self, value: u8) {
        self.regs.p.set_if(Z, self.regs.a & value == 0);
        self.regs.p.set_if(N, value & 0x80 != 0);
        self.regs.p.set_if(V, value & 0x40 != 0);
    }

    pub(crate) fn asl(&mut self, value: u8) -> u8 {
        self.regs.p.set_if(C, value & 0x80 != 0);
        self.set_nz(value << 1)
    }

    pub(crate) fn lsr(&mut self, value: u8) -> u8 {
        self.regs.p.set_if(C, value & 0x01 != 0);
        self.set_nz(value >> 1)
    }

    pub(crate) fn rol(&mut self, value: u8) -> u8 {
        let carry_in = u8::from(self.regs.p.is_set(C));
        self.regs.p.set_if(C, value & 0x80 != 0);
        self.set_nz((value << 1) | carry_in)
    }

    pub(crate) fn ror(&mut self, value: u8) -> u8 {
        let carry_in = u8::from(self.regs.p.is_set(C)) << 7;
        self.regs.p.set_if(C, value & 0x01 != 0);
        self.set_nz((value >> 1) | carry_in)
    }

    pub(crate) fn inc(&mut self, value: u8) -> u8 {
        self.set_nz(value.wrapping_add(1))
    }

    pub(crate) fn dec(&mut self, value: u8) -> u8 {
        self.set_nz(value.wrapping_sub(1))
    }

    // Undocumented combinations.

    /// AND, then copy N into C.
    pub(crate) fn anc(&mut self, value: u8) {
        self.and(value);
        self.regs.p.set_if(C, self.regs.p.is_set(N));
    }

    /// AND, then LSR A.
    pub(crate) fn alr(&mut self, value: u8) {
        let masked = self.regs.a & value;
        self.regs.a = self.lsr(masked);
    }

    /// AND, then ROR A with C and V taken from bits 6 and 5 of the result.
    pub(crate) fn arr(&mut self, value: u8) {
        let carry_in = u8::from(self.regs.p.is_set(C)) << 7;
        let result = ((self.regs.a & value) >> 1) | carry_in;
        self.regs.a = self.set_nz(result);
        let bit6 = result & 0x40 != 0;
        let bit5 = result & 0x20 != 0;
        self.regs.p.set_if(C, bit6);
        self.regs.p.set_if(V, bit6 ^ bit5);
    }

    /// X = (A AND X) - operand, flags as CMP. No borrow in, D ignored.
    pub(crate) fn axs(&mut self, value: u8) {
        let masked = self.regs.a & self.regs.x;
        self.regs.p.set_if(C, masked >= value);
        self.regs.x = self.set_nz(masked.wrapping_sub(value));
    }

    pub(crate) fn slo(&mut self, value: u8) -> u8 {
        let result = self.asl(value);
        self.ora(result);
        result
    }

    pub(crate) fn rla(&mut self, value: u8) -> u8 {
        let result = self.rol(value);
        self.and(result);
        result
    }

    pub(crate) fn sre(&mut self, value: u8) -> u8 {
        let result = self.lsr(value);
        self.eor(result);
        result
    }

    pub(crate) fn rra(&mut self, value: u8) -> u8 {
        let result = self.ror(value);
        self.adc(result);
        result
    }

    pub(crate) fn dcp(&mut self, value: u8) -> u8 {
        let result = value.wrapping_sub(1);
        self.cmp(result);
        result
    }

    pub(crate) fn isc(&mut self, value: u8) -> u8 {
        let result = value.wrapping_add(1);
        self.sbc(result);
        result
    }
}
