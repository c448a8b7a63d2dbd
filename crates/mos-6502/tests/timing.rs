//! Cycle counts for every emulated opcode, checked against the documented
//! timing table in `fixtures/cycle_counts.json`.

use emu_core::SimpleBus;
use mos_6502::{Mode, Mos6502, decode};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Timing {
    opcode: u8,
    mnemonic: String,
    mode: String,
    cycles: u32,
    /// Reads that pay one more cycle when indexing crosses a page.
    page_penalty: bool,
}

fn load_table() -> Vec<Timing> {
    serde_json::from_str(include_str!("fixtures/cycle_counts.json"))
        .expect("fixture should parse")
}

/// Run the opcode at $0200 with operand bytes $80 $12 and return the number
/// of ticks until the CPU is back at an instruction boundary.
///
/// The zero-page pointer at $80 holds $1280, so with X = Y = $FF every
/// absolute-indexed and indirect-indexed address crosses a page and with
/// X = Y = 0 none does.
fn measure(opcode: u8, index: u8) -> u32 {
    let mut bus = SimpleBus::new();
    bus.load(0x0200, &[opcode, 0x80, 0x12]);
    bus.load(0x0080, &[0x80, 0x12]);
    let mut cpu = Mos6502::new();
    cpu.regs.pc = 0x0200;
    cpu.regs.x = index;
    cpu.regs.y = index;

    let mut cycles = 0;
    loop {
        cpu.tick(&mut bus).expect("opcode should be implemented");
        cycles += 1;
        if cpu.is_instruction_complete() {
            return cycles;
        }
        assert!(cycles <= 8, "${opcode:02X} ran past 8 cycles");
    }
}

#[test]
fn fixture_matches_decode_table() {
    let table = load_table();
    let branches = (0..=255u8)
        .filter_map(decode)
        .filter(|instr| instr.mode == Mode::Relative)
        .count();
    assert_eq!(table.len() + branches, 236);

    for entry in &table {
        let instr = decode(entry.opcode).expect("fixture lists only decodable opcodes");
        assert_eq!(instr.mnemonic, entry.mnemonic, "${:02X}", entry.opcode);
        assert!(!entry.mode.is_empty());
    }
}

#[test]
fn base_cycle_counts() {
    for entry in load_table() {
        assert_eq!(
            measure(entry.opcode, 0),
            entry.cycles,
            "${:02X} {} {}",
            entry.opcode,
            entry.mnemonic,
            entry.mode
        );
    }
}

#[test]
fn page_crossing_penalties() {
    for entry in load_table() {
        let expected = entry.cycles + u32::from(entry.page_penalty);
        assert_eq!(
            measure(entry.opcode, 0xFF),
            expected,
            "${:02X} {} {} across a page",
            entry.opcode,
            entry.mnemonic,
            entry.mode
        );
    }
}

#[test]
fn branch_cycle_counts() {
    use mos_6502::flags::{C, N, V, Z};

    for (opcode, flag, when_set) in [
        (0x10, N, false),
        (0x30, N, true),
        (0x50, V, false),
        (0x70, V, true),
        (0x90, C, false),
        (0xB0, C, true),
        (0xD0, Z, false),
        (0xF0, Z, true),
    ] {
        for (taken, start, offset, expected) in [
            (false, 0x0200, 0x10, 2),
            (true, 0x0200, 0x10, 3),
            (true, 0x02F0, 0x10, 4),
            (true, 0x0200, 0x80, 4),
        ] {
            let mut bus = SimpleBus::new();
            bus.load(start, &[opcode, offset]);
            let mut cpu = Mos6502::new();
            cpu.regs.pc = start;
            cpu.regs.p.set_if(flag, taken == when_set);

            let mut cycles = 0;
            loop {
                cpu.tick(&mut bus).expect("branch");
                cycles += 1;
                if cpu.is_instruction_complete() {
                    break;
                }
            }
            assert_eq!(
                cycles, expected,
                "${opcode:02X} taken={taken} from ${start:04X} offset ${offset:02X}"
            );
        }
    }
}
