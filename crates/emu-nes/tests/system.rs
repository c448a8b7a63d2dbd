//! Whole-system tests: small hand-assembled programs run through the
//! scheduler, checked through the debugger.

use emu_core::{Bus, Observable, Value};
use emu_nes::{Nes, NesConfig, NesError, NesRegion};
use nes_cartridge::{CartridgeImage, TvSystem};

/// Build an iNES file. `prg` must be a multiple of 16K.
fn ines(mapper: u8, prg: &[u8], chr: &[u8], flags9: u8) -> Vec<u8> {
    let mut rom = vec![0u8; 16];
    rom[0..4].copy_from_slice(b"NES\x1a");
    rom[4] = (prg.len() / 0x4000) as u8;
    rom[5] = (chr.len() / 0x2000) as u8;
    rom[6] = mapper << 4;
    rom[7] = mapper & 0xF0;
    rom[9] = flags9;
    rom.extend_from_slice(prg);
    rom.extend_from_slice(chr);
    rom
}

/// 32K PRG with `code` at `offset` and all three vectors set.
fn prg_32k(code: &[(usize, &[u8])], reset: u16, nmi: u16, irq: u16) -> Vec<u8> {
    let mut prg = vec![0xEA; 0x8000];
    for (offset, bytes) in code {
        prg[*offset..*offset + bytes.len()].copy_from_slice(bytes);
    }
    for (at, vector) in [(0x7FFA, nmi), (0x7FFC, reset), (0x7FFE, irq)] {
        prg[at..at + 2].copy_from_slice(&vector.to_le_bytes());
    }
    prg
}

fn memory(nes: &Nes, addr: u16) -> Option<u8> {
    nes.debugger().peek(addr)
}

#[test]
fn boot_reaches_idle_loop_after_two_vblank_waits() {
    #[rustfmt::skip]
    let code: &[u8] = &[
        0x78,             // $8000  SEI
        0xD8,             // $8001  CLD
        0xA2, 0xFF,       // $8002  LDX #$FF
        0x9A,             // $8004  TXS
        0xAD, 0x02, 0x20, // $8005  LDA $2002
        0x10, 0xFB,       // $8008  BPL $8005
        0xAD, 0x02, 0x20, // $800A  LDA $2002
        0x10, 0xFB,       // $800D  BPL $800A
        0x4C, 0x0F, 0x80, // $800F  JMP $800F
    ];
    let prg = prg_32k(&[(0, code)], 0x8000, 0x8000, 0x8000);
    let mut nes = Nes::new(&NesConfig::new(ines(0, &prg, &[0; 0x2000], 0))).expect("valid ROM");

    for _ in 0..5 {
        nes.run_frame().expect("running");
    }
    let pc = nes.cpu().pc();
    assert!(
        (0x800F..=0x8011).contains(&pc),
        "stuck at ${pc:04X}"
    );
    assert_eq!(nes.cpu().regs.s, 0xFF);
}

#[test]
fn nrom_program_writes_prg_ram() {
    #[rustfmt::skip]
    let low: &[u8] = &[
        0x4C, 0x00, 0xC0, // $8000  JMP $C000
    ];
    #[rustfmt::skip]
    let high: &[u8] = &[
        0xA9, 0x42,       // $C000  LDA #$42
        0x8D, 0x00, 0x60, // $C002  STA $6000
        0x4C, 0x05, 0xC0, // $C005  JMP $C005
    ];
    let prg = prg_32k(&[(0, low), (0x4000, high)], 0x8000, 0x8000, 0x8000);
    let mut nes = Nes::new(&NesConfig::new(ines(0, &prg, &[0; 0x2000], 0))).expect("valid ROM");

    assert_eq!(memory(&nes, 0x6000), Some(0));
    nes.run_frame().expect("running");
    assert_eq!(memory(&nes, 0x6000), Some(0x42));
    assert_eq!(
        nes.debugger().query("memory.$6000"),
        Some(Value::U8(0x42))
    );
    assert_eq!(nes.debugger().query("cpu.a"), Some(Value::U8(0x42)));
}

#[test]
fn vblank_nmi_runs_handler_once_per_frame() {
    #[rustfmt::skip]
    let code: &[u8] = &[
        0x78,             // $8000  SEI
        0xD8,             // $8001  CLD
        0xA2, 0xFF,       // $8002  LDX #$FF
        0x9A,             // $8004  TXS
        0xAD, 0x02, 0x20, // $8005  LDA $2002
        0x10, 0xFB,       // $8008  BPL $8005
        0xA9, 0x80,       // $800A  LDA #$80
        0x8D, 0x00, 0x20, // $800C  STA $2000
        0x4C, 0x0F, 0x80, // $800F  JMP $800F
        0xE6, 0x10,       // $8012  INC $10
        0x40,             // $8014  RTI
    ];
    let prg = prg_32k(&[(0, code)], 0x8000, 0x8012, 0x8014);
    let mut nes = Nes::new(&NesConfig::new(ines(0, &prg, &[0; 0x2000], 0))).expect("valid ROM");

    for _ in 0..4 {
        nes.run_frame().expect("running");
    }
    let count = memory(&nes, 0x0010).expect("RAM");
    assert!((2..=3).contains(&count), "{count} NMIs");

    let before = count;
    nes.run_frame().expect("running");
    assert_eq!(memory(&nes, 0x0010), Some(before + 1));
}

#[test]
fn mmc3_scanline_irq_fires_while_rendering() {
    #[rustfmt::skip]
    let code: &[u8] = &[
        0x78,             // $E000  SEI
        0xD8,             // $E001  CLD
        0xA2, 0xFF,       // $E002  LDX #$FF
        0x9A,             // $E004  TXS
        0xA9, 0x40,       // $E005  LDA #$40
        0x8D, 0x17, 0x40, // $E007  STA $4017     ; no APU frame IRQ
        0xAD, 0x02, 0x20, // $E00A  LDA $2002
        0x10, 0xFB,       // $E00D  BPL $E00A
        0xA9, 0x08,       // $E00F  LDA #$08
        0x8D, 0x00, 0x20, // $E011  STA $2000     ; sprites at $1000
        0xA9, 0x18,       // $E014  LDA #$18
        0x8D, 0x01, 0x20, // $E016  STA $2001     ; rendering on
        0xA9, 0x05,       // $E019  LDA #$05
        0x8D, 0x00, 0xC0, // $E01B  STA $C000     ; latch
        0x8D, 0x01, 0xC0, // $E01E  STA $C001     ; reload
        0x8D, 0x01, 0xE0, // $E021  STA $E001     ; enable
        0x58,             // $E024  CLI
        0x4C, 0x25, 0xE0, // $E025  JMP $E025
        0xE6, 0x10,       // $E028  INC $10
        0x8D, 0x00, 0xE0, // $E02A  STA $E000     ; acknowledge, disable
        0x40,             // $E02D  RTI
    ];
    let prg = prg_32k(&[(0x6000, code)], 0xE000, 0xE02D, 0xE028);
    let image = CartridgeImage::new(4, prg, vec![0; 0x2000]);
    let mut nes = Nes::from_image(&image).expect("valid image");

    for _ in 0..3 {
        nes.run_frame().expect("running");
    }
    assert_eq!(memory(&nes, 0x0010), Some(1));
    let debugger = nes.debugger();
    assert_eq!(debugger.query("mapper.name"), Some(Value::from("MMC3")));
    assert_eq!(debugger.query("mapper.irq_enabled"), Some(Value::Bool(false)));
    assert_eq!(debugger.query("cpu.irq_line"), Some(Value::I32(0)));
}

/// Run `code` from reset until its `STA $4014` has executed, then return
/// the CPU cycle the transfer began on and how many cycles the CPU was
/// held off the bus.
fn oam_dma_from(code: &[u8]) -> (Nes, u64, u64) {
    let prg = prg_32k(&[(0, code)], 0x8000, 0x8000, 0x8000);
    let mut nes = Nes::new(&NesConfig::new(ines(0, &prg, &[0; 0x2000], 0))).expect("valid ROM");
    for i in 0..=255u8 {
        nes.bus_mut().write(0x0300 + u16::from(i), i ^ 0x5A);
    }

    while nes.cpu().opcode() != 0x8D || !nes.cpu().is_instruction_complete() {
        nes.step_instruction().expect("running");
    }
    assert!(!nes.dma_active());

    let start = nes.cpu_cycles();
    let pc = nes.cpu().pc();
    nes.step().expect("running");
    assert!(nes.dma_active());
    while nes.dma_active() {
        assert_eq!(nes.cpu().pc(), pc, "CPU is held during the transfer");
        nes.step().expect("running");
    }
    let stall = nes.cpu_cycles() - start;
    (nes, start, stall)
}

fn assert_page_copied(nes: &Nes) {
    let oam = nes.bus().ppu.oam();
    for i in 0..=255u8 {
        assert_eq!(oam[usize::from(i)], i ^ 0x5A, "OAM byte {i}");
    }
}

#[test]
fn oam_dma_started_on_odd_cycle_takes_513() {
    #[rustfmt::skip]
    let code: &[u8] = &[
        0xA9, 0x03,       // $8000  LDA #$03
        0x8D, 0x14, 0x40, // $8002  STA $4014
        0x4C, 0x05, 0x80, // $8005  JMP $8005
    ];
    let (nes, start, stall) = oam_dma_from(code);
    assert_eq!(start % 2, 1);
    assert_eq!(stall, 513);
    assert_page_copied(&nes);
    assert_eq!(nes.debugger().query("dma.remaining"), Some(Value::U16(0)));
}

#[test]
fn oam_dma_started_on_even_cycle_takes_512() {
    #[rustfmt::skip]
    let code: &[u8] = &[
        0xA5, 0x00,       // $8000  LDA $00       ; three cycles
        0xA9, 0x03,       // $8002  LDA #$03
        0x8D, 0x14, 0x40, // $8004  STA $4014
        0x4C, 0x07, 0x80, // $8007  JMP $8007
    ];
    let (nes, start, stall) = oam_dma_from(code);
    assert_eq!(start % 2, 0);
    assert_eq!(stall, 512);
    assert_page_copied(&nes);
}

#[test]
fn pal_timing_is_rejected() {
    let prg = prg_32k(&[], 0x8000, 0x8000, 0x8000);

    let err = Nes::new(&NesConfig::new(ines(0, &prg, &[], 0x01)))
        .err()
        .expect("PAL cartridge");
    assert_eq!(
        err,
        NesError::UnsupportedRegion {
            region: NesRegion::Ntsc,
            cartridge: TvSystem::Pal,
        }
    );

    let config = NesConfig {
        rom_data: ines(0, &prg, &[], 0),
        region: NesRegion::Pal,
    };
    assert!(matches!(
        Nes::new(&config),
        Err(NesError::UnsupportedRegion {
            region: NesRegion::Pal,
            ..
        })
    ));
}

#[test]
fn bad_header_is_a_cartridge_error() {
    let result = Nes::new(&NesConfig::new(b"NOPE".to_vec()));
    assert!(matches!(result, Err(NesError::Cartridge(_))));
}

#[test]
fn unsupported_mapper_is_reported() {
    let prg = prg_32k(&[], 0x8000, 0x8000, 0x8000);
    let result = Nes::new(&NesConfig::new(ines(5, &prg, &[], 0)));
    assert!(matches!(
        result,
        Err(NesError::Cartridge(
            nes_cartridge::CartridgeError::UnsupportedMapper(5)
        ))
    ));
}
