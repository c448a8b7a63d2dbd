//! NES emulator binary.
//!
//! Headless runner: loads an iNES image, runs a number of frames and
//! prints the machine state. `--json` prints a machine-readable report.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process;

use emu_core::{Observable, Value};
use emu_nes::{Nes, NesConfig, NesRegion};

// ---------------------------------------------------------------------------
// CLI argument parsing
// ---------------------------------------------------------------------------

struct CliArgs {
    rom_path: Option<PathBuf>,
    frames: u32,
    region: NesRegion,
    trace: bool,
    json: bool,
    /// Extra debugger paths to include in the report.
    queries: Vec<String>,
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        rom_path: None,
        frames: 60,
        region: NesRegion::Ntsc,
        trace: false,
        json: false,
        queries: Vec::new(),
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--rom" => {
                i += 1;
                cli.rom_path = args.get(i).map(PathBuf::from);
            }
            "--frames" => {
                i += 1;
                if let Some(s) = args.get(i) {
                    cli.frames = s.parse().unwrap_or(60);
                }
            }
            "--pal" => cli.region = NesRegion::Pal,
            "--trace" => cli.trace = true,
            "--json" => cli.json = true,
            "--query" => {
                i += 1;
                if let Some(s) = args.get(i) {
                    cli.queries.push(s.clone());
                }
            }
            other => {
                // Bare argument: treat as ROM path.
                if !other.starts_with('-') && cli.rom_path.is_none() {
                    cli.rom_path = Some(PathBuf::from(other));
                } else {
                    eprintln!("Unknown argument: {other}");
                }
            }
        }
        i += 1;
    }

    cli
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(serde::Serialize)]
struct Report {
    rom: String,
    frames: u32,
    error: Option<String>,
    state: BTreeMap<String, Value>,
}

const REPORT_PATHS: &[&str] = &[
    "cpu.pc",
    "cpu.a",
    "cpu.x",
    "cpu.y",
    "cpu.s",
    "cpu.p",
    "cpu.total_cycles",
    "cpu.halted",
    "ppu.scanline",
    "ppu.dot",
    "ppu.frame",
    "mapper.name",
    "mapper.mirroring",
    "master_clock",
    "cpu_cycle",
];

fn build_report(cli: &CliArgs, nes: &Nes, error: Option<String>) -> Report {
    let debugger = nes.debugger();
    let state = REPORT_PATHS
        .iter()
        .map(ToString::to_string)
        .chain(cli.queries.iter().cloned())
        .filter_map(|path| debugger.query(&path).map(|value| (path, value)))
        .collect();

    Report {
        rom: cli
            .rom_path
            .as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_default(),
        frames: cli.frames,
        error,
        state,
    }
}

fn print_report(report: &Report, json: bool) {
    if json {
        match serde_json::to_string_pretty(report) {
            Ok(text) => println!("{text}"),
            Err(e) => eprintln!("Failed to encode report: {e}"),
        }
        return;
    }

    println!("{}: {} frame(s)", report.rom, report.frames);
    for (path, value) in &report.state {
        println!("  {path:<20} {value}");
    }
    if let Some(ref error) = report.error {
        println!("  stopped: {error}");
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

fn make_nes(cli: &CliArgs) -> Nes {
    let rom_path = cli.rom_path.as_ref().unwrap_or_else(|| {
        eprintln!("No ROM file specified. Use --rom <file.nes>");
        process::exit(1);
    });

    let rom_data = match std::fs::read(rom_path) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Failed to read ROM file {}: {e}", rom_path.display());
            process::exit(1);
        }
    };

    let config = NesConfig {
        rom_data,
        region: cli.region,
    };
    match Nes::new(&config) {
        Ok(nes) => {
            log::info!("Loaded ROM: {}", rom_path.display());
            nes
        }
        Err(e) => {
            eprintln!("Failed to load ROM: {e}");
            process::exit(1);
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    let cli = parse_args();

    let mut logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.trace {
        logger.filter_level(log::LevelFilter::Trace);
    }
    logger.init();

    let mut nes = make_nes(&cli);

    let mut error = None;
    for frame in 0..cli.frames {
        if let Err(e) = nes.run_frame() {
            log::error!("Stopped in frame {frame}: {e}");
            error = Some(e.to_string());
            break;
        }
    }

    let failed = error.is_some();
    print_report(&build_report(&cli, &nes, error), cli.json);
    if failed {
        process::exit(1);
    }
}
