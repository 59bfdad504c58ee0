//! CLI entry point for the PIO emulator.

use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

use pio_core::{ClockMode, Emulator, EmulatorConfig, Program, GPIO_COUNT, PIO_BLOCKS, SM_COUNT};
use pio_server::{Server, DEFAULT_PORT};
#[cfg(test)]
use tempfile as _;
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE_TEXT: &str = "\
Usage: pio-emu <command> [options]

Commands:
  serve [--port <n>] [--frequency <n>]  Run the TCP register server
  run <program> [options]               Load a program, step it and print the pins

Run options:
  --pio <n>              PIO block (default 0)
  --sm <n>               State machine (default 0)
  --cycles <n>           Cycles to step (default 64)
  --pins <base>:<count>  Pins handed to the block for SET/OUT/side-set (default 0:1)

Options:
  -h, --help             Show this help message

Logging is controlled by RUST_LOG (e.g. RUST_LOG=pio_core=debug).

Examples:
  pio-emu serve --port 2040
  pio-emu serve --frequency 0
  pio-emu run blink.hex --pins 25:1 --cycles 200
";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Serve(ServeArgs),
    Run(RunArgs),
}

#[derive(Debug, PartialEq, Eq)]
struct ServeArgs {
    port: u16,
    frequency: Option<u32>,
}

#[derive(Debug, PartialEq, Eq)]
struct RunArgs {
    program: PathBuf,
    pio: usize,
    sm: usize,
    cycles: u64,
    pin_base: u8,
    pin_count: u8,
}

#[derive(Debug)]
enum ParseResult {
    Command(Command),
    Help,
}

fn parse_args(mut args: impl Iterator<Item = OsString>) -> Result<ParseResult, String> {
    let first = args.next().ok_or_else(|| "missing command".to_string())?;

    if first == "--help" || first == "-h" {
        return Ok(ParseResult::Help);
    }

    match first.to_string_lossy().as_ref() {
        "serve" => parse_serve_args(args)
            .map(Command::Serve)
            .map(ParseResult::Command),
        "run" => parse_run_args(args)
            .map(Command::Run)
            .map(ParseResult::Command),
        other => Err(format!("unknown command: {other}")),
    }
}

fn option_value(args: &mut impl Iterator<Item = OsString>, name: &str) -> Result<String, String> {
    args.next()
        .map(|value| value.to_string_lossy().into_owned())
        .ok_or_else(|| format!("missing value for {name}"))
}

fn parse_number<T: std::str::FromStr>(text: &str, name: &str) -> Result<T, String> {
    text.parse()
        .map_err(|_| format!("invalid value for {name}: {text}"))
}

#[allow(clippy::while_let_on_iterator)]
fn parse_serve_args(mut args: impl Iterator<Item = OsString>) -> Result<ServeArgs, String> {
    let mut port = DEFAULT_PORT;
    let mut frequency = None;

    while let Some(arg) = args.next() {
        if arg == "--help" || arg == "-h" {
            return Err(USAGE_TEXT.to_string());
        }
        if arg == "--port" {
            port = parse_number(&option_value(&mut args, "--port")?, "--port")?;
            continue;
        }
        if arg == "--frequency" {
            let value = option_value(&mut args, "--frequency")?;
            frequency = Some(parse_number(&value, "--frequency")?);
            continue;
        }
        return Err(format!("unknown option: {}", arg.to_string_lossy()));
    }

    Ok(ServeArgs { port, frequency })
}

fn parse_pins(text: &str) -> Result<(u8, u8), String> {
    let (base, count) = text
        .split_once(':')
        .ok_or_else(|| format!("expected <base>:<count>, got {text}"))?;
    let base: u8 = parse_number(base, "--pins")?;
    let count: u8 = parse_number(count, "--pins")?;
    if usize::from(base) >= GPIO_COUNT || count == 0 || usize::from(count) > GPIO_COUNT {
        return Err(format!("pin range out of bounds: {text}"));
    }
    Ok((base, count))
}

#[allow(clippy::while_let_on_iterator)]
fn parse_run_args(mut args: impl Iterator<Item = OsString>) -> Result<RunArgs, String> {
    let mut program: Option<PathBuf> = None;
    let mut pio = 0;
    let mut sm = 0;
    let mut cycles = 64;
    let mut pins = (0, 1);

    while let Some(arg) = args.next() {
        if arg == "--help" || arg == "-h" {
            return Err(USAGE_TEXT.to_string());
        }
        if arg == "--pio" {
            pio = parse_number(&option_value(&mut args, "--pio")?, "--pio")?;
            if pio >= PIO_BLOCKS {
                return Err(format!("--pio must be below {PIO_BLOCKS}"));
            }
            continue;
        }
        if arg == "--sm" {
            sm = parse_number(&option_value(&mut args, "--sm")?, "--sm")?;
            if sm >= SM_COUNT {
                return Err(format!("--sm must be below {SM_COUNT}"));
            }
            continue;
        }
        if arg == "--cycles" {
            cycles = parse_number(&option_value(&mut args, "--cycles")?, "--cycles")?;
            continue;
        }
        if arg == "--pins" {
            pins = parse_pins(&option_value(&mut args, "--pins")?)?;
            continue;
        }
        if arg.to_string_lossy().starts_with('-') {
            return Err(format!("unknown option: {}", arg.to_string_lossy()));
        }
        if program.is_some() {
            return Err("multiple program paths provided".to_string());
        }
        program = Some(PathBuf::from(arg));
    }

    let program = program.ok_or_else(|| "missing program path".to_string())?;
    Ok(RunArgs {
        program,
        pio,
        sm,
        cycles,
        pin_base: pins.0,
        pin_count: pins.1,
    })
}

fn run_serve(args: &ServeArgs) -> Result<(), i32> {
    let mut config = EmulatorConfig::default();
    if let Some(frequency) = args.frequency {
        config.clock_mode = ClockMode::TargetFrequency;
        config.frequency = frequency;
    }
    let mut emulator = Emulator::new(config);
    if let Err(e) = emulator.start() {
        eprintln!("error: failed to start the clock: {e}");
        return Err(1);
    }
    let server = match Server::bind(("127.0.0.1", args.port), emulator.address_space()) {
        Ok(server) => server,
        Err(e) => {
            eprintln!("error: cannot bind port {}: {e}", args.port);
            return Err(1);
        }
    };
    info!(mode = ?config.clock_mode, frequency = config.frequency, "emulator started");
    if let Err(e) = server.run() {
        eprintln!("error: server stopped: {e}");
        return Err(1);
    }
    Ok(())
}

fn run_program(args: &RunArgs) -> Result<(), i32> {
    let program = match Program::load_file(&args.program) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("{}: error: {e}", args.program.display());
            return Err(1);
        }
    };

    let emulator = Emulator::default();
    if let Err(e) = emulator.load_program(args.pio, &program) {
        eprintln!("{}: error: {e}", args.program.display());
        return Err(1);
    }
    let layout = {
        let mut chip = emulator.peripherals().lock();
        let prepared = chip
            .prepare_state_machine(args.pio, args.sm, &program)
            .and_then(|()| {
                chip.route_pins(args.pio, usize::from(args.pin_base), usize::from(args.pin_count))
            });
        if let Err(e) = prepared {
            eprintln!("error: {e}");
            return Err(1);
        }
        let config = chip.pio[args.pio].sm_mut(args.sm).config_mut();
        config.set_base = args.pin_base;
        config.set_count = args.pin_count.min(5);
        config.out_base = args.pin_base;
        config.out_count = args.pin_count;
        config.sideset_base = args.pin_base;
        let layout = config.side_set_layout();
        let enabled = chip.pio[args.pio].enabled_mask() | (1 << args.sm);
        chip.pio[args.pio].set_enabled_mask(enabled);
        layout
    };

    print!("{}", program.listing(layout));
    emulator.step(args.cycles);

    let chip = emulator.peripherals().lock();
    let sm = chip.pio[args.pio].sm(args.sm);
    println!();
    println!(
        "after {} cycles: pc={} x={:#010x} y={:#010x}",
        emulator.clock().wall_clock(),
        sm.registers().pc,
        sm.registers().x,
        sm.registers().y
    );
    println!("{}", chip.gpio.render_pins());
    for collected in chip.pio[args.pio].decode_errors() {
        eprintln!(
            "warning: sm{} at {}: {}",
            collected.sm, collected.pc, collected.error
        );
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let exit_code = match parse_args(env::args_os().skip(1)) {
        Ok(ParseResult::Help) => {
            println!("{USAGE_TEXT}");
            0
        }
        Ok(ParseResult::Command(Command::Serve(args))) => match run_serve(&args) {
            Ok(()) => 0,
            Err(code) => code,
        },
        Ok(ParseResult::Command(Command::Run(args))) => match run_program(&args) {
            Ok(()) => 0,
            Err(code) => code,
        },
        Err(error) => {
            if error.starts_with("Usage:") {
                println!("{error}");
            } else {
                eprintln!("error: {error}");
                eprintln!("{USAGE_TEXT}");
            }
            1
        }
    };

    std::process::exit(exit_code);
}
