use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;
use miette::{bail, IntoDiagnostic, Result};

use casm::output::Output;
use casm::{Fault, Machine, Region};

/// Casm loads line-oriented assembly programs into a small virtual machine and runs them.
#[derive(Parser)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Quickly provide a `.casm` file to run
    path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Load a program, run it until it halts or fails and print the machine state
    Run {
        /// Program file, one instruction per line
        name: PathBuf,
        /// Produce minimal output, suited for blackbox tests
        #[arg(short, long)]
        minimal: bool,
        /// Print every executed line, its tokens and its effects
        #[arg(short, long)]
        trace: bool,
        /// Pre-set a memory cell after loading, e.g. `--set 0x50=28`
        #[arg(short, long, value_name = "ADDR=VALUE", value_parser = parse_preset)]
        set: Vec<(i64, String)>,
    },
    /// Check labels and tokens of program files without running them
    Check {
        /// Files or glob patterns to check
        #[arg(required = true)]
        patterns: Vec<String>,
    },
}

fn main() -> miette::Result<()> {
    use MsgColor::*;
    let args = Args::parse();
    casm::env::init();

    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new() //
                .context_lines(casm::DIAGNOSTIC_CONTEXT_LINES)
                .build(),
        )
    }))?;

    match args.command {
        Some(Command::Run {
            name,
            minimal,
            trace,
            set,
        }) => run(&name, minimal, trace, &set),
        Some(Command::Check { patterns }) => {
            let mut checked = 0;
            let mut failed = 0;
            for pattern in &patterns {
                for entry in glob::glob(pattern).into_diagnostic()? {
                    let path = entry.into_diagnostic()?;
                    checked += 1;
                    let contents = fs::read_to_string(&path).into_diagnostic()?;
                    let lines: Vec<&str> = contents.lines().collect();
                    match casm::check(&lines) {
                        Ok(count) => {
                            file_message(Green, "Checked", &path);
                            let summary = format!("{count} lines, no errors found");
                            message(Cyan, "Success", summary.as_str());
                        }
                        Err(fault) => {
                            failed += 1;
                            file_message(Red, "Failed", &path);
                            print_location(&fault);
                            eprintln!("{:?}", fault.report());
                        }
                    }
                }
            }
            if checked == 0 {
                bail!("No files matched {}", patterns.join(" "));
            }
            if failed > 0 {
                bail!("{failed} of {checked} files failed the check");
            }
            Ok(())
        }
        None => {
            if let Some(path) = args.path {
                run(&path, false, false, &[])
            } else {
                println!("\n~ casm v{VERSION} ~");
                println!("{}", LOGO.truecolor(120, 190, 255).bold());
                println!("{SHORT_INFO}");
                std::process::exit(0);
            }
        }
    }
}

#[allow(unused)]
enum MsgColor {
    Green,
    Cyan,
    Red,
}

fn file_message(color: MsgColor, left: &str, right: &Path) {
    let right = format!("target {}", right.display());
    message(color, left, right.as_str());
}

fn message<S>(color: MsgColor, left: S, right: S)
where
    S: Colorize + std::fmt::Display,
{
    let left = match color {
        MsgColor::Green => left.green(),
        MsgColor::Cyan => left.cyan(),
        MsgColor::Red => left.red(),
    };
    println!("{left:>12} {right}");
}

fn print_location(fault: &Fault) {
    match &fault.line {
        Some(line) => eprintln!("Error on line 0x{:02x}: {line}", fault.addr),
        None => eprintln!("Error while loading program"),
    }
}

fn run(name: &Path, minimal: bool, trace: bool, presets: &[(i64, String)]) -> Result<()> {
    Output::set_minimal(minimal || casm::env::is_minimal_forced());
    Output::set_trace(trace || casm::env::is_trace_enabled());

    file_message(MsgColor::Green, "Loading", name);
    let contents = fs::read_to_string(name).into_diagnostic()?;
    let lines: Vec<&str> = contents.lines().collect();

    let mut machine = Machine::new();
    machine.load(&lines)?;
    for (addr, value) in presets {
        machine.set_memory(*addr, value.as_str())?;
    }

    message(MsgColor::Green, "Running", "loaded program");
    let halted = machine.run();

    Output::Normal.print_registers(machine.state());
    Output::Normal.print_cells(machine.state(), Region::Memory);
    Output::Normal.print_cells(machine.state(), Region::Storage);

    if halted {
        file_message(MsgColor::Green, "Halted", name);
        return Ok(());
    }
    file_message(MsgColor::Red, "Failed", name);
    match machine.fault() {
        Some(fault) => {
            print_location(&fault);
            Err(fault.report())
        }
        None => bail!("Program stopped without halting"),
    }
}

/// Parse `ADDR=VALUE`, where the address is decimal or `0x` hexadecimal.
fn parse_preset(arg: &str) -> Result<(i64, String), String> {
    let (addr, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected ADDR=VALUE, found `{arg}`"))?;
    let addr = addr.trim();
    let parsed = match addr.strip_prefix("0x").or_else(|| addr.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16),
        None => addr.parse(),
    };
    let addr = parsed.map_err(|err| format!("invalid address `{addr}`: {err}"))?;
    Ok((addr, value.to_string()))
}

const LOGO: &str = r#"
  ___ __ _ ____ __
 / __/ _` (_-< '  \
 \__\__,_/__/_|_|_|"#;

const SHORT_INFO: &str = r"
Welcome to casm, a virtual machine for line-oriented assembly programs
with registers, word-addressed memory and storage.
Please use `-h` or `--help` to access the usage instructions and documentation.
";

const VERSION: &str = env!("CARGO_PKG_VERSION");
