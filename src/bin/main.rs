use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use emulator::console::TerminalConsole;
use emulator::image::Image;
use emulator::vm::{Vm, PC_START};

/// Run LC-3 program images
#[derive(Parser)]
#[command(version, override_usage = "lc3 [image-file1] ...")]
struct Args {
  /// Images to load, in order; later images overwrite earlier ones
  images: Vec<PathBuf>,

  /// Address to start executing at, hex (`0x3000`) or decimal
  #[arg(long, default_value_t = PC_START, value_parser = parse_address)]
  entry: u16,

  /// More logging on stderr, repeat for more
  #[arg(short, long, action = clap::ArgAction::Count)]
  verbose: u8,
}

fn parse_address(text: &str) -> Result<u16, String> {
  let parsed = match ["0x", "0X", "x", "X"]
    .iter()
    .find_map(|prefix| text.strip_prefix(prefix))
  {
    Some(hex) => u16::from_str_radix(hex, 16),
    None => text.parse(),
  };
  parsed.map_err(|err| format!("`{text}` is not a 16-bit address: {err}"))
}

fn level(verbose: u8) -> log::LevelFilter {
  match verbose {
    0 => log::LevelFilter::Warn,
    1 => log::LevelFilter::Info,
    2 => log::LevelFilter::Debug,
    _ => log::LevelFilter::Trace,
  }
}

fn run(args: Args) -> anyhow::Result<()> {
  let mut vm = Vm::new();
  for path in &args.images {
    let image = Image::open(path)
      .with_context(|| format!("failed to load image: {}", path.display()))?;
    vm.load(&image);
  }
  log::info!("loaded {} image(s)", args.images.len());

  vm.boot(args.entry);
  let mut console = TerminalConsole::enter().context("could not set up the terminal")?;
  let result = vm.run(&mut console);
  // restore the terminal before anything is reported
  drop(console);
  result.context("execution stopped")
}

fn main() -> ExitCode {
  let args = Args::parse();
  if args.images.is_empty() {
    println!("lc3 [image-file1] ...");
    return ExitCode::SUCCESS;
  }

  if let Err(err) = simple_logger::SimpleLogger::new()
    .with_level(level(args.verbose))
    .init()
  {
    eprintln!("logging unavailable: {err}");
  }

  match run(args) {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      eprintln!("{err:#}");
      ExitCode::FAILURE
    }
  }
}
