use std::path;

use clap::Parser;
use cpu::CtrlUnit;
use log::info;
use mem::Sram;
use rcp::FixedRcp;

mod alu;
mod cpu;
mod decode;
mod error;
mod inst;
mod logger;
mod mem;
mod program;
mod rcp;
mod reg;

#[derive(Parser, Debug)]
#[command(version, about, long_about)]
struct Args {
    /// Path to the program image (raw binary, or a .hex/.txt listing)
    #[arg(short, long)]
    input: String,

    /// Cycle budget before the run is declared hung
    #[arg(short, long, default_value_t = 1_000_000)]
    max_cycles: u64,

    /// Data memory size in bytes, must be a power of two
    #[arg(long, default_value_t = 1 << 20)]
    mem_size: usize,

    /// Trace every retired instruction
    #[arg(short, long)]
    debug: bool,
}

fn main() {
    let args = Args::parse();
    logger::init(args.debug);

    let file_path = path::PathBuf::from(&args.input);
    info!("Loading program: {file_path:?}");

    let words = program::read(&file_path).expect("Fail to load program image");

    let mut core = CtrlUnit::new(Sram::new(args.mem_size), FixedRcp);
    core.load_program(&words);

    let value = core
        .run(args.max_cycles)
        .expect("Failed to execute the program");

    println!("interrupt exit: {value} ({value:#010x})");
}
