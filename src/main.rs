//! Heap driver
//!
//! Runs a script of allocations and releases against the allocator and
//! prints the resulting block chain.
//!
//! ```text
//! fitalloc --mode best-fit a8 a64 a8 a16 f3 f1 a16 a16
//! ```
//!
//! `a<N>` allocates N bytes, `f<I>` releases the I-th allocation of the
//! script (counting from 0).

use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::Parser;
use fitalloc::{Allocator, AllocatorConfig, Backend, HeapMemory, Payload, SearchMode};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "fitalloc")]
#[command(about = "Run an allocation script against the heap allocator")]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Placement strategy (first-fit, next-fit, best-fit, free-list, segregated-fit)
    #[arg(short, long)]
    mode: Option<SearchMode>,

    /// Print the chain after every step
    #[arg(short, long)]
    verbose: bool,

    /// Operations: `a<N>` allocates N bytes, `f<I>` releases allocation I
    ops: Vec<String>,
}

enum Op {
    Allocate(usize),
    Release(usize),
}

fn parse_op(op: &str) -> anyhow::Result<Op> {
    let mut chars = op.chars();
    let kind = chars.next();
    let arg: usize = chars
        .as_str()
        .parse()
        .with_context(|| format!("invalid operation `{op}`"))?;

    match kind {
        Some('a') => Ok(Op::Allocate(arg)),
        Some('f') => Ok(Op::Release(arg)),
        _ => bail!("invalid operation `{op}`: expected a<N> or f<I>"),
    }
}

fn run<H: HeapMemory>(mut allocator: Allocator<H>, ops: &[Op], verbose: bool) -> anyhow::Result<()> {
    let mut allocations: Vec<Option<Payload>> = Vec::new();

    for op in ops {
        match *op {
            Op::Allocate(size) => {
                let payload = allocator.allocate(size)?;
                println!(
                    "alloc({size}) -> #{} at offset {}",
                    allocations.len(),
                    allocator.header_of(payload).offset()
                );
                allocations.push(Some(payload));
            }
            Op::Release(index) => {
                let Some(payload) = allocations.get_mut(index).and_then(Option::take) else {
                    bail!("allocation #{index} does not exist or was already released");
                };
                allocator.release(payload);
                println!("free(#{index})");
            }
        }

        if verbose {
            println!("  {}", allocator.layout());
        }
    }

    println!("{}", allocator.layout());
    println!("{}", allocator.stats());

    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => AllocatorConfig::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => AllocatorConfig::default(),
    };

    if let Some(mode) = args.mode {
        config.mode = mode;
    }

    let ops = args
        .ops
        .iter()
        .map(|op| parse_op(op))
        .collect::<anyhow::Result<Vec<_>>>()?;

    info!("Running {} operations with {} on the {:?} heap", ops.len(), config.mode, config.backend);

    match config.backend {
        Backend::System => run(Allocator::system(&config)?, &ops, args.verbose),
        Backend::Arena => run(Allocator::arena(&config)?, &ops, args.verbose),
    }
}
