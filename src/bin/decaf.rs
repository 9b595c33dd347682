//! The command-line front-end for the symbolic executor.
//!
//! Takes the path to a textual IR file and the name of a function in it,
//! and symbolically executes that function to exhaustion. Discovered
//! assertion failures are printed to standard output with the concrete
//! inputs that reproduce them; the exit code stays zero, as finding
//! failures is this program doing its job. File-level and lookup errors
//! exit non-zero.

use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use anyhow::{anyhow, Context as _};
use clap::Parser;
use decaf::{
    ir::parser::parse_module,
    sink::PrintingSink,
    vm::{execute_symbolic_configured, Config},
    watchdog::FlagWatchdog,
};

#[derive(Debug, Parser)]
#[command(name = "decaf")]
#[command(about = "Symbolic executor for a small typed SSA IR")]
struct Args {
    /// Path to a textual IR file.
    input: PathBuf,

    /// Name of the function within the IR file to execute.
    function: String,

    /// Per-query solver timeout in milliseconds.
    #[arg(long)]
    solver_timeout_ms: Option<u32>,

    /// Prune paths on which the solver answers `unknown` instead of
    /// exploring them.
    #[arg(long, default_value_t = false)]
    prune_unknown: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || {
            stop.store(true, Ordering::Relaxed);
        })?;
    }

    let source = std::fs::read_to_string(&args.input)
        .with_context(|| format!("Could not read {}", args.input.display()))?;
    let module = parse_module(&source)
        .map_err(|error| anyhow!("{}: {error}", args.input.display()))?;
    let function = module
        .function(&args.function)
        .ok_or_else(|| anyhow!("No function '@{}' in {}", args.function, args.input.display()))?;

    let mut config = Config::default().with_explore_unknown(!args.prune_unknown);
    if let Some(timeout) = args.solver_timeout_ms {
        config = config.with_solver_timeout_ms(timeout);
    }

    let summary = execute_symbolic_configured(
        function,
        &PrintingSink,
        config,
        FlagWatchdog::new(stop).in_rc(),
    );

    // Abandoned paths mean partial coverage, which the user should know
    // about, but the run itself still succeeded.
    if !summary.errors.is_empty() {
        eprintln!("{}", summary.errors);
    }
    log::info!(
        "Explored {} contexts ({} completed)",
        summary.contexts_explored,
        summary.contexts_completed
    );

    Ok(())
}
