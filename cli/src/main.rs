use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dotrender::cli::{Cli, Command};
use dotrender::{commands, logging};

fn main() -> Result<()> {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = Cli::parse();
    logging::init_subscriber(args.verbose, args.command.name());
    let log = Arc::new(logging::Logger::new(args.command.name()));

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        log.debug(&format!("Ctrl-C handler not installed: {e}"));
    }

    match &args.command {
        Command::Apply(opts) => commands::apply::run(&args.global, opts, &log, interrupted),
        Command::Diff(opts) => commands::diff::run(&args.global, opts, &log),
        Command::ExecuteTemplate(opts) => {
            commands::execute_template::run(&args.global, opts, &log)
        }
        Command::Data => commands::data::run(&args.global, &log),
        Command::Managed => commands::managed::run(&args.global, &log),
        Command::Version => commands::version::run(),
    }
}
