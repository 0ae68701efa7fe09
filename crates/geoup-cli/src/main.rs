use clap::Parser;

mod cli;

use crate::cli::Cli;

fn main() {
    let cli = Cli::parse();
    if let Err(failure) = cli.execute() {
        eprintln!("{}", failure.report(cli.stack_trace));
        std::process::exit(1);
    }
}
