use clap::Parser;
use etfrotator::cli::{Cli, run};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
