use std::process::ExitCode;

use clap::Parser;

fn main() -> ExitCode {
    let cli = blue_kasa::cli::Cli::parse();

    match blue_kasa::run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
