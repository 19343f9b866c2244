use clap::Parser;
use std::process::ExitCode;
use tandem::cli::{Cli, Command};
use tandem::demo::{self, Sink};
use tandem::executor::CancelToken;

fn run(cli: &Cli) -> tandem::Result<()> {
    let pool_config = cli.pool_config()?;
    let demo_config = cli.demo_config()?;
    let sink = Sink::Stdout;

    for command in cli.commands() {
        tracing::info!(?command, "running demo");
        match command {
            Command::Threads => demo::run_raw_threads(&demo_config, &CancelToken::new(), &sink)?,
            Command::Pool => {
                demo::run_pool_futures(&pool_config, &demo_config, &sink)?;
            }
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    tandem::log::init(cli.verbose(), cli.debug());

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
