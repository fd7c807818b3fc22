mod bodies;
mod cli;
mod run;
mod sim;

use std::io;

use anyhow::Result;
use cli::Command;
use democonfig::run_config_command;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    match cli.command {
        Some(Command::Config(config_cmd)) => {
            let mut stdout = io::stdout().lock();
            run_config_command(&config_cmd.action, cli.config.as_deref(), &mut stdout)?;
            Ok(())
        }
        None => run::run(cli.run, cli.config),
    }
}
