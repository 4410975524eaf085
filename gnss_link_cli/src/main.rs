use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use gnss_link::{Command, CommandController};
use tracing::{error, info};

mod cli;
mod logging;

use cli::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::initialize(cli.debug);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        },
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = cli.serial_config()?;
    info!(port = %config.path, baud = config.baud_rate, "using receiver");
    let mut controller = CommandController::new(config);

    if cli.time {
        let record = controller
            .poll_time(cli.retry_policy())
            .context("polling UTC time failed")?;
        match record {
            Some(record) => match record.to_datetime() {
                Ok(datetime) => println!("{datetime} UTC"),
                Err(e) => println!("{record:?} ({e})"),
            },
            None => println!("receiver has no valid UTC time yet"),
        }
        return Ok(());
    }

    let name = cli.command.as_deref().context("no command given")?;
    let command = Command::parse(name, &cli.args)?;
    let replies = controller
        .with_session(|exchange| {
            let mut replies = vec![exchange.execute(&command, cli.retry_policy())?];
            if cli.store {
                replies.push(exchange.execute(&Command::SaveConfig, cli.retry_policy())?);
            }
            Ok(replies)
        })
        .with_context(|| format!("{command} failed"))?;

    for reply in replies {
        info!(attempts = reply.attempts, "{}", reply.line);
        println!("{}", reply.line);
    }
    Ok(())
}
