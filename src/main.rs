use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

use publine::cli::{Cli, Command};
use publine::config::Config;

fn main() -> ExitCode {
    if let Err(err) = try_main() {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn try_main() -> anyhow::Result<()> {
    publine::logging::init().context("init logging")?;

    let cli = Cli::parse();
    tracing::debug!(?cli, "parsed cli");
    let config = Config::from_env().with_home(cli.home.as_deref());

    match cli.command {
        Command::Init(args) => {
            publine::project::run_init(&config, args).context("init")?;
        }
        Command::Project { command } => {
            publine::project::run(&config, command).context("project")?;
        }
        Command::Chapter { command } => {
            publine::chapters::run(&config, command).context("chapter")?;
        }
        Command::Layout { command } => {
            publine::layout::run(&config, command).context("layout")?;
        }
        Command::Publish(args) => {
            publine::publish::run(&config, args).context("publish")?;
        }
    }

    Ok(())
}
