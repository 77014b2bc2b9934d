//! rudo: a command line task manager with recurring and repeating tasks.

use anyhow::{Context, Result};
use clap::Parser;
use rudo::cli::export::run_export;
use rudo::cli::{Cli, Command, ReportArgs};
use rudo::config::{Config, ConfigLoader};
use rudo::db::Database;
use rudo::logging::{self, LogTarget};
use rudo::model::task::RecurrenceType;
use rudo::report::{self, Report};
use rudo::services::TaskService;
use std::process::ExitCode;
use tracing::{debug, error};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let loader = ConfigLoader::load(cli.config.as_deref());
    let level = loader
        .as_ref()
        .map(|loader| loader.config().log.level.clone())
        .unwrap_or_else(|_| "info".to_string());
    let target = cli.log.parse().unwrap_or(LogTarget::Stderr);
    if let Err(err) = logging::init(cli.verbose, &target, &level) {
        eprintln!("Failed to initialise logging: {:#}", err);
    }

    let result = loader
        .context("Failed to load configuration")
        .and_then(|loader| {
            for (tier, path) in loader.sources() {
                debug!(?tier, path = %path.display(), "loaded config");
            }
            run(cli.command, loader.into_config())
        });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command, config: Config) -> Result<()> {
    config
        .ensure_db_dir()
        .with_context(|| format!("Failed to create {}", config.db_path().display()))?;
    let db = Database::open(config.db_path())?;
    let service = TaskService::new(db, config);

    match command {
        Command::Add { args } => {
            service.add(&args)?;
        }
        Command::Do(args) => {
            service.do_tasks(&args.filter, &args.close_date, args.parent)?;
        }
        Command::Rm(args) => {
            service.rm_tasks(&args.filter, &args.close_date, args.parent)?;
        }
        Command::Mod { id, args, parent } => {
            service.modify(&id, &args, parent)?;
        }
        Command::Freeze(args) => {
            service.freeze(&args.id, args.parent)?;
        }
        Command::Unfreeze(args) => {
            service.unfreeze(&args.id, args.parent)?;
        }
        Command::Open(args) => {
            print_report(report::open_report(service.db(), service.config())?, &args)?;
        }
        Command::Recurring(args) => {
            let report = report::recurrent_report(
                service.db(),
                service.config(),
                RecurrenceType::Recurring,
            )?;
            print_report(report, &args)?;
        }
        Command::Repeating(args) => {
            let report = report::recurrent_report(
                service.db(),
                service.config(),
                RecurrenceType::Repeating,
            )?;
            print_report(report, &args)?;
        }
        Command::Frozen(args) => {
            print_report(report::frozen_report(service.db(), service.config())?, &args)?;
        }
        Command::Projects(args) => {
            print_report(report::projects_report(service.db())?, &args)?;
        }
        Command::Tags(args) => {
            print_report(report::tags_report(service.db())?, &args)?;
        }
        Command::Export(args) => {
            run_export(service.db(), &args)?;
        }
    }
    Ok(())
}

fn print_report(report: Report, args: &ReportArgs) -> Result<()> {
    print!("{}", report.render(args.format)?);
    Ok(())
}
