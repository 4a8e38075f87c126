use clap::Parser;

use fieldmatch::logging::{init_logging, LogConfig, LogFormat};
use fieldmatch::{load_settings, EngineSettings, FieldMatch};

mod cli;
mod commands;

use crate::cli::{Cli, Command, LogFormatArg};
use crate::commands::CommandError;

fn main() {
    let cli = Cli::parse();

    let log_config = LogConfig::from_verbosity(cli.verbose)
        .with_format(match cli.log_format {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Compact => LogFormat::Compact,
            LogFormatArg::Json => LogFormat::Json,
        })
        .with_log_file(cli.log_file.clone());
    if let Err(error) = init_logging(&log_config) {
        eprintln!("error: failed to initialize logging: {error}");
        std::process::exit(1);
    }

    if let Err(error) = run(cli) {
        tracing::error!(%error, "Command failed");
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CommandError> {
    let mut settings = match &cli.settings {
        Some(path) => load_settings(path)?,
        None => EngineSettings::default(),
    };
    if let Some(database) = cli.database {
        settings.database_path = Some(database);
    }

    let app = FieldMatch::open(settings)?;

    match cli.command {
        Command::ApplyConfig { file } => commands::apply_config(&app, &file),
        Command::ListConfigs(args) => commands::list_configs(&app, &args),
        Command::DeactivateConfig { id } => commands::deactivate_config(&app, &id),
        Command::ApplyTemplate { file } => commands::apply_template(&app, &file),
        Command::CreateInstance(args) => commands::create_instance(&app, &args),
        Command::ImportDocuments { file } => commands::import_documents(&app, &file),
        Command::Resolve(args) => commands::resolve(&app, &args),
        Command::Match(args) => commands::run_match(&app, &args, false),
        Command::Preview(args) => commands::run_match(&app, &args, true),
        Command::Rows(args) => commands::rows(&app, &args),
        Command::MarkExported { instance } => commands::mark_exported(&app, &instance),
    }
}
