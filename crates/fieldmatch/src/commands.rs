//! Command handlers. Each prints its result to stdout as JSON.

use std::path::{Path, PathBuf};
use std::thread;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use fieldmatch::db::DatabaseError;
use fieldmatch::mapping::MappingConfigFilter;
use fieldmatch::matching::{BroadcastProgress, NoopProgress, ProgressReporter};
use fieldmatch::template::{RowFilter, TemplateInstanceRow};
use fieldmatch::{
    CancellationToken, ConfigError, FieldMatch, MappingConfigInput, MatchError, MatchRequest,
    SourceDocument, StoreError, Template,
};

use crate::cli::{CreateInstanceArgs, ListConfigsArgs, MatchArgs, ResolveArgs, RowsArgs};

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse '{path}': {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Failed to write output: {0}")]
    Output(#[from] serde_json::Error),

    #[error(transparent)]
    Settings(#[from] ConfigError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Match(#[from] MatchError),

    #[error("Failed to install Ctrl-C handler: {0}")]
    Signal(#[from] ctrlc::Error),
}

/// A file holding either one item or a list of them.
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

/// Reads YAML or JSON (JSON parses as YAML).
fn read_file<T: DeserializeOwned>(path: &Path) -> Result<T, CommandError> {
    let content = std::fs::read_to_string(path).map_err(|source| CommandError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&content).map_err(|e| CommandError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CommandError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn apply_config(app: &FieldMatch, file: &Path) -> Result<(), CommandError> {
    let inputs = read_file::<OneOrMany<MappingConfigInput>>(file)?.into_vec();
    let mut applied = Vec::with_capacity(inputs.len());
    for input in inputs {
        applied.push(app.configs.apply(input)?);
    }
    info!(count = applied.len(), "Applied mapping configurations");
    print_json(&applied)
}

pub fn list_configs(app: &FieldMatch, args: &ListConfigsArgs) -> Result<(), CommandError> {
    let filter = MappingConfigFilter {
        template_id: args.template.clone(),
        company_id: args.company.clone(),
        format_id: args.format.clone(),
        is_active: (!args.all).then_some(true),
        ..Default::default()
    };
    print_json(&app.configs.list(&filter)?)
}

pub fn deactivate_config(app: &FieldMatch, id: &str) -> Result<(), CommandError> {
    app.configs.deactivate(id)?;
    print_json(&app.configs.get(id)?)
}

pub fn apply_template(app: &FieldMatch, file: &Path) -> Result<(), CommandError> {
    let template: Template = read_file(file)?;
    app.instances.save_template(&template)?;
    print_json(&template)
}

pub fn create_instance(app: &FieldMatch, args: &CreateInstanceArgs) -> Result<(), CommandError> {
    let instance = app.instances.create_instance(
        &args.template,
        &args.name,
        args.company.as_deref(),
        args.format.as_deref(),
    )?;
    print_json(&instance)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImportSummary {
    imported: usize,
}

pub fn import_documents(app: &FieldMatch, file: &Path) -> Result<(), CommandError> {
    let documents = read_file::<OneOrMany<SourceDocument>>(file)?.into_vec();
    let imported = app.documents.import(&documents)?;
    info!(imported, "Imported documents");
    print_json(&ImportSummary { imported })
}

pub fn resolve(app: &FieldMatch, args: &ResolveArgs) -> Result<(), CommandError> {
    let resolved = app.engine.resolve_mapping(
        &args.template,
        args.company.as_deref(),
        args.format.as_deref(),
    )?;
    print_json(resolved.as_ref())
}

/// Runs a match (or preview). Ctrl-C stops the run after the current batch.
pub fn run_match(app: &FieldMatch, args: &MatchArgs, preview: bool) -> Result<(), CommandError> {
    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        warn!("Interrupt received, stopping after the current batch");
        handler_token.cancel();
    })?;

    let run_id = Uuid::new_v4().to_string();
    let request = MatchRequest::new(&args.instance, args.documents.iter().cloned())
        .with_options(args.options())
        .with_run_id(&run_id);

    let result = if args.progress {
        let sender = BroadcastProgress::channel(256);
        let mut receiver = sender.subscribe();
        let listener = thread::spawn(move || {
            while let Ok(event) = receiver.blocking_recv() {
                info!(
                    phase = %event.phase,
                    processed = event.processed_documents,
                    total = event.total_documents,
                    "{}",
                    event.message
                );
            }
        });

        let progress = BroadcastProgress::new(sender, &run_id, &args.instance, args.documents.len());
        let result = execute(app, &request, preview, &progress, &cancel);
        // Dropping the last sender ends the listener loop
        drop(progress);
        if listener.join().is_err() {
            warn!("Progress listener panicked");
        }
        result
    } else {
        execute(app, &request, preview, &NoopProgress, &cancel)
    }?;

    print_json(&result)
}

fn execute(
    app: &FieldMatch,
    request: &MatchRequest,
    preview: bool,
    progress: &dyn ProgressReporter,
    cancel: &CancellationToken,
) -> Result<fieldmatch::MatchResult, MatchError> {
    if preview {
        app.engine.preview_match_with(request, progress, cancel)
    } else {
        app.engine.match_documents_with(request, progress, cancel)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RowPage {
    total: u64,
    rows: Vec<TemplateInstanceRow>,
}

pub fn rows(app: &FieldMatch, args: &RowsArgs) -> Result<(), CommandError> {
    let filter = RowFilter {
        status: args.status.map(Into::into),
        limit: Some(args.limit),
        offset: Some(args.offset),
    };
    let (rows, total) = app.instances.list_rows(&args.instance, &filter)?;
    print_json(&RowPage { total, rows })
}

pub fn mark_exported(app: &FieldMatch, instance_id: &str) -> Result<(), CommandError> {
    print_json(&app.instances.mark_exported(instance_id)?)
}
