//! Command-line arguments for the `fieldmatch` binary.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use fieldmatch::template::RowStatus;
use fieldmatch::{ConflictPolicy, MatchOptions};

#[derive(Parser)]
#[command(
    name = "fieldmatch",
    version,
    about = "Map extracted document fields onto template rows",
    long_about = "Resolve GLOBAL/COMPANY/FORMAT mapping configurations and match \
                  extracted documents into rows of a template instance.\n\n\
                  Results are printed to stdout as JSON; logs go to stderr."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Engine settings file (YAML or JSON).
    #[arg(long, value_name = "FILE", global = true)]
    pub settings: Option<PathBuf>,

    /// SQLite database path (overrides the settings file).
    #[arg(long, value_name = "FILE", global = true)]
    pub database: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(long = "log-format", value_enum, default_value = "pretty", global = true)]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create or update mapping configurations from a YAML/JSON file.
    ApplyConfig {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// List mapping configurations.
    ListConfigs(ListConfigsArgs),

    /// Deactivate a mapping configuration.
    DeactivateConfig {
        #[arg(value_name = "ID")]
        id: String,
    },

    /// Create or replace a template from a YAML/JSON file.
    ApplyTemplate {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Create a DRAFT template instance.
    CreateInstance(CreateInstanceArgs),

    /// Import extracted documents from a YAML/JSON file.
    ImportDocuments {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Show the effective mapping rules for a template.
    Resolve(ResolveArgs),

    /// Match documents into a template instance.
    Match(MatchArgs),

    /// Run a match without writing anything.
    Preview(MatchArgs),

    /// List rows of a template instance.
    Rows(RowsArgs),

    /// Mark a COMPLETED instance as EXPORTED.
    MarkExported {
        #[arg(long = "instance", value_name = "ID")]
        instance: String,
    },
}

#[derive(Args)]
pub struct ListConfigsArgs {
    #[arg(long = "template", value_name = "ID")]
    pub template: Option<String>,

    #[arg(long = "company", value_name = "ID")]
    pub company: Option<String>,

    #[arg(long = "format", value_name = "ID")]
    pub format: Option<String>,

    /// Include deactivated configurations.
    #[arg(long = "all")]
    pub all: bool,
}

#[derive(Args)]
pub struct CreateInstanceArgs {
    #[arg(long = "template", value_name = "ID")]
    pub template: String,

    #[arg(long = "name")]
    pub name: String,

    /// Default company for runs on this instance.
    #[arg(long = "company", value_name = "ID")]
    pub company: Option<String>,

    /// Default document format for runs on this instance.
    #[arg(long = "format", value_name = "ID")]
    pub format: Option<String>,
}

#[derive(Args)]
pub struct ResolveArgs {
    #[arg(long = "template", value_name = "ID")]
    pub template: String,

    #[arg(long = "company", value_name = "ID")]
    pub company: Option<String>,

    #[arg(long = "format", value_name = "ID")]
    pub format: Option<String>,
}

#[derive(Args)]
pub struct MatchArgs {
    #[arg(long = "instance", value_name = "ID")]
    pub instance: String,

    /// Document IDs, processed in the given order.
    #[arg(value_name = "DOCUMENT_ID", required = true)]
    pub documents: Vec<String>,

    #[arg(long = "batch-size")]
    pub batch_size: Option<usize>,

    #[arg(long = "row-key-field", value_name = "FIELD")]
    pub row_key_field: Option<String>,

    #[arg(long = "company", value_name = "ID")]
    pub company: Option<String>,

    #[arg(long = "format", value_name = "ID")]
    pub format: Option<String>,

    #[arg(long = "workers")]
    pub workers: Option<usize>,

    #[arg(long = "conflict-policy", value_enum)]
    pub conflict_policy: Option<ConflictPolicyArg>,

    /// Log progress events while the run proceeds.
    #[arg(long = "progress")]
    pub progress: bool,
}

impl MatchArgs {
    pub fn options(&self) -> MatchOptions {
        MatchOptions {
            batch_size: self.batch_size,
            row_key_field: self.row_key_field.clone(),
            company_id: self.company.clone(),
            format_id: self.format.clone(),
            worker_count: self.workers,
            conflict_policy: self.conflict_policy.map(ConflictPolicy::from),
        }
    }
}

#[derive(Args)]
pub struct RowsArgs {
    #[arg(long = "instance", value_name = "ID")]
    pub instance: String,

    #[arg(long = "status", value_enum)]
    pub status: Option<RowStatusArg>,

    #[arg(long = "limit", default_value_t = 100)]
    pub limit: u64,

    #[arg(long = "offset", default_value_t = 0)]
    pub offset: u64,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ConflictPolicyArg {
    LastWriteWins,
    KeepFirst,
    FlagForReview,
}

impl From<ConflictPolicyArg> for ConflictPolicy {
    fn from(arg: ConflictPolicyArg) -> Self {
        match arg {
            ConflictPolicyArg::LastWriteWins => ConflictPolicy::LastWriteWins,
            ConflictPolicyArg::KeepFirst => ConflictPolicy::KeepFirst,
            ConflictPolicyArg::FlagForReview => ConflictPolicy::FlagForReview,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum RowStatusArg {
    Pending,
    Valid,
    Invalid,
    Skipped,
}

impl From<RowStatusArg> for RowStatus {
    fn from(arg: RowStatusArg) -> Self {
        match arg {
            RowStatusArg::Pending => RowStatus::Pending,
            RowStatusArg::Valid => RowStatus::Valid,
            RowStatusArg::Invalid => RowStatus::Invalid,
            RowStatusArg::Skipped => RowStatus::Skipped,
        }
    }
}
