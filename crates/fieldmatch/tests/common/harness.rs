//! Test harness for isolated engine execution.
//!
//! `TestHarness` owns a fully wired `FieldMatch` backed by an in-memory
//! database, or by a database file inside a temporary directory.

#![allow(dead_code)]

use std::path::PathBuf;

use tempfile::TempDir;

use fieldmatch::template::{RowFilter, TemplateInstance, TemplateInstanceRow};
use fieldmatch::{
    EngineSettings, FieldMatch, MappingConfigInput, MappingConfiguration, MatchOptions,
    MatchRequest, MatchResult, SourceDocument, Template,
};

pub struct TestHarness {
    pub app: FieldMatch,
    temp_dir: Option<TempDir>,
}

impl TestHarness {
    /// In-memory engine with a single transform worker.
    pub fn new() -> Self {
        Self::with_settings(EngineSettings {
            worker_count: 1,
            ..EngineSettings::default()
        })
    }

    pub fn with_settings(settings: EngineSettings) -> Self {
        let app = FieldMatch::open_in_memory(settings).expect("open in-memory engine");
        Self {
            app,
            temp_dir: None,
        }
    }

    /// Engine backed by a database file in a fresh temp directory.
    pub fn on_disk() -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let settings = EngineSettings {
            database_path: Some(temp_dir.path().join("data").join("fieldmatch.db")),
            worker_count: 2,
            ..EngineSettings::default()
        };
        let app = FieldMatch::open(settings).expect("open on-disk engine");
        Self {
            app,
            temp_dir: Some(temp_dir),
        }
    }

    pub fn database_path(&self) -> Option<PathBuf> {
        self.temp_dir
            .as_ref()
            .map(|dir| dir.path().join("data").join("fieldmatch.db"))
    }

    pub fn template(&self, template: &Template) {
        self.app
            .instances
            .save_template(template)
            .expect("save template");
    }

    pub fn config(&self, input: MappingConfigInput) -> MappingConfiguration {
        self.app.configs.create(input).expect("create configuration")
    }

    pub fn instance(&self, template_id: &str) -> TemplateInstance {
        self.app
            .instances
            .create_instance(template_id, "test run", None, None)
            .expect("create instance")
    }

    pub fn documents(&self, documents: &[SourceDocument]) {
        self.app
            .documents
            .import(documents)
            .expect("import documents");
    }

    pub fn run(&self, instance_id: &str, document_ids: &[&str]) -> MatchResult {
        self.run_with(instance_id, document_ids, MatchOptions::default())
    }

    pub fn run_with(&self, instance_id: &str, document_ids: &[&str], options: MatchOptions) -> MatchResult {
        let request = MatchRequest::new(instance_id, document_ids.iter().copied()).with_options(options);
        self.app
            .engine
            .match_documents(&request)
            .expect("match run")
    }

    pub fn preview(&self, instance_id: &str, document_ids: &[&str]) -> MatchResult {
        let request = MatchRequest::new(instance_id, document_ids.iter().copied());
        self.app
            .engine
            .preview_match(&request)
            .expect("preview run")
    }

    pub fn rows(&self, instance_id: &str) -> Vec<TemplateInstanceRow> {
        let (rows, _) = self
            .app
            .instances
            .list_rows(instance_id, &RowFilter::default())
            .expect("list rows");
        rows
    }

    pub fn row(&self, instance_id: &str, row_key: &str) -> TemplateInstanceRow {
        self.app
            .instances
            .get_row_by_key(instance_id, row_key)
            .expect("read row")
            .unwrap_or_else(|| panic!("row '{row_key}' not found"))
    }
}
