use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

use super::cancel::CancellationToken;
use super::error::MatchError;
use super::options::{MatchRequest, RunOptions};
use super::plan::{DocumentTransform, TransformPlan};
use super::progress::{MatchPhase, NoopProgress, ProgressEvent, ProgressReporter};
use super::result::{DocumentOutcome, DocumentStatus, MatchResult, RowSummary};
use super::sink::{PersistentSink, PreviewSink, RowSink};
use crate::config::EngineSettings;
use crate::document::DocumentSource;
use crate::mapping::{MappingResolver, ResolvedMappingConfig};
use crate::template::{InstanceStatus, InstanceStore, RowStatus, TemplateInstance};
use crate::validation::ValidationEngine;
use crate::worker::{TransformJob, TransformPool, TransformResult};

/// Runs documents through the resolved mapping rules into template rows.
pub struct MatchingEngine {
    resolver: MappingResolver,
    instances: InstanceStore,
    documents: Arc<dyn DocumentSource>,
    settings: EngineSettings,
}

/// Rows touched by a run, in first-touch order.
#[derive(Default)]
struct TouchedRows {
    order: Vec<String>,
    rows: HashMap<String, RowSummary>,
}

impl TouchedRows {
    fn record(&mut self, summary: RowSummary) {
        if !self.rows.contains_key(&summary.row_key) {
            self.order.push(summary.row_key.clone());
        }
        self.rows.insert(summary.row_key.clone(), summary);
    }

    fn into_rows(mut self) -> Vec<RowSummary> {
        self.order
            .iter()
            .filter_map(|key| self.rows.remove(key))
            .collect()
    }
}

fn final_status(cancelled: bool, total: usize, failed: usize) -> InstanceStatus {
    if cancelled {
        InstanceStatus::Processing
    } else if total > 0 && failed == total {
        InstanceStatus::Error
    } else if failed > 0 {
        InstanceStatus::Processing
    } else {
        InstanceStatus::Completed
    }
}

impl MatchingEngine {
    pub fn new(
        resolver: MappingResolver,
        instances: InstanceStore,
        documents: Arc<dyn DocumentSource>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            resolver,
            instances,
            documents,
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Effective rules for a (template, company, format).
    pub fn resolve_mapping(
        &self,
        template_id: &str,
        company_id: Option<&str>,
        format_id: Option<&str>,
    ) -> Result<Arc<ResolvedMappingConfig>, MatchError> {
        self.resolver
            .resolve(template_id, company_id, format_id)
            .map_err(MatchError::Resolve)
    }

    pub fn match_documents(&self, request: &MatchRequest) -> Result<MatchResult, MatchError> {
        self.match_documents_with(request, &NoopProgress, &CancellationToken::new())
    }

    /// Runs the match without writing rows or touching the instance.
    pub fn preview_match(&self, request: &MatchRequest) -> Result<MatchResult, MatchError> {
        self.preview_match_with(request, &NoopProgress, &CancellationToken::new())
    }

    pub fn match_documents_with(
        &self,
        request: &MatchRequest,
        progress: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<MatchResult, MatchError> {
        self.run(request, false, progress, cancel)
    }

    pub fn preview_match_with(
        &self,
        request: &MatchRequest,
        progress: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<MatchResult, MatchError> {
        self.run(request, true, progress, cancel)
    }

    fn run(
        &self,
        request: &MatchRequest,
        preview: bool,
        progress: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<MatchResult, MatchError> {
        let run_id = request
            .run_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let _run_span = info_span!("match_run",
            run_id = %run_id,
            instance_id = %request.template_instance_id,
            documents = request.document_ids.len(),
            preview,
        )
        .entered();

        progress.report(ProgressEvent::Phase {
            phase: MatchPhase::Requested,
            message: format!("Matching {} documents", request.document_ids.len()),
        });

        match self.execute(&run_id, request, preview, progress, cancel) {
            Ok(result) => {
                info!(
                    processed = result.processed_documents,
                    matched = result.matched_documents,
                    skipped = result.skipped_documents,
                    failed = result.failed_documents,
                    rows = result.total_rows,
                    cancelled = result.cancelled,
                    "Match run finished"
                );
                progress.report(ProgressEvent::Completed {
                    processed_documents: result.processed_documents,
                });
                Ok(result)
            }
            Err(e) => {
                warn!(error = %e, "Match run aborted");
                if !preview
                    && !matches!(
                        e,
                        MatchError::InstanceNotFound(_) | MatchError::InstanceImmutable(_)
                    )
                {
                    if let Err(status_err) = self
                        .instances
                        .set_status(&request.template_instance_id, InstanceStatus::Error)
                    {
                        warn!(error = %status_err, "Failed to mark instance as ERROR");
                    }
                }
                progress.report(ProgressEvent::Failed {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn load_instance(&self, id: &str, preview: bool) -> Result<TemplateInstance, MatchError> {
        let instance = self
            .instances
            .get_instance(id)?
            .ok_or_else(|| MatchError::InstanceNotFound(id.to_string()))?;
        if !preview && instance.status == InstanceStatus::Exported {
            return Err(MatchError::InstanceImmutable(id.to_string()));
        }
        Ok(instance)
    }

    fn execute(
        &self,
        run_id: &str,
        request: &MatchRequest,
        preview: bool,
        progress: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<MatchResult, MatchError> {
        let instance_id = request.template_instance_id.as_str();
        let instance = self.load_instance(instance_id, preview)?;
        let template = self
            .instances
            .get_template(&instance.template_id)?
            .ok_or_else(|| MatchError::TemplateNotFound(instance.template_id.clone()))?;
        let options = RunOptions::resolve(&request.options, &template, &instance, &self.settings);

        // Resolve once per run
        let resolved = {
            let _step = info_span!("resolve").entered();
            progress.report(ProgressEvent::Phase {
                phase: MatchPhase::Resolving,
                message: "Resolving mapping configuration...".to_string(),
            });
            self.resolve_mapping(
                &template.id,
                options.company_id.as_deref(),
                options.format_id.as_deref(),
            )?
        };
        debug!(
            rules = resolved.mappings.len(),
            row_key_field = %options.row_key_field,
            "Mapping resolved"
        );

        if !preview {
            self.instances
                .set_status(instance_id, InstanceStatus::Processing)?;
        }

        let plan = Arc::new(TransformPlan::new(&resolved, &options.row_key_field));
        let validator = ValidationEngine::new(template.fields.clone());
        let mut sink: Box<dyn RowSink + '_> = if preview {
            Box::new(PreviewSink::new(
                &self.instances,
                instance_id,
                &validator,
                options.conflict_policy,
            ))
        } else {
            Box::new(PersistentSink::new(
                &self.instances,
                instance_id,
                &validator,
                options.conflict_policy,
            ))
        };

        let total = request.document_ids.len();
        let mut pool = (options.worker_count > 1 && total > 1)
            .then(|| TransformPool::new(Arc::clone(&plan), options.worker_count));

        let mut results: Vec<DocumentOutcome> = Vec::with_capacity(total);
        let mut touched = TouchedRows::default();
        let mut cancelled = false;

        for (batch, chunk) in request.document_ids.chunks(options.batch_size).enumerate() {
            if cancel.is_cancelled() {
                info!(batch, "Match run cancelled");
                cancelled = true;
                break;
            }
            let _batch_span = info_span!("batch", batch, size = chunk.len()).entered();
            let offset = batch * options.batch_size;

            progress.report(ProgressEvent::Phase {
                phase: MatchPhase::Batching,
                message: format!("Loading batch {} ({} documents)", batch + 1, chunk.len()),
            });
            let mut outcomes: BTreeMap<usize, DocumentOutcome> = BTreeMap::new();
            let mut jobs = Vec::with_capacity(chunk.len());
            for (i, document_id) in chunk.iter().enumerate() {
                match self.documents.load_document(document_id) {
                    Ok(document) => jobs.push(TransformJob {
                        index: offset + i,
                        document,
                    }),
                    Err(e) => {
                        warn!(document_id = %document_id, error = %e, "Document could not be loaded");
                        outcomes.insert(offset + i, DocumentOutcome::failed(document_id, e.to_string()));
                    }
                }
            }

            progress.report(ProgressEvent::Phase {
                phase: MatchPhase::Transforming,
                message: "Transforming fields...".to_string(),
            });
            let transformed = transform_batch(&plan, &mut pool, jobs);

            progress.report(ProgressEvent::Phase {
                phase: MatchPhase::Validating,
                message: "Merging and validating rows...".to_string(),
            });
            for result in transformed {
                let outcome =
                    merge_result(sink.as_mut(), &result.document_id, result.output, &mut touched);
                outcomes.insert(result.index, outcome);
            }

            results.extend(outcomes.into_values());
            progress.report(ProgressEvent::BatchCompleted {
                batch,
                processed_documents: results.len(),
            });
        }

        if let Some(pool) = pool {
            pool.wait();
        }

        let count = |status: DocumentStatus| results.iter().filter(|o| o.status == status).count();
        let matched = count(DocumentStatus::Matched);
        let skipped = count(DocumentStatus::Skipped);
        let failed = count(DocumentStatus::Failed);

        let (instance_status, instance_stats) = if preview {
            (instance.status, None)
        } else {
            let _step = info_span!("aggregate").entered();
            progress.report(ProgressEvent::Phase {
                phase: MatchPhase::Aggregating,
                message: "Aggregating statistics...".to_string(),
            });
            let stats = self.instances.recompute_stats(instance_id)?;
            let status = final_status(cancelled, total, failed);
            self.instances.set_status(instance_id, status)?;
            (status, Some(stats))
        };

        let rows = touched.into_rows();
        let valid_rows = rows.iter().filter(|r| r.status == RowStatus::Valid).count();
        let invalid_rows = rows.iter().filter(|r| r.status == RowStatus::Invalid).count();

        Ok(MatchResult {
            run_id: run_id.to_string(),
            template_instance_id: instance_id.to_string(),
            preview,
            cancelled,
            total_documents: total,
            processed_documents: results.len(),
            matched_documents: matched,
            skipped_documents: skipped,
            failed_documents: failed,
            total_rows: rows.len(),
            valid_rows,
            invalid_rows,
            instance_status,
            instance_stats,
            resolved_from: resolved.resolved_from.clone(),
            results,
            rows,
        })
    }
}

/// Transforms one batch on the pool when there is one, otherwise on the
/// calling thread. A pool that stops answering is retired and the batch is
/// redone here, so the run keeps going on a single thread.
fn transform_batch(
    plan: &TransformPlan,
    pool: &mut Option<TransformPool>,
    jobs: Vec<TransformJob>,
) -> Vec<TransformResult> {
    if let Some(active) = pool.as_ref() {
        match active.run_batch(jobs.clone()) {
            Ok(results) => return results,
            Err(e) => {
                warn!(error = %e, jobs = jobs.len(), "Transform workers failed, continuing on the calling thread");
                if let Some(broken) = pool.take() {
                    broken.shutdown();
                    broken.wait();
                }
            }
        }
    }

    jobs.into_iter()
        .map(|job| TransformResult {
            index: job.index,
            output: plan.transform(&job.document),
            document_id: job.document.id,
        })
        .collect()
}

fn merge_result<S: RowSink + ?Sized>(
    sink: &mut S,
    document_id: &str,
    output: DocumentTransform,
    touched: &mut TouchedRows,
) -> DocumentOutcome {
    match output {
        DocumentTransform::Ready {
            contribution,
            field_errors,
        } => match sink.upsert(&contribution) {
            Ok(upsert) => {
                if !upsert.conflicts.is_empty() {
                    debug!(
                        document_id,
                        row_key = %contribution.row_key,
                        conflicts = upsert.conflicts.len(),
                        "Conflicting field values"
                    );
                }
                touched.record(RowSummary::from(&upsert.row));
                DocumentOutcome {
                    document_id: document_id.to_string(),
                    status: DocumentStatus::Matched,
                    row_key: Some(contribution.row_key),
                    row_status: Some(upsert.row.status),
                    error: None,
                    field_errors,
                    conflicts: upsert.conflicts,
                }
            }
            Err(e) => {
                warn!(document_id, error = %e, "Row upsert failed");
                let mut outcome = DocumentOutcome::failed(document_id, e.to_string());
                outcome.row_key = Some(contribution.row_key);
                outcome
            }
        },
        DocumentTransform::Skipped { reason } => {
            debug!(document_id, %reason, "Document skipped");
            DocumentOutcome::skipped(document_id, reason)
        }
        DocumentTransform::Failed { reason } => {
            warn!(document_id, %reason, "Document transform failed");
            DocumentOutcome::failed(document_id, reason)
        }
    }
}
