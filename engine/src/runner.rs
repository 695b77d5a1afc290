//! Sequential row-by-row import.
//!
//! Rows are processed strictly in order with at most one request in flight.
//! Progress is reported over an unbounded channel so a front end can render it
//! while the run is awaited; the final [`ImportReport`] carries the same log.

use std::future::Future;
use std::time::Duration;

use rimport_core::{ResourcePayload, format_api_errors};
use rimport_providers::{ForumClient, GeminiClient, GenerateError};
use rimport_types::{
    ApiError, CategoryId, CreatedResource, CsvRow, CsvTable, DestField, FieldMapping, ImportStats,
    truncate_chars,
};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::import_log::{ImportLog, LogEntry, LogStatus};

/// Tagline length taken from the description when AI is switched off.
pub const TAG_LINE_TRUNCATE_CHARS: usize = 90;
/// Tagline length taken from the description when AI was wanted but unavailable.
pub const TAG_LINE_FALLBACK_CHARS: usize = 99;

/// Destination for built payloads.
pub trait ResourceSink {
    fn post_resource(
        &self,
        payload: &ResourcePayload,
    ) -> impl Future<Output = Result<Option<CreatedResource>, Vec<ApiError>>> + Send;
}

impl ResourceSink for ForumClient {
    async fn post_resource(
        &self,
        payload: &ResourcePayload,
    ) -> Result<Option<CreatedResource>, Vec<ApiError>> {
        ForumClient::post_resource(self, payload).await
    }
}

/// Generator of resource copy.
pub trait Copywriter {
    fn tag_line(
        &self,
        title: &str,
        description: &str,
    ) -> impl Future<Output = Result<String, GenerateError>> + Send;

    fn enhance_description(
        &self,
        raw_description: &str,
    ) -> impl Future<Output = Result<String, GenerateError>> + Send;
}

impl Copywriter for GeminiClient {
    async fn tag_line(&self, title: &str, description: &str) -> Result<String, GenerateError> {
        GeminiClient::tag_line(self, title, description).await
    }

    async fn enhance_description(&self, raw_description: &str) -> Result<String, GenerateError> {
        GeminiClient::enhance_description(self, raw_description).await
    }
}

/// Whether and how taglines are generated.
#[derive(Debug, Clone)]
pub enum Enrichment<C> {
    /// AI switched off by the user.
    Disabled,
    Enabled(C),
    /// AI switched on but no key configured.
    MissingKey,
}

impl<C> Enrichment<C> {
    fn copywriter(&self) -> Option<&C> {
        match self {
            Enrichment::Enabled(copywriter) => Some(copywriter),
            Enrichment::Disabled | Enrichment::MissingKey => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub category_id: CategoryId,
    /// Pause after each upload except the last.
    pub delay: Duration,
    pub enhance_description: bool,
    /// Build and log payloads without posting them.
    pub dry_run: bool,
}

impl ImportOptions {
    #[must_use]
    pub fn new(category_id: CategoryId) -> Self {
        Self {
            category_id,
            delay: Duration::from_millis(500),
            enhance_description: false,
            dry_run: false,
        }
    }
}

/// Progress notifications emitted while a run is in flight.
#[derive(Debug, Clone)]
pub enum ImportEvent {
    Progress(ImportStats),
    /// Short description of what the importer is doing right now.
    Action(String),
    Log(LogEntry),
    Finished(ImportStats),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RowResult {
    Created { resource_id: Option<u64> },
    Skipped { reason: String },
    Failed { errors: Vec<ApiError> },
    DryRun,
}

impl RowResult {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, RowResult::Created { .. } | RowResult::DryRun)
    }
}

/// What happened to one CSV row. `row` is 1-based.
#[derive(Debug, Clone, Serialize)]
pub struct RowOutcome {
    pub row: usize,
    pub title: String,
    #[serde(flatten)]
    pub result: RowResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub stats: ImportStats,
    pub log: ImportLog,
    pub rows: Vec<RowOutcome>,
}

/// Drives one import run against a sink.
pub struct Importer<S, C> {
    sink: S,
    enrichment: Enrichment<C>,
    options: ImportOptions,
}

impl<S: ResourceSink, C: Copywriter> Importer<S, C> {
    pub fn new(sink: S, enrichment: Enrichment<C>, options: ImportOptions) -> Self {
        Self {
            sink,
            enrichment,
            options,
        }
    }

    /// Import every row of `table` in order.
    ///
    /// `mapping` must already be validated against the table headers. Send
    /// failures on `tx` are ignored; a dropped receiver does not stop the run.
    pub async fn run(
        &self,
        table: &CsvTable,
        mapping: &FieldMapping,
        tx: &mpsc::UnboundedSender<ImportEvent>,
    ) -> ImportReport {
        let total = table.len();
        let mut run = RunState {
            stats: ImportStats::new(total),
            log: ImportLog::new(),
            rows: Vec::with_capacity(total),
            tx,
        };
        tracing::info!(
            rows = total,
            category = %self.options.category_id,
            dry_run = self.options.dry_run,
            "Starting import"
        );
        run.emit(ImportEvent::Progress(run.stats));

        for (index, row) in table.rows.iter().enumerate() {
            run.stats.processed = index + 1;
            run.emit(ImportEvent::Progress(run.stats));

            let posted = self.import_row(index, row, mapping, &mut run).await;
            run.emit(ImportEvent::Progress(run.stats));

            let is_last = index + 1 == total;
            if posted && !is_last && !self.options.delay.is_zero() {
                run.emit(ImportEvent::Action("Waiting...".to_string()));
                tokio::time::sleep(self.options.delay).await;
            }
        }

        run.log(LogStatus::Info, "Process finished.", None);
        run.emit(ImportEvent::Action("Done".to_string()));
        run.emit(ImportEvent::Finished(run.stats));
        tracing::info!(
            success = run.stats.success,
            failed = run.stats.failed,
            "Import finished"
        );

        ImportReport {
            stats: run.stats,
            log: run.log,
            rows: run.rows,
        }
    }

    /// Returns whether a request went out, which is what the delay paces.
    async fn import_row(
        &self,
        index: usize,
        row: &CsvRow,
        mapping: &FieldMapping,
        run: &mut RunState<'_>,
    ) -> bool {
        let row_number = index + 1;
        let title = mapped(row, mapping, DestField::Title);
        let description = mapped(row, mapping, DestField::Description);

        if title.is_empty() || description.is_empty() {
            run.log(
                LogStatus::Error,
                format!("Row {row_number}: missing title or description"),
                Some(row.to_json()),
            );
            run.stats.failed += 1;
            run.rows.push(RowOutcome {
                row: row_number,
                title: title.to_string(),
                result: RowResult::Skipped {
                    reason: "missing title or description".to_string(),
                },
            });
            return false;
        }

        run.emit(ImportEvent::Action(format!("Processing: {title}")));
        let tag_line = self.resolve_tag_line(row, mapping, title, description, run).await;
        let description = self.resolve_description(description, run).await;

        let payload = ResourcePayload::build(
            self.options.category_id,
            row,
            mapping,
            title,
            &tag_line,
            &description,
        );

        if self.options.dry_run {
            run.log(
                LogStatus::Info,
                format!("Dry run: {title}"),
                Some(payload.encode()),
            );
            run.stats.success += 1;
            run.rows.push(RowOutcome {
                row: row_number,
                title: title.to_string(),
                result: RowResult::DryRun,
            });
            return false;
        }

        run.emit(ImportEvent::Action(format!("Uploading: {title}")));
        let result = match self.sink.post_resource(&payload).await {
            Ok(created) => {
                let resource_id = created.map(|resource| resource.resource_id);
                let details = resource_id
                    .map_or_else(|| "ID: unknown".to_string(), |id| format!("ID: {id}"));
                run.log(LogStatus::Success, format!("Success: {title}"), Some(details));
                run.stats.success += 1;
                RowResult::Created { resource_id }
            }
            Err(errors) => {
                run.log(
                    LogStatus::Error,
                    format!("Failed: {title}"),
                    Some(format_api_errors(&errors)),
                );
                run.stats.failed += 1;
                RowResult::Failed { errors }
            }
        };
        run.rows.push(RowOutcome {
            row: row_number,
            title: title.to_string(),
            result,
        });
        true
    }

    async fn resolve_tag_line(
        &self,
        row: &CsvRow,
        mapping: &FieldMapping,
        title: &str,
        description: &str,
        run: &mut RunState<'_>,
    ) -> String {
        let provided = mapped(row, mapping, DestField::TagLine);
        if !provided.is_empty() {
            return provided.to_string();
        }

        match &self.enrichment {
            Enrichment::Disabled => truncate_chars(description, TAG_LINE_TRUNCATE_CHARS).to_string(),
            Enrichment::MissingKey => {
                truncate_chars(description, TAG_LINE_FALLBACK_CHARS).to_string()
            }
            Enrichment::Enabled(copywriter) => {
                run.emit(ImportEvent::Action(format!("Generating tagline: {title}")));
                match copywriter.tag_line(title, description).await {
                    Ok(generated) if !generated.trim().is_empty() => generated,
                    Ok(_) => truncate_chars(description, TAG_LINE_FALLBACK_CHARS).to_string(),
                    Err(e) => {
                        tracing::warn!(%e, title, "Tagline generation failed; using description");
                        truncate_chars(description, TAG_LINE_FALLBACK_CHARS).to_string()
                    }
                }
            }
        }
    }

    async fn resolve_description(&self, description: &str, run: &mut RunState<'_>) -> String {
        if !self.options.enhance_description {
            return description.to_string();
        }
        let Some(copywriter) = self.enrichment.copywriter() else {
            return description.to_string();
        };
        run.emit(ImportEvent::Action("Enhancing description".to_string()));
        match copywriter.enhance_description(description).await {
            Ok(enhanced) if !enhanced.trim().is_empty() => enhanced,
            Ok(_) => description.to_string(),
            Err(e) => {
                tracing::warn!(%e, "Description enhancement failed; keeping original");
                description.to_string()
            }
        }
    }
}

struct RunState<'a> {
    stats: ImportStats,
    log: ImportLog,
    rows: Vec<RowOutcome>,
    tx: &'a mpsc::UnboundedSender<ImportEvent>,
}

impl RunState<'_> {
    fn emit(&self, event: ImportEvent) {
        let _ = self.tx.send(event);
    }

    fn log(&mut self, status: LogStatus, message: impl Into<String>, details: Option<String>) {
        let entry = self.log.push(status, message, details);
        self.emit(ImportEvent::Log(entry));
    }
}

fn mapped<'r>(row: &'r CsvRow, mapping: &FieldMapping, field: DestField) -> &'r str {
    mapping
        .get(field)
        .map(|header| row.value(header).trim())
        .unwrap_or("")
}
