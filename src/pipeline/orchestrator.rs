//! # Pipeline Orchestrator
//!
//! Sequences one incremental run. Every cross-stage ordering is a
//! [`Dispatcher::wait`] on the completion barrier:
//!
//! ```text
//! metadata (field definitions, groups) ─ wait
//!   ─► organizations ─ wait ─► users ─ wait ─► tickets ─ wait
//!   ─► satisfaction ratings + per-ticket audits/metrics ─ wait
//!   ─► custom field values ─► audits ─► change events ─► metrics
//!   ─► post-processing SQL
//! ```

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::extraction::{register_extractions, RunState, SharedRunState};
use crate::config::PipelineConfig;
use crate::database::{ImportSummary, Persistence, PersistenceError};
use crate::error::Result;
use crate::execution::{Dispatcher, ErrorSink, FetchFailure, PageHandler, WriteFailure};
use crate::logging::{log_error, log_stage_operation};
use crate::models::{EntityKind, Record};
use crate::source::{FetchRequest, Payload, ZendeskSource};

/// Per-kind totals across every import of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportTotals {
    pub batches: usize,
    pub inserted: usize,
    pub updated: usize,
    pub dropped: usize,
    pub failed: usize,
}

impl ImportTotals {
    fn add(&mut self, summary: &ImportSummary) {
        self.batches += 1;
        self.inserted += summary.inserted;
        self.updated += summary.updated;
        self.dropped += summary.dropped;
        self.failed += summary.failed;
    }
}

#[derive(Debug, Default)]
struct ImportLedger {
    totals: Mutex<BTreeMap<EntityKind, ImportTotals>>,
}

impl ImportLedger {
    fn record(&self, summary: &ImportSummary) {
        self.totals.lock().entry(summary.kind).or_default().add(summary);
    }

    fn take(&self) -> BTreeMap<EntityKind, ImportTotals> {
        std::mem::take(&mut *self.totals.lock())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub stage: &'static str,
    pub duration_ms: u64,
    /// Set when the stage stopped early; later stages still ran
    pub error: Option<String>,
}

impl StageReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// End-of-run summary.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub stages: Vec<StageReport>,
    pub imports: BTreeMap<EntityKind, ImportTotals>,
    pub fetch_failures: Vec<FetchFailure>,
    pub write_failures: Vec<WriteFailure>,
}

impl RunReport {
    pub(crate) fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            stages: Vec::new(),
            imports: BTreeMap::new(),
            fetch_failures: Vec::new(),
            write_failures: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.fetch_failures.is_empty()
            && self.write_failures.is_empty()
            && self.stages.iter().all(StageReport::succeeded)
    }

    pub fn failed_stages(&self) -> impl Iterator<Item = &StageReport> {
        self.stages.iter().filter(|stage| !stage.succeeded())
    }

    pub fn totals(&self, kind: EntityKind) -> ImportTotals {
        self.imports.get(&kind).copied().unwrap_or_default()
    }

    /// Log the summary and one warning per drained failure.
    pub fn log(&self) {
        for stage in self.failed_stages() {
            warn!(
                run_id = %self.run_id,
                stage = stage.stage,
                error = stage.error.as_deref(),
                "A stage stopped early"
            );
        }
        for failure in &self.fetch_failures {
            warn!(
                run_id = %self.run_id,
                uri = %failure.uri,
                status = failure.status,
                error = %failure.error,
                "An error occurred fetching"
            );
        }
        for failure in &self.write_failures {
            warn!(
                run_id = %self.run_id,
                table = failure.table,
                record = ?failure.record,
                error = %failure.error,
                "An error occurred persisting"
            );
        }
        info!(
            run_id = %self.run_id,
            stages = self.stages.len(),
            imports = ?self.imports,
            fetch_failures = self.fetch_failures.len(),
            write_failures = self.write_failures.len(),
            "📊 Run complete"
        );
    }
}

/// Imports every page it receives.
struct PersistPage {
    persistence: Arc<Persistence>,
    ledger: Arc<ImportLedger>,
}

#[async_trait]
impl PageHandler for PersistPage {
    async fn on_success(&self, payload: Payload) {
        let kind = payload.kind();
        let result = match payload {
            Payload::Groups(records) => self.persistence.import(records).await,
            Payload::Organizations(records) => self.persistence.import(records).await,
            Payload::OrganizationFields(records) => self.persistence.import(records).await,
            Payload::Users(records) => self.persistence.import(records).await,
            Payload::UserFields(records) => self.persistence.import(records).await,
            Payload::Tickets(records) => self.persistence.import(records).await,
            Payload::TicketFields(records) => self.persistence.import(records).await,
            Payload::Audits(records) => self.persistence.import(records).await,
            Payload::TicketMetrics(records) => self.persistence.import(records).await,
            Payload::SatisfactionRatings(records) => self.persistence.import(records).await,
        };
        record_import(&self.ledger, kind, result);
    }
}

/// Holds per-ticket follow-up pages until they can be imported in one batch.
struct AccumulatePage {
    state: SharedRunState,
}

#[async_trait]
impl PageHandler for AccumulatePage {
    async fn on_success(&self, payload: Payload) {
        match payload {
            Payload::Audits(audits) => self.state.lock().audits.extend(audits),
            Payload::TicketMetrics(metrics) => self.state.lock().metrics.extend(metrics),
            other => debug!(kind = %other.kind(), "Ignoring unexpected follow-up payload"),
        }
    }
}

fn record_import(
    ledger: &ImportLedger,
    kind: EntityKind,
    result: std::result::Result<ImportSummary, PersistenceError>,
) {
    match result {
        Ok(summary) => ledger.record(&summary),
        Err(e) => log_error("persistence", "import", &e.to_string(), Some(kind.table_name())),
    }
}

pub struct Orchestrator {
    dispatcher: Arc<Dispatcher>,
    persistence: Arc<Persistence>,
    source: ZendeskSource,
    config: PipelineConfig,
    state: SharedRunState,
    ledger: Arc<ImportLedger>,
    fetch_errors: ErrorSink<FetchFailure>,
}

impl Orchestrator {
    /// Registers the extraction transforms on `persistence`; build one orchestrator per persistence instance.
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        persistence: Arc<Persistence>,
        source: ZendeskSource,
        config: PipelineConfig,
    ) -> Self {
        let state: SharedRunState = Arc::new(Mutex::new(RunState::default()));
        register_extractions(&persistence, &state, &config.tracked_change_fields);

        Self {
            dispatcher,
            persistence,
            source,
            config,
            state,
            ledger: Arc::new(ImportLedger::default()),
            fetch_errors: ErrorSink::new(),
        }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn persistence(&self) -> &Arc<Persistence> {
        &self.persistence
    }

    /// Run every stage once and drain both error sinks into the report.
    ///
    /// A failing stage is recorded in the report and the run moves on to the
    /// next stage.
    pub async fn run(&self) -> RunReport {
        let run_id = Uuid::new_v4();
        let span = info_span!("pipeline_run", run_id = %run_id);
        self.run_stages(run_id).instrument(span).await
    }

    async fn run_stages(&self, run_id: Uuid) -> RunReport {
        let mut report = RunReport::new(run_id);
        let id = run_id.to_string();
        self.state.lock().reset();
        info!(run_id = %id, "🚀 Starting pipeline run");

        report.stages.push(self.stage(&id, "metadata", self.metadata()).await);
        report.stages.push(self.stage(&id, "organizations", self.organizations()).await);
        report.stages.push(self.stage(&id, "users", self.users()).await);
        report.stages.push(self.stage(&id, "tickets", self.tickets()).await);
        report.stages.push(self.stage(&id, "follow_ups", self.follow_ups()).await);
        report
            .stages
            .push(self.stage(&id, "custom_field_values", self.custom_field_values()).await);
        report.stages.push(self.stage(&id, "audits", self.audits()).await);
        report
            .stages
            .push(self.stage(&id, "post_processing", self.post_processing()).await);

        report.imports = self.ledger.take();
        report.fetch_failures = self.fetch_errors.drain();
        report.write_failures = self.persistence.errors().drain();
        report
    }

    async fn stage<F>(&self, run_id: &str, stage: &'static str, body: F) -> StageReport
    where
        F: Future<Output = Result<()>>,
    {
        let started = Instant::now();
        log_stage_operation(run_id, stage, "started", None);

        let error = match body.instrument(info_span!("stage", stage)).await {
            Ok(()) => None,
            Err(e) => {
                error!(run_id, stage, error = %e, "Stage failed, continuing with the next stage");
                // drain what the stage queued before it failed
                if self.dispatcher.is_running() {
                    self.dispatcher.wait().await;
                }
                Some(e.to_string())
            }
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        let status = if error.is_none() { "completed" } else { "failed" };
        log_stage_operation(run_id, stage, status, Some(&format!("{duration_ms}ms")));
        StageReport {
            stage,
            duration_ms,
            error,
        }
    }

    fn persist(&self) -> Arc<dyn PageHandler> {
        Arc::new(PersistPage {
            persistence: Arc::clone(&self.persistence),
            ledger: Arc::clone(&self.ledger),
        })
    }

    async fn submit(&self, request: FetchRequest, handler: Arc<dyn PageHandler>) -> Result<()> {
        self.dispatcher
            .submit(request, handler, &self.fetch_errors)
            .await?;
        Ok(())
    }

    async fn metadata(&self) -> Result<()> {
        self.submit(self.source.export_ticket_fields()?, self.persist()).await?;
        self.submit(self.source.export_organization_fields()?, self.persist()).await?;
        self.submit(self.source.export_user_fields()?, self.persist()).await?;
        self.submit(self.source.export_groups()?, self.persist()).await?;
        self.dispatcher.wait().await;
        Ok(())
    }

    async fn organizations(&self) -> Result<()> {
        let since = self.persistence.fetch_offset(EntityKind::Organization.table_name()).await?;
        self.submit(self.source.export_organizations(since)?, self.persist()).await?;
        self.dispatcher.wait().await;
        Ok(())
    }

    async fn users(&self) -> Result<()> {
        let since = self.persistence.fetch_offset(EntityKind::User.table_name()).await?;
        self.submit(self.source.export_users(since)?, self.persist()).await?;
        self.dispatcher.wait().await;
        Ok(())
    }

    async fn tickets(&self) -> Result<()> {
        let since = self.persistence.fetch_offset(EntityKind::Ticket.table_name()).await?;
        self.submit(self.source.export_tickets(since)?, self.persist()).await?;
        self.dispatcher.wait().await;
        Ok(())
    }

    /// Satisfaction ratings plus audits and metrics for every ticket imported this run.
    ///
    /// A failed ratings export does not hold back the per-ticket fetches.
    async fn follow_ups(&self) -> Result<()> {
        let ratings = self.satisfaction_ratings().await;

        let tickets = self.state.lock().take_follow_ups();
        info!(tickets = tickets.len(), "Fetching audits and metrics");
        let accumulate: Arc<dyn PageHandler> = Arc::new(AccumulatePage {
            state: Arc::clone(&self.state),
        });
        for ticket_id in tickets {
            self.submit(self.source.fetch_audits(ticket_id)?, Arc::clone(&accumulate))
                .await?;
            self.submit(self.source.fetch_metrics(ticket_id)?, Arc::clone(&accumulate))
                .await?;
        }

        self.dispatcher.wait().await;
        ratings
    }

    async fn satisfaction_ratings(&self) -> Result<()> {
        let since = self
            .persistence
            .fetch_offset(EntityKind::SatisfactionRating.table_name())
            .await?;
        self.submit(self.source.export_satisfaction_ratings(since)?, self.persist())
            .await
    }

    async fn custom_field_values(&self) -> Result<()> {
        let (organizations, users, tickets) = {
            let mut state = self.state.lock();
            (
                std::mem::take(&mut state.organization_values),
                std::mem::take(&mut state.user_values),
                std::mem::take(&mut state.ticket_values),
            )
        };
        self.import(organizations).await;
        self.import(users).await;
        self.import(tickets).await;
        Ok(())
    }

    /// Audits first: importing them runs change-event extraction.
    async fn audits(&self) -> Result<()> {
        let audits = std::mem::take(&mut self.state.lock().audits);
        self.import(audits).await;

        let (events, metrics) = {
            let mut state = self.state.lock();
            (
                std::mem::take(&mut state.change_events),
                std::mem::take(&mut state.metrics),
            )
        };
        self.import(events).await;
        self.import(metrics).await;
        Ok(())
    }

    async fn post_processing(&self) -> Result<()> {
        for sql in &self.config.post_processing {
            match self.persistence.exec_raw(sql).await {
                Ok(rows) => debug!(rows, "Post-processing statement applied"),
                Err(e) => log_error("pipeline", "post_processing", &e.to_string(), Some(sql.as_str())),
            }
        }
        Ok(())
    }

    /// Batch failures are logged and counted; they never abort the run.
    async fn import<T: Record>(&self, records: Vec<T>) {
        let result = self.persistence.import(records).await;
        record_import(&self.ledger, T::KIND, result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_totals_accumulate() {
        let ledger = ImportLedger::default();
        let summary = ImportSummary {
            kind: EntityKind::Ticket,
            inserted: 3,
            updated: 1,
            dropped: 0,
            failed: 1,
            watermark: Some(10),
        };
        ledger.record(&summary);
        ledger.record(&summary);

        let totals = ledger.take();
        let tickets = totals[&EntityKind::Ticket];
        assert_eq!(tickets.batches, 2);
        assert_eq!(tickets.inserted, 6);
        assert_eq!(tickets.updated, 2);
        assert_eq!(tickets.failed, 2);
        assert!(ledger.take().is_empty());
    }

    #[test]
    fn test_report_cleanliness() {
        let mut report = RunReport::new(Uuid::new_v4());
        assert!(report.is_clean());
        assert_eq!(report.totals(EntityKind::User), ImportTotals::default());

        report.fetch_failures.push(FetchFailure {
            uri: "https://acme.zendesk.com/api/v2/groups.json".to_string(),
            status: Some(500),
            error: "HTTP 500".to_string(),
        });
        assert!(!report.is_clean());
    }

    #[test]
    fn test_failed_stage_marks_report_unclean() {
        let mut report = RunReport::new(Uuid::new_v4());
        report.stages.push(StageReport {
            stage: "metadata",
            duration_ms: 12,
            error: None,
        });
        assert!(report.is_clean());

        report.stages.push(StageReport {
            stage: "tickets",
            duration_ms: 4,
            error: Some("Dispatch error: Dispatcher has been stopped".to_string()),
        });
        assert!(!report.is_clean());
        let failed: Vec<_> = report.failed_stages().map(|s| s.stage).collect();
        assert_eq!(failed, vec!["tickets"]);
    }
}
