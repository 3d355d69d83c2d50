//! Drives one scraping run: every enabled extractor in sequence, then mapping,
//! de-duplication and batched submission to the ingestion endpoint.

use crate::app::ports::{IngestPort, PageSession};
use crate::config::Config;
use crate::error::{Result, ScraperError};
use crate::observability::metrics::RunMetrics;
use crate::pipeline::processing::dedupe::{collapse_sub_zones, dedupe};
use crate::pipeline::processing::mapper::RecordMapper;
use crate::pipeline::retry::{retry_with_backoff, RetryPolicy};
use crate::types::{Event, ExtractContext, SiteExtractor};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    RunningExtractor(usize),
    Aggregating,
    Batching,
    Done,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractorStatus {
    Ok,
    Empty,
    Skipped,
    Failed(String),
}

impl ExtractorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractorStatus::Ok => "ok",
            ExtractorStatus::Empty => "empty",
            ExtractorStatus::Skipped => "skipped",
            ExtractorStatus::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for ExtractorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractorStatus::Failed(msg) => write!(f, "failed ({msg})"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Outcome of one extractor within a run.
#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub name: String,
    pub source: String,
    pub status: ExtractorStatus,
    pub listings: usize,
    pub events: usize,
    pub elapsed_secs: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub dry_run: bool,
    pub sources: Vec<SourceReport>,
    /// Events left after de-duplication.
    pub total_events: usize,
    pub batches: usize,
    pub posted: usize,
    pub created: u64,
    pub updated: u64,
    pub skipped: u64,
    pub errors: u64,
    pub snapshot: Option<PathBuf>,
    pub elapsed_secs: f64,
}

impl RunSummary {
    fn new(dry_run: bool) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            dry_run,
            sources: Vec::new(),
            total_events: 0,
            batches: 0,
            posted: 0,
            created: 0,
            updated: 0,
            skipped: 0,
            errors: 0,
            snapshot: None,
            elapsed_secs: 0.0,
        }
    }

    pub fn source(&self, name: &str) -> Option<&SourceReport> {
        self.sources.iter().find(|s| s.name == name)
    }
}

/// Pacing and output settings for a run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub batch_size: usize,
    pub batch_delay: Duration,
    pub batch_retry: RetryPolicy,
    pub extractor_pause: Duration,
    pub extract: ExtractContext,
    pub dry_run: bool,
    pub output_dir: Option<PathBuf>,
    /// Start date given to open-ended exhibitions.
    pub today: NaiveDate,
}

impl RunOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            batch_size: config.batch.size,
            batch_delay: config.batch_delay(),
            batch_retry: config.batch_retry_policy(),
            extractor_pause: config.extractor_pause(),
            extract: config.extract_context(),
            dry_run: false,
            output_dir: config.run.output_dir.as_ref().map(PathBuf::from),
            today: Utc::now().date_naive(),
        }
    }

    /// No delays, no snapshot.
    pub fn immediate(batch_size: usize) -> Self {
        Self {
            batch_size,
            batch_delay: Duration::ZERO,
            batch_retry: RetryPolicy::immediate(1),
            extractor_pause: Duration::ZERO,
            extract: ExtractContext::immediate(),
            dry_run: false,
            output_dir: None,
            today: Utc::now().date_naive(),
        }
    }
}

struct Slot {
    extractor: Box<dyn SiteExtractor>,
    enabled: bool,
}

pub struct RunOrchestrator {
    session: Box<dyn PageSession>,
    ingest: Box<dyn IngestPort>,
    slots: Vec<Slot>,
    options: RunOptions,
    state: RunState,
}

impl RunOrchestrator {
    pub fn new(session: Box<dyn PageSession>, ingest: Box<dyn IngestPort>, options: RunOptions) -> Self {
        Self { session, ingest, slots: Vec::new(), options, state: RunState::Idle }
    }

    /// Register an extractor. Disabled ones are reported as skipped.
    pub fn add_extractor(&mut self, extractor: Box<dyn SiteExtractor>, enabled: bool) {
        self.slots.push(Slot { extractor, enabled });
    }

    pub fn with_extractor(mut self, extractor: Box<dyn SiteExtractor>, enabled: bool) -> Self {
        self.add_extractor(extractor, enabled);
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub async fn run(&mut self) -> Result<RunSummary> {
        if self.options.batch_size == 0 {
            self.state = RunState::Failed;
            return Err(ScraperError::Config("batch size must be at least 1".into()));
        }

        let started = Instant::now();
        let mut summary = RunSummary::new(self.options.dry_run);
        let mapper = RecordMapper::new(self.options.today);
        info!(run_id = %summary.run_id, extractors = self.slots.len(), dry_run = self.options.dry_run, "Starting run");

        let mut collected: Vec<Event> = Vec::new();
        let mut ran_any = false;
        for i in 0..self.slots.len() {
            self.state = RunState::RunningExtractor(i);
            if self.slots[i].enabled && ran_any && !self.options.extractor_pause.is_zero() {
                self.session.pause(self.options.extractor_pause).await;
            }
            ran_any |= self.slots[i].enabled;
            let (report, events) = self.run_extractor(i, &mapper).await;
            collected.extend(events);
            summary.sources.push(report);
        }

        self.state = RunState::Aggregating;
        let events = dedupe(collected);
        summary.total_events = events.len();
        info!("{} events after de-duplication", events.len());

        if let Some(dir) = self.options.output_dir.clone() {
            match write_snapshot(&dir, &events) {
                Ok(path) => {
                    info!("Saved events to {}", path.display());
                    summary.snapshot = Some(path);
                }
                Err(e) => warn!("Could not write event snapshot to {}: {}", dir.display(), e),
            }
        }

        self.state = RunState::Batching;
        self.submit_batches(&events, &mut summary).await;

        summary.elapsed_secs = started.elapsed().as_secs_f64();
        RunMetrics::record_run(summary.elapsed_secs);
        self.state = RunState::Done;
        log_summary(&summary);
        Ok(summary)
    }

    async fn run_extractor(&mut self, i: usize, mapper: &RecordMapper) -> (SourceReport, Vec<Event>) {
        let slot = &self.slots[i];
        let name = slot.extractor.name();
        let defaults = slot.extractor.defaults();
        let mut report = SourceReport {
            name: name.to_string(),
            source: defaults.source.to_string(),
            status: ExtractorStatus::Skipped,
            listings: 0,
            events: 0,
            elapsed_secs: 0.0,
        };
        if !slot.enabled {
            info!(source = defaults.source, "Extractor disabled, skipping");
            RunMetrics::record_extractor(defaults.source, report.status.as_str(), 0, 0, 0.0);
            return (report, Vec::new());
        }

        let started = Instant::now();
        let span = info_span!("extractor", source = defaults.source);
        let outcome = slot
            .extractor
            .extract(self.session.as_mut(), &self.options.extract)
            .instrument(span.clone())
            .await;

        let events = span.in_scope(|| match outcome {
            Ok(raws) => {
                report.listings = raws.len();
                let mapped = mapper.map_all(&raws, &defaults);
                let prefixes = slot.extractor.sub_zone_prefixes();
                let events = if prefixes.is_empty() { mapped } else { collapse_sub_zones(mapped, prefixes) };
                report.events = events.len();
                report.status = if events.is_empty() { ExtractorStatus::Empty } else { ExtractorStatus::Ok };
                info!("{} listings, {} events", report.listings, report.events);
                events
            }
            Err(e) => {
                error!("Extractor failed: {}", e);
                report.status = ExtractorStatus::Failed(e.to_string());
                Vec::new()
            }
        });

        report.elapsed_secs = started.elapsed().as_secs_f64();
        RunMetrics::record_extractor(
            defaults.source,
            report.status.as_str(),
            report.listings,
            report.events,
            report.elapsed_secs,
        );
        (report, events)
    }

    async fn submit_batches(&self, events: &[Event], summary: &mut RunSummary) {
        let size = self.options.batch_size;
        let total = events.len().div_ceil(size);
        for (i, batch) in events.chunks(size).enumerate() {
            summary.batches += 1;
            if i > 0 && !self.options.batch_delay.is_zero() {
                tokio::time::sleep(self.options.batch_delay).await;
            }

            if self.options.dry_run {
                info!("Dry run: batch {}/{} of {} events not sent", i + 1, total, batch.len());
                summary.skipped += batch.len() as u64;
                RunMetrics::record_batch("dry_run", batch.len());
                continue;
            }

            let label = format!("Batch {}/{}", i + 1, total);
            let ingest = &self.ingest;
            match retry_with_backoff(&self.options.batch_retry, &label, || ingest.submit(batch)).await {
                Ok(outcome) => {
                    info!(
                        "{}: created {}, updated {}, skipped {}, errors {}",
                        label,
                        outcome.created,
                        outcome.updated,
                        outcome.skipped,
                        outcome.errors.len()
                    );
                    for record_error in &outcome.errors {
                        warn!("{} record error: {}", label, record_error);
                    }
                    summary.posted += batch.len();
                    summary.created += outcome.created;
                    summary.updated += outcome.updated;
                    summary.skipped += outcome.skipped;
                    summary.errors += outcome.errors.len() as u64;
                    RunMetrics::record_batch("ok", batch.len());
                }
                Err(e) => {
                    error!("{} of {} events failed: {}", label, batch.len(), e);
                    summary.errors += batch.len() as u64;
                    RunMetrics::record_batch("failed", batch.len());
                }
            }
        }
    }
}

fn write_snapshot(dir: &Path, events: &[Event]) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("events_{timestamp}.json"));
    fs::write(&path, serde_json::to_string_pretty(events)?)?;
    Ok(path)
}

fn log_summary(summary: &RunSummary) {
    for s in &summary.sources {
        info!(source = %s.source, status = %s.status, listings = s.listings, events = s.events, "Source result");
    }
    info!(
        run_id = %summary.run_id,
        total_events = summary.total_events,
        posted = summary.posted,
        created = summary.created,
        updated = summary.updated,
        skipped = summary.skipped,
        errors = summary.errors,
        elapsed_secs = summary.elapsed_secs,
        "Run complete"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::IngestOutcome;
    use crate::infra::scripted_session::ScriptedSession;
    use crate::types::{RawListing, SiteDefaults};
    use std::sync::{Arc, Mutex};

    struct Fixed(Vec<RawListing>);

    #[async_trait::async_trait]
    impl SiteExtractor for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn defaults(&self) -> SiteDefaults {
            SiteDefaults::new("Fixed", "fx", "https://fixed.test/")
        }

        async fn extract(&self, _page: &mut dyn PageSession, _ctx: &ExtractContext) -> Result<Vec<RawListing>> {
            Ok(self.0.clone())
        }
    }

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<usize>>>);

    #[async_trait::async_trait]
    impl IngestPort for Recorder {
        async fn submit(&self, events: &[Event]) -> Result<IngestOutcome> {
            self.0.lock().unwrap().push(events.len());
            Ok(IngestOutcome { created: events.len() as u64, ..Default::default() })
        }
    }

    fn listing(title: &str, date: &str) -> RawListing {
        RawListing { date_text: Some(date.into()), ..RawListing::titled(title) }
    }

    #[tokio::test]
    async fn chunks_into_batches() {
        let listings = (1..=5).map(|d| listing(&format!("Summit {d}"), &format!("{d} March 2026"))).collect();
        let recorder = Recorder::default();
        let mut orchestrator =
            RunOrchestrator::new(Box::new(ScriptedSession::new()), Box::new(recorder.clone()), RunOptions::immediate(2))
                .with_extractor(Box::new(Fixed(listings)), true);

        let summary = orchestrator.run().await.unwrap();
        assert_eq!(*recorder.0.lock().unwrap(), vec![2, 2, 1]);
        assert_eq!(summary.batches, 3);
        assert_eq!(summary.created, 5);
        assert_eq!(orchestrator.state(), RunState::Done);
    }

    #[tokio::test]
    async fn recurring_listings_with_one_title_are_all_sent() {
        let listings = vec![
            RawListing { native_id: Some("301".into()), ..listing("Dubai AI Builders Monthly", "10 February 2026") },
            RawListing { native_id: Some("302".into()), ..listing("Dubai AI Builders Monthly", "10 March 2026") },
        ];
        let recorder = Recorder::default();
        let mut orchestrator =
            RunOrchestrator::new(Box::new(ScriptedSession::new()), Box::new(recorder.clone()), RunOptions::immediate(10))
                .with_extractor(Box::new(Fixed(listings)), true);

        let summary = orchestrator.run().await.unwrap();
        assert_eq!(summary.total_events, 2);
        assert_eq!(*recorder.0.lock().unwrap(), vec![2]);
    }

    #[tokio::test]
    async fn dry_run_posts_nothing() {
        let recorder = Recorder::default();
        let mut options = RunOptions::immediate(10);
        options.dry_run = true;
        let mut orchestrator = RunOrchestrator::new(Box::new(ScriptedSession::new()), Box::new(recorder.clone()), options)
            .with_extractor(Box::new(Fixed(vec![listing("Expo", "2026-05-01")])), true);

        let summary = orchestrator.run().await.unwrap();
        assert!(recorder.0.lock().unwrap().is_empty());
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.posted, 0);
    }

    #[tokio::test]
    async fn disabled_extractors_are_skipped() {
        let mut orchestrator =
            RunOrchestrator::new(Box::new(ScriptedSession::new()), Box::new(Recorder::default()), RunOptions::immediate(10))
                .with_extractor(Box::new(Fixed(vec![listing("Expo", "2026-05-01")])), false);
        let summary = orchestrator.run().await.unwrap();
        assert_eq!(summary.source("fixed").unwrap().status, ExtractorStatus::Skipped);
        assert_eq!(summary.batches, 0);
    }

    #[tokio::test]
    async fn zero_batch_size_fails_the_run() {
        let mut orchestrator =
            RunOrchestrator::new(Box::new(ScriptedSession::new()), Box::new(Recorder::default()), RunOptions::immediate(0));
        assert!(orchestrator.run().await.is_err());
        assert_eq!(orchestrator.state(), RunState::Failed);
    }

    #[tokio::test]
    async fn writes_snapshot_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        let mut options = RunOptions::immediate(10);
        options.output_dir = Some(dir.path().to_path_buf());
        let mut orchestrator = RunOrchestrator::new(Box::new(ScriptedSession::new()), Box::new(Recorder::default()), options)
            .with_extractor(Box::new(Fixed(vec![listing("Expo", "2026-05-01")])), true);

        let summary = orchestrator.run().await.unwrap();
        let path = summary.snapshot.unwrap();
        let saved: Vec<Event> = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].source_event_id, "fx-expo");
    }
}
