//! Pipeline orchestrator: launch → preamble → tasks in order → completion.
//!
//! Every mutation goes through [`PipelineSessionState`] as it happens, so a
//! process that only calls [`PipelineOrchestrator::rehydrate`] sees the same
//! partial progress as the process driving the run.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, Utc};
use tracing::{debug, info, instrument, warn};

use leadconsole_records::{RecordSource, RecordTable};
use leadconsole_shared::{
    DEFAULT_BUSINESS_CONTEXT, DEFAULT_LEAD_LIST_NAME, LastCompletedRun, LeadConsoleError, LogLine,
    PipelineKind, PipelineRun, Record, Result, ResultPayload, RunStatus, TaskState, TaskStatus,
};
use leadconsole_storage::Storage;

use crate::cache::ResultCache;
use crate::cancel::CancellationSignal;
use crate::registry::{self, TaskDescriptor};
use crate::render::{RenderContext, render_result};
use crate::scope::{EntityScopeGuard, ScopeOutcome};
use crate::session::{PipelineSessionState, RunClaim};
use crate::steps::{self, DetailedLogRequest};

/// Columns dropped from the record kept for export.
const EXPORT_EXCLUDED_COLUMNS: &[&str] = &["lead_priority_label", "_company_key"];

/// Column renames applied to the record kept for export.
const EXPORT_RENAMED_COLUMNS: &[(&str, &str)] =
    &[("company_name", "Company Name"), ("unique_id", "Unique ID")];

// ---------------------------------------------------------------------------
// Pacing
// ---------------------------------------------------------------------------

/// Delay between streamed log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// No delay (tests, headless runs).
    Immediate,
    /// Fixed delay after every line.
    Fixed(Duration),
}

impl Pacing {
    pub fn from_millis(ms: u64) -> Self {
        if ms == 0 {
            Self::Immediate
        } else {
            Self::Fixed(Duration::from_millis(ms))
        }
    }

    /// Wait out the delay, returning early once `cancel` is raised in-process.
    async fn pause(&self, cancel: &CancellationSignal) {
        if let Self::Fixed(delay) = self {
            tokio::select! {
                () = tokio::time::sleep(*delay) => {}
                () = cancel.raised() => {}
            }
        }
    }
}

/// What a run does after a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Checkpoint {
    Continue,
    /// A stop was requested.
    Stop,
    /// The stored state was handed to another entity (or reset).
    ScopeLost,
}

// ---------------------------------------------------------------------------
// Observer
// ---------------------------------------------------------------------------

/// Live notifications emitted while a run executes.
///
/// Persisted state is always written before the matching callback fires.
pub trait PipelineObserver: Send + Sync {
    fn run_started(&self, _run: &PipelineRun, _total_tasks: usize) {}
    /// A task moved to `Running`, before any of its lines are streamed.
    fn task_started(&self, _task: &TaskDescriptor, _index: usize) {}
    /// One streamed line. `task` is `None` for preamble lines; `task_pct` is
    /// the share of the task's lines streamed so far.
    fn log_line(&self, _task: Option<&TaskDescriptor>, _line: &LogLine, _task_pct: u8) {}
    fn task_finished(&self, _task: &TaskDescriptor, _overall_pct: u8) {}
    /// The run stopped at a checkpoint inside `task` (or inside the preamble).
    fn task_interrupted(&self, _task: Option<&TaskDescriptor>) {}
    fn run_finished(&self, _run: &PipelineRun) {}
}

/// No-op observer for headless/test usage.
pub struct SilentObserver;

impl PipelineObserver for SilentObserver {}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Display state of one task, read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSnapshot {
    pub task: &'static TaskDescriptor,
    pub state: TaskState,
    /// Result cached for the active entity, if any.
    pub cached_result: Option<ResultPayload>,
}

impl TaskSnapshot {
    /// Result to display: the task's own, else the cached one.
    pub fn result(&self) -> Option<&ResultPayload> {
        self.state.result.as_ref().or(self.cached_result.as_ref())
    }
}

/// Everything a render pass needs for one pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSnapshot {
    pub kind: PipelineKind,
    pub active_entity: Option<String>,
    pub run: Option<PipelineRun>,
    pub preamble: Vec<LogLine>,
    pub tasks: Vec<TaskSnapshot>,
    pub cancel_requested: bool,
    pub last_completed: Option<LastCompletedRun>,
    /// Share of tasks in `Done`, `0..=100`.
    pub progress_pct: u8,
}

impl PipelineSnapshot {
    pub fn is_running(&self) -> bool {
        self.run
            .as_ref()
            .is_some_and(|r| r.status == RunStatus::InProgress)
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Drives pipeline runs for one session.
pub struct PipelineOrchestrator {
    state: PipelineSessionState,
    cache: ResultCache,
    records: Arc<dyn RecordSource>,
    prioritization: Option<Arc<RecordTable>>,
    cancel: CancellationSignal,
    pacing: Pacing,
}

impl PipelineOrchestrator {
    pub fn new(
        storage: Arc<Storage>,
        session_id: impl Into<String>,
        records: Arc<dyn RecordSource>,
    ) -> Self {
        let session_id = session_id.into();
        let state = PipelineSessionState::new(storage.clone(), session_id.clone());
        Self {
            cache: ResultCache::new(storage, session_id),
            cancel: CancellationSignal::new(state.clone()),
            state,
            records,
            prioritization: None,
            pacing: Pacing::Immediate,
        }
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Scored lead list rendered by the prioritization task.
    pub fn with_prioritization(mut self, table: Arc<RecordTable>) -> Self {
        self.prioritization = Some(table);
        self
    }

    pub fn state(&self) -> &PipelineSessionState {
        &self.state
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn cancel_signal(&self) -> CancellationSignal {
        self.cancel.clone()
    }

    pub fn prioritization(&self) -> Option<&RecordTable> {
        self.prioritization.as_deref()
    }

    /// Validate `entity` and resolve its record. Writes nothing.
    pub fn resolve(&self, entity: &str) -> Result<Record> {
        let entity = entity.trim();
        if entity.is_empty() {
            return Err(LeadConsoleError::invalid_input("entity name is empty"));
        }
        self.records
            .resolve(entity)
            .ok_or_else(|| LeadConsoleError::entity_not_found(entity))
    }

    /// Run `kind` for `entity` to completion or until a stop is observed.
    ///
    /// Returns the run in its terminal state (`Completed` or `StoppedByUser`).
    /// `InvalidInput` and `EntityNotFound` are returned before any state is
    /// written. `RunInProgress` is returned while any run of the session holds
    /// the run claim, including runs driven by another process.
    #[instrument(skip_all, fields(entity = entity.trim(), pipeline = %kind))]
    pub async fn launch(
        &self,
        entity: &str,
        kind: PipelineKind,
        observer: &dyn PipelineObserver,
    ) -> Result<PipelineRun> {
        let record = self.resolve(entity)?;
        let entity = entity.trim();

        let claim = RunClaim::new(kind, entity);
        if !self.state.try_claim_run(&claim).await? {
            let holder = self.state.run_claim().await?.map_or(kind, |c| c.kind);
            return Err(LeadConsoleError::RunInProgress {
                pipeline: holder.to_string(),
            });
        }

        let result = self.run_claimed(entity, kind, record, observer).await;
        let released = self.state.release_run_claim(&claim).await;
        let run = result?;
        if !released? {
            debug!(run_id = run.run_id, "run claim was already gone");
        }
        Ok(run)
    }

    async fn run_claimed(
        &self,
        entity: &str,
        kind: PipelineKind,
        record: Record,
        observer: &dyn PipelineObserver,
    ) -> Result<PipelineRun> {
        // --- Phase 1: Reset run state ---
        EntityScopeGuard::enforce(&self.state, &self.cache, entity).await?;
        self.state.set_active_entity(entity).await?;
        self.cancel.clear().await?;

        let started = Local::now().fixed_offset();
        let mut run = PipelineRun {
            run_id: self.state.next_run_id(kind).await?,
            kind,
            entity: entity.to_string(),
            created_at: started.with_timezone(&Utc),
            status: RunStatus::InProgress,
        };
        self.state.put_run(&run).await?;
        self.state.put_preamble(kind, &[]).await?;

        let tasks = registry::tasks(kind);
        for task in tasks {
            self.state
                .put_task_state(kind, task.key, &TaskState::default())
                .await?;
        }
        let invalidated = self.cache.invalidate_pipeline(kind, entity).await?;

        info!(run_id = run.run_id, invalidated, "starting run");
        observer.run_started(&run, tasks.len());

        // --- Phase 2: Preamble ---
        if kind == PipelineKind::Score {
            let lead_list = self
                .state
                .lead_list_name()
                .await?
                .unwrap_or_else(|| DEFAULT_LEAD_LIST_NAME.to_string());
            let mut streamed = Vec::new();
            for line in steps::scoring_preamble(&lead_list, self.records.record_count()) {
                streamed.push(line.clone());
                self.state.put_preamble(kind, &streamed).await?;
                observer.log_line(None, &line, 0);
                self.pacing.pause(&self.cancel).await;
                match self.checkpoint(entity).await? {
                    Checkpoint::Continue => {}
                    Checkpoint::Stop => {
                        info!(run_id = run.run_id, "stopped during preamble");
                        observer.task_interrupted(None);
                        run.status = RunStatus::StoppedByUser;
                        return self.finish(run, observer).await;
                    }
                    Checkpoint::ScopeLost => return Ok(self.abandon(run, None, observer)),
                }
            }
        }

        // --- Phase 3: Tasks ---
        let business_context = self
            .state
            .business_context()
            .await?
            .unwrap_or_else(|| DEFAULT_BUSINESS_CONTEXT.to_string());
        let render_ctx = RenderContext {
            business_context: &business_context,
            prioritization: self.prioritization.as_deref(),
        };
        let website = record.get("Official Domain").unwrap_or_default();
        let mut detailed_logs = Vec::with_capacity(tasks.len());

        for (index, task) in tasks.iter().enumerate() {
            let mut task_state = TaskState {
                status: TaskStatus::Running,
                ..TaskState::default()
            };
            self.state.put_task_state(kind, task.key, &task_state).await?;
            observer.task_started(task, index);

            let lines = steps::generate(kind, task.key, entity);
            let total_lines = lines.len();
            let mut checkpoint = self.checkpoint(entity).await?;
            if checkpoint == Checkpoint::Continue {
                for line in lines {
                    task_state.log.push(line.clone());
                    self.state.put_task_state(kind, task.key, &task_state).await?;
                    observer.log_line(Some(task), &line, task_state.line_progress(total_lines));
                    self.pacing.pause(&self.cancel).await;
                    checkpoint = self.checkpoint(entity).await?;
                    if checkpoint != Checkpoint::Continue {
                        break;
                    }
                }
            }

            match checkpoint {
                Checkpoint::Continue => {}
                Checkpoint::Stop => {
                    task_state.status = TaskStatus::Interrupted;
                    self.state.put_task_state(kind, task.key, &task_state).await?;
                    info!(run_id = run.run_id, task = task.key, "task interrupted by user");
                    observer.task_interrupted(Some(task));
                    run.status = RunStatus::StoppedByUser;
                    return self.finish(run, observer).await;
                }
                Checkpoint::ScopeLost => return Ok(self.abandon(run, Some(task), observer)),
            }

            let payload = render_result(kind, task, &record, &render_ctx);
            let detailed = steps::detailed_log(&DetailedLogRequest {
                kind,
                task_key: task.key,
                entity,
                website,
                run_ts: Some(started),
            });
            self.cache
                .put(kind, task.key, entity, &payload, run.run_id)
                .await?;

            task_state.status = TaskStatus::Done;
            task_state.result = Some(payload);
            task_state.detailed_log = Some(detailed.clone());
            self.state.put_task_state(kind, task.key, &task_state).await?;
            detailed_logs.push(detailed);

            debug!(task = task.key, "task done");
            observer.task_finished(task, overall_pct(index + 1, tasks.len()));
        }

        // --- Phase 4: Completion ---
        let completed = LastCompletedRun {
            run_id: run.run_id,
            kind,
            entity: entity.to_string(),
            record: record
                .without(EXPORT_EXCLUDED_COLUMNS)
                .renamed(EXPORT_RENAMED_COLUMNS),
            consolidated_log: detailed_logs.join("\n\n"),
            completed_at: Utc::now(),
        };
        self.state.put_last_completed(&completed).await?;

        run.status = RunStatus::Completed;
        self.finish(run, observer).await
    }

    /// Stop before the next write if the stored state no longer belongs to `entity`.
    async fn checkpoint(&self, entity: &str) -> Result<Checkpoint> {
        if !EntityScopeGuard::is_current(&self.state, entity).await? {
            return Ok(Checkpoint::ScopeLost);
        }
        if self.cancel.is_set().await? {
            return Ok(Checkpoint::Stop);
        }
        Ok(Checkpoint::Continue)
    }

    /// End a run whose entity lost the stored state. Writes nothing.
    fn abandon(
        &self,
        mut run: PipelineRun,
        task: Option<&TaskDescriptor>,
        observer: &dyn PipelineObserver,
    ) -> PipelineRun {
        warn!(
            run_id = run.run_id,
            entity = %run.entity,
            "stored state now belongs to another entity, abandoning run"
        );
        observer.task_interrupted(task);
        run.status = RunStatus::StoppedByUser;
        observer.run_finished(&run);
        run
    }

    async fn finish(&self, run: PipelineRun, observer: &dyn PipelineObserver) -> Result<PipelineRun> {
        self.state.put_run(&run).await?;
        info!(run_id = run.run_id, status = %run.status, "run finished");
        observer.run_finished(&run);
        Ok(run)
    }

    /// Ask the running pipeline to stop at its next checkpoint.
    ///
    /// Returns `false` without touching anything when no run holds the claim.
    /// Safe to call repeatedly and from another process sharing the store.
    pub async fn request_stop(&self) -> Result<bool> {
        let Some(claim) = self.state.run_claim().await? else {
            debug!("stop requested with no run in progress");
            return Ok(false);
        };
        self.cancel.request_stop().await?;
        info!(pipeline = %claim.kind, entity = %claim.entity, "stop requested");
        Ok(true)
    }

    /// Read back everything stored for `kind`. Never writes.
    pub async fn rehydrate(&self, kind: PipelineKind) -> Result<PipelineSnapshot> {
        let active_entity = self.state.active_entity().await?;
        let mut tasks = Vec::new();
        for (task, state) in self.state.task_states(kind).await? {
            let cached_result = match &active_entity {
                Some(entity) => self
                    .cache
                    .get(kind, task.key, entity)
                    .await?
                    .map(|(payload, _)| payload),
                None => None,
            };
            tasks.push(TaskSnapshot {
                task,
                state,
                cached_result,
            });
        }

        let done = tasks
            .iter()
            .filter(|t| t.state.status == TaskStatus::Done)
            .count();

        Ok(PipelineSnapshot {
            kind,
            run: self.state.run(kind).await?,
            preamble: self.state.preamble(kind).await?,
            cancel_requested: self.state.cancel_requested().await?,
            last_completed: self.state.last_completed(kind).await?,
            progress_pct: overall_pct(done, tasks.len()),
            active_entity,
            tasks,
        })
    }

    /// Record `entity` as the user's selection and enforce its scope.
    ///
    /// Fails with `RunInProgress`, selecting nothing, while a run for another
    /// entity is executing.
    pub async fn select_entity(&self, entity: &str) -> Result<ScopeOutcome> {
        let entity = entity.trim();
        if entity.is_empty() {
            return Err(LeadConsoleError::invalid_input("entity name is empty"));
        }
        let outcome = EntityScopeGuard::enforce(&self.state, &self.cache, entity).await?;
        self.state.set_active_entity(entity).await?;
        Ok(outcome)
    }

    /// Enforce the scope of the currently selected entity, if any.
    pub async fn enforce_scope(&self) -> Result<ScopeOutcome> {
        match self.state.active_entity().await? {
            Some(entity) => EntityScopeGuard::enforce(&self.state, &self.cache, &entity).await,
            None => Ok(ScopeOutcome::Unchanged),
        }
    }

    /// Whether the stored per-entity state belongs to the selected entity. Never writes.
    pub async fn scope_is_current(&self) -> Result<bool> {
        match self.state.active_entity().await? {
            Some(entity) => EntityScopeGuard::is_current(&self.state, &entity).await,
            None => Ok(true),
        }
    }

    /// Forget all session state and cached results.
    pub async fn reset(&self) -> Result<()> {
        self.state.reset().await?;
        info!(session = self.state.session_id(), "session reset");
        Ok(())
    }
}

fn overall_pct(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((done.min(total) * 100) / total) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use leadconsole_shared::LogClass;
    use tokio::sync::Notify;
    use uuid::Uuid;

    async fn test_storage() -> Arc<Storage> {
        let tmp = std::env::temp_dir().join(format!("lc_test_{}.db", Uuid::now_v7()));
        Arc::new(Storage::open(&tmp).await.expect("open test db"))
    }

    async fn test_orchestrator() -> PipelineOrchestrator {
        orchestrator_on(test_storage().await)
    }

    /// Another handle on the same store, as a second process would hold.
    fn orchestrator_on(storage: Arc<Storage>) -> PipelineOrchestrator {
        let records = Arc::new(RecordTable::demo().expect("demo dataset"));
        let prioritization =
            Arc::new(leadconsole_records::demo_prioritization().expect("prioritization"));
        PipelineOrchestrator::new(storage, "test", records).with_prioritization(prioritization)
    }

    fn paced(orch: PipelineOrchestrator) -> PipelineOrchestrator {
        orch.with_pacing(Pacing::Fixed(Duration::from_millis(20)))
    }

    fn statuses(snapshot: &PipelineSnapshot) -> Vec<TaskStatus> {
        snapshot.tasks.iter().map(|t| t.state.status).collect()
    }

    /// Raises the local stop flag after `after` task completions.
    struct StopAfterTasks {
        signal: CancellationSignal,
        after: usize,
        finished: AtomicUsize,
    }

    impl PipelineObserver for StopAfterTasks {
        fn task_finished(&self, _task: &TaskDescriptor, _overall_pct: u8) {
            if self.finished.fetch_add(1, Ordering::SeqCst) + 1 == self.after {
                self.signal.raise();
            }
        }
    }

    /// Raises the local stop flag after `after` preamble lines.
    struct StopInPreamble {
        signal: CancellationSignal,
        after: usize,
        seen: AtomicUsize,
    }

    impl PipelineObserver for StopInPreamble {
        fn log_line(&self, task: Option<&TaskDescriptor>, _line: &LogLine, _pct: u8) {
            if task.is_none() && self.seen.fetch_add(1, Ordering::SeqCst) + 1 == self.after {
                self.signal.raise();
            }
        }
    }

    /// Raises the local stop flag once `after` lines of `task_key` are streamed.
    struct StopAfterLines {
        signal: CancellationSignal,
        task_key: &'static str,
        after: usize,
        seen: AtomicUsize,
    }

    impl PipelineObserver for StopAfterLines {
        fn log_line(&self, task: Option<&TaskDescriptor>, _line: &LogLine, _pct: u8) {
            if task.is_some_and(|t| t.key == self.task_key)
                && self.seen.fetch_add(1, Ordering::SeqCst) + 1 == self.after
            {
                self.signal.raise();
            }
        }
    }

    /// Wakes a waiter after the first finished task.
    struct NotifyOnFirstTask(Arc<Notify>);

    impl PipelineObserver for NotifyOnFirstTask {
        fn task_finished(&self, _task: &TaskDescriptor, _overall_pct: u8) {
            self.0.notify_one();
        }
    }

    struct NotifyOnStart(Arc<Notify>);

    impl PipelineObserver for NotifyOnStart {
        fn run_started(&self, _run: &PipelineRun, _total_tasks: usize) {
            self.0.notify_one();
        }
    }

    #[tokio::test]
    async fn empty_entity_is_invalid_and_writes_nothing() {
        let orch = test_orchestrator().await;
        let err = orch
            .launch("   ", PipelineKind::Ingest, &SilentObserver)
            .await
            .unwrap_err();
        assert!(matches!(err, LeadConsoleError::InvalidInput { .. }));
        assert!(
            orch.state()
                .storage()
                .list_state_keys("test")
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn unknown_entity_is_not_found_and_writes_nothing() {
        let orch = test_orchestrator().await;
        let err = orch
            .launch("Unknown Corp", PipelineKind::Ingest, &SilentObserver)
            .await
            .unwrap_err();
        assert!(matches!(err, LeadConsoleError::EntityNotFound { .. }));
        assert!(
            orch.state()
                .storage()
                .list_state_keys("test")
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn full_run_completes_every_task() {
        let orch = test_orchestrator().await;
        let run = orch
            .launch("VeriSign", PipelineKind::Ingest, &SilentObserver)
            .await
            .unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.run_id, 1);

        let snapshot = orch.rehydrate(PipelineKind::Ingest).await.unwrap();
        assert_eq!(snapshot.progress_pct, 100);
        assert!(
            snapshot
                .tasks
                .iter()
                .all(|t| t.state.status == TaskStatus::Done && t.result().is_some())
        );
        for t in &snapshot.tasks {
            assert_eq!(t.state.log.last().map(|l| l.class), Some(LogClass::Meta));
        }
        assert_eq!(
            orch.cache()
                .count(PipelineKind::Ingest, "VeriSign")
                .await
                .unwrap(),
            registry::tasks(PipelineKind::Ingest).len()
        );

        let completed = snapshot.last_completed.expect("last completed run");
        assert_eq!(completed.entity, "VeriSign");
        assert!(completed.record.get("lead_priority_label").is_none());
        assert_eq!(completed.record.get("Company Name"), Some("VeriSign"));
        assert_eq!(
            completed.consolidated_log.matches("=== AGENTIC PIPELINE DETAILED LOG ===").count(),
            5
        );
    }

    #[tokio::test]
    async fn stop_after_first_task_interrupts_second() {
        let orch = test_orchestrator().await;
        let observer = StopAfterTasks {
            signal: orch.cancel_signal(),
            after: 1,
            finished: AtomicUsize::new(0),
        };
        let run = orch
            .launch("Wolfspeed", PipelineKind::Ingest, &observer)
            .await
            .unwrap();
        assert_eq!(run.status, RunStatus::StoppedByUser);

        let snapshot = orch.rehydrate(PipelineKind::Ingest).await.unwrap();
        let statuses: Vec<_> = snapshot.tasks.iter().map(|t| t.state.status).collect();
        assert_eq!(
            statuses,
            [
                TaskStatus::Done,
                TaskStatus::Interrupted,
                TaskStatus::Pending,
                TaskStatus::Pending,
                TaskStatus::Pending,
            ]
        );
        assert_eq!(snapshot.progress_pct, 20);
        assert!(snapshot.last_completed.is_none());

        let cache = orch.cache();
        assert!(
            cache
                .get(PipelineKind::Ingest, "website", "Wolfspeed")
                .await
                .unwrap()
                .is_some()
        );
        assert!(
            cache
                .get(PipelineKind::Ingest, "firmo", "Wolfspeed")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn stop_during_preamble_leaves_tasks_pending() {
        let orch = test_orchestrator().await;
        let observer = StopInPreamble {
            signal: orch.cancel_signal(),
            after: 2,
            seen: AtomicUsize::new(0),
        };
        let run = orch
            .launch("VF Corporation", PipelineKind::Score, &observer)
            .await
            .unwrap();
        assert_eq!(run.status, RunStatus::StoppedByUser);

        let snapshot = orch.rehydrate(PipelineKind::Score).await.unwrap();
        assert_eq!(snapshot.preamble.len(), 2);
        assert!(
            snapshot
                .tasks
                .iter()
                .all(|t| t.state.status == TaskStatus::Pending)
        );
    }

    #[tokio::test]
    async fn scoring_run_renders_prioritization() {
        let orch = test_orchestrator().await;
        orch.state()
            .set_business_context("Win mid-market fiber deals.")
            .await
            .unwrap();
        let run = orch
            .launch("VF Corporation", PipelineKind::Score, &SilentObserver)
            .await
            .unwrap();
        assert_eq!(run.status, RunStatus::Completed);

        let snapshot = orch.rehydrate(PipelineKind::Score).await.unwrap();
        assert_eq!(snapshot.preamble.len(), 7);
        let context = snapshot.tasks[0].result().expect("business context result");
        assert_eq!(
            context.fields[0].value.to_plain_text(),
            "Win mid-market fiber deals."
        );
        let table = snapshot.tasks[2].result().expect("prioritization result");
        assert_eq!(table.fields.len(), 7);
    }

    #[tokio::test]
    async fn entity_switch_drops_previous_results() {
        let orch = test_orchestrator().await;
        orch.launch("VeriSign", PipelineKind::Ingest, &SilentObserver)
            .await
            .unwrap();
        assert!(
            orch.cache()
                .get(PipelineKind::Ingest, "website", "VeriSign")
                .await
                .unwrap()
                .is_some()
        );

        let outcome = orch.select_entity("Wolfspeed").await.unwrap();
        assert!(matches!(outcome, ScopeOutcome::Switched { .. }));
        assert!(
            orch.cache()
                .get(PipelineKind::Ingest, "website", "VeriSign")
                .await
                .unwrap()
                .is_none()
        );

        let snapshot = orch.rehydrate(PipelineKind::Ingest).await.unwrap();
        assert_eq!(snapshot.active_entity.as_deref(), Some("Wolfspeed"));
        assert!(snapshot.run.is_none());
        assert!(snapshot.last_completed.is_none());
        assert!(
            snapshot
                .tasks
                .iter()
                .all(|t| t.state.status == TaskStatus::Pending)
        );
    }

    #[tokio::test]
    async fn relaunch_overwrites_interrupted_run() {
        let orch = test_orchestrator().await;
        let observer = StopAfterTasks {
            signal: orch.cancel_signal(),
            after: 2,
            finished: AtomicUsize::new(0),
        };
        orch.launch("Aroma360", PipelineKind::Ingest, &observer)
            .await
            .unwrap();

        let run = orch
            .launch("Aroma360", PipelineKind::Ingest, &SilentObserver)
            .await
            .unwrap();
        assert_eq!(run.run_id, 2);
        assert_eq!(run.status, RunStatus::Completed);

        let (_, run_id) = orch
            .cache()
            .get(PipelineKind::Ingest, "website", "Aroma360")
            .await
            .unwrap()
            .expect("cached");
        assert_eq!(run_id, 2);
        assert_eq!(
            orch.cache()
                .count(PipelineKind::Ingest, "Aroma360")
                .await
                .unwrap(),
            5
        );
        let snapshot = orch.rehydrate(PipelineKind::Ingest).await.unwrap();
        assert!(!snapshot.cancel_requested);
    }

    #[tokio::test]
    async fn second_launch_while_running_is_rejected() {
        let orch = test_orchestrator()
            .await
            .with_pacing(Pacing::Fixed(Duration::from_millis(20)));
        let started = Arc::new(Notify::new());
        let observer = NotifyOnStart(started.clone());

        let (first, second) = tokio::join!(
            orch.launch("VeriSign", PipelineKind::Ingest, &observer),
            async {
                started.notified().await;
                orch.launch("VeriSign", PipelineKind::Ingest, &SilentObserver)
                    .await
            }
        );
        assert_eq!(first.unwrap().status, RunStatus::Completed);
        assert!(matches!(
            second.unwrap_err(),
            LeadConsoleError::RunInProgress { .. }
        ));
    }

    #[tokio::test]
    async fn stop_without_run_is_a_no_op() {
        let orch = test_orchestrator().await;
        assert!(!orch.request_stop().await.unwrap());
        assert!(!orch.state().cancel_requested().await.unwrap());

        orch.launch("VeriSign", PipelineKind::Ingest, &SilentObserver)
            .await
            .unwrap();
        assert!(!orch.request_stop().await.unwrap());
    }

    #[tokio::test]
    async fn rehydrate_does_not_write() {
        let orch = test_orchestrator().await;
        let observer = StopAfterTasks {
            signal: orch.cancel_signal(),
            after: 3,
            finished: AtomicUsize::new(0),
        };
        orch.launch("SigmaTron International", PipelineKind::Ingest, &observer)
            .await
            .unwrap();

        let keys_before = orch.state().storage().list_state_keys("test").await.unwrap();
        let first = orch.rehydrate(PipelineKind::Ingest).await.unwrap();
        let second = orch.rehydrate(PipelineKind::Ingest).await.unwrap();
        let keys_after = orch.state().storage().list_state_keys("test").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(keys_before, keys_after);
        assert_eq!(first.tasks[3].state.status, TaskStatus::Interrupted);
    }

    #[tokio::test]
    async fn reset_clears_session() {
        let orch = test_orchestrator().await;
        orch.launch("VeriSign", PipelineKind::Ingest, &SilentObserver)
            .await
            .unwrap();
        orch.reset().await.unwrap();

        let snapshot = orch.rehydrate(PipelineKind::Ingest).await.unwrap();
        assert!(snapshot.active_entity.is_none());
        assert!(snapshot.run.is_none());
        assert_eq!(orch.state().run_counter(PipelineKind::Ingest).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn select_during_run_is_refused() {
        let orch = paced(test_orchestrator().await);
        let first_done = Arc::new(Notify::new());
        let observer = NotifyOnFirstTask(first_done.clone());

        let (run, selected) = tokio::join!(
            orch.launch("VeriSign", PipelineKind::Ingest, &observer),
            async {
                first_done.notified().await;
                orch.select_entity("Wolfspeed").await
            }
        );
        assert_eq!(run.unwrap().status, RunStatus::Completed);
        assert!(matches!(
            selected.unwrap_err(),
            LeadConsoleError::RunInProgress { .. }
        ));

        assert!(matches!(
            orch.enforce_scope().await.unwrap(),
            ScopeOutcome::Unchanged
        ));
        let snapshot = orch.rehydrate(PipelineKind::Ingest).await.unwrap();
        assert_eq!(snapshot.active_entity.as_deref(), Some("VeriSign"));
        assert!(snapshot.tasks.iter().all(|t| t.state.status == TaskStatus::Done));
        assert!(snapshot.tasks[1].state.log[1].text.contains("VeriSign"));

        // Once the run is over the switch goes through.
        assert!(matches!(
            orch.select_entity("Wolfspeed").await.unwrap(),
            ScopeOutcome::Switched { .. }
        ));
    }

    #[tokio::test]
    async fn run_stops_writing_after_reset_by_other_handle() {
        let storage = test_storage().await;
        let runner = paced(orchestrator_on(storage.clone()));
        let other = orchestrator_on(storage);
        let first_done = Arc::new(Notify::new());
        let observer = NotifyOnFirstTask(first_done.clone());

        let (run, reset) = tokio::join!(
            runner.launch("VeriSign", PipelineKind::Ingest, &observer),
            async {
                first_done.notified().await;
                other.reset().await
            }
        );
        reset.unwrap();
        assert_eq!(run.unwrap().status, RunStatus::StoppedByUser);

        let snapshot = other.rehydrate(PipelineKind::Ingest).await.unwrap();
        assert!(snapshot.run.is_none());
        assert!(snapshot.last_completed.is_none());
        assert!(snapshot.tasks.iter().all(|t| t.state.status != TaskStatus::Done));
        assert_eq!(
            other
                .cache()
                .count(PipelineKind::Ingest, "VeriSign")
                .await
                .unwrap(),
            0
        );
        assert!(other.state().run_claim().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn launch_from_other_process_is_rejected() {
        let tmp = std::env::temp_dir().join(format!("lc_test_{}.db", Uuid::now_v7()));
        let first = paced(orchestrator_on(Arc::new(Storage::open(&tmp).await.unwrap())));
        let second = orchestrator_on(Arc::new(Storage::open(&tmp).await.unwrap()));
        let first_done = Arc::new(Notify::new());
        let observer = NotifyOnFirstTask(first_done.clone());

        let (a, b) = tokio::join!(
            first.launch("VeriSign", PipelineKind::Ingest, &observer),
            async {
                first_done.notified().await;
                second
                    .launch("Wolfspeed", PipelineKind::Score, &SilentObserver)
                    .await
            }
        );
        assert_eq!(a.unwrap().status, RunStatus::Completed);
        assert!(matches!(
            b.unwrap_err(),
            LeadConsoleError::RunInProgress { ref pipeline } if pipeline == "ingest"
        ));
        assert_eq!(
            second.state().run_counter(PipelineKind::Score).await.unwrap(),
            0
        );

        let run = second
            .launch("VeriSign", PipelineKind::Ingest, &SilentObserver)
            .await
            .unwrap();
        assert_eq!(run.run_id, 2);
    }

    #[tokio::test]
    async fn abandoned_claim_blocks_until_reset() {
        let orch = test_orchestrator().await;
        let stale = RunClaim::new(PipelineKind::Score, "VF Corporation");
        assert!(orch.state().try_claim_run(&stale).await.unwrap());

        let err = orch
            .launch("VeriSign", PipelineKind::Ingest, &SilentObserver)
            .await
            .unwrap_err();
        assert!(matches!(err, LeadConsoleError::RunInProgress { ref pipeline } if pipeline == "score"));
        assert!(orch.state().active_entity().await.unwrap().is_none());

        orch.reset().await.unwrap();
        let run = orch
            .launch("VeriSign", PipelineKind::Ingest, &SilentObserver)
            .await
            .unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert!(orch.state().run_claim().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stop_from_other_handle_interrupts_current_task() {
        let tmp = std::env::temp_dir().join(format!("lc_test_{}.db", Uuid::now_v7()));
        let runner = paced(orchestrator_on(Arc::new(Storage::open(&tmp).await.unwrap())));
        let stopper = orchestrator_on(Arc::new(Storage::open(&tmp).await.unwrap()));
        let first_done = Arc::new(Notify::new());
        let observer = NotifyOnFirstTask(first_done.clone());

        let (run, stopped) = tokio::join!(
            runner.launch("Wolfspeed", PipelineKind::Ingest, &observer),
            async {
                first_done.notified().await;
                stopper.request_stop().await
            }
        );
        assert!(stopped.unwrap());
        assert_eq!(run.unwrap().status, RunStatus::StoppedByUser);

        let snapshot = stopper.rehydrate(PipelineKind::Ingest).await.unwrap();
        assert_eq!(
            statuses(&snapshot),
            [
                TaskStatus::Done,
                TaskStatus::Interrupted,
                TaskStatus::Pending,
                TaskStatus::Pending,
                TaskStatus::Pending,
            ]
        );
        let firmo_log = &snapshot.tasks[1].state.log;
        assert!(!firmo_log.is_empty());
        assert!(firmo_log.len() < steps::generate(PipelineKind::Ingest, "firmo", "Wolfspeed").len());
        assert_eq!(snapshot.run.map(|r| r.status), Some(RunStatus::StoppedByUser));
    }

    #[tokio::test]
    async fn stop_mid_task_keeps_exactly_the_streamed_lines() {
        let orch = test_orchestrator().await;
        let observer = StopAfterLines {
            signal: orch.cancel_signal(),
            task_key: "techno",
            after: 3,
            seen: AtomicUsize::new(0),
        };
        let run = orch
            .launch("VeriSign", PipelineKind::Ingest, &observer)
            .await
            .unwrap();
        assert_eq!(run.status, RunStatus::StoppedByUser);

        let snapshot = orch.rehydrate(PipelineKind::Ingest).await.unwrap();
        assert_eq!(
            statuses(&snapshot),
            [
                TaskStatus::Done,
                TaskStatus::Done,
                TaskStatus::Interrupted,
                TaskStatus::Pending,
                TaskStatus::Pending,
            ]
        );
        let techno = &snapshot.tasks[2];
        assert_eq!(techno.state.log.len(), 3);
        assert_eq!(
            techno.state.log[..],
            steps::generate(PipelineKind::Ingest, "techno", "VeriSign")[..3]
        );
        assert!(techno.result().is_none());
    }

    #[tokio::test]
    async fn local_stop_cuts_the_pause_short() {
        let orch = test_orchestrator()
            .await
            .with_pacing(Pacing::Fixed(Duration::from_secs(30)));
        let observer = StopAfterLines {
            signal: orch.cancel_signal(),
            task_key: "website",
            after: 1,
            seen: AtomicUsize::new(0),
        };

        let run = tokio::time::timeout(
            Duration::from_secs(5),
            orch.launch("VeriSign", PipelineKind::Ingest, &observer),
        )
        .await
        .expect("stop wakes the paced run")
        .unwrap();
        assert_eq!(run.status, RunStatus::StoppedByUser);

        let snapshot = orch.rehydrate(PipelineKind::Ingest).await.unwrap();
        assert_eq!(snapshot.tasks[0].state.status, TaskStatus::Interrupted);
        assert_eq!(snapshot.tasks[0].state.log.len(), 1);
    }

    #[tokio::test]
    async fn resolve_validates_without_writing() {
        let orch = test_orchestrator().await;
        assert!(matches!(
            orch.resolve("  ").unwrap_err(),
            LeadConsoleError::InvalidInput { .. }
        ));
        assert!(matches!(
            orch.resolve("Unknown Corp").unwrap_err(),
            LeadConsoleError::EntityNotFound { .. }
        ));
        let record = orch.resolve(" verisign ").unwrap();
        assert_eq!(record.get("company_name"), Some("VeriSign"));
        assert!(orch.state().storage().list_state_keys("test").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn scope_is_current_after_select() {
        let orch = test_orchestrator().await;
        assert!(orch.scope_is_current().await.unwrap());
        orch.select_entity("VeriSign").await.unwrap();
        assert!(orch.scope_is_current().await.unwrap());

        // A selection written without the guard is reported, not repaired.
        orch.state().set_active_entity("Wolfspeed").await.unwrap();
        assert!(!orch.scope_is_current().await.unwrap());
        assert_eq!(
            orch.state().scope_entity().await.unwrap().as_deref(),
            Some("VeriSign")
        );
    }

    #[test]
    fn pacing_from_millis() {
        assert_eq!(Pacing::from_millis(0), Pacing::Immediate);
        assert_eq!(
            Pacing::from_millis(600),
            Pacing::Fixed(Duration::from_millis(600))
        );
        assert_eq!(overall_pct(3, 5), 60);
        assert_eq!(overall_pct(0, 0), 0);
    }
}
