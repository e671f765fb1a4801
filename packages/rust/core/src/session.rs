//! Typed, namespaced view over the persisted session state.
//!
//! Every value lives under one `(session_id, key)` row of the state store as
//! JSON. Keys are grouped in two namespaces:
//!
//! - `session/...`: selected entity, scope owner, cancellation flag, run claim, user inputs
//! - `{pipeline}/...`: run counter, current run, preamble log, one state per task
//!
//! Only [`CROSS_ENTITY_KEYS`] survive an entity switch.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use leadconsole_shared::{LastCompletedRun, LogLine, PipelineKind, PipelineRun, Result, TaskState};
use leadconsole_storage::Storage;

use crate::registry::{self, TaskDescriptor};

const ACTIVE_ENTITY: &str = "session/active_entity";
const SCOPE_ENTITY: &str = "session/scope_entity";
const CANCEL: &str = "session/cancel";
const USER: &str = "session/user";
const PIPELINE_SCOPE: &str = "session/pipeline_scope";
const BUSINESS_CONTEXT: &str = "session/business_context";
const LEAD_LIST_NAME: &str = "session/lead_list_name";
const RUN_CLAIM: &str = "session/run_claim";

/// State keys preserved when the selected entity changes.
pub const CROSS_ENTITY_KEYS: &[&str] = &[
    ACTIVE_ENTITY,
    USER,
    PIPELINE_SCOPE,
    BUSINESS_CONTEXT,
    LEAD_LIST_NAME,
    RUN_CLAIM,
    "ingest/run_counter",
    "score/run_counter",
];

fn pipeline_key(kind: PipelineKind, name: &str) -> String {
    format!("{}/{name}", kind.as_str())
}

fn task_key(kind: PipelineKind, task: &str) -> String {
    format!("{}/task/{task}", kind.as_str())
}

/// Marker held in the store for as long as a run executes.
///
/// At most one claim exists per session, across processes sharing the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunClaim {
    pub token: String,
    pub kind: PipelineKind,
    pub entity: String,
}

impl RunClaim {
    pub fn new(kind: PipelineKind, entity: &str) -> Self {
        Self {
            token: Uuid::now_v7().to_string(),
            kind,
            entity: entity.trim().to_string(),
        }
    }
}

/// Session-scoped persisted state.
#[derive(Clone)]
pub struct PipelineSessionState {
    storage: Arc<Storage>,
    session_id: String,
}

impl PipelineSessionState {
    pub fn new(storage: Arc<Storage>, session_id: impl Into<String>) -> Self {
        Self {
            storage,
            session_id: session_id.into(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.storage.get_state(&self.session_id, key).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn put<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        self.storage.put_state(&self.session_id, key, &json).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.storage.delete_state(&self.session_id, key).await
    }

    // -----------------------------------------------------------------------
    // Session namespace
    // -----------------------------------------------------------------------

    /// Entity currently selected by the user.
    pub async fn active_entity(&self) -> Result<Option<String>> {
        self.get(ACTIVE_ENTITY).await
    }

    pub async fn set_active_entity(&self, entity: &str) -> Result<()> {
        self.put(ACTIVE_ENTITY, entity).await
    }

    /// Entity that owns the per-entity state currently stored.
    pub async fn scope_entity(&self) -> Result<Option<String>> {
        self.get(SCOPE_ENTITY).await
    }

    pub async fn set_scope_entity(&self, entity: &str) -> Result<()> {
        self.put(SCOPE_ENTITY, entity).await
    }

    pub async fn cancel_requested(&self) -> Result<bool> {
        Ok(self.get::<bool>(CANCEL).await?.unwrap_or(false))
    }

    /// A cleared flag is stored as an absent key.
    pub async fn set_cancel_requested(&self, requested: bool) -> Result<()> {
        if requested {
            self.put(CANCEL, &true).await
        } else {
            self.delete(CANCEL).await
        }
    }

    pub async fn user(&self) -> Result<Option<String>> {
        self.get(USER).await
    }

    pub async fn set_user(&self, user: &str) -> Result<()> {
        self.put(USER, user).await
    }

    /// Pipeline last chosen by the user (tab or `--pipeline`).
    pub async fn pipeline_scope(&self) -> Result<Option<PipelineKind>> {
        self.get(PIPELINE_SCOPE).await
    }

    pub async fn set_pipeline_scope(&self, kind: PipelineKind) -> Result<()> {
        self.put(PIPELINE_SCOPE, &kind).await
    }

    pub async fn business_context(&self) -> Result<Option<String>> {
        self.get(BUSINESS_CONTEXT).await
    }

    pub async fn set_business_context(&self, text: &str) -> Result<()> {
        self.put(BUSINESS_CONTEXT, text).await
    }

    pub async fn lead_list_name(&self) -> Result<Option<String>> {
        self.get(LEAD_LIST_NAME).await
    }

    pub async fn set_lead_list_name(&self, name: &str) -> Result<()> {
        self.put(LEAD_LIST_NAME, name).await
    }

    // -----------------------------------------------------------------------
    // Pipeline namespace
    // -----------------------------------------------------------------------

    pub async fn run_counter(&self, kind: PipelineKind) -> Result<u64> {
        Ok(self
            .get::<u64>(&pipeline_key(kind, "run_counter"))
            .await?
            .unwrap_or(0))
    }

    /// Increment and return the run counter of `kind`.
    pub async fn next_run_id(&self, kind: PipelineKind) -> Result<u64> {
        let next = self.run_counter(kind).await? + 1;
        self.put(&pipeline_key(kind, "run_counter"), &next).await?;
        Ok(next)
    }

    pub async fn run(&self, kind: PipelineKind) -> Result<Option<PipelineRun>> {
        self.get(&pipeline_key(kind, "run")).await
    }

    pub async fn put_run(&self, run: &PipelineRun) -> Result<()> {
        self.put(&pipeline_key(run.kind, "run"), run).await
    }

    /// Lines streamed before the first task (scoring pipeline only).
    pub async fn preamble(&self, kind: PipelineKind) -> Result<Vec<LogLine>> {
        Ok(self
            .get(&pipeline_key(kind, "preamble"))
            .await?
            .unwrap_or_default())
    }

    pub async fn put_preamble(&self, kind: PipelineKind, lines: &[LogLine]) -> Result<()> {
        self.put(&pipeline_key(kind, "preamble"), lines).await
    }

    /// State of one task; `Pending` with no log when never written.
    pub async fn task_state(&self, kind: PipelineKind, task: &str) -> Result<TaskState> {
        Ok(self.get(&task_key(kind, task)).await?.unwrap_or_default())
    }

    pub async fn put_task_state(
        &self,
        kind: PipelineKind,
        task: &str,
        state: &TaskState,
    ) -> Result<()> {
        self.put(&task_key(kind, task), state).await
    }

    /// Every task of `kind` with its state, in registry order.
    pub async fn task_states(
        &self,
        kind: PipelineKind,
    ) -> Result<Vec<(&'static TaskDescriptor, TaskState)>> {
        let mut out = Vec::new();
        for task in registry::tasks(kind) {
            out.push((task, self.task_state(kind, task.key).await?));
        }
        Ok(out)
    }

    pub async fn last_completed(&self, kind: PipelineKind) -> Result<Option<LastCompletedRun>> {
        self.get(&pipeline_key(kind, "last_completed")).await
    }

    pub async fn put_last_completed(&self, completed: &LastCompletedRun) -> Result<()> {
        self.put(&pipeline_key(completed.kind, "last_completed"), completed)
            .await
    }

    // -----------------------------------------------------------------------
    // Run claim
    // -----------------------------------------------------------------------

    /// Claim currently held, if a run is executing.
    pub async fn run_claim(&self) -> Result<Option<RunClaim>> {
        self.get(RUN_CLAIM).await
    }

    /// Store `claim` unless another one is held. Returns whether it was stored.
    pub async fn try_claim_run(&self, claim: &RunClaim) -> Result<bool> {
        let json = serde_json::to_string(claim)?;
        self.storage
            .try_claim_state(&self.session_id, RUN_CLAIM, &json)
            .await
    }

    /// Drop `claim` if it is still the one held.
    pub async fn release_run_claim(&self, claim: &RunClaim) -> Result<bool> {
        let json = serde_json::to_string(claim)?;
        self.storage
            .release_state(&self.session_id, RUN_CLAIM, &json)
            .await
    }

    /// Remove every per-entity key in one statement.
    pub async fn purge_entity_scope(&self) -> Result<usize> {
        self.storage
            .purge_state_except(&self.session_id, CROSS_ENTITY_KEYS)
            .await
    }

    /// Forget everything stored for this session.
    pub async fn reset(&self) -> Result<()> {
        self.storage.clear_session(&self.session_id).await
    }
}
