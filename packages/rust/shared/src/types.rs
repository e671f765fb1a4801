//! Core domain types for LeadConsole pipeline runs.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LeadConsoleError;

/// Placeholder rendered for any field the resolved record does not carry.
pub const MISSING_VALUE: &str = "(no value)";

// ---------------------------------------------------------------------------
// PipelineKind
// ---------------------------------------------------------------------------

/// The two pipelines a session can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineKind {
    /// Data ingestion and enrichment (five tasks).
    Ingest,
    /// Lead scoring and prioritization (three tasks, plus a preamble).
    Score,
}

impl PipelineKind {
    pub const ALL: [PipelineKind; 2] = [PipelineKind::Ingest, PipelineKind::Score];

    /// Stable key used in persisted state namespaces.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ingest => "ingest",
            Self::Score => "score",
        }
    }

    /// Human-readable pipeline title.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Ingest => "Data Ingestion & Enrichment",
            Self::Score => "Lead Scoring & Prioritization",
        }
    }
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineKind {
    type Err = LeadConsoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ingest" | "enrich" | "ingestion" => Ok(Self::Ingest),
            "score" | "scoring" | "lead-scoring" => Ok(Self::Score),
            other => Err(LeadConsoleError::validation(format!(
                "unknown pipeline {other:?} (expected \"ingest\" or \"score\")"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Task / run status
// ---------------------------------------------------------------------------

/// Lifecycle of one task within a run: `Pending -> Running -> {Done | Interrupted}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Running,
    Done,
    Interrupted,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Interrupted)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Done => "Done",
            Self::Interrupted => "Interrupted",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Terminal (or in-flight) status of a [`PipelineRun`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    InProgress,
    Completed,
    StoppedByUser,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InProgress => "in progress",
            Self::Completed => "completed",
            Self::StoppedByUser => "stopped by user",
        })
    }
}

// ---------------------------------------------------------------------------
// Log lines
// ---------------------------------------------------------------------------

/// Display classification of a streamed log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogClass {
    Title,
    Info,
    Success,
    Meta,
}

/// One streamed agent log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub class: LogClass,
    pub text: String,
}

impl LogLine {
    pub fn new(class: LogClass, text: impl Into<String>) -> Self {
        Self {
            class,
            text: text.into(),
        }
    }

    pub fn title(text: impl Into<String>) -> Self {
        Self::new(LogClass::Title, text)
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self::new(LogClass::Info, text)
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self::new(LogClass::Success, text)
    }

    pub fn meta(text: impl Into<String>) -> Self {
        Self::new(LogClass::Meta, text)
    }
}

// ---------------------------------------------------------------------------
// PipelineRun / TaskState
// ---------------------------------------------------------------------------

/// One execution attempt of a pipeline for one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    /// Monotonic per-session, per-pipeline counter.
    pub run_id: u64,
    pub kind: PipelineKind,
    /// Entity as typed by the user (trimmed).
    pub entity: String,
    pub created_at: DateTime<Utc>,
    pub status: RunStatus,
}

/// Mutable per-task state of the current run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskState {
    pub status: TaskStatus,
    #[serde(default)]
    pub log: Vec<LogLine>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detailed_log: Option<String>,
}

impl TaskState {
    /// Fraction of `total_lines` already streamed, clamped to `0..=100`.
    pub fn line_progress(&self, total_lines: usize) -> u8 {
        if total_lines == 0 {
            return 0;
        }
        ((self.log.len().min(total_lines) * 100) / total_lines) as u8
    }
}

// ---------------------------------------------------------------------------
// Rendered results
// ---------------------------------------------------------------------------

/// Display payload produced for a task once it completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultPayload {
    pub task_key: String,
    /// Optional heading shown above the fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
    pub fields: Vec<RenderedField>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedField {
    pub label: String,
    pub value: FieldValue,
}

impl RenderedField {
    pub fn new(label: impl Into<String>, value: FieldValue) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

/// A rendered field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    Bullets(Vec<Bullet>),
    Missing,
}

impl FieldValue {
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    /// Plain-text rendering, one bullet per line.
    pub fn to_plain_text(&self) -> String {
        match self {
            Self::Text(t) => t.clone(),
            Self::Missing => MISSING_VALUE.to_string(),
            Self::Bullets(items) => items
                .iter()
                .map(Bullet::to_plain_text)
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// One bullet of a multi-value field, optionally with a bold label and a source link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bullet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Bullet {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            label: None,
            text: text.into(),
            source: None,
        }
    }

    pub fn labeled(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            text: text.into(),
            source: None,
        }
    }

    pub fn to_plain_text(&self) -> String {
        let mut out = match &self.label {
            Some(label) => format!("• {label}: {}", self.text),
            None => format!("• {}", self.text),
        };
        if let Some(source) = &self.source {
            out.push_str(&format!(" (Source: {source})"));
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// One row of the entity data source, with columns in source order.
///
/// Null cells are kept as `None` so renderers can tell "absent" from "empty".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub fields: Vec<(String, Option<String>)>,
}

impl Record {
    pub fn new(fields: Vec<(String, Option<String>)>) -> Self {
        Self { fields }
    }

    /// Value of `column`, treating null and blank cells as absent.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .and_then(|(_, v)| v.as_deref())
            .filter(|v| !v.trim().is_empty())
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    /// Copy of the record without the named columns.
    pub fn without(&self, excluded: &[&str]) -> Self {
        Self {
            fields: self
                .fields
                .iter()
                .filter(|(name, _)| !excluded.contains(&name.as_str()))
                .cloned()
                .collect(),
        }
    }

    /// Copy of the record with columns renamed per `(from, to)` pairs.
    pub fn renamed(&self, renames: &[(&str, &str)]) -> Self {
        Self {
            fields: self
                .fields
                .iter()
                .map(|(name, value)| {
                    let new_name = renames
                        .iter()
                        .find(|(from, _)| from == name)
                        .map(|(_, to)| to.to_string())
                        .unwrap_or_else(|| name.clone());
                    (new_name, value.clone())
                })
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// LastCompletedRun
// ---------------------------------------------------------------------------

/// Artifacts retained after a run reaches `Completed`, consumed by exports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastCompletedRun {
    pub run_id: u64,
    pub kind: PipelineKind,
    pub entity: String,
    /// Resolved record minus excluded fields.
    pub record: Record,
    /// Detailed logs of every task, joined by a blank line.
    pub consolidated_log: String,
    pub completed_at: DateTime<Utc>,
}
