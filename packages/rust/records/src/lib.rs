//! Entity data source and record field formatting.
//!
//! A [`RecordTable`] is a tabular dataset (columns in source order, one row per
//! company) loaded from a JSON file of the shape
//! `{"name": ..., "columns": [...], "rows": [[...], ...]}`. Entities resolve
//! against the `company_name` column by normalized key, so `"Vf  Corporation"`
//! and `"VF-Corporation"` both find `"VF Corporation"`.

pub mod format;

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use leadconsole_shared::{LeadConsoleError, Record, Result};

/// Column holding the entity display name.
pub const ENTITY_COLUMN: &str = "company_name";

const DEMO_COMPANIES: &str = include_str!("../../../../fixtures/json/companies.fixture.json");
const DEMO_PRIORITIZATION: &str =
    include_str!("../../../../fixtures/json/prioritization.fixture.json");

// ---------------------------------------------------------------------------
// RecordSource
// ---------------------------------------------------------------------------

/// Resolves free-form entity names to records.
pub trait RecordSource: Send + Sync {
    /// The record matching `entity`, compared by [`normalize_entity_name`].
    fn resolve(&self, entity: &str) -> Option<Record>;

    /// Number of distinct records (accounts) in the source.
    fn record_count(&self) -> usize;

    /// Display names of every entity, in source order.
    fn entity_names(&self) -> Vec<String>;
}

// ---------------------------------------------------------------------------
// RecordTable
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawTable {
    #[serde(default)]
    name: String,
    columns: Vec<String>,
    rows: Vec<Vec<serde_json::Value>>,
}

/// An in-memory tabular dataset.
#[derive(Debug, Clone)]
pub struct RecordTable {
    pub name: String,
    pub columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl RecordTable {
    /// Parse a table from its JSON representation.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: RawTable = serde_json::from_str(json)
            .map_err(|e| LeadConsoleError::validation(format!("malformed dataset: {e}")))?;

        let width = raw.columns.len();
        let mut rows = Vec::with_capacity(raw.rows.len());
        for (i, row) in raw.rows.into_iter().enumerate() {
            if row.len() != width {
                return Err(LeadConsoleError::validation(format!(
                    "dataset row {i} has {} cells, expected {width}",
                    row.len()
                )));
            }
            rows.push(row.into_iter().map(cell_to_string).collect());
        }

        Ok(Self {
            name: raw.name,
            columns: raw.columns,
            rows,
        })
    }

    /// Load a table from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| LeadConsoleError::io(path, e))?;
        let table = Self::from_json_str(&content)?;
        debug!(path = %path.display(), rows = table.rows.len(), "loaded dataset");
        Ok(table)
    }

    /// The bundled Customer 360 demo dataset.
    pub fn demo() -> Result<Self> {
        Self::from_json_str(DEMO_COMPANIES)
    }

    /// Load from `path`, or fall back to the demo dataset when `path` is empty.
    pub fn load_or_demo(path: &str) -> Result<Self> {
        if path.trim().is_empty() {
            Self::demo()
        } else {
            Self::load(Path::new(path))
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All rows as records.
    pub fn records(&self) -> impl Iterator<Item = Record> + '_ {
        self.rows.iter().map(|row| self.to_record(row))
    }

    fn to_record(&self, row: &[Option<String>]) -> Record {
        Record::new(
            self.columns
                .iter()
                .cloned()
                .zip(row.iter().cloned())
                .collect(),
        )
    }

    fn entity_index(&self) -> Option<usize> {
        self.columns.iter().position(|c| c == ENTITY_COLUMN)
    }
}

impl RecordSource for RecordTable {
    fn resolve(&self, entity: &str) -> Option<Record> {
        let key = normalize_entity_name(entity);
        if key.is_empty() {
            return None;
        }
        let idx = self.entity_index()?;
        self.rows
            .iter()
            .find(|row| {
                row[idx]
                    .as_deref()
                    .is_some_and(|name| normalize_entity_name(name) == key)
            })
            .map(|row| self.to_record(row))
    }

    fn record_count(&self) -> usize {
        self.rows.len()
    }

    fn entity_names(&self) -> Vec<String> {
        let Some(idx) = self.entity_index() else {
            return Vec::new();
        };
        self.rows.iter().filter_map(|row| row[idx].clone()).collect()
    }
}

/// The bundled lead prioritization table used by the scoring pipeline.
pub fn demo_prioritization() -> Result<RecordTable> {
    RecordTable::from_json_str(DEMO_PRIORITIZATION)
}

fn cell_to_string(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Name keys
// ---------------------------------------------------------------------------

/// Lowercase and strip everything but ASCII letters and digits.
pub fn normalize_entity_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect()
}

/// Filename component used inside detailed log paths: whitespace runs become
/// `_`, anything outside `[A-Za-z0-9_.-]` is dropped, capped at 120 chars.
pub fn safe_filename_component(s: &str) -> String {
    static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
    static BAD_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_\-.]").expect("valid regex"));

    let trimmed = s.trim();
    if trimmed.is_empty() {
        return "unknown".into();
    }
    let underscored = WS_RE.replace_all(trimmed, "_");
    let cleaned = BAD_RE.replace_all(&underscored, "");
    cleaned.chars().take(120).collect()
}

/// Lowercase slug used for export file names; `"company"` when nothing remains.
pub fn export_slug(entity: &str) -> String {
    static NON_ALNUM_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("valid regex"));

    let lowered = entity.to_lowercase();
    let slug = NON_ALNUM_RE.replace_all(&lowered, "_");
    let slug = slug.trim_matches('_');
    if slug.is_empty() {
        "company".into()
    } else {
        slug.to_string()
    }
}
