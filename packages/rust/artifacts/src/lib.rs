//! Downloadable artifacts of a completed run.
//!
//! After a completed ingestion run the bundle holds the Customer 360 CSV and
//! the consolidated detailed log; after a completed scoring run it holds the
//! prioritization CSV. Exports are only offered while the selected entity is
//! still the one the run completed for.

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use leadconsole_records::{RecordTable, export_slug, normalize_entity_name};
use leadconsole_shared::{LastCompletedRun, LeadConsoleError, PipelineKind, Record, Result};

/// One file of an export bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub file_name: String,
    pub contents: String,
}

/// Files produced for one completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportBundle {
    pub files: Vec<ExportFile>,
}

impl ExportBundle {
    pub fn file(&self, name: &str) -> Option<&ExportFile> {
        self.files.iter().find(|f| f.file_name == name)
    }

    /// Write every file into `dir`, creating it if needed.
    #[instrument(skip_all, fields(dir = %dir.display(), files = self.files.len()))]
    pub fn write_to(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir).map_err(|e| LeadConsoleError::io(dir, e))?;

        let mut written = Vec::with_capacity(self.files.len());
        for file in &self.files {
            let path = dir.join(&file.file_name);
            std::fs::write(&path, &file.contents).map_err(|e| LeadConsoleError::io(&path, e))?;
            debug!(path = %path.display(), bytes = file.contents.len(), "wrote export");
            written.push(path);
        }

        info!(count = written.len(), "exports written");
        Ok(written)
    }
}

/// Build the export bundle of `kind` for the selected entity.
///
/// Fails with `ExportUnavailable` when no run of `kind` has completed, or when
/// the selected entity is not the one the last run completed for.
pub fn build_exports(
    kind: PipelineKind,
    last_completed: Option<&LastCompletedRun>,
    selected_entity: Option<&str>,
    prioritization: Option<&RecordTable>,
) -> Result<ExportBundle> {
    let Some(completed) = last_completed else {
        return Err(LeadConsoleError::export_unavailable(format!(
            "no completed {kind} run in this session"
        )));
    };

    let selected = selected_entity.map(normalize_entity_name).unwrap_or_default();
    if selected != normalize_entity_name(&completed.entity) {
        return Err(LeadConsoleError::export_unavailable(format!(
            "last completed {kind} run was for {:?}; select it again to export",
            completed.entity
        )));
    }

    let files = match kind {
        PipelineKind::Ingest => {
            let slug = export_slug(&completed.entity);
            vec![
                ExportFile {
                    file_name: format!("{slug}_customer360.csv"),
                    contents: customer360_csv(&completed.record),
                },
                ExportFile {
                    file_name: format!("{slug}_agentic_pipeline_logs.txt"),
                    contents: completed.consolidated_log.clone(),
                },
            ]
        }
        PipelineKind::Score => {
            let table = prioritization.ok_or_else(|| {
                LeadConsoleError::export_unavailable("no prioritization table is loaded")
            })?;
            vec![ExportFile {
                file_name: format!("prioritization_run{}.csv", completed.run_id),
                contents: table_csv(table),
            }]
        }
    };

    Ok(ExportBundle { files })
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

/// Header plus one row for a single record. Null cells are empty.
pub fn customer360_csv(record: &Record) -> String {
    let mut out = csv_line(record.fields.iter().map(|(name, _)| name.as_str()));
    out.push_str(&csv_line(
        record
            .fields
            .iter()
            .map(|(_, value)| value.as_deref().unwrap_or("")),
    ));
    out
}

/// Header plus every row of `table`, icons and all.
pub fn table_csv(table: &RecordTable) -> String {
    let mut out = csv_line(table.columns.iter().map(String::as_str));
    for row in table.records() {
        out.push_str(&csv_line(
            row.fields.iter().map(|(_, v)| v.as_deref().unwrap_or("")),
        ));
    }
    out
}

fn csv_line<'a>(cells: impl Iterator<Item = &'a str>) -> String {
    let mut line = cells.map(csv_escape).collect::<Vec<_>>().join(",");
    line.push('\n');
    line
}

/// Quote a cell when it holds a delimiter, a quote or a line break.
fn csv_escape(cell: &str) -> String {
    if cell.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use leadconsole_records::{RecordSource, demo_prioritization};

    fn completed(kind: PipelineKind, entity: &str) -> LastCompletedRun {
        LastCompletedRun {
            run_id: 4,
            kind,
            entity: entity.into(),
            record: Record::new(vec![
                ("unique_id".into(), Some("17".into())),
                ("Company Name".into(), Some("VF Corporation".into())),
                ("Company Overview".into(), Some("Apparel, footwear \"and\" gear".into())),
                ("Instagram URL".into(), None),
            ]),
            consolidated_log: "=== LOG A ===\n\n=== LOG B ===".into(),
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn escaping_follows_csv_quoting() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_escape("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn customer360_has_header_and_one_row() {
        let csv = customer360_csv(&completed(PipelineKind::Ingest, "VF Corporation").record);
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("unique_id,Company Name,Company Overview,Instagram URL")
        );
        assert_eq!(
            lines.next(),
            Some("17,VF Corporation,\"Apparel, footwear \"\"and\"\" gear\",")
        );
        assert!(lines.next().is_none());
    }

    #[test]
    fn ingest_bundle_uses_entity_slug() {
        let run = completed(PipelineKind::Ingest, "VF Corporation");
        let bundle =
            build_exports(PipelineKind::Ingest, Some(&run), Some("vf corporation"), None).unwrap();
        assert_eq!(bundle.files.len(), 2);
        assert!(bundle.file("vf_corporation_customer360.csv").is_some());
        let logs = bundle
            .file("vf_corporation_agentic_pipeline_logs.txt")
            .expect("log file");
        assert_eq!(logs.contents, run.consolidated_log);
    }

    #[test]
    fn other_entity_makes_export_unavailable() {
        let run = completed(PipelineKind::Ingest, "VF Corporation");
        let err = build_exports(PipelineKind::Ingest, Some(&run), Some("Wolfspeed"), None)
            .unwrap_err();
        assert!(matches!(err, LeadConsoleError::ExportUnavailable { .. }));

        let err = build_exports(PipelineKind::Ingest, None, Some("VF Corporation"), None)
            .unwrap_err();
        assert!(matches!(err, LeadConsoleError::ExportUnavailable { .. }));

        let err = build_exports(PipelineKind::Ingest, Some(&run), None, None).unwrap_err();
        assert!(matches!(err, LeadConsoleError::ExportUnavailable { .. }));
    }

    #[test]
    fn scoring_bundle_is_named_by_run() {
        let table = demo_prioritization().expect("prioritization table");
        let run = completed(PipelineKind::Score, "VF Corporation");
        let bundle = build_exports(
            PipelineKind::Score,
            Some(&run),
            Some("VF Corporation"),
            Some(&table),
        )
        .unwrap();
        let csv = bundle.file("prioritization_run4.csv").expect("csv");
        assert_eq!(csv.contents.lines().count(), table.record_count() + 1);
        assert!(csv.contents.starts_with("Company Name,Priority,"));
        assert!(csv.contents.contains('🟢'));
    }

    #[test]
    fn write_to_creates_directory() {
        let dir = std::env::temp_dir().join(format!("lc_test_{}", uuid::Uuid::now_v7()));
        let run = completed(PipelineKind::Ingest, "VF Corporation");
        let bundle =
            build_exports(PipelineKind::Ingest, Some(&run), Some("VF Corporation"), None).unwrap();

        let written = bundle.write_to(&dir).unwrap();
        assert_eq!(written.len(), 2);
        for path in &written {
            assert!(path.exists());
        }
        let _ = std::fs::remove_dir_all(&dir);
    }
}
