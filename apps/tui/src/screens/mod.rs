//! TUI screen definitions.
//!
//! Each screen corresponds to a tab in the TUI and encapsulates its
//! own state and rendering logic.

mod export;
mod pipeline;

use std::fmt;

use crossterm::event::KeyCode;
use ratatui::prelude::*;

use leadconsole_shared::PipelineKind;

use crate::app::ConsoleView;

/// Screen identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScreenId {
    Enrichment,
    Scoring,
    Export,
}

impl ScreenId {
    pub(crate) const ALL: [ScreenId; 3] = [Self::Enrichment, Self::Scoring, Self::Export];

    /// Pipeline driven from this screen, if any.
    pub(crate) fn pipeline(self) -> Option<PipelineKind> {
        match self {
            Self::Enrichment => Some(PipelineKind::Ingest),
            Self::Scoring => Some(PipelineKind::Score),
            Self::Export => None,
        }
    }

    pub(crate) fn for_pipeline(kind: PipelineKind) -> Self {
        match kind {
            PipelineKind::Ingest => Self::Enrichment,
            PipelineKind::Score => Self::Scoring,
        }
    }
}

impl fmt::Display for ScreenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enrichment => write!(f, "Data Enrichment"),
            Self::Scoring => write!(f, "Lead Scoring"),
            Self::Export => write!(f, "Export"),
        }
    }
}

/// Per-screen state and behaviour.
pub(crate) struct Screen {
    pub id: ScreenId,
    pipeline: pipeline::PipelineScreen,
    export: export::ExportScreen,
}

impl Screen {
    pub(crate) fn new(id: ScreenId) -> Self {
        Self {
            id,
            pipeline: pipeline::PipelineScreen::new(id.pipeline().unwrap_or(PipelineKind::Ingest)),
            export: export::ExportScreen::new(),
        }
    }

    /// Pipeline whose artifacts `x` writes from this screen.
    pub(crate) fn export_target(&self) -> PipelineKind {
        match self.id.pipeline() {
            Some(kind) => kind,
            None => self.export.selected(),
        }
    }

    pub(crate) fn draw(&self, f: &mut Frame, area: Rect, view: &ConsoleView, input: &Input) {
        match self.id {
            ScreenId::Enrichment | ScreenId::Scoring => self.pipeline.draw(f, area, view, input),
            ScreenId::Export => self.export.draw(f, area, view),
        }
    }

    pub(crate) fn handle_key(&mut self, code: KeyCode) {
        match self.id {
            ScreenId::Enrichment | ScreenId::Scoring => self.pipeline.handle_key(code),
            ScreenId::Export => self.export.handle_key(code),
        }
    }
}

/// Company input field shared by the pipeline screens.
#[derive(Debug, Default)]
pub(crate) struct Input {
    pub text: String,
    pub editing: bool,
}
