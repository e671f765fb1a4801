//! Export screen: what the last completed runs can export for the selected company.

use crossterm::event::KeyCode;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

use leadconsole_shared::PipelineKind;

use crate::app::ConsoleView;

pub(crate) struct ExportScreen {
    selected: usize,
}

impl ExportScreen {
    pub(crate) fn new() -> Self {
        Self { selected: 0 }
    }

    pub(crate) fn selected(&self) -> PipelineKind {
        PipelineKind::ALL[self.selected % PipelineKind::ALL.len()]
    }

    pub(crate) fn draw(&self, f: &mut Frame, area: Rect, view: &ConsoleView) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Percentage(50),
                Constraint::Percentage(50),
            ])
            .split(area);

        for (i, kind) in PipelineKind::ALL.into_iter().enumerate() {
            let focused = kind == self.selected();
            let border = if focused {
                Style::default().fg(Color::Cyan)
            } else {
                Style::default()
            };

            let lines: Vec<Line> = match view.export(kind) {
                Ok(bundle) => {
                    let mut lines: Vec<Line> = bundle
                        .files
                        .iter()
                        .map(|file| {
                            Line::from(vec![
                                Span::styled("📥 ", Style::default().fg(Color::Green)),
                                Span::raw(file.file_name.as_str()),
                                Span::styled(
                                    format!("  ({} bytes)", file.contents.len()),
                                    Style::default().fg(Color::DarkGray),
                                ),
                            ])
                        })
                        .collect();
                    lines.push(Line::from(""));
                    lines.push(Line::styled(
                        format!("x to write into {}", view.export_dir.display()),
                        Style::default().fg(Color::DarkGray),
                    ));
                    lines
                }
                Err(e) => vec![Line::styled(
                    e.to_string(),
                    Style::default().fg(Color::DarkGray),
                )],
            };

            let block = Block::default()
                .borders(Borders::ALL)
                .title(format!(" {} ", kind.title()))
                .border_style(border);
            f.render_widget(
                Paragraph::new(lines).wrap(Wrap { trim: false }).block(block),
                chunks[i],
            );
        }
    }

    pub(crate) fn handle_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Up | KeyCode::Down => self.selected = (self.selected + 1) % PipelineKind::ALL.len(),
            _ => {}
        }
    }
}
