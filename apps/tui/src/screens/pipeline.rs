//! Pipeline screen: company input, run summary, task list and task detail.

use crossterm::event::KeyCode;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Gauge, List, ListItem, ListState, Paragraph, Wrap};

use leadconsole_core::steps;
use leadconsole_core::{PipelineSnapshot, TaskSnapshot};
use leadconsole_shared::{PipelineKind, RunStatus, TaskStatus};

use super::Input;
use crate::app::ConsoleView;
use crate::widgets::{log_lines, result_lines, task_status_spans};

pub(crate) struct PipelineScreen {
    kind: PipelineKind,
    /// Task shown in the detail pane.
    selected: usize,
}

impl PipelineScreen {
    pub(crate) fn new(kind: PipelineKind) -> Self {
        Self { kind, selected: 0 }
    }

    pub(crate) fn draw(&self, f: &mut Frame, area: Rect, view: &ConsoleView, input: &Input) {
        let snapshot = view.snapshot(self.kind);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(3), // Company input
                Constraint::Length(3), // Run summary
                Constraint::Min(1),    // Tasks + detail
            ])
            .split(area);

        // Company input
        let input_style = if input.editing {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::Cyan)
        };
        let input_title = if input.editing {
            " Company (Enter to select · Esc to cancel) "
        } else {
            " Company (e to edit · Enter to launch) "
        };
        let input_p = Paragraph::new(input.text.as_str()).block(
            Block::default()
                .borders(Borders::ALL)
                .title(input_title)
                .border_style(input_style),
        );
        f.render_widget(input_p, chunks[0]);

        // Run summary
        f.render_widget(summary_gauge(snapshot), chunks[1]);

        // Tasks + detail
        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(38), Constraint::Percentage(62)])
            .split(chunks[2]);

        let left = if snapshot.preamble.is_empty() {
            Layout::default()
                .constraints([Constraint::Min(1)])
                .split(body[0])
        } else {
            Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(snapshot.preamble.len().min(7) as u16 + 2),
                    Constraint::Min(1),
                ])
                .split(body[0])
        };

        if !snapshot.preamble.is_empty() {
            let preamble = Paragraph::new(log_lines(&snapshot.preamble))
                .wrap(Wrap { trim: false })
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .title(" Lead Scoring Phase "),
                );
            f.render_widget(preamble, left[0]);
        }

        let items: Vec<ListItem> = snapshot
            .tasks
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let [dot, label] = task_status_spans(t.state.status);
                ListItem::new(Line::from(vec![
                    dot,
                    Span::raw(format!("{}. {}  ", i + 1, t.task.name)),
                    label,
                ]))
            })
            .collect();
        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title(" Tasks "))
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
        let mut list_state = ListState::default().with_selected(Some(self.selected_index(snapshot)));
        f.render_stateful_widget(list, left[left.len() - 1], &mut list_state);

        if let Some(task) = snapshot.tasks.get(self.selected_index(snapshot)) {
            draw_task_detail(f, body[1], snapshot, task);
        }
    }

    pub(crate) fn handle_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Up => self.selected = self.selected.saturating_sub(1),
            KeyCode::Down => self.selected += 1,
            _ => {}
        }
    }

    fn selected_index(&self, snapshot: &PipelineSnapshot) -> usize {
        self.selected.min(snapshot.tasks.len().saturating_sub(1))
    }
}

fn summary_gauge(snapshot: &PipelineSnapshot) -> Gauge<'static> {
    let (label, color) = match &snapshot.run {
        None => ("Not started".to_string(), Color::DarkGray),
        Some(run) => {
            let color = match run.status {
                RunStatus::InProgress => Color::Yellow,
                RunStatus::Completed => Color::Green,
                RunStatus::StoppedByUser => Color::Gray,
            };
            let mut label = format!(
                "Run #{} · {} · {} · {}%",
                run.run_id, run.entity, run.status, snapshot.progress_pct
            );
            if snapshot.cancel_requested && snapshot.is_running() {
                label.push_str(" · stopping…");
            }
            (label, color)
        }
    };

    Gauge::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" {} ", snapshot.kind.title())),
        )
        .gauge_style(Style::default().fg(color))
        .percent(u16::from(snapshot.progress_pct))
        .label(label)
}

fn draw_task_detail(f: &mut Frame, area: Rect, snapshot: &PipelineSnapshot, task: &TaskSnapshot) {
    let entity = snapshot
        .run
        .as_ref()
        .map(|r| r.entity.as_str())
        .unwrap_or_default();

    let (title, lines) = match task.state.status {
        TaskStatus::Running => {
            let total = steps::generate(snapshot.kind, task.task.key, entity).len();
            (
                format!(
                    " {} · Executing... {}% ",
                    task.task.name,
                    task.state.line_progress(total)
                ),
                log_lines(&task.state.log),
            )
        }
        TaskStatus::Interrupted => {
            let mut lines = log_lines(&task.state.log);
            lines.push(Line::styled(
                "Task interrupted by user.",
                Style::default().add_modifier(Modifier::BOLD),
            ));
            (format!(" {} · Interrupted ", task.task.name), lines)
        }
        TaskStatus::Done => {
            let mut lines = Vec::new();
            if let Some(result) = task.result() {
                lines.extend(result_lines(result));
                lines.push(Line::from(""));
            }
            lines.extend(log_lines(&task.state.log));
            (format!(" {} · Done ", task.task.name), lines)
        }
        TaskStatus::Pending => {
            let lines = match task.result() {
                Some(result) => result_lines(result),
                None => vec![Line::styled(
                    "Waiting to run.",
                    Style::default().fg(Color::DarkGray),
                )],
            };
            (format!(" {} ", task.task.name), lines)
        }
    };

    // Keep the newest log lines in view while streaming.
    let inner_height = area.height.saturating_sub(2) as usize;
    let scroll = if task.state.status == TaskStatus::Running {
        lines.len().saturating_sub(inner_height) as u16
    } else {
        0
    };

    let detail = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0))
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(detail, area);
}
