//! Reusable TUI widgets.

use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

use leadconsole_shared::{FieldValue, LogClass, LogLine, ResultPayload, TaskStatus};

/// Bottom status bar.
pub(crate) fn status_bar(msg: &str) -> Paragraph<'_> {
    Paragraph::new(format!(" {msg}")).style(Style::default().bg(Color::DarkGray).fg(Color::White))
}

/// Colored status dot followed by the status label.
pub(crate) fn task_status_spans(status: TaskStatus) -> [Span<'static>; 2] {
    let color = match status {
        TaskStatus::Pending => Color::DarkGray,
        TaskStatus::Running => Color::Yellow,
        TaskStatus::Done => Color::Green,
        TaskStatus::Interrupted => Color::Gray,
    };
    [
        Span::styled("● ", Style::default().fg(color)),
        Span::styled(status.label(), Style::default().fg(color)),
    ]
}

/// Streamed log lines, styled by class.
pub(crate) fn log_lines(lines: &[LogLine]) -> Vec<Line<'_>> {
    lines
        .iter()
        .map(|line| {
            let style = match line.class {
                LogClass::Title => Style::default().add_modifier(Modifier::BOLD),
                LogClass::Info => Style::default(),
                LogClass::Success => Style::default().fg(Color::Green),
                LogClass::Meta => Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::ITALIC),
            };
            Line::styled(line.text.as_str(), style)
        })
        .collect()
}

/// Rendered task result: bold labels, one line per bullet.
pub(crate) fn result_lines(result: &ResultPayload) -> Vec<Line<'_>> {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let mut out = Vec::new();

    if let Some(heading) = &result.heading {
        out.push(Line::styled(heading.as_str(), bold.fg(Color::Cyan)));
        out.push(Line::from(""));
    }

    for field in &result.fields {
        match &field.value {
            FieldValue::Bullets(bullets) => {
                out.push(Line::styled(format!("{}:", field.label), bold));
                for bullet in bullets {
                    let mut spans = vec![Span::raw("  • ")];
                    if let Some(label) = &bullet.label {
                        spans.push(Span::styled(format!("{label}: "), bold));
                    }
                    spans.push(Span::raw(bullet.text.as_str()));
                    if let Some(source) = &bullet.source {
                        spans.push(Span::styled(
                            format!(" ({source})"),
                            Style::default().fg(Color::Blue),
                        ));
                    }
                    out.push(Line::from(spans));
                }
            }
            value => {
                let text_style = if value.is_missing() {
                    Style::default().fg(Color::DarkGray)
                } else {
                    Style::default()
                };
                out.push(Line::from(vec![
                    Span::styled(format!("{}: ", field.label), bold),
                    Span::styled(value.to_plain_text(), text_style),
                ]));
            }
        }
    }
    out
}
