//! Core TUI application state and event loop.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use color_eyre::eyre::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Tabs};
use tokio::runtime::Runtime;
use tokio::sync::mpsc::{UnboundedSender, unbounded_channel};
use tracing::{info, warn};

use leadconsole_artifacts::{ExportBundle, build_exports};
use leadconsole_core::{
    Pacing, PipelineObserver, PipelineOrchestrator, PipelineSnapshot, ScopeOutcome,
    TaskDescriptor,
};
use leadconsole_records::{RecordSource, RecordTable, demo_prioritization};
use leadconsole_shared::{AppConfig, PipelineKind, PipelineRun, expand_home, load_config};
use leadconsole_storage::Storage;

use crate::screens::{Input, Screen, ScreenId};
use crate::widgets::status_bar;

// ---------------------------------------------------------------------------
// Console: long-lived handles
// ---------------------------------------------------------------------------

/// Config, dataset and orchestrator shared by every frame.
pub(crate) struct Console {
    config: AppConfig,
    records: Arc<RecordTable>,
    orchestrator: Arc<PipelineOrchestrator>,
}

impl Console {
    pub(crate) async fn open() -> Result<Self> {
        let config = load_config()?;
        let storage = Arc::new(Storage::open(&expand_home(&config.defaults.store_path)).await?);
        let records = Arc::new(RecordTable::load_or_demo(&config.records.path)?);

        let orchestrator = PipelineOrchestrator::new(
            storage,
            config.defaults.session.clone(),
            records.clone(),
        )
        .with_pacing(Pacing::from_millis(config.defaults.pacing_ms))
        .with_prioritization(Arc::new(demo_prioritization()?));

        let state = orchestrator.state();
        if let Ok(user) = std::env::var("USER") {
            state.set_user(&user).await?;
        }
        if state.business_context().await?.is_none() {
            state
                .set_business_context(&config.scoring.business_context)
                .await?;
        }
        if state.lead_list_name().await?.is_none() {
            state
                .set_lead_list_name(&config.scoring.lead_list_name)
                .await?;
        }

        info!(session = %config.defaults.session, "console opened");

        Ok(Self {
            config,
            records,
            orchestrator: Arc::new(orchestrator),
        })
    }
}

// ---------------------------------------------------------------------------
// ConsoleView: one rehydrated frame
// ---------------------------------------------------------------------------

/// Everything one frame renders, read back from the store.
pub(crate) struct ConsoleView {
    pub entity: Option<String>,
    pub ingest: PipelineSnapshot,
    pub score: PipelineSnapshot,
    pub exports: Vec<(PipelineKind, leadconsole_shared::Result<ExportBundle>)>,
    pub export_dir: PathBuf,
}

impl ConsoleView {
    /// Enforce the entity scope, then rehydrate both pipelines.
    async fn load(console: &Console) -> Result<Self> {
        let orch = &console.orchestrator;
        orch.enforce_scope().await?;

        let ingest = orch.rehydrate(PipelineKind::Ingest).await?;
        let score = orch.rehydrate(PipelineKind::Score).await?;
        let entity = ingest.active_entity.clone();

        let exports = [&ingest, &score]
            .into_iter()
            .map(|snapshot| {
                (
                    snapshot.kind,
                    build_exports(
                        snapshot.kind,
                        snapshot.last_completed.as_ref(),
                        entity.as_deref(),
                        orch.prioritization(),
                    ),
                )
            })
            .collect();

        Ok(Self {
            entity,
            ingest,
            score,
            exports,
            export_dir: expand_home(&console.config.export.output_dir),
        })
    }

    pub(crate) fn snapshot(&self, kind: PipelineKind) -> &PipelineSnapshot {
        match kind {
            PipelineKind::Ingest => &self.ingest,
            PipelineKind::Score => &self.score,
        }
    }

    pub(crate) fn export(&self, kind: PipelineKind) -> &leadconsole_shared::Result<ExportBundle> {
        let index = PipelineKind::ALL
            .iter()
            .position(|k| *k == kind)
            .unwrap_or_default();
        &self.exports[index].1
    }
}

// ---------------------------------------------------------------------------
// App: UI state
// ---------------------------------------------------------------------------

/// Application state.
pub(crate) struct App {
    /// Currently active screen tab.
    pub active_tab: usize,
    /// Available screens.
    pub screens: Vec<ScreenId>,
    /// Whether the app should quit.
    pub should_quit: bool,
    /// Status message shown in bottom bar.
    pub status: String,
    /// Whether help overlay is visible.
    pub show_help: bool,
    /// Per-screen state.
    pub screen_states: Vec<Screen>,
    /// Company input shared by the pipeline screens.
    pub input: Input,
}

/// Side effect requested by a key press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Action {
    None,
    Select(String),
    Launch(PipelineKind),
    Stop,
    Export(PipelineKind),
    ScopePipeline(PipelineKind),
}

impl App {
    pub(crate) fn new(initial: Option<PipelineKind>) -> Self {
        let screens = ScreenId::ALL.to_vec();
        let screen_states = screens.iter().map(|s| Screen::new(*s)).collect();
        let active_tab = initial
            .map(ScreenId::for_pipeline)
            .and_then(|id| screens.iter().position(|s| *s == id))
            .unwrap_or(0);

        Self {
            active_tab,
            screens,
            should_quit: false,
            status: "Ready · press ? for help".to_string(),
            show_help: false,
            screen_states,
            input: Input::default(),
        }
    }

    fn current_screen(&self) -> &Screen {
        &self.screen_states[self.active_tab]
    }

    fn current_screen_mut(&mut self) -> &mut Screen {
        &mut self.screen_states[self.active_tab]
    }

    /// Mirror the stored selection into the input unless the user is typing.
    fn sync_input(&mut self, view: &ConsoleView) {
        if !self.input.editing {
            self.input.text = view.entity.clone().unwrap_or_default();
        }
    }

    fn switch_tab(&mut self, index: usize) -> Action {
        self.active_tab = index;
        self.status = self.screens[index].to_string();
        match self.screens[index].pipeline() {
            Some(kind) => Action::ScopePipeline(kind),
            None => Action::None,
        }
    }
}

/// Entry point: sets up terminal, runs event loop, restores terminal.
pub(crate) fn run(runtime: &Runtime, console: Console) -> Result<()> {
    // Setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run app
    let result = run_app(&mut terminal, runtime, &console);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    runtime: &Runtime,
    console: &Console,
) -> Result<()> {
    let initial = runtime.block_on(console.orchestrator.state().pipeline_scope())?;
    let mut app = App::new(initial);
    let (tx, mut rx) = unbounded_channel::<String>();

    loop {
        while let Ok(msg) = rx.try_recv() {
            app.status = msg;
        }

        // Every frame is a full re-read of the session.
        let view = runtime.block_on(ConsoleView::load(console))?;
        app.sync_input(&view);
        terminal.draw(|f| draw(f, &app, &view))?;

        // Poll for events with 100ms timeout for responsive UI
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    let action = handle_key(&mut app, key.code, key.modifiers);
                    perform(&mut app, action, runtime, console, &view, &tx)?;
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

fn handle_key(app: &mut App, code: KeyCode, modifiers: KeyModifiers) -> Action {
    // Global keybindings (always active)
    if matches!(code, KeyCode::Char('c')) && modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return Action::None;
    }

    if app.input.editing {
        match code {
            KeyCode::Esc => app.input.editing = false,
            KeyCode::Enter => {
                app.input.editing = false;
                return Action::Select(app.input.text.trim().to_string());
            }
            KeyCode::Backspace => {
                app.input.text.pop();
            }
            KeyCode::Char(c) => app.input.text.push(c),
            _ => {}
        }
        return Action::None;
    }

    // If help is showing, consume any key to dismiss
    if app.show_help {
        app.show_help = false;
        return Action::None;
    }

    match code {
        KeyCode::Char('q') => {
            app.should_quit = true;
            Action::None
        }
        KeyCode::Char('?') => {
            app.show_help = true;
            Action::None
        }
        // Tab navigation with number keys
        KeyCode::Char(c @ '1'..='3') => {
            let idx = (c as usize) - ('1' as usize);
            if idx < app.screens.len() {
                app.switch_tab(idx)
            } else {
                Action::None
            }
        }
        KeyCode::Tab => app.switch_tab((app.active_tab + 1) % app.screens.len()),
        KeyCode::BackTab => {
            let idx = if app.active_tab == 0 {
                app.screens.len() - 1
            } else {
                app.active_tab - 1
            };
            app.switch_tab(idx)
        }
        KeyCode::Char('e') if app.current_screen().id.pipeline().is_some() => {
            app.input.editing = true;
            app.input.text.clear();
            Action::None
        }
        KeyCode::Enter => match app.current_screen().id.pipeline() {
            Some(kind) => Action::Launch(kind),
            None => Action::None,
        },
        KeyCode::Char('s') => Action::Stop,
        KeyCode::Char('x') => Action::Export(app.current_screen().export_target()),
        other => {
            // Delegate to current screen
            app.current_screen_mut().handle_key(other);
            Action::None
        }
    }
}

/// Carry out `action` against the store.
fn perform(
    app: &mut App,
    action: Action,
    runtime: &Runtime,
    console: &Console,
    view: &ConsoleView,
    tx: &UnboundedSender<String>,
) -> Result<()> {
    let orch = &console.orchestrator;
    match action {
        Action::None => {}
        Action::ScopePipeline(kind) => {
            runtime.block_on(orch.state().set_pipeline_scope(kind))?;
        }
        Action::Select(entity) => {
            if entity.is_empty() {
                app.status = "Company name is empty.".to_string();
                return Ok(());
            }
            if console.records.resolve(&entity).is_none() {
                warn!(%entity, "selected company has no matching record");
            }
            app.status = match runtime.block_on(orch.select_entity(&entity)) {
                Ok(ScopeOutcome::Switched { previous, .. }) => {
                    format!("Selected {entity}; cleared results of {previous}.")
                }
                Ok(_) => format!("Selected {entity}. Press Enter to launch."),
                Err(e) if e.is_user_error() => format!("Cannot select {entity}: {e}"),
                Err(e) => return Err(e.into()),
            };
        }
        Action::Launch(kind) => {
            let entity = app.input.text.trim().to_string();
            if entity.is_empty() {
                app.status = "Enter a company name first (press e).".to_string();
                return Ok(());
            }
            let orch = orch.clone();
            let tx = tx.clone();
            app.status = format!("Launching {} for {entity}…", kind.title());
            runtime.spawn(async move {
                let observer = ChannelObserver { tx: tx.clone() };
                let msg = match orch.launch(&entity, kind, &observer).await {
                    Ok(run) => format!("Run #{} for {}: {}", run.run_id, run.entity, run.status),
                    Err(e) => format!("Launch failed: {e}"),
                };
                let _ = tx.send(msg);
            });
        }
        Action::Stop => {
            app.status = if runtime.block_on(orch.request_stop())? {
                "Stop requested; the run halts at its next checkpoint.".to_string()
            } else {
                "No pipeline run is in progress.".to_string()
            };
        }
        Action::Export(kind) => {
            app.status = match view.export(kind) {
                Ok(bundle) => match bundle.write_to(&view.export_dir) {
                    Ok(paths) => format!(
                        "Wrote {} file(s) to {}",
                        paths.len(),
                        view.export_dir.display()
                    ),
                    Err(e) => format!("Export failed: {e}"),
                },
                Err(e) => e.to_string(),
            };
        }
    }
    Ok(())
}

/// Forwards task transitions to the status bar.
struct ChannelObserver {
    tx: UnboundedSender<String>,
}

impl PipelineObserver for ChannelObserver {
    fn task_started(&self, task: &TaskDescriptor, _index: usize) {
        let _ = self.tx.send(format!("{} · Running", task.name));
    }

    fn task_finished(&self, task: &TaskDescriptor, overall_pct: u8) {
        let _ = self
            .tx
            .send(format!("{} · Done · overall {overall_pct}%", task.name));
    }

    fn task_interrupted(&self, task: Option<&TaskDescriptor>) {
        let name = task.map(|t| t.name).unwrap_or("Lead Scoring Phase");
        let _ = self.tx.send(format!("{name} · Interrupted by user"));
    }

    fn run_finished(&self, run: &PipelineRun) {
        info!(run_id = run.run_id, status = %run.status, "background run finished");
    }
}

// ---------------------------------------------------------------------------
// Drawing
// ---------------------------------------------------------------------------

fn draw(f: &mut Frame, app: &App, view: &ConsoleView) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Tab bar
            Constraint::Min(1),    // Content
            Constraint::Length(1), // Status bar
        ])
        .split(f.area());

    // Tab bar
    let tab_titles: Vec<Line> = app
        .screens
        .iter()
        .map(|s| Line::from(format!("{s}")))
        .collect();

    let tabs = Tabs::new(tab_titles)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" LeadConsole "),
        )
        .select(app.active_tab)
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .divider(" │ ");

    f.render_widget(tabs, chunks[0]);

    // Content area, delegated to the screen
    app.current_screen().draw(f, chunks[1], view, &app.input);

    // Status bar
    let bar = status_bar(&app.status);
    f.render_widget(bar, chunks[2]);

    // Help overlay
    if app.show_help {
        draw_help_overlay(f);
    }
}

fn draw_help_overlay(f: &mut Frame) {
    let area = centered_rect(60, 60, f.area());

    let help_text = vec![
        Line::from("Keybindings").style(Style::default().add_modifier(Modifier::BOLD)),
        Line::from(""),
        Line::from("  1-3          Switch to screen"),
        Line::from("  Tab/S-Tab    Next/previous screen"),
        Line::from("  ?            Toggle this help"),
        Line::from("  q / Ctrl-C   Quit"),
        Line::from(""),
        Line::from("Pipelines:").style(Style::default().add_modifier(Modifier::BOLD)),
        Line::from("  e            Edit company (Enter selects)"),
        Line::from("  Enter        Launch the pipeline"),
        Line::from("  s            Stop the running pipeline"),
        Line::from("  ↑/↓          Select task"),
        Line::from("  x            Write exports"),
    ];

    let help = Paragraph::new(help_text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Help · press any key to close ")
                .style(Style::default().bg(Color::DarkGray)),
        )
        .style(Style::default().fg(Color::White).bg(Color::DarkGray));

    // Clear background
    f.render_widget(ratatui::widgets::Clear, area);
    f.render_widget(help, area);
}

/// Create a centered rectangle with percentage width and height.
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
