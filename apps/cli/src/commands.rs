//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use leadconsole_artifacts::build_exports;
use leadconsole_core::{
    Pacing, PipelineObserver, PipelineOrchestrator, PipelineSnapshot, ScopeOutcome,
    TaskDescriptor,
};
use leadconsole_records::{RecordSource, RecordTable, demo_prioritization};
use leadconsole_shared::{
    AppConfig, FieldValue, LeadConsoleError, LogClass, LogLine, PipelineKind, PipelineRun, ResultPayload, RunStatus,
    TaskStatus, expand_home, init_config, load_config,
};
use leadconsole_storage::Storage;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// LeadConsole: agentic lead enrichment and scoring console.
#[derive(Parser)]
#[command(
    name = "leadconsole",
    version,
    about = "Run the lead enrichment and lead scoring pipelines against a persisted session.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// State database path (defaults to `defaults.store_path`).
    #[arg(long, env = "LEADCONSOLE_STORE", global = true)]
    pub store: Option<String>,

    /// Session identifier (defaults to `defaults.session`).
    #[arg(long, env = "LEADCONSOLE_SESSION", global = true)]
    pub session: Option<String>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Select a company and run a pipeline for it.
    Launch {
        /// Company name, matched against the dataset ignoring case and punctuation.
        entity: String,

        /// Pipeline to run: ingest or score.
        #[arg(short, long)]
        pipeline: Option<PipelineKind>,

        /// Delay between streamed log lines in milliseconds (0 disables pacing).
        #[arg(long)]
        pacing_ms: Option<u64>,

        /// Business context for the scoring pipeline (kept for the session).
        #[arg(long)]
        context: Option<String>,
    },

    /// Ask the running pipeline to stop at its next checkpoint.
    Stop,

    /// Show the persisted state of a pipeline.
    Status {
        /// Pipeline to show (defaults to the last one used).
        #[arg(short, long)]
        pipeline: Option<PipelineKind>,
    },

    /// Select a company without running anything.
    Select {
        /// Company name.
        entity: String,
    },

    /// Write the artifacts of the last completed run.
    Export {
        /// Output directory (defaults to `export.output_dir`).
        #[arg(short, long)]
        out: Option<String>,

        /// Pipeline whose artifacts to write (defaults to the last one used).
        #[arg(short, long)]
        pipeline: Option<PipelineKind>,
    },

    /// Forget all state and cached results of the session.
    Reset,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "leadconsole=warn",
        1 => "leadconsole=info",
        2 => "leadconsole=debug",
        _ => "leadconsole=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
        Command::Launch {
            entity,
            pipeline,
            pacing_ms,
            context,
        } => {
            let session = Session::open(&cli, *pacing_ms).await?;
            cmd_launch(&session, entity, *pipeline, context.as_deref()).await
        }
        Command::Stop => cmd_stop(&Session::open(&cli, None).await?).await,
        Command::Status { pipeline } => match Session::inspect(&cli).await? {
            Some(session) => cmd_status(&session, *pipeline).await,
            None => {
                println!("No session state stored yet.");
                Ok(())
            }
        },
        Command::Select { entity } => cmd_select(&Session::open(&cli, None).await?, entity).await,
        Command::Export { out, pipeline } => {
            cmd_export(&Session::open(&cli, None).await?, out.as_deref(), *pipeline).await
        }
        Command::Reset => cmd_reset(&Session::open(&cli, None).await?).await,
    }
}

// ---------------------------------------------------------------------------
// Session bootstrap
// ---------------------------------------------------------------------------

/// Everything one invocation needs: config, records and the orchestrator.
struct Session {
    config: AppConfig,
    records: Arc<RecordTable>,
    orchestrator: PipelineOrchestrator,
}

impl Session {
    /// Open the store read-write, load the dataset and enforce the entity scope.
    async fn open(cli: &Cli, pacing_override: Option<u64>) -> Result<Self> {
        let config = load_config()?;
        let store_path = store_path(cli, &config);
        let storage = Storage::open(&store_path).await?;
        let pacing = Pacing::from_millis(pacing_override.unwrap_or(config.defaults.pacing_ms));
        let session = Self::assemble(cli, config, storage, pacing)?;

        let state = session.orchestrator.state();
        if let Ok(user) = std::env::var("USER") {
            state.set_user(&user).await?;
        }
        if let ScopeOutcome::Switched { previous, .. } = session.orchestrator.enforce_scope().await? {
            info!(%previous, "cleared state of previously selected company");
        }

        info!(store = %store_path.display(), session = %state.session_id(), "session opened");
        Ok(session)
    }

    /// Open the store read-only. `None` when no store exists yet.
    async fn inspect(cli: &Cli) -> Result<Option<Self>> {
        let config = load_config()?;
        let store_path = store_path(cli, &config);
        if !store_path.exists() {
            return Ok(None);
        }
        let storage = Storage::open_readonly(&store_path).await?;
        let session = Self::assemble(cli, config, storage, Pacing::Immediate)?;
        info!(store = %store_path.display(), "session opened read-only");
        Ok(Some(session))
    }

    fn assemble(cli: &Cli, config: AppConfig, storage: Storage, pacing: Pacing) -> Result<Self> {
        let session_id = cli
            .session
            .clone()
            .unwrap_or_else(|| config.defaults.session.clone());
        let records = Arc::new(RecordTable::load_or_demo(&config.records.path)?);
        let orchestrator = PipelineOrchestrator::new(Arc::new(storage), session_id, records.clone())
            .with_pacing(pacing)
            .with_prioritization(Arc::new(demo_prioritization()?));
        Ok(Self {
            config,
            records,
            orchestrator,
        })
    }

    /// The error for a failed lookup, with the names the dataset does hold.
    fn not_found(&self, entity: &str) -> color_eyre::Report {
        let names = self.records.entity_names();
        eyre!(
            "no record matches {:?}; known companies: {}",
            entity.trim(),
            names.join(", ")
        )
    }

    /// `explicit`, else the last pipeline used in this session, else the configured default.
    async fn pipeline(&self, explicit: Option<PipelineKind>) -> Result<PipelineKind> {
        if let Some(kind) = explicit {
            return Ok(kind);
        }
        if let Some(kind) = self.orchestrator.state().pipeline_scope().await? {
            return Ok(kind);
        }
        Ok(self.config.defaults.pipeline.parse()?)
    }
}

fn store_path(cli: &Cli, config: &AppConfig) -> PathBuf {
    expand_home(cli.store.as_deref().unwrap_or(&config.defaults.store_path))
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_launch(
    session: &Session,
    entity: &str,
    pipeline: Option<PipelineKind>,
    context: Option<&str>,
) -> Result<()> {
    let kind = session.pipeline(pipeline).await?;
    let orch = &session.orchestrator;
    let state = orch.state();

    match orch.resolve(entity) {
        Ok(_) => {}
        Err(LeadConsoleError::EntityNotFound { .. }) => return Err(session.not_found(entity)),
        Err(e) => return Err(e.into()),
    }

    state.set_pipeline_scope(kind).await?;
    if let Some(text) = context {
        state.set_business_context(text).await?;
    } else if state.business_context().await?.is_none() {
        state
            .set_business_context(&session.config.scoring.business_context)
            .await?;
    }
    if state.lead_list_name().await?.is_none() {
        state
            .set_lead_list_name(&session.config.scoring.lead_list_name)
            .await?;
    }

    info!(entity, pipeline = %kind, "launching pipeline");

    let signal = orch.cancel_signal();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal.raise();
        }
    });

    let reporter = CliProgress::new();
    let result = orch.launch(entity, kind, &reporter).await;
    ctrl_c.abort();
    let run = result?;

    println!();
    match run.status {
        RunStatus::Completed => {
            println!("  {} finished successfully.", kind.title());
            println!("  Company: {}", run.entity);
            println!("  Run:     #{}", run.run_id);
            println!();
            let snapshot = orch.rehydrate(kind).await?;
            for task in &snapshot.tasks {
                if let Some(result) = task.result() {
                    println!("  ── {} ──", task.task.name);
                    print_result(result);
                    println!();
                }
            }
            println!("  Run `leadconsole export --pipeline {kind}` to write the artifacts.");
        }
        RunStatus::StoppedByUser => {
            println!("  Pipeline stopped by user. Completed tasks keep their results.");
        }
        RunStatus::InProgress => {
            return Err(eyre!("run #{} ended without a terminal status", run.run_id));
        }
    }
    println!();

    Ok(())
}

async fn cmd_stop(session: &Session) -> Result<()> {
    if session.orchestrator.request_stop().await? {
        println!("Stop requested. The running pipeline halts at its next checkpoint.");
    } else {
        println!("No pipeline run is in progress.");
    }
    Ok(())
}

async fn cmd_status(session: &Session, pipeline: Option<PipelineKind>) -> Result<()> {
    let kind = session.pipeline(pipeline).await?;
    let orch = &session.orchestrator;
    let snapshot = orch.rehydrate(kind).await?;
    let user = orch.state().user().await?;

    if !orch.scope_is_current().await? {
        let owner = orch.state().scope_entity().await?;
        print_header(&snapshot, user.as_deref());
        println!(
            "  Stored progress belongs to {}; the next launch or select clears it.",
            owner.as_deref().unwrap_or("no company")
        );
        println!();
        return Ok(());
    }

    print_snapshot(&snapshot, user.as_deref());
    Ok(())
}

async fn cmd_select(session: &Session, entity: &str) -> Result<()> {
    if session.records.resolve(entity).is_none() {
        warn!(entity, "selected company has no matching record");
        println!("Note: {}; a launch would fail.", session.not_found(entity));
    }

    match session.orchestrator.select_entity(entity).await? {
        ScopeOutcome::Unchanged => println!("{} is already selected.", entity.trim()),
        ScopeOutcome::Initialized => println!("Selected {}.", entity.trim()),
        ScopeOutcome::Switched {
            previous,
            removed_keys,
        } => println!(
            "Selected {} (cleared {removed_keys} stored values of {previous}).",
            entity.trim()
        ),
    }
    Ok(())
}

async fn cmd_export(
    session: &Session,
    out: Option<&str>,
    pipeline: Option<PipelineKind>,
) -> Result<()> {
    let kind = session.pipeline(pipeline).await?;
    let state = session.orchestrator.state();

    let last = state.last_completed(kind).await?;
    let selected = state.active_entity().await?;
    let bundle = build_exports(
        kind,
        last.as_ref(),
        selected.as_deref(),
        session.orchestrator.prioritization(),
    )?;

    let dir = expand_home(out.unwrap_or(&session.config.export.output_dir));
    let written = bundle.write_to(&dir)?;

    println!();
    println!("  Exported {} file(s):", written.len());
    for path in &written {
        println!("  {}", path.display());
    }
    println!();
    Ok(())
}

async fn cmd_reset(session: &Session) -> Result<()> {
    session.orchestrator.reset().await?;
    println!("Session state cleared.");
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn status_icon(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "○",
        TaskStatus::Running => "◐",
        TaskStatus::Done => "●",
        TaskStatus::Interrupted => "■",
    }
}

fn print_header(snapshot: &PipelineSnapshot, user: Option<&str>) {
    println!();
    println!("  {}", snapshot.kind.title());
    if let Some(user) = user {
        println!("  User:    {user}");
    }
    println!(
        "  Company: {}",
        snapshot.active_entity.as_deref().unwrap_or("(none selected)")
    );
}

fn print_snapshot(snapshot: &PipelineSnapshot, user: Option<&str>) {
    print_header(snapshot, user);
    match &snapshot.run {
        Some(run) => println!("  Run:     #{} {}", run.run_id, run.status),
        None => println!("  Run:     (not started)"),
    }
    println!("  Progress: {}%", snapshot.progress_pct);
    if snapshot.cancel_requested && snapshot.is_running() {
        println!("  Stop requested; waiting for the next checkpoint.");
    }
    println!();

    if !snapshot.preamble.is_empty() {
        for line in &snapshot.preamble {
            println!("  {}", format_line(line));
        }
        println!();
    }

    for (index, task) in snapshot.tasks.iter().enumerate() {
        println!(
            "  {} {}. {} — {}",
            status_icon(task.state.status),
            index + 1,
            task.task.name,
            task.state.status
        );
        match task.state.status {
            TaskStatus::Running | TaskStatus::Interrupted => {
                for line in &task.state.log {
                    println!("      {}", format_line(line));
                }
            }
            _ => {}
        }
        if let Some(result) = task.result() {
            print_result(result);
        }
    }

    if let Some(last) = &snapshot.last_completed {
        println!();
        println!(
            "  Last completed run: #{} for {} ({})",
            last.run_id,
            last.entity,
            last.completed_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    println!();
}

fn print_result(result: &ResultPayload) {
    if let Some(heading) = &result.heading {
        println!("    {heading}");
    }
    for field in &result.fields {
        match &field.value {
            FieldValue::Bullets(_) => {
                println!("    {}:", field.label);
                for line in field.value.to_plain_text().lines() {
                    println!("      {line}");
                }
            }
            value => println!("    {}: {}", field.label, value.to_plain_text()),
        }
    }
}

fn format_line(line: &LogLine) -> String {
    match line.class {
        LogClass::Title => line.text.clone(),
        LogClass::Meta => format!("  ({})", line.text),
        LogClass::Info | LogClass::Success => format!("  {}", line.text),
    }
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI pipeline observer using an indicatif spinner; log lines are printed above it.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .expect("valid progress template")
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl PipelineObserver for CliProgress {
    fn run_started(&self, run: &PipelineRun, total_tasks: usize) {
        self.spinner.println(format!(
            "Run #{} · {} · {} ({total_tasks} tasks)",
            run.run_id,
            run.kind.title(),
            run.entity
        ));
    }

    fn task_started(&self, task: &TaskDescriptor, index: usize) {
        self.spinner.println(format!(
            "\n{} {}. {}",
            status_icon(TaskStatus::Running),
            index + 1,
            task.name
        ));
        self.spinner.set_message(format!("{} — Running", task.name));
    }

    fn log_line(&self, task: Option<&TaskDescriptor>, line: &LogLine, task_pct: u8) {
        self.spinner.println(format!("   {}", format_line(line)));
        if let Some(task) = task {
            self.spinner
                .set_message(format!("{} — Executing... {task_pct}%", task.name));
        }
    }

    fn task_finished(&self, task: &TaskDescriptor, overall_pct: u8) {
        self.spinner.println(format!(
            "{} {} — Done (overall {overall_pct}%)",
            status_icon(TaskStatus::Done),
            task.name
        ));
    }

    fn task_interrupted(&self, task: Option<&TaskDescriptor>) {
        let name = task.map(|t| t.name).unwrap_or("Lead scoring phase");
        self.spinner.println(format!(
            "{} {name} — Interrupted by user",
            status_icon(TaskStatus::Interrupted)
        ));
    }

    fn run_finished(&self, _run: &PipelineRun) {
        self.spinner.finish_and_clear();
    }
}
