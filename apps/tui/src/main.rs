//! LeadConsole TUI: interactive console for the enrichment and scoring pipelines.
//!
//! The redraw loop re-reads the session from the state store on every frame;
//! launched runs execute on a background tokio runtime and only ever
//! communicate with the UI through that store (plus short status messages).

mod app;
mod screens;
mod widgets;

use std::fs::OpenOptions;
use std::sync::Mutex;

use color_eyre::eyre::Result;
use leadconsole_shared::config_dir;

fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing()?;

    let runtime = tokio::runtime::Runtime::new()?;
    let console = runtime.block_on(app::Console::open())?;
    app::run(&runtime, console)
}

/// Log to `~/.leadconsole/tui.log`; the terminal belongs to the UI.
fn init_tracing() -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt};

    let dir = config_dir()?;
    std::fs::create_dir_all(&dir)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("tui.log"))?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("leadconsole=info"));

    fmt()
        .with_env_filter(env_filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}
