//! Shared types, error model, and configuration for LeadConsole.
//!
//! This crate is the foundation depended on by all other LeadConsole crates.
//! It provides:
//! - [`LeadConsoleError`]: the unified error type
//! - Domain types ([`PipelineRun`], [`TaskState`], [`LogLine`], [`Record`], [`ResultPayload`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DEFAULT_BUSINESS_CONTEXT, DEFAULT_LEAD_LIST_NAME, DefaultsConfig, ExportConfig,
    RecordsConfig, ScoringConfig, config_dir, config_file_path, expand_home, init_config,
    load_config, load_config_from,
};
pub use error::{LeadConsoleError, Result};
pub use types::{
    Bullet, FieldValue, LastCompletedRun, LogClass, LogLine, MISSING_VALUE, PipelineKind,
    PipelineRun, Record, RenderedField, ResultPayload, RunStatus, TaskState, TaskStatus,
};
