//! Keeps per-entity state from leaking across entity switches.

use tracing::info;

use leadconsole_records::normalize_entity_name;
use leadconsole_shared::{LeadConsoleError, Result};

use crate::cache::ResultCache;
use crate::session::PipelineSessionState;

/// What [`EntityScopeGuard::enforce`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeOutcome {
    /// Selected entity already owns the stored state (or nothing is selected).
    Unchanged,
    /// No entity owned the state yet; the selected one now does.
    Initialized,
    /// State of `previous` was purged.
    Switched {
        previous: String,
        removed_keys: usize,
    },
}

/// Compares the selected entity with the owner of the stored state.
pub struct EntityScopeGuard;

impl EntityScopeGuard {
    /// Purge stale per-entity state when `selected` differs from the scope owner.
    ///
    /// Entities compare by normalized name. Runs on every interaction before
    /// anything is rendered, so a switch never shows the previous entity's data.
    /// A switch away from the entity of an executing run fails with
    /// `RunInProgress` and changes nothing.
    ///
    /// The scope owner is written last, so an interrupted purge is redone by
    /// the next call.
    pub async fn enforce(
        state: &PipelineSessionState,
        cache: &ResultCache,
        selected: &str,
    ) -> Result<ScopeOutcome> {
        let selected_key = normalize_entity_name(selected);
        if selected_key.is_empty() {
            return Ok(ScopeOutcome::Unchanged);
        }

        let previous = state.scope_entity().await?;
        if previous
            .as_deref()
            .is_some_and(|p| normalize_entity_name(p) == selected_key)
        {
            return Ok(ScopeOutcome::Unchanged);
        }

        if let Some(claim) = state.run_claim().await? {
            if normalize_entity_name(&claim.entity) != selected_key {
                return Err(LeadConsoleError::RunInProgress {
                    pipeline: claim.kind.to_string(),
                });
            }
        }

        let Some(previous) = previous else {
            state.set_scope_entity(selected.trim()).await?;
            return Ok(ScopeOutcome::Initialized);
        };

        cache.invalidate(&previous).await?;
        let removed_keys = state.purge_entity_scope().await?;
        state.set_scope_entity(selected.trim()).await?;

        info!(
            previous = %previous,
            selected = selected.trim(),
            removed_keys,
            "entity switched, purged stale state"
        );

        Ok(ScopeOutcome::Switched {
            previous,
            removed_keys,
        })
    }

    /// Whether `selected` owns the stored state. Never writes.
    pub async fn is_current(state: &PipelineSessionState, selected: &str) -> Result<bool> {
        let selected_key = normalize_entity_name(selected);
        if selected_key.is_empty() {
            return Ok(true);
        }
        Ok(state
            .scope_entity()
            .await?
            .is_some_and(|owner| normalize_entity_name(&owner) == selected_key))
    }
}
