//! Rendered task results keyed by `(pipeline, task, entity)`.

use std::sync::Arc;

use tracing::debug;

use leadconsole_records::normalize_entity_name;
use leadconsole_shared::{PipelineKind, Result, ResultPayload};
use leadconsole_storage::Storage;

/// Session-scoped cache of completed task results.
///
/// Entities are keyed by [`normalize_entity_name`], so spelling variants of
/// the same company share entries.
#[derive(Clone)]
pub struct ResultCache {
    storage: Arc<Storage>,
    session_id: String,
}

impl ResultCache {
    pub fn new(storage: Arc<Storage>, session_id: impl Into<String>) -> Self {
        Self {
            storage,
            session_id: session_id.into(),
        }
    }

    /// Cached payload and the run that produced it.
    pub async fn get(
        &self,
        kind: PipelineKind,
        task_key: &str,
        entity: &str,
    ) -> Result<Option<(ResultPayload, u64)>> {
        let cached = self
            .storage
            .get_cached_result(
                &self.session_id,
                kind.as_str(),
                task_key,
                &normalize_entity_name(entity),
            )
            .await?;
        match cached {
            Some(row) => Ok(Some((serde_json::from_str(&row.payload_json)?, row.run_id))),
            None => Ok(None),
        }
    }

    pub async fn put(
        &self,
        kind: PipelineKind,
        task_key: &str,
        entity: &str,
        payload: &ResultPayload,
        run_id: u64,
    ) -> Result<()> {
        let json = serde_json::to_string(payload)?;
        self.storage
            .put_cached_result(
                &self.session_id,
                kind.as_str(),
                task_key,
                &normalize_entity_name(entity),
                &json,
                run_id,
            )
            .await
    }

    /// Drop every entry of `entity`, across pipelines.
    pub async fn invalidate(&self, entity: &str) -> Result<u64> {
        let removed = self
            .storage
            .invalidate_results_for_entity(&self.session_id, &normalize_entity_name(entity))
            .await?;
        debug!(entity, removed, "invalidated cached results");
        Ok(removed)
    }

    /// Drop the entries of one pipeline for `entity`.
    pub async fn invalidate_pipeline(&self, kind: PipelineKind, entity: &str) -> Result<u64> {
        self.storage
            .invalidate_results(
                &self.session_id,
                kind.as_str(),
                &normalize_entity_name(entity),
            )
            .await
    }

    pub async fn count(&self, kind: PipelineKind, entity: &str) -> Result<usize> {
        self.storage
            .count_cached_results(
                &self.session_id,
                kind.as_str(),
                &normalize_entity_name(entity),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadconsole_shared::{FieldValue, RenderedField};
    use uuid::Uuid;

    async fn test_cache() -> ResultCache {
        let tmp = std::env::temp_dir().join(format!("lc_test_{}.db", Uuid::now_v7()));
        let storage = Storage::open(&tmp).await.expect("open test db");
        ResultCache::new(Arc::new(storage), "test")
    }

    fn payload(domain: &str) -> ResultPayload {
        ResultPayload {
            task_key: "website".into(),
            heading: None,
            fields: vec![RenderedField::new(
                "Official Domain",
                FieldValue::Text(domain.into()),
            )],
        }
    }

    #[tokio::test]
    async fn entries_are_keyed_by_normalized_entity() {
        let cache = test_cache().await;
        cache
            .put(PipelineKind::Ingest, "website", "VF Corporation", &payload("vfc.com"), 3)
            .await
            .unwrap();

        let (hit, run_id) = cache
            .get(PipelineKind::Ingest, "website", "vf-corporation")
            .await
            .unwrap()
            .expect("cache hit");
        assert_eq!(hit, payload("vfc.com"));
        assert_eq!(run_id, 3);

        assert!(cache
            .get(PipelineKind::Score, "website", "VF Corporation")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn put_replaces_whole_entry() {
        let cache = test_cache().await;
        cache
            .put(PipelineKind::Ingest, "website", "VeriSign", &payload("old"), 1)
            .await
            .unwrap();
        cache
            .put(PipelineKind::Ingest, "website", "VeriSign", &payload("verisign.com"), 2)
            .await
            .unwrap();
        let (hit, run_id) = cache
            .get(PipelineKind::Ingest, "website", "VeriSign")
            .await
            .unwrap()
            .expect("cache hit");
        assert_eq!(hit, payload("verisign.com"));
        assert_eq!(run_id, 2);
        assert_eq!(cache.count(PipelineKind::Ingest, "VeriSign").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn invalidation_scopes() {
        let cache = test_cache().await;
        for kind in PipelineKind::ALL {
            cache
                .put(kind, "website", "Wolfspeed", &payload("wolfspeed.com"), 1)
                .await
                .unwrap();
        }
        cache
            .put(PipelineKind::Ingest, "website", "VeriSign", &payload("verisign.com"), 1)
            .await
            .unwrap();

        assert_eq!(
            cache
                .invalidate_pipeline(PipelineKind::Score, "Wolfspeed")
                .await
                .unwrap(),
            1
        );
        assert_eq!(cache.count(PipelineKind::Ingest, "Wolfspeed").await.unwrap(), 1);

        cache.invalidate("Wolfspeed").await.unwrap();
        assert_eq!(cache.count(PipelineKind::Ingest, "Wolfspeed").await.unwrap(), 0);
        assert_eq!(cache.count(PipelineKind::Ingest, "VeriSign").await.unwrap(), 1);
    }
}
