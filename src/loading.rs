use std::time::Duration;

use futures::future::join;
use serde::Serialize;
use serde_json::Value;

use crate::constants::{
    DEFAULT_PROVIDER_SORT, HOME_FEATURED_PROVIDERS, HOME_LOAD_ERROR, HOME_POPULAR_MEDICATIONS,
    PROVIDER_LOAD_ERROR,
};
use crate::error::{LoadError, StoreResult};
use crate::model::{Medication, Provider, medications_or_default};
use crate::store::{EntityKind, EntityStore, Record, SortSpec, decode_all, record};

fn trust_sort() -> Option<SortSpec> {
    SortSpec::parse(DEFAULT_PROVIDER_SORT)
}

/// Full provider list for the search page, highest trust score first.
pub async fn load_providers<S: EntityStore>(
    store: &S,
    timeout: Duration,
) -> Result<Vec<Provider>, LoadError> {
    let sort = trust_sort();
    let list = store.list(EntityKind::Provider, sort.as_ref(), None);
    match tokio::time::timeout(timeout, list).await {
        Ok(Ok(records)) => Ok(decode_all(EntityKind::Provider, records)),
        Ok(Err(source)) => {
            tracing::warn!("Loading providers failed: {}", source);
            Err(LoadError::Failed {
                message: PROVIDER_LOAD_ERROR,
                source,
            })
        }
        Err(_) => {
            tracing::warn!("Loading providers timed out after {:?}", timeout);
            Err(LoadError::TimedOut {
                message: PROVIDER_LOAD_ERROR,
            })
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct HomeData {
    pub featured_providers: Vec<Provider>,
    pub medications: Vec<Medication>,
}

/// Top providers and popular medications for the landing page. Each list
/// degrades to empty on its own; only the shared timeout fails the load.
pub async fn load_home<S: EntityStore>(store: &S, timeout: Duration) -> Result<HomeData, LoadError> {
    let sort = trust_sort();
    let providers = async {
        store
            .list(EntityKind::Provider, sort.as_ref(), Some(HOME_FEATURED_PROVIDERS))
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("Loading featured providers failed: {}", e);
                Vec::new()
            })
    };
    let medications = async {
        store
            .list(EntityKind::Medication, None, Some(HOME_POPULAR_MEDICATIONS))
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("Loading popular medications failed: {}", e);
                Vec::new()
            })
    };

    match tokio::time::timeout(timeout, join(providers, medications)).await {
        Ok((providers, medications)) => Ok(HomeData {
            featured_providers: decode_all(EntityKind::Provider, providers),
            medications: medications_or_default(decode_all(EntityKind::Medication, medications)),
        }),
        Err(_) => {
            tracing::warn!("Loading home page timed out after {:?}", timeout);
            Err(LoadError::TimedOut {
                message: HOME_LOAD_ERROR,
            })
        }
    }
}

/// The medication catalogue; the built-in entries stand in when the remote
/// list is empty or unavailable.
pub async fn load_medications<S: EntityStore>(store: &S) -> Vec<Medication> {
    match store.list(EntityKind::Medication, None, None).await {
        Ok(records) => medications_or_default(decode_all(EntityKind::Medication, records)),
        Err(e) => {
            tracing::warn!("Loading medications failed: {}", e);
            medications_or_default(Vec::new())
        }
    }
}

/// Provider detail lookup. `Ok(None)` when no record has that id.
pub async fn load_provider<S: EntityStore>(store: &S, id: &str) -> StoreResult<Option<Provider>> {
    let matches: Record = record([("id", Value::String(id.to_string()))]);
    let records = store.filter(EntityKind::Provider, &matches, None).await?;
    Ok(decode_all(EntityKind::Provider, records).into_iter().next())
}

#[cfg(test)]
pub(crate) mod slow {
    use std::time::Duration;

    use crate::error::StoreResult;
    use crate::store::{EntityKind, EntityStore, MemoryStore, Record, SortSpec};

    /// Wraps a memory store and delays every list call.
    pub struct SlowStore {
        pub inner: MemoryStore,
        pub delay: Duration,
        pub slow_kinds: Vec<EntityKind>,
    }

    impl EntityStore for SlowStore {
        async fn list(
            &self,
            kind: EntityKind,
            sort: Option<&SortSpec>,
            limit: Option<usize>,
        ) -> StoreResult<Vec<Record>> {
            if self.slow_kinds.contains(&kind) {
                tokio::time::sleep(self.delay).await;
            }
            self.inner.list(kind, sort, limit).await
        }

        async fn filter(
            &self,
            kind: EntityKind,
            matches: &Record,
            sort: Option<&SortSpec>,
        ) -> StoreResult<Vec<Record>> {
            self.inner.filter(kind, matches, sort).await
        }

        async fn get(&self, kind: EntityKind, id: &str) -> StoreResult<Record> {
            self.inner.get(kind, id).await
        }

        async fn create(&self, kind: EntityKind, fields: Record) -> StoreResult<Record> {
            self.inner.create(kind, fields).await
        }

        async fn update(&self, kind: EntityKind, id: &str, fields: Record) -> StoreResult<Record> {
            self.inner.update(kind, id, fields).await
        }

        async fn delete(&self, kind: EntityKind, id: &str) -> StoreResult<()> {
            self.inner.delete(kind, id).await
        }
    }
}
