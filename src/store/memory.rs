use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, anyhow};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::auth::{Session, User};
use crate::error::{StoreError, StoreResult};
use crate::store::{EntityKind, EntityStore, Record, SortSpec, record_id};

/// In-process entity store with the hosted backend's list/filter/sort
/// semantics. Backs `serve --seed` and the test suite.
pub struct MemoryStore {
    inner: Mutex<Tables>,
    user: Option<User>,
}

#[derive(Default)]
struct Tables {
    next_id: u64,
    rows: BTreeMap<EntityKind, Vec<Record>>,
}

impl Tables {
    fn assign_id(&mut self, record: &mut Record) -> String {
        if let Some(id) = record_id(record) {
            return id;
        }
        self.next_id += 1;
        let id = format!("mem-{}", self.next_id);
        record.insert("id".to_string(), Value::String(id.clone()));
        id
    }

    fn table(&mut self, kind: EntityKind) -> &mut Vec<Record> {
        self.rows.entry(kind).or_default()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Tables::default()),
            user: None,
        }
    }

    /// The account `me()` reports. Without one, `me()` fails as signed out.
    pub fn with_user(mut self, user: User) -> Self {
        self.user = Some(user);
        self
    }

    pub fn with_records(mut self, kind: EntityKind, records: Vec<Record>) -> Self {
        let tables = self.inner.get_mut();
        for mut record in records {
            tables.assign_id(&mut record);
            tables.table(kind).push(record);
        }
        self
    }

    /// Loads `{"Provider": [...], "Medication": [...], "BlogPost": [...]}`.
    pub fn from_seed_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read seed file {}", path.display()))?;
        let seed: BTreeMap<String, Vec<Record>> = serde_json::from_str(&raw)
            .with_context(|| format!("parse seed file {}", path.display()))?;

        let mut store = Self::new();
        for (name, records) in seed {
            let kind = match name.as_str() {
                "Provider" => EntityKind::Provider,
                "Medication" => EntityKind::Medication,
                "BlogPost" => EntityKind::BlogPost,
                other => return Err(anyhow!("unknown entity {other} in seed file")),
            };
            store = store.with_records(kind, records);
        }
        Ok(store)
    }

    /// Snapshot of one table in insertion order.
    pub async fn snapshot(&self, kind: EntityKind) -> Vec<Record> {
        let tables = self.inner.lock().await;
        tables.rows.get(&kind).cloned().unwrap_or_default()
    }
}

fn matches_all(record: &Record, matches: &Record) -> bool {
    matches.iter().all(|(k, v)| match (record.get(k), v) {
        (Some(actual), expected) => actual == expected,
        (None, Value::Null) => true,
        (None, _) => false,
    })
}

fn sorted(mut rows: Vec<Record>, sort: Option<&SortSpec>) -> Vec<Record> {
    if let Some(spec) = sort {
        rows.sort_by(|a, b| spec.compare(a, b));
    }
    rows
}

impl EntityStore for MemoryStore {
    async fn list(
        &self,
        kind: EntityKind,
        sort: Option<&SortSpec>,
        limit: Option<usize>,
    ) -> StoreResult<Vec<Record>> {
        let rows = {
            let tables = self.inner.lock().await;
            tables.rows.get(&kind).cloned().unwrap_or_default()
        };
        let mut rows = sorted(rows, sort);
        if let Some(limit) = limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn filter(
        &self,
        kind: EntityKind,
        matches: &Record,
        sort: Option<&SortSpec>,
    ) -> StoreResult<Vec<Record>> {
        let rows = {
            let tables = self.inner.lock().await;
            tables
                .rows
                .get(&kind)
                .map(|rows| {
                    rows.iter()
                        .filter(|r| matches_all(r, matches))
                        .cloned()
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default()
        };
        Ok(sorted(rows, sort))
    }

    async fn get(&self, kind: EntityKind, id: &str) -> StoreResult<Record> {
        let tables = self.inner.lock().await;
        tables
            .rows
            .get(&kind)
            .and_then(|rows| {
                rows.iter()
                    .find(|r| record_id(r).as_deref() == Some(id))
                    .cloned()
            })
            .ok_or_else(|| StoreError::NotFound {
                kind,
                id: id.to_string(),
            })
    }

    async fn create(&self, kind: EntityKind, mut fields: Record) -> StoreResult<Record> {
        let mut tables = self.inner.lock().await;
        tables.assign_id(&mut fields);
        tables.table(kind).push(fields.clone());
        Ok(fields)
    }

    async fn update(&self, kind: EntityKind, id: &str, fields: Record) -> StoreResult<Record> {
        let mut tables = self.inner.lock().await;
        let row = tables
            .table(kind)
            .iter_mut()
            .find(|r| record_id(r).as_deref() == Some(id))
            .ok_or_else(|| StoreError::NotFound {
                kind,
                id: id.to_string(),
            })?;
        for (k, v) in fields {
            if k != "id" {
                row.insert(k, v);
            }
        }
        Ok(row.clone())
    }

    async fn delete(&self, kind: EntityKind, id: &str) -> StoreResult<()> {
        let mut tables = self.inner.lock().await;
        let table = tables.table(kind);
        let before = table.len();
        table.retain(|r| record_id(r).as_deref() != Some(id));
        if table.len() == before {
            return Err(StoreError::NotFound {
                kind,
                id: id.to_string(),
            });
        }
        Ok(())
    }
}

impl Session for MemoryStore {
    async fn me(&self) -> StoreResult<User> {
        self.user.clone().ok_or(StoreError::Unauthenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(v: Value) -> Record {
        v.as_object().cloned().unwrap()
    }

    fn seeded() -> MemoryStore {
        MemoryStore::new().with_records(
            EntityKind::Provider,
            vec![
                rec(json!({"id": "a", "name": "Acme", "trust_score": 9})),
                rec(json!({"id": "b", "name": "Beta", "trust_score": 3})),
                rec(json!({"name": "Gamma", "trust_score": 7})),
            ],
        )
    }

    #[tokio::test]
    async fn list_sorts_and_limits() {
        let store = seeded();
        let rows = store
            .list(EntityKind::Provider, Some(&SortSpec::desc("trust_score")), Some(2))
            .await
            .unwrap();
        let names: Vec<_> = rows.iter().map(|r| r["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["Acme", "Gamma"]);
    }

    #[tokio::test]
    async fn seeded_rows_without_id_get_one() {
        let store = seeded();
        let rows = store.list(EntityKind::Provider, None, None).await.unwrap();
        assert_eq!(record_id(&rows[2]).as_deref(), Some("mem-1"));
    }

    #[tokio::test]
    async fn update_merges_only_given_fields() {
        let store = seeded();
        let updated = store
            .update(EntityKind::Provider, "a", rec(json!({"rating": 4.5})))
            .await
            .unwrap();
        assert_eq!(updated["name"], json!("Acme"));
        assert_eq!(updated["trust_score"], json!(9));
        assert_eq!(updated["rating"], json!(4.5));
    }

    #[tokio::test]
    async fn filter_requires_every_field() {
        let store = seeded();
        let rows = store
            .filter(EntityKind::Provider, &rec(json!({"name": "Beta", "trust_score": 3})), None)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);

        let none = store
            .filter(EntityKind::Provider, &rec(json!({"name": "Beta", "trust_score": 4})), None)
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn missing_ids_are_not_found() {
        let store = seeded();
        let err = store.get(EntityKind::Provider, "zzz").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
        assert!(store.delete(EntityKind::Provider, "zzz").await.is_err());
        store.delete(EntityKind::Provider, "a").await.unwrap();
        assert_eq!(store.snapshot(EntityKind::Provider).await.len(), 2);
    }

    #[tokio::test]
    async fn me_without_user_is_unauthenticated() {
        let store = MemoryStore::new();
        assert!(matches!(store.me().await, Err(StoreError::Unauthenticated)));
    }
}
