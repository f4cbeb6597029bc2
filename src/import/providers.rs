use anyhow::Context;
use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::constants::{DEFAULT_TRUST_SCORE, RATING_MAX, TRUST_SCORE_MAX};
use crate::model::lenient::value_as_f64;
use crate::model::slugify;
use crate::store::{EntityKind, EntityStore, Record, record_id, record_str};

const FLAG_FIELDS: [&str; 4] = ["gphc_registered", "cqc_regulated", "mhra_compliant", "gmc_doctors"];

/// Keys never copied from an import row.
const RESERVED_FIELDS: [&str; 3] = ["id", "slug", "medications"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RowOutcome {
    Create { name: String },
    Update { name: String, id: String },
    Skip { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowFailure {
    pub name: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProviderImportReport {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: Vec<RowFailure>,
}

impl ProviderImportReport {
    pub fn message(&self) -> String {
        let mut msg = format!(
            "Import completed! Created {} new providers, updated {} existing providers",
            self.created, self.updated
        );
        if self.skipped > 0 {
            msg.push_str(&format!(", skipped {} invalid records", self.skipped));
        }
        msg.push('.');
        if !self.failed.is_empty() {
            let names: Vec<&str> = self.failed.iter().map(|f| f.name.as_str()).collect();
            msg.push_str(&format!(
                " Warning: {} rows failed to save: {}.",
                self.failed.len(),
                names.join(", ")
            ));
        }
        msg
    }
}

fn row_name(row: &Record) -> Option<&str> {
    record_str(row, "name").filter(|n| !n.trim().is_empty())
}

/// Case-insensitive exact name index over the current collection. The first
/// record with a given name wins.
struct NameIndex {
    entries: Vec<(String, String)>,
}

impl NameIndex {
    fn new(existing: &[Record]) -> Self {
        let entries = existing
            .iter()
            .filter_map(|r| Some((record_str(r, "name")?.to_lowercase(), record_id(r)?)))
            .collect();
        Self { entries }
    }

    fn find(&self, name: &str) -> Option<&str> {
        let wanted = name.to_lowercase();
        self.entries
            .iter()
            .find(|(n, _)| *n == wanted)
            .map(|(_, id)| id.as_str())
    }

    fn insert(&mut self, name: &str, id: String) {
        self.entries.push((name.to_lowercase(), id));
    }
}

/// What importing `rows` against `existing` would do, row by row, without
/// writing anything. A name repeated within the batch updates the record its
/// first occurrence creates.
pub fn preview_provider_import(existing: &[Record], rows: &[Record]) -> Vec<RowOutcome> {
    let mut index = NameIndex::new(existing);
    rows.iter()
        .enumerate()
        .map(|(i, row)| match row_name(row) {
            None => RowOutcome::Skip {
                reason: "missing name".to_string(),
            },
            Some(name) => match index.find(name).map(str::to_string) {
                Some(id) => RowOutcome::Update {
                    name: name.to_string(),
                    id,
                },
                None => {
                    index.insert(name, format!("new-{i}"));
                    RowOutcome::Create {
                        name: name.to_string(),
                    }
                }
            },
        })
        .collect()
}

fn provided<'a>(row: &'a Record, key: &str) -> Option<&'a Value> {
    row.get(key).filter(|v| match v {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    })
}

fn clamped(row: &Record, key: &str, min: f64, max: f64) -> Option<f64> {
    provided(row, key)
        .and_then(value_as_f64)
        .map(|v| v.clamp(min, max))
}

fn flag(value: &Value) -> Option<Value> {
    match value {
        Value::Bool(b) => Some(Value::Bool(*b)),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        _ => None,
    }
}

fn locations(row: &Record) -> Option<Value> {
    if let Some(Value::Array(items)) = provided(row, "locations") {
        let list: Vec<Value> = items
            .iter()
            .filter(|v| v.as_str().is_some_and(|s| !s.trim().is_empty()))
            .cloned()
            .collect();
        if !list.is_empty() {
            return Some(Value::Array(list));
        }
    }
    provided(row, "coverage").map(|c| json!([c]))
}

/// Provided fields of `row`, normalised and clamped. Malformed numbers and
/// flags are dropped; the price map is never included.
fn normalized_fields(row: &Record, name: &str) -> Record {
    let mut out = Map::new();
    for (key, value) in row {
        if RESERVED_FIELDS.contains(&key.as_str()) || provided(row, key).is_none() {
            continue;
        }
        match key.as_str() {
            "trust_score" | "rating" | "consultation_fee" | "review_count" | "locations" => {}
            k if FLAG_FIELDS.contains(&k) => {
                if let Some(v) = flag(value) {
                    out.insert(key.clone(), v);
                }
            }
            _ => {
                out.insert(key.clone(), value.clone());
            }
        }
    }

    out.insert("name".to_string(), json!(name));
    out.insert("slug".to_string(), json!(slugify(name)));
    if let Some(v) = clamped(row, "trust_score", 0.0, TRUST_SCORE_MAX) {
        out.insert("trust_score".to_string(), json!(v));
    }
    if let Some(v) = clamped(row, "rating", 0.0, RATING_MAX) {
        out.insert("rating".to_string(), json!(v));
    }
    if let Some(v) = clamped(row, "consultation_fee", 0.0, f64::MAX) {
        out.insert("consultation_fee".to_string(), json!(v));
    }
    if let Some(v) = clamped(row, "review_count", 0.0, f64::MAX) {
        out.insert("review_count".to_string(), json!(v.round() as u64));
    }
    if let Some(v) = locations(row) {
        out.insert("locations".to_string(), v);
    }
    out
}

/// Create payload: provided fields plus defaults for everything the row
/// leaves out, and an empty price map.
pub fn create_payload(row: &Record, name: &str) -> Record {
    let mut out = normalized_fields(row, name);
    out.entry("trust_score").or_insert(json!(DEFAULT_TRUST_SCORE));
    out.entry("rating").or_insert(Value::Null);
    out.entry("consultation_fee").or_insert(Value::Null);
    out.entry("review_count").or_insert(json!(0));
    out.entry("locations").or_insert(json!([]));
    out.insert("medications".to_string(), json!({}));
    out
}

/// Update payload: only what the row provides. Existing pricing stays as is
/// because `medications` is never sent.
pub fn update_payload(row: &Record, name: &str) -> Record {
    normalized_fields(row, name)
}

/// Reconciles provider rows with the store, one write at a time. A failed
/// write is recorded and the batch carries on.
pub async fn import_providers<S: EntityStore>(
    store: &S,
    rows: &[Record],
) -> anyhow::Result<ProviderImportReport> {
    let existing = store
        .list(EntityKind::Provider, None, None)
        .await
        .context("Failed loading existing providers")?;
    let mut index = NameIndex::new(&existing);
    let mut report = ProviderImportReport::default();

    for row in rows {
        let Some(name) = row_name(row) else {
            report.skipped += 1;
            continue;
        };

        let result = match index.find(name).map(str::to_string) {
            Some(id) => store
                .update(EntityKind::Provider, &id, update_payload(row, name))
                .await
                .map(|_| report.updated += 1),
            None => match store
                .create(EntityKind::Provider, create_payload(row, name))
                .await
            {
                Ok(created) => {
                    if let Some(id) = record_id(&created) {
                        index.insert(name, id);
                    }
                    report.created += 1;
                    Ok(())
                }
                Err(e) => Err(e),
            },
        };

        if let Err(e) = result {
            tracing::warn!("Provider row {:?} failed: {}", name, e);
            report.failed.push(RowFailure {
                name: name.to_string(),
                error: e.to_string(),
            });
        }
    }

    tracing::info!(
        "provider import: created={} updated={} skipped={} failed={}",
        report.created,
        report.updated,
        report.skipped,
        report.failed.len()
    );
    Ok(report)
}
