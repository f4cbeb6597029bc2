//! Contract of the hosted entity store and the two clients for it.
//!
//! Records are plain JSON objects. Typed views (`Provider`, `BlogPost`, ...)
//! are decoded on top of them so that writes can stay partial and never drop
//! fields this crate does not know about.

pub mod http;
pub mod memory;

use std::cmp::Ordering;
use std::fmt;
use std::future::Future;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::StoreResult;

pub use http::HttpStore;
pub use memory::MemoryStore;

pub type Record = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityKind {
    Provider,
    Medication,
    BlogPost,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Provider => "Provider",
            EntityKind::Medication => "Medication",
            EntityKind::BlogPost => "BlogPost",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field name optionally prefixed with `-` for descending order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: String,
    pub descending: bool,
}

impl SortSpec {
    pub fn asc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            descending: false,
        }
    }

    pub fn desc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            descending: true,
        }
    }

    /// `""` and `"-"` carry no field and parse to `None`.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let (field, descending) = match s.strip_prefix('-') {
            Some(rest) => (rest, true),
            None => (s, false),
        };
        if field.is_empty() {
            return None;
        }
        Some(Self {
            field: field.to_string(),
            descending,
        })
    }

    pub fn as_param(&self) -> String {
        if self.descending {
            format!("-{}", self.field)
        } else {
            self.field.clone()
        }
    }

    /// Orders two records by this spec. Missing and null values go last in
    /// both directions.
    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        let a = a.get(&self.field).filter(|v| !v.is_null());
        let b = b.get(&self.field).filter(|v| !v.is_null());
        match (a, b) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a), Some(b)) => {
                let ord = compare_present(a, b);
                if self.descending { ord.reverse() } else { ord }
            }
        }
    }
}

fn compare_present(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.total_cmp(&y)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

/// The hosted backend's generic entity API.
pub trait EntityStore: Send + Sync {
    fn list(
        &self,
        kind: EntityKind,
        sort: Option<&SortSpec>,
        limit: Option<usize>,
    ) -> impl Future<Output = StoreResult<Vec<Record>>> + Send;

    /// Records whose fields equal every entry of `matches`.
    fn filter(
        &self,
        kind: EntityKind,
        matches: &Record,
        sort: Option<&SortSpec>,
    ) -> impl Future<Output = StoreResult<Vec<Record>>> + Send;

    fn get(&self, kind: EntityKind, id: &str) -> impl Future<Output = StoreResult<Record>> + Send;

    fn create(
        &self,
        kind: EntityKind,
        fields: Record,
    ) -> impl Future<Output = StoreResult<Record>> + Send;

    /// Partial update: only the keys present in `fields` are written.
    fn update(
        &self,
        kind: EntityKind,
        id: &str,
        fields: Record,
    ) -> impl Future<Output = StoreResult<Record>> + Send;

    fn delete(&self, kind: EntityKind, id: &str) -> impl Future<Output = StoreResult<()>> + Send;
}

pub fn record_id(record: &Record) -> Option<String> {
    match record.get("id")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn record_str<'a>(record: &'a Record, key: &str) -> Option<&'a str> {
    record.get(key).and_then(Value::as_str)
}

/// Decodes records into typed views, dropping (and logging) any that do not
/// fit.
pub fn decode_all<T: DeserializeOwned>(kind: EntityKind, records: Vec<Record>) -> Vec<T> {
    let mut out = Vec::with_capacity(records.len());
    for record in records {
        let id = record_id(&record).unwrap_or_default();
        match serde_json::from_value::<T>(Value::Object(record)) {
            Ok(v) => out.push(v),
            Err(e) => tracing::warn!("Skipping undecodable {} {}: {}", kind, id, e),
        }
    }
    out
}

/// Builds a record from `key => value` pairs.
pub fn record<I, K>(pairs: I) -> Record
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(v: Value) -> Record {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn sort_spec_parses_direction_prefix() {
        assert_eq!(SortSpec::parse("-trust_score"), Some(SortSpec::desc("trust_score")));
        assert_eq!(SortSpec::parse("name"), Some(SortSpec::asc("name")));
        assert_eq!(SortSpec::parse(""), None);
        assert_eq!(SortSpec::parse("-"), None);
        assert_eq!(SortSpec::desc("published_date").as_param(), "-published_date");
    }

    #[test]
    fn missing_values_sort_last_in_both_directions() {
        let a = rec(json!({"trust_score": 3}));
        let b = rec(json!({"trust_score": null}));
        let c = rec(json!({"trust_score": 9}));

        let mut asc = vec![b.clone(), c.clone(), a.clone()];
        let spec = SortSpec::asc("trust_score");
        asc.sort_by(|x, y| spec.compare(x, y));
        assert_eq!(asc, vec![a.clone(), c.clone(), b.clone()]);

        let mut desc = vec![b.clone(), a.clone(), c.clone()];
        let spec = SortSpec::desc("trust_score");
        desc.sort_by(|x, y| spec.compare(x, y));
        assert_eq!(desc, vec![c, a, b]);
    }

    #[test]
    fn record_id_accepts_numeric_ids() {
        assert_eq!(record_id(&rec(json!({"id": 42}))), Some("42".to_string()));
        assert_eq!(record_id(&rec(json!({"id": ""}))), None);
        assert_eq!(record_id(&rec(json!({}))), None);
    }
}
