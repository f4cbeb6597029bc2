use anyhow::Context;
use futures::future::join_all;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::StoreResult;
use crate::store::{EntityKind, EntityStore, Record, record, record_id, record_str};

/// Whole-pound rounding with halves rounded up, as browsers do.
pub fn round_price(price: f64) -> i64 {
    (price + 0.5).floor() as i64
}

/// Sets or clears one dosage price. `None` stores `null`, which the grid
/// shows as "not offered".
pub fn set_price(
    medications: &mut Map<String, Value>,
    medication: &str,
    dosage: &str,
    price: Option<f64>,
) {
    let entry = medications
        .entry(medication.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !entry.is_object() {
        *entry = Value::Object(Map::new());
    }
    if let Value::Object(dosages) = entry {
        let value = price
            .filter(|p| p.is_finite())
            .map(Value::from)
            .unwrap_or(Value::Null);
        dosages.insert(dosage.to_string(), value);
    }
}

/// Rounds every fractional numeric price in place. Returns whether anything
/// changed.
pub fn round_prices(medications: &mut Map<String, Value>) -> bool {
    let mut changed = false;
    for dosages in medications.values_mut() {
        let Value::Object(dosages) = dosages else {
            continue;
        };
        for price in dosages.values_mut() {
            if let Some(p) = price.as_f64().filter(|p| p.fract() != 0.0) {
                *price = Value::from(round_price(p));
                changed = true;
            }
        }
    }
    changed
}

pub fn medications_of(provider: &Record) -> Map<String, Value> {
    match provider.get("medications") {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    }
}

/// Rounds, then writes `{medications}` for one provider.
pub async fn save_pricing<S: EntityStore>(
    store: &S,
    provider_id: &str,
    medications: &Map<String, Value>,
) -> StoreResult<Record> {
    let mut rounded = medications.clone();
    round_prices(&mut rounded);
    store
        .update(
            EntityKind::Provider,
            provider_id,
            record([("medications", Value::Object(rounded))]),
        )
        .await
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoundingReport {
    pub checked: usize,
    pub updated: usize,
    pub failed: Vec<String>,
}

impl RoundingReport {
    pub fn message(&self) -> String {
        let mut msg = format!(
            "Cleanup complete! Checked {} providers and rounded prices for {} providers.",
            self.checked, self.updated
        );
        if !self.failed.is_empty() {
            msg.push_str(&format!(" Failed to save: {}.", self.failed.join(", ")));
        }
        msg
    }
}

/// Rounds fractional prices across the whole collection. Only providers with
/// something to round are written, concurrently.
pub async fn round_all_prices<S: EntityStore>(store: &S) -> anyhow::Result<RoundingReport> {
    let providers = store
        .list(EntityKind::Provider, None, None)
        .await
        .context("Failed loading providers")?;

    let mut pending = Vec::new();
    for provider in &providers {
        let mut medications = medications_of(provider);
        if !round_prices(&mut medications) {
            continue;
        }
        let Some(id) = record_id(provider) else {
            continue;
        };
        let name = record_str(provider, "name").unwrap_or(id.as_str()).to_string();
        pending.push((id, name, medications));
    }

    let writes = pending.into_iter().map(|(id, name, medications)| async move {
        let result = store
            .update(
                EntityKind::Provider,
                &id,
                record([("medications", Value::Object(medications))]),
            )
            .await;
        (name, result)
    });

    let mut report = RoundingReport {
        checked: providers.len(),
        ..Default::default()
    };
    for (name, result) in join_all(writes).await {
        match result {
            Ok(_) => report.updated += 1,
            Err(e) => {
                tracing::warn!("Rounding prices for {} failed: {}", name, e);
                report.failed.push(name);
            }
        }
    }
    tracing::info!("{}", report.message());
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn meds(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn halves_round_up() {
        assert_eq!(round_price(220.7), 221);
        assert_eq!(round_price(180.5), 181);
        assert_eq!(round_price(199.49), 199);
        assert_eq!(round_price(-2.5), -2);
    }

    #[test]
    fn set_price_creates_and_clears_leaves() {
        let mut m = meds(json!({"Wegovy": {"1mg": 200}, "Legacy": "call"}));
        set_price(&mut m, "Wegovy", "2.4mg", Some(299.0));
        set_price(&mut m, "Wegovy", "1mg", None);
        set_price(&mut m, "Legacy", "3mg", Some(150.0));
        assert_eq!(
            Value::Object(m),
            json!({"Wegovy": {"1mg": null, "2.4mg": 299.0}, "Legacy": {"3mg": 150.0}})
        );
    }

    #[test]
    fn rounding_skips_whole_numbers_and_text() {
        let mut whole = meds(json!({"Wegovy": {"1mg": 200, "2mg": "ask"}}));
        assert!(!round_prices(&mut whole));

        let mut frac = meds(json!({"Wegovy": {"1mg": 200.4, "2mg": null}, "Old": 3.5}));
        assert!(round_prices(&mut frac));
        assert_eq!(
            Value::Object(frac),
            json!({"Wegovy": {"1mg": 200, "2mg": null}, "Old": 3.5})
        );
    }

    #[tokio::test]
    async fn save_rounds_before_writing() {
        let store = MemoryStore::new().with_records(
            EntityKind::Provider,
            vec![meds(json!({"id": "a", "name": "Acme", "phone": "0100"}))],
        );
        let mut m = Map::new();
        set_price(&mut m, "Mounjaro", "5mg", Some(229.5));
        save_pricing(&store, "a", &m).await.unwrap();

        let acme = store.get(EntityKind::Provider, "a").await.unwrap();
        assert_eq!(acme["medications"], json!({"Mounjaro": {"5mg": 230}}));
        assert_eq!(acme["phone"], json!("0100"));
    }

    #[tokio::test]
    async fn cleanup_only_writes_fractional_providers() {
        let store = MemoryStore::new().with_records(
            EntityKind::Provider,
            vec![
                meds(json!({"id": "a", "name": "Acme", "medications": {"Wegovy": {"1mg": 199.99}}})),
                meds(json!({"id": "b", "name": "Beta", "medications": {"Wegovy": {"1mg": 180}}})),
                meds(json!({"id": "c", "name": "Gamma"})),
            ],
        );
        let report = round_all_prices(&store).await.unwrap();
        assert_eq!((report.checked, report.updated), (3, 1));
        assert_eq!(
            report.message(),
            "Cleanup complete! Checked 3 providers and rounded prices for 1 providers."
        );
        let acme = store.get(EntityKind::Provider, "a").await.unwrap();
        assert_eq!(acme["medications"]["Wegovy"]["1mg"], json!(200));
        let gamma = store.get(EntityKind::Provider, "c").await.unwrap();
        assert!(!gamma.contains_key("medications"));
    }
}
