use std::collections::BTreeMap;

use anyhow::Context;
use futures::future::join_all;
use serde::Serialize;
use serde_json::{Map, Value};

use super::providers::RowFailure;
use crate::model::lenient::value_as_f64;
use crate::pricing::{medications_of, round_price};
use crate::store::{EntityKind, EntityStore, Record, record, record_id, record_str};

/// One provider's rewritten price map, ready to send.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingUpdate {
    pub provider_id: String,
    pub provider_name: String,
    pub medications: Map<String, Value>,
    pub entries: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PricingPlan {
    /// Keyed by provider id; at most one write per provider.
    pub updates: BTreeMap<String, PendingUpdate>,
    pub price_entries: usize,
    pub skipped: usize,
    /// Names with no case-insensitive match, first-seen order, no repeats.
    pub unmatched: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PricingImportReport {
    pub providers_updated: usize,
    pub price_entries: usize,
    pub skipped: usize,
    pub unmatched: Vec<String>,
    pub failed: Vec<RowFailure>,
}

impl PricingImportReport {
    pub fn message(&self) -> String {
        let mut msg = format!(
            "Successfully updated pricing for {} providers ({} price entries)!",
            self.providers_updated, self.price_entries
        );
        if self.skipped > 0 {
            msg.push_str(&format!(" Skipped {} incomplete rows.", self.skipped));
        }
        if !self.unmatched.is_empty() {
            msg.push_str(&format!(
                " Warning: Could not find providers: {}. Please check provider names match exactly.",
                self.unmatched.join(", ")
            ));
        }
        if !self.failed.is_empty() {
            let names: Vec<&str> = self.failed.iter().map(|f| f.name.as_str()).collect();
            msg.push_str(&format!(" Failed to save: {}.", names.join(", ")));
        }
        msg
    }
}

struct PriceRow<'a> {
    provider_name: &'a str,
    medication: &'a str,
    dosage: String,
    price: f64,
}

fn text<'a>(row: &'a Record, key: &str) -> Option<&'a str> {
    record_str(row, key).filter(|s| !s.trim().is_empty())
}

/// `None` when any of the four fields is missing, blank or unusable.
fn parse_row(row: &Record) -> Option<PriceRow<'_>> {
    let dosage = match row.get("dosage")? {
        Value::String(s) if !s.trim().is_empty() => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let price = row
        .get("price")
        .and_then(value_as_f64)
        .filter(|p| *p >= 0.0)?;
    Some(PriceRow {
        provider_name: text(row, "provider_name")?,
        medication: text(row, "medication_name")?,
        dosage,
        price,
    })
}

/// Groups pricing rows by matched provider and builds each provider's new
/// price map from a deep copy of its current one. Only the targeted
/// medication/dosage leaves change; prices are rounded to whole pounds.
pub fn plan_pricing_import(existing: &[Record], rows: &[Record]) -> PricingPlan {
    let mut plan = PricingPlan::default();

    for row in rows {
        let Some(row) = parse_row(row) else {
            plan.skipped += 1;
            continue;
        };

        let wanted = row.provider_name.to_lowercase();
        let matched = existing.iter().find_map(|p| {
            let name = record_str(p, "name")?;
            if name.to_lowercase() == wanted {
                Some((p, record_id(p)?))
            } else {
                None
            }
        });
        let Some((provider, id)) = matched else {
            if !plan.unmatched.iter().any(|n| n == row.provider_name) {
                plan.unmatched.push(row.provider_name.to_string());
            }
            continue;
        };

        let pending = plan.updates.entry(id.clone()).or_insert_with(|| PendingUpdate {
            provider_id: id,
            provider_name: record_str(provider, "name").unwrap_or_default().to_string(),
            medications: medications_of(provider),
            entries: 0,
        });

        let dosages = pending
            .medications
            .entry(row.medication.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !dosages.is_object() {
            *dosages = Value::Object(Map::new());
        }
        if let Value::Object(dosages) = dosages {
            dosages.insert(row.dosage, Value::from(round_price(row.price)));
        }
        pending.entries += 1;
        plan.price_entries += 1;
    }

    plan
}

/// Sends one `{medications}` update per provider, all at once. Not
/// transactional: each write succeeds or fails on its own.
pub async fn apply_pricing_plan<S: EntityStore>(store: &S, plan: PricingPlan) -> PricingImportReport {
    let writes = plan.updates.values().map(|pending| async move {
        let payload = record([("medications", Value::Object(pending.medications.clone()))]);
        let result = store
            .update(EntityKind::Provider, &pending.provider_id, payload)
            .await;
        (pending, result)
    });
    let results = join_all(writes).await;

    let mut report = PricingImportReport {
        skipped: plan.skipped,
        unmatched: plan.unmatched.clone(),
        ..Default::default()
    };
    for (pending, result) in results {
        match result {
            Ok(_) => {
                report.providers_updated += 1;
                report.price_entries += pending.entries;
            }
            Err(e) => {
                tracing::warn!("Pricing update for {} failed: {}", pending.provider_name, e);
                report.failed.push(RowFailure {
                    name: pending.provider_name.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    tracing::info!(
        "pricing import: providers={} entries={} skipped={} unmatched={} failed={}",
        report.providers_updated,
        report.price_entries,
        report.skipped,
        report.unmatched.len(),
        report.failed.len()
    );
    report
}

pub async fn import_pricing<S: EntityStore>(
    store: &S,
    rows: &[Record],
) -> anyhow::Result<PricingImportReport> {
    let existing = store
        .list(EntityKind::Provider, None, None)
        .await
        .context("Failed loading existing providers")?;
    let plan = plan_pricing_import(&existing, rows);
    Ok(apply_pricing_plan(store, plan).await)
}
